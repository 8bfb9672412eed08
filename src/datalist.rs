//! Loading of dataset manifests.
//!
//! A manifest is a JSON file mapping a key (such as `"training"`, `"validation"` or `"test"`) to a list of records.
//! Each record maps field names to a path, a list of paths, or any other JSON value. [`load_datalist`] resolves the
//! paths of a list against a base directory:
//!
//! ```json
//! {
//!     "training": [
//!         {"image": "imagesTr/spleen_19.nii.gz", "label": "labelsTr/spleen_19.nii.gz"},
//!         {"image": "imagesTr/spleen_31.nii.gz", "label": "labelsTr/spleen_31.nii.gz"}
//!     ],
//!     "test": ["imagesTs/spleen_15.nii.gz", "imagesTs/spleen_23.nii.gz"]
//! }
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// A single data item, a JSON object keyed by field names.
pub type Record = serde_json::Map<String, JsonValue>;

/// Options of [`load_datalist`].
#[derive(Debug, Clone)]
pub struct DatalistOptions {
    /// Whether the list is of a segmentation task, in which case `"label"` fields are paths as well.
    pub is_segmentation: bool,
    /// The key of the list to load.
    pub data_list_key: String,
    /// The directory paths are relative to; the directory of the manifest if `None`.
    pub base_dir: Option<PathBuf>,
}

impl Default for DatalistOptions {
    fn default() -> Self {
        Self {
            is_segmentation: true,
            data_list_key: "training".to_string(),
            base_dir: None,
        }
    }
}

/// Load a list of records from a manifest, resolving their paths.
///
/// The `"image"` field, and the `"label"` field if `options.is_segmentation` is set, are joined with the base
/// directory and normalized unconditionally. Any other field is joined only if the result is an existing path, and
/// kept as is otherwise. A field holding a list is joined element wise, only if every element is a string. Fields
/// holding anything else are kept as they are.
///
/// The `"test"` list is a list of paths rather than records; each path is wrapped into a record `{"image": path}`
/// first.
///
/// # Errors
///
/// - [`Error::FileNotFound`] if `path` is not a file.
/// - [`Error::MissingKey`] if the manifest has no `options.data_list_key` entry.
/// - [`Error::InvalidRecord`] if a record is not a JSON object.
/// - [`Error::Io`] and [`Error::Json`] if the file can not be read or parsed.
pub fn load_datalist(path: impl AsRef<Path>, options: &DatalistOptions) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let mut manifest = read_json_object(path)?;
    let key = options.data_list_key.as_str();
    let Some(items) = manifest.remove(key) else {
        log::error!("Data list {key} not specified in {}", path.display());
        return Err(Error::MissingKey {
            key: key.to_string(),
            file: path.to_path_buf(),
        });
    };
    let items = match items {
        JsonValue::Array(items) => items,
        other => {
            log::error!("Data list {key} in {} is not a list", path.display());
            return Err(Error::InvalidRecord(json_type_name(&other).to_string()));
        }
    };
    let items = if key == "test" {
        items
            .into_iter()
            .map(|image| JsonValue::Object(Record::from_iter([("image".to_string(), image)])))
            .collect()
    } else {
        items
    };

    let base_dir = match &options.base_dir {
        Some(base_dir) => base_dir.clone(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    log::debug!(
        "Resolving {} records of {key} against {}",
        items.len(),
        base_dir.display()
    );
    append_paths(&base_dir, options.is_segmentation, items)
}

/// Load the given keys from a JSON object file.
///
/// # Errors
///
/// - [`Error::FileNotFound`] if `path` is not a file.
/// - [`Error::MissingKey`] if any of the keys is missing.
/// - [`Error::Io`] and [`Error::Json`] if the file can not be read or parsed.
pub fn load_properties(path: impl AsRef<Path>, keys: &[&str]) -> Result<Record> {
    let path = path.as_ref();
    let properties = read_json_object(path)?;
    keys.iter()
        .map(|&key| match properties.get(key) {
            Some(value) => Ok((key.to_string(), value.clone())),
            None => {
                log::error!("Key {key} is not in the data property file {}", path.display());
                Err(Error::MissingKey {
                    key: key.to_string(),
                    file: path.to_path_buf(),
                })
            }
        })
        .collect()
}

fn read_json_object(path: &Path) -> Result<Record> {
    if !path.is_file() {
        log::error!("File {} does not exist", path.display());
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        JsonValue::Object(object) => Ok(object),
        other => Err(Error::InvalidRecord(json_type_name(&other).to_string())),
    }
}

fn append_paths(base_dir: &Path, is_segmentation: bool, items: Vec<JsonValue>) -> Result<Vec<Record>> {
    items
        .into_iter()
        .map(|item| {
            let mut record = match item {
                JsonValue::Object(record) => record,
                other => {
                    let name = json_type_name(&other);
                    log::error!("Every item in the data list must be an object but got {name}");
                    return Err(Error::InvalidRecord(name.to_string()));
                }
            };
            for (key, value) in record.iter_mut() {
                let check_path = !(key == "image" || is_segmentation && key == "label");
                compute_path(base_dir, value, check_path);
            }
            Ok(record)
        })
        .collect()
}

/// Join a path, or a list of paths, with `base_dir`.
///
/// With `check_path` a path is only replaced if the joined path exists.
fn compute_path(base_dir: &Path, element: &mut JsonValue, check_path: bool) {
    match element {
        JsonValue::String(item) => {
            if let Some(joined) = join_path(base_dir, item, check_path) {
                *item = joined;
            }
        }
        JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
            for item in items.iter_mut() {
                if let JsonValue::String(item) = item {
                    if let Some(joined) = join_path(base_dir, item, check_path) {
                        *item = joined;
                    }
                }
            }
        }
        _ => {}
    }
}

fn join_path(base_dir: &Path, item: &str, check_path: bool) -> Option<String> {
    let joined = normalize(&base_dir.join(item));
    if check_path && !joined.exists() {
        return None;
    }
    Some(joined.to_string_lossy().into_owned())
}

/// Lexically normalize a path, folding `.` and `..` components without accessing the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` of the root is the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
