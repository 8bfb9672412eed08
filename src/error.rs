//! Error types used in the [`tensor_interop`](crate) crate.

use std::path::PathBuf;

use crate::backend::Backend;

/// Conversion and manifest loading errors.
///
/// None of these are transient; they are reported to the caller as soon as they are encountered and a failed
/// conversion never yields a partial result.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /* Conversion errors */
    //
    /// A dtype has no equivalent in the dtype space of the requested backend.
    #[error("unsupported dtype '{dtype}' for the {backend} backend")]
    UnsupportedDtype {
        /// The offending dtype, formatted in its own backend's notation.
        dtype: String,
        /// The backend whose dtype space was asked for.
        backend: Backend,
    },
    /// The requested output backend is not one the converter implements.
    #[error("unsupported output type: {0}")]
    UnsupportedOutputType(Backend),
    /// The input can not be materialized as an accelerator array.
    #[error("the input data type [{0}] cannot be converted into accelerator arrays")]
    UnconvertibleInput(String),
    /// The requested backend was not enabled when the converter was created.
    #[error("the {0} backend is not available")]
    BackendUnavailable(Backend),
    /// Arrays of different shapes can not be stacked together.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shape of the first stacked element.
        expected: Vec<usize>,
        /// Shape of the element that disagrees with it.
        found: Vec<usize>,
    },

    /* Manifest errors */
    //
    /// The manifest or property file does not exist.
    #[error("data list file {} does not exist", .0.display())]
    FileNotFound(PathBuf),
    /// A requested key is not present in the JSON file.
    #[error("key '{key}' is not specified in \"{}\"", .file.display())]
    MissingKey {
        /// The missing key.
        key: String,
        /// The file that was searched.
        file: PathBuf,
    },
    /// A data list item is not a JSON object.
    #[error("every item in the data list must be an object but got {0}")]
    InvalidRecord(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unsupported_dtype(dtype: impl std::fmt::Display, backend: Backend) -> Self {
        Error::UnsupportedDtype {
            dtype: dtype.to_string(),
            backend,
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
