#![cfg_attr(deny_warnings, deny(warnings))]
// some new clippy::lint annotations are supported in latest Rust but not recognized by older versions
#![cfg_attr(deny_warnings, allow(unknown_lints))]
#![cfg_attr(deny_warnings, deny(missing_docs))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Conversion of arbitrary nested data between array backends.
//!
//! Three backends are modeled, each wrapping [`ndarray`] storage:
//! - [`HostArray`](backend::HostArray): arrays in host memory, which may also hold strings and generic objects.
//! - [`Tensor`](backend::Tensor): tensors placed on a [`Device`](backend::Device).
//! - [`AcceleratorArray`](backend::AcceleratorArray): arrays in the memory of a single accelerator device.
//!
//! Data is represented by [`Value`](value::Value), which holds native scalars, strings, arrays of any backend and
//! nested lists, tuples and maps of those. The [`convert`] module converts such values to any backend, dtype and
//! device while keeping their structure, and can bring a result back to the representation the caller supplied:
//!
//! ```rust
//! use ndarray::array;
//! use tensor_interop::backend::{Backend, Capabilities, Device, HostArray};
//! use tensor_interop::convert::{ConversionRequest, Converter};
//! use tensor_interop::dtype::{HostDtype, TensorDtype};
//! use tensor_interop::value::Value;
//!
//! let converter = Converter::new(Capabilities::all());
//! let data = Value::map([
//!     ("image", Value::from(HostArray::new(array![[0.5_f32, 1.0], [1.5, 2.0]]).unwrap())),
//!     ("label", Value::from(1)),
//! ]);
//!
//! let request = ConversionRequest::new(&data)
//!     .backend(Backend::Tensor)
//!     .device(Device::Cuda(0))
//!     .dtype(TensorDtype::Float);
//! let result = converter.convert(request).unwrap();
//! let image = result.value.as_map().unwrap()["image"].as_tensor().unwrap();
//! assert_eq!(image.dtype(), TensorDtype::Float);
//! assert_eq!(image.device(), Device::Cuda(0));
//!
//! let reference = Value::from(HostArray::new(array![0.0_f64]).unwrap());
//! let restored = converter.convert_to_match(&result.value, &reference).unwrap();
//! let image = restored.value.as_map().unwrap()["image"].as_host().unwrap();
//! assert_eq!(image.dtype(), HostDtype::Float64);
//! ```
//!
//! The [`dtype`] module holds the dtype notations of the backends and the process-wide table of their equivalences.
//! The [`datalist`] module loads dataset manifests, lists of records referencing files on disk.
//!
//! ## Cargo Features
//! - `accelerator`:
//!     The accelerator backend is reported available by [`Capabilities::detect`](backend::Capabilities::detect),
//!     and thus by [`Converter::global`](convert::Converter::global). Without this feature the accelerator types
//!     still exist, but every request targeting the accelerator fails with [`Error::BackendUnavailable`].
//!     This feature is enabled by default.
//!
//! ## Logging
//! The crate logs through the [`log`](https://docs.rs/log) facade and never installs a logger itself.

pub use half;
pub use ndarray;
pub use num_complex;

#[macro_use]
mod private;
pub mod array;
pub mod backend;
pub mod convert;
pub mod datalist;
pub mod dtype;
pub mod error;
pub mod scalar;
pub mod value;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    #[ctor::ctor]
    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}
