//! The array backends and the values native to each of them.
//!
//! - [`HostArray`]: an array in host memory, with a [`HostDtype`]. May hold strings or generic objects.
//! - [`Tensor`]: a tensor with a [`TensorDtype`] placed on a [`Device`].
//! - [`AcceleratorArray`]: an array in accelerator memory, with a numeric [`HostDtype`]. Only a single accelerator
//!   device is modeled.
//!
//! All three wrap an [`ArrayData`] and validate on construction that its element type is one the backend can store.

use std::fmt;

use crate::array::ArrayData;
use crate::dtype::{HostDtype, TensorDtype};
use crate::{Error, Result};

/// The backends known to the converter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Backend {
    /// Host memory arrays, [`HostArray`].
    HostArray,
    /// Device placed tensors, [`Tensor`].
    Tensor,
    /// Accelerator memory arrays, [`AcceleratorArray`].
    AcceleratorArray,
    /// Anything else: native scalars, strings, containers.
    Opaque,
}

impl Backend {
    /// Whether values of this backend reside on a [`Device`].
    pub fn is_device_aware(self) -> bool {
        matches!(self, Backend::Tensor | Backend::AcceleratorArray)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::HostArray => "host array",
            Backend::Tensor => "tensor",
            Backend::AcceleratorArray => "accelerator array",
            Backend::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Where a tensor's memory lives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Device {
    /// Host memory.
    #[default]
    Cpu,
    /// Memory of the accelerator with the given index.
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

/// An array in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    data: ArrayData,
    dtype: HostDtype,
}

impl HostArray {
    /// Create a host array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDtype`] if host arrays can not store the elements (`bf16`).
    pub fn new(data: impl Into<ArrayData>) -> Result<Self> {
        let data = data.into();
        let Some(dtype) = data.host_dtype() else {
            log::error!("Host arrays can not store {} elements", data.dtype_name());
            return Err(Error::unsupported_dtype(
                data.dtype_name(),
                Backend::HostArray,
            ));
        };
        Ok(Self { data, dtype })
    }

    /// The element dtype.
    pub fn dtype(&self) -> HostDtype {
        self.dtype
    }

    /// The underlying data.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Extract the underlying data.
    pub fn into_data(self) -> ArrayData {
        self.data
    }
}

/// A tensor placed on a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayData,
    dtype: TensorDtype,
    device: Device,
}

impl Tensor {
    /// Create a tensor on the given device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDtype`] if tensors can not store the elements (unsigned integers wider than
    /// 8 bits, strings and objects).
    pub fn new(data: impl Into<ArrayData>, device: Device) -> Result<Self> {
        let data = data.into();
        let Some(dtype) = data.tensor_dtype() else {
            log::error!("Tensors can not store {} elements", data.dtype_name());
            return Err(Error::unsupported_dtype(data.dtype_name(), Backend::Tensor));
        };
        Ok(Self {
            data,
            dtype,
            device,
        })
    }

    /// The element dtype.
    pub fn dtype(&self) -> TensorDtype {
        self.dtype
    }

    /// The device the tensor is placed on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// The underlying data.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Extract the underlying data.
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Get the tensor placed on `device`.
    ///
    /// A tensor already on `device` is returned as is, otherwise its elements are copied.
    pub fn to_device(&self, device: Device) -> Tensor {
        if device == self.device {
            return self.clone();
        }
        log::debug!("Moving {} tensor from {} to {device}", self.dtype, self.device);
        Tensor {
            data: self.data.deep_copy(),
            dtype: self.dtype,
            device,
        }
    }
}

/// An array in accelerator memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceleratorArray {
    data: ArrayData,
    dtype: HostDtype,
}

impl AcceleratorArray {
    /// The device every accelerator array resides on.
    pub const DEVICE: Device = Device::Cuda(0);

    /// Create an accelerator array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDtype`] if the elements are not numbers or are `bf16`.
    pub fn new(data: impl Into<ArrayData>) -> Result<Self> {
        let data = data.into();
        match data.host_dtype() {
            Some(dtype) if dtype.is_numeric() => Ok(Self { data, dtype }),
            _ => {
                log::error!("Accelerator arrays can not store {} elements", data.dtype_name());
                Err(Error::unsupported_dtype(
                    data.dtype_name(),
                    Backend::AcceleratorArray,
                ))
            }
        }
    }

    /// The element dtype.
    pub fn dtype(&self) -> HostDtype {
        self.dtype
    }

    /// The device the array resides on, always [`AcceleratorArray::DEVICE`].
    pub fn device(&self) -> Device {
        Self::DEVICE
    }

    /// The underlying data.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Extract the underlying data.
    pub fn into_data(self) -> ArrayData {
        self.data
    }
}

/// Optional backends available to a [`Converter`](crate::convert::Converter).
///
/// Resolved once when the converter is created and never changed afterwards.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Capabilities {
    /// Whether accelerator arrays can be produced.
    pub accelerator: bool,
}

impl Capabilities {
    /// Capabilities with every optional backend enabled.
    pub fn all() -> Self {
        Self { accelerator: true }
    }

    /// Capabilities with only the host array and tensor backends.
    pub fn host_only() -> Self {
        Self { accelerator: false }
    }

    /// The capabilities this build supports: the accelerator is available if the `accelerator` feature is enabled.
    pub fn detect() -> Self {
        let accelerator = cfg!(feature = "accelerator");
        if !accelerator {
            log::debug!("Built without the `accelerator` feature, accelerator arrays are unavailable");
        }
        Self { accelerator }
    }

    /// Whether values of `backend` can be produced.
    pub fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::HostArray | Backend::Tensor => true,
            Backend::AcceleratorArray => self.accelerator,
            Backend::Opaque => false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::scalar::bf16;

    #[test]
    fn construction_validates_element_types() {
        assert!(HostArray::new(array![1_u32, 2]).is_ok());
        assert!(HostArray::new(array![bf16::from_f32(1.0)]).is_err());

        assert!(Tensor::new(array![bf16::from_f32(1.0)], Device::Cpu).is_ok());
        assert!(matches!(
            Tensor::new(array![1_u32, 2], Device::Cpu),
            Err(Error::UnsupportedDtype {
                backend: Backend::Tensor,
                ..
            })
        ));
        assert!(Tensor::new(array!["a".to_string()], Device::Cpu).is_err());

        assert!(AcceleratorArray::new(array![1.0_f32]).is_ok());
        assert!(AcceleratorArray::new(array!["a".to_string()]).is_err());
        assert!(AcceleratorArray::new(array![bf16::from_f32(1.0)]).is_err());
    }

    #[test]
    fn dtypes_and_devices() {
        let tensor = Tensor::new(array![1_i64, 2], Device::Cuda(1)).unwrap();
        assert_eq!(tensor.dtype(), TensorDtype::Long);
        assert_eq!(tensor.device(), Device::Cuda(1));
        assert_eq!(tensor.device().to_string(), "cuda:1");

        let host = HostArray::new(array![[1.0_f64]]).unwrap();
        assert_eq!(host.dtype(), HostDtype::Float64);

        let accel = AcceleratorArray::new(array![1_u8]).unwrap();
        assert_eq!(accel.device(), Device::Cuda(0));
    }

    #[test]
    fn to_device() {
        let tensor = Tensor::new(array![1.0_f32, 2.0], Device::Cpu).unwrap();
        assert!(tensor.to_device(Device::Cpu).data().shares_buffer(tensor.data()));

        let moved = tensor.to_device(Device::Cuda(0));
        assert_eq!(moved.device(), Device::Cuda(0));
        assert!(!moved.data().shares_buffer(tensor.data()));
        assert_eq!(moved.data(), tensor.data());
    }

    #[test]
    fn capabilities() {
        assert!(Capabilities::all().supports(Backend::AcceleratorArray));
        assert!(!Capabilities::host_only().supports(Backend::AcceleratorArray));
        assert!(Capabilities::host_only().supports(Backend::Tensor));
        assert!(!Capabilities::all().supports(Backend::Opaque));
        assert_eq!(
            Capabilities::detect().accelerator,
            cfg!(feature = "accelerator")
        );
    }
}
