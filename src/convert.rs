//! Conversion of arbitrary nested data between backends.
//!
//! The module has three layers:
//! - [`Materialize`] is implemented once per backend by [`HostConverter`], [`TensorConverter`] and
//!   [`AcceleratorConverter`]. Each turns a single leaf value into a value native to its backend, honoring an
//!   optional dtype (and device, for tensors) and forcing a contiguous layout on arrays of rank one or more.
//! - [`walk`] applies a materializer to every leaf of a list, tuple or map, returning a structure of the same shape.
//!   In wrap mode a list of numbers (or of arrays of equal shape) is stacked into a single array instead.
//! - [`Converter`] is the orchestrator. [`Converter::convert`] resolves the target backend, device and dtype of a
//!   [`ConversionRequest`] and reports the original backend and device of the data, so that
//!   [`Converter::convert_to_match`] can later bring a result back to the caller's representation.
//!
//! Strings, `None`, and host arrays of strings or objects are never converted; they are returned as they are.

use std::sync::OnceLock;

use crate::array::ArrayData;
use crate::backend::{AcceleratorArray, Backend, Capabilities, Device, HostArray, Tensor};
use crate::dtype::{dtype_host_to_tensor, dtype_tensor_to_host, Dtype, HostDtype, TensorDtype};
use crate::value::Value;
use crate::{Error, Result};

/// The capability of materializing arbitrary data as values of one backend.
pub trait Materialize {
    /// The backend values are materialized for.
    const BACKEND: Backend;

    /// Whether lists nested inside a container are stacked.
    const WRAP_NESTED: bool;

    /// Convert a single leaf: anything but a list, tuple or map.
    ///
    /// Values that have no counterpart in the backend are returned unchanged, unless the backend can not hold them
    /// at all.
    fn leaf(&self, value: &Value) -> Result<Value>;

    /// Convert the result of stacking a list.
    ///
    /// `native_only` is set when every stacked element was a native scalar rather than an array. `device` is the
    /// device shared by all the stacked tensors and accelerator arrays, if they agree on one.
    fn stacked(&self, data: ArrayData, native_only: bool, device: Option<Device>) -> Result<Value>;

    /// Convert `value` and every value nested in it.
    fn materialize(&self, value: &Value, wrap_sequence: bool) -> Result<Value>
    where
        Self: Sized,
    {
        walk(value, self, wrap_sequence)
    }
}

/// Apply `op` to every leaf of `value`, keeping the shape of lists, tuples and maps.
///
/// If `wrap_sequence` is set and `value` is a list whose elements are all numbers, numeric arrays, or sequences of
/// those, with equal shapes, the list is stacked into one array and handed to `op` as a whole. Any other list is
/// converted element by element. Containers nested inside `value` are walked with the backend's
/// [`WRAP_NESTED`](Materialize::WRAP_NESTED) mode.
pub fn walk<M: Materialize>(value: &Value, op: &M, wrap_sequence: bool) -> Result<Value> {
    match value {
        Value::Map(map) => {
            let map = map
                .iter()
                .map(|(key, value)| Ok((key.clone(), walk(value, op, M::WRAP_NESTED)?)))
                .collect::<Result<_>>()?;
            Ok(Value::Map(map))
        }
        Value::Tuple(items) => Ok(Value::Tuple(walk_items(items, op)?)),
        Value::List(items) => {
            if wrap_sequence {
                if let Some(stacked) = stack_values(items) {
                    log::trace!(
                        "Stacking a list of {} values into a {} of shape {:?}",
                        items.len(),
                        M::BACKEND,
                        stacked.data.shape()
                    );
                    let device = stacked.common_device();
                    return op.stacked(stacked.data, stacked.native_only, device);
                }
                log::trace!("List is not uniformly numeric, converting its elements one by one");
            }
            Ok(Value::List(walk_items(items, op)?))
        }
        leaf => op.leaf(leaf),
    }
}

fn walk_items<M: Materialize>(items: &[Value], op: &M) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| walk(item, op, M::WRAP_NESTED))
        .collect()
}

struct Stacked {
    data: ArrayData,
    native_only: bool,
    devices: Vec<Device>,
}

impl Stacked {
    fn common_device(&self) -> Option<Device> {
        let first = *self.devices.first()?;
        self.devices.iter().all(|&device| device == first).then_some(first)
    }
}

/// Stack a sequence into a single array, or `None` if it holds anything that can not be stacked.
fn stack_values(items: &[Value]) -> Option<Stacked> {
    let mut native_only = true;
    let mut devices = Vec::new();
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let part = match item {
            Value::Bool(b) => ArrayData::from_elem(*b),
            Value::Int(i) => ArrayData::from_elem(*i),
            Value::Float(f) => ArrayData::from_elem(*f),
            Value::Host(array) => {
                native_only = false;
                array.data().clone()
            }
            Value::Tensor(tensor) => {
                native_only = false;
                devices.push(tensor.device());
                tensor.data().clone()
            }
            Value::Accelerator(array) => {
                native_only = false;
                devices.push(array.device());
                array.data().clone()
            }
            Value::List(inner) | Value::Tuple(inner) => {
                let inner = stack_values(inner)?;
                native_only &= inner.native_only;
                devices.extend(inner.devices);
                inner.data
            }
            Value::None | Value::Str(_) | Value::Map(_) => return None,
        };
        let ragged = parts
            .first()
            .is_some_and(|first: &ArrayData| first.shape() != part.shape());
        if !part.is_numeric() || ragged {
            return None;
        }
        parts.push(part);
    }
    let data = ArrayData::stack(&parts).ok()?;
    Some(Stacked {
        data,
        native_only,
        devices,
    })
}

/// Materializes values as [`HostArray`]s.
#[derive(Debug, Copy, Clone, Default)]
pub struct HostConverter {
    /// Element dtype of the produced arrays; the source dtype is kept if `None`.
    pub dtype: Option<HostDtype>,
}

impl HostConverter {
    fn finish(&self, data: ArrayData) -> Result<Value> {
        let data = match self.dtype {
            Some(dtype) => data.cast_host(dtype)?,
            None => data,
        };
        Ok(Value::Host(HostArray::new(data.to_contiguous())?))
    }
}

impl Materialize for HostConverter {
    const BACKEND: Backend = Backend::HostArray;
    const WRAP_NESTED: bool = false;

    fn leaf(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Host(array) if !array.dtype().is_numeric() => Ok(value.clone()),
            Value::Host(array) => self.finish(array.data().clone()),
            Value::Tensor(tensor) => {
                // host arrays have no bf16
                dtype_tensor_to_host(tensor.dtype())?;
                let data = match tensor.device() {
                    Device::Cpu => tensor.data().clone(),
                    device => {
                        log::debug!("Copying {} tensor from {device} to host memory", tensor.dtype());
                        tensor.data().deep_copy()
                    }
                };
                self.finish(data)
            }
            Value::Accelerator(array) => {
                log::debug!("Copying {} accelerator array to host memory", array.dtype());
                self.finish(array.data().deep_copy())
            }
            Value::Bool(b) => self.finish(ArrayData::from_elem(*b)),
            Value::Int(i) => self.finish(ArrayData::from_elem(*i)),
            Value::Float(f) => self.finish(ArrayData::from_elem(*f)),
            other => Ok(other.clone()),
        }
    }

    fn stacked(&self, data: ArrayData, _native_only: bool, _device: Option<Device>) -> Result<Value> {
        self.finish(data)
    }
}

/// Materializes values as [`Tensor`]s.
#[derive(Debug, Copy, Clone, Default)]
pub struct TensorConverter {
    /// Element dtype of the produced tensors; the source dtype is kept if `None`.
    pub dtype: Option<TensorDtype>,
    /// Device to place the produced tensors on; the source device is kept if `None`.
    pub device: Option<Device>,
}

impl TensorConverter {
    fn finish(&self, data: ArrayData, source_device: Device) -> Result<Value> {
        let data = match self.dtype {
            Some(dtype) => data.cast_tensor(dtype)?,
            None => data,
        };
        let tensor = Tensor::new(data.to_contiguous(), source_device)?;
        let tensor = match self.device {
            Some(device) => tensor.to_device(device),
            None => tensor,
        };
        Ok(Value::Tensor(tensor))
    }

    fn native_float(&self, data: ArrayData) -> Result<ArrayData> {
        match data {
            ArrayData::Float64(_) if self.dtype.is_none() => data.cast_tensor(TensorDtype::DEFAULT_FLOAT),
            data => Ok(data),
        }
    }
}

impl Materialize for TensorConverter {
    const BACKEND: Backend = Backend::Tensor;
    const WRAP_NESTED: bool = false;

    fn leaf(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Tensor(tensor) => self.finish(tensor.data().clone(), tensor.device()),
            Value::Host(array) if !array.dtype().is_numeric() => Ok(value.clone()),
            Value::Host(array) => {
                dtype_host_to_tensor(array.dtype())?;
                self.finish(array.data().clone(), Device::Cpu)
            }
            Value::Accelerator(array) => {
                dtype_host_to_tensor(array.dtype())?;
                self.finish(array.data().clone(), array.device())
            }
            Value::Bool(b) => self.finish(ArrayData::from_elem(*b), Device::Cpu),
            Value::Int(i) => self.finish(ArrayData::from_elem(*i), Device::Cpu),
            Value::Float(f) => {
                let data = self.native_float(ArrayData::from_elem(*f))?;
                self.finish(data, Device::Cpu)
            }
            other => Ok(other.clone()),
        }
    }

    fn stacked(&self, data: ArrayData, native_only: bool, device: Option<Device>) -> Result<Value> {
        let data = if native_only {
            self.native_float(data)?
        } else {
            data
        };
        self.finish(data, device.unwrap_or_default())
    }
}

/// Materializes values as [`AcceleratorArray`]s.
///
/// Unlike the other converters, leaves without a numeric dtype (strings, `None`) are rejected with
/// [`Error::UnconvertibleInput`] instead of being returned unchanged. Host arrays of strings or objects are still
/// passed through.
#[derive(Debug, Copy, Clone, Default)]
pub struct AcceleratorConverter {
    /// Element dtype of the produced arrays; the source dtype is kept if `None`.
    pub dtype: Option<HostDtype>,
}

impl AcceleratorConverter {
    fn finish(&self, data: ArrayData) -> Result<Value> {
        let data = match self.dtype {
            Some(dtype) => data.cast_host(dtype)?,
            None => data,
        };
        Ok(Value::Accelerator(AcceleratorArray::new(
            data.to_contiguous(),
        )?))
    }
}

impl Materialize for AcceleratorConverter {
    const BACKEND: Backend = Backend::AcceleratorArray;
    const WRAP_NESTED: bool = true;

    fn leaf(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Accelerator(array) => self.finish(array.data().clone()),
            Value::Host(array) if !array.dtype().is_numeric() => Ok(value.clone()),
            Value::Host(array) => {
                log::debug!("Copying {} host array to accelerator memory", array.dtype());
                self.finish(array.data().deep_copy())
            }
            Value::Tensor(tensor) => {
                dtype_tensor_to_host(tensor.dtype())?;
                let data = match tensor.device() {
                    device if device == AcceleratorArray::DEVICE => tensor.data().clone(),
                    device => {
                        log::debug!("Copying {} tensor from {device} to accelerator memory", tensor.dtype());
                        tensor.data().deep_copy()
                    }
                };
                self.finish(data)
            }
            Value::Bool(b) => self.finish(ArrayData::from_elem(*b)),
            Value::Int(i) => self.finish(ArrayData::from_elem(*i)),
            Value::Float(f) => self.finish(ArrayData::from_elem(*f)),
            other => {
                log::error!("The input data type [{}] cannot be converted into accelerator arrays", other.tag());
                Err(Error::UnconvertibleInput(other.tag().to_string()))
            }
        }
    }

    fn stacked(&self, data: ArrayData, _native_only: bool, _device: Option<Device>) -> Result<Value> {
        self.finish(data)
    }
}

/// Convert `data` into host arrays, see [`HostConverter`] and [`walk`].
///
/// If `wrap_sequence` is `false`, lists are converted element by element: `[1, 2]` becomes a list of two rank-0
/// arrays. If `true`, `[1, 2]` becomes a single array of shape `[2]`.
pub fn materialize_host_array(data: &Value, wrap_sequence: bool) -> Result<Value> {
    HostConverter::default().materialize(data, wrap_sequence)
}

/// Convert `data` into tensors placed on `device`, see [`TensorConverter`] and [`walk`].
///
/// Native floats become 32-bit tensors; arrays keep their dtype.
pub fn materialize_tensor(data: &Value, wrap_sequence: bool, device: Option<Device>) -> Result<Value> {
    TensorConverter {
        dtype: None,
        device,
    }
    .materialize(data, wrap_sequence)
}

/// Convert `data` into accelerator arrays with the process-wide [`Converter::global`].
pub fn materialize_accelerator_array(
    data: &Value,
    dtype: Option<HostDtype>,
    wrap_sequence: bool,
) -> Result<Value> {
    Converter::global().materialize_accelerator_array(data, dtype, wrap_sequence)
}

/// A request to convert data, built with [`ConversionRequest::new`] and the builder methods.
///
/// Unspecified targets keep the corresponding property of the data.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    /// The data to convert.
    pub data: &'a Value,
    /// Backend of the converted value.
    pub target_backend: Option<Backend>,
    /// Device of the converted value; only meaningful for tensors.
    pub target_device: Option<Device>,
    /// Element dtype of the converted value, in any backend's notation.
    pub target_dtype: Option<Dtype>,
    /// Whether a top level list is stacked into a single array, see [`walk`].
    pub wrap_sequence: bool,
}

impl<'a> ConversionRequest<'a> {
    /// Create a request that keeps every property of `data`.
    pub fn new(data: &'a Value) -> Self {
        Self {
            data,
            target_backend: None,
            target_device: None,
            target_dtype: None,
            wrap_sequence: false,
        }
    }

    /// Set the target backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.target_backend = Some(backend);
        self
    }

    /// Set the target device.
    pub fn device(mut self, device: Device) -> Self {
        self.target_device = Some(device);
        self
    }

    /// Set the target dtype.
    pub fn dtype(mut self, dtype: impl Into<Dtype>) -> Self {
        self.target_dtype = Some(dtype.into());
        self
    }

    /// Stack a top level list instead of converting its elements one by one.
    pub fn wrap_sequence(mut self, wrap_sequence: bool) -> Self {
        self.wrap_sequence = wrap_sequence;
        self
    }
}

/// The outcome of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    /// The converted value.
    pub value: Value,
    /// The backend the data was native to.
    pub original_backend: Backend,
    /// The device the data resided on, for device aware backends.
    pub original_device: Option<Device>,
}

/// The conversion orchestrator.
///
/// Holds the [`Capabilities`] it was created with; requests targeting a backend that is not available fail with
/// [`Error::BackendUnavailable`] instead of falling back to another backend.
#[derive(Debug, Clone)]
pub struct Converter {
    capabilities: Capabilities,
}

impl Converter {
    /// Create a converter with the given capabilities.
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// The process-wide converter, created on first use from [`Capabilities::detect`].
    pub fn global() -> &'static Converter {
        static CONVERTER: OnceLock<Converter> = OnceLock::new();
        CONVERTER.get_or_init(|| Converter::new(Capabilities::detect()))
    }

    /// The capabilities of the converter.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Convert data to the requested backend, device and dtype.
    ///
    /// The target backend defaults to the data's own backend, in which case the conversion only normalizes dtype,
    /// device and layout. The target dtype defaults to the dtype of the data (see [`Value::dtype`]), translated to
    /// the target backend's notation; if the data has no numeric dtype each leaf keeps its own.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedOutputType`] if the target backend is [`Backend::Opaque`], which is also the default
    ///   for data that is not an array or a tensor.
    /// - [`Error::BackendUnavailable`] if the target backend is not enabled in the converter's capabilities.
    /// - [`Error::UnsupportedDtype`] if a dtype has no equivalent in the target backend, or if a string or object
    ///   dtype is requested for data holding numbers.
    /// - [`Error::UnconvertibleInput`] if the data contains leaves an accelerator array can not hold.
    pub fn convert(&self, request: ConversionRequest<'_>) -> Result<ConversionResult> {
        let data = request.data;
        let original_backend = data.backend();
        let original_device = data.device();
        let target = request.target_backend.unwrap_or(original_backend);
        let dtype = request.target_dtype.unwrap_or_else(|| data.dtype());
        log::trace!(
            "Converting {original_backend} data to {target} (dtype {dtype}, device {:?})",
            request.target_device
        );

        if !self.capabilities.supports(target) {
            return Err(match target {
                Backend::Opaque => {
                    log::error!("Unsupported output type: {target}");
                    Error::UnsupportedOutputType(target)
                }
                _ => {
                    log::error!("The {target} backend is not available");
                    Error::BackendUnavailable(target)
                }
            });
        }

        // string and object storage is never cast, so such a dtype only fits data without numbers
        if let Some(requested) = request.target_dtype.filter(|dtype| !is_numeric_dtype(*dtype)) {
            if has_numeric_leaf(data) {
                log::error!("Can not convert numeric data to {requested} elements");
                return Err(Error::unsupported_dtype(requested, target));
            }
        }

        let value = match target {
            Backend::HostArray => HostConverter {
                dtype: resolve_host_dtype(dtype)?,
            }
            .materialize(data, request.wrap_sequence)?,
            Backend::Tensor => TensorConverter {
                dtype: resolve_tensor_dtype(dtype)?,
                device: request.target_device,
            }
            .materialize(data, request.wrap_sequence)?,
            Backend::AcceleratorArray => AcceleratorConverter {
                dtype: resolve_host_dtype(dtype)?,
            }
            .materialize(data, request.wrap_sequence)?,
            Backend::Opaque => return Err(Error::UnsupportedOutputType(target)),
        };
        Ok(ConversionResult {
            value,
            original_backend,
            original_device,
        })
    }

    /// Convert `source` to the backend, device and dtype of `reference`.
    ///
    /// Feeding the `original_backend` of a [`ConversionResult`] back through this, with the original data as
    /// reference, restores the caller's representation.
    pub fn convert_to_match(&self, source: &Value, reference: &Value) -> Result<ConversionResult> {
        let mut request = ConversionRequest::new(source).backend(reference.backend());
        if reference.backend() != Backend::Opaque {
            request = request.dtype(reference.dtype());
        }
        if let Value::Tensor(tensor) = reference {
            request = request.device(tensor.device());
        }
        self.convert(request)
    }

    /// Convert `data` into host arrays, see [`materialize_host_array`].
    pub fn materialize_host_array(&self, data: &Value, wrap_sequence: bool) -> Result<Value> {
        materialize_host_array(data, wrap_sequence)
    }

    /// Convert `data` into tensors, see [`materialize_tensor`].
    pub fn materialize_tensor(
        &self,
        data: &Value,
        wrap_sequence: bool,
        device: Option<Device>,
    ) -> Result<Value> {
        materialize_tensor(data, wrap_sequence, device)
    }

    /// Convert `data` into accelerator arrays of the given dtype, see [`AcceleratorConverter`].
    ///
    /// Leaves that carry a dtype of their own keep it if `dtype` is `None`.
    pub fn materialize_accelerator_array(
        &self,
        data: &Value,
        dtype: Option<HostDtype>,
        wrap_sequence: bool,
    ) -> Result<Value> {
        if !self.capabilities.accelerator {
            log::error!("The {} backend is not available", Backend::AcceleratorArray);
            return Err(Error::BackendUnavailable(Backend::AcceleratorArray));
        }
        AcceleratorConverter { dtype }.materialize(data, wrap_sequence)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Capabilities::detect())
    }
}

fn is_numeric_dtype(dtype: Dtype) -> bool {
    match dtype {
        Dtype::Host(host) => host.is_numeric(),
        Dtype::Native(native) => native.host_dtype().is_numeric(),
        Dtype::Tensor(_) => true,
    }
}

/// A dtype without numbers leaves every leaf with its own dtype.
fn resolve_host_dtype(dtype: Dtype) -> Result<Option<HostDtype>> {
    match is_numeric_dtype(dtype) {
        true => dtype.to_host().map(Some),
        false => Ok(None),
    }
}

fn resolve_tensor_dtype(dtype: Dtype) -> Result<Option<TensorDtype>> {
    match is_numeric_dtype(dtype) {
        true => dtype.to_tensor().map(Some),
        false => Ok(None),
    }
}

fn has_numeric_leaf(value: &Value) -> bool {
    match value {
        Value::None | Value::Str(_) => false,
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => true,
        Value::Host(array) => array.dtype().is_numeric(),
        Value::Tensor(_) | Value::Accelerator(_) => true,
        Value::List(items) | Value::Tuple(items) => items.iter().any(has_numeric_leaf),
        Value::Map(map) => map.values().any(has_numeric_leaf),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn host(data: impl Into<ArrayData>) -> Value {
        Value::Host(HostArray::new(data).unwrap())
    }

    #[test]
    fn host_leaves() {
        let value = materialize_host_array(&Value::from(2.5), false).unwrap();
        let array = value.as_host().unwrap();
        assert_eq!(array.dtype(), HostDtype::Float64);
        assert_eq!(array.data().ndim(), 0);

        let value = materialize_host_array(&Value::from(true), false).unwrap();
        assert_eq!(value.as_host().unwrap().dtype(), HostDtype::Bool);

        let s = Value::from("label");
        assert_eq!(materialize_host_array(&s, true).unwrap(), s);
        assert_eq!(materialize_host_array(&Value::None, true).unwrap(), Value::None);
    }

    #[test]
    fn host_is_identity_on_contiguous_arrays() {
        let original = host(array![[1_i16, 2], [3, 4]]);
        let value = materialize_host_array(&original, false).unwrap();
        assert!(value
            .as_host()
            .unwrap()
            .data()
            .shares_buffer(original.as_host().unwrap().data()));
    }

    #[test]
    fn host_fixes_layout() {
        let original = host(array![[1_i16, 2], [3, 4]].reversed_axes());
        let value = materialize_host_array(&original, false).unwrap();
        let data = value.as_host().unwrap().data();
        assert!(data.is_contiguous());
        assert_eq!(data, original.as_host().unwrap().data());
    }

    #[test]
    fn tensor_to_host_rejects_bf16() {
        let tensor = Tensor::new(array![crate::scalar::bf16::from_f32(1.0)], Device::Cpu).unwrap();
        assert!(matches!(
            materialize_host_array(&Value::Tensor(tensor), false),
            Err(Error::UnsupportedDtype {
                backend: Backend::HostArray,
                ..
            })
        ));
    }

    #[test]
    fn tensor_default_float_dtype() {
        let value = materialize_tensor(&Value::from(1.5), false, None).unwrap();
        assert_eq!(value.as_tensor().unwrap().dtype(), TensorDtype::Float);

        let value = materialize_tensor(&Value::list([1.5, 2.5]), true, None).unwrap();
        let tensor = value.as_tensor().unwrap();
        assert_eq!(tensor.dtype(), TensorDtype::Float);
        assert_eq!(tensor.data().shape(), &[2]);

        // arrays keep their dtype
        let value = materialize_tensor(&host(array![1.5_f64]), false, None).unwrap();
        assert_eq!(value.as_tensor().unwrap().dtype(), TensorDtype::Double);

        let value = materialize_tensor(&Value::from(3), false, None).unwrap();
        assert_eq!(value.as_tensor().unwrap().dtype(), TensorDtype::Long);
    }

    #[test]
    fn tensor_shares_host_buffer_and_places_on_device() {
        let original = host(array![1.0_f32, 2.0]);
        let value = materialize_tensor(&original, false, None).unwrap();
        let tensor = value.as_tensor().unwrap();
        assert_eq!(tensor.device(), Device::Cpu);
        assert!(tensor.data().shares_buffer(original.as_host().unwrap().data()));

        let value = materialize_tensor(&original, false, Some(Device::Cuda(1))).unwrap();
        let tensor = value.as_tensor().unwrap();
        assert_eq!(tensor.device(), Device::Cuda(1));
        assert_eq!(tensor.data(), original.as_host().unwrap().data());
    }

    #[test]
    fn stacked_tensors_keep_their_common_device() {
        let on_gpu = |data: ndarray::Array1<f32>| Value::from(Tensor::new(data, Device::Cuda(1)).unwrap());
        let data = Value::list([on_gpu(array![1.0_f32, 2.0]), on_gpu(array![3.0_f32, 4.0])]);
        let value = materialize_tensor(&data, true, None).unwrap();
        let tensor = value.as_tensor().unwrap();
        assert_eq!(tensor.data().shape(), &[2, 2]);
        assert_eq!(tensor.device(), Device::Cuda(1));

        let on_cpu = Value::from(Tensor::new(array![5.0_f32, 6.0], Device::Cpu).unwrap());
        let data = Value::list([on_gpu(array![1.0_f32, 2.0]), on_cpu]);
        let value = materialize_tensor(&data, true, None).unwrap();
        assert_eq!(value.as_tensor().unwrap().device(), Device::Cpu);
    }

    #[test]
    fn tensor_rejects_wide_unsigned_host_arrays() {
        assert!(matches!(
            materialize_tensor(&host(array![1_u32]), false, None),
            Err(Error::UnsupportedDtype {
                backend: Backend::Tensor,
                ..
            })
        ));
    }

    #[test]
    fn opaque_arrays_pass_through() {
        let strings = host(array!["a".to_string(), "b".to_string()]);
        assert_eq!(materialize_tensor(&strings, false, None).unwrap(), strings);
        assert_eq!(materialize_host_array(&strings, false).unwrap(), strings);
        let converter = Converter::new(Capabilities::all());
        let value = converter
            .materialize_accelerator_array(&strings, Some(HostDtype::Float32), true)
            .unwrap();
        assert_eq!(value, strings);

        let objects = host(array![Value::map([("k", 1)])]);
        assert_eq!(materialize_tensor(&objects, false, None).unwrap(), objects);
    }

    #[test]
    fn accelerator_rejects_non_numeric_leaves() {
        let converter = Converter::new(Capabilities::all());
        assert!(matches!(
            converter.materialize_accelerator_array(&Value::from("a"), None, true),
            Err(Error::UnconvertibleInput(_))
        ));
        assert!(matches!(
            converter.materialize_accelerator_array(&Value::None, Some(HostDtype::Float32), true),
            Err(Error::UnconvertibleInput(_))
        ));
    }

    #[test]
    fn accelerator_stacks_nested_lists_by_default() {
        let converter = Converter::new(Capabilities::all());
        let data = Value::map([("a", Value::list([1, 2, 3]))]);
        let value = converter
            .materialize_accelerator_array(&data, Some(HostDtype::Float32), true)
            .unwrap();
        let array = value.as_map().unwrap()["a"].as_accelerator().unwrap();
        assert_eq!(array.dtype(), HostDtype::Float32);
        assert_eq!(array.data().shape(), &[3]);
    }

    #[test]
    fn accelerator_is_identity_on_contiguous_arrays() {
        let converter = Converter::new(Capabilities::all());
        let original = AcceleratorArray::new(array![[1.0_f32, 2.0], [3.0, 4.0]]).unwrap();
        let value = converter
            .materialize_accelerator_array(&Value::from(original.clone()), Some(HostDtype::Float32), true)
            .unwrap();
        let array = value.as_accelerator().unwrap();
        assert_eq!(array.dtype(), HostDtype::Float32);
        assert!(array.data().shares_buffer(original.data()));
    }

    #[test]
    fn accelerator_unavailable() {
        let converter = Converter::new(Capabilities::host_only());
        assert!(matches!(
            converter.materialize_accelerator_array(&Value::from(1), None, true),
            Err(Error::BackendUnavailable(Backend::AcceleratorArray))
        ));
        let data = Value::from(1.0);
        let request = ConversionRequest::new(&data).backend(Backend::AcceleratorArray);
        assert!(matches!(
            converter.convert(request),
            Err(Error::BackendUnavailable(Backend::AcceleratorArray))
        ));
    }

    #[test]
    fn stacking_requires_uniform_numeric_content() {
        let mixed = Value::list([Value::from(1), Value::from("a")]);
        let value = materialize_host_array(&mixed, true).unwrap();
        let items = value.as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_host().unwrap().dtype(), HostDtype::Int64);
        assert_eq!(items[1], Value::from("a"));

        let ragged = Value::list([Value::list([1, 2]), Value::list([3])]);
        let value = materialize_host_array(&ragged, true).unwrap();
        assert_eq!(value.tag(), crate::value::Tag::List);

        let nested = Value::list([Value::list([1, 2]), Value::tuple([3, 4])]);
        let value = materialize_host_array(&nested, true).unwrap();
        assert_eq!(value.as_host().unwrap().data().shape(), &[2, 2]);
    }

    #[test]
    fn nested_lists_are_not_stacked_by_host_and_tensor() {
        let data = Value::map([("a", Value::list([1, 2]))]);
        let value = materialize_host_array(&data, true).unwrap();
        let inner = value.as_map().unwrap()["a"].as_sequence().unwrap();
        assert_eq!(inner.len(), 2);
        assert!(inner.iter().all(|v| v.as_host().unwrap().data().ndim() == 0));
    }

    #[test]
    fn convert_opaque_data_without_target_fails() {
        let converter = Converter::new(Capabilities::all());
        let data = Value::from(1.0);
        assert!(matches!(
            converter.convert(ConversionRequest::new(&data)),
            Err(Error::UnsupportedOutputType(Backend::Opaque))
        ));
        let data = host(array![1.0_f32]);
        let request = ConversionRequest::new(&data).backend(Backend::Opaque);
        assert!(matches!(
            converter.convert(request),
            Err(Error::UnsupportedOutputType(Backend::Opaque))
        ));
    }

    #[test]
    fn convert_resolves_dtype_in_target_space() {
        let converter = Converter::new(Capabilities::all());
        let data = host(array![1_i32, 2]);
        let result = converter
            .convert(ConversionRequest::new(&data).backend(Backend::Tensor))
            .unwrap();
        assert_eq!(result.original_backend, Backend::HostArray);
        assert_eq!(result.original_device, None);
        assert_eq!(result.value.as_tensor().unwrap().dtype(), TensorDtype::Int);

        // a tensor dtype is translated for a host target
        let result = converter
            .convert(ConversionRequest::new(&data).dtype(TensorDtype::Double))
            .unwrap();
        assert_eq!(result.value.as_host().unwrap().dtype(), HostDtype::Float64);

        // native floats convert to 64-bit tensors through the orchestrator
        let data = Value::from(0.5);
        let result = converter
            .convert(ConversionRequest::new(&data).backend(Backend::Tensor))
            .unwrap();
        assert_eq!(result.value.as_tensor().unwrap().dtype(), TensorDtype::Double);
    }

    #[test]
    fn convert_stacks_lists_on_request() {
        let converter = Converter::new(Capabilities::all());
        let data = Value::list([1.0, 2.0, 3.0]);
        let request = ConversionRequest::new(&data).backend(Backend::HostArray);
        let result = converter.convert(request).unwrap();
        assert_eq!(result.value.as_sequence().unwrap().len(), 3);

        let result = converter.convert(request.wrap_sequence(true)).unwrap();
        let array = result.value.as_host().unwrap();
        assert_eq!(array.data().shape(), &[3]);
        assert_eq!(array.dtype(), HostDtype::Float64);
        assert_eq!(result.original_backend, Backend::Opaque);
    }

    #[test]
    fn convert_explicit_non_numeric_dtype_fails() {
        let converter = Converter::new(Capabilities::all());
        let data = host(array![1_i32]);
        assert!(converter
            .convert(ConversionRequest::new(&data).dtype(HostDtype::Str))
            .is_err());
        assert!(converter
            .convert(
                ConversionRequest::new(&data)
                    .backend(Backend::Tensor)
                    .dtype(HostDtype::UInt16)
            )
            .is_err());
    }
}
