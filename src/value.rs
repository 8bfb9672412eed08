//! Module for [`Value`] and related types.
//!
//! [`Value`] is a type-erased value that can hold native scalars, strings, arrays of any backend, and arbitrarily
//! nested lists, tuples and maps of those. It is the input and output type of every conversion.

use indexmap::IndexMap;

use crate::backend::{AcceleratorArray, Backend, Device, HostArray, Tensor};
use crate::dtype::{Dtype, NativeType};

/// A tag indicating the type of the value stored in a [`Value`].
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Tag {
    /// Tag for an empty value.
    None,
    /// Tag for value `bool`.
    Bool,
    /// Tag for value `i64`.
    Int,
    /// Tag for value `f64`.
    Float,
    /// Tag for value `String`.
    Str,
    /// Tag for value [`HostArray`].
    HostArray,
    /// Tag for value [`Tensor`].
    Tensor,
    /// Tag for value [`AcceleratorArray`].
    AcceleratorArray,
    /// Tag for a list of values.
    List,
    /// Tag for a tuple of values.
    Tuple,
    /// Tag for a map from strings to values.
    Map,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Arbitrary, possibly nested, data.
///
/// Lists and tuples are both ordered sequences; they are kept apart so that a conversion returns a tuple where it
/// was given one. Maps keep their insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    None,
    /// A native boolean.
    Bool(bool),
    /// A native integer.
    Int(i64),
    /// A native float.
    Float(f64),
    /// A string.
    Str(String),
    /// An array in host memory.
    Host(HostArray),
    /// A tensor.
    Tensor(Tensor),
    /// An array in accelerator memory.
    Accelerator(AcceleratorArray),
    /// An ordered list.
    List(Vec<Value>),
    /// An ordered, fixed length tuple.
    Tuple(Vec<Value>),
    /// A map from strings to values, in insertion order.
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Create a tuple from an iterator of values.
    pub fn tuple(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Create a list from an iterator of values.
    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Create a map from an iterator of key value pairs.
    pub fn map<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Get the type of the value.
    pub fn tag(&self) -> Tag {
        match self {
            Value::None => Tag::None,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Float,
            Value::Str(_) => Tag::Str,
            Value::Host(_) => Tag::HostArray,
            Value::Tensor(_) => Tag::Tensor,
            Value::Accelerator(_) => Tag::AcceleratorArray,
            Value::List(_) => Tag::List,
            Value::Tuple(_) => Tag::Tuple,
            Value::Map(_) => Tag::Map,
        }
    }

    /// The backend the value is native to, [`Backend::Opaque`] for anything but arrays and tensors.
    pub fn backend(&self) -> Backend {
        match self {
            Value::Host(_) => Backend::HostArray,
            Value::Tensor(_) => Backend::Tensor,
            Value::Accelerator(_) => Backend::AcceleratorArray,
            _ => Backend::Opaque,
        }
    }

    /// The device the value resides on, for device aware backends.
    pub fn device(&self) -> Option<Device> {
        match self {
            Value::Tensor(tensor) => Some(tensor.device()),
            Value::Accelerator(array) => Some(array.device()),
            _ => None,
        }
    }

    /// Get the element type of the value.
    ///
    /// Arrays and tensors report their own dtype. Lists and tuples report the dtype of their first element, which
    /// assumes all their elements share a type; a mixed sequence is described by its first element only. Anything
    /// else reports its [`NativeType`].
    pub fn dtype(&self) -> Dtype {
        match self {
            Value::Host(array) => Dtype::Host(array.dtype()),
            Value::Tensor(tensor) => Dtype::Tensor(tensor.dtype()),
            Value::Accelerator(array) => Dtype::Host(array.dtype()),
            Value::List(items) | Value::Tuple(items) => items
                .first()
                .map(Value::dtype)
                .unwrap_or(Dtype::Native(NativeType::Sequence)),
            Value::None => Dtype::Native(NativeType::None),
            Value::Bool(_) => Dtype::Native(NativeType::Bool),
            Value::Int(_) => Dtype::Native(NativeType::Int),
            Value::Float(_) => Dtype::Native(NativeType::Float),
            Value::Str(_) => Dtype::Native(NativeType::Str),
            Value::Map(_) => Dtype::Native(NativeType::Map),
        }
    }

    /// Get a reference to the value as a host array, if it is one.
    pub fn as_host(&self) -> Option<&HostArray> {
        match self {
            Value::Host(array) => Some(array),
            _ => None,
        }
    }

    /// Get a reference to the value as a tensor, if it is one.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Get a reference to the value as an accelerator array, if it is one.
    pub fn as_accelerator(&self) -> Option<&AcceleratorArray> {
        match self {
            Value::Accelerator(array) => Some(array),
            _ => None,
        }
    }

    /// Get the elements of a list or a tuple.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Get a reference to the value as a map, if it is one.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Classify the backend of arbitrary data.
pub fn classify_backend(value: &Value) -> Backend {
    value.backend()
}

/// Classify the element type of arbitrary data, see [`Value::dtype`].
pub fn classify_dtype(value: &Value) -> Dtype {
    value.dtype()
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    f32 => Float,
    String => Str,
    &str => Str,
    HostArray => Host,
    Tensor => Tensor,
    AcceleratorArray => Accelerator,
    Vec<Value> => List,
    IndexMap<String, Value> => Map,
);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::dtype::{HostDtype, TensorDtype};

    #[test]
    fn tags_and_backends() {
        let host = Value::from(HostArray::new(array![1.0_f32]).unwrap());
        assert_eq!(host.tag(), Tag::HostArray);
        assert_eq!(host.backend(), Backend::HostArray);
        assert_eq!(host.device(), None);

        let tensor = Value::from(Tensor::new(array![1_i64], Device::Cuda(2)).unwrap());
        assert_eq!(tensor.backend(), Backend::Tensor);
        assert_eq!(tensor.device(), Some(Device::Cuda(2)));

        let accel = Value::from(AcceleratorArray::new(array![1_u8]).unwrap());
        assert_eq!(classify_backend(&accel), Backend::AcceleratorArray);
        assert_eq!(accel.device(), Some(Device::Cuda(0)));

        for value in [
            Value::from(1.5),
            Value::from("a"),
            Value::list([1, 2]),
            Value::None,
        ] {
            assert_eq!(value.backend(), Backend::Opaque);
        }
    }

    #[test]
    fn dtype_of_arrays() {
        let host = Value::from(HostArray::new(array![1_u16]).unwrap());
        assert_eq!(classify_dtype(&host), Dtype::Host(HostDtype::UInt16));
        let tensor = Value::from(Tensor::new(array![1.0_f64], Device::Cpu).unwrap());
        assert_eq!(classify_dtype(&tensor), Dtype::Tensor(TensorDtype::Double));
    }

    #[test]
    fn dtype_of_sequences_peeks_at_first_element() {
        let tensor = Tensor::new(array![1_i32], Device::Cpu).unwrap();
        let value = Value::list([Value::from(tensor), Value::from(2.5)]);
        assert_eq!(value.dtype(), Dtype::Tensor(TensorDtype::Int));

        let nested = Value::tuple([Value::list([true, false])]);
        assert_eq!(nested.dtype(), Dtype::Native(NativeType::Bool));

        // only the first element is looked at
        let mixed = Value::list([Value::from(1), Value::from("a")]);
        assert_eq!(mixed.dtype(), Dtype::Native(NativeType::Int));

        assert_eq!(
            Value::List(Vec::new()).dtype(),
            Dtype::Native(NativeType::Sequence)
        );
    }

    #[test]
    fn dtype_of_scalars() {
        assert_eq!(Value::from(1.0).dtype(), Dtype::Native(NativeType::Float));
        assert_eq!(Value::from("x").dtype(), Dtype::Native(NativeType::Str));
        assert_eq!(
            Value::map([("a", 1)]).dtype(),
            Dtype::Native(NativeType::Map)
        );
        assert_eq!(Value::None.dtype(), Dtype::Native(NativeType::None));
    }

    #[test]
    fn maps_keep_insertion_order() {
        let value = Value::map([("z", 1), ("a", 2), ("m", 3)]);
        let keys: Vec<_> = value.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
