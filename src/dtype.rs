//! Element types (dtypes) of the different backends and the equivalence tables between them.
//!
//! Each backend names its element types in its own vocabulary: host and accelerator arrays use [`HostDtype`],
//! tensors use [`TensorDtype`]. Native scalars (a plain `bool`, `i64`, `f64`, a string, ...) carry no numeric dtype
//! at all and are described by a [`NativeType`]. The [`Dtype`] enum wraps any of the three.
//!
//! The [`DtypeRegistry`] is a bijection between the tensor dtypes and the host dtypes that both backends support:
//! boolean, signed 8/16/32/64-bit integers, unsigned 8-bit integers, 16/32/64-bit floats and 64/128-bit complex
//! numbers. Any other dtype fails the lookup with [`Error::UnsupportedDtype`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::backend::Backend;
use crate::{Error, Result};

/// Element types of host arrays and accelerator arrays.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HostDtype {
    /// Boolean, `bool`
    Bool,
    /// 8-bit signed integer, `i8`
    Int8,
    /// 16-bit signed integer, `i16`
    Int16,
    /// 32-bit signed integer, `i32`
    Int32,
    /// 64-bit signed integer, `i64`
    Int64,
    /// 8-bit unsigned integer, `u8`
    UInt8,
    /// 16-bit unsigned integer, `u16`
    UInt16,
    /// 32-bit unsigned integer, `u32`
    UInt32,
    /// 64-bit unsigned integer, `u64`
    UInt64,
    /// 16-bit floating point, [`f16`](crate::scalar::f16)
    Float16,
    /// 32-bit floating point, `f32`
    Float32,
    /// 64-bit floating point, `f64`
    Float64,
    /// Complex number made of two 32-bit floats, [`Complex<f32>`](crate::scalar::Complex)
    Complex64,
    /// Complex number made of two 64-bit floats, [`Complex<f64>`](crate::scalar::Complex)
    Complex128,
    /// String storage, `String`
    Str,
    /// Generic object storage, [`Value`](crate::value::Value)
    Object,
}

impl HostDtype {
    /// Whether the dtype holds numbers, as opposed to strings or generic objects.
    pub fn is_numeric(self) -> bool {
        !matches!(self, HostDtype::Str | HostDtype::Object)
    }

    /// The canonical name of the dtype.
    pub fn name(self) -> &'static str {
        match self {
            HostDtype::Bool => "bool",
            HostDtype::Int8 => "int8",
            HostDtype::Int16 => "int16",
            HostDtype::Int32 => "int32",
            HostDtype::Int64 => "int64",
            HostDtype::UInt8 => "uint8",
            HostDtype::UInt16 => "uint16",
            HostDtype::UInt32 => "uint32",
            HostDtype::UInt64 => "uint64",
            HostDtype::Float16 => "float16",
            HostDtype::Float32 => "float32",
            HostDtype::Float64 => "float64",
            HostDtype::Complex64 => "complex64",
            HostDtype::Complex128 => "complex128",
            HostDtype::Str => "str",
            HostDtype::Object => "object",
        }
    }
}

impl fmt::Display for HostDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses any of the host backend's dtype spellings.
///
/// Canonical names (`"float32"`), array-protocol descriptors with or without a byte order prefix (`"f4"`, `"<f4"`,
/// `"|b1"`, `"<U5"`) and single character codes (`"f"`, `"?"`, `"O"`) all normalize to the same tag.
impl FromStr for HostDtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let descr = s.trim_start_matches(['<', '>', '=', '|']);
        let dtype = match descr {
            "bool" | "?" | "b1" => HostDtype::Bool,
            "int8" | "i1" | "b" => HostDtype::Int8,
            "int16" | "i2" | "h" => HostDtype::Int16,
            "int32" | "i4" | "i" => HostDtype::Int32,
            "int64" | "i8" | "l" | "q" | "int" => HostDtype::Int64,
            "uint8" | "u1" | "B" => HostDtype::UInt8,
            "uint16" | "u2" | "H" => HostDtype::UInt16,
            "uint32" | "u4" | "I" => HostDtype::UInt32,
            "uint64" | "u8" | "L" | "Q" => HostDtype::UInt64,
            "float16" | "f2" | "e" | "half" => HostDtype::Float16,
            "float32" | "f4" | "f" | "single" => HostDtype::Float32,
            "float64" | "f8" | "d" | "double" | "float" => HostDtype::Float64,
            "complex64" | "c8" | "F" => HostDtype::Complex64,
            "complex128" | "c16" | "D" | "complex" => HostDtype::Complex128,
            "object" | "O" => HostDtype::Object,
            "str" | "bytes" => HostDtype::Str,
            _ if is_flexible_descr(descr) => HostDtype::Str,
            _ => return Err(Error::unsupported_dtype(s, Backend::HostArray)),
        };
        Ok(dtype)
    }
}

/// `U`, `S` or `a` followed by an optional item count, e.g. `U5`.
fn is_flexible_descr(descr: &str) -> bool {
    let mut chars = descr.chars();
    matches!(chars.next(), Some('U' | 'S' | 'a')) && chars.all(|c| c.is_ascii_digit())
}

/// Element types of tensors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TensorDtype {
    /// Boolean, `bool`
    Bool,
    /// 8-bit unsigned integer, `u8`
    Byte,
    /// 8-bit signed integer, `i8`
    Char,
    /// 16-bit signed integer, `i16`
    Short,
    /// 32-bit signed integer, `i32`
    Int,
    /// 64-bit signed integer, `i64`
    Long,
    /// 16-bit floating point, [`f16`](crate::scalar::f16)
    Half,
    /// 16-bit floating point using the bfloat16 format, [`bf16`](crate::scalar::bf16)
    BFloat16,
    /// 32-bit floating point, `f32`
    Float,
    /// 64-bit floating point, `f64`
    Double,
    /// 32-bit complex floating point, [`Complex<f32>`](crate::scalar::Complex)
    ComplexFloat,
    /// 64-bit complex floating point, [`Complex<f64>`](crate::scalar::Complex)
    ComplexDouble,
}

impl TensorDtype {
    /// The dtype native floats are materialized with.
    pub const DEFAULT_FLOAT: TensorDtype = TensorDtype::Float;

    /// The canonical name of the dtype.
    pub fn name(self) -> &'static str {
        match self {
            TensorDtype::Bool => "bool",
            TensorDtype::Byte => "uint8",
            TensorDtype::Char => "int8",
            TensorDtype::Short => "int16",
            TensorDtype::Int => "int32",
            TensorDtype::Long => "int64",
            TensorDtype::Half => "float16",
            TensorDtype::BFloat16 => "bfloat16",
            TensorDtype::Float => "float32",
            TensorDtype::Double => "float64",
            TensorDtype::ComplexFloat => "complex64",
            TensorDtype::ComplexDouble => "complex128",
        }
    }
}

impl fmt::Display for TensorDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor.{}", self.name())
    }
}

/// The type of a value that has no intrinsic numeric dtype.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NativeType {
    /// The absence of a value.
    None,
    /// A native boolean.
    Bool,
    /// A native integer.
    Int,
    /// A native float.
    Float,
    /// A string.
    Str,
    /// An empty list or tuple, whose element type can not be inferred.
    Sequence,
    /// A mapping.
    Map,
}

impl NativeType {
    /// The host dtype that a host array built from a value of this type would have.
    ///
    /// This is how a bare type is normalized before a registry lookup, so that `f64` and `HostDtype::Float64` are
    /// treated alike.
    pub fn host_dtype(self) -> HostDtype {
        match self {
            NativeType::Bool => HostDtype::Bool,
            NativeType::Int => HostDtype::Int64,
            NativeType::Float => HostDtype::Float64,
            NativeType::Str => HostDtype::Str,
            NativeType::None | NativeType::Sequence | NativeType::Map => HostDtype::Object,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::None => "none",
            NativeType::Bool => "bool",
            NativeType::Int => "int",
            NativeType::Float => "float",
            NativeType::Str => "str",
            NativeType::Sequence => "sequence",
            NativeType::Map => "map",
        };
        f.write_str(name)
    }
}

/// A dtype in any backend's vocabulary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Dtype {
    /// A host or accelerator array dtype.
    Host(HostDtype),
    /// A tensor dtype.
    Tensor(TensorDtype),
    /// The type of a value without a numeric dtype.
    Native(NativeType),
}

impl Dtype {
    /// The dtype in host notation, translating tensor dtypes and normalizing native types.
    pub fn to_host(self) -> Result<HostDtype> {
        match self {
            Dtype::Host(dtype) => Ok(dtype),
            Dtype::Tensor(dtype) => dtype_tensor_to_host(dtype),
            Dtype::Native(native) => Ok(native.host_dtype()),
        }
    }

    /// The dtype in tensor notation, translating host dtypes and normalizing native types.
    pub fn to_tensor(self) -> Result<TensorDtype> {
        match self {
            Dtype::Tensor(dtype) => Ok(dtype),
            Dtype::Host(dtype) => dtype_host_to_tensor(dtype),
            Dtype::Native(native) => dtype_host_to_tensor(native.host_dtype()),
        }
    }
}

impl From<HostDtype> for Dtype {
    fn from(dtype: HostDtype) -> Self {
        Dtype::Host(dtype)
    }
}

impl From<TensorDtype> for Dtype {
    fn from(dtype: TensorDtype) -> Self {
        Dtype::Tensor(dtype)
    }
}

impl From<NativeType> for Dtype {
    fn from(dtype: NativeType) -> Self {
        Dtype::Native(dtype)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Host(dtype) => fmt::Display::fmt(dtype, f),
            Dtype::Tensor(dtype) => fmt::Display::fmt(dtype, f),
            Dtype::Native(dtype) => fmt::Display::fmt(dtype, f),
        }
    }
}

const EQUIVALENCES: [(TensorDtype, HostDtype); 11] = [
    (TensorDtype::Bool, HostDtype::Bool),
    (TensorDtype::Byte, HostDtype::UInt8),
    (TensorDtype::Char, HostDtype::Int8),
    (TensorDtype::Short, HostDtype::Int16),
    (TensorDtype::Int, HostDtype::Int32),
    (TensorDtype::Long, HostDtype::Int64),
    (TensorDtype::Half, HostDtype::Float16),
    (TensorDtype::Float, HostDtype::Float32),
    (TensorDtype::Double, HostDtype::Float64),
    (TensorDtype::ComplexFloat, HostDtype::Complex64),
    (TensorDtype::ComplexDouble, HostDtype::Complex128),
];

/// Bidirectional lookup tables between tensor dtypes and host dtypes.
///
/// Built once, on first use, and immutable afterwards; concurrent lookups need no locking.
#[derive(Debug)]
pub struct DtypeRegistry {
    tensor_to_host: HashMap<TensorDtype, HostDtype>,
    host_to_tensor: HashMap<HostDtype, TensorDtype>,
}

impl DtypeRegistry {
    fn new() -> Self {
        let tensor_to_host: HashMap<_, _> = EQUIVALENCES.into_iter().collect();
        let host_to_tensor = tensor_to_host.iter().map(|(t, h)| (*h, *t)).collect();
        Self {
            tensor_to_host,
            host_to_tensor,
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static DtypeRegistry {
        static REGISTRY: OnceLock<DtypeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DtypeRegistry::new)
    }

    /// Get the host equivalent of a tensor dtype.
    pub fn tensor_to_host(&self, dtype: TensorDtype) -> Result<HostDtype> {
        self.tensor_to_host.get(&dtype).copied().ok_or_else(|| {
            log::error!("Unsupported tensor to host dtype '{dtype}'");
            Error::unsupported_dtype(dtype, Backend::HostArray)
        })
    }

    /// Get the tensor equivalent of a host dtype.
    pub fn host_to_tensor(&self, dtype: HostDtype) -> Result<TensorDtype> {
        self.host_to_tensor.get(&dtype).copied().ok_or_else(|| {
            log::error!("Unsupported host to tensor dtype '{dtype}'");
            Error::unsupported_dtype(dtype, Backend::Tensor)
        })
    }

    /// All the tensor dtypes that have a host equivalent.
    pub fn supported(&self) -> impl Iterator<Item = (TensorDtype, HostDtype)> + '_ {
        EQUIVALENCES.iter().copied()
    }
}

/// Convert a tensor dtype to its host equivalent.
pub fn dtype_tensor_to_host(dtype: TensorDtype) -> Result<HostDtype> {
    DtypeRegistry::global().tensor_to_host(dtype)
}

/// Convert a host dtype to its tensor equivalent.
pub fn dtype_host_to_tensor(dtype: HostDtype) -> Result<TensorDtype> {
    DtypeRegistry::global().host_to_tensor(dtype)
}

/// Convert a dtype to the one that corresponds to `backend`.
///
/// For the tensor backend, tensor dtypes are returned as is while host dtypes and native types are normalized and
/// translated. For any other backend tensor dtypes are translated to host dtypes and everything else is returned
/// unchanged.
///
/// ```
/// use tensor_interop::backend::Backend;
/// use tensor_interop::dtype::{equivalent_dtype, Dtype, HostDtype, TensorDtype};
///
/// let dtype = equivalent_dtype(HostDtype::Float32, Backend::Tensor).unwrap();
/// assert_eq!(dtype, Dtype::Tensor(TensorDtype::Float));
/// ```
pub fn equivalent_dtype(dtype: impl Into<Dtype>, backend: Backend) -> Result<Dtype> {
    let dtype = dtype.into();
    Ok(match (backend, dtype) {
        (Backend::Tensor, dtype) => Dtype::Tensor(dtype.to_tensor()?),
        (_, Dtype::Tensor(dtype)) => Dtype::Host(dtype_tensor_to_host(dtype)?),
        (_, dtype) => dtype,
    })
}
