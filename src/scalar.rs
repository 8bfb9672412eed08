//! Element types that can be stored in arrays and tensors.
//!
//! Half precision floating point types come from the `half` crate and complex numbers from the `num-complex`
//! crate. The [`Element`] trait ties each Rust element type to its dtype in every backend.

use ndarray::{ArcArray, IxDyn};

pub use half::{bf16, f16};
pub use num_complex::Complex;

use crate::array::ArrayData;
use crate::dtype::{HostDtype, TensorDtype};
use crate::value::Value;

/// A trait for types that can be used as elements of arrays and tensors.
pub trait Element: Clone + std::fmt::Debug + PartialEq + 'static {
    /// The host dtype of the implementing type, if host arrays can store it.
    const HOST_DTYPE: Option<HostDtype>;
    /// The tensor dtype of the implementing type, if tensors can store it.
    const TENSOR_DTYPE: Option<TensorDtype>;

    /// Wrap a typed array into the type-erased [`ArrayData`].
    fn into_data(array: ArcArray<Self, IxDyn>) -> ArrayData;

    /// Get the typed array out of an [`ArrayData`], if it holds elements of the implementing type.
    fn from_data(data: &ArrayData) -> Option<&ArcArray<Self, IxDyn>>;

    private_decl! {}
}

macro_rules! impl_element {
    ($rust_type:ty, $variant:ident, $host:expr, $tensor:expr) => {
        impl Element for $rust_type {
            const HOST_DTYPE: Option<HostDtype> = $host;
            const TENSOR_DTYPE: Option<TensorDtype> = $tensor;

            fn into_data(array: ArcArray<Self, IxDyn>) -> ArrayData {
                ArrayData::$variant(array)
            }

            fn from_data(data: &ArrayData) -> Option<&ArcArray<Self, IxDyn>> {
                match data {
                    ArrayData::$variant(array) => Some(array),
                    _ => None,
                }
            }

            private_impl! {}
        }
    };
}

impl_element!(bool, Bool, Some(HostDtype::Bool), Some(TensorDtype::Bool));
impl_element!(u8, UInt8, Some(HostDtype::UInt8), Some(TensorDtype::Byte));
impl_element!(i8, Int8, Some(HostDtype::Int8), Some(TensorDtype::Char));
impl_element!(i16, Int16, Some(HostDtype::Int16), Some(TensorDtype::Short));
impl_element!(i32, Int32, Some(HostDtype::Int32), Some(TensorDtype::Int));
impl_element!(i64, Int64, Some(HostDtype::Int64), Some(TensorDtype::Long));
impl_element!(u16, UInt16, Some(HostDtype::UInt16), None);
impl_element!(u32, UInt32, Some(HostDtype::UInt32), None);
impl_element!(u64, UInt64, Some(HostDtype::UInt64), None);
impl_element!(f16, Float16, Some(HostDtype::Float16), Some(TensorDtype::Half));
impl_element!(bf16, BFloat16, None, Some(TensorDtype::BFloat16));
impl_element!(f32, Float32, Some(HostDtype::Float32), Some(TensorDtype::Float));
impl_element!(f64, Float64, Some(HostDtype::Float64), Some(TensorDtype::Double));
impl_element!(
    Complex<f32>,
    Complex64,
    Some(HostDtype::Complex64),
    Some(TensorDtype::ComplexFloat)
);
impl_element!(
    Complex<f64>,
    Complex128,
    Some(HostDtype::Complex128),
    Some(TensorDtype::ComplexDouble)
);
impl_element!(String, Str, Some(HostDtype::Str), None);
impl_element!(Value, Object, Some(HostDtype::Object), None);

/// The widest representation of a single number, used as the pivot of element casts.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Number {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(Complex<f64>),
}

impl Number {
    fn is_nonzero(self) -> bool {
        match self {
            Number::Bool(b) => b,
            Number::Int(i) => i != 0,
            Number::UInt(u) => u != 0,
            Number::Float(f) => f != 0.0,
            Number::Complex(c) => c.re != 0.0 || c.im != 0.0,
        }
    }

    /// Real part as a float; the imaginary part of a complex number is discarded.
    fn as_f64(self) -> f64 {
        match self {
            Number::Bool(b) => b as u8 as f64,
            Number::Int(i) => i as f64,
            Number::UInt(u) => u as f64,
            Number::Float(f) => f,
            Number::Complex(c) => c.re,
        }
    }
}

/// Numeric element types, castable into each other through [`Number`].
///
/// Float to integer casts truncate toward zero and saturate, integer casts wrap, and casts from complex keep the real
/// part.
pub(crate) trait NumElement: Element + Copy {
    fn to_number(self) -> Number;
    fn from_number(number: Number) -> Self;
}

impl NumElement for bool {
    fn to_number(self) -> Number {
        Number::Bool(self)
    }
    fn from_number(number: Number) -> Self {
        number.is_nonzero()
    }
}

macro_rules! impl_num_int {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl NumElement for $t {
                fn to_number(self) -> Number {
                    Number::$variant(self as _)
                }
                fn from_number(number: Number) -> Self {
                    match number {
                        Number::Bool(b) => b as $t,
                        Number::Int(i) => i as $t,
                        Number::UInt(u) => u as $t,
                        Number::Float(f) => f as $t,
                        Number::Complex(c) => c.re as $t,
                    }
                }
            }
        )*
    };
}

impl_num_int!(
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => UInt, u16 => UInt, u32 => UInt, u64 => UInt
);

macro_rules! impl_num_half {
    ($($t:ty),*) => {
        $(
            impl NumElement for $t {
                fn to_number(self) -> Number {
                    Number::Float(self.to_f64())
                }
                fn from_number(number: Number) -> Self {
                    <$t>::from_f64(number.as_f64())
                }
            }
        )*
    };
}

impl_num_half!(f16, bf16);

impl NumElement for f32 {
    fn to_number(self) -> Number {
        Number::Float(self as f64)
    }
    fn from_number(number: Number) -> Self {
        number.as_f64() as f32
    }
}

impl NumElement for f64 {
    fn to_number(self) -> Number {
        Number::Float(self)
    }
    fn from_number(number: Number) -> Self {
        number.as_f64()
    }
}

impl NumElement for Complex<f32> {
    fn to_number(self) -> Number {
        Number::Complex(Complex::new(self.re as f64, self.im as f64))
    }
    fn from_number(number: Number) -> Self {
        match number {
            Number::Complex(c) => Complex::new(c.re as f32, c.im as f32),
            other => Complex::new(other.as_f64() as f32, 0.0),
        }
    }
}

impl NumElement for Complex<f64> {
    fn to_number(self) -> Number {
        Number::Complex(self)
    }
    fn from_number(number: Number) -> Self {
        match number {
            Number::Complex(c) => c,
            other => Complex::new(other.as_f64(), 0.0),
        }
    }
}
