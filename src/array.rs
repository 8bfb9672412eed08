//! Type-erased n-dimensional storage shared by all backends.
//!
//! [`ArrayData`] holds an [`ndarray::ArcArray`] of any [`Element`] type. The arrays are reference counted, so
//! passing data between backends without a dtype change or a layout fix does not copy the buffer, and two values
//! that share a buffer can be recognized with [`ArrayData::shares_buffer`].

use ndarray::{ArcArray, Array, ArrayView, Axis, Dimension, IxDyn};

use crate::backend::Backend;
use crate::dtype::{HostDtype, TensorDtype};
use crate::scalar::{bf16, f16, Complex, Element, NumElement};
use crate::value::Value;
use crate::{Error, Result};

/// An n-dimensional array of any supported element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// `bool` elements
    Bool(ArcArray<bool, IxDyn>),
    /// `u8` elements
    UInt8(ArcArray<u8, IxDyn>),
    /// `i8` elements
    Int8(ArcArray<i8, IxDyn>),
    /// `i16` elements
    Int16(ArcArray<i16, IxDyn>),
    /// `i32` elements
    Int32(ArcArray<i32, IxDyn>),
    /// `i64` elements
    Int64(ArcArray<i64, IxDyn>),
    /// `u16` elements
    UInt16(ArcArray<u16, IxDyn>),
    /// `u32` elements
    UInt32(ArcArray<u32, IxDyn>),
    /// `u64` elements
    UInt64(ArcArray<u64, IxDyn>),
    /// [`f16`] elements
    Float16(ArcArray<f16, IxDyn>),
    /// [`bf16`] elements
    BFloat16(ArcArray<bf16, IxDyn>),
    /// `f32` elements
    Float32(ArcArray<f32, IxDyn>),
    /// `f64` elements
    Float64(ArcArray<f64, IxDyn>),
    /// [`Complex<f32>`] elements
    Complex64(ArcArray<Complex<f32>, IxDyn>),
    /// [`Complex<f64>`] elements
    Complex128(ArcArray<Complex<f64>, IxDyn>),
    /// `String` elements
    Str(ArcArray<String, IxDyn>),
    /// Generic [`Value`] elements
    Object(ArcArray<Value, IxDyn>),
}

/// Evaluate `$body` with `$a` bound to the inner array, whatever the element type.
macro_rules! with_array {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($a) => $body,
            ArrayData::UInt8($a) => $body,
            ArrayData::Int8($a) => $body,
            ArrayData::Int16($a) => $body,
            ArrayData::Int32($a) => $body,
            ArrayData::Int64($a) => $body,
            ArrayData::UInt16($a) => $body,
            ArrayData::UInt32($a) => $body,
            ArrayData::UInt64($a) => $body,
            ArrayData::Float16($a) => $body,
            ArrayData::BFloat16($a) => $body,
            ArrayData::Float32($a) => $body,
            ArrayData::Float64($a) => $body,
            ArrayData::Complex64($a) => $body,
            ArrayData::Complex128($a) => $body,
            ArrayData::Str($a) => $body,
            ArrayData::Object($a) => $body,
        }
    };
}

/// Like [`with_array`], but `$body` yields a new array of the same element type.
macro_rules! map_array {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($a) => ArrayData::Bool($body),
            ArrayData::UInt8($a) => ArrayData::UInt8($body),
            ArrayData::Int8($a) => ArrayData::Int8($body),
            ArrayData::Int16($a) => ArrayData::Int16($body),
            ArrayData::Int32($a) => ArrayData::Int32($body),
            ArrayData::Int64($a) => ArrayData::Int64($body),
            ArrayData::UInt16($a) => ArrayData::UInt16($body),
            ArrayData::UInt32($a) => ArrayData::UInt32($body),
            ArrayData::UInt64($a) => ArrayData::UInt64($body),
            ArrayData::Float16($a) => ArrayData::Float16($body),
            ArrayData::BFloat16($a) => ArrayData::BFloat16($body),
            ArrayData::Float32($a) => ArrayData::Float32($body),
            ArrayData::Float64($a) => ArrayData::Float64($body),
            ArrayData::Complex64($a) => ArrayData::Complex64($body),
            ArrayData::Complex128($a) => ArrayData::Complex128($body),
            ArrayData::Str($a) => ArrayData::Str($body),
            ArrayData::Object($a) => ArrayData::Object($body),
        }
    };
}

impl ArrayData {
    /// Create a rank-0 array holding a single element.
    pub fn from_elem<A: Element>(elem: A) -> Self {
        A::into_data(ArcArray::from_elem(IxDyn(&[]), elem))
    }

    /// Create a rank-1 array from a vector of elements.
    pub fn from_vec<A: Element>(elems: Vec<A>) -> Self {
        A::into_data(Array::from_vec(elems).into_dyn().into_shared())
    }

    /// Get the typed array if the elements are of type `A`.
    pub fn as_typed<A: Element>(&self) -> Option<&ArcArray<A, IxDyn>> {
        A::from_data(self)
    }

    /// Get a typed view of the array if the elements are of type `A`.
    pub fn view<A: Element>(&self) -> Option<ArrayView<'_, A, IxDyn>> {
        self.as_typed::<A>().map(|array| array.view())
    }

    /// The element dtype in host notation, or `None` for element types host arrays can not store.
    pub fn host_dtype(&self) -> Option<HostDtype> {
        with_array!(self, a => element_host_dtype(a))
    }

    /// The element dtype in tensor notation, or `None` for element types tensors can not store.
    pub fn tensor_dtype(&self) -> Option<TensorDtype> {
        with_array!(self, a => element_tensor_dtype(a))
    }

    /// Name of the element type, for messages.
    pub fn dtype_name(&self) -> &'static str {
        match (self.host_dtype(), self.tensor_dtype()) {
            (Some(dtype), _) => dtype.name(),
            (None, Some(dtype)) => dtype.name(),
            (None, None) => unreachable!("every element type has a dtype in some backend"),
        }
    }

    /// Whether the elements are numbers, as opposed to strings or generic objects.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ArrayData::Str(_) | ArrayData::Object(_))
    }

    /// The shape of the array.
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// The number of dimensions of the array.
    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    /// The total number of elements.
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the elements are laid out in standard (row major) order without gaps.
    pub fn is_contiguous(&self) -> bool {
        with_array!(self, a => a.is_standard_layout())
    }

    /// Whether both arrays view the same memory with the same layout.
    pub fn shares_buffer(&self, other: &ArrayData) -> bool {
        let this = with_array!(self, a => (a.as_ptr() as *const (), a.strides()));
        let that = with_array!(other, a => (a.as_ptr() as *const (), a.strides()));
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && this == that
            && self.shape() == other.shape()
    }

    /// Get an array with contiguous standard layout.
    ///
    /// Rank-0 arrays and arrays that are already contiguous are returned as is, sharing their buffer.
    pub fn to_contiguous(&self) -> ArrayData {
        if self.ndim() == 0 || self.is_contiguous() {
            return self.clone();
        }
        log::debug!(
            "Copying non-contiguous {} array of shape {:?} into standard layout",
            self.dtype_name(),
            self.shape()
        );
        map_array!(self, a => a.as_standard_layout().into_owned().into_shared())
    }

    /// Copy the elements into a new, contiguous buffer.
    pub fn deep_copy(&self) -> ArrayData {
        map_array!(self, a => a.as_standard_layout().into_owned().into_shared())
    }

    /// Cast the elements to the given host dtype.
    ///
    /// Returns the array as is if it already has that dtype. Only numeric arrays can be cast, and only to numeric
    /// dtypes.
    pub fn cast_host(&self, dtype: HostDtype) -> Result<ArrayData> {
        if self.host_dtype() == Some(dtype) {
            return Ok(self.clone());
        }
        log::debug!("Casting {} array to {dtype}", self.dtype_name());
        let cast = match dtype {
            HostDtype::Bool => self.cast_to::<bool>(),
            HostDtype::Int8 => self.cast_to::<i8>(),
            HostDtype::Int16 => self.cast_to::<i16>(),
            HostDtype::Int32 => self.cast_to::<i32>(),
            HostDtype::Int64 => self.cast_to::<i64>(),
            HostDtype::UInt8 => self.cast_to::<u8>(),
            HostDtype::UInt16 => self.cast_to::<u16>(),
            HostDtype::UInt32 => self.cast_to::<u32>(),
            HostDtype::UInt64 => self.cast_to::<u64>(),
            HostDtype::Float16 => self.cast_to::<f16>(),
            HostDtype::Float32 => self.cast_to::<f32>(),
            HostDtype::Float64 => self.cast_to::<f64>(),
            HostDtype::Complex64 => self.cast_to::<Complex<f32>>(),
            HostDtype::Complex128 => self.cast_to::<Complex<f64>>(),
            HostDtype::Str | HostDtype::Object => None,
        };
        cast.ok_or_else(|| {
            log::error!("Can not cast {} array to {dtype}", self.dtype_name());
            Error::unsupported_dtype(dtype, Backend::HostArray)
        })
    }

    /// Cast the elements to the given tensor dtype.
    ///
    /// Returns the array as is if it already has that dtype.
    pub fn cast_tensor(&self, dtype: TensorDtype) -> Result<ArrayData> {
        if self.tensor_dtype() == Some(dtype) {
            return Ok(self.clone());
        }
        log::debug!("Casting {} array to {dtype}", self.dtype_name());
        let cast = match dtype {
            TensorDtype::Bool => self.cast_to::<bool>(),
            TensorDtype::Byte => self.cast_to::<u8>(),
            TensorDtype::Char => self.cast_to::<i8>(),
            TensorDtype::Short => self.cast_to::<i16>(),
            TensorDtype::Int => self.cast_to::<i32>(),
            TensorDtype::Long => self.cast_to::<i64>(),
            TensorDtype::Half => self.cast_to::<f16>(),
            TensorDtype::BFloat16 => self.cast_to::<bf16>(),
            TensorDtype::Float => self.cast_to::<f32>(),
            TensorDtype::Double => self.cast_to::<f64>(),
            TensorDtype::ComplexFloat => self.cast_to::<Complex<f32>>(),
            TensorDtype::ComplexDouble => self.cast_to::<Complex<f64>>(),
        };
        cast.ok_or_else(|| {
            log::error!("Can not cast {} array to {dtype}", self.dtype_name());
            Error::unsupported_dtype(dtype, Backend::Tensor)
        })
    }

    fn cast_to<B: NumElement>(&self) -> Option<ArrayData> {
        macro_rules! cast {
            ($data:expr; $($variant:ident),*) => {
                match $data {
                    $(ArrayData::$variant(a) => a.mapv(|x| B::from_number(x.to_number())),)*
                    ArrayData::Str(_) | ArrayData::Object(_) => return None,
                }
            };
        }
        let array = cast!(
            self; Bool, UInt8, Int8, Int16, Int32, Int64, UInt16, UInt32, UInt64, Float16, BFloat16, Float32,
            Float64, Complex64, Complex128
        );
        Some(B::into_data(array.into_shared()))
    }

    /// Stack arrays of equal shape along a new leading axis.
    ///
    /// Identical element types are kept. Mixed element types are promoted: complex over float over integer over
    /// boolean, to [`Complex<f64>`], `f64`, `i64` or `bool` respectively.
    pub fn stack(items: &[ArrayData]) -> Result<ArrayData> {
        let Some(first) = items.first() else {
            return Ok(ArrayData::from_vec(Vec::<f64>::new()));
        };
        if let Some(item) = items.iter().find(|item| !item.is_numeric()) {
            log::error!("Can not stack {} arrays", item.dtype_name());
            return Err(Error::unsupported_dtype(
                item.dtype_name(),
                Backend::HostArray,
            ));
        }
        if let Some(item) = items.iter().find(|item| item.shape() != first.shape()) {
            log::error!(
                "Can not stack arrays of shapes {:?} and {:?}",
                first.shape(),
                item.shape()
            );
            return Err(Error::ShapeMismatch {
                expected: first.shape().to_vec(),
                found: item.shape().to_vec(),
            });
        }

        let uniform = items
            .iter()
            .all(|item| std::mem::discriminant(item) == std::mem::discriminant(first));
        let items = if uniform {
            items.to_vec()
        } else {
            let dtype = match items.iter().map(ArrayData::category).max() {
                Some(Category::Complex) => HostDtype::Complex128,
                Some(Category::Float) => HostDtype::Float64,
                Some(Category::Integer) => HostDtype::Int64,
                _ => HostDtype::Bool,
            };
            items
                .iter()
                .map(|item| item.cast_host(dtype))
                .collect::<Result<Vec<_>>>()?
        };

        macro_rules! stack {
            ($items:expr; $($variant:ident),*) => {
                match &$items[0] {
                    $(ArrayData::$variant(_) => {
                        let views = $items
                            .iter()
                            .filter_map(|item| match item {
                                ArrayData::$variant(a) => Some(a.view()),
                                _ => None,
                            })
                            .collect::<Vec<_>>();
                        ArrayData::$variant(stack_views(&views)?)
                    })*
                    ArrayData::Str(_) | ArrayData::Object(_) => unreachable!("checked numeric above"),
                }
            };
        }
        Ok(stack!(
            items; Bool, UInt8, Int8, Int16, Int32, Int64, UInt16, UInt32, UInt64, Float16, BFloat16, Float32,
            Float64, Complex64, Complex128
        ))
    }

    fn category(&self) -> Category {
        match self {
            ArrayData::Bool(_) => Category::Bool,
            ArrayData::UInt8(_)
            | ArrayData::Int8(_)
            | ArrayData::Int16(_)
            | ArrayData::Int32(_)
            | ArrayData::Int64(_)
            | ArrayData::UInt16(_)
            | ArrayData::UInt32(_)
            | ArrayData::UInt64(_) => Category::Integer,
            ArrayData::Float16(_)
            | ArrayData::BFloat16(_)
            | ArrayData::Float32(_)
            | ArrayData::Float64(_) => Category::Float,
            ArrayData::Complex64(_) | ArrayData::Complex128(_) => Category::Complex,
            ArrayData::Str(_) | ArrayData::Object(_) => Category::Other,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Other,
    Bool,
    Integer,
    Float,
    Complex,
}

fn stack_views<A: Element>(views: &[ArrayView<'_, A, IxDyn>]) -> Result<ArcArray<A, IxDyn>> {
    let stacked = ndarray::stack(Axis(0), views).map_err(|err| {
        log::error!("Stacking failed: {err}");
        Error::ShapeMismatch {
            expected: views[0].shape().to_vec(),
            found: Vec::new(),
        }
    })?;
    Ok(stacked.into_shared())
}

fn element_host_dtype<A: Element, D: Dimension>(_: &ArcArray<A, D>) -> Option<HostDtype> {
    A::HOST_DTYPE
}

fn element_tensor_dtype<A: Element, D: Dimension>(_: &ArcArray<A, D>) -> Option<TensorDtype> {
    A::TENSOR_DTYPE
}

impl<A: Element, D: Dimension> From<Array<A, D>> for ArrayData {
    fn from(array: Array<A, D>) -> Self {
        A::into_data(array.into_dyn().into_shared())
    }
}

impl<A: Element, D: Dimension> From<ArcArray<A, D>> for ArrayData {
    fn from(array: ArcArray<A, D>) -> Self {
        A::into_data(array.into_dyn())
    }
}
