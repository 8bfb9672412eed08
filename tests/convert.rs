use approx::assert_abs_diff_eq;
use ndarray::{array, ArrayD, IxDyn};
use tensor_interop::backend::{AcceleratorArray, Backend, Capabilities, Device, HostArray, Tensor};
use tensor_interop::convert::{
    materialize_host_array, materialize_tensor, ConversionRequest, Converter,
};
use tensor_interop::dtype::{HostDtype, TensorDtype};
use tensor_interop::value::{Tag, Value};
use tensor_interop::Error;

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn converter() -> Converter {
    Converter::new(Capabilities::all())
}

#[test]
fn round_trip_restores_the_original_representation() {
    let converter = converter();
    let original = Value::from(HostArray::new(array![[1_i32, 2, 3], [4, 5, 6]]).unwrap());

    let to_tensor = converter
        .convert(ConversionRequest::new(&original).backend(Backend::Tensor))
        .unwrap();
    assert_eq!(to_tensor.original_backend, Backend::HostArray);
    assert_eq!(to_tensor.value.as_tensor().unwrap().dtype(), TensorDtype::Int);

    let back = converter
        .convert_to_match(&to_tensor.value, &original)
        .unwrap();
    assert_eq!(back.original_backend, Backend::Tensor);
    assert_eq!(back.original_device, Some(Device::Cpu));
    assert_eq!(back.value, original);
}

#[test]
fn round_trip_through_the_accelerator() {
    let converter = converter();
    let tensor = Tensor::new(array![0.25_f32, 0.5], Device::Cuda(0)).unwrap();
    let original = Value::from(tensor);

    let result = converter
        .convert(ConversionRequest::new(&original).backend(Backend::AcceleratorArray))
        .unwrap();
    assert_eq!(result.original_device, Some(Device::Cuda(0)));
    let array = result.value.as_accelerator().unwrap();
    assert_eq!(array.dtype(), HostDtype::Float32);

    let back = converter.convert_to_match(&result.value, &original).unwrap();
    assert_eq!(back.value, original);
}

#[test]
fn identity_on_native_values() {
    let converter = converter();
    let host = Value::from(HostArray::new(array![1.0_f64, 2.0]).unwrap());
    let result = converter.convert(ConversionRequest::new(&host)).unwrap();
    assert!(result
        .value
        .as_host()
        .unwrap()
        .data()
        .shares_buffer(host.as_host().unwrap().data()));

    let tensor = Value::from(Tensor::new(array![[1_u8]], Device::Cuda(1)).unwrap());
    let result = converter
        .convert(ConversionRequest::new(&tensor).device(Device::Cuda(1)))
        .unwrap();
    assert!(result
        .value
        .as_tensor()
        .unwrap()
        .data()
        .shares_buffer(tensor.as_tensor().unwrap().data()));
}

#[test]
fn layout_is_fixed_and_shape_preserved() {
    let converter = converter();
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4]), |idx| (idx[0] * 12 + idx[1] * 4 + idx[2]) as f32);
    let permuted = data.clone().permuted_axes(IxDyn(&[2, 0, 1]));
    let value = Value::from(HostArray::new(permuted.clone()).unwrap());

    let result = converter
        .convert(
            ConversionRequest::new(&value)
                .backend(Backend::Tensor)
                .dtype(TensorDtype::Double),
        )
        .unwrap();
    let tensor = result.value.as_tensor().unwrap();
    assert_eq!(tensor.data().shape(), &[4, 2, 3]);
    assert!(tensor.data().is_contiguous());
    let elements = tensor.data().view::<f64>().unwrap();
    for (a, b) in elements.iter().zip(permuted.iter()) {
        assert_abs_diff_eq!(*a, f64::from(*b));
    }
}

#[test]
fn casts_keep_values() {
    let value = Value::from(HostArray::new(array![0.1_f64, -2.5, 1e3]).unwrap());
    let result = converter()
        .convert(ConversionRequest::new(&value).dtype(HostDtype::Float32))
        .unwrap();
    let array = result.value.as_host().unwrap();
    let elements: Vec<f32> = array.data().view::<f32>().unwrap().iter().copied().collect();
    assert_abs_diff_eq!(elements[0], 0.1, epsilon = 1e-7);
    assert_abs_diff_eq!(elements[1], -2.5);
    assert_abs_diff_eq!(elements[2], 1000.0);
}

#[test]
fn structure_is_preserved() {
    let data = Value::map([
        ("image", Value::from(HostArray::new(array![[1_u8, 2], [3, 4]]).unwrap())),
        ("meta", Value::map([("name", Value::from("case_1")), ("spacing", Value::tuple([1.0, 1.0]))])),
        ("extra", Value::None),
    ]);
    let result = materialize_tensor(&data, true, Some(Device::Cuda(0))).unwrap();
    let map = result.as_map().unwrap();
    let keys: Vec<_> = map.keys().map(String::as_str).collect();
    assert_eq!(keys, ["image", "meta", "extra"]);

    let image = map["image"].as_tensor().unwrap();
    assert_eq!(image.dtype(), TensorDtype::Byte);
    assert_eq!(image.device(), Device::Cuda(0));

    let meta = map["meta"].as_map().unwrap();
    assert_eq!(meta["name"], Value::from("case_1"));
    assert_eq!(meta["spacing"].tag(), Tag::Tuple);
    for spacing in meta["spacing"].as_sequence().unwrap() {
        assert_eq!(spacing.as_tensor().unwrap().dtype(), TensorDtype::Float);
    }
    assert_eq!(map["extra"], Value::None);
}

#[test]
fn stacking_vs_recursion() {
    let data = Value::list([1, 2, 3]);

    let stacked = materialize_host_array(&data, true).unwrap();
    let array = stacked.as_host().unwrap();
    assert_eq!(array.data().shape(), &[3]);
    assert_eq!(array.dtype(), HostDtype::Int64);

    let recursed = materialize_host_array(&data, false).unwrap();
    let items = recursed.as_sequence().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        assert_eq!(item.as_host().unwrap().data().ndim(), 0);
    }
}

#[test]
fn stacking_arrays_and_promotion() {
    let a = Value::from(HostArray::new(array![1_i32, 2]).unwrap());
    let b = Value::from(HostArray::new(array![0.5_f32, 1.5]).unwrap());
    let stacked = materialize_host_array(&Value::list([a, b]), true).unwrap();
    let array = stacked.as_host().unwrap();
    assert_eq!(array.data().shape(), &[2, 2]);
    assert_eq!(array.dtype(), HostDtype::Float64);

    let empty = materialize_tensor(&Value::List(Vec::new()), true, None).unwrap();
    let tensor = empty.as_tensor().unwrap();
    assert_eq!(tensor.data().shape(), &[0]);
    assert_eq!(tensor.dtype(), TensorDtype::Float);
}

#[test]
fn opaque_passthrough() {
    let strings = Value::from(HostArray::new(array!["a".to_string(), "b".to_string()]).unwrap());
    let result = converter()
        .convert(ConversionRequest::new(&strings).backend(Backend::Tensor))
        .unwrap();
    assert_eq!(result.value, strings);
}

#[test]
fn string_arrays_round_trip_unchanged() {
    let converter = converter();
    let strings = Value::from(HostArray::new(array!["x".to_string(), "y".to_string()]).unwrap());

    let forward = converter
        .convert(ConversionRequest::new(&strings).backend(Backend::Tensor))
        .unwrap();
    let back = converter.convert_to_match(&forward.value, &strings).unwrap();
    assert_eq!(back.value, strings);

    let same = converter.convert_to_match(&strings, &strings).unwrap();
    assert_eq!(same.value, strings);

    // numbers still can not become strings
    let numbers = Value::from(HostArray::new(array![1_i32, 2]).unwrap());
    assert!(matches!(
        converter.convert_to_match(&numbers, &strings),
        Err(Error::UnsupportedDtype {
            backend: Backend::HostArray,
            ..
        })
    ));
}

#[test]
fn unsupported_dtypes_are_reported() {
    let value = Value::from(HostArray::new(array![1_u64]).unwrap());
    let err = converter()
        .convert(ConversionRequest::new(&value).backend(Backend::Tensor))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedDtype {
            backend: Backend::Tensor,
            ..
        }
    ));
}

#[test]
fn accelerator_unavailable() {
    let converter = Converter::new(Capabilities::host_only());
    let value = Value::from(AcceleratorArray::new(array![1.0_f32]).unwrap());
    assert!(matches!(
        converter.convert(ConversionRequest::new(&value)),
        Err(Error::BackendUnavailable(Backend::AcceleratorArray))
    ));
    // other backends are not affected
    let result = converter
        .convert(ConversionRequest::new(&value).backend(Backend::HostArray))
        .unwrap();
    assert_eq!(result.original_backend, Backend::AcceleratorArray);
    assert_eq!(result.value.as_host().unwrap().dtype(), HostDtype::Float32);
}

#[test]
fn converter_is_shared_across_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let data = Value::list([i, i + 1]);
                let request = ConversionRequest::new(&data)
                    .backend(Backend::Tensor)
                    .wrap_sequence(true);
                Converter::global().convert(request).map(|result| result.value)
            })
        })
        .collect();
    for handle in handles {
        let value = handle.join().unwrap().unwrap();
        assert_eq!(value.as_tensor().unwrap().dtype(), TensorDtype::Long);
    }
}
