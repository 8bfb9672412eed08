/// Marker returned by sealed trait methods, unreachable from outside the crate.
pub struct PrivateMarker;

macro_rules! private_decl {
    () => {
        /// This trait is sealed; the method only exists to make it impossible to implement outside the crate.
        #[doc(hidden)]
        fn __private__(&self) -> crate::private::PrivateMarker;
    };
}

macro_rules! private_impl {
    () => {
        fn __private__(&self) -> crate::private::PrivateMarker {
            crate::private::PrivateMarker
        }
    };
}
