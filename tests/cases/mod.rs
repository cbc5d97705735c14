use ndtype::value::{Buffer, Primitive};

/// One element buffer per value, laid out as `N * T`.
pub fn array<T: Primitive>(values: &[T]) -> Buffer {
    let tp = ndtype::types::make_fixed_dim(values.len(), T::tp());
    let mut buffer = Buffer::new(&tp).expect("array type");
    let size = T::tp().data_size();
    for (i, &v) in values.iter().enumerate() {
        unsafe { v.write_to(buffer.as_mut_ptr().add(i * size)) };
    }
    buffer
}

/// Declares a test assigning `src` into a fresh value of `dst` and checking
/// the printed result, or the error variant.
#[allow(unused_macros)]
macro_rules! assign_case {
    (
        name: $name:ident,
        dst: $dst:expr,
        src: $src:expr,
        errmode: $errmode:expr,
        expected: $expected:expr $(,)?
    ) => {
        #[test]
        fn $name() {
            let mut dst = ::ndtype::value::Buffer::new(&$dst).expect("destination type");
            dst.assign_from(&$src, $errmode, &::ndtype::EvalContext::default())
                .expect("assignment failed");
            ::pretty_assertions::assert_eq!(dst.to_string(), $expected);
        }
    };
    (
        name: $name:ident,
        dst: $dst:expr,
        src: $src:expr,
        errmode: $errmode:expr,
        error: $pattern:pat $(,)?
    ) => {
        #[test]
        fn $name() {
            let mut dst = ::ndtype::value::Buffer::new(&$dst).expect("destination type");
            let err = dst
                .assign_from(&$src, $errmode, &::ndtype::EvalContext::default())
                .expect_err("assignment should fail");
            assert!(matches!(err, $pattern), "{err}");
        }
    };
}
