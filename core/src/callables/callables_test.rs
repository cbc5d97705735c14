use super::*;
use crate::kernels::ErrorMode;
use crate::test_utils::init_test_logging;
use crate::types::{
    StringEncoding, StructType, make_convert, make_fixed_dim, make_fixed_string, make_string,
    make_struct, make_tuple, make_var_dim,
};
use crate::value::Primitive;
use pretty_assertions::assert_eq;

fn scalar<T: crate::value::Primitive>(v: T) -> Buffer {
    Buffer::from_scalar(v).unwrap()
}

#[test]
fn test_mod_dispatches_on_bound_type() {
    init_test_logging();
    let f = dispatch::mod_callable();
    assert_eq!(f.ty().to_string(), "(T, T) -> T");

    let plan = plan(&f, None, &[Type::int32(), Type::int32()], &[]).unwrap();
    assert_eq!(plan.dst_tp(), &Type::int32());
    assert_eq!(plan.tp_vars()["T"], Type::int32());
    // The dispatcher, then the overload it picked.
    let nodes = plan.graph().nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].callable().ty(), f.ty());
    assert_eq!(nodes[1].callable().ty().to_string(), "(int32, int32) -> int32");
    assert_eq!(nodes[1].dst_tp(), &Type::int32());

    let ectx = EvalContext::default();
    let r = call(&f, &[&scalar(7i32), &scalar(-3i32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i32>().unwrap(), 1);
    let r = call(&f, &[&scalar(-7i64), &scalar(3i64)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), -1);
    let r = call(&f, &[&scalar(i32::MIN), &scalar(-1i32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i32>().unwrap(), 0);
    let r = call(&f, &[&scalar(5i32), &scalar(0i32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i32>().unwrap(), 0);
    let r = call(&f, &[&scalar(7.5f64), &scalar(2.0f64)], &[], &ectx).unwrap();
    assert_eq!(r.read::<f64>().unwrap(), 1.5);
}

#[test]
fn test_conflicting_type_variable() {
    let f = dispatch::mod_callable();
    let err = plan(&f, None, &[Type::int32(), Type::float64()], &[]).unwrap_err();
    assert_eq!(
        err,
        Error::TypeVarConflict {
            name: "T".to_string(),
            bound: "int32".to_string(),
            found: "float64".to_string(),
        }
    );
}

#[test]
fn test_no_matching_overload() {
    let f = dispatch::mod_callable();
    let err = plan(&f, None, &[Type::bool_(), Type::bool_()], &[]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref operation, .. } if operation == "mod"), "{err}");
}

#[test]
fn test_mod_small_and_unsigned_integers() {
    let f = dispatch::mod_callable();
    let ectx = EvalContext::default();
    let r = call(&f, &[&scalar(200u8), &scalar(7u8)], &[], &ectx).unwrap();
    assert_eq!(r.tp(), &Type::uint8());
    assert_eq!(r.read::<u8>().unwrap(), 4);
    let r = call(&f, &[&scalar(-7i16), &scalar(3i16)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i16>().unwrap(), -1);
    let r = call(&f, &[&scalar(i8::MIN), &scalar(-1i8)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i8>().unwrap(), 0);
    let r = call(&f, &[&scalar(u64::MAX), &scalar(10u64)], &[], &ectx).unwrap();
    assert_eq!(r.read::<u64>().unwrap(), 5);
    let r = call(&f, &[&scalar(7.5f32), &scalar(2.0f32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<f32>().unwrap(), 1.5);
}

#[test]
fn test_arity_is_checked_first() {
    let f = dispatch::mod_callable();
    let err = plan(&f, None, &[Type::int32()], &[("x", KwdValue::Int(1))]).unwrap_err();
    assert_eq!(
        err,
        Error::ArityMismatch {
            callable: "mod".to_string(),
            expected: 2,
            found: 1,
        }
    );
}

#[test]
fn test_unexpected_keyword() {
    let f = dispatch::mod_callable();
    let err = plan(&f, None, &[Type::int32(), Type::int32()], &[("x", KwdValue::Int(1))])
        .unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");
}

#[test]
fn test_destination_type_must_match() {
    let f = dispatch::mod_callable();
    let mut dst = scalar(0i64);
    let err = call_into(
        &f,
        &mut dst,
        &[&scalar(1i32), &scalar(2i32)],
        &[],
        &EvalContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
}

#[test]
fn test_assign_uses_the_destination_type() {
    let f: CallableRef = Arc::new(AssignCallable::new());
    assert_eq!(f.ty().to_string(), "(Any, errmode: ?string) -> Any");
    let ectx = EvalContext::default();

    let err = call(&f, &[&scalar(1i32)], &[], &ectx).unwrap_err();
    assert!(matches!(err, Error::Type(_)), "{err}");

    let mut dst = scalar(0i8);
    let src = scalar(300i32);
    let err = call_into(&f, &mut dst, &[&src], &[("errmode", "overflow".into())], &ectx)
        .unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");
    call_into(&f, &mut dst, &[&src], &[("errmode", "none".into())], &ectx).unwrap();
    assert_eq!(dst.read::<i8>().unwrap(), 44);

    let mut dst = scalar(0f64);
    call_into(&f, &mut dst, &[&scalar(7u16)], &[], &ectx).unwrap();
    assert_eq!(dst.read::<f64>().unwrap(), 7.0);
}

#[test]
fn test_assign_keyword_errors() {
    let f: CallableRef = Arc::new(AssignCallable::new());
    let ectx = EvalContext::default();
    let mut dst = scalar(0i8);
    let src = scalar(3i32);

    let err = call_into(&f, &mut dst, &[&src], &[("errmode", "sloppy".into())], &ectx)
        .unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");
    let err = call_into(&f, &mut dst, &[&src], &[("errmode", KwdValue::Int(1))], &ectx)
        .unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");
    let err = call_into(&f, &mut dst, &[&src], &[("mode", "none".into())], &ectx).unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");
}

#[test]
fn test_assign_errmode_is_checked_when_planning() {
    let f: CallableRef = Arc::new(AssignCallable::new());
    let err = plan(&f, Some(&Type::int32()), &[Type::int32()], &[("errmode", "bogus".into())])
        .unwrap_err();
    assert!(matches!(err, Error::Keyword { ref callable, .. } if callable == "assign"), "{err}");
    let err = plan(&f, Some(&Type::int8()), &[Type::int32()], &[("errmode", KwdValue::Int(2))])
        .unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");

    let plan = plan(&f, Some(&Type::int8()), &[Type::int32()], &[("errmode", "fractional".into())])
        .unwrap();
    assert_eq!(plan.dst_tp(), &Type::int8());
}

#[test]
fn test_direct_resolve_reports_arity() {
    let int32 = Type::int32();
    let arity = |callable: &str| Error::ArityMismatch {
        callable: callable.to_string(),
        expected: 1,
        found: 0,
    };

    let f: CallableRef = Arc::new(AssignCallable::new());
    let err = CallGraph::new()
        .resolve(&f, None, Some(&int32), &[], &[], &mut TypeVars::new())
        .unwrap_err();
    assert_eq!(err, arity("assign"));

    let f = string_functions::utf8_len();
    let err = CallGraph::new()
        .resolve(&f, None, None, &[], &[], &mut TypeVars::new())
        .unwrap_err();
    assert_eq!(err, arity("utf8_len"));

    let two = [make_string(StringEncoding::Utf8), make_string(StringEncoding::Utf8)];
    let err = CallGraph::new()
        .resolve(&f, None, None, &two, &[], &mut TypeVars::new())
        .unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { found: 2, .. }), "{err}");
}

#[test]
fn test_utf8_len_of_strings() {
    let f = string_functions::utf8_len();
    let ectx = EvalContext::default();

    let s = Buffer::from_utf8(&make_string(StringEncoding::Utf8), "hí").unwrap();
    let r = call(&f, &[&s], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 3);

    let s = Buffer::from_utf8(&make_fixed_string(4, StringEncoding::Utf16), "hí😀").unwrap();
    let r = call(&f, &[&s], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 7);

    let err = call(&f, &[&scalar(1i32)], &[], &ectx).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
}

#[test]
fn test_utf8_len_evaluates_expressions() {
    let tp = make_convert(
        &make_fixed_string(8, StringEncoding::Utf16),
        &make_fixed_string(8, StringEncoding::Utf8),
        ErrorMode::Default,
    )
    .unwrap();
    let mut s = Buffer::new(&tp).unwrap();
    let text = "hí".as_bytes();
    unsafe { core::ptr::copy_nonoverlapping(text.as_ptr(), s.as_mut_ptr(), text.len()) };

    let r = call(&string_functions::utf8_len(), &[&s], &[], &EvalContext::default()).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 3);
}

#[test]
fn test_apply_requires_exact_types() {
    let f = apply("scale", |x: f64, k: i32| x * k as f64);
    assert_eq!(f.ty().to_string(), "(float64, int32) -> float64");
    let ectx = EvalContext::default();
    let r = call(&f, &[&scalar(2.5f64), &scalar(4i32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<f64>().unwrap(), 10.0);

    let err = call(&f, &[&scalar(2.5f32), &scalar(4i32)], &[], &ectx).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
}

#[test]
fn test_plan_checks_arrmeta_count() {
    let f = apply("neg", |x: i64| -x);
    let plan = plan(&f, None, &[Type::int64()], &[]).unwrap();
    let ectx = EvalContext::default();
    assert!(matches!(
        plan.instantiate(&[], &[], KernelRequest::Single, &ectx),
        Err(Error::Type(_))
    ));
    let kernel = plan.instantiate(&[], &[&[]], KernelRequest::Single, &ectx).unwrap();
    assert_eq!(kernel.frame_count(), 1);
}

#[test]
fn test_registry_defaults() {
    let registry = Registry::with_defaults();
    assert_eq!(
        registry.names(),
        vec!["assign", "binary_search", "field_access", "mod", "utf8_len"]
    );
    assert!(registry.contains("mod"));
    assert_eq!(registry.get("mod").unwrap().name(), "mod");
    assert!(matches!(registry.get("pow"), Err(Error::Type(_))));

    let mut registry = Registry::new();
    assert!(registry.register(dispatch::mod_callable()).is_none());
    assert!(registry.register(dispatch::mod_callable()).is_some());
    assert_eq!(registry.names(), vec!["mod"]);
}

fn point() -> (Type, Buffer) {
    let tp = make_struct([("x", Type::int32()), ("y", Type::float64())]).unwrap();
    let mut buffer = Buffer::new(&tp).unwrap();
    let st = tp.extended_as::<StructType>().unwrap();
    unsafe {
        7i32.write_to(buffer.as_mut_ptr().add(st.data_offset(0)));
        2.5f64.write_to(buffer.as_mut_ptr().add(st.data_offset(1)));
    }
    (tp, buffer)
}

#[test]
fn test_field_access_reads_one_field() {
    init_test_logging();
    let f = field_access::field_access();
    assert_eq!(f.ty().to_string(), "(Any, field: string) -> Any");
    let ectx = EvalContext::default();
    let (tp, p) = point();

    let plan = plan(&f, None, &[tp.clone()], &[("field", "y".into())]).unwrap();
    assert_eq!(plan.dst_tp(), &Type::float64());
    let r = call(&f, &[&p], &[("field", "y".into())], &ectx).unwrap();
    assert_eq!(r.read::<f64>().unwrap(), 2.5);

    // A destination from the caller must have the field type.
    let mut dst = scalar(0i64);
    let err = call_into(&f, &mut dst, &[&p], &[("field", "x".into())], &ectx).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    let mut dst = scalar(0i32);
    call_into(&f, &mut dst, &[&p], &[("field", "x".into())], &ectx).unwrap();
    assert_eq!(dst.read::<i32>().unwrap(), 7);
}

#[test]
fn test_field_access_errors() {
    let f = field_access::field_access();
    let (tp, _) = point();

    let err = plan(&f, None, &[tp.clone()], &[("field", "z".into())]).unwrap_err();
    assert!(matches!(err, Error::Type(ref msg) if msg.contains("\"z\"")), "{err}");
    let err = plan(&f, None, &[tp.clone()], &[]).unwrap_err();
    assert!(matches!(err, Error::Keyword { .. }), "{err}");
    let err = plan(&f, None, &[Type::int32()], &[("field", "x".into())]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    let pair = make_tuple([Type::int32(), Type::int32()]).unwrap();
    let err = plan(&f, None, &[pair], &[("field", "x".into())]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
}

fn sorted<T: crate::value::Primitive>(values: &[T]) -> Buffer {
    let mut buffer = Buffer::new(&make_fixed_dim(values.len(), T::tp())).unwrap();
    let size = T::tp().data_size();
    for (i, &v) in values.iter().enumerate() {
        unsafe { v.write_to(buffer.as_mut_ptr().add(i * size)) };
    }
    buffer
}

#[test]
fn test_binary_search_finds_index() {
    init_test_logging();
    let f = binary_search::binary_search();
    assert_eq!(f.ty().to_string(), "(N * T, T) -> int64");
    let ectx = EvalContext::default();
    let haystack = sorted(&[1i32, 3, 5, 7, 9]);

    for (key, index) in [(1i32, 0i64), (7, 3), (9, 4), (4, -1), (0, -1), (10, -1)] {
        let r = call(&f, &[&haystack, &scalar(key)], &[], &ectx).unwrap();
        assert_eq!(r.tp(), &Type::int64());
        assert_eq!(r.read::<i64>().unwrap(), index, "key {key}");
    }

    let empty = sorted::<i32>(&[]);
    let r = call(&f, &[&empty, &scalar(1i32)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), -1);
}

#[test]
fn test_binary_search_sorts_nan_last() {
    let f = binary_search::binary_search();
    let ectx = EvalContext::default();
    let haystack = sorted(&[-1.0f64, 0.5, 2.0, f64::NAN]);
    let r = call(&f, &[&haystack, &scalar(f64::NAN)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 3);
    let r = call(&f, &[&haystack, &scalar(0.5f64)], &[], &ectx).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 1);
}

#[test]
fn test_binary_search_errors() {
    let f = binary_search::binary_search();
    let haystack = make_fixed_dim(3, Type::int32());

    let err = plan(&f, None, &[haystack.clone(), Type::int64()], &[]).unwrap_err();
    assert!(matches!(err, Error::TypeVarConflict { ref name, .. } if name == "T"), "{err}");
    let var = make_var_dim(Type::int32());
    let err = plan(&f, None, &[var, Type::int32()], &[]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref operation, .. } if operation == "binary_search"), "{err}");
    let complex = make_fixed_dim(3, Type::complex128());
    let err = plan(&f, None, &[complex, Type::complex128()], &[]).unwrap_err();
    assert!(matches!(err, Error::NoKernel { .. }), "{err}");
    let err = plan(&f, None, &[haystack], &[]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { expected: 2, found: 1, .. }), "{err}");
}
