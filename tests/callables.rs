/*
 * Callable Tests
 *
 * Resolution and execution of the default callables through the registry.
 */

mod cases;

use cases::array;
use ndtype::callables::apply;
use ndtype::types::{StringEncoding, make_fixed_string, make_struct};
use ndtype::value::{Buffer, Primitive};
use ndtype::{ComparisonType, Error, EvalContext, KernelRequest, KwdValue, Registry, Type, call, call_into, plan};
use pretty_assertions::assert_eq;

#[test]
fn mod_through_registry() {
    let registry = Registry::with_defaults();
    let f = registry.get("mod").unwrap();
    let ectx = EvalContext::default();
    let a = Buffer::from_scalar(17i64).unwrap();
    let b = Buffer::from_scalar(5i64).unwrap();
    let r = call(&f, &[&a, &b], &[], &ectx).unwrap();
    assert_eq!(r.tp(), &Type::int64());
    assert_eq!(r.read::<i64>().unwrap(), 2);
}

#[test]
fn plan_before_allocating() {
    let registry = Registry::with_defaults();
    let f = registry.get("mod").unwrap();
    let plan = plan(&f, None, &[Type::float32(), Type::float32()], &[]).unwrap();
    assert_eq!(plan.dst_tp(), &Type::float32());

    // The same plan runs over many elements.
    let kernel = plan
        .instantiate(&[], &[&[], &[]], KernelRequest::Strided, &EvalContext::default())
        .unwrap();
    let a = [7.0f32, 8.5, -3.0];
    let b = [2.0f32, 4.0, 2.0];
    let mut out = [0f32; 3];
    unsafe {
        kernel
            .strided(
                out.as_mut_ptr() as *mut u8,
                4,
                &[a.as_ptr() as *const u8, b.as_ptr() as *const u8],
                &[4, 4],
                3,
            )
            .unwrap();
    }
    assert_eq!(out, [1.0, 0.5, -1.0]);
}

#[test]
fn assign_into_array() {
    let registry = Registry::with_defaults();
    let f = registry.get("assign").unwrap();
    let mut dst = Buffer::new(&ndtype::types::make_fixed_dim(3, Type::uint16())).unwrap();
    let src = array(&[1i64, 2, 70000]);
    let ectx = EvalContext::default();

    let err = call_into(&f, &mut dst, &[&src], &[], &ectx).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");
    call_into(&f, &mut dst, &[&src], &[("errmode", KwdValue::from("none"))], &ectx).unwrap();
    assert_eq!(dst.to_string(), "[1, 2, 4464]");
}

#[test]
fn utf8_len_through_type() {
    let tp = make_fixed_string(6, StringEncoding::Utf32);
    let f = tp.dynamic_array_function("utf8_len").unwrap();
    let s = Buffer::from_utf8(&tp, "añø").unwrap();
    let r = call(&f, &[&s], &[], &EvalContext::default()).unwrap();
    assert_eq!(r.read::<i64>().unwrap(), 5);
}

#[test]
fn custom_callable_results_compare() {
    let hypot = apply("hypot", |x: f64, y: f64| x.hypot(y));
    let ectx = EvalContext::default();
    let r = call(
        &hypot,
        &[&Buffer::from_scalar(3.0f64).unwrap(), &Buffer::from_scalar(4.0f64).unwrap()],
        &[],
        &ectx,
    )
    .unwrap();
    let five = Buffer::from_scalar(5i32).unwrap();
    assert!(r.compare(&five, ComparisonType::Equal, &ectx).unwrap());
}

#[test]
fn binary_search_through_registry() {
    let registry = Registry::with_defaults();
    let f = registry.get("binary_search").unwrap();
    let ectx = EvalContext::default();
    let haystack = array(&[10u16, 20, 30, 40]);
    for (key, index) in [(20u16, 1i64), (40, 3), (25, -1)] {
        let r = call(&f, &[&haystack, &Buffer::from_scalar(key).unwrap()], &[], &ectx).unwrap();
        assert_eq!(r.read::<i64>().unwrap(), index);
    }
}

#[test]
fn field_access_through_registry() {
    let registry = Registry::with_defaults();
    let f = registry.get("field_access").unwrap();
    let tp = make_struct([("id", Type::int64()), ("flag", Type::bool_())]).unwrap();
    let mut src = Buffer::new(&tp).unwrap();
    // The first field sits at the start of the struct.
    unsafe { 42i64.write_to(src.as_mut_ptr()) };

    let r = call(&f, &[&src], &[("field", KwdValue::from("id"))], &EvalContext::default()).unwrap();
    assert_eq!(r.tp(), &Type::int64());
    assert_eq!(r.read::<i64>().unwrap(), 42);
}
