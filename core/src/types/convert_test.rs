use super::*;
use crate::errors::Error;
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode};
use crate::value::{Buffer, Primitive};
use pretty_assertions::assert_eq;

fn convert(value: Type, operand: Type) -> Type {
    make_convert(&value, &operand, ErrorMode::Fractional).unwrap()
}

/// A value of `tp` whose storage holds the int32 `v`.
fn stored_int32(tp: &Type, v: i32) -> Buffer {
    let mut buffer = Buffer::new(tp).unwrap();
    unsafe { v.write_to(buffer.as_mut_ptr()) };
    buffer
}

#[test]
fn test_make_convert_same_value_type_is_identity() {
    let tp = make_convert(&Type::int32(), &Type::int32(), ErrorMode::Default).unwrap();
    assert_eq!(tp, Type::int32());
    assert!(tp.is_builtin());
}

#[test]
fn test_convert_layout() {
    let tp = convert(Type::float64(), Type::int32());
    assert!(tp.is_expression());
    assert_eq!(tp.value_type(), &Type::float64());
    assert_eq!(tp.storage_type(), &Type::int32());
    assert_eq!(tp.canonical_type(), Type::float64());
    assert_eq!(tp.data_size(), 4);
    assert_eq!(tp.arrmeta_size(), 0);
    assert!(!tp.is_pod());
    assert_eq!(
        tp.to_string(),
        "convert[to=float64, from=int32, errmode=fractional]"
    );
}

#[test]
fn test_convert_rejects_degenerate_construction() {
    assert!(matches!(
        ConvertType::new(Type::int32(), Type::int32(), ErrorMode::Default),
        Err(Error::Type(_))
    ));
    let inner = convert(Type::float64(), Type::int32());
    assert!(matches!(
        ConvertType::new(inner, Type::int8(), ErrorMode::Default),
        Err(Error::Type(_))
    ));
}

#[test]
fn test_lossless_directions_skip_checks() {
    let conv = ConvertType::new(Type::float64(), Type::int32(), ErrorMode::Inexact).unwrap();
    assert_eq!(conv.errmode_to_value(), ErrorMode::None);
    assert_eq!(conv.errmode_to_operand(), ErrorMode::Inexact);
}

#[test]
fn test_make_convert_splices_matching_storage() {
    let outer = convert(Type::float64(), Type::int32());
    let operand = convert(Type::int32(), Type::int8());
    let spliced = make_convert(&outer, &operand, ErrorMode::Default).unwrap();
    assert_eq!(
        spliced.storage_type_chain(),
        vec![spliced.clone(), operand.clone(), Type::int8()]
    );
    assert_eq!(spliced.value_type(), &Type::float64());
    assert_eq!(spliced.storage_type(), &Type::int8());
}

#[test]
fn test_make_convert_bridges_other_storage() {
    let outer = convert(Type::float64(), Type::int32());
    let chained = make_convert(&outer, &Type::int16(), ErrorMode::Overflow).unwrap();
    let chain = chained.storage_type_chain();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[1].value_type(), &Type::int32());
    assert_eq!(chain[2], Type::int16());
    assert_eq!(chained.canonical_type(), Type::float64());
    assert_eq!(chained.data_size(), 2);
}

#[test]
fn test_eval_reads_operand_as_value() {
    let tp = convert(Type::float64(), Type::int32());
    let buffer = stored_int32(&tp, 5);
    let value = buffer.eval(&EvalContext::default()).unwrap();
    assert_eq!(value.read::<f64>().unwrap(), 5.0);
    assert_eq!(buffer.to_string(), "5");
}

#[test]
fn test_value_to_operand_checks_errmode() {
    let tp = convert(Type::float64(), Type::int32());
    let ectx = EvalContext::default();
    let mut dst = Buffer::new(&tp).unwrap();

    dst.assign_from(&Buffer::from_scalar(12.0f64).unwrap(), ErrorMode::Default, &ectx)
        .unwrap();
    assert_eq!(unsafe { i32::read_from(dst.as_ptr()) }, 12);

    let err = dst
        .assign_from(&Buffer::from_scalar(2.5f64).unwrap(), ErrorMode::Default, &ectx)
        .unwrap_err();
    assert!(matches!(err, Error::Fractional { .. }), "{err}");
}

#[test]
fn test_buffered_assignment_between_expressions() {
    let ectx = EvalContext::default();
    let src = stored_int32(&convert(Type::float64(), Type::int32()), 3);

    // Neither side's value type is the other side, so the value is buffered.
    let mut dst = Buffer::from_scalar(0i64).unwrap();
    dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(dst.read::<i64>().unwrap(), 3);

    let dst_tp = convert(Type::float32(), Type::int16());
    let mut dst = Buffer::new(&dst_tp).unwrap();
    dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(unsafe { i16::read_from(dst.as_ptr()) }, 3);
}

#[test]
fn test_compare_expression_operand() {
    let ectx = EvalContext::default();
    let a = stored_int32(&convert(Type::float64(), Type::int32()), 3);
    let b = Buffer::from_scalar(3.0f64).unwrap();
    assert!(a.compare(&b, ComparisonType::Equal, &ectx).unwrap());
    assert!(!a.compare(&b, ComparisonType::Less, &ectx).unwrap());
    let c = Buffer::from_scalar(4i64).unwrap();
    assert!(a.compare(&c, ComparisonType::Less, &ectx).unwrap());
}

#[test]
fn test_properties_forward_value_properties() {
    let value = make_fixed_string(4, StringEncoding::Ascii);
    let tp = make_convert(&value, &make_string(StringEncoding::Utf8), ErrorMode::Default).unwrap();
    assert_eq!(tp.property("value_type").unwrap(), Property::Type(value.clone()));
    assert_eq!(tp.property("encoding").unwrap(), Property::Str("ascii".to_string()));
    assert!(tp.dynamic_array_function("utf8_len").is_ok());

    let numeric = convert(Type::float64(), Type::int32());
    assert!(numeric.property("encoding").is_err());
}
