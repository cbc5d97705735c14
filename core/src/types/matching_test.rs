use super::*;
use crate::errors::Error;
use pretty_assertions::assert_eq;

#[test]
fn test_concrete_types_match_by_equality() {
    assert!(Type::int32().matches_concrete(&Type::int32()));
    assert!(!Type::int32().matches_concrete(&Type::int64()));
    let tp = make_fixed_dim(2, Type::float32());
    assert!(tp.matches_concrete(&make_fixed_dim(2, Type::float32())));
    assert!(!tp.matches_concrete(&make_var_dim(Type::float32())));
}

#[test]
fn test_typevar_binds_consistently() {
    let t = make_typevar("T");
    let mut tp_vars = TypeVars::new();
    assert!(t.matches(&Type::int32(), &mut tp_vars));
    assert!(t.matches(&Type::int32(), &mut tp_vars));
    assert!(!t.matches(&Type::float64(), &mut tp_vars));
    assert_eq!(tp_vars.len(), 1);
    assert_eq!(tp_vars["T"], Type::int32());
}

#[test]
fn test_typevar_rejects_dimensions() {
    let mut tp_vars = TypeVars::new();
    assert!(!make_typevar("T").matches(&make_fixed_dim(3, Type::int8()), &mut tp_vars));
    assert!(tp_vars.is_empty());
}

#[test]
fn test_any_matches_everything() {
    let any = make_any();
    let mut tp_vars = TypeVars::new();
    for tp in [
        Type::bool_(),
        make_fixed_dims(&[2, 2], Type::int32()),
        make_string(StringEncoding::Utf16),
    ] {
        assert!(any.matches(&tp, &mut tp_vars), "{tp}");
    }
    assert!(tp_vars.is_empty());
    assert!(matches!(any.substitute(&tp_vars, true), Err(Error::Type(_))));
}

#[test]
fn test_ellipsis_binds_leading_dimensions() {
    let pattern = make_ellipsis_dim(Some("Dims"), make_typevar("T"));
    let candidate = make_fixed_dim(2, make_var_dim(Type::int16()));
    let mut tp_vars = TypeVars::new();
    assert!(pattern.matches(&candidate, &mut tp_vars));
    assert_eq!(tp_vars["Dims"], make_fixed_dim(2, make_var_dim(Type::void())));
    assert_eq!(tp_vars["T"], Type::int16());
    assert_eq!(pattern.substitute(&tp_vars, true).unwrap(), candidate);

    // Zero leading dimensions also match.
    let mut tp_vars = TypeVars::new();
    assert!(pattern.matches(&Type::float64(), &mut tp_vars));
    assert_eq!(tp_vars["Dims"], Type::void());
}

#[test]
fn test_ellipsis_keeps_trailing_dimensions() {
    let pattern = make_ellipsis_dim(None, make_typevar_dim("N", Type::int32()));
    let mut tp_vars = TypeVars::new();
    assert!(pattern.matches(&make_fixed_dims(&[4, 5], Type::int32()), &mut tp_vars));
    assert_eq!(tp_vars["N"], make_fixed_dim(5, Type::void()));
    assert!(!pattern.matches_concrete(&Type::int32()));
}

#[test]
fn test_substitute_unbound() {
    let tp = make_fixed_dim(3, make_typevar("T"));
    let tp_vars = TypeVars::new();
    assert_eq!(tp.substitute(&tp_vars, false).unwrap(), tp);
    assert!(matches!(tp.substitute(&tp_vars, true), Err(Error::Type(_))));
    assert_eq!(
        tp.vars().into_iter().collect::<Vec<_>>(),
        vec!["T".to_string()]
    );
}

#[test]
fn test_struct_patterns() {
    let pattern = make_struct([("x", make_typevar("T")), ("y", make_typevar("T"))]).unwrap();
    assert!(pattern.is_symbolic());
    assert_eq!(pattern.data_size(), 0);

    let same = make_struct([("x", Type::int8()), ("y", Type::int8())]).unwrap();
    let mixed = make_struct([("x", Type::int8()), ("y", Type::uint8())]).unwrap();
    let renamed = make_struct([("x", Type::int8()), ("z", Type::int8())]).unwrap();
    assert!(pattern.matches_concrete(&same));
    assert!(!pattern.matches_concrete(&mixed));
    assert!(!pattern.matches_concrete(&renamed));
}

#[test]
fn test_callable_signature_substitution() {
    let t = make_typevar("T");
    let sig = make_callable(
        t.clone(),
        vec![t.clone(), make_fixed_dim(2, t)],
        vec![KwdParam::optional("scale", Type::float64())],
    );
    assert_eq!(sig.to_string(), "(T, 2 * T, scale: ?float64) -> T");
    assert!(sig.is_symbolic());

    let mut tp_vars = TypeVars::new();
    tp_vars.insert("T".to_string(), Type::int64());
    let concrete = sig.substitute(&tp_vars, true).unwrap();
    assert_eq!(concrete.to_string(), "(int64, 2 * int64, scale: ?float64) -> int64");
    assert!(!concrete.is_symbolic());
    assert!(sig.matches_concrete(&concrete));
}
