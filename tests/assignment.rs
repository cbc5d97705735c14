/*
 * Assignment Tests
 *
 * End to end assignments through the public API: scalars, dimensions,
 * strings and structs, with the printed result or the expected error.
 */

#[macro_use]
mod cases;

use cases::array;
use ndtype::types::{
    StringEncoding, make_convert, make_fixed_dim, make_fixed_dims, make_fixed_string, make_string,
    make_struct, make_var_dim,
};
use ndtype::value::Buffer;
use ndtype::{Error, ErrorMode, Type};

fn utf8(tp: Type, text: &str) -> Buffer {
    Buffer::from_utf8(&tp, text).expect("string value")
}

assign_case! {
    name: int_to_float,
    dst: Type::float64(),
    src: Buffer::from_scalar(-12i32).unwrap(),
    errmode: ErrorMode::Default,
    expected: "-12",
}

assign_case! {
    name: fractional_float_to_int,
    dst: Type::int16(),
    src: Buffer::from_scalar(1.25f32).unwrap(),
    errmode: ErrorMode::Default,
    error: Error::Fractional { .. },
}

assign_case! {
    name: unchecked_float_to_int_truncates,
    dst: Type::int16(),
    src: Buffer::from_scalar(1.25f32).unwrap(),
    errmode: ErrorMode::None,
    expected: "1",
}

assign_case! {
    name: uint_overflow,
    dst: Type::uint8(),
    src: Buffer::from_scalar(256u16).unwrap(),
    errmode: ErrorMode::Overflow,
    error: Error::Overflow { .. },
}

assign_case! {
    name: scalar_broadcast_into_matrix,
    dst: make_fixed_dims(&[2, 3], Type::int64()),
    src: Buffer::from_scalar(4u8).unwrap(),
    errmode: ErrorMode::Default,
    expected: "[[4, 4, 4], [4, 4, 4]]",
}

assign_case! {
    name: row_broadcast_into_matrix,
    dst: make_fixed_dims(&[2, 2], Type::float64()),
    src: array(&[0.5f32, -1.0]),
    errmode: ErrorMode::Default,
    expected: "[[0.5, -1], [0.5, -1]]",
}

assign_case! {
    name: shape_mismatch,
    dst: make_fixed_dim(4, Type::int32()),
    src: array(&[1i32, 2, 3]),
    errmode: ErrorMode::Default,
    error: Error::Broadcast { .. },
}

assign_case! {
    name: var_dim_takes_source_size,
    dst: make_var_dim(Type::int32()),
    src: array(&[3u8, 2, 1]),
    errmode: ErrorMode::Default,
    expected: "[3, 2, 1]",
}

assign_case! {
    name: strings_broadcast_into_dims,
    dst: make_fixed_dim(2, make_string(StringEncoding::Utf16)),
    src: utf8(make_fixed_string(3, StringEncoding::Ascii), "abc"),
    errmode: ErrorMode::Default,
    expected: "[\"abc\", \"abc\"]",
}

assign_case! {
    name: string_overflow,
    dst: make_fixed_string(2, StringEncoding::Utf8),
    src: utf8(make_string(StringEncoding::Utf8), "abc"),
    errmode: ErrorMode::Default,
    error: Error::StringOverflow { size: 2, needed: 3 },
}

assign_case! {
    name: latin1_to_ascii_rejects_accents,
    dst: make_fixed_string(4, StringEncoding::Ascii),
    src: utf8(make_fixed_string(4, StringEncoding::Latin1), "café"),
    errmode: ErrorMode::Default,
    error: Error::Encoding { encoding: StringEncoding::Ascii, .. },
}

assign_case! {
    name: struct_by_field_name,
    dst: make_struct([("b", Type::int32()), ("a", Type::float64())]).unwrap(),
    src: {
        let mut v = Buffer::new(&make_struct([("a", Type::int8()), ("b", Type::int8())]).unwrap()).unwrap();
        unsafe {
            *v.as_mut_ptr() = 3;
            *v.as_mut_ptr().add(1) = 9;
        }
        v
    },
    errmode: ErrorMode::Default,
    expected: "[9, 3]",
}

#[test]
fn convert_expression_round_trip() {
    let ectx = ndtype::EvalContext::default();
    let tp = make_convert(&Type::float64(), &Type::int16(), ErrorMode::Default).unwrap();
    let mut expr = Buffer::new(&tp).unwrap();
    expr.assign_from(&Buffer::from_scalar(-40.0f64).unwrap(), ErrorMode::Default, &ectx)
        .unwrap();
    assert_eq!(expr.data(), &(-40i16).to_ne_bytes());
    let value = expr.eval(&ectx).unwrap();
    assert_eq!(value.tp(), &Type::float64());
    assert_eq!(value.read::<f64>().unwrap(), -40.0);
}
