use super::*;
use crate::errors::Error;
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode};
use crate::value::Buffer;
use pretty_assertions::assert_eq;

fn fixed(size: usize, encoding: StringEncoding) -> Type {
    make_fixed_string(size, encoding)
}

#[test]
fn test_layout_counts_code_units() {
    let tp = FixedStringType::new(5, StringEncoding::Utf16);
    assert_eq!(tp.byte_size(), 10);
    let tp = fixed(5, StringEncoding::Utf32);
    assert_eq!(tp.data_size(), 20);
    assert_eq!(tp.data_alignment(), 4);
    assert_eq!(tp.arrmeta_size(), 0);
    assert!(tp.is_pod());
}

#[test]
fn test_utf8_round_trip() {
    let tp = FixedStringType::new(8, StringEncoding::Utf8);
    let mut data = [0xffu8; 8];
    tp.set_utf8(&mut data, ErrorMode::Inexact, "hí".as_bytes()).unwrap();
    assert_eq!(&data[..3], "hí".as_bytes());
    assert!(data[3..].iter().all(|&b| b == 0));
    assert_eq!(tp.range_of(&data).unwrap(), "hí".as_bytes());
    assert_eq!(tp.to_utf8(&data, ErrorMode::Inexact).unwrap(), "hí");
}

#[test]
fn test_overflow_raises_unless_unchecked() {
    let tp = FixedStringType::new(5, StringEncoding::Utf8);
    let mut data = [0u8; 5];
    let err = tp
        .set_utf8(&mut data, ErrorMode::Fractional, b"hello world")
        .unwrap_err();
    assert_eq!(err, Error::StringOverflow { size: 5, needed: 11 });

    tp.set_utf8(&mut data, ErrorMode::None, b"hello world").unwrap();
    assert_eq!(tp.to_utf8(&data, ErrorMode::None).unwrap(), "hello");
}

#[test]
fn test_truncation_keeps_whole_code_points() {
    let tp = FixedStringType::new(2, StringEncoding::Utf8);
    let mut data = [0u8; 2];
    tp.set_utf8(&mut data, ErrorMode::None, "hí".as_bytes()).unwrap();
    assert_eq!(tp.to_utf8(&data, ErrorMode::Inexact).unwrap(), "h");
}

#[test]
fn test_short_buffer_is_a_type_error() {
    let tp = FixedStringType::new(4, StringEncoding::Utf16);
    let mut data = [0u8; 6];
    assert!(matches!(
        tp.set_utf8(&mut data, ErrorMode::None, b"ab"),
        Err(Error::Type(_))
    ));
}

#[test]
fn test_assign_into_wider_fixed_string() {
    let ectx = EvalContext::default();
    let src = Buffer::from_utf8(&fixed(5, StringEncoding::Utf8), "hí").unwrap();
    let mut dst = Buffer::new(&fixed(10, StringEncoding::Utf8)).unwrap();
    dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(dst.to_utf8().unwrap(), "hí");
    assert_eq!(dst.to_string(), "\"hí\"");
    assert!(dst.data()[3..].iter().all(|&b| b == 0));
}

#[test]
fn test_assign_into_narrower_fixed_string() {
    let ectx = EvalContext::default();
    let src = Buffer::from_utf8(&fixed(8, StringEncoding::Utf8), "abcdef").unwrap();
    let mut dst = Buffer::new(&fixed(3, StringEncoding::Utf8)).unwrap();
    let err = dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap_err();
    assert!(matches!(err, Error::StringOverflow { size: 3, needed: 6 }), "{err}");

    dst.assign_from(&src, ErrorMode::None, &ectx).unwrap();
    assert_eq!(dst.to_utf8().unwrap(), "abc");
}

#[test]
fn test_transcoding_assignment() {
    let ectx = EvalContext::default();
    let err = Buffer::from_utf8(&fixed(6, StringEncoding::Utf8), "hí😀").unwrap_err();
    assert!(matches!(err, Error::StringOverflow { .. }));

    let src = Buffer::from_utf8(&fixed(8, StringEncoding::Utf8), "hí😀").unwrap();
    let mut utf16 = Buffer::new(&fixed(4, StringEncoding::Utf16)).unwrap();
    utf16.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(utf16.to_utf8().unwrap(), "hí😀");

    let mut latin1 = Buffer::new(&make_string(StringEncoding::Latin1)).unwrap();
    let short = Buffer::from_utf8(&fixed(4, StringEncoding::Utf8), "hí").unwrap();
    latin1.assign_from(&short, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(latin1.to_utf8().unwrap(), "hí");

    let mut ascii = Buffer::new(&fixed(4, StringEncoding::Ascii)).unwrap();
    let err = ascii.assign_from(&src, ErrorMode::Default, &ectx).unwrap_err();
    assert!(matches!(err, Error::Encoding { encoding: StringEncoding::Ascii, .. }), "{err}");
}

#[test]
fn test_var_string_to_fixed() {
    let ectx = EvalContext::default();
    let src = Buffer::from_utf8(&make_string(StringEncoding::Utf8), "hello").unwrap();
    let mut dst = Buffer::new(&fixed(8, StringEncoding::Ascii)).unwrap();
    dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(dst.to_utf8().unwrap(), "hello");
    assert_eq!(&dst.data()[..6], b"hello\0");
}

#[test]
fn test_compare_across_encodings() {
    let ectx = EvalContext::default();
    let a = Buffer::from_utf8(&fixed(4, StringEncoding::Utf8), "abc").unwrap();
    let b = Buffer::from_utf8(&make_string(StringEncoding::Utf16), "abd").unwrap();
    let c = Buffer::from_utf8(&fixed(3, StringEncoding::Utf32), "abc").unwrap();
    assert!(a.compare(&b, ComparisonType::Less, &ectx).unwrap());
    assert!(!a.compare(&b, ComparisonType::Equal, &ectx).unwrap());
    assert!(a.compare(&c, ComparisonType::Equal, &ectx).unwrap());
    assert!(b.compare(&c, ComparisonType::GreaterEqual, &ectx).unwrap());

    let n = Buffer::from_scalar(1i32).unwrap();
    assert!(matches!(
        a.compare(&n, ComparisonType::Equal, &ectx),
        Err(Error::NoKernel { .. })
    ));
}

#[test]
fn test_lossless_string_assignment() {
    let utf8_5 = fixed(5, StringEncoding::Utf8);
    assert!(utf8_5.is_lossless_assignment_from(&fixed(4, StringEncoding::Utf8)));
    assert!(!utf8_5.is_lossless_assignment_from(&fixed(6, StringEncoding::Utf8)));
    assert!(utf8_5.is_lossless_assignment_from(&fixed(5, StringEncoding::Ascii)));
    assert!(!utf8_5.is_lossless_assignment_from(&fixed(5, StringEncoding::Latin1)));
    let ascii = fixed(8, StringEncoding::Ascii);
    assert!(!ascii.is_lossless_assignment_from(&fixed(1, StringEncoding::Utf8)));
    let var = make_string(StringEncoding::Utf8);
    assert!(var.is_lossless_assignment_from(&fixed(3, StringEncoding::Latin1)));
}

#[test]
fn test_string_range_reports_bad_storage() {
    let tp = FixedStringType::new(4, StringEncoding::Utf8);
    assert!(matches!(tp.range_of(&[b'a'; 2]), Err(Error::Type(_))));
    let data = *b"ab\0\0";
    assert_eq!(unsafe { tp.string_range(&[], data.as_ptr()) }.unwrap(), b"ab");

    // A var string whose range runs backwards is an error, not "".
    let var = VarStringType::new(StringEncoding::Utf8);
    let text = b"xyz";
    let sd = string::StringData {
        begin: text.as_ptr().wrapping_add(2),
        end: text.as_ptr(),
    };
    let range = unsafe { var.string_range(&[], &sd as *const _ as *const u8) };
    assert!(matches!(range, Err(Error::Type(_))));
}

#[test]
fn test_ascii_source_with_high_bytes() {
    let ectx = EvalContext::default();
    let mut src = Buffer::new(&fixed(3, StringEncoding::Ascii)).unwrap();
    unsafe { core::ptr::copy_nonoverlapping(b"a\xe9b".as_ptr(), src.as_mut_ptr(), 3) };

    let mut dst = Buffer::new(&fixed(8, StringEncoding::Utf8)).unwrap();
    let err = dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap_err();
    assert!(matches!(err, Error::Encoding { encoding: StringEncoding::Ascii, .. }), "{err}");

    // Unchecked, the byte is replaced and the result is still valid UTF-8.
    dst.assign_from(&src, ErrorMode::None, &ectx).unwrap();
    assert_eq!(dst.to_utf8().unwrap(), "a\u{fffd}b");

    let mut latin1 = Buffer::new(&fixed(3, StringEncoding::Latin1)).unwrap();
    latin1.assign_from(&src, ErrorMode::None, &ectx).unwrap();
    assert_eq!(latin1.data(), b"a?b");

    // Plain ASCII takes the byte copy.
    unsafe { *src.as_mut_ptr().add(1) = b'c' };
    dst.assign_from(&src, ErrorMode::Default, &ectx).unwrap();
    assert_eq!(dst.to_utf8().unwrap(), "acb");
}
