use super::*;
use crate::errors::Error;
use crate::types::{StringEncoding, StructType, make_fixed_dim, make_string, make_struct, make_var_dim};
use pretty_assertions::assert_eq;

fn blockref_of(arrmeta: &[u8]) -> Option<Arc<MemoryBlock>> {
    unsafe { memory_block::get(&arrmeta[..BLOCKREF_SIZE]) }
}

#[test]
fn test_builtin_arrmeta_is_empty() {
    let meta = Arrmeta::new(&Type::int32(), &[], None).unwrap();
    assert!(meta.as_bytes().is_empty());
    assert_eq!(format!("{meta:?}"), "arrmeta for int32\n");
}

#[test]
fn test_fixed_dim_checks_shape() {
    let tp = make_fixed_dim(3, make_fixed_dim(2, Type::int8()));
    assert!(Arrmeta::new(&tp, &[3, 2], None).is_ok());
    // Negative extents leave the dimension unconstrained.
    assert!(Arrmeta::new(&tp, &[-1, 2], None).is_ok());
    assert!(matches!(Arrmeta::new(&tp, &[3, 5], None), Err(Error::Type(_))));
}

#[test]
fn test_too_small_buffer() {
    let tp = make_string(StringEncoding::Utf8);
    let mut bytes = [0u8; BLOCKREF_SIZE - 1];
    let err = arrmeta_default_construct(&tp, &mut bytes, &[], None).unwrap_err();
    assert!(matches!(err, Error::Type(_)), "{err}");
}

#[test]
fn test_shared_blockref_is_balanced() {
    let block = MemoryBlock::new();
    let tp = make_var_dim(make_string(StringEncoding::Utf8));
    let meta = Arrmeta::new(&tp, &[], Some(&block)).unwrap();
    // One reference for the dimension, one for the string below it.
    assert_eq!(Arc::strong_count(&block), 3);

    let copy = meta.clone();
    assert_eq!(Arc::strong_count(&block), 5);
    drop(meta);
    assert_eq!(Arc::strong_count(&block), 3);
    drop(copy);
    assert_eq!(Arc::strong_count(&block), 1);
}

#[test]
fn test_fresh_block_without_blockref() {
    let tp = make_var_dim(make_string(StringEncoding::Utf8));
    let meta = Arrmeta::new(&tp, &[], None).unwrap();
    let dim_block = blockref_of(meta.as_bytes()).unwrap();
    let str_block = blockref_of(&meta.as_bytes()[VarDimArrmeta::SIZE..]).unwrap();
    // The dimension's block is handed down to its elements.
    assert!(Arc::ptr_eq(&dim_block, &str_block));
}

#[test]
fn test_destruct_clears_slots() {
    let block = MemoryBlock::new();
    let tp = make_string(StringEncoding::Utf8);
    let mut bytes = vec![0u8; tp.arrmeta_size()];
    arrmeta_default_construct(&tp, &mut bytes, &[], Some(&block)).unwrap();
    assert_eq!(Arc::strong_count(&block), 2);
    unsafe {
        arrmeta_destruct(&tp, &mut bytes);
        arrmeta_destruct(&tp, &mut bytes);
    }
    assert_eq!(Arc::strong_count(&block), 1);
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn test_struct_arrmeta_offsets() {
    let tp = make_struct([
        ("a", Type::int32()),
        ("s", make_string(StringEncoding::Utf8)),
        ("d", make_fixed_dim(2, Type::int8())),
    ])
    .unwrap();
    let st = tp.extended_as::<StructType>().unwrap();
    assert_eq!(st.arrmeta_offset(0), 0);
    assert_eq!(st.arrmeta_offset(1), 0);
    assert_eq!(st.arrmeta_offset(2), BLOCKREF_SIZE);
    assert_eq!(tp.arrmeta_size(), BLOCKREF_SIZE + SizeStride::SIZE);
    assert_eq!(st.data_offset(0), 0);

    let block = MemoryBlock::new();
    let meta = Arrmeta::new(&tp, &[], Some(&block)).unwrap();
    assert_eq!(
        SizeStride::read(st.field_arrmeta(meta.as_bytes(), 2)),
        SizeStride { dim_size: 2, stride: 1 }
    );
    assert_eq!(Arc::strong_count(&block), 2);
    drop(meta);
    assert_eq!(Arc::strong_count(&block), 1);
}

#[test]
fn test_debug_print_nests() {
    let tp = make_fixed_dim(2, make_fixed_dim(3, Type::int16()));
    let meta = Arrmeta::new(&tp, &[], None).unwrap();
    let printed = format!("{meta:?}");
    assert!(printed.starts_with("arrmeta for 2 * 3 * int16\n"), "{printed}");
    assert!(printed.contains(" fixed_dim arrmeta\n  size: 2\n  stride: 6\n"), "{printed}");
    assert!(printed.contains("  fixed_dim arrmeta\n   size: 3\n   stride: 2\n"), "{printed}");
}
