use core::fmt;
use std::sync::Arc;

use super::base::{BaseType, Property, StringType, TypeFlags};
use super::encoding::StringEncoding;
use super::{Type, TypeId, TypeKind};
use crate::callables::{CallableRef, string_functions};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode, KernelBuilder, KernelRequest, string_kernels};
use crate::metadata::{BLOCKREF_SIZE, MemoryBlock, USIZE, memory_block};

/// Data of a variable-length string: a `[begin, end)` byte range owned by the
/// memory block referenced from the arrmeta.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StringData {
    pub begin: *const u8,
    pub end: *const u8,
}

static_assertions::const_assert_eq!(core::mem::size_of::<StringData>(), 2 * USIZE);

/// A variable-length string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarStringType {
    encoding: StringEncoding,
}

pub fn make_string(encoding: StringEncoding) -> Type {
    Type::new(VarStringType::new(encoding))
}

impl VarStringType {
    pub fn new(encoding: StringEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    fn block_of(arrmeta: &[u8]) -> Result<Arc<MemoryBlock>> {
        // SAFETY: string arrmeta is a blockref slot managed by this type.
        unsafe { memory_block::get(&arrmeta[..BLOCKREF_SIZE]) }
            .ok_or_else(|| Error::Type("string arrmeta has no memory block to allocate into".to_string()))
    }
}

impl StringType for VarStringType {
    fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    unsafe fn string_range<'a>(&self, _arrmeta: &[u8], data: *const u8) -> Result<&'a [u8]> {
        // SAFETY: the caller guarantees `data` holds a `StringData`.
        let sd = unsafe { core::ptr::read_unaligned(data as *const StringData) };
        if sd.begin.is_null() {
            return Ok(&[]);
        }
        // SAFETY: `begin..end` was written by `set_utf8_string` or an
        // assignment kernel and lives in the referenced memory block.
        let len = unsafe { sd.end.offset_from(sd.begin) };
        if len < 0 {
            return Err(Error::Type(format!("string data ends {} bytes before it begins", -len)));
        }
        Ok(unsafe { core::slice::from_raw_parts(sd.begin, len as usize) })
    }

    unsafe fn set_utf8_string(
        &self,
        arrmeta: &[u8],
        data: *mut u8,
        errmode: ErrorMode,
        utf8: &[u8],
    ) -> Result<()> {
        let text = StringEncoding::Utf8.decode(utf8, errmode)?;
        let encoded = self.encoding.encode(&text, errmode)?;
        let block = Self::block_of(arrmeta)?;
        unsafe { store_string(&block, data, &encoded, self.encoding.unit_size()) }
    }
}

/// Copies `encoded` into `block` and points the string at `data` to it.
///
/// # Safety
///
/// `data` must point to writable storage for a `StringData`.
pub(crate) unsafe fn store_string(
    block: &MemoryBlock,
    data: *mut u8,
    encoded: &[u8],
    align: usize,
) -> Result<()> {
    let begin = block.allocate_copy(encoded, align)?.as_ptr() as *const u8;
    let sd = StringData {
        begin,
        // SAFETY: one past the end of the allocation.
        end: unsafe { begin.add(encoded.len()) },
    };
    unsafe { core::ptr::write_unaligned(data as *mut StringData, sd) };
    Ok(())
}

impl BaseType for VarStringType {
    fn id(&self) -> TypeId {
        TypeId::String
    }

    fn kind(&self) -> TypeKind {
        TypeKind::String
    }

    fn data_size(&self) -> usize {
        core::mem::size_of::<StringData>()
    }

    fn data_alignment(&self) -> usize {
        core::mem::align_of::<StringData>()
    }

    fn flags(&self) -> TypeFlags {
        TypeFlags::SCALAR | TypeFlags::BLOCKREF
    }

    fn arrmeta_size(&self) -> usize {
        BLOCKREF_SIZE
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            StringEncoding::Utf8 => f.write_str("string"),
            enc => write!(f, "string['{enc}']"),
        }
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        let bytes = unsafe { self.string_range(arrmeta, data) }.map_err(|_| fmt::Error)?;
        let text = self
            .encoding
            .decode(bytes, ErrorMode::None)
            .map_err(|_| fmt::Error)?;
        write!(out, "{text:?}")
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        let Some(dst) = dst.extended_as::<VarStringType>() else {
            return false;
        };
        src.extended()
            .and_then(|ext| ext.as_string())
            .is_some_and(|src| dst.encoding.max_code_point() >= src.encoding().max_code_point())
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![("encoding", Property::Str(self.encoding.name().to_string()))]
    }

    fn dynamic_array_functions(&self) -> Vec<(&'static str, CallableRef)> {
        vec![("utf8_len", string_functions::utf8_len())]
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        _shape: &[isize],
        blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        let block = blockref.cloned().unwrap_or_else(MemoryBlock::new);
        memory_block::store(&mut arrmeta[..BLOCKREF_SIZE], block);
        Ok(())
    }

    unsafe fn arrmeta_copy_construct(&self, dst: &mut [u8], src: &[u8]) {
        unsafe { memory_block::copy(&mut dst[..BLOCKREF_SIZE], &src[..BLOCKREF_SIZE]) };
    }

    unsafe fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        unsafe { memory_block::release(&mut arrmeta[..BLOCKREF_SIZE]) };
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        let raw = crate::metadata::read_usize(arrmeta, 0);
        writeln!(out, "{indent}string arrmeta")?;
        writeln!(out, "{indent} blockref: {raw:#x}")
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tp: &Type,
        src_meta: &[u8],
        _kernreq: KernelRequest,
        errmode: ErrorMode,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        string_kernels::make_string_assignment_kernel(ckb, dst_tp, dst_meta, src_tp, src_meta, errmode)
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        src0_tp: &Type,
        src0_meta: &[u8],
        src1_tp: &Type,
        src1_meta: &[u8],
        comptype: ComparisonType,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        string_kernels::make_string_comparison_kernel(
            ckb, src0_tp, src0_meta, src1_tp, src1_meta, comptype,
        )
    }

    fn as_string(&self) -> Option<&dyn StringType> {
        Some(self)
    }
}
