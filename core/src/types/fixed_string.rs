use core::fmt;

use super::base::{BaseType, Property, StringType, TypeFlags};
use super::encoding::StringEncoding;
use super::{Type, TypeId, TypeKind};
use crate::callables::{CallableRef, string_functions};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode, KernelBuilder, KernelRequest, string_kernels};

/// A string stored inline in a fixed number of code units, padded with zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStringType {
    string_size: usize,
    encoding: StringEncoding,
}

pub fn make_fixed_string(string_size: usize, encoding: StringEncoding) -> Type {
    Type::new(FixedStringType::new(string_size, encoding))
}

impl FixedStringType {
    /// `string_size` counts code units, so the data size is
    /// `string_size * encoding.unit_size()` bytes.
    pub fn new(string_size: usize, encoding: StringEncoding) -> Self {
        Self {
            string_size,
            encoding,
        }
    }

    pub fn string_size(&self) -> usize {
        self.string_size
    }

    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    pub fn byte_size(&self) -> usize {
        self.string_size * self.encoding.unit_size()
    }

    /// The encoded bytes of the string in `data`, without zero padding.
    pub fn range_of<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        let data = self.checked(data.len()).map(|n| &data[..n])?;
        let unit = self.encoding.unit_size();
        let mut end = data.len();
        while end >= unit && data[end - unit..end].iter().all(|&b| b == 0) {
            end -= unit;
        }
        Ok(&data[..end])
    }

    /// Encodes `utf8` into `data` and zero-fills the rest of the buffer.
    ///
    /// When the string does not fit, `ErrorMode::None` truncates at a code
    /// point boundary and every other mode raises `StringOverflow`.
    pub fn set_utf8(&self, data: &mut [u8], errmode: ErrorMode, utf8: &[u8]) -> Result<()> {
        let n = self.checked(data.len())?;
        let text = StringEncoding::Utf8.decode(utf8, errmode)?;
        let encoded = self.encoding.encode(&text, errmode)?;
        self.store_encoded(&mut data[..n], errmode, &encoded)
    }

    pub fn to_utf8(&self, data: &[u8], errmode: ErrorMode) -> Result<String> {
        self.encoding.decode(self.range_of(data)?, errmode)
    }

    /// Copies already encoded bytes into `data`, which is exactly
    /// [`FixedStringType::byte_size`] long.
    pub(crate) fn store_encoded(
        &self,
        data: &mut [u8],
        errmode: ErrorMode,
        encoded: &[u8],
    ) -> Result<()> {
        let size = data.len();
        let len = if encoded.len() > size {
            if errmode != ErrorMode::None {
                return Err(Error::StringOverflow {
                    size,
                    needed: encoded.len(),
                });
            }
            self.encoding.truncation_point(encoded, size)
        } else {
            encoded.len()
        };
        data[..len].copy_from_slice(&encoded[..len]);
        data[len..].fill(0);
        Ok(())
    }

    fn checked(&self, len: usize) -> Result<usize> {
        let size = self.byte_size();
        if len < size {
            return Err(Error::Type(format!(
                "buffer of {len} bytes is too small for a fixed string of {size} bytes"
            )));
        }
        Ok(size)
    }
}

impl StringType for FixedStringType {
    fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    unsafe fn string_range<'a>(&self, _arrmeta: &[u8], data: *const u8) -> Result<&'a [u8]> {
        // SAFETY: the caller guarantees `byte_size` readable bytes.
        let bytes = unsafe { core::slice::from_raw_parts(data, self.byte_size()) };
        self.range_of(bytes)
    }

    unsafe fn set_utf8_string(
        &self,
        _arrmeta: &[u8],
        data: *mut u8,
        errmode: ErrorMode,
        utf8: &[u8],
    ) -> Result<()> {
        // SAFETY: the caller guarantees `byte_size` writable bytes.
        let bytes = unsafe { core::slice::from_raw_parts_mut(data, self.byte_size()) };
        self.set_utf8(bytes, errmode, utf8)
    }
}

impl BaseType for FixedStringType {
    fn id(&self) -> TypeId {
        TypeId::FixedString
    }

    fn kind(&self) -> TypeKind {
        TypeKind::String
    }

    fn data_size(&self) -> usize {
        self.byte_size()
    }

    fn data_alignment(&self) -> usize {
        self.encoding.unit_size()
    }

    fn flags(&self) -> TypeFlags {
        TypeFlags::SCALAR
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            StringEncoding::Utf8 => write!(f, "string[{}]", self.string_size),
            enc => write!(f, "string[{},'{}']", self.string_size, enc),
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
        let (Some(dst), Some(src)) = (
            dst.extended_as::<FixedStringType>(),
            src.extended_as::<FixedStringType>(),
        ) else {
            return false;
        };
        if dst.encoding == src.encoding {
            return dst.byte_size() >= src.byte_size();
        }
        if dst.encoding.max_code_point() < src.encoding.max_code_point() {
            return false;
        }
        let needed = src.encoding.max_code_points(src.byte_size())
            * dst.encoding.max_bytes_per_code_point(src.encoding);
        dst.byte_size() >= needed
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("encoding", Property::Str(self.encoding.name().to_string())),
            ("string_size", Property::Int(self.string_size as i64)),
        ]
    }

    fn dynamic_array_functions(&self) -> Vec<(&'static str, CallableRef)> {
        vec![("utf8_len", string_functions::utf8_len())]
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
