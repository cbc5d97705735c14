//! Array dimension types.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use super::base::{BaseType, Property, TypeFlags};
use super::matching::TypeVars;
use super::{Type, TypeId, TypeKind};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ErrorMode, KernelBuilder, KernelRequest, dim_kernels};
use crate::metadata::{
    self, BLOCKREF_SIZE, MemoryBlock, SizeStride, USIZE, VarDimArrmeta, memory_block,
};

/// Shared view of the dimension types, symbolic ones included.
pub trait DimType: Send + Sync {
    fn element_type(&self) -> &Type;

    /// A dimension of the same kind around a different element type.
    fn with_element_type(&self, element: Type) -> Result<Type>;

    fn fixed_size(&self) -> Option<usize> {
        None
    }
}

/// `N * T`: a strided dimension whose size is part of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDimType {
    dim_size: usize,
    element: Type,
}

pub fn make_fixed_dim(dim_size: usize, element: Type) -> Type {
    Type::new(FixedDimType { dim_size, element })
}

/// `shape[0] * shape[1] * ... * dtype`.
pub fn make_fixed_dims(shape: &[usize], dtype: Type) -> Type {
    shape
        .iter()
        .rev()
        .fold(dtype, |element, &n| make_fixed_dim(n, element))
}

impl FixedDimType {
    pub fn dim_size(&self) -> usize {
        self.dim_size
    }
}

impl DimType for FixedDimType {
    fn element_type(&self) -> &Type {
        &self.element
    }

    fn with_element_type(&self, element: Type) -> Result<Type> {
        Ok(make_fixed_dim(self.dim_size, element))
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(self.dim_size)
    }
}

impl BaseType for FixedDimType {
    fn id(&self) -> TypeId {
        TypeId::FixedDim
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Dim
    }

    fn data_size(&self) -> usize {
        self.dim_size * self.element.data_size()
    }

    fn data_alignment(&self) -> usize {
        self.element.data_alignment()
    }

    fn flags(&self) -> TypeFlags {
        self.element.flags().inherited()
    }

    fn arrmeta_size(&self) -> usize {
        SizeStride::SIZE + self.element.arrmeta_size()
    }

    fn ndim(&self) -> usize {
        1 + self.element.ndim()
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} * {}", self.dim_size, self.element)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        let ss = SizeStride::read(arrmeta);
        let element_meta = &arrmeta[SizeStride::SIZE..];
        out.write_str("[")?;
        for i in 0..ss.dim_size {
            if i > 0 {
                out.write_str(", ")?;
            }
            let element = data.wrapping_offset(i as isize * ss.stride);
            unsafe { self.element.print_data(out, element_meta, element)? };
        }
        out.write_str("]")
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn canonical_type(&self) -> Option<Type> {
        let element = self.element.canonical_type();
        (element != self.element).then(|| make_fixed_dim(self.dim_size, element))
    }

    fn is_type_subarray(&self, sub: &Type) -> bool {
        self.element.is_type_subarray(sub)
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        match (
            dst.extended_as::<FixedDimType>(),
            src.extended_as::<FixedDimType>(),
        ) {
            (Some(dst), Some(src)) => {
                dst.dim_size == src.dim_size
                    && dst.element.is_lossless_assignment_from(&src.element)
            }
            _ => false,
        }
    }

    fn at_single(&self, i0: isize) -> Option<Result<Type>> {
        let n = self.dim_size as isize;
        let i = if i0 < 0 { i0 + n } else { i0 };
        if i < 0 || i >= n {
            return Some(Err(Error::IndexOutOfBounds {
                index: i0,
                dim_size: self.dim_size,
            }));
        }
        Some(Ok(self.element.clone()))
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        candidate
            .extended_as::<FixedDimType>()
            .is_some_and(|c| c.dim_size == self.dim_size && self.element.matches(&c.element, tp_vars))
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let element = self.element.substitute(tp_vars, concrete)?;
        Ok((element != self.element).then(|| make_fixed_dim(self.dim_size, element)))
    }

    fn vars(&self, out: &mut HashSet<String>) {
        out.extend(self.element.vars());
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("dim_size", Property::Int(self.dim_size as i64)),
            ("element_type", Property::Type(self.element.clone())),
        ]
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        if let Some(&n) = shape.first() {
            if n >= 0 && n as usize != self.dim_size {
                return Err(Error::Type(format!(
                    "shape {n} does not match a fixed dimension of size {}",
                    self.dim_size
                )));
            }
        }
        SizeStride {
            dim_size: self.dim_size,
            stride: self.element.data_size() as isize,
        }
        .write(arrmeta);
        let rest = shape.get(1..).unwrap_or(&[]);
        metadata::arrmeta_default_construct(
            &self.element,
            &mut arrmeta[SizeStride::SIZE..],
            rest,
            blockref,
        )
    }

    unsafe fn arrmeta_copy_construct(&self, dst: &mut [u8], src: &[u8]) {
        SizeStride::read(src).write(dst);
        unsafe {
            metadata::arrmeta_copy_construct(
                &self.element,
                &mut dst[SizeStride::SIZE..],
                &src[SizeStride::SIZE..],
            )
        };
    }

    unsafe fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        unsafe { metadata::arrmeta_destruct(&self.element, &mut arrmeta[SizeStride::SIZE..]) };
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        let ss = SizeStride::read(arrmeta);
        writeln!(out, "{indent}fixed_dim arrmeta")?;
        writeln!(out, "{indent} size: {}", ss.dim_size)?;
        writeln!(out, "{indent} stride: {}", ss.stride)?;
        let indent = format!("{indent} ");
        metadata::arrmeta_debug_print(&self.element, &arrmeta[SizeStride::SIZE..], out, &indent)
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tp: &Type,
        src_meta: &[u8],
        kernreq: KernelRequest,
        errmode: ErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        dim_kernels::make_dim_assignment_kernel(
            ckb, dst_tp, dst_meta, src_tp, src_meta, kernreq, errmode, ectx,
        )
    }

    fn as_dim(&self) -> Option<&dyn DimType> {
        Some(self)
    }
}

/// Data of a variable dimension: element storage in the memory block
/// referenced from the arrmeta.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VarDimData {
    pub begin: *mut u8,
    pub size: usize,
}

static_assertions::const_assert_eq!(core::mem::size_of::<VarDimData>(), 2 * USIZE);

/// `var * T`: a dimension whose size is stored with each instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDimType {
    element: Type,
}

pub fn make_var_dim(element: Type) -> Type {
    Type::new(VarDimType { element })
}

impl DimType for VarDimType {
    fn element_type(&self) -> &Type {
        &self.element
    }

    fn with_element_type(&self, element: Type) -> Result<Type> {
        Ok(make_var_dim(element))
    }
}

impl BaseType for VarDimType {
    fn id(&self) -> TypeId {
        TypeId::VarDim
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Dim
    }

    fn data_size(&self) -> usize {
        core::mem::size_of::<VarDimData>()
    }

    fn data_alignment(&self) -> usize {
        core::mem::align_of::<VarDimData>()
    }

    fn flags(&self) -> TypeFlags {
        self.element.flags().inherited() | TypeFlags::BLOCKREF
    }

    fn arrmeta_size(&self) -> usize {
        VarDimArrmeta::SIZE + self.element.arrmeta_size()
    }

    fn ndim(&self) -> usize {
        1 + self.element.ndim()
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var * {}", self.element)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        let md = VarDimArrmeta::read(arrmeta);
        let element_meta = &arrmeta[VarDimArrmeta::SIZE..];
        // SAFETY: the caller guarantees `data` holds a `VarDimData`.
        let vd = unsafe { core::ptr::read_unaligned(data as *const VarDimData) };
        out.write_str("[")?;
        let begin = vd.begin.wrapping_offset(md.offset) as *const u8;
        for i in 0..vd.size {
            if i > 0 {
                out.write_str(", ")?;
            }
            let element = begin.wrapping_offset(i as isize * md.stride);
            unsafe { self.element.print_data(out, element_meta, element)? };
        }
        out.write_str("]")
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn canonical_type(&self) -> Option<Type> {
        let element = self.element.canonical_type();
        (element != self.element).then(|| make_var_dim(element))
    }

    fn is_type_subarray(&self, sub: &Type) -> bool {
        self.element.is_type_subarray(sub)
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        match (dst.extended_as::<VarDimType>(), src.extended()) {
            (Some(dst), Some(src)) => src.as_dim().is_some_and(|src| {
                dst.element.is_lossless_assignment_from(src.element_type())
            }),
            _ => false,
        }
    }

    fn at_single(&self, _i0: isize) -> Option<Result<Type>> {
        Some(Ok(self.element.clone()))
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        candidate
            .extended_as::<VarDimType>()
            .is_some_and(|c| self.element.matches(&c.element, tp_vars))
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let element = self.element.substitute(tp_vars, concrete)?;
        Ok((element != self.element).then(|| make_var_dim(element)))
    }

    fn vars(&self, out: &mut HashSet<String>) {
        out.extend(self.element.vars());
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![("element_type", Property::Type(self.element.clone()))]
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        let block = blockref.cloned().unwrap_or_else(MemoryBlock::new);
        VarDimArrmeta {
            stride: self.element.data_size() as isize,
            offset: 0,
        }
        .write(arrmeta);
        let rest = shape.get(1..).unwrap_or(&[]);
        metadata::arrmeta_default_construct(
            &self.element,
            &mut arrmeta[VarDimArrmeta::SIZE..],
            rest,
            Some(&block),
        )?;
        memory_block::store(&mut arrmeta[..BLOCKREF_SIZE], block);
        Ok(())
    }

    unsafe fn arrmeta_copy_construct(&self, dst: &mut [u8], src: &[u8]) {
        unsafe {
            memory_block::copy(&mut dst[..BLOCKREF_SIZE], &src[..BLOCKREF_SIZE]);
        }
        VarDimArrmeta::read(src).write(dst);
        unsafe {
            metadata::arrmeta_copy_construct(
                &self.element,
                &mut dst[VarDimArrmeta::SIZE..],
                &src[VarDimArrmeta::SIZE..],
            );
        }
    }

    unsafe fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        unsafe {
            metadata::arrmeta_destruct(&self.element, &mut arrmeta[VarDimArrmeta::SIZE..]);
            memory_block::release(&mut arrmeta[..BLOCKREF_SIZE]);
        }
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        let md = VarDimArrmeta::read(arrmeta);
        writeln!(out, "{indent}var_dim arrmeta")?;
        writeln!(out, "{indent} blockref: {:#x}", metadata::read_usize(arrmeta, 0))?;
        writeln!(out, "{indent} stride: {}", md.stride)?;
        writeln!(out, "{indent} offset: {}", md.offset)?;
        let indent = format!("{indent} ");
        metadata::arrmeta_debug_print(
            &self.element,
            &arrmeta[VarDimArrmeta::SIZE..],
            out,
            &indent,
        )
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tp: &Type,
        src_meta: &[u8],
        kernreq: KernelRequest,
        errmode: ErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        dim_kernels::make_dim_assignment_kernel(
            ckb, dst_tp, dst_meta, src_tp, src_meta, kernreq, errmode, ectx,
        )
    }

    fn as_dim(&self) -> Option<&dyn DimType> {
        Some(self)
    }
}
