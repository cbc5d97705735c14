use core::fmt;

use std::sync::Arc;

use super::base::{BaseType, Property, TypeFlags};
use super::{TypeId, TypeKind};
use crate::callables::CallableRef;
use crate::errors::{Error, Result};

/// Handle to a type: an inline builtin id or a shared extended descriptor.
///
/// Cloning is cheap (at most an atomic increment). Builtin handles never
/// allocate and have no arrmeta.
#[derive(Clone)]
pub struct Type(Repr);

#[derive(Clone)]
enum Repr {
    Builtin(TypeId),
    Extended(Arc<dyn BaseType>),
}

impl Type {
    pub fn builtin(id: TypeId) -> Result<Type> {
        if id.is_builtin() {
            Ok(Type(Repr::Builtin(id)))
        } else {
            Err(Error::Type(format!("{id} is not a builtin type id")))
        }
    }

    pub fn new<T: BaseType + 'static>(descriptor: T) -> Type {
        Type(Repr::Extended(Arc::new(descriptor)))
    }

    pub fn from_arc(descriptor: Arc<dyn BaseType>) -> Type {
        Type(Repr::Extended(descriptor))
    }

    pub const fn bool_() -> Type {
        Type(Repr::Builtin(TypeId::Bool))
    }
    pub const fn int8() -> Type {
        Type(Repr::Builtin(TypeId::Int8))
    }
    pub const fn int16() -> Type {
        Type(Repr::Builtin(TypeId::Int16))
    }
    pub const fn int32() -> Type {
        Type(Repr::Builtin(TypeId::Int32))
    }
    pub const fn int64() -> Type {
        Type(Repr::Builtin(TypeId::Int64))
    }
    pub const fn uint8() -> Type {
        Type(Repr::Builtin(TypeId::UInt8))
    }
    pub const fn uint16() -> Type {
        Type(Repr::Builtin(TypeId::UInt16))
    }
    pub const fn uint32() -> Type {
        Type(Repr::Builtin(TypeId::UInt32))
    }
    pub const fn uint64() -> Type {
        Type(Repr::Builtin(TypeId::UInt64))
    }
    pub const fn float32() -> Type {
        Type(Repr::Builtin(TypeId::Float32))
    }
    pub const fn float64() -> Type {
        Type(Repr::Builtin(TypeId::Float64))
    }
    pub const fn complex64() -> Type {
        Type(Repr::Builtin(TypeId::Complex64))
    }
    pub const fn complex128() -> Type {
        Type(Repr::Builtin(TypeId::Complex128))
    }
    pub const fn void() -> Type {
        Type(Repr::Builtin(TypeId::Void))
    }

    #[inline]
    pub fn is_builtin(&self) -> bool {
        matches!(self.0, Repr::Builtin(_))
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        match &self.0 {
            Repr::Builtin(id) => *id,
            Repr::Extended(ext) => ext.id(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match &self.0 {
            Repr::Builtin(id) => id.builtin_kind(),
            Repr::Extended(ext) => ext.kind(),
        }
    }

    pub fn flags(&self) -> TypeFlags {
        match &self.0 {
            Repr::Builtin(TypeId::Uninitialized) => TypeFlags::empty(),
            Repr::Builtin(_) => TypeFlags::SCALAR,
            Repr::Extended(ext) => ext.flags(),
        }
    }

    /// Borrowed view of the descriptor, `None` for builtins.
    pub fn extended(&self) -> Option<&dyn BaseType> {
        match &self.0 {
            Repr::Builtin(_) => None,
            Repr::Extended(ext) => Some(ext.as_ref()),
        }
    }

    /// Checked downcast to a concrete descriptor.
    pub fn extended_as<T: BaseType + 'static>(&self) -> Option<&T> {
        self.extended()?.as_any().downcast_ref::<T>()
    }

    pub fn data_size(&self) -> usize {
        match &self.0 {
            Repr::Builtin(id) => id.builtin_data_size(),
            Repr::Extended(ext) => ext.data_size(),
        }
    }

    pub fn data_alignment(&self) -> usize {
        match &self.0 {
            Repr::Builtin(id) => id.builtin_data_alignment(),
            Repr::Extended(ext) => ext.data_alignment(),
        }
    }

    pub fn arrmeta_size(&self) -> usize {
        self.extended().map_or(0, |ext| ext.arrmeta_size())
    }

    pub fn ndim(&self) -> usize {
        self.extended().map_or(0, |ext| ext.ndim())
    }

    /// Plain old data: fixed size, no references, no destructor.
    pub fn is_pod(&self) -> bool {
        match &self.0 {
            Repr::Builtin(id) => *id != TypeId::Uninitialized,
            Repr::Extended(ext) => {
                ext.data_size() > 0
                    && !ext.flags().intersects(
                        TypeFlags::BLOCKREF
                            | TypeFlags::DESTRUCTOR
                            | TypeFlags::SYMBOLIC
                            | TypeFlags::EXPRESSION,
                    )
            }
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.flags().contains(TypeFlags::SCALAR)
    }

    pub fn is_expression(&self) -> bool {
        self.kind() == TypeKind::Expression
    }

    pub fn is_symbolic(&self) -> bool {
        self.flags().contains(TypeFlags::SYMBOLIC)
    }

    pub fn is_variadic(&self) -> bool {
        self.flags().contains(TypeFlags::VARIADIC)
    }

    /// The logical type of the values. Identity for non expression types.
    pub fn value_type(&self) -> &Type {
        match self.extended().and_then(|ext| ext.as_expression()) {
            Some(expr) => expr.value_type(),
            None => self,
        }
    }

    /// The type of the underlying bytes, following operand types to the end
    /// of the expression chain.
    pub fn storage_type(&self) -> &Type {
        let mut tp = self;
        while let Some(expr) = tp.extended().and_then(|ext| ext.as_expression()) {
            tp = expr.operand_type();
        }
        tp
    }

    pub fn canonical_type(&self) -> Type {
        self.extended()
            .and_then(|ext| ext.canonical_type())
            .unwrap_or_else(|| self.clone())
    }

    pub fn is_type_subarray(&self, sub: &Type) -> bool {
        if self == sub {
            return true;
        }
        self.extended().is_some_and(|ext| ext.is_type_subarray(sub))
    }

    /// Whether assigning any value of `src` into `self` is exact.
    pub fn is_lossless_assignment_from(&self, src: &Type) -> bool {
        if self == src {
            return true;
        }
        match (&self.0, &src.0) {
            (Repr::Builtin(dst), Repr::Builtin(src)) => is_lossless_builtin_assignment(*dst, *src),
            (Repr::Extended(ext), _) => ext.is_lossless_assignment(self, src),
            (_, Repr::Extended(ext)) => ext.is_lossless_assignment(self, src),
        }
    }

    /// Whether bytes laid out for `rhs` can be reinterpreted as `self`.
    pub fn data_layout_compatible_with(&self, rhs: &Type) -> bool {
        if self == rhs {
            return true;
        }
        if self.is_builtin() && rhs.is_builtin() {
            return self.data_size() == rhs.data_size() && self.kind() == rhs.kind();
        }
        match (self.extended().and_then(|e| e.as_dim()), rhs.extended().and_then(|e| e.as_dim())) {
            (Some(l), Some(r)) => {
                self.id() == rhs.id()
                    && l.fixed_size() == r.fixed_size()
                    && l.element_type().data_layout_compatible_with(r.element_type())
            }
            _ => false,
        }
    }

    /// Type obtained by indexing with one integer.
    pub fn at_single(&self, i0: isize) -> Result<Type> {
        self.extended()
            .and_then(|ext| ext.at_single(i0))
            .unwrap_or_else(|| {
                Err(Error::TooManyIndices {
                    tp: self.to_string(),
                    attempted: 1,
                    ndim: self.ndim(),
                })
            })
    }

    /// Type after peeling `i` leading dimensions.
    pub fn type_at_dimension(&self, i: usize) -> Result<Type> {
        let mut tp = self;
        for _ in 0..i {
            tp = tp
                .extended()
                .and_then(|ext| ext.as_dim())
                .map(|dim| dim.element_type())
                .ok_or_else(|| Error::TooManyIndices {
                    tp: self.to_string(),
                    attempted: i,
                    ndim: self.ndim(),
                })?;
        }
        Ok(tp.clone())
    }

    /// The element type below all but `include_ndim` dimensions.
    pub fn dtype(&self, include_ndim: usize) -> Result<Type> {
        let ndim = self.ndim();
        if include_ndim > ndim {
            return Err(Error::Type(format!(
                "cannot keep {include_ndim} dimensions of {self}, which has {ndim}"
            )));
        }
        self.type_at_dimension(ndim - include_ndim)
    }

    /// Rebuilds the dimensions of this type around `replacement`.
    pub fn with_replaced_dtype(&self, replacement: &Type) -> Result<Type> {
        match self.extended().and_then(|ext| ext.as_dim()) {
            Some(dim) => {
                let element = dim.element_type().with_replaced_dtype(replacement)?;
                dim.with_element_type(element)
            }
            None => Ok(replacement.clone()),
        }
    }

    pub fn properties(&self) -> Vec<(&'static str, Property)> {
        self.extended().map_or_else(Vec::new, |ext| ext.properties())
    }

    pub fn property(&self, name: &str) -> Result<Property> {
        self.properties()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p)
            .ok_or_else(|| Error::Type(format!("type {self} has no property {name:?}")))
    }

    pub fn dynamic_array_functions(&self) -> Vec<(&'static str, CallableRef)> {
        self.extended()
            .map_or_else(Vec::new, |ext| ext.dynamic_array_functions())
    }

    pub fn dynamic_array_function(&self, name: &str) -> Result<CallableRef> {
        self.dynamic_array_functions()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| f)
            .ok_or_else(|| Error::Type(format!("type {self} has no array function {name:?}")))
    }

    /// Writes the value stored at `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to an initialised instance of this type described by
    /// `arrmeta`.
    pub unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        match &self.0 {
            Repr::Builtin(id) => unsafe { crate::kernels::builtin::print_builtin(*id, out, data) },
            Repr::Extended(ext) => unsafe { ext.print_data(out, arrmeta, data) },
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Type(Repr::Builtin(TypeId::Uninitialized))
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Builtin(a), Repr::Builtin(b)) => a == b,
            (Repr::Extended(a), Repr::Extended(b)) => {
                core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)) || a.equals(b.as_ref())
            }
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Builtin(id) => f.write_str(id.name()),
            Repr::Extended(ext) => ext.print_type(f),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn is_lossless_builtin_assignment(dst: TypeId, src: TypeId) -> bool {
    use TypeKind::*;

    let (dst_kind, src_kind) = (dst.builtin_kind(), src.builtin_kind());
    let (dst_size, src_size) = (dst.builtin_data_size(), src.builtin_data_size());
    match (dst_kind, src_kind) {
        (_, Bool) => matches!(dst_kind, Bool | SInt | UInt | Real | Complex),
        (SInt, SInt) | (UInt, UInt) | (Real, Real) | (Complex, Complex) => dst_size >= src_size,
        (SInt, UInt) => dst_size > src_size,
        // float32 has 24 bits of mantissa, float64 has 53.
        (Real, SInt | UInt) => src_size < dst_size,
        (Complex, SInt | UInt) => src_size < dst_size / 2,
        (Complex, Real) => dst_size >= 2 * src_size,
        _ => false,
    }
}
