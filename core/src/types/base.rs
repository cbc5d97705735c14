//! The descriptor trait every extended type implements.

use core::any::Any;
use core::fmt;

use bitflags::bitflags;
use hashbrown::HashSet;
use std::sync::Arc;

use super::callable_type::CallableType;
use super::convert::ExpressionType;
use super::dims::DimType;
use super::encoding::StringEncoding;
use super::matching::TypeVars;
use super::struct_type::StructType;
use super::{Type, TypeId, TypeKind};
use crate::callables::CallableRef;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode, KernelBuilder, KernelRequest};
use crate::metadata::MemoryBlock;

bitflags! {
    /// Properties of a type that containers inherit from their children.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct TypeFlags: u32 {
        /// The type behaves as a single value (no dimensions, no fields).
        const SCALAR = 1;
        /// Arrmeta holds an owning reference to a memory block.
        const BLOCKREF = 1 << 1;
        /// Data needs a destructor before its memory is released.
        const DESTRUCTOR = 1 << 2;
        /// Contains type variables or other pattern-only pieces.
        const SYMBOLIC = 1 << 3;
        /// Matches a variable number of dimensions.
        const VARIADIC = 1 << 4;
        /// Converts between a stored operand and a logical value.
        const EXPRESSION = 1 << 5;
    }
}

impl TypeFlags {
    /// Flags a container picks up from one of its children.
    pub fn inherited(self) -> TypeFlags {
        self & (TypeFlags::BLOCKREF
            | TypeFlags::DESTRUCTOR
            | TypeFlags::SYMBOLIC
            | TypeFlags::VARIADIC)
    }
}

/// Object-safe access to [`Any`], so `&dyn BaseType` can be downcast.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A named, typed property of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Int(i64),
    Str(String),
    Strs(Vec<String>),
    Type(Type),
    Types(Vec<Type>),
}

/// Shared, immutable description of an extended type.
///
/// Implementors are wrapped in an `Arc` by [`Type::new`] and never mutated
/// afterwards, so every method takes `&self` and the trait requires
/// `Send + Sync`.
pub trait BaseType: AsAny + Send + Sync + fmt::Debug {
    fn id(&self) -> TypeId;
    fn kind(&self) -> TypeKind;
    fn data_size(&self) -> usize;
    fn data_alignment(&self) -> usize;
    fn flags(&self) -> TypeFlags;

    fn arrmeta_size(&self) -> usize {
        0
    }

    fn ndim(&self) -> usize {
        0
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Writes the value stored at `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to an initialised instance of this type described by
    /// `arrmeta`.
    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result;

    /// Structural equality. Identity has already been checked by the handle.
    fn equals(&self, other: &dyn BaseType) -> bool;

    /// `None` when the type is already canonical.
    fn canonical_type(&self) -> Option<Type> {
        None
    }

    /// Whether `sub` is a strict sub-array type of this one, e.g. `int32` of
    /// `3 * int32`. The handle checks equality first.
    fn is_type_subarray(&self, _sub: &Type) -> bool {
        false
    }

    /// Whether every value of `src` is representable in `dst`. Called on the
    /// descriptor of whichever side is extended.
    fn is_lossless_assignment(&self, _dst: &Type, _src: &Type) -> bool {
        false
    }

    /// Type obtained by indexing with one integer. `None` when the type is not
    /// indexable at all.
    fn at_single(&self, _i0: isize) -> Option<Result<Type>> {
        None
    }

    /// One directional pattern match of `self` (the pattern) against a
    /// concrete `candidate`, accumulating bindings into `tp_vars`.
    fn match_candidate(&self, candidate: &Type, _tp_vars: &mut TypeVars) -> bool {
        candidate.extended().is_some_and(|c| self.equals(c))
    }

    /// Replaces bound type variables. `Ok(None)` means the type is unchanged.
    /// With `concrete` set, unbound variables are an error.
    fn substitute(&self, _tp_vars: &TypeVars, _concrete: bool) -> Result<Option<Type>> {
        Ok(None)
    }

    fn vars(&self, _out: &mut HashSet<String>) {}

    fn properties(&self) -> Vec<(&'static str, Property)> {
        Vec::new()
    }

    /// Callables applicable to arrays of this type, by name.
    fn dynamic_array_functions(&self) -> Vec<(&'static str, CallableRef)> {
        Vec::new()
    }

    fn arrmeta_default_construct(
        &self,
        _arrmeta: &mut [u8],
        _shape: &[isize],
        _blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        Ok(())
    }

    /// # Safety
    ///
    /// `src` must hold constructed arrmeta for this type and `dst` must not.
    unsafe fn arrmeta_copy_construct(&self, _dst: &mut [u8], _src: &[u8]) {}

    /// # Safety
    ///
    /// `arrmeta` must hold constructed (or zeroed) arrmeta for this type, and
    /// must not be used again without being constructed first.
    unsafe fn arrmeta_destruct(&self, _arrmeta: &mut [u8]) {}

    fn arrmeta_debug_print(
        &self,
        _arrmeta: &[u8],
        _out: &mut dyn fmt::Write,
        _indent: &str,
    ) -> fmt::Result {
        Ok(())
    }

    /// Appends an assignment kernel. Reached when at least one side is this
    /// (non expression) descriptor; unsupported pairs report `NoKernel`.
    #[allow(clippy::too_many_arguments)]
    fn make_assignment_kernel(
        &self,
        _ckb: &mut KernelBuilder,
        dst_tp: &Type,
        _dst_meta: &[u8],
        src_tp: &Type,
        _src_meta: &[u8],
        _kernreq: KernelRequest,
        _errmode: ErrorMode,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        Err(Error::no_assignment(dst_tp, src_tp))
    }

    #[allow(clippy::too_many_arguments)]
    fn make_comparison_kernel(
        &self,
        _ckb: &mut KernelBuilder,
        src0_tp: &Type,
        _src0_meta: &[u8],
        src1_tp: &Type,
        _src1_meta: &[u8],
        comptype: ComparisonType,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        Err(Error::no_comparison(comptype, src0_tp, src1_tp))
    }

    fn as_expression(&self) -> Option<&dyn ExpressionType> {
        None
    }

    fn as_string(&self) -> Option<&dyn StringType> {
        None
    }

    fn as_dim(&self) -> Option<&dyn DimType> {
        None
    }

    fn as_struct(&self) -> Option<&StructType> {
        None
    }

    fn as_callable(&self) -> Option<&CallableType> {
        None
    }
}

/// Access to the characters of any string type.
pub trait StringType: Send + Sync {
    fn encoding(&self) -> StringEncoding;

    /// The encoded bytes of the logical string stored at `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to an initialised string of this type described by
    /// `arrmeta`, and the returned slice must not outlive that storage.
    unsafe fn string_range<'a>(&self, arrmeta: &[u8], data: *const u8) -> Result<&'a [u8]>;

    /// Stores `utf8` at `data`, re-encoding it as needed.
    ///
    /// # Safety
    ///
    /// `data` must point to writable storage for one value of this type
    /// described by `arrmeta`.
    unsafe fn set_utf8_string(
        &self,
        arrmeta: &[u8],
        data: *mut u8,
        errmode: ErrorMode,
        utf8: &[u8],
    ) -> Result<()>;

    /// # Safety
    ///
    /// Same requirements as [`StringType::string_range`].
    unsafe fn utf8_string(
        &self,
        arrmeta: &[u8],
        data: *const u8,
        errmode: ErrorMode,
    ) -> Result<String> {
        let bytes = unsafe { self.string_range(arrmeta, data)? };
        self.encoding().decode(bytes, errmode)
    }
}
