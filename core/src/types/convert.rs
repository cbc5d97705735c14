//! Expression types and the `convert` expression.

use core::fmt;
use std::sync::Arc;

use super::base::{BaseType, Property, TypeFlags};
use super::{Type, TypeId, TypeKind};
use crate::callables::CallableRef;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{self, ErrorMode, KernelBuilder, KernelRequest};
use crate::metadata::{self, MemoryBlock};
use crate::value::Buffer;

/// A type whose stored operand is converted to a logical value on access.
pub trait ExpressionType: Send + Sync {
    fn value_type(&self) -> &Type;

    fn operand_type(&self) -> &Type;

    /// Same expression with the storage at the end of its chain swapped for
    /// `replacement`, whose value type must match the current storage.
    fn with_replaced_storage_type(&self, replacement: &Type) -> Result<Type>;

    /// Kernel reading the operand (`src`) and writing the value (`dst`).
    fn make_operand_to_value_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_meta: &[u8],
        src_meta: &[u8],
        kernreq: KernelRequest,
        ectx: &EvalContext,
    ) -> Result<usize>;

    /// Kernel reading a value (`src`) and writing the operand (`dst`).
    fn make_value_to_operand_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_meta: &[u8],
        src_meta: &[u8],
        kernreq: KernelRequest,
        ectx: &EvalContext,
    ) -> Result<usize>;
}

/// Presents an operand of one type as values of another, converting with a
/// chosen error mode.
#[derive(Debug, Clone)]
pub struct ConvertType {
    value: Type,
    operand: Type,
    errmode: ErrorMode,
    errmode_to_value: ErrorMode,
    errmode_to_operand: ErrorMode,
}

impl ConvertType {
    pub fn new(value: Type, operand: Type, errmode: ErrorMode) -> Result<Self> {
        if operand.value_type() == &value {
            return Err(Error::Type(format!(
                "convert requires different value and operand types, both are {value}"
            )));
        }
        if value.is_expression() {
            return Err(Error::Type(format!(
                "the value type of a convert cannot be the expression {value}"
            )));
        }
        // A direction that can never lose information needs no checking.
        let errmode_to_value = if value.is_lossless_assignment_from(operand.value_type()) {
            ErrorMode::None
        } else {
            errmode
        };
        let errmode_to_operand = if operand.value_type().is_lossless_assignment_from(&value) {
            ErrorMode::None
        } else {
            errmode
        };
        Ok(Self {
            value,
            operand,
            errmode,
            errmode_to_value,
            errmode_to_operand,
        })
    }

    pub fn errmode(&self) -> ErrorMode {
        self.errmode
    }

    pub fn errmode_to_value(&self) -> ErrorMode {
        self.errmode_to_value
    }

    pub fn errmode_to_operand(&self) -> ErrorMode {
        self.errmode_to_operand
    }
}

/// Builds the type presenting `operand` as `value`, simplifying the chain:
///
/// - no wrapper when `operand` already has value type `value`;
/// - when `value` is itself an expression whose storage matches the value
///   type of `operand`, `operand` is spliced in as its new storage;
/// - otherwise a nested convert bridges the two.
pub fn make_convert(value: &Type, operand: &Type, errmode: ErrorMode) -> Result<Type> {
    if operand.value_type() == value {
        return Ok(operand.clone());
    }
    let Some(expr) = value.extended().and_then(|ext| ext.as_expression()) else {
        return Ok(Type::new(ConvertType::new(value.clone(), operand.clone(), errmode)?));
    };
    if value.storage_type() == operand.value_type() {
        expr.with_replaced_storage_type(operand)
    } else {
        let bridge = ConvertType::new(value.storage_type().clone(), operand.clone(), errmode)?;
        expr.with_replaced_storage_type(&Type::new(bridge))
    }
}

impl Type {
    /// This type followed by each successive operand type down to storage.
    pub fn storage_type_chain(&self) -> Vec<Type> {
        let mut chain = vec![self.clone()];
        let mut tp = self;
        while let Some(expr) = tp.extended().and_then(|ext| ext.as_expression()) {
            tp = expr.operand_type();
            chain.push(tp.clone());
        }
        chain
    }
}

impl ExpressionType for ConvertType {
    fn value_type(&self) -> &Type {
        &self.value
    }

    fn operand_type(&self) -> &Type {
        &self.operand
    }

    fn with_replaced_storage_type(&self, replacement: &Type) -> Result<Type> {
        let operand = match self.operand.extended().and_then(|ext| ext.as_expression()) {
            Some(inner) => inner.with_replaced_storage_type(replacement)?,
            None => {
                if replacement.value_type() != &self.operand {
                    return Err(Error::Type(format!(
                        "cannot replace storage {} with {replacement}, whose value type differs",
                        self.operand
                    )));
                }
                replacement.clone()
            }
        };
        Ok(Type::new(ConvertType::new(
            self.value.clone(),
            operand,
            self.errmode,
        )?))
    }

    fn make_operand_to_value_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_meta: &[u8],
        src_meta: &[u8],
        kernreq: KernelRequest,
        ectx: &EvalContext,
    ) -> Result<usize> {
        kernels::make_assignment_kernel(
            ckb,
            &self.value,
            dst_meta,
            &self.operand,
            src_meta,
            kernreq,
            self.errmode_to_value,
            ectx,
        )
    }

    fn make_value_to_operand_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_meta: &[u8],
        src_meta: &[u8],
        kernreq: KernelRequest,
        ectx: &EvalContext,
    ) -> Result<usize> {
        kernels::make_assignment_kernel(
            ckb,
            &self.operand,
            dst_meta,
            &self.value,
            src_meta,
            kernreq,
            self.errmode_to_operand,
            ectx,
        )
    }
}

impl BaseType for ConvertType {
    fn id(&self) -> TypeId {
        TypeId::Convert
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Expression
    }

    fn data_size(&self) -> usize {
        self.operand.data_size()
    }

    fn data_alignment(&self) -> usize {
        self.operand.data_alignment()
    }

    fn flags(&self) -> TypeFlags {
        self.operand.flags() | (self.value.flags() & TypeFlags::SCALAR) | TypeFlags::EXPRESSION
    }

    fn arrmeta_size(&self) -> usize {
        self.operand.arrmeta_size()
    }

    fn ndim(&self) -> usize {
        self.operand.ndim()
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "convert[to={}, from={}", self.value, self.operand)?;
        if self.errmode != ErrorMode::Default {
            write!(f, ", errmode={}", self.errmode)?;
        }
        f.write_str("]")
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        let mut value = Buffer::new(&self.value).map_err(|_| fmt::Error)?;
        let ectx = EvalContext::default();
        let mut ckb = KernelBuilder::new();
        self.make_operand_to_value_assignment_kernel(
            &mut ckb,
            value.arrmeta(),
            arrmeta,
            KernelRequest::Single,
            &ectx,
        )
        .map_err(|_| fmt::Error)?;
        let kernel = ckb.finish().map_err(|_| fmt::Error)?;
        unsafe {
            kernel
                .single(value.as_mut_ptr(), &[data])
                .map_err(|_| fmt::Error)?;
        }
        write!(out, "{value}")
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|other| {
            self.value == other.value
                && self.operand == other.operand
                && self.errmode == other.errmode
        })
    }

    fn canonical_type(&self) -> Option<Type> {
        Some(self.value.canonical_type())
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        let mut properties = vec![
            ("value_type", Property::Type(self.value.clone())),
            ("operand_type", Property::Type(self.operand.clone())),
            ("errmode", Property::Str(self.errmode.to_string())),
        ];
        if !self.value.is_builtin() {
            properties.extend(self.value.properties());
        }
        properties
    }

    fn dynamic_array_functions(&self) -> Vec<(&'static str, CallableRef)> {
        if self.value.is_builtin() {
            return Vec::new();
        }
        self.value.dynamic_array_functions()
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        metadata::arrmeta_default_construct(&self.operand, arrmeta, shape, blockref)
    }

    unsafe fn arrmeta_copy_construct(&self, dst: &mut [u8], src: &[u8]) {
        unsafe { metadata::arrmeta_copy_construct(&self.operand, dst, src) };
    }

    unsafe fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        unsafe { metadata::arrmeta_destruct(&self.operand, arrmeta) };
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        metadata::arrmeta_debug_print(&self.operand, arrmeta, out, indent)
    }

    fn as_expression(&self) -> Option<&dyn ExpressionType> {
        Some(self)
    }
}
