//! Comparison kernel dispatch.

use core::fmt;

use tracing::debug;

use super::builder::KernelBuilder;
use super::builtin::BuiltinCompareKernel;
use super::expression;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::types::{Type, TypeKind};

/// The relation a comparison kernel evaluates. Results are written as a
/// single `bool` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    Less,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    Greater,
    /// A total order for sorting: NaN sorts after every number.
    SortingLess,
}

impl ComparisonType {
    pub const fn name(self) -> &'static str {
        match self {
            ComparisonType::Less => "less",
            ComparisonType::LessEqual => "less_equal",
            ComparisonType::Equal => "equal",
            ComparisonType::NotEqual => "not_equal",
            ComparisonType::GreaterEqual => "greater_equal",
            ComparisonType::Greater => "greater",
            ComparisonType::SortingLess => "sorting_less",
        }
    }

    pub const fn is_equality(self) -> bool {
        matches!(self, ComparisonType::Equal | ComparisonType::NotEqual)
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Appends a kernel comparing one `src0_tp` value with one `src1_tp` value
/// and returns the builder's new end offset.
#[allow(clippy::too_many_arguments)]
pub fn make_comparison_kernel(
    ckb: &mut KernelBuilder,
    src0_tp: &Type,
    src0_meta: &[u8],
    src1_tp: &Type,
    src1_meta: &[u8],
    comptype: ComparisonType,
    ectx: &EvalContext,
) -> Result<usize> {
    for tp in [src0_tp, src1_tp] {
        if tp.is_symbolic() {
            return Err(Error::Type(format!(
                "cannot compare values of the symbolic type {tp}"
            )));
        }
    }

    if src0_tp.is_expression() || src1_tp.is_expression() {
        debug!(%src0_tp, %src1_tp, %comptype, "buffering expression operands for comparison");
        return expression::make_buffered_comparison_kernel(
            ckb, src0_tp, src0_meta, src1_tp, src1_meta, comptype, ectx,
        );
    }

    if src0_tp.is_builtin() && src1_tp.is_builtin() {
        let complex = src0_tp.kind() == TypeKind::Complex || src1_tp.kind() == TypeKind::Complex;
        let comparable = ![src0_tp, src1_tp]
            .iter()
            .any(|tp| matches!(tp.kind(), TypeKind::Void | TypeKind::Uninitialized));
        if !comparable || (complex && !comptype.is_equality()) {
            return Err(Error::no_comparison(comptype, src0_tp, src1_tp));
        }
        debug!(%src0_tp, %src1_tp, %comptype, "builtin comparison kernel");
        ckb.emplace_back(BuiltinCompareKernel {
            src0: src0_tp.id(),
            src1: src1_tp.id(),
            comptype,
        });
        return Ok(ckb.len());
    }

    let descriptor = src0_tp.extended().or_else(|| src1_tp.extended());
    match descriptor {
        Some(ext) => {
            debug!(%src0_tp, %src1_tp, %comptype, "descriptor comparison kernel");
            ext.make_comparison_kernel(ckb, src0_tp, src0_meta, src1_tp, src1_meta, comptype, ectx)
        }
        None => Err(Error::no_comparison(comptype, src0_tp, src1_tp)),
    }
}
