//! Error type shared by every layer of the engine.
//!
//! Errors fall into three groups:
//!
//! - **Type errors** raised while building types or resolving callables
//!   (`Type`, `TooManyIndices`, `TypeMismatch`, `TypeVarConflict`,
//!   `ArityMismatch`, `Keyword`, `NoKernel`).
//! - **Conversion errors** raised by assignment kernels at run time
//!   (`Overflow`, `Fractional`, `Inexact`, `Encoding`, `StringOverflow`,
//!   `Broadcast`).
//! - **Builder errors** raised while appending kernel frames (`Builder`).

use thiserror::Error;

use crate::types::StringEncoding;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Misuse of a type: wrong variant, unsupported property, bad construction.
    #[error("type error: {0}")]
    Type(String),

    #[error("too many indices for type {tp}: provided {attempted}, but it has {ndim} dimensions")]
    TooManyIndices {
        tp: String,
        attempted: usize,
        ndim: usize,
    },

    #[error("index {index} is out of bounds for dimension of size {dim_size}")]
    IndexOutOfBounds { index: isize, dim_size: usize },

    #[error("invalid {encoding} string: {message}")]
    Encoding {
        encoding: StringEncoding,
        message: String,
    },

    #[error("string of {needed} bytes does not fit in a fixed buffer of {size} bytes")]
    StringOverflow { size: usize, needed: usize },

    #[error("overflow while assigning {value} from {src} to {dst}")]
    Overflow {
        src: String,
        dst: String,
        value: String,
    },

    #[error("fractional part lost while assigning {value} from {src} to {dst}")]
    Fractional {
        src: String,
        dst: String,
        value: String,
    },

    #[error("inexact value while assigning {value} from {src} to {dst}")]
    Inexact {
        src: String,
        dst: String,
        value: String,
    },

    #[error("cannot broadcast from shape {src} to shape {dst}")]
    Broadcast { src: String, dst: String },

    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("type variable {name} is bound to {bound}, but {found} was provided")]
    TypeVarConflict {
        name: String,
        bound: String,
        found: String,
    },

    #[error("{callable} expects {expected} positional arguments, but {found} were provided")]
    ArityMismatch {
        callable: String,
        expected: usize,
        found: usize,
    },

    #[error("keyword error in {callable}: {message}")]
    Keyword { callable: String, message: String },

    #[error("no {operation} kernel from {src} to {dst}")]
    NoKernel {
        operation: String,
        dst: String,
        src: String,
    },

    #[error("kernel builder error: {0}")]
    Builder(String),
}

impl Error {
    pub(crate) fn no_assignment(dst: &impl core::fmt::Display, src: &impl core::fmt::Display) -> Self {
        Error::NoKernel {
            operation: "assignment".to_string(),
            dst: dst.to_string(),
            src: src.to_string(),
        }
    }

    pub(crate) fn no_comparison(
        comptype: crate::kernels::ComparisonType,
        src0: &impl core::fmt::Display,
        src1: &impl core::fmt::Display,
    ) -> Self {
        Error::NoKernel {
            operation: format!("{comptype} comparison"),
            dst: src1.to_string(),
            src: src0.to_string(),
        }
    }
}
