//! Kernel frames and the dispatch that builds them.
//!
//! [`make_assignment_kernel`] and [`make_comparison_kernel`] are the entry
//! points. They pick a path from the two types (expression, builtin, or the
//! descriptor of the non-builtin side), recurse into children as needed, and
//! append the resulting frames to a [`KernelBuilder`].

pub mod assignment;
pub mod builder;
pub mod builtin;
pub mod comparison;
pub mod dim_kernels;
pub mod expression;
pub mod partition;
pub mod string_kernels;
pub mod struct_kernels;

#[cfg(test)]
mod builder_test;

use core::fmt;

pub use assignment::make_assignment_kernel;
pub use builder::{CompiledKernel, Kernel, KernelBuilder, KernelFrames};
pub use comparison::{ComparisonType, make_comparison_kernel};
pub use expression::{
    BufferedKernel, make_operand_to_value_assignment_kernel, make_value_to_operand_assignment_kernel,
};
pub use partition::Partition;

/// Entry point a parent will use to call a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelRequest {
    Single,
    Strided,
}

/// How strictly an assignment checks that values survive the conversion.
///
/// The checking modes are ordered: each one also performs the checks of the
/// modes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorMode {
    /// No checks; out of range values wrap or saturate.
    None,
    /// Raise when a value is out of range of the destination.
    Overflow,
    /// Also raise when a fractional part would be dropped.
    Fractional,
    /// Also raise when any precision would be lost.
    Inexact,
    /// Whatever the evaluation context says.
    Default,
}

impl ErrorMode {
    pub fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "none" => Ok(ErrorMode::None),
            "overflow" => Ok(ErrorMode::Overflow),
            "fractional" => Ok(ErrorMode::Fractional),
            "inexact" => Ok(ErrorMode::Inexact),
            "default" => Ok(ErrorMode::Default),
            _ => Err(crate::Error::Type(format!("unrecognized error mode {name:?}"))),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ErrorMode::None => "none",
            ErrorMode::Overflow => "overflow",
            ErrorMode::Fractional => "fractional",
            ErrorMode::Inexact => "inexact",
            ErrorMode::Default => "default",
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
