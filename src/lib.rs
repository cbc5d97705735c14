//! ndtype - runtime types for dynamically typed, multidimensional arrays
//!
//! # Overview
//!
//! ndtype describes array element layouts at run time and builds the kernels
//! that move data between them. Typical uses include:
//!
//! - Converting buffers between numeric types with checked error modes
//! - Transcoding fixed and variable length strings
//! - Broadcasting assignments across fixed and variable dimensions
//! - Resolving generic, multiply dispatched operations on typed arguments
//!
//! # Quick Start
//!
//! ```ignore
//! use ndtype::{ErrorMode, EvalContext, Type};
//! use ndtype::types::{StringEncoding, make_fixed_dim, make_fixed_string};
//! use ndtype::value::Buffer;
//!
//! let ectx = EvalContext::default();
//!
//! // Broadcast a scalar into every element of a 3 element array
//! let mut dst = Buffer::new(&make_fixed_dim(3, Type::float32()))?;
//! dst.assign_from(&Buffer::from_scalar(1.5f64)?, ErrorMode::Default, &ectx)?;
//! assert_eq!(dst.to_string(), "[1.5, 1.5, 1.5]");
//!
//! // Transcode a string into a wider UTF-16 buffer
//! let src = Buffer::from_utf8(&make_fixed_string(5, StringEncoding::Utf8), "hí")?;
//! let mut wide = Buffer::new(&make_fixed_string(5, StringEncoding::Utf16))?;
//! wide.assign_from(&src, ErrorMode::Default, &ectx)?;
//! assert_eq!(wide.to_utf8()?, "hí");
//! ```

// Re-export public API from ndtype_core
pub use ndtype_core::callables::{
    self, Callable, CallableRef, KwdValue, Plan, Registry, call, call_into, plan,
};
pub use ndtype_core::kernels::{self, ComparisonType, ErrorMode, KernelBuilder, KernelRequest};
pub use ndtype_core::types::{self, Type, TypeId, TypeKind};
pub use ndtype_core::{EvalContext, metadata, value};

// Re-export errors
pub use ndtype_core::{Error, Result};
