//! Runtime type engine for dynamically typed, multidimensional arrays.
//!
//! The crate is organised in four layers:
//!
//! - [`types`]: the [`Type`] handle (an inline builtin id or a shared,
//!   immutable [`types::BaseType`] descriptor) and every descriptor variant.
//! - [`metadata`]: the per-instance arrmeta protocol and the memory blocks that
//!   own variable-length data.
//! - [`kernels`]: the hierarchical [`kernels::KernelBuilder`] and the
//!   assignment/comparison dispatch that fills it with kernel frames.
//! - [`callables`]: the two-phase resolve/instantiate protocol for registered
//!   operations with symbolic signatures.
//!
//! # Example
//!
//! ```ignore
//! use ndtype_core::{ErrorMode, EvalContext};
//! use ndtype_core::types::{StringEncoding, make_fixed_string};
//! use ndtype_core::value::Buffer;
//!
//! let ectx = EvalContext::default();
//! let src = Buffer::from_utf8(&make_fixed_string(5, StringEncoding::Utf8), "hí")?;
//! let mut dst = Buffer::new(&make_fixed_string(10, StringEncoding::Utf8))?;
//! dst.assign_from(&src, ErrorMode::Default, &ectx)?;
//! assert_eq!(dst.to_utf8()?, "hí");
//! ```

pub mod aligned;
pub mod callables;
pub mod errors;
pub mod eval_context;
pub mod kernels;
pub mod metadata;
pub mod types;
pub mod value;

pub use errors::{Error, Result};
pub use eval_context::EvalContext;
pub use kernels::{ErrorMode, KernelBuilder, KernelRequest};
pub use types::{Type, TypeId, TypeKind};
