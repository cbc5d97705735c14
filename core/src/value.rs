//! A minimal owning array value: data bytes plus constructed arrmeta.
//!
//! [`Buffer`] stands in for a host array container. It runs the arrmeta
//! lifecycle at the right points (default construct on creation, copy
//! construct on clone, destruct on drop) and provides the safe entry points
//! that build and run kernels on its bytes.

use core::fmt;

use crate::aligned::AlignedBytes;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{self, ComparisonType, ErrorMode, KernelBuilder, KernelRequest};
use crate::metadata::Arrmeta;
use crate::types::{StringType, Type};

/// Rust scalars with a builtin counterpart.
pub trait Primitive: Copy + Send + Sync + 'static {
    fn tp() -> Type;

    /// # Safety
    ///
    /// `data` must point to one readable value of [`Primitive::tp`].
    unsafe fn read_from(data: *const u8) -> Self;

    /// # Safety
    ///
    /// `data` must point to writable storage for one value of
    /// [`Primitive::tp`].
    unsafe fn write_to(self, data: *mut u8);
}

macro_rules! impl_primitive {
    ($($t:ty => $ctor:ident),* $(,)?) => {
        $(
            impl Primitive for $t {
                fn tp() -> Type {
                    Type::$ctor()
                }

                unsafe fn read_from(data: *const u8) -> Self {
                    unsafe { core::ptr::read_unaligned(data as *const $t) }
                }

                unsafe fn write_to(self, data: *mut u8) {
                    unsafe { core::ptr::write_unaligned(data as *mut $t, self) }
                }
            }
        )*
    };
}

impl_primitive!(
    i8 => int8,
    i16 => int16,
    i32 => int32,
    i64 => int64,
    u8 => uint8,
    u16 => uint16,
    u32 => uint32,
    u64 => uint64,
    f32 => float32,
    f64 => float64,
);

impl Primitive for bool {
    fn tp() -> Type {
        Type::bool_()
    }

    unsafe fn read_from(data: *const u8) -> Self {
        unsafe { *data != 0 }
    }

    unsafe fn write_to(self, data: *mut u8) {
        unsafe { *data = self as u8 }
    }
}

/// One value of a concrete type.
pub struct Buffer {
    meta: Arrmeta,
    data: AlignedBytes,
}

impl Buffer {
    /// A zeroed value of `tp`. Types that reference memory blocks get a new
    /// block of their own.
    pub fn new(tp: &Type) -> Result<Self> {
        if tp.is_symbolic() {
            return Err(Error::Type(format!(
                "cannot allocate a value of the symbolic type {tp}"
            )));
        }
        let meta = Arrmeta::new(tp, &[], None)?;
        Ok(Self {
            meta,
            data: AlignedBytes::zeroed(tp.data_size()),
        })
    }

    pub fn from_scalar<T: Primitive>(value: T) -> Result<Self> {
        let mut buffer = Self::new(&T::tp())?;
        // SAFETY: the buffer was allocated for `T::tp()`.
        unsafe { value.write_to(buffer.as_mut_ptr()) };
        Ok(buffer)
    }

    /// A string value of `tp`. The text must fit: nothing is truncated.
    pub fn from_utf8(tp: &Type, text: &str) -> Result<Self> {
        let mut buffer = Self::new(tp)?;
        let string = string_type(tp)?;
        let data = buffer.data.as_mut_ptr();
        // SAFETY: `data` holds a value of `tp` described by `meta`.
        unsafe {
            string.set_utf8_string(
                buffer.meta.as_bytes(),
                data,
                ErrorMode::Inexact,
                text.as_bytes(),
            )?;
        }
        Ok(buffer)
    }

    pub fn tp(&self) -> &Type {
        self.meta.tp()
    }

    pub fn arrmeta(&self) -> &[u8] {
        self.meta.as_bytes()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }

    /// The value's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data.as_slice()[..self.tp().data_size()]
    }

    pub fn read<T: Primitive>(&self) -> Result<T> {
        if self.tp() != &T::tp() {
            return Err(Error::TypeMismatch {
                operation: "scalar read".to_string(),
                expected: T::tp().to_string(),
                found: self.tp().to_string(),
            });
        }
        // SAFETY: the type was checked above.
        Ok(unsafe { T::read_from(self.as_ptr()) })
    }

    /// The text of a string value, evaluating expression types first.
    pub fn to_utf8(&self) -> Result<String> {
        if self.tp().is_expression() {
            return self.eval(&EvalContext::default())?.to_utf8();
        }
        let string = string_type(self.tp())?;
        // SAFETY: `data` holds a value of the string type described by `meta`.
        unsafe { string.utf8_string(self.arrmeta(), self.as_ptr(), ErrorMode::Inexact) }
    }

    /// Assigns `src` into this value, converting as the types require.
    pub fn assign_from(&mut self, src: &Buffer, errmode: ErrorMode, ectx: &EvalContext) -> Result<()> {
        let mut ckb = KernelBuilder::new();
        kernels::make_assignment_kernel(
            &mut ckb,
            self.meta.tp(),
            self.meta.as_bytes(),
            src.tp(),
            src.arrmeta(),
            KernelRequest::Single,
            errmode,
            ectx,
        )?;
        let kernel = ckb.finish()?;
        let dst = self.data.as_mut_ptr();
        // SAFETY: the kernel was built for these two buffers.
        unsafe { kernel.single(dst, &[src.as_ptr()]) }
    }

    pub fn compare(&self, other: &Buffer, comptype: ComparisonType, ectx: &EvalContext) -> Result<bool> {
        let mut ckb = KernelBuilder::new();
        kernels::make_comparison_kernel(
            &mut ckb,
            self.tp(),
            self.arrmeta(),
            other.tp(),
            other.arrmeta(),
            comptype,
            ectx,
        )?;
        let kernel = ckb.finish()?;
        let mut result = 0u8;
        // SAFETY: the kernel was built for these two buffers and writes one
        // bool byte.
        unsafe { kernel.single(&mut result, &[self.as_ptr(), other.as_ptr()])? };
        Ok(result != 0)
    }

    /// A copy of this value as its value type.
    pub fn eval(&self, ectx: &EvalContext) -> Result<Buffer> {
        let mut value = Buffer::new(self.tp().value_type())?;
        value.assign_from(self, ErrorMode::Default, ectx)?;
        Ok(value)
    }
}

fn string_type(tp: &Type) -> Result<&dyn StringType> {
    tp.extended()
        .and_then(|ext| ext.as_string())
        .ok_or_else(|| Error::Type(format!("{tp} is not a string type")))
}

impl Clone for Buffer {
    fn clone(&self) -> Self {
        let mut data = AlignedBytes::zeroed(self.tp().data_size());
        let size = self.tp().data_size();
        data.as_mut_slice()[..size].copy_from_slice(self.data());
        Self {
            meta: self.meta.clone(),
            data,
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: `data` holds a value of the type described by `meta`.
        unsafe { self.tp().print_data(f, self.arrmeta(), self.as_ptr()) }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({}: {self})", self.tp())
    }
}
