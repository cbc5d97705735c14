//! Kernels between builtin scalar types.

use core::cmp::Ordering;
use core::fmt;

use super::builder::{Kernel, KernelFrames};
use super::comparison::ComparisonType;
use super::ErrorMode;
use crate::errors::{Error, Result};
use crate::types::{TypeId, TypeKind};

/// A builtin value widened to a common representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
}

impl Scalar {
    fn as_i64(self) -> i64 {
        match self {
            Scalar::Bool(b) => b as i64,
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            Scalar::Float(v) | Scalar::Complex(v, _) => v as i64,
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            Scalar::Bool(b) => b as u64,
            Scalar::Int(v) => v as u64,
            Scalar::UInt(v) => v,
            Scalar::Float(v) | Scalar::Complex(v, _) => v as u64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => b as u8 as f64,
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) | Scalar::Complex(v, _) => v,
        }
    }

    fn imag(self) -> f64 {
        match self {
            Scalar::Complex(_, im) => im,
            _ => 0.0,
        }
    }

    fn is_truthy(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::UInt(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
            Scalar::Complex(re, im) => re != 0.0 || im != 0.0,
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Scalar::Bool(b) => Some(b as i128),
            Scalar::Int(v) => Some(v as i128),
            Scalar::UInt(v) => Some(v as i128),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Complex(re, im) => write!(f, "({re} + {im}j)"),
        }
    }
}

#[inline]
unsafe fn read<T: Copy>(data: *const u8) -> T {
    unsafe { core::ptr::read_unaligned(data as *const T) }
}

#[inline]
unsafe fn write<T>(data: *mut u8, value: T) {
    unsafe { core::ptr::write_unaligned(data as *mut T, value) }
}

/// # Safety
///
/// `data` must point to one readable value of the builtin type `id`.
pub unsafe fn read_scalar(id: TypeId, data: *const u8) -> Scalar {
    unsafe {
        match id {
            TypeId::Bool => Scalar::Bool(read::<u8>(data) != 0),
            TypeId::Int8 => Scalar::Int(read::<i8>(data) as i64),
            TypeId::Int16 => Scalar::Int(read::<i16>(data) as i64),
            TypeId::Int32 => Scalar::Int(read::<i32>(data) as i64),
            TypeId::Int64 => Scalar::Int(read::<i64>(data)),
            TypeId::UInt8 => Scalar::UInt(read::<u8>(data) as u64),
            TypeId::UInt16 => Scalar::UInt(read::<u16>(data) as u64),
            TypeId::UInt32 => Scalar::UInt(read::<u32>(data) as u64),
            TypeId::UInt64 => Scalar::UInt(read::<u64>(data)),
            TypeId::Float32 => Scalar::Float(read::<f32>(data) as f64),
            TypeId::Float64 => Scalar::Float(read::<f64>(data)),
            TypeId::Complex64 => {
                let [re, im] = read::<[f32; 2]>(data);
                Scalar::Complex(re as f64, im as f64)
            }
            TypeId::Complex128 => {
                let [re, im] = read::<[f64; 2]>(data);
                Scalar::Complex(re, im)
            }
            _ => Scalar::Int(0),
        }
    }
}

/// Stores `value` as type `id`, casting without checks.
///
/// # Safety
///
/// `data` must point to writable storage for one value of type `id`.
pub unsafe fn write_scalar(id: TypeId, data: *mut u8, value: Scalar) {
    unsafe {
        match id {
            TypeId::Bool => write(data, value.is_truthy() as u8),
            TypeId::Int8 => write(data, value.as_i64() as i8),
            TypeId::Int16 => write(data, value.as_i64() as i16),
            TypeId::Int32 => write(data, value.as_i64() as i32),
            TypeId::Int64 => write(data, value.as_i64()),
            TypeId::UInt8 => write(data, value.as_u64() as u8),
            TypeId::UInt16 => write(data, value.as_u64() as u16),
            TypeId::UInt32 => write(data, value.as_u64() as u32),
            TypeId::UInt64 => write(data, value.as_u64()),
            TypeId::Float32 => write(data, value.as_f64() as f32),
            TypeId::Float64 => write(data, value.as_f64()),
            TypeId::Complex64 => write(data, [value.as_f64() as f32, value.imag() as f32]),
            TypeId::Complex128 => write(data, [value.as_f64(), value.imag()]),
            _ => {}
        }
    }
}

/// Writes a builtin value for display.
///
/// # Safety
///
/// `data` must point to one readable value of type `id`.
pub unsafe fn print_builtin(id: TypeId, out: &mut dyn fmt::Write, data: *const u8) -> fmt::Result {
    match id {
        TypeId::Void => out.write_str("void"),
        TypeId::Uninitialized => Err(fmt::Error),
        _ => write!(out, "{}", unsafe { read_scalar(id, data) }),
    }
}

fn int_range(id: TypeId) -> (i128, i128) {
    let bits = 8 * id.builtin_data_size() as u32;
    match id.builtin_kind() {
        TypeKind::SInt => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
        _ => (0, (1i128 << bits) - 1),
    }
}

/// Checks that assigning `value` (read as `src`) into `dst` is allowed by
/// `errmode`.
pub fn check_assignment(value: Scalar, src: TypeId, dst: TypeId, errmode: ErrorMode) -> Result<()> {
    if errmode == ErrorMode::None {
        return Ok(());
    }
    let fail = |make: fn(String, String, String) -> Error| {
        Err(make(src.to_string(), dst.to_string(), value.to_string()))
    };
    let overflow = |s, d, v| Error::Overflow { src: s, dst: d, value: v };
    let fractional = |s, d, v| Error::Fractional { src: s, dst: d, value: v };
    let inexact = |s, d, v| Error::Inexact { src: s, dst: d, value: v };

    // Dropping an imaginary part loses information of its own.
    if value.imag() != 0.0 && dst.builtin_kind() != TypeKind::Complex && errmode >= ErrorMode::Fractional
    {
        return fail(fractional);
    }

    match dst.builtin_kind() {
        TypeKind::Bool => {
            let ok = match value.as_i128() {
                Some(v) => v == 0 || v == 1,
                None => {
                    let v = value.as_f64();
                    v == 0.0 || v == 1.0
                }
            };
            if !ok {
                return fail(overflow);
            }
        }
        TypeKind::SInt | TypeKind::UInt => {
            let (min, max) = int_range(dst);
            match value.as_i128() {
                Some(v) => {
                    if v < min || v > max {
                        return fail(overflow);
                    }
                }
                None => {
                    let v = value.as_f64();
                    let t = v.trunc();
                    // `max + 1` and `min` are powers of two, exact in f64.
                    if v.is_nan() || t < min as f64 || t >= (max + 1) as f64 {
                        return fail(overflow);
                    }
                    if errmode >= ErrorMode::Fractional && v != t {
                        return fail(fractional);
                    }
                }
            }
        }
        TypeKind::Real | TypeKind::Complex => {
            let single = matches!(dst, TypeId::Float32 | TypeId::Complex64);
            for v in [value.as_f64(), value.imag()] {
                if let Some(i) = value.as_i128() {
                    let exact = if single {
                        (v as f32) as i128 == i
                    } else {
                        v as i128 == i
                    };
                    if errmode >= ErrorMode::Inexact && !exact {
                        return fail(inexact);
                    }
                    break;
                }
                if single {
                    let narrowed = v as f32;
                    if v.is_finite() && narrowed.is_infinite() {
                        return fail(overflow);
                    }
                    if errmode >= ErrorMode::Inexact && !v.is_nan() && narrowed as f64 != v {
                        return fail(inexact);
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Assignment between two builtin types.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinAssignKernel {
    pub dst: TypeId,
    pub src: TypeId,
    pub errmode: ErrorMode,
}

impl Kernel for BuiltinAssignKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let value = unsafe { read_scalar(self.src, src[0]) };
        check_assignment(value, self.src, self.dst, self.errmode)?;
        unsafe { write_scalar(self.dst, dst, value) };
        Ok(())
    }
}

/// Compares two scalars. Complex values only support (in)equality, which
/// callers check before building a kernel.
pub fn compare_scalars(a: Scalar, b: Scalar, comptype: ComparisonType) -> bool {
    if let (Scalar::Complex(..), _) | (_, Scalar::Complex(..)) = (a, b) {
        let same = a.as_f64() == b.as_f64() && a.imag() == b.imag();
        return match comptype {
            ComparisonType::Equal => same,
            ComparisonType::NotEqual => !same,
            _ => false,
        };
    }
    let ordering = match (a.as_i128(), b.as_i128()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    };
    match comptype {
        ComparisonType::Less => ordering == Some(Ordering::Less),
        ComparisonType::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        ComparisonType::Equal => ordering == Some(Ordering::Equal),
        ComparisonType::NotEqual => ordering != Some(Ordering::Equal),
        ComparisonType::GreaterEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        ComparisonType::Greater => ordering == Some(Ordering::Greater),
        // NaN sorts after every other value.
        ComparisonType::SortingLess => match ordering {
            Some(o) => o == Ordering::Less,
            None => !a.as_f64().is_nan() && b.as_f64().is_nan(),
        },
    }
}

/// Comparison between two builtin types; writes a `bool` byte.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinCompareKernel {
    pub src0: TypeId,
    pub src1: TypeId,
    pub comptype: ComparisonType,
}

impl Kernel for BuiltinCompareKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let (a, b) = unsafe { (read_scalar(self.src0, src[0]), read_scalar(self.src1, src[1])) };
        unsafe { write(dst, compare_scalars(a, b, self.comptype) as u8) };
        Ok(())
    }
}
