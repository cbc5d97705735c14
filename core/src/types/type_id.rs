use core::fmt;

/// Identifier of a type variant.
///
/// Builtin ids (up to and including [`TypeId::Void`]) describe fixed-size
/// scalars that need no descriptor and no arrmeta; every other id belongs to
/// an extended descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeId {
    Uninitialized = 0,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Void,

    // Extended
    FixedString,
    String,
    Convert,
    Struct,
    Tuple,
    FixedDim,
    VarDim,
    TypeVar,
    TypeVarDim,
    EllipsisDim,
    Any,
    Callable,
}

/// Coarse classification used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Uninitialized,
    Bool,
    SInt,
    UInt,
    Real,
    Complex,
    Void,
    String,
    Struct,
    Tuple,
    Dim,
    Expression,
    Symbolic,
    Callable,
}

impl TypeId {
    pub const fn is_builtin(self) -> bool {
        (self as u8) <= (TypeId::Void as u8)
    }

    /// Kind of a builtin id. Extended ids report the kind of their descriptor,
    /// so this is only meaningful when [`TypeId::is_builtin`] holds.
    pub const fn builtin_kind(self) -> TypeKind {
        match self {
            TypeId::Uninitialized => TypeKind::Uninitialized,
            TypeId::Bool => TypeKind::Bool,
            TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64 => TypeKind::SInt,
            TypeId::UInt8 | TypeId::UInt16 | TypeId::UInt32 | TypeId::UInt64 => TypeKind::UInt,
            TypeId::Float32 | TypeId::Float64 => TypeKind::Real,
            TypeId::Complex64 | TypeId::Complex128 => TypeKind::Complex,
            TypeId::Void => TypeKind::Void,
            TypeId::FixedString | TypeId::String => TypeKind::String,
            TypeId::Convert => TypeKind::Expression,
            TypeId::Struct => TypeKind::Struct,
            TypeId::Tuple => TypeKind::Tuple,
            TypeId::FixedDim | TypeId::VarDim => TypeKind::Dim,
            TypeId::TypeVar | TypeId::TypeVarDim | TypeId::EllipsisDim | TypeId::Any => {
                TypeKind::Symbolic
            }
            TypeId::Callable => TypeKind::Callable,
        }
    }

    pub const fn builtin_data_size(self) -> usize {
        match self {
            TypeId::Bool | TypeId::Int8 | TypeId::UInt8 => 1,
            TypeId::Int16 | TypeId::UInt16 => 2,
            TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 => 4,
            TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 | TypeId::Complex64 => 8,
            TypeId::Complex128 => 16,
            _ => 0,
        }
    }

    pub const fn builtin_data_alignment(self) -> usize {
        match self {
            TypeId::Complex64 => 4,
            TypeId::Complex128 => 8,
            TypeId::Uninitialized | TypeId::Void => 1,
            other if other.is_builtin() => other.builtin_data_size(),
            _ => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TypeId::Uninitialized => "uninitialized",
            TypeId::Bool => "bool",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::UInt8 => "uint8",
            TypeId::UInt16 => "uint16",
            TypeId::UInt32 => "uint32",
            TypeId::UInt64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Complex64 => "complex64",
            TypeId::Complex128 => "complex128",
            TypeId::Void => "void",
            TypeId::FixedString => "fixed_string",
            TypeId::String => "string",
            TypeId::Convert => "convert",
            TypeId::Struct => "struct",
            TypeId::Tuple => "tuple",
            TypeId::FixedDim => "fixed_dim",
            TypeId::VarDim => "var_dim",
            TypeId::TypeVar => "typevar",
            TypeId::TypeVarDim => "typevar_dim",
            TypeId::EllipsisDim => "ellipsis_dim",
            TypeId::Any => "any",
            TypeId::Callable => "callable",
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
