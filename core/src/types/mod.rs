pub mod base;
pub mod callable_type;
pub mod convert;
pub mod dims;
pub mod encoding;
pub mod fixed_string;
mod handle;
pub mod matching;
pub mod string;
pub mod struct_type;
pub mod symbolic;
mod type_id;

#[cfg(test)]
mod convert_test;
#[cfg(test)]
mod fixed_string_test;
#[cfg(test)]
mod matching_test;

pub use base::{BaseType, Property, StringType, TypeFlags};
pub use callable_type::{CallableType, KwdParam, make_callable};
pub use convert::{ConvertType, ExpressionType, make_convert};
pub use dims::{DimType, FixedDimType, VarDimType, make_fixed_dim, make_fixed_dims, make_var_dim};
pub use encoding::StringEncoding;
pub use fixed_string::{FixedStringType, make_fixed_string};
pub use handle::Type;
pub use matching::TypeVars;
pub use string::{VarStringType, make_string};
pub use struct_type::{Field, StructType, make_struct, make_tuple};
pub use symbolic::{
    AnyType, EllipsisDimType, TypeVarDimType, TypeVarType, make_any, make_ellipsis_dim,
    make_typevar, make_typevar_dim,
};
pub use type_id::{TypeId, TypeKind};
