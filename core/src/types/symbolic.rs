//! Pattern types used in callable signatures.
//!
//! None of these has a data layout; they only take part in matching and
//! substitution, and kernel factories reject them.

use core::fmt;

use hashbrown::HashSet;

use super::base::{BaseType, Property, TypeFlags};
use super::dims::DimType;
use super::matching::{TypeVars, bind};
use super::{Type, TypeId, TypeKind};
use crate::errors::{Error, Result};

fn unbound(name: &str) -> Error {
    Error::Type(format!("type variable {name} is not bound"))
}

/// A named type variable matching any type without dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVarType {
    name: String,
}

pub fn make_typevar(name: impl Into<String>) -> Type {
    Type::new(TypeVarType { name: name.into() })
}

impl TypeVarType {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BaseType for TypeVarType {
    fn id(&self) -> TypeId {
        TypeId::TypeVar
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Symbolic
    }

    fn data_size(&self) -> usize {
        0
    }

    fn data_alignment(&self) -> usize {
        1
    }

    fn flags(&self) -> TypeFlags {
        TypeFlags::SYMBOLIC
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }

    unsafe fn print_data(&self, _: &mut dyn fmt::Write, _: &[u8], _: *const u8) -> fmt::Result {
        Err(fmt::Error)
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        candidate.ndim() == 0 && bind(tp_vars, &self.name, candidate)
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        match tp_vars.get(&self.name) {
            Some(bound) => Ok(Some(bound.clone())),
            None if concrete => Err(unbound(&self.name)),
            None => Ok(None),
        }
    }

    fn vars(&self, out: &mut HashSet<String>) {
        out.insert(self.name.clone());
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![("name", Property::Str(self.name.clone()))]
    }
}

/// `N * T`: one dimension of any size, binding `N` to that dimension
/// (as `n * void` or `var * void`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVarDimType {
    name: String,
    element: Type,
}

pub fn make_typevar_dim(name: impl Into<String>, element: Type) -> Type {
    Type::new(TypeVarDimType {
        name: name.into(),
        element,
    })
}

impl DimType for TypeVarDimType {
    fn element_type(&self) -> &Type {
        &self.element
    }

    fn with_element_type(&self, element: Type) -> Result<Type> {
        Ok(make_typevar_dim(self.name.clone(), element))
    }
}

impl BaseType for TypeVarDimType {
    fn id(&self) -> TypeId {
        TypeId::TypeVarDim
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Symbolic
    }

    fn data_size(&self) -> usize {
        0
    }

    fn data_alignment(&self) -> usize {
        1
    }

    fn flags(&self) -> TypeFlags {
        self.element.flags().inherited() | TypeFlags::SYMBOLIC
    }

    fn ndim(&self) -> usize {
        1 + self.element.ndim()
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} * {}", self.name, self.element)
    }

    unsafe fn print_data(&self, _: &mut dyn fmt::Write, _: &[u8], _: *const u8) -> fmt::Result {
        Err(fmt::Error)
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn at_single(&self, _i0: isize) -> Option<Result<Type>> {
        Some(Ok(self.element.clone()))
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        let Some(dim) = candidate.extended().and_then(|ext| ext.as_dim()) else {
            return false;
        };
        let Ok(shape) = dim.with_element_type(Type::void()) else {
            return false;
        };
        bind(tp_vars, &self.name, &shape) && self.element.matches(dim.element_type(), tp_vars)
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let element = self.element.substitute(tp_vars, concrete)?;
        match tp_vars.get(&self.name) {
            Some(shape) => shape.with_replaced_dtype(&element).map(Some),
            None if concrete => Err(unbound(&self.name)),
            None if element == self.element => Ok(None),
            None => Ok(Some(make_typevar_dim(self.name.clone(), element))),
        }
    }

    fn vars(&self, out: &mut HashSet<String>) {
        out.insert(self.name.clone());
        out.extend(self.element.vars());
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("name", Property::Str(self.name.clone())),
            ("element_type", Property::Type(self.element.clone())),
        ]
    }

    fn as_dim(&self) -> Option<&dyn DimType> {
        Some(self)
    }
}

/// `Dims... * T`: zero or more leading dimensions. A named ellipsis binds its
/// name to the matched dimensions over `void`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EllipsisDimType {
    name: Option<String>,
    element: Type,
}

pub fn make_ellipsis_dim(name: Option<&str>, element: Type) -> Type {
    Type::new(EllipsisDimType {
        name: name.map(str::to_string),
        element,
    })
}

/// `tp` with everything below its first `depth` dimensions replaced.
fn replace_below(tp: &Type, depth: usize, replacement: &Type) -> Result<Type> {
    if depth == 0 {
        return Ok(replacement.clone());
    }
    let dim = tp
        .extended()
        .and_then(|ext| ext.as_dim())
        .ok_or_else(|| Error::Type(format!("{tp} has fewer than {depth} dimensions")))?;
    let element = replace_below(dim.element_type(), depth - 1, replacement)?;
    dim.with_element_type(element)
}

impl DimType for EllipsisDimType {
    fn element_type(&self) -> &Type {
        &self.element
    }

    fn with_element_type(&self, element: Type) -> Result<Type> {
        Ok(make_ellipsis_dim(self.name.as_deref(), element))
    }
}

impl BaseType for EllipsisDimType {
    fn id(&self) -> TypeId {
        TypeId::EllipsisDim
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Symbolic
    }

    fn data_size(&self) -> usize {
        0
    }

    fn data_alignment(&self) -> usize {
        1
    }

    fn flags(&self) -> TypeFlags {
        self.element.flags().inherited() | TypeFlags::SYMBOLIC | TypeFlags::VARIADIC
    }

    fn ndim(&self) -> usize {
        1 + self.element.ndim()
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}... * {}", self.element),
            None => write!(f, "... * {}", self.element),
        }
    }

    unsafe fn print_data(&self, _: &mut dyn fmt::Write, _: &[u8], _: *const u8) -> fmt::Result {
        Err(fmt::Error)
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        let Some(leading) = candidate.ndim().checked_sub(self.element.ndim()) else {
            return false;
        };
        let Ok(inner) = candidate.type_at_dimension(leading) else {
            return false;
        };
        if let Some(name) = &self.name {
            let Ok(shape) = replace_below(candidate, leading, &Type::void()) else {
                return false;
            };
            if !bind(tp_vars, name, &shape) {
                return false;
            }
        }
        self.element.matches(&inner, tp_vars)
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let element = self.element.substitute(tp_vars, concrete)?;
        match self.name.as_ref().and_then(|name| tp_vars.get(name)) {
            Some(shape) => shape.with_replaced_dtype(&element).map(Some),
            None if concrete => Err(Error::Type(format!(
                "cannot make {} concrete without a binding for its dimensions",
                make_ellipsis_dim(self.name.as_deref(), self.element.clone())
            ))),
            None if element == self.element => Ok(None),
            None => Ok(Some(make_ellipsis_dim(self.name.as_deref(), element))),
        }
    }

    fn vars(&self, out: &mut HashSet<String>) {
        if let Some(name) = &self.name {
            out.insert(name.clone());
        }
        out.extend(self.element.vars());
    }

    fn as_dim(&self) -> Option<&dyn DimType> {
        Some(self)
    }
}

/// Matches every type, binding nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyType;

pub fn make_any() -> Type {
    Type::new(AnyType)
}

impl BaseType for AnyType {
    fn id(&self) -> TypeId {
        TypeId::Any
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Symbolic
    }

    fn data_size(&self) -> usize {
        0
    }

    fn data_alignment(&self) -> usize {
        1
    }

    fn flags(&self) -> TypeFlags {
        TypeFlags::SYMBOLIC | TypeFlags::VARIADIC
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Any")
    }

    unsafe fn print_data(&self, _: &mut dyn fmt::Write, _: &[u8], _: *const u8) -> fmt::Result {
        Err(fmt::Error)
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other.as_any().is::<Self>()
    }

    fn match_candidate(&self, _candidate: &Type, _tp_vars: &mut TypeVars) -> bool {
        true
    }

    fn substitute(&self, _tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        if concrete {
            return Err(Error::Type("Any has no concrete substitution".to_string()));
        }
        Ok(None)
    }
}
