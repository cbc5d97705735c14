use core::fmt;

use hashbrown::HashSet;

use super::base::{BaseType, Property, TypeFlags};
use super::matching::TypeVars;
use super::{Type, TypeId, TypeKind};
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KwdParam {
    pub name: String,
    pub tp: Type,
    pub optional: bool,
}

impl KwdParam {
    pub fn required(name: impl Into<String>, tp: Type) -> Self {
        Self {
            name: name.into(),
            tp,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, tp: Type) -> Self {
        Self {
            name: name.into(),
            tp,
            optional: true,
        }
    }
}

/// Signature of a callable: `(pos..., kwd: T, opt: ?U) -> R`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableType {
    ret: Type,
    pos: Vec<Type>,
    kwds: Vec<KwdParam>,
}

pub fn make_callable(ret: Type, pos: Vec<Type>, kwds: Vec<KwdParam>) -> Type {
    Type::new(CallableType { ret, pos, kwds })
}

impl CallableType {
    pub fn return_type(&self) -> &Type {
        &self.ret
    }

    pub fn pos_types(&self) -> &[Type] {
        &self.pos
    }

    pub fn pos_type(&self, i: usize) -> Option<&Type> {
        self.pos.get(i)
    }

    pub fn npos(&self) -> usize {
        self.pos.len()
    }

    pub fn kwds(&self) -> &[KwdParam] {
        &self.kwds
    }

    pub fn nkwd(&self) -> usize {
        self.kwds.len()
    }

    pub fn kwd_index(&self, name: &str) -> Option<usize> {
        self.kwds.iter().position(|k| k.name == name)
    }

    fn children(&self) -> impl Iterator<Item = &Type> {
        core::iter::once(&self.ret)
            .chain(self.pos.iter())
            .chain(self.kwds.iter().map(|k| &k.tp))
    }
}

impl BaseType for CallableType {
    fn id(&self) -> TypeId {
        TypeId::Callable
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Callable
    }

    fn data_size(&self) -> usize {
        0
    }

    fn data_alignment(&self) -> usize {
        1
    }

    fn flags(&self) -> TypeFlags {
        self.children()
            .fold(TypeFlags::SCALAR, |acc, tp| {
                acc | (tp.flags() & (TypeFlags::SYMBOLIC | TypeFlags::VARIADIC))
            })
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut first = true;
        for tp in &self.pos {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{tp}")?;
        }
        for kwd in &self.kwds {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            let opt = if kwd.optional { "?" } else { "" };
            write!(f, "{}: {opt}{}", kwd.name, kwd.tp)?;
        }
        write!(f, ") -> {}", self.ret)
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
        let Some(c) = candidate.extended().and_then(|ext| ext.as_callable()) else {
            return false;
        };
        if c.pos.len() != self.pos.len() || c.kwds.len() != self.kwds.len() {
            return false;
        }
        let pos_ok = self
            .pos
            .iter()
            .zip(&c.pos)
            .all(|(p, c)| p.matches(c, tp_vars));
        let kwds_ok = self.kwds.iter().all(|p| {
            c.kwds.iter().any(|k| {
                k.name == p.name && k.optional == p.optional && p.tp.matches(&k.tp, tp_vars)
            })
        });
        pos_ok && kwds_ok && self.ret.matches(&c.ret, tp_vars)
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let ret = self.ret.substitute(tp_vars, concrete)?;
        let pos = self
            .pos
            .iter()
            .map(|tp| tp.substitute(tp_vars, concrete))
            .collect::<Result<Vec<_>>>()?;
        let kwds = self
            .kwds
            .iter()
            .map(|k| {
                Ok(KwdParam {
                    name: k.name.clone(),
                    tp: k.tp.substitute(tp_vars, concrete)?,
                    optional: k.optional,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let substituted = CallableType { ret, pos, kwds };
        Ok((substituted != *self).then(|| Type::new(substituted)))
    }

    fn vars(&self, out: &mut HashSet<String>) {
        for tp in self.children() {
            out.extend(tp.vars());
        }
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("return_type", Property::Type(self.ret.clone())),
            ("pos_types", Property::Types(self.pos.clone())),
            (
                "kwd_names",
                Property::Strs(self.kwds.iter().map(|k| k.name.clone()).collect()),
            ),
        ]
    }

    fn as_callable(&self) -> Option<&CallableType> {
        Some(self)
    }
}
