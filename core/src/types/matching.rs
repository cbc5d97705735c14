//! One directional pattern matching of types.
//!
//! A pattern (possibly symbolic) is matched against a candidate, accumulating
//! type variable bindings in a [`TypeVars`] map. The map is shared across
//! several matches, so the same variable binds consistently across all
//! parameters of a signature. A mismatch returns `false` and may leave
//! partial bindings behind; callers that retry alternatives clone the map.

use hashbrown::{HashMap, HashSet};

use super::Type;
use crate::errors::Result;

pub type TypeVars = HashMap<String, Type>;

/// Binds `name` to `candidate`, or checks an existing binding.
pub(crate) fn bind(tp_vars: &mut TypeVars, name: &str, candidate: &Type) -> bool {
    match tp_vars.get(name) {
        Some(bound) => bound == candidate,
        None => {
            tp_vars.insert(name.to_string(), candidate.clone());
            true
        }
    }
}

impl Type {
    pub fn matches(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        match self.extended() {
            Some(pattern) => pattern.match_candidate(candidate, tp_vars),
            None => self == candidate,
        }
    }

    /// Matches with a fresh binding map.
    pub fn matches_concrete(&self, candidate: &Type) -> bool {
        let mut tp_vars = TypeVars::new();
        self.matches(candidate, &mut tp_vars)
    }

    /// Replaces bound type variables. With `concrete`, unbound variables and
    /// other leftover patterns are an error.
    pub fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Type> {
        match self.extended() {
            Some(ext) => Ok(ext
                .substitute(tp_vars, concrete)?
                .unwrap_or_else(|| self.clone())),
            None => Ok(self.clone()),
        }
    }

    /// Names of the type variables appearing in this type.
    pub fn vars(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        if let Some(ext) = self.extended() {
            ext.vars(&mut out);
        }
        out
    }
}
