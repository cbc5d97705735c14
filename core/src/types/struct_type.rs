use core::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use super::base::{BaseType, Property, TypeFlags};
use super::matching::TypeVars;
use super::{Type, TypeId, TypeKind};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ComparisonType, ErrorMode, KernelBuilder, KernelRequest, struct_kernels};
use crate::metadata::{self, MemoryBlock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<String>,
    pub tp: Type,
}

/// Ordered fields at aligned offsets. Tuples are structs without names.
#[derive(Debug, Clone)]
pub struct StructType {
    fields: Vec<Field>,
    data_offsets: Vec<usize>,
    arrmeta_offsets: Vec<usize>,
    data_size: usize,
    data_alignment: usize,
    arrmeta_size: usize,
    flags: TypeFlags,
}

pub fn make_struct<S: Into<String>>(fields: impl IntoIterator<Item = (S, Type)>) -> Result<Type> {
    let fields = fields
        .into_iter()
        .map(|(name, tp)| Field {
            name: Some(name.into()),
            tp,
        })
        .collect();
    Ok(Type::new(StructType::new(fields)?))
}

pub fn make_tuple(fields: impl IntoIterator<Item = Type>) -> Result<Type> {
    let fields = fields.into_iter().map(|tp| Field { name: None, tp }).collect();
    Ok(Type::new(StructType::new(fields)?))
}

impl StructType {
    /// All fields must be named (a struct) or none (a tuple).
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let named = fields.iter().filter(|f| f.name.is_some()).count();
        if named != 0 && named != fields.len() {
            return Err(Error::Type(
                "either every field is named or none is".to_string(),
            ));
        }
        {
            let mut seen = HashSet::new();
            for name in fields.iter().filter_map(|f| f.name.as_deref()) {
                if !seen.insert(name) {
                    return Err(Error::Type(format!("duplicate field name {name:?}")));
                }
            }
        }

        let mut data_offsets = Vec::with_capacity(fields.len());
        let mut arrmeta_offsets = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        let mut arrmeta_size = 0usize;
        let mut data_alignment = 1usize;
        let mut flags = TypeFlags::empty();
        for field in &fields {
            let align = field.tp.data_alignment().max(1);
            offset = offset.next_multiple_of(align);
            data_offsets.push(offset);
            offset += field.tp.data_size();
            arrmeta_offsets.push(arrmeta_size);
            arrmeta_size += field.tp.arrmeta_size();
            data_alignment = data_alignment.max(align);
            flags |= field.tp.flags().inherited();
        }
        // Symbolic fields have no layout, so neither does the struct.
        let data_size = if flags.contains(TypeFlags::SYMBOLIC) {
            0
        } else {
            offset.next_multiple_of(data_alignment)
        };
        Ok(Self {
            fields,
            data_offsets,
            arrmeta_offsets,
            data_size,
            data_alignment,
            arrmeta_size,
            flags,
        })
    }

    pub fn is_tuple(&self) -> bool {
        self.fields.first().is_none_or(|f| f.name.is_none())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> Option<&Type> {
        self.fields.get(i).map(|f| &f.tp)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }

    pub fn data_offset(&self, i: usize) -> usize {
        self.data_offsets[i]
    }

    pub fn arrmeta_offset(&self, i: usize) -> usize {
        self.arrmeta_offsets[i]
    }

    /// The arrmeta region of field `i` within the struct's arrmeta.
    pub fn field_arrmeta<'a>(&self, arrmeta: &'a [u8], i: usize) -> &'a [u8] {
        let start = self.arrmeta_offsets[i];
        &arrmeta[start..start + self.fields[i].tp.arrmeta_size()]
    }

    fn field_arrmeta_mut<'a>(&self, arrmeta: &'a mut [u8], i: usize) -> &'a mut [u8] {
        let start = self.arrmeta_offsets[i];
        &mut arrmeta[start..start + self.fields[i].tp.arrmeta_size()]
    }

    fn rebuild(&self, fields: Vec<Field>) -> Result<Type> {
        Ok(Type::new(StructType::new(fields)?))
    }
}

impl BaseType for StructType {
    fn id(&self) -> TypeId {
        if self.is_tuple() {
            TypeId::Tuple
        } else {
            TypeId::Struct
        }
    }

    fn kind(&self) -> TypeKind {
        if self.is_tuple() {
            TypeKind::Tuple
        } else {
            TypeKind::Struct
        }
    }

    fn data_size(&self) -> usize {
        self.data_size
    }

    fn data_alignment(&self) -> usize {
        self.data_alignment
    }

    fn flags(&self) -> TypeFlags {
        self.flags
    }

    fn arrmeta_size(&self) -> usize {
        self.arrmeta_size
    }

    fn print_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.is_tuple() { ("(", ")") } else { ("{", "}") };
        f.write_str(open)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &field.name {
                Some(name) => write!(f, "{name}: {}", field.tp)?,
                None => write!(f, "{}", field.tp)?,
            }
        }
        f.write_str(close)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        out.write_str("[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            let field_data = data.wrapping_add(self.data_offsets[i]);
            unsafe { field.tp.print_data(out, self.field_arrmeta(arrmeta, i), field_data)? };
        }
        out.write_str("]")
    }

    fn equals(&self, other: &dyn BaseType) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self.fields == other.fields)
    }

    fn canonical_type(&self) -> Option<Type> {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                tp: f.tp.canonical_type(),
            })
            .collect();
        if fields == self.fields {
            return None;
        }
        self.rebuild(fields).ok()
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        match (dst.extended_as::<StructType>(), src.extended_as::<StructType>()) {
            (Some(dst), Some(src)) => {
                dst.fields.len() == src.fields.len()
                    && dst.fields.iter().zip(&src.fields).all(|(d, s)| {
                        d.name == s.name && d.tp.is_lossless_assignment_from(&s.tp)
                    })
            }
            _ => false,
        }
    }

    fn at_single(&self, i0: isize) -> Option<Result<Type>> {
        let n = self.fields.len() as isize;
        let i = if i0 < 0 { i0 + n } else { i0 };
        if i < 0 || i >= n {
            return Some(Err(Error::IndexOutOfBounds {
                index: i0,
                dim_size: self.fields.len(),
            }));
        }
        Some(Ok(self.fields[i as usize].tp.clone()))
    }

    fn match_candidate(&self, candidate: &Type, tp_vars: &mut TypeVars) -> bool {
        let Some(c) = candidate.extended_as::<StructType>() else {
            return false;
        };
        c.fields.len() == self.fields.len()
            && self
                .fields
                .iter()
                .zip(&c.fields)
                .all(|(p, c)| p.name == c.name && p.tp.matches(&c.tp, tp_vars))
    }

    fn substitute(&self, tp_vars: &TypeVars, concrete: bool) -> Result<Option<Type>> {
        let fields = self
            .fields
            .iter()
            .map(|f| {
                Ok(Field {
                    name: f.name.clone(),
                    tp: f.tp.substitute(tp_vars, concrete)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if fields == self.fields {
            return Ok(None);
        }
        self.rebuild(fields).map(Some)
    }

    fn vars(&self, out: &mut HashSet<String>) {
        for field in &self.fields {
            out.extend(field.tp.vars());
        }
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        let mut props = vec![(
            "field_types",
            Property::Types(self.fields.iter().map(|f| f.tp.clone()).collect()),
        )];
        if !self.is_tuple() {
            props.push((
                "field_names",
                Property::Strs(
                    self.fields
                        .iter()
                        .filter_map(|f| f.name.clone())
                        .collect(),
                ),
            ));
        }
        props
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        _shape: &[isize],
        blockref: Option<&Arc<MemoryBlock>>,
    ) -> Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            let field_meta = self.field_arrmeta_mut(arrmeta, i);
            if let Err(e) = metadata::arrmeta_default_construct(&field.tp, field_meta, &[], blockref)
            {
                // Undo the fields that were already constructed.
                for (j, done) in self.fields.iter().enumerate().take(i) {
                    unsafe {
                        metadata::arrmeta_destruct(&done.tp, self.field_arrmeta_mut(arrmeta, j))
                    };
                }
                return Err(e);
            }
        }
        Ok(())
    }

    unsafe fn arrmeta_copy_construct(&self, dst: &mut [u8], src: &[u8]) {
        for (i, field) in self.fields.iter().enumerate() {
            unsafe {
                metadata::arrmeta_copy_construct(
                    &field.tp,
                    self.field_arrmeta_mut(dst, i),
                    self.field_arrmeta(src, i),
                )
            };
        }
    }

    unsafe fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        for (i, field) in self.fields.iter().enumerate() {
            unsafe { metadata::arrmeta_destruct(&field.tp, self.field_arrmeta_mut(arrmeta, i)) };
        }
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        writeln!(out, "{indent}struct arrmeta")?;
        let inner = format!("{indent}  ");
        for (i, field) in self.fields.iter().enumerate() {
            match &field.name {
                Some(name) => writeln!(out, "{indent} field {i} ({name}):")?,
                None => writeln!(out, "{indent} field {i}:")?,
            }
            metadata::arrmeta_debug_print(&field.tp, self.field_arrmeta(arrmeta, i), out, &inner)?;
        }
        Ok(())
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tp: &Type,
        src_meta: &[u8],
        kernreq: KernelRequest,
        errmode: ErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        struct_kernels::make_struct_assignment_kernel(
            ckb, dst_tp, dst_meta, src_tp, src_meta, kernreq, errmode, ectx,
        )
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        src0_tp: &Type,
        src0_meta: &[u8],
        src1_tp: &Type,
        src1_meta: &[u8],
        comptype: ComparisonType,
        ectx: &EvalContext,
    ) -> Result<usize> {
        struct_kernels::make_struct_comparison_kernel(
            ckb, src0_tp, src0_meta, src1_tp, src1_meta, comptype, ectx,
        )
    }

    fn as_struct(&self) -> Option<&StructType> {
        Some(self)
    }
}
