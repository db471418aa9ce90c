//! Synthesized method bodies over a class declaration: structural
//! `equals`/`hashCode`/`toString` and erased-signature bridges.

mod bridge;
mod equality;
mod to_string;

pub use bridge::synthesize_bridge;
pub use equality::{synthesize_equals, synthesize_hash_code};
pub use to_string::synthesize_to_string;

use crate::error::{Error, Result};
use crate::frame::Local;
use crate::insn::{FieldRef, Insn, MethodRef};
use crate::model::{ClassDef, FieldDef};
use crate::types::{Signature, Type};

const ARRAYS: &str = "java/util/Arrays";

/// The instance fields a structural method covers, and whether the
/// superclass implementation participates. The default is every instance
/// field in declaration order with no super call.
#[derive(Debug, Clone, Default)]
pub struct FieldSelection {
    names: Option<Vec<String>>,
    include_super: bool,
}

impl FieldSelection {
    pub fn all() -> FieldSelection {
        FieldSelection::default()
    }

    /// Restricts the covered fields to the named ones, compared and hashed
    /// in the order given here rather than declaration order.
    pub fn named<I>(names: I) -> FieldSelection
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        FieldSelection {
            names: Some(names.into_iter().map(Into::into).collect()),
            include_super: false,
        }
    }

    /// Folds the superclass implementation in first.
    #[must_use]
    pub fn with_super(mut self) -> FieldSelection {
        self.include_super = true;
        self
    }

    pub(crate) fn include_super(&self) -> bool {
        self.include_super
    }

    /// Resolves the selection against a declaration. Naming a field the
    /// class lacks (or declares statically) is `NoSuchField`.
    pub(crate) fn pick<'d>(&self, def: &'d ClassDef) -> Result<Vec<&'d FieldDef>> {
        match &self.names {
            None => Ok(def.instance_fields().collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    def.field(name)
                        .filter(|f| !f.is_static)
                        .ok_or_else(|| Error::NoSuchField {
                            owner: def.name.clone(),
                            field: name.clone(),
                        })
                })
                .collect(),
        }
    }
}

pub(crate) fn own_field(def: &ClassDef, field: &FieldDef) -> FieldRef {
    FieldRef::new(def.self_type(), &field.name, field.ty.clone())
}

pub(crate) fn load_own_field(def: &ClassDef, field: &FieldDef) -> Vec<Insn> {
    vec![
        Insn::Load(Local::at(0)),
        Insn::GetField(own_field(def, field)),
    ]
}

/// Deep comparison applies only when the component is itself an array.
pub(crate) fn wants_deep(field_ty: &Type) -> bool {
    field_ty.dims() > 1
}

/// Helper name and parameter shape for a `java.util.Arrays` call over the
/// field: primitive arrays take the element-typed shallow overload,
/// reference arrays the `Object[]` one, nested arrays the deep variant.
fn arrays_shape<'n>(field_ty: &Type, shallow: &'n str, deep: &'n str) -> (&'n str, Type) {
    if wants_deep(field_ty) {
        return (deep, Type::object().array_of(1));
    }
    let param = match field_ty.component() {
        Some(c) if c.is_reference() => Type::object().array_of(1),
        _ => field_ty.clone(),
    };
    (shallow, param)
}

/// Two-array `Arrays` comparison helper matching the field's shape.
pub(crate) fn arrays_pair(field_ty: &Type, shallow: &str, deep: &str, ret: Type) -> MethodRef {
    let (name, param) = arrays_shape(field_ty, shallow, deep);
    MethodRef::static_(
        Type::class(ARRAYS),
        name,
        Signature::new(vec![param.clone(), param], ret),
    )
}

/// Single-array `Arrays` rendering/hashing helper matching the field's shape.
pub(crate) fn arrays_unary(field_ty: &Type, shallow: &str, deep: &str, ret: Type) -> MethodRef {
    let (name, param) = arrays_shape(field_ty, shallow, deep);
    MethodRef::static_(Type::class(ARRAYS), name, Signature::new(vec![param], ret))
}
