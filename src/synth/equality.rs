//! Structural `equals` and `hashCode` bodies.
//!
//! `equals` follows the javac shape: identity fast path, null check, exact
//! class check, then one comparison per covered field with an early false
//! exit. Floats go through `Float.compare`/`Double.compare` so NaN fields
//! compare equal to themselves; arrays go through `java.util.Arrays`.

use crate::error::Result;
use crate::frame::Local;
use crate::insn::{CmpOp, Cond, Insn, MethodRef, Value};
use crate::model::{ClassDef, FieldDef, MethodDef};
use crate::pos::Label;
use crate::synth::{FieldSelection, arrays_pair, arrays_unary, load_own_field, own_field};
use crate::types::{BOOLEAN, I32, Primitive, Signature, Type};

const OBJECTS: &str = "java/util/Objects";

pub fn synthesize_equals(
    def: &ClassDef,
    selection: &FieldSelection,
) -> Result<(MethodDef, Vec<Insn>)> {
    let shape = MethodDef {
        name: "equals".to_string(),
        signature: Signature::new(vec![Type::object()], BOOLEAN),
        is_static: false,
        is_bridge: false,
    };
    let fields = selection.pick(def)?;

    let this = Local::at(0);
    let other = Local::at(1);
    // First fresh local after the receiver and parameter.
    let that = Local::at(2);
    let ret_true = Label::new();
    let ret_false = Label::new();

    let get_class = MethodRef::virtual_(
        Type::object(),
        "getClass",
        Signature::new(vec![], Type::class("java/lang/Class")),
    );

    let mut body = vec![
        Insn::Load(this),
        Insn::Load(other),
        Insn::JumpIf(Cond::RefEq, ret_true.clone()),
        Insn::Load(other),
        Insn::JumpIf(Cond::Null, ret_false.clone()),
        Insn::Load(this),
        Insn::Invoke(get_class.clone()),
        Insn::Load(other),
        Insn::Invoke(get_class),
        Insn::JumpIf(Cond::RefNe, ret_false.clone()),
    ];

    if selection.include_super() {
        body.extend([
            Insn::Load(this),
            Insn::Load(other),
            Insn::Invoke(MethodRef::special(
                Type::class(&def.super_class),
                "equals",
                Signature::new(vec![Type::object()], BOOLEAN),
            )),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), ret_false.clone()),
        ]);
    }

    if !fields.is_empty() {
        body.extend([
            Insn::Load(other),
            Insn::CheckCast(def.self_type()),
            Insn::StoreNew(def.self_type()),
        ]);
        for field in &fields {
            body.extend(load_own_field(def, field));
            body.push(Insn::Load(that));
            body.push(Insn::GetField(own_field(def, field)));
            body.extend(field_disagrees(field, &ret_false));
        }
    }

    body.extend([
        Insn::Mark(ret_true),
        Insn::Const(Value::Int(1)),
        Insn::Ret,
        Insn::Mark(ret_false),
        Insn::Const(Value::Int(0)),
        Insn::Ret,
    ]);
    Ok((shape, body))
}

/// Consumes the two field values on the stack, jumping to `ret_false` when
/// they disagree.
fn field_disagrees(field: &FieldDef, ret_false: &Label) -> Vec<Insn> {
    match field.ty.primitive() {
        Some(Primitive::F32) => vec![
            Insn::Invoke(compare(Primitive::F32)),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Ne), ret_false.clone()),
        ],
        Some(Primitive::F64) => vec![
            Insn::Invoke(compare(Primitive::F64)),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Ne), ret_false.clone()),
        ],
        Some(_) => vec![Insn::JumpIf(Cond::Cmp(CmpOp::Ne), ret_false.clone())],
        None if field.ty.is_array() => vec![
            Insn::Invoke(arrays_pair(&field.ty, "equals", "deepEquals", BOOLEAN)),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), ret_false.clone()),
        ],
        None => vec![
            Insn::Invoke(MethodRef::static_(
                Type::class(OBJECTS),
                "equals",
                Signature::new(vec![Type::object(), Type::object()], BOOLEAN),
            )),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), ret_false.clone()),
        ],
    }
}

fn compare(p: Primitive) -> MethodRef {
    let ty = Type::Primitive(p);
    let wrapper = match p {
        Primitive::F32 => "java/lang/Float",
        _ => "java/lang/Double",
    };
    MethodRef::static_(
        Type::class(wrapper),
        "compare",
        Signature::new(vec![ty.clone(), ty], I32),
    )
}

/// A base-31 accumulator over the covered fields, each hashed through the
/// wrapper statics, `Arrays`, or `Objects.hashCode`. The accumulator seeds
/// from `super.hashCode()` when the selection folds the superclass in,
/// from 1 otherwise. An empty selection with no super call hashes to 0.
pub fn synthesize_hash_code(
    def: &ClassDef,
    selection: &FieldSelection,
) -> Result<(MethodDef, Vec<Insn>)> {
    let shape = MethodDef {
        name: "hashCode".to_string(),
        signature: Signature::new(vec![], I32),
        is_static: false,
        is_bridge: false,
    };
    let fields = selection.pick(def)?;

    if fields.is_empty() && !selection.include_super() {
        return Ok((shape, vec![Insn::Const(Value::Int(0)), Insn::Ret]));
    }

    let acc = Local::at(1);
    let mut body = if selection.include_super() {
        vec![
            Insn::Load(Local::at(0)),
            Insn::Invoke(MethodRef::special(
                Type::class(&def.super_class),
                "hashCode",
                Signature::new(vec![], I32),
            )),
            Insn::StoreNew(I32),
        ]
    } else {
        vec![Insn::Const(Value::Int(1)), Insn::StoreNew(I32)]
    };
    for field in &fields {
        body.push(Insn::Const(Value::Int(31)));
        body.push(Insn::Load(acc));
        body.push(Insn::Arith(crate::insn::ArithOp::Mul));
        body.extend(load_own_field(def, field));
        body.extend(field_hash(field));
        body.push(Insn::Arith(crate::insn::ArithOp::Add));
        body.push(Insn::Store(acc));
    }
    body.push(Insn::Load(acc));
    body.push(Insn::Ret);
    Ok((shape, body))
}

/// Consumes the field value on the stack, leaving its int hash.
fn field_hash(field: &FieldDef) -> Vec<Insn> {
    match field.ty.primitive() {
        Some(p) => match p.wrapper_class() {
            Some(wrapper) => vec![Insn::Invoke(MethodRef::static_(
                Type::class(wrapper),
                "hashCode",
                Signature::new(vec![Type::Primitive(p)], I32),
            ))],
            None => vec![],
        },
        None if field.ty.is_array() => vec![Insn::Invoke(arrays_unary(
            &field.ty,
            "hashCode",
            "deepHashCode",
            I32,
        ))],
        None => vec![Insn::Invoke(MethodRef::static_(
            Type::class(OBJECTS),
            "hashCode",
            Signature::new(vec![Type::object()], I32),
        ))],
    }
}
