//! End-to-end lowering checks over the public API: instruction selection,
//! slot assignment, coercions, and failure classes.

use jvm_codegen::{
    ArithOp, CmpOp, Cond, Error, Insn, Label, MethodShape, Signature, Type, Value, compile_body,
    types,
};
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::Instruction;

fn lower(shape: &MethodShape, insns: &[Insn]) -> jvm_codegen::CompiledBody {
    let mut cp = ConstantPool::default();
    compile_body(shape, insns, &mut cp).expect("lowering")
}

#[test]
fn adds_two_int_params() {
    let shape = MethodShape::new(
        "demo/Calc",
        "add",
        Signature::new(vec![types::I32, types::I32], types::I32),
        false,
    );
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Load(shape.param_local(1)),
            Insn::Arith(ArithOp::Add),
            Insn::Ret,
        ],
    );
    assert_eq!(
        body.code,
        vec![
            Instruction::Iload_1,
            Instruction::Iload_2,
            Instruction::Iadd,
            Instruction::Ireturn,
        ]
    );
    assert_eq!(body.max_stack, 2);
    assert_eq!(body.max_locals, 3);
}

#[test]
fn wide_params_take_two_slots() {
    let shape = MethodShape::new(
        "demo/Calc",
        "sum",
        Signature::new(vec![types::I64, types::I64], types::I64),
        true,
    );
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Load(shape.param_local(1)),
            Insn::Arith(ArithOp::Add),
            Insn::Ret,
        ],
    );
    assert_eq!(
        body.code,
        vec![
            Instruction::Lload_0,
            Instruction::Lload_2,
            Instruction::Ladd,
            Instruction::Lreturn,
        ]
    );
    assert_eq!(body.max_stack, 4);
    assert_eq!(body.max_locals, 4);
}

#[test]
fn narrowing_a_double_goes_through_int() {
    let shape = MethodShape::new(
        "demo/Calc",
        "toByte",
        Signature::new(vec![types::F64], types::I8),
        true,
    );
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Cast(types::I8),
            Insn::Ret,
        ],
    );
    assert_eq!(
        body.code,
        vec![
            Instruction::Dload_0,
            Instruction::D2i,
            Instruction::I2b,
            Instruction::Ireturn,
        ]
    );
}

#[test]
fn unbox_increment_rebox() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bump",
        Signature::new(
            vec![Type::class("java/lang/Integer")],
            Type::class("java/lang/Integer"),
        ),
        true,
    );
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Unbox,
            Insn::Const(Value::Int(1)),
            Insn::Arith(ArithOp::Add),
            Insn::Box_,
            Insn::Ret,
        ],
    );
    assert!(matches!(body.code[0], Instruction::Aload_0));
    assert!(matches!(body.code[1], Instruction::Invokevirtual(_)));
    assert!(matches!(body.code[4], Instruction::Invokestatic(_)));
    assert!(matches!(body.code[5], Instruction::Areturn));
}

#[test]
fn allocation_dups_before_the_arguments() {
    let shape = MethodShape::new(
        "demo/Factory",
        "make",
        Signature::new(vec![], Type::class("demo/Pair")),
        true,
    );
    let body = lower(
        &shape,
        &[
            Insn::New {
                class: Type::class("demo/Pair"),
                ctor: Signature::new(vec![types::I32, types::I32], types::VOID),
                args: vec![Insn::Const(Value::Int(1)), Insn::Const(Value::Int(2))],
            },
            Insn::Ret,
        ],
    );
    assert!(matches!(body.code[0], Instruction::New(_)));
    assert!(matches!(body.code[1], Instruction::Dup));
    assert!(matches!(body.code[2], Instruction::Iconst_1));
    assert!(matches!(body.code[3], Instruction::Iconst_2));
    assert!(matches!(body.code[4], Instruction::Invokespecial(_)));
}

#[test]
fn conditional_on_longs_goes_through_lcmp() {
    let shape = MethodShape::new(
        "demo/Calc",
        "isZero",
        Signature::new(vec![types::I64], types::BOOLEAN),
        true,
    );
    let not_zero = Label::new();
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Const(Value::Long(0)),
            Insn::JumpIf(Cond::Cmp(CmpOp::Ne), not_zero.clone()),
            Insn::Const(Value::Int(1)),
            Insn::Ret,
            Insn::Mark(not_zero),
            Insn::Const(Value::Int(0)),
            Insn::Ret,
        ],
    );
    assert!(matches!(body.code[2], Instruction::Lcmp));
    assert!(matches!(body.code[3], Instruction::Ifne(6)));
}

#[test]
fn mixed_coercion_is_rejected() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![Type::string()], types::I32),
        true,
    );
    let mut cp = ConstantPool::default();
    let result = compile_body(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Cast(types::I32),
            Insn::Ret,
        ],
        &mut cp,
    );
    assert!(matches!(result, Err(Error::IllegalCoercion { .. })));
}

#[test]
fn arithmetic_on_an_empty_stack_underflows() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![], types::VOID),
        true,
    );
    let mut cp = ConstantPool::default();
    let result = compile_body(&shape, &[Insn::Arith(ArithOp::Neg)], &mut cp);
    assert!(matches!(
        result,
        Err(Error::StackUnderflow { .. } | Error::InsufficientStack { .. })
    ));
}

#[test]
fn mismatched_operand_types_are_rejected() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![types::I32, types::I64], types::I32),
        true,
    );
    let mut cp = ConstantPool::default();
    let result = compile_body(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Load(shape.param_local(1)),
            Insn::Arith(ArithOp::Add),
            Insn::Ret,
        ],
        &mut cp,
    );
    assert!(matches!(result, Err(Error::StackMismatch { .. })));
}

#[test]
fn zero_comparison_on_a_long_is_rejected() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![types::I64], types::BOOLEAN),
        true,
    );
    let done = Label::new();
    let mut cp = ConstantPool::default();
    let result = compile_body(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), done.clone()),
            Insn::Const(Value::Int(0)),
            Insn::Ret,
            Insn::Mark(done),
            Insn::Const(Value::Int(1)),
            Insn::Ret,
        ],
        &mut cp,
    );
    assert!(matches!(result, Err(Error::StackMismatch { .. })));
}

#[test]
fn null_check_on_an_int_is_rejected() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![types::I32], types::BOOLEAN),
        true,
    );
    let is_null = Label::new();
    let mut cp = ConstantPool::default();
    let result = compile_body(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::JumpIf(Cond::Null, is_null.clone()),
            Insn::Const(Value::Int(0)),
            Insn::Ret,
            Insn::Mark(is_null),
            Insn::Const(Value::Int(1)),
            Insn::Ret,
        ],
        &mut cp,
    );
    assert!(matches!(result, Err(Error::StackMismatch { .. })));
}

#[test]
fn reference_equality_on_ints_is_rejected() {
    let shape = MethodShape::new(
        "demo/Calc",
        "bad",
        Signature::new(vec![types::I32, types::I32], types::BOOLEAN),
        true,
    );
    let same = Label::new();
    let mut cp = ConstantPool::default();
    let result = compile_body(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Load(shape.param_local(1)),
            Insn::JumpIf(Cond::RefEq, same.clone()),
            Insn::Const(Value::Int(0)),
            Insn::Ret,
            Insn::Mark(same),
            Insn::Const(Value::Int(1)),
            Insn::Ret,
        ],
        &mut cp,
    );
    assert!(matches!(result, Err(Error::StackMismatch { .. })));
}

#[test]
fn store_new_allocates_and_reuses_a_slot() {
    let shape = MethodShape::new(
        "demo/Calc",
        "double",
        Signature::new(vec![types::I32], types::I32),
        true,
    );
    let scratch = jvm_codegen::Local::at(1);
    let body = lower(
        &shape,
        &[
            Insn::Load(shape.param_local(0)),
            Insn::Const(Value::Int(2)),
            Insn::Arith(ArithOp::Mul),
            Insn::StoreNew(types::I32),
            Insn::Load(scratch),
            Insn::Ret,
        ],
    );
    assert!(matches!(body.code[3], Instruction::Istore_1));
    assert!(matches!(body.code[4], Instruction::Iload_1));
    assert_eq!(body.max_locals, 2);
}
