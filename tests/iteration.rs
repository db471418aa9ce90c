//! Element-wise loop checks: array vs iterable shape, counters, and
//! break/continue targeting.

use jvm_codegen::{
    ArithOp, Error, ForEach, Insn, Local, MethodShape, Signature, Type, Value, compile_body, types,
};
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::Instruction;

#[test]
fn arrays_iterate_with_a_cursor_and_length() {
    let shape = MethodShape::new(
        "demo/Sum",
        "total",
        Signature::new(vec![types::I32.array_of(1)], types::I32),
        true,
    );
    let acc = Local::at(1);
    let body = compile_body(
        &shape,
        &[
            Insn::Const(Value::Int(0)),
            Insn::StoreNew(types::I32),
            Insn::ForEach(Box::new(ForEach::new(
                vec![Insn::Load(shape.param_local(0))],
                types::I32,
                vec![
                    Insn::Load(acc),
                    Insn::Element(0),
                    Insn::Arith(ArithOp::Add),
                    Insn::Store(acc),
                ],
            ))),
            Insn::Load(acc),
            Insn::Ret,
        ],
        &mut ConstantPool::default(),
    )
    .expect("lowering");

    let has = |pred: fn(&Instruction) -> bool| body.code.iter().any(pred);
    assert!(has(|i| matches!(i, Instruction::Arraylength)));
    assert!(has(|i| matches!(i, Instruction::Iaload)));
    assert!(has(|i| matches!(i, Instruction::Iinc(_, 1))));
    assert!(has(|i| matches!(i, Instruction::If_icmpge(_))));
    assert!(has(|i| matches!(i, Instruction::Goto(_))));
    // No iterator protocol for arrays.
    assert!(!has(|i| matches!(i, Instruction::Invokeinterface(_, _))));
}

#[test]
fn iterables_go_through_the_iterator_protocol() {
    let shape = MethodShape::new(
        "demo/Join",
        "walk",
        Signature::new(vec![Type::class("java/util/List")], types::VOID),
        true,
    );
    let body = compile_body(
        &shape,
        &[
            Insn::ForEach(Box::new(ForEach::new(
                vec![Insn::Load(shape.param_local(0))],
                Type::string(),
                vec![Insn::Element(0), Insn::Pop],
            ))),
            Insn::Ret,
        ],
        &mut ConstantPool::default(),
    )
    .expect("lowering");

    let interface_calls = body
        .code
        .iter()
        .filter(|i| matches!(i, Instruction::Invokeinterface(_, _)))
        .count();
    // iterator(), then hasNext() and next() inside the loop.
    assert_eq!(interface_calls, 3);
    assert!(
        body.code
            .iter()
            .any(|i| matches!(i, Instruction::Checkcast(_)))
    );
    assert!(
        !body
            .code
            .iter()
            .any(|i| matches!(i, Instruction::Arraylength))
    );
}

#[test]
fn primitive_elements_from_an_iterable_are_unboxed() {
    let shape = MethodShape::new(
        "demo/Join",
        "walk",
        Signature::new(vec![Type::class("java/util/List")], types::VOID),
        true,
    );
    let body = compile_body(
        &shape,
        &[
            Insn::ForEach(Box::new(ForEach::new(
                vec![Insn::Load(shape.param_local(0))],
                types::I32,
                vec![Insn::Element(0), Insn::Pop],
            ))),
            Insn::Ret,
        ],
        &mut ConstantPool::default(),
    )
    .expect("lowering");

    // Integer.intValue() is a virtual call on the checked-cast wrapper.
    assert!(
        body.code
            .iter()
            .any(|i| matches!(i, Instruction::Invokevirtual(_)))
    );
}

#[test]
fn array_loops_cache_the_length_once() {
    let shape = MethodShape::new(
        "demo/Sum",
        "scan",
        Signature::new(vec![types::I32.array_of(1)], types::VOID),
        true,
    );
    let body = compile_body(
        &shape,
        &[
            Insn::ForEach(Box::new(ForEach::new(
                vec![Insn::Load(shape.param_local(0))],
                types::I32,
                vec![Insn::Length(0), Insn::Pop, Insn::Counter(0), Insn::Pop],
            ))),
            Insn::Ret,
        ],
        &mut ConstantPool::default(),
    )
    .expect("lowering");

    let lengths = body
        .code
        .iter()
        .filter(|i| matches!(i, Instruction::Arraylength))
        .count();
    assert_eq!(lengths, 1);

    // Iterables carry no length local.
    let iterable_shape = MethodShape::new(
        "demo/Sum",
        "scan",
        Signature::new(vec![Type::class("java/util/List")], types::VOID),
        true,
    );
    assert!(matches!(
        compile_body(
            &iterable_shape,
            &[
                Insn::ForEach(Box::new(ForEach::new(
                    vec![Insn::Load(iterable_shape.param_local(0))],
                    Type::string(),
                    vec![Insn::Length(0), Insn::Pop],
                ))),
                Insn::Ret,
            ],
            &mut ConstantPool::default(),
        ),
        Err(Error::NoLoopVariable { depth: 0 })
    ));
}

#[test]
fn counters_are_opt_in_for_iterables() {
    let shape = MethodShape::new(
        "demo/Join",
        "walk",
        Signature::new(vec![Type::class("java/util/List")], types::VOID),
        true,
    );
    let counted = ForEach::new(
        vec![Insn::Load(shape.param_local(0))],
        Type::string(),
        vec![Insn::Element(0), Insn::Pop, Insn::Counter(0), Insn::Pop],
    )
    .counted();
    let body = compile_body(
        &shape,
        &[Insn::ForEach(Box::new(counted)), Insn::Ret],
        &mut ConstantPool::default(),
    )
    .expect("lowering");
    assert!(
        body.code
            .iter()
            .any(|i| matches!(i, Instruction::Iinc(_, 1)))
    );

    let uncounted = ForEach::new(
        vec![Insn::Load(shape.param_local(0))],
        Type::string(),
        vec![Insn::Counter(0), Insn::Pop],
    );
    assert!(matches!(
        compile_body(
            &shape,
            &[Insn::ForEach(Box::new(uncounted)), Insn::Ret],
            &mut ConstantPool::default(),
        ),
        Err(Error::NoLoopVariable { depth: 0 })
    ));
}

#[test]
fn break_targets_the_addressed_loop() {
    let shape = MethodShape::new(
        "demo/Join",
        "walk",
        Signature::new(vec![Type::object().array_of(2)], types::VOID),
        true,
    );
    // Nested walk over Object[][]; the inner loop breaks out of the outer.
    let inner = ForEach::new(
        vec![Insn::Element(0)],
        Type::object(),
        vec![Insn::Break(1)],
    );
    let outer = ForEach::new(
        vec![Insn::Load(shape.param_local(0))],
        Type::object().array_of(1),
        vec![Insn::ForEach(Box::new(inner))],
    );
    compile_body(
        &shape,
        &[Insn::ForEach(Box::new(outer)), Insn::Ret],
        &mut ConstantPool::default(),
    )
    .expect("lowering");
}

#[test]
fn break_outside_any_loop_is_rejected() {
    let shape = MethodShape::new(
        "demo/Join",
        "walk",
        Signature::new(vec![], types::VOID),
        true,
    );
    assert!(matches!(
        compile_body(&shape, &[Insn::Break(0)], &mut ConstantPool::default()),
        Err(Error::InvalidLoopDepth {
            requested: 0,
            nesting: 0
        })
    ));
}
