//! Switch construct checks: dispatch shape selection, string bucketing, and
//! branch-set validation.

use jvm_codegen::{
    Error, Insn, IntSwitch, MethodShape, Signature, StrSwitch, StrSwitchStrategy, Type, Value,
    compile_body, types,
};
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::Instruction;

fn int_switch_shape() -> MethodShape {
    MethodShape::new(
        "demo/Dispatch",
        "pick",
        Signature::new(vec![types::I32], types::I32),
        true,
    )
}

fn str_switch_shape() -> MethodShape {
    MethodShape::new(
        "demo/Dispatch",
        "pick",
        Signature::new(vec![Type::string()], types::I32),
        true,
    )
}

fn count_switches(code: &[Instruction]) -> (usize, usize) {
    let tables = code
        .iter()
        .filter(|i| matches!(i, Instruction::Tableswitch { .. }))
        .count();
    let lookups = code
        .iter()
        .filter(|i| matches!(i, Instruction::Lookupswitch { .. }))
        .count();
    (tables, lookups)
}

/// Resolves the instruction index the first switch in `code` dispatches
/// `key` to, the way the interpreter would.
fn dispatch_target(code: &[Instruction], key: i32) -> usize {
    for instruction in code {
        match instruction {
            Instruction::Tableswitch {
                default,
                low,
                high,
                offsets,
            } => {
                return if key >= *low && key <= *high {
                    offsets[(key - low) as usize] as usize
                } else {
                    *default as usize
                };
            }
            Instruction::Lookupswitch { default, pairs } => {
                return pairs
                    .get(&key)
                    .map_or(*default as usize, |offset| *offset as usize);
            }
            _ => {}
        }
    }
    panic!("no switch instruction in the stream");
}

/// Reads the int constant a `Const` + `Ret` branch body pushes at `at`.
fn branch_constant(code: &[Instruction], at: usize) -> i32 {
    match &code[at] {
        Instruction::Iconst_m1 => -1,
        Instruction::Iconst_0 => 0,
        Instruction::Iconst_1 => 1,
        Instruction::Iconst_2 => 2,
        Instruction::Iconst_3 => 3,
        Instruction::Iconst_4 => 4,
        Instruction::Iconst_5 => 5,
        Instruction::Bipush(v) => i32::from(*v),
        Instruction::Sipush(v) => i32::from(*v),
        other => panic!("branch at {at} does not start with an int constant: {other:?}"),
    }
}

#[test]
fn a_hundred_contiguous_keys_compile_to_a_table() {
    let shape = int_switch_shape();
    let mut switch = IntSwitch::new(vec![Insn::Load(shape.param_local(0))]);
    for key in 0..100 {
        switch = switch.branch(
            vec![key],
            vec![Insn::Const(Value::Int(key * 2)), Insn::Ret],
        );
    }
    switch = switch.default_branch(vec![Insn::Const(Value::Int(-1)), Insn::Ret]);

    let mut cp = ConstantPool::default();
    let body = compile_body(&shape, &[Insn::IntSwitch(switch)], &mut cp).expect("lowering");

    match &body.code[1] {
        Instruction::Tableswitch {
            default,
            low,
            high,
            offsets,
        } => {
            assert_eq!(*low, 0);
            assert_eq!(*high, 99);
            assert_eq!(offsets.len(), 100);
            // Every covered key has its own branch; no default holes.
            assert!(offsets.iter().all(|o| o != default));
        }
        other => panic!("expected tableswitch, got {other:?}"),
    }

    // Every registered key reaches its own branch; anything else reaches
    // the default.
    for key in 0..100 {
        let target = dispatch_target(&body.code, key);
        assert_eq!(branch_constant(&body.code, target), key * 2);
    }
    for key in [-1, 100, 7_000] {
        let target = dispatch_target(&body.code, key);
        assert_eq!(branch_constant(&body.code, target), -1);
    }
}

#[test]
fn sparse_keys_compile_to_a_lookup() {
    let shape = int_switch_shape();
    let switch = IntSwitch::new(vec![Insn::Load(shape.param_local(0))])
        .branch(vec![1], vec![Insn::Const(Value::Int(10)), Insn::Ret])
        .branch(vec![1_000], vec![Insn::Const(Value::Int(20)), Insn::Ret])
        .branch(vec![100_000], vec![Insn::Const(Value::Int(30)), Insn::Ret])
        .default_branch(vec![Insn::Const(Value::Int(0)), Insn::Ret]);

    let mut cp = ConstantPool::default();
    let body = compile_body(&shape, &[Insn::IntSwitch(switch)], &mut cp).expect("lowering");

    match &body.code[1] {
        Instruction::Lookupswitch { pairs, .. } => {
            let keys: Vec<i32> = pairs.keys().copied().collect();
            assert_eq!(keys, vec![1, 1_000, 100_000]);
        }
        other => panic!("expected lookupswitch, got {other:?}"),
    }

    for (key, expected) in [(1, 10), (1_000, 20), (100_000, 30), (2, 0), (-9, 0)] {
        let target = dispatch_target(&body.code, key);
        assert_eq!(branch_constant(&body.code, target), expected);
    }
}

#[test]
fn one_branch_may_claim_several_keys() {
    let shape = int_switch_shape();
    let switch = IntSwitch::new(vec![Insn::Load(shape.param_local(0))])
        .branch(vec![0, 1, 2], vec![Insn::Const(Value::Int(1)), Insn::Ret])
        .branch(vec![3], vec![Insn::Const(Value::Int(2)), Insn::Ret]);

    let mut cp = ConstantPool::default();
    let body = compile_body(&shape, &[Insn::IntSwitch(switch)], &mut cp).expect("lowering");

    match &body.code[1] {
        Instruction::Tableswitch {
            low, high, offsets, ..
        } => {
            assert_eq!(*low, 0);
            assert_eq!(*high, 3);
            // The first three keys share one target.
            assert_eq!(offsets[0], offsets[1]);
            assert_eq!(offsets[1], offsets[2]);
            assert_ne!(offsets[2], offsets[3]);
        }
        other => panic!("expected tableswitch, got {other:?}"),
    }
}

#[test]
fn duplicate_int_keys_are_rejected() {
    let shape = int_switch_shape();
    let switch = IntSwitch::new(vec![Insn::Load(shape.param_local(0))])
        .branch(vec![7], vec![Insn::Ret])
        .branch(vec![7], vec![Insn::Ret]);
    let mut cp = ConstantPool::default();
    assert!(matches!(
        compile_body(&shape, &[Insn::IntSwitch(switch)], &mut cp),
        Err(Error::DuplicateSwitchKey { .. })
    ));
}

#[test]
fn an_empty_switch_is_rejected() {
    let shape = int_switch_shape();
    let switch = IntSwitch::new(vec![Insn::Load(shape.param_local(0))]);
    let mut cp = ConstantPool::default();
    assert!(matches!(
        compile_body(&shape, &[Insn::IntSwitch(switch)], &mut cp),
        Err(Error::EmptyBranchSet { .. })
    ));
}

fn colliding_str_switch(strategy: StrSwitchStrategy) -> StrSwitch {
    let shape = str_switch_shape();
    // "Aa" and "BB" collide under String.hashCode.
    StrSwitch::new(vec![Insn::Load(shape.param_local(0))])
        .branch(
            vec!["Aa".to_string()],
            vec![Insn::Const(Value::Int(1)), Insn::Ret],
        )
        .branch(
            vec!["BB".to_string()],
            vec![Insn::Const(Value::Int(2)), Insn::Ret],
        )
        .branch(
            vec!["other".to_string()],
            vec![Insn::Const(Value::Int(3)), Insn::Ret],
        )
        .default_branch(vec![Insn::Const(Value::Int(0)), Insn::Ret])
        .strategy(strategy)
}

#[test]
fn two_phase_string_switch_dispatches_twice() {
    let shape = str_switch_shape();
    let switch = colliding_str_switch(StrSwitchStrategy::TwoPhase);
    let mut cp = ConstantPool::default();
    let body = compile_body(&shape, &[Insn::StrSwitch(switch)], &mut cp).expect("lowering");

    let (tables, lookups) = count_switches(&body.code);
    assert_eq!(tables + lookups, 2);

    // One equality check per literal.
    let equals_calls = body
        .code
        .iter()
        .filter(|i| matches!(i, Instruction::Invokevirtual(_)))
        .count();
    assert_eq!(equals_calls, 4); // hashCode + three equals checks
}

#[test]
fn single_phase_string_switch_dispatches_once() {
    let shape = str_switch_shape();
    let switch = colliding_str_switch(StrSwitchStrategy::SinglePhase);
    let mut cp = ConstantPool::default();
    let body = compile_body(&shape, &[Insn::StrSwitch(switch)], &mut cp).expect("lowering");

    let (tables, lookups) = count_switches(&body.code);
    assert_eq!(tables + lookups, 1);
}

#[test]
fn duplicate_literals_are_rejected() {
    let shape = str_switch_shape();
    let switch = StrSwitch::new(vec![Insn::Load(shape.param_local(0))])
        .branch(vec!["x".to_string()], vec![Insn::Ret])
        .branch(vec!["x".to_string()], vec![Insn::Ret]);
    let mut cp = ConstantPool::default();
    assert!(matches!(
        compile_body(&shape, &[Insn::StrSwitch(switch)], &mut cp),
        Err(Error::DuplicateSwitchKey { .. })
    ));
}
