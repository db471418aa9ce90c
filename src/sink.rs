//! Append-only wrapper over the raw instruction stream and constant pool.
//!
//! Branch operands are instruction indices; jumps and switch slots that
//! target unbound labels are emitted as placeholders and patched in the
//! final `finish` pass.

use crate::error::{Error, Result};
use crate::pos::Label;
use crate::types::{Primitive, Type};
use indexmap::IndexMap;
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::{ArrayType, Instruction};

/// Which concrete jump encoding a conditional uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Goto,
    Ifeq,
    Ifne,
    Iflt,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpEq,
    IfIcmpNe,
    IfIcmpLt,
    IfIcmpGe,
    IfIcmpGt,
    IfIcmpLe,
    IfAcmpEq,
    IfAcmpNe,
    IfNull,
    IfNonNull,
}

impl JumpKind {
    fn instruction(self, offset: u16) -> Instruction {
        match self {
            JumpKind::Goto => Instruction::Goto(offset),
            JumpKind::Ifeq => Instruction::Ifeq(offset),
            JumpKind::Ifne => Instruction::Ifne(offset),
            JumpKind::Iflt => Instruction::Iflt(offset),
            JumpKind::Ifge => Instruction::Ifge(offset),
            JumpKind::Ifgt => Instruction::Ifgt(offset),
            JumpKind::Ifle => Instruction::Ifle(offset),
            JumpKind::IfIcmpEq => Instruction::If_icmpeq(offset),
            JumpKind::IfIcmpNe => Instruction::If_icmpne(offset),
            JumpKind::IfIcmpLt => Instruction::If_icmplt(offset),
            JumpKind::IfIcmpGe => Instruction::If_icmpge(offset),
            JumpKind::IfIcmpGt => Instruction::If_icmpgt(offset),
            JumpKind::IfIcmpLe => Instruction::If_icmple(offset),
            JumpKind::IfAcmpEq => Instruction::If_acmpeq(offset),
            JumpKind::IfAcmpNe => Instruction::If_acmpne(offset),
            JumpKind::IfNull => Instruction::Ifnull(offset),
            JumpKind::IfNonNull => Instruction::Ifnonnull(offset),
        }
    }
}

struct SwitchFixup {
    index: usize,
    default: Label,
    /// `None` slots in a dense table fall to the default branch.
    dense: Option<(i32, Vec<Option<Label>>)>,
    sparse: Option<Vec<(i32, Label)>>,
}

pub struct CodeSink<'cp> {
    cp: &'cp mut ConstantPool,
    code: Vec<Instruction>,
    jump_fixups: Vec<(usize, JumpKind, Label)>,
    switch_fixups: Vec<SwitchFixup>,
}

impl<'cp> CodeSink<'cp> {
    pub fn new(cp: &'cp mut ConstantPool) -> CodeSink<'cp> {
        CodeSink {
            cp,
            code: Vec::new(),
            jump_fixups: Vec::new(),
            switch_fixups: Vec::new(),
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        self.cp
    }

    /// Index the next pushed instruction will occupy.
    pub fn next_index(&self) -> u16 {
        self.code.len() as u16
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    /// Binds `label` to the current position.
    pub fn bind(&mut self, label: &Label) -> Result<()> {
        label.bind(self.next_index())
    }

    pub fn jump(&mut self, label: &Label) {
        self.jump_kind(JumpKind::Goto, label);
    }

    pub fn jump_kind(&mut self, kind: JumpKind, label: &Label) {
        let index = self.code.len();
        self.code.push(kind.instruction(0));
        self.jump_fixups.push((index, kind, label.clone()));
    }

    // --- constant pushes ---

    pub fn push_int(&mut self, value: i32) -> Result<()> {
        let instruction = match value {
            -1 => Instruction::Iconst_m1,
            0 => Instruction::Iconst_0,
            1 => Instruction::Iconst_1,
            2 => Instruction::Iconst_2,
            3 => Instruction::Iconst_3,
            4 => Instruction::Iconst_4,
            5 => Instruction::Iconst_5,
            v @ -128..=-2 | v @ 6..=127 => Instruction::Bipush(v as i8),
            v @ -32768..=-129 | v @ 128..=32767 => Instruction::Sipush(v as i16),
            v => {
                let index = self.cp.add_integer(v)?;
                ldc(index)
            }
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn push_long(&mut self, value: i64) -> Result<()> {
        let instruction = match value {
            0 => Instruction::Lconst_0,
            1 => Instruction::Lconst_1,
            v => Instruction::Ldc2_w(self.cp.add_long(v)?),
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn push_float(&mut self, value: f32) -> Result<()> {
        let instruction = if value.to_bits() == 0.0f32.to_bits() {
            Instruction::Fconst_0
        } else if value == 1.0 {
            Instruction::Fconst_1
        } else if value == 2.0 {
            Instruction::Fconst_2
        } else {
            let index = self.cp.add_float(value)?;
            Instruction::Ldc_w(index)
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn push_double(&mut self, value: f64) -> Result<()> {
        let instruction = if value.to_bits() == 0.0f64.to_bits() {
            Instruction::Dconst_0
        } else if value == 1.0 {
            Instruction::Dconst_1
        } else {
            Instruction::Ldc2_w(self.cp.add_double(value)?)
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn push_string(&mut self, value: &str) -> Result<()> {
        let index = self.cp.add_string(value)?;
        self.code.push(ldc(index));
        Ok(())
    }

    pub fn push_class(&mut self, internal_name: &str) -> Result<()> {
        let index = self.cp.add_class(internal_name)?;
        self.code.push(ldc(index));
        Ok(())
    }

    pub fn push_null(&mut self) {
        self.code.push(Instruction::Aconst_null);
    }

    // --- locals ---

    pub fn load_local(&mut self, ty: &Type, offset: u16) -> Result<()> {
        let instruction = match value_kind(ty, "local load")? {
            ValueKind::Int => match offset {
                0 => Instruction::Iload_0,
                1 => Instruction::Iload_1,
                2 => Instruction::Iload_2,
                3 => Instruction::Iload_3,
                _ if offset <= u8::MAX as u16 => Instruction::Iload(offset as u8),
                _ => Instruction::Iload_w(offset),
            },
            ValueKind::Long => match offset {
                0 => Instruction::Lload_0,
                1 => Instruction::Lload_1,
                2 => Instruction::Lload_2,
                3 => Instruction::Lload_3,
                _ if offset <= u8::MAX as u16 => Instruction::Lload(offset as u8),
                _ => Instruction::Lload_w(offset),
            },
            ValueKind::Float => match offset {
                0 => Instruction::Fload_0,
                1 => Instruction::Fload_1,
                2 => Instruction::Fload_2,
                3 => Instruction::Fload_3,
                _ if offset <= u8::MAX as u16 => Instruction::Fload(offset as u8),
                _ => Instruction::Fload_w(offset),
            },
            ValueKind::Double => match offset {
                0 => Instruction::Dload_0,
                1 => Instruction::Dload_1,
                2 => Instruction::Dload_2,
                3 => Instruction::Dload_3,
                _ if offset <= u8::MAX as u16 => Instruction::Dload(offset as u8),
                _ => Instruction::Dload_w(offset),
            },
            ValueKind::Reference => match offset {
                0 => Instruction::Aload_0,
                1 => Instruction::Aload_1,
                2 => Instruction::Aload_2,
                3 => Instruction::Aload_3,
                _ if offset <= u8::MAX as u16 => Instruction::Aload(offset as u8),
                _ => Instruction::Aload_w(offset),
            },
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn store_local(&mut self, ty: &Type, offset: u16) -> Result<()> {
        let instruction = match value_kind(ty, "local store")? {
            ValueKind::Int => match offset {
                0 => Instruction::Istore_0,
                1 => Instruction::Istore_1,
                2 => Instruction::Istore_2,
                3 => Instruction::Istore_3,
                _ if offset <= u8::MAX as u16 => Instruction::Istore(offset as u8),
                _ => Instruction::Istore_w(offset),
            },
            ValueKind::Long => match offset {
                0 => Instruction::Lstore_0,
                1 => Instruction::Lstore_1,
                2 => Instruction::Lstore_2,
                3 => Instruction::Lstore_3,
                _ if offset <= u8::MAX as u16 => Instruction::Lstore(offset as u8),
                _ => Instruction::Lstore_w(offset),
            },
            ValueKind::Float => match offset {
                0 => Instruction::Fstore_0,
                1 => Instruction::Fstore_1,
                2 => Instruction::Fstore_2,
                3 => Instruction::Fstore_3,
                _ if offset <= u8::MAX as u16 => Instruction::Fstore(offset as u8),
                _ => Instruction::Fstore_w(offset),
            },
            ValueKind::Double => match offset {
                0 => Instruction::Dstore_0,
                1 => Instruction::Dstore_1,
                2 => Instruction::Dstore_2,
                3 => Instruction::Dstore_3,
                _ if offset <= u8::MAX as u16 => Instruction::Dstore(offset as u8),
                _ => Instruction::Dstore_w(offset),
            },
            ValueKind::Reference => match offset {
                0 => Instruction::Astore_0,
                1 => Instruction::Astore_1,
                2 => Instruction::Astore_2,
                3 => Instruction::Astore_3,
                _ if offset <= u8::MAX as u16 => Instruction::Astore(offset as u8),
                _ => Instruction::Astore_w(offset),
            },
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn iinc(&mut self, offset: u16, delta: i16) {
        if offset <= u8::MAX as u16 && i8::try_from(delta).is_ok() {
            self.code.push(Instruction::Iinc(offset as u8, delta as i8));
        } else {
            self.code.push(Instruction::Iinc_w(offset, delta));
        }
    }

    // --- arrays ---

    /// Allocates a one-dimensional array of `component` (which may itself be
    /// an array shape).
    pub fn new_array(&mut self, component: &Type) -> Result<()> {
        if let Some(code) = component.primitive().and_then(Primitive::newarray_code) {
            let array_type = ArrayType::from_bytes(&mut std::io::Cursor::new(vec![code]))?;
            self.code.push(Instruction::Newarray(array_type));
        } else {
            let name = component.internal_or_descriptor().ok_or_else(|| {
                Error::UnrepresentableType {
                    ty: component.clone(),
                    context: "array component".to_string(),
                }
            })?;
            let index = self.cp.add_class(&name)?;
            self.code.push(Instruction::Anewarray(index));
        }
        Ok(())
    }

    pub fn array_load(&mut self, component: &Type) -> Result<()> {
        let instruction = match component.primitive() {
            Some(Primitive::I8) | Some(Primitive::Boolean) => Instruction::Baload,
            Some(Primitive::Char) => Instruction::Caload,
            Some(Primitive::I16) => Instruction::Saload,
            Some(Primitive::I32) => Instruction::Iaload,
            Some(Primitive::I64) => Instruction::Laload,
            Some(Primitive::F32) => Instruction::Faload,
            Some(Primitive::F64) => Instruction::Daload,
            Some(Primitive::Void) => {
                return Err(Error::UnrepresentableType {
                    ty: component.clone(),
                    context: "array load".to_string(),
                });
            }
            None => Instruction::Aaload,
        };
        self.code.push(instruction);
        Ok(())
    }

    pub fn array_store(&mut self, component: &Type) -> Result<()> {
        let instruction = match component.primitive() {
            Some(Primitive::I8) | Some(Primitive::Boolean) => Instruction::Bastore,
            Some(Primitive::Char) => Instruction::Castore,
            Some(Primitive::I16) => Instruction::Sastore,
            Some(Primitive::I32) => Instruction::Iastore,
            Some(Primitive::I64) => Instruction::Lastore,
            Some(Primitive::F32) => Instruction::Fastore,
            Some(Primitive::F64) => Instruction::Dastore,
            Some(Primitive::Void) => {
                return Err(Error::UnrepresentableType {
                    ty: component.clone(),
                    context: "array store".to_string(),
                });
            }
            None => Instruction::Aastore,
        };
        self.code.push(instruction);
        Ok(())
    }

    // --- references ---

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.cp.add_class(owner)?;
        Ok(self.cp.add_field_ref(class_index, name, descriptor)?)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.cp.add_class(owner)?;
        Ok(self.cp.add_method_ref(class_index, name, descriptor)?)
    }

    pub fn interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.cp.add_class(owner)?;
        Ok(self.cp.add_interface_method_ref(class_index, name, descriptor)?)
    }

    pub fn class_ref(&mut self, internal_name: &str) -> Result<u16> {
        Ok(self.cp.add_class(internal_name)?)
    }

    // --- switch tables ---

    /// Emits a dense jump table. `targets[i]` handles `low + i`; `None`
    /// slots fall to the default branch.
    pub fn table_switch(&mut self, default: &Label, low: i32, targets: Vec<Option<Label>>) {
        let index = self.code.len();
        let high = low + targets.len() as i32 - 1;
        self.code.push(Instruction::Tableswitch {
            default: 0,
            low,
            high,
            offsets: vec![0; targets.len()],
        });
        self.switch_fixups.push(SwitchFixup {
            index,
            default: default.clone(),
            dense: Some((low, targets)),
            sparse: None,
        });
    }

    /// Emits a sparse match/offset pair list. Pairs must be sorted by key.
    pub fn lookup_switch(&mut self, default: &Label, pairs: Vec<(i32, Label)>) {
        let index = self.code.len();
        self.code.push(Instruction::Lookupswitch {
            default: 0,
            pairs: pairs.iter().map(|(k, _)| (*k, 0)).collect(),
        });
        self.switch_fixups.push(SwitchFixup {
            index,
            default: default.clone(),
            dense: None,
            sparse: Some(pairs),
        });
    }

    /// Patches every placeholder and returns the final stream.
    pub fn finish(self) -> Result<Vec<Instruction>> {
        let CodeSink {
            mut code,
            jump_fixups,
            switch_fixups,
            ..
        } = self;

        for (index, kind, label) in jump_fixups {
            let target = label
                .offset()
                .ok_or(Error::LabelUnbound { referenced_at: index })?;
            code[index] = kind.instruction(target);
        }

        for fixup in switch_fixups {
            let default = fixup
                .default
                .offset()
                .ok_or(Error::LabelUnbound { referenced_at: fixup.index })?;
            let resolve = |label: &Label| -> Result<i32> {
                label
                    .offset()
                    .map(i32::from)
                    .ok_or(Error::LabelUnbound { referenced_at: fixup.index })
            };
            if let Some((low, targets)) = fixup.dense {
                let mut offsets = Vec::with_capacity(targets.len());
                for slot in &targets {
                    offsets.push(match slot {
                        Some(label) => resolve(label)?,
                        None => i32::from(default),
                    });
                }
                let high = low + targets.len() as i32 - 1;
                code[fixup.index] = Instruction::Tableswitch {
                    default: i32::from(default),
                    low,
                    high,
                    offsets,
                };
            } else if let Some(pairs) = fixup.sparse {
                let mut resolved: IndexMap<i32, i32> = IndexMap::with_capacity(pairs.len());
                for (key, label) in &pairs {
                    resolved.insert(*key, resolve(label)?);
                }
                code[fixup.index] = Instruction::Lookupswitch {
                    default: i32::from(default),
                    pairs: resolved,
                };
            }
        }

        Ok(code)
    }
}

fn ldc(index: u16) -> Instruction {
    if let Ok(narrow) = u8::try_from(index) {
        Instruction::Ldc(narrow)
    } else {
        Instruction::Ldc_w(index)
    }
}

enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

fn value_kind(ty: &Type, context: &str) -> Result<ValueKind> {
    Ok(match ty.primitive() {
        Some(Primitive::Void) => {
            return Err(Error::UnrepresentableType {
                ty: ty.clone(),
                context: context.to_string(),
            });
        }
        Some(Primitive::I64) => ValueKind::Long,
        Some(Primitive::F32) => ValueKind::Float,
        Some(Primitive::F64) => ValueKind::Double,
        Some(_) => ValueKind::Int,
        None => ValueKind::Reference,
    })
}
