//! The declared shape of a class under construction.
//!
//! Building is two-phase: every field and method is declared first, then
//! body producers run against the finalized `ClassDef`, so a body can refer
//! to members declared after its own method. Producers run in declaration
//! order.

use crate::error::{Error, Result};
use crate::insn::Insn;
use crate::method::MethodShape;
use crate::types::{Signature, Type};

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub signature: Signature,
    pub is_static: bool,
    /// Marks synthesized forwarding methods for the emission layer.
    pub is_bridge: bool,
}

impl MethodDef {
    pub fn shape(&self, owner: &str) -> MethodShape {
        MethodShape::new(owner, &self.name, self.signature.clone(), self.is_static)
    }
}

/// A finalized class declaration: name, supertypes, members.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub super_class: String,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn self_type(&self) -> Type {
        Type::class(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_static)
    }

    /// The unique instance method a bridge should forward to. Zero matches
    /// and overload sets are both errors; the caller names the target
    /// unambiguously or not at all.
    pub fn find_override_target(&self, method: &str) -> Result<&MethodDef> {
        let mut candidates = self
            .methods
            .iter()
            .filter(|m| !m.is_static && !m.is_bridge && m.name == method);
        let first = candidates.next().ok_or_else(|| Error::NoSuchOverrideTarget {
            owner: self.name.clone(),
            method: method.to_string(),
        })?;
        let rest = candidates.count();
        if rest > 0 {
            return Err(Error::AmbiguousOverrideTarget {
                owner: self.name.clone(),
                method: method.to_string(),
                candidates: rest + 1,
            });
        }
        Ok(first)
    }
}

type BodyProducer = Box<dyn FnOnce(&ClassDef) -> Result<Vec<Insn>>>;
type SynthProducer = Box<dyn FnOnce(&ClassDef) -> Result<(MethodDef, Vec<Insn>)>>;

/// A finalized declaration paired with every method body, ready for
/// emission.
pub struct BuiltClass {
    pub def: ClassDef,
    /// Method index into `def.methods` and that method's instruction list.
    pub bodies: Vec<(usize, Vec<Insn>)>,
}

/// Declare-then-lower builder for one class.
pub struct ClassBuilder {
    def: ClassDef,
    producers: Vec<(usize, BodyProducer)>,
    synthetics: Vec<SynthProducer>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            def: ClassDef {
                name: name.into(),
                super_class: "java/lang/Object".to_string(),
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
            producers: Vec::new(),
            synthetics: Vec::new(),
        }
    }

    pub fn extends(mut self, super_class: impl Into<String>) -> ClassBuilder {
        self.def.super_class = super_class.into();
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> ClassBuilder {
        self.def.interfaces.push(interface.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> ClassBuilder {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: false,
            is_final: false,
        });
        self
    }

    pub fn static_field(mut self, name: impl Into<String>, ty: Type) -> ClassBuilder {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: true,
            is_final: false,
        });
        self
    }

    /// Declares an instance method; `body` runs against the finalized
    /// declaration during `build`.
    pub fn method(
        self,
        name: impl Into<String>,
        signature: Signature,
        body: impl FnOnce(&ClassDef) -> Result<Vec<Insn>> + 'static,
    ) -> ClassBuilder {
        self.declare(name, signature, false, body)
    }

    pub fn static_method(
        self,
        name: impl Into<String>,
        signature: Signature,
        body: impl FnOnce(&ClassDef) -> Result<Vec<Insn>> + 'static,
    ) -> ClassBuilder {
        self.declare(name, signature, true, body)
    }

    fn declare(
        mut self,
        name: impl Into<String>,
        signature: Signature,
        is_static: bool,
        body: impl FnOnce(&ClassDef) -> Result<Vec<Insn>> + 'static,
    ) -> ClassBuilder {
        let index = self.def.methods.len();
        self.def.methods.push(MethodDef {
            name: name.into(),
            signature,
            is_static,
            is_bridge: false,
        });
        self.producers.push((index, Box::new(body)));
        self
    }

    /// Registers a producer for a synthesized member (structural methods,
    /// bridges). Synthetics run after every declared body, against the
    /// finalized declaration, and append their methods to it.
    pub fn synthetic(
        mut self,
        producer: impl FnOnce(&ClassDef) -> Result<(MethodDef, Vec<Insn>)> + 'static,
    ) -> ClassBuilder {
        self.synthetics.push(Box::new(producer));
        self
    }

    /// Runs every body producer in declaration order and pairs each
    /// instruction list with its method.
    pub fn build(self) -> Result<BuiltClass> {
        let ClassBuilder {
            mut def,
            producers,
            synthetics,
        } = self;
        let mut bodies = Vec::with_capacity(producers.len() + synthetics.len());
        for (index, producer) in producers {
            bodies.push((index, producer(&def)?));
        }
        for producer in synthetics {
            let (method, body) = producer(&def)?;
            let index = def.methods.len();
            def.methods.push(method);
            bodies.push((index, body));
        }
        Ok(BuiltClass { def, bodies })
    }
}
