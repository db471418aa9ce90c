//! The type-name model the lowering layer makes its decisions against.
//!
//! Shapes are immutable once constructed. Zero-dimension class shapes are
//! interned in a process-wide cache keyed by qualified name, so repeated
//! lookups of the same class share one allocation; arrays, parameterized
//! types and wildcards are compositions and are built fresh per call.

use crate::error::{Error, Result};
use ristretto_classfile::{BaseType, FieldType};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const STRING_CLASS: &str = "java/lang/String";

/// The primitive kinds of the target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Boolean,
    Char,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Primitive {
    pub fn descriptor_char(self) -> char {
        match self {
            Primitive::Void => 'V',
            Primitive::Boolean => 'Z',
            Primitive::Char => 'C',
            Primitive::I8 => 'B',
            Primitive::I16 => 'S',
            Primitive::I32 => 'I',
            Primitive::I64 => 'J',
            Primitive::F32 => 'F',
            Primitive::F64 => 'D',
        }
    }

    pub fn from_descriptor_char(c: char) -> Option<Primitive> {
        Some(match c {
            'V' => Primitive::Void,
            'Z' => Primitive::Boolean,
            'C' => Primitive::Char,
            'B' => Primitive::I8,
            'S' => Primitive::I16,
            'I' => Primitive::I32,
            'J' => Primitive::I64,
            'F' => Primitive::F32,
            'D' => Primitive::F64,
            _ => return None,
        })
    }

    /// 8-byte kinds occupy two consecutive local slots and two stack slots.
    pub fn is_wide(self) -> bool {
        matches!(self, Primitive::I64 | Primitive::F64)
    }

    /// Kinds that live on the operand stack as an `int`.
    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            Primitive::Boolean | Primitive::Char | Primitive::I8 | Primitive::I16 | Primitive::I32
        )
    }

    /// Wrapper class internal name, for every kind Java boxes.
    pub fn wrapper_class(self) -> Option<&'static str> {
        Some(match self {
            Primitive::Boolean => "java/lang/Boolean",
            Primitive::Char => "java/lang/Character",
            Primitive::I8 => "java/lang/Byte",
            Primitive::I16 => "java/lang/Short",
            Primitive::I32 => "java/lang/Integer",
            Primitive::I64 => "java/lang/Long",
            Primitive::F32 => "java/lang/Float",
            Primitive::F64 => "java/lang/Double",
            Primitive::Void => return None,
        })
    }

    /// `valueOf` descriptor on the wrapper class.
    pub fn value_of_descriptor(self) -> Option<String> {
        let wrapper = self.wrapper_class()?;
        Some(format!("({})L{};", self.descriptor_char(), wrapper))
    }

    /// Instance accessor on the wrapper that yields the primitive back.
    pub fn value_method(self) -> Option<(&'static str, String)> {
        let name = match self {
            Primitive::Boolean => "booleanValue",
            Primitive::Char => "charValue",
            Primitive::I8 => "byteValue",
            Primitive::I16 => "shortValue",
            Primitive::I32 => "intValue",
            Primitive::I64 => "longValue",
            Primitive::F32 => "floatValue",
            Primitive::F64 => "doubleValue",
            Primitive::Void => return None,
        };
        Some((name, format!("(){}", self.descriptor_char())))
    }

    /// The 'atype' operand of the `newarray` instruction.
    /// See JVMS §6.5 (newarray).
    pub fn newarray_code(self) -> Option<u8> {
        match self {
            Primitive::Boolean => Some(4),
            Primitive::Char => Some(5),
            Primitive::F32 => Some(6),
            Primitive::F64 => Some(7),
            Primitive::I8 => Some(8),
            Primitive::I16 => Some(9),
            Primitive::I32 => Some(10),
            Primitive::I64 => Some(11),
            Primitive::Void => None,
        }
    }

    fn base_type(self) -> Option<BaseType> {
        Some(match self {
            Primitive::Boolean => BaseType::Boolean,
            Primitive::Char => BaseType::Char,
            Primitive::I8 => BaseType::Byte,
            Primitive::I16 => BaseType::Short,
            Primitive::I32 => BaseType::Int,
            Primitive::I64 => BaseType::Long,
            Primitive::F32 => BaseType::Float,
            Primitive::F64 => BaseType::Double,
            Primitive::Void => return None,
        })
    }
}

/// The non-array core of an exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Base {
    Primitive(Primitive),
    /// Split qualified-name segments (`["java", "lang", "String"]`).
    Class(Vec<String>),
}

/// A named (or primitive-component) shape with an explicit dimension count.
/// Equality is structural on the segments and dimension count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactType {
    pub base: Base,
    pub dims: usize,
}

impl ExactType {
    /// Internal qualified name, `None` for primitive bases.
    pub fn qualified_name(&self) -> Option<String> {
        match &self.base {
            Base::Class(segments) => Some(segments.join("/")),
            Base::Primitive(_) => None,
        }
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::with_capacity(self.dims + 2);
        for _ in 0..self.dims {
            out.push('[');
        }
        match &self.base {
            Base::Primitive(p) => out.push(p.descriptor_char()),
            Base::Class(segments) => {
                out.push('L');
                out.push_str(&segments.join("/"));
                out.push(';');
            }
        }
        out
    }
}

fn exact_cache() -> &'static RwLock<HashMap<String, Arc<ExactType>>> {
    static CACHE: OnceLock<RwLock<HashMap<String, Arc<ExactType>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn intern_class(name: &str) -> Arc<ExactType> {
    let key = name.replace('.', "/");
    {
        let cache = match exact_cache().read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(shape) = cache.get(&key) {
            return Arc::clone(shape);
        }
    }
    let shape = Arc::new(ExactType {
        base: Base::Class(key.split('/').map(str::to_string).collect()),
        dims: 0,
    });
    let mut cache = match exact_cache().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    Arc::clone(cache.entry(key).or_insert(shape))
}

/// A type shape: primitive, exact (named, possibly array), parameterized,
/// wildcard, or type variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Exact(Arc<ExactType>),
    Parameterized {
        raw: Arc<ExactType>,
        args: Vec<Type>,
    },
    Wildcard {
        upper: Option<Box<Type>>,
        lower: Option<Box<Type>>,
    },
    Variable {
        label: String,
        bound: Box<Type>,
    },
}

pub const VOID: Type = Type::Primitive(Primitive::Void);
pub const BOOLEAN: Type = Type::Primitive(Primitive::Boolean);
pub const CHAR: Type = Type::Primitive(Primitive::Char);
pub const I8: Type = Type::Primitive(Primitive::I8);
pub const I16: Type = Type::Primitive(Primitive::I16);
pub const I32: Type = Type::Primitive(Primitive::I32);
pub const I64: Type = Type::Primitive(Primitive::I64);
pub const F32: Type = Type::Primitive(Primitive::F32);
pub const F64: Type = Type::Primitive(Primitive::F64);

impl Type {
    /// An interned zero-dimension class shape. Accepts dotted or internal
    /// (slash-separated) names.
    pub fn class(name: &str) -> Type {
        Type::Exact(intern_class(name))
    }

    pub fn object() -> Type {
        Type::class(OBJECT_CLASS)
    }

    pub fn string() -> Type {
        Type::class(STRING_CLASS)
    }

    pub fn parameterized(raw: &str, args: Vec<Type>) -> Type {
        Type::Parameterized {
            raw: intern_class(raw),
            args,
        }
    }

    pub fn wildcard() -> Type {
        Type::Wildcard {
            upper: None,
            lower: None,
        }
    }

    pub fn wildcard_extends(upper: Type) -> Type {
        Type::Wildcard {
            upper: Some(Box::new(upper)),
            lower: None,
        }
    }

    pub fn wildcard_super(lower: Type) -> Type {
        Type::Wildcard {
            upper: None,
            lower: Some(Box::new(lower)),
        }
    }

    pub fn variable(label: &str, bound: Type) -> Type {
        Type::Variable {
            label: label.to_string(),
            bound: Box::new(bound),
        }
    }

    /// Adds `extra` array dimensions to this shape. Parameterized, wildcard
    /// and variable shapes are erased first; arrays carry exact components.
    pub fn array_of(&self, extra: usize) -> Type {
        if extra == 0 {
            return self.clone();
        }
        match self {
            Type::Primitive(p) => Type::Exact(Arc::new(ExactType {
                base: Base::Primitive(*p),
                dims: extra,
            })),
            Type::Exact(exact) => Type::Exact(Arc::new(ExactType {
                base: exact.base.clone(),
                dims: exact.dims + extra,
            })),
            other => other.erasure().array_of(extra),
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            Type::Exact(exact) => exact.dims,
            _ => 0,
        }
    }

    pub fn is_array(&self) -> bool {
        self.dims() > 0
    }

    /// Strips one array dimension, yielding the component shape.
    pub fn component(&self) -> Option<Type> {
        match self {
            Type::Exact(exact) if exact.dims > 0 => Some(match (&exact.base, exact.dims) {
                (Base::Primitive(p), 1) => Type::Primitive(*p),
                (base, dims) => Type::Exact(Arc::new(ExactType {
                    base: base.clone(),
                    dims: dims - 1,
                })),
            }),
            _ => None,
        }
    }

    /// The erased shape used for checkcast, field descriptors and widths.
    pub fn erasure(&self) -> Type {
        match self {
            Type::Primitive(_) | Type::Exact(_) => self.clone(),
            Type::Parameterized { raw, .. } => Type::Exact(Arc::clone(raw)),
            Type::Wildcard { upper, .. } => match upper {
                Some(bound) => bound.erasure(),
                None => Type::object(),
            },
            Type::Variable { bound, .. } => bound.erasure(),
        }
    }

    pub fn is_primitive_like(&self) -> bool {
        matches!(self, Type::Primitive(p) if *p != Primitive::Void)
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Type::Primitive(_))
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Operand-stack / local-table width in slots.
    pub fn slot_width(&self) -> u16 {
        match self {
            Type::Primitive(Primitive::Void) => 0,
            Type::Primitive(p) if p.is_wide() => 2,
            _ => 1,
        }
    }

    /// Compact binary descriptor text.
    pub fn descriptor(&self) -> String {
        match self {
            Type::Primitive(p) => p.descriptor_char().to_string(),
            Type::Exact(exact) => exact.descriptor(),
            _ => self.erasure().descriptor(),
        }
    }

    /// Generics-aware signature text; in an argument position wildcards use
    /// the `+`/`-`/`*` forms and variables the `T..;` form.
    fn signature_text(&self, argument_position: bool) -> String {
        match self {
            Type::Primitive(_) | Type::Exact(_) => self.descriptor(),
            Type::Parameterized { raw, args } => {
                let mut out = String::new();
                for _ in 0..raw.dims {
                    out.push('[');
                }
                out.push('L');
                if let Some(name) = raw.qualified_name() {
                    out.push_str(&name);
                }
                out.push('<');
                for arg in args {
                    out.push_str(&arg.signature_text(true));
                }
                out.push_str(">;");
                out
            }
            Type::Wildcard { upper, lower } => {
                if !argument_position {
                    return self.erasure().descriptor();
                }
                match (upper, lower) {
                    (Some(bound), _) => format!("+{}", bound.signature_text(false)),
                    (None, Some(bound)) => format!("-{}", bound.signature_text(false)),
                    (None, None) => "*".to_string(),
                }
            }
            Type::Variable { label, .. } => format!("T{label};"),
        }
    }

    /// The generic signature string, or `None` when it would not differ from
    /// the plain descriptor.
    pub fn generic_signature(&self) -> Option<String> {
        let text = self.signature_text(false);
        if text == self.descriptor() { None } else { Some(text) }
    }

    /// Internal name for class shapes, descriptor for arrays; the operand
    /// form `checkcast`/`anewarray`/`instanceof` expect.
    pub fn internal_or_descriptor(&self) -> Option<String> {
        let erased = self.erasure();
        match &erased {
            Type::Exact(exact) if exact.dims == 0 => exact.qualified_name(),
            Type::Exact(_) => Some(erased.descriptor()),
            _ => None,
        }
    }

    /// Wrapper class for a boxable primitive shape.
    pub fn wrapper_class(&self) -> Option<&'static str> {
        self.primitive().and_then(Primitive::wrapper_class)
    }

    /// Inverse wrapper lookup: the primitive a wrapper class unboxes to.
    pub fn unboxed_primitive(&self) -> Option<Primitive> {
        let name = self.internal_or_descriptor()?;
        if self.is_array() {
            return None;
        }
        Some(match name.as_str() {
            "java/lang/Boolean" => Primitive::Boolean,
            "java/lang/Character" => Primitive::Char,
            "java/lang/Byte" => Primitive::I8,
            "java/lang/Short" => Primitive::I16,
            "java/lang/Integer" => Primitive::I32,
            "java/lang/Long" => Primitive::I64,
            "java/lang/Float" => Primitive::F32,
            "java/lang/Double" => Primitive::F64,
            _ => return None,
        })
    }

    /// Conversion for class-level field declarations.
    pub fn field_type(&self) -> Result<FieldType> {
        match self.erasure() {
            Type::Primitive(p) => p.base_type().map(FieldType::Base).ok_or_else(|| {
                Error::UnrepresentableType {
                    ty: self.clone(),
                    context: "field type".to_string(),
                }
            }),
            Type::Exact(exact) => {
                let mut ft = match &exact.base {
                    Base::Primitive(p) => {
                        FieldType::Base(p.base_type().ok_or_else(|| Error::UnrepresentableType {
                            ty: self.clone(),
                            context: "field type".to_string(),
                        })?)
                    }
                    Base::Class(segments) => FieldType::Object(segments.join("/")),
                };
                for _ in 0..exact.dims {
                    ft = FieldType::Array(Box::new(ft));
                }
                Ok(ft)
            }
            _ => unreachable!("erasure yields primitive or exact shapes"),
        }
    }

    /// Parses a full descriptor string into a shape.
    pub fn from_descriptor(descriptor: &str) -> Result<Type> {
        let (ty, rest) = parse_type_prefix(descriptor)?;
        if rest.is_empty() {
            Ok(ty)
        } else {
            Err(bad_descriptor(descriptor))
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature_text(false))
    }
}

fn bad_descriptor(text: &str) -> Error {
    Error::UnrepresentableType {
        ty: VOID,
        context: format!("malformed descriptor '{text}'"),
    }
}

/// Parses one type token off the front of `text`, returning the remainder.
fn parse_type_prefix(text: &str) -> Result<(Type, &str)> {
    let mut dims = 0usize;
    let mut rest = text;
    while let Some(tail) = rest.strip_prefix('[') {
        dims += 1;
        rest = tail;
    }
    let mut chars = rest.chars();
    let head = chars.next().ok_or_else(|| bad_descriptor(text))?;
    if let Some(p) = Primitive::from_descriptor_char(head) {
        if p == Primitive::Void && dims > 0 {
            return Err(bad_descriptor(text));
        }
        return Ok((Type::Primitive(p).array_of(dims), &rest[1..]));
    }
    if head == 'L' {
        let end = rest.find(';').ok_or_else(|| bad_descriptor(text))?;
        let name = &rest[1..end];
        return Ok((Type::class(name).array_of(dims), &rest[end + 1..]));
    }
    Err(bad_descriptor(text))
}

/// The shape of one method: ordered parameter types plus return type.
/// `Display` yields the JVM method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Type) -> Signature {
        Signature { params, ret }
    }

    pub fn from_descriptor(descriptor: &str) -> Result<Signature> {
        let inner = descriptor
            .strip_prefix('(')
            .ok_or_else(|| bad_descriptor(descriptor))?;
        let close = inner.find(')').ok_or_else(|| bad_descriptor(descriptor))?;
        let mut params = Vec::new();
        let mut rest = &inner[..close];
        while !rest.is_empty() {
            let (ty, tail) = parse_type_prefix(rest)?;
            params.push(ty);
            rest = tail;
        }
        let ret = Type::from_descriptor(&inner[close + 1..])?;
        Ok(Signature { params, ret })
    }

    /// Total argument width in slots, the operand count `invokeinterface`
    /// declares (receiver excluded).
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(Type::slot_width).sum()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{}", param.descriptor())?;
        }
        write!(f, "){}", self.ret.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_for_basic_shapes() {
        assert_eq!(I32.descriptor(), "I");
        assert_eq!(Type::string().descriptor(), "Ljava/lang/String;");
        assert_eq!(I64.array_of(2).descriptor(), "[[J");
        assert_eq!(
            Type::string().array_of(1).descriptor(),
            "[Ljava/lang/String;"
        );
    }

    #[test]
    fn interning_canonicalizes_class_shapes() {
        let a = Type::class("java.lang.String");
        let b = Type::class("java/lang/String");
        assert_eq!(a, b);
        if let (Type::Exact(x), Type::Exact(y)) = (&a, &b) {
            assert!(Arc::ptr_eq(x, y));
        } else {
            panic!("expected exact shapes");
        }
    }

    #[test]
    fn arrays_are_not_interned_but_compare_structurally() {
        let a = Type::class("java/util/List").array_of(1);
        let b = Type::class("java/util/List").array_of(1);
        assert_eq!(a, b);
    }

    #[test]
    fn slot_widths() {
        assert_eq!(I64.slot_width(), 2);
        assert_eq!(F64.slot_width(), 2);
        assert_eq!(F32.slot_width(), 1);
        assert_eq!(I64.array_of(1).slot_width(), 1);
        assert_eq!(VOID.slot_width(), 0);
    }

    #[test]
    fn parameterized_signature_and_erasure() {
        let ty = Type::parameterized("java/util/List", vec![Type::string()]);
        assert_eq!(ty.descriptor(), "Ljava/util/List;");
        assert_eq!(
            ty.generic_signature().as_deref(),
            Some("Ljava/util/List<Ljava/lang/String;>;")
        );
        assert_eq!(ty.erasure(), Type::class("java/util/List"));
    }

    #[test]
    fn wildcard_forms() {
        let ty = Type::parameterized(
            "java/util/List",
            vec![Type::wildcard_extends(Type::class("java/lang/Number"))],
        );
        assert_eq!(
            ty.generic_signature().as_deref(),
            Some("Ljava/util/List<+Ljava/lang/Number;>;")
        );
        let any = Type::parameterized("java/util/List", vec![Type::wildcard()]);
        assert_eq!(
            any.generic_signature().as_deref(),
            Some("Ljava/util/List<*>;")
        );
    }

    #[test]
    fn variable_bound_erasure() {
        let ty = Type::variable("T", Type::class("java/lang/Number"));
        assert_eq!(ty.descriptor(), "Ljava/lang/Number;");
        assert_eq!(ty.generic_signature().as_deref(), Some("TT;"));
    }

    #[test]
    fn component_round_trip() {
        let arr = I32.array_of(2);
        let inner = arr.component().expect("component");
        assert_eq!(inner, I32.array_of(1));
        assert_eq!(inner.component().expect("component"), I32);
        assert_eq!(I32.component(), None);
    }

    #[test]
    fn wrapper_tables_invert() {
        for p in [
            Primitive::Boolean,
            Primitive::Char,
            Primitive::I8,
            Primitive::I16,
            Primitive::I32,
            Primitive::I64,
            Primitive::F32,
            Primitive::F64,
        ] {
            let wrapper = Type::class(p.wrapper_class().expect("wrapper"));
            assert_eq!(wrapper.unboxed_primitive(), Some(p));
        }
        assert_eq!(Type::string().unboxed_primitive(), None);
    }

    #[test]
    fn signature_descriptor_round_trip() {
        let sig = Signature::new(vec![I32, Type::string(), F64.array_of(1)], I64);
        assert_eq!(sig.to_string(), "(ILjava/lang/String;[D)J");
        let parsed = Signature::from_descriptor("(ILjava/lang/String;[D)J").expect("parse");
        assert_eq!(parsed, sig);
        assert_eq!(sig.param_slots(), 3);
    }
}
