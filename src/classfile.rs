//! Assembly of a built class into a serialized classfile.

use ristretto_classfile::attributes::Attribute;
use ristretto_classfile::{
    self as jvm, ClassAccessFlags, ClassFile, ConstantPool, FieldAccessFlags, MethodAccessFlags,
    Version,
};

use crate::error::Result;
use crate::method::compile_body;
use crate::model::BuiltClass;

/// Assembles and serializes one class.
pub fn emit_class(built: &BuiltClass) -> Result<Vec<u8>> {
    let class_file = assemble(built)?;
    let mut bytes = Vec::new();
    class_file.to_bytes(&mut bytes)?;
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        "classfile",
        format!("emitted {} ({} bytes)", built.def.name, bytes.len())
    );
    Ok(bytes)
}

pub fn assemble(built: &BuiltClass) -> Result<ClassFile> {
    let def = &built.def;
    let mut cp = ConstantPool::default();
    let this_class_index = cp.add_class(&def.name)?;
    let super_class_index = cp.add_class(&def.super_class)?;
    let code_attribute_name_index = cp.add_utf8("Code")?;

    let mut interfaces = Vec::with_capacity(def.interfaces.len());
    for interface in &def.interfaces {
        interfaces.push(cp.add_class(interface)?);
    }

    let mut fields: Vec<jvm::Field> = Vec::new();
    for field in &def.fields {
        let name_index = cp.add_utf8(&field.name)?;
        let descriptor_index = cp.add_utf8(&field.ty.descriptor())?;
        let mut access_flags = FieldAccessFlags::PUBLIC;
        if field.is_static {
            access_flags |= FieldAccessFlags::STATIC;
        }
        if field.is_final {
            access_flags |= FieldAccessFlags::FINAL;
        }
        fields.push(jvm::Field {
            access_flags,
            name_index,
            descriptor_index,
            field_type: field.ty.field_type()?,
            attributes: Vec::new(),
        });
    }

    let mut methods: Vec<jvm::Method> = Vec::new();
    let mut has_constructor = false;
    for (index, insns) in &built.bodies {
        let declared = &def.methods[*index];
        if declared.name == "<init>" {
            has_constructor = true;
        }
        let name_index = cp.add_utf8(&declared.name)?;
        let descriptor_index = cp.add_utf8(&declared.signature.to_string())?;

        let shape = declared.shape(&def.name);
        let compiled = compile_body(&shape, insns, &mut cp)?;

        let code_attribute = Attribute::Code {
            name_index: code_attribute_name_index,
            max_stack: compiled.max_stack,
            max_locals: compiled.max_locals,
            code: compiled.code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        let mut access_flags = MethodAccessFlags::PUBLIC;
        if declared.is_static {
            access_flags |= MethodAccessFlags::STATIC;
        }
        if declared.is_bridge {
            access_flags |= MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC;
        }
        methods.push(jvm::Method {
            access_flags,
            name_index,
            descriptor_index,
            attributes: vec![code_attribute],
        });
    }
    if !has_constructor {
        methods.push(default_constructor(
            &mut cp,
            code_attribute_name_index,
            super_class_index,
        )?);
    }

    let mut class_file = ClassFile {
        version: Version::Java8 { minor: 0 },
        constant_pool: cp,
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class: this_class_index,
        super_class: super_class_index,
        interfaces,
        fields,
        methods,
        attributes: Vec::new(),
    };

    let simple_name = def.name.rsplit('/').next().unwrap_or(&def.name);
    let source_file_name = format!("{simple_name}.java");
    let source_file_utf8_index = class_file.constant_pool.add_utf8(&source_file_name)?;
    let source_file_attr_name_index = class_file.constant_pool.add_utf8("SourceFile")?;
    class_file.attributes.push(Attribute::SourceFile {
        name_index: source_file_attr_name_index,
        source_file_index: source_file_utf8_index,
    });

    Ok(class_file)
}

/// `<init>()V` delegating straight to the superclass constructor.
fn default_constructor(
    cp: &mut ConstantPool,
    code_attribute_name_index: u16,
    super_class_index: u16,
) -> Result<jvm::Method> {
    use ristretto_classfile::attributes::Instruction;

    let init_name_index = cp.add_utf8("<init>")?;
    let init_desc_index = cp.add_utf8("()V")?;
    let super_init_ref_index = cp.add_method_ref(super_class_index, "<init>", "()V")?;

    let code_attribute = Attribute::Code {
        name_index: code_attribute_name_index,
        max_stack: 1,
        max_locals: 1,
        code: vec![
            Instruction::Aload_0,
            Instruction::Invokespecial(super_init_ref_index),
            Instruction::Return,
        ],
        exception_table: Vec::new(),
        attributes: Vec::new(),
    };

    Ok(jvm::Method {
        access_flags: MethodAccessFlags::PUBLIC,
        name_index: init_name_index,
        descriptor_index: init_desc_index,
        attributes: vec![code_attribute],
    })
}
