// Builds small but well-formed class files for tests, through noak's writer.

use noak::writer::cpool::{self, Index};
use noak::writer::{ClassWriter, EncoderContext};
use noak::{AccessFlags, MString, Version};

use super::attributes::{self, CodeAttribute};
use super::{descriptor, open, ClassFile};

const RETURN: u8 = 0xB1;
const GETSTATIC: u8 = 0xB2;
const INVOKESTATIC: u8 = 0xB8;
const INVOKEVIRTUAL: u8 = 0xB6;
const INVOKEDYNAMIC: u8 = 0xBA;

const METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

enum Body {
    Return,
    Locals(Vec<(String, String, u16)>),
    Reference {
        owner: String,
        target: String,
        target_desc: String,
        virtual_call: bool,
    },
    Lambda {
        sam_owner: String,
        sam_name: String,
        sam_desc: String,
        impl_owner: String,
        impl_name: String,
    },
}

struct MethodSpec {
    access: AccessFlags,
    name: String,
    descriptor: String,
    body: Body,
}

enum Extra {
    String(String),
    Long(i64),
    /// A field-kind handle that points at a method.
    MismatchedHandle { owner: String, name: String, descriptor: String },
}

enum ClassAttribute {
    Signature(String),
    SourceFile(String),
    InvisibleMarker(String),
    Annotated {
        annotation: String,
        enum_type: String,
        enum_constant: String,
        class_literal: String,
    },
}

pub struct ClassBuilder {
    name: String,
    access: AccessFlags,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(AccessFlags, String, String)>,
    methods: Vec<MethodSpec>,
    extras: Vec<Extra>,
    attributes: Vec<ClassAttribute>,
    inner_classes: Vec<(String, Option<String>, Option<String>, AccessFlags)>,
}

fn utf8<W: EncoderContext>(w: &mut W, text: &str) -> Index<cpool::Utf8> {
    w.insert_constant(cpool::Utf8 {
        content: MString::from(text),
    })
    .unwrap()
}

fn class<W: EncoderContext>(w: &mut W, name: &str) -> Index<cpool::Class> {
    let name = utf8(w, name);
    w.insert_constant(cpool::Class { name }).unwrap()
}

fn name_and_type<W: EncoderContext>(w: &mut W, name: &str, descriptor: &str) -> Index<cpool::NameAndType> {
    let name = utf8(w, name);
    let descriptor = utf8(w, descriptor);
    w.insert_constant(cpool::NameAndType { name, descriptor }).unwrap()
}

fn method_ref<W: EncoderContext>(w: &mut W, owner: &str, name: &str, descriptor: &str) -> Index<cpool::MethodRef> {
    let class = class(w, owner);
    let name_and_type = name_and_type(w, name, descriptor);
    w.insert_constant(cpool::MethodRef { class, name_and_type }).unwrap()
}

fn u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn code_body(max_locals: u16, code: &[u8], nested: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = u16s(&[4, max_locals]);
    out.extend_from_slice(&(code.len() as u32).to_be_bytes());
    out.extend_from_slice(code);
    out.extend_from_slice(&u16s(&[0, nested.len() as u16]));
    for (name, info) in nested {
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&(info.len() as u32).to_be_bytes());
        out.extend_from_slice(info);
    }
    out
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            extras: Vec::new(),
            attributes: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = Some(name.to_string());
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn field(mut self, access: AccessFlags, name: &str, desc: &str) -> Self {
        self.fields.push((access, name.to_string(), desc.to_string()));
        self
    }

    fn push_method(mut self, access: AccessFlags, name: &str, desc: &str, body: Body) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: desc.to_string(),
            body,
        });
        self
    }

    /// A method whose body only returns.
    pub fn method(self, access: AccessFlags, name: &str, desc: &str) -> Self {
        self.push_method(access, name, desc, Body::Return)
    }

    /// A method with a LocalVariableTable of `(name, descriptor, slot)` rows.
    pub fn method_with_locals(self, access: AccessFlags, name: &str, desc: &str, locals: &[(&str, &str, u16)]) -> Self {
        let rows = locals
            .iter()
            .map(|(n, d, slot)| (n.to_string(), d.to_string(), *slot))
            .collect();
        self.push_method(access, name, desc, Body::Locals(rows))
    }

    /// A static method whose body invokes `owner.target` (a field read when `target_desc`
    /// is not a method descriptor).
    pub fn method_referencing(
        self,
        name: &str,
        desc: &str,
        owner: &str,
        target: &str,
        target_desc: &str,
        virtual_call: bool,
    ) -> Self {
        let body = Body::Reference {
            owner: owner.to_string(),
            target: target.to_string(),
            target_desc: target_desc.to_string(),
            virtual_call,
        };
        self.push_method(AccessFlags::PUBLIC | AccessFlags::STATIC, name, desc, body)
    }

    /// A static method containing a `LambdaMetafactory` call site implementing
    /// `sam_owner.sam_name` with `impl_owner.impl_name`.
    pub fn lambda(
        self,
        method_name: &str,
        sam_owner: &str,
        sam_name: &str,
        sam_desc: &str,
        impl_owner: &str,
        impl_name: &str,
    ) -> Self {
        let body = Body::Lambda {
            sam_owner: sam_owner.to_string(),
            sam_name: sam_name.to_string(),
            sam_desc: sam_desc.to_string(),
            impl_owner: impl_owner.to_string(),
            impl_name: impl_name.to_string(),
        };
        self.push_method(AccessFlags::PUBLIC | AccessFlags::STATIC, method_name, "()V", body)
    }

    pub fn string(mut self, text: &str) -> Self {
        self.extras.push(Extra::String(text.to_string()));
        self
    }

    pub fn long_constant(mut self, value: i64) -> Self {
        self.extras.push(Extra::Long(value));
        self
    }

    /// A `REF_getStatic` handle whose reference is a Methodref.
    pub fn field_handle_to_method(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.extras.push(Extra::MismatchedHandle {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attributes.push(ClassAttribute::Signature(signature.to_string()));
        self
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.attributes.push(ClassAttribute::SourceFile(name.to_string()));
        self
    }

    pub fn inner_class(mut self, inner: &str, outer: Option<&str>, simple: Option<&str>, access: AccessFlags) -> Self {
        self.inner_classes.push((
            inner.to_string(),
            outer.map(str::to_string),
            simple.map(str::to_string),
            access,
        ));
        self
    }

    pub fn invisible_annotation(mut self, descriptor: &str) -> Self {
        self.attributes.push(ClassAttribute::InvisibleMarker(descriptor.to_string()));
        self
    }

    /// A visible `@annotation(value = enum_type.enum_constant, type = class_literal.class,
    /// nested = @annotation, list = {1})`.
    pub fn annotation_with_values(mut self, annotation: &str, enum_type: &str, enum_constant: &str, class_literal: &str) -> Self {
        self.attributes.push(ClassAttribute::Annotated {
            annotation: annotation.to_string(),
            enum_type: enum_type.to_string(),
            enum_constant: enum_constant.to_string(),
            class_literal: class_literal.to_string(),
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let writer = ClassWriter::new()
            .version(Version::V17)
            .unwrap()
            .access_flags(self.access)
            .unwrap()
            .this_class(self.name.as_str())
            .unwrap();
        let mut writer = match &self.super_class {
            Some(name) => writer.super_class(name.as_str()).unwrap(),
            None => writer.no_super_class().unwrap(),
        };

        for extra in &self.extras {
            match extra {
                Extra::String(text) => {
                    let string = utf8(&mut writer, text);
                    writer.insert_constant(cpool::String { string }).unwrap();
                }
                Extra::Long(value) => {
                    writer.insert_constant(cpool::Long { value: *value }).unwrap();
                }
                Extra::MismatchedHandle { owner, name, descriptor } => {
                    let reference = method_ref(&mut writer, owner, name, descriptor).as_item();
                    writer
                        .insert_constant(cpool::MethodHandle {
                            kind: cpool::MethodKind::GetStatic,
                            reference,
                        })
                        .unwrap();
                }
            }
        }

        let mut bootstrap_methods: Vec<[u16; 4]> = Vec::new();
        let mut method_bodies = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            let is_static = method.access.contains(AccessFlags::STATIC);
            let (_, end) = descriptor::parameter_layout(&method.descriptor, is_static).unwrap();
            let (code, nested) = match &method.body {
                Body::Return => (vec![RETURN], Vec::new()),
                Body::Locals(rows) => {
                    let mut info = u16s(&[rows.len() as u16]);
                    for (name, desc, slot) in rows {
                        let name = utf8(&mut writer, name).as_u16();
                        let desc = utf8(&mut writer, desc).as_u16();
                        info.extend_from_slice(&u16s(&[0, 1, name, desc, *slot]));
                    }
                    let table = utf8(&mut writer, attributes::LOCAL_VARIABLE_TABLE).as_u16();
                    (vec![RETURN], vec![(table, info)])
                }
                Body::Reference {
                    owner,
                    target,
                    target_desc,
                    virtual_call,
                } => {
                    let (index, opcode) = if target_desc.starts_with('(') {
                        let index = method_ref(&mut writer, owner, target, target_desc).as_u16();
                        (index, if *virtual_call { INVOKEVIRTUAL } else { INVOKESTATIC })
                    } else {
                        let class = class(&mut writer, owner);
                        let name_and_type = name_and_type(&mut writer, target, target_desc);
                        let index = writer
                            .insert_constant(cpool::FieldRef { class, name_and_type })
                            .unwrap()
                            .as_u16();
                        (index, GETSTATIC)
                    };
                    let [hi, lo] = index.to_be_bytes();
                    (vec![opcode, hi, lo, RETURN], Vec::new())
                }
                Body::Lambda {
                    sam_owner,
                    sam_name,
                    sam_desc,
                    impl_owner,
                    impl_name,
                } => {
                    let factory = method_ref(&mut writer, "java/lang/invoke/LambdaMetafactory", "metafactory", METAFACTORY_DESC);
                    let bootstrap = writer
                        .insert_constant(cpool::MethodHandle {
                            kind: cpool::MethodKind::InvokeStatic,
                            reference: factory.as_item(),
                        })
                        .unwrap();
                    let sam_type_desc = utf8(&mut writer, sam_desc);
                    let sam_type = writer
                        .insert_constant(cpool::MethodType { descriptor: sam_type_desc })
                        .unwrap();
                    let implementation = method_ref(&mut writer, impl_owner, impl_name, sam_desc);
                    let implementation = writer
                        .insert_constant(cpool::MethodHandle {
                            kind: cpool::MethodKind::InvokeStatic,
                            reference: implementation.as_item(),
                        })
                        .unwrap();
                    let call_site = name_and_type(&mut writer, sam_name, &format!("()L{};", sam_owner));
                    let indy = writer
                        .insert_constant(cpool::InvokeDynamic {
                            bootstrap_method_attr: bootstrap_methods.len() as u16,
                            name_and_type: call_site,
                        })
                        .unwrap();
                    bootstrap_methods.push([
                        bootstrap.as_u16(),
                        sam_type.as_u16(),
                        implementation.as_u16(),
                        sam_type.as_u16(),
                    ]);
                    let [hi, lo] = indy.as_u16().to_be_bytes();
                    (vec![INVOKEDYNAMIC, hi, lo, 0, 0, RETURN], Vec::new())
                }
            };
            method_bodies.push(code_body(end + 8, &code, &nested));
        }

        let mut class_attributes: Vec<(&str, Vec<u8>)> = Vec::new();
        for attribute in &self.attributes {
            match attribute {
                ClassAttribute::Signature(signature) => {
                    let index = utf8(&mut writer, signature).as_u16();
                    class_attributes.push((attributes::SIGNATURE, u16s(&[index])));
                }
                ClassAttribute::SourceFile(name) => {
                    let index = utf8(&mut writer, name).as_u16();
                    class_attributes.push((attributes::SOURCE_FILE, u16s(&[index])));
                }
                ClassAttribute::InvisibleMarker(descriptor) => {
                    let index = utf8(&mut writer, descriptor).as_u16();
                    class_attributes.push((attributes::RUNTIME_INVISIBLE_ANNOTATIONS, u16s(&[1, index, 0])));
                }
                ClassAttribute::Annotated {
                    annotation,
                    enum_type,
                    enum_constant,
                    class_literal,
                } => {
                    let ty = utf8(&mut writer, annotation).as_u16();
                    let value = utf8(&mut writer, "value").as_u16();
                    let enum_ty = utf8(&mut writer, enum_type).as_u16();
                    let constant = utf8(&mut writer, enum_constant).as_u16();
                    let type_name = utf8(&mut writer, "type").as_u16();
                    let literal = utf8(&mut writer, class_literal).as_u16();
                    let nested = utf8(&mut writer, "nested").as_u16();
                    let list = utf8(&mut writer, "list").as_u16();
                    let one = writer.insert_constant(cpool::Integer { value: 1 }).unwrap().as_u16();

                    let mut info = u16s(&[1, ty, 4, value]);
                    info.push(b'e');
                    info.extend_from_slice(&u16s(&[enum_ty, constant, type_name]));
                    info.push(b'c');
                    info.extend_from_slice(&u16s(&[literal, nested]));
                    info.push(b'@');
                    info.extend_from_slice(&u16s(&[ty, 0, list]));
                    info.push(b'[');
                    info.extend_from_slice(&u16s(&[1]));
                    info.push(b'I');
                    info.extend_from_slice(&u16s(&[one]));
                    class_attributes.push((attributes::RUNTIME_VISIBLE_ANNOTATIONS, info));
                }
            }
        }
        if !self.inner_classes.is_empty() {
            let mut info = u16s(&[self.inner_classes.len() as u16]);
            for (inner, outer, simple, access) in &self.inner_classes {
                let inner = class(&mut writer, inner).as_u16();
                let outer = outer.as_deref().map_or(0, |o| class(&mut writer, o).as_u16());
                let simple = simple.as_deref().map_or(0, |s| utf8(&mut writer, s).as_u16());
                info.extend_from_slice(&u16s(&[inner, outer, simple, access.bits()]));
            }
            class_attributes.push((attributes::INNER_CLASSES, info));
        }
        if !bootstrap_methods.is_empty() {
            let mut info = u16s(&[bootstrap_methods.len() as u16]);
            for [handle, first, second, third] in &bootstrap_methods {
                info.extend_from_slice(&u16s(&[*handle, 3, *first, *second, *third]));
            }
            class_attributes.push((attributes::BOOTSTRAP_METHODS, info));
        }

        writer
            .interfaces(|list| {
                for name in &self.interfaces {
                    list.begin(|w| w.interface(name.as_str()))?;
                }
                Ok(())
            })
            .unwrap()
            .fields(|list| {
                for (access, name, desc) in &self.fields {
                    list.begin(|w| {
                        w.access_flags(*access)?
                            .name(name.as_str())?
                            .descriptor(desc.as_str())?
                            .attributes(|_| Ok(()))
                    })?;
                }
                Ok(())
            })
            .unwrap()
            .methods(|list| {
                for (method, body) in self.methods.iter().zip(&method_bodies) {
                    list.begin(|w| {
                        w.access_flags(method.access)?
                            .name(method.name.as_str())?
                            .descriptor(method.descriptor.as_str())?
                            .attributes(|attrs| {
                                attrs.begin(|a| a.raw_attribute(attributes::CODE, body))?;
                                Ok(())
                            })
                    })?;
                }
                Ok(())
            })
            .unwrap()
            .attributes(|attrs| {
                for (name, info) in &class_attributes {
                    attrs.begin(|a| a.raw_attribute(*name, info))?;
                }
                Ok(())
            })
            .unwrap()
            .into_bytes()
            .unwrap()
    }
}

/// Text behind a single-index class attribute such as `SourceFile`.
pub fn index_attribute(data: &[u8], name: &str) -> Option<String> {
    let class = ClassFile::parse(data).unwrap();
    let at = class.find_attribute(&class.attributes, name)?;
    let info = &class.attributes[at].info;
    Some(class.pool.utf8(u16::from_be_bytes([info[0], info[1]])).unwrap())
}

/// `(slot, name)` rows of the LocalVariableTable of method `method`.
pub fn local_names(data: &[u8], method: usize) -> Vec<(u16, String)> {
    let source = open(data).unwrap();
    let class = ClassFile::read(&source).unwrap();
    let pool = source.pool();
    let method = source.methods().iter().nth(method).unwrap().unwrap();
    let (_, code) = attributes::find(pool, &method.attributes(), attributes::CODE).unwrap().unwrap();
    let (_, body) = CodeAttribute::read(pool, &code).unwrap();
    let (_, table) = attributes::find(pool, &body.attributes(), attributes::LOCAL_VARIABLE_TABLE)
        .unwrap()
        .unwrap();
    attributes::local_variables(&attributes::read(pool, &table).unwrap())
        .unwrap()
        .into_iter()
        .map(|v| (v.index, class.pool.utf8(v.name).unwrap()))
        .collect()
}
