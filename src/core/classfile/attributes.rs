// Typed reads go through noak; the editable forms below write back the few
// bodies transformers change. Indices always refer to the source pool, which
// the editable pool keeps intact.

use noak::error::DecodeError;
use noak::reader::attributes::annotations::{
    Annotation, ElementValue, SuperTypeIndex, TargetInfo, TargetType, TypeAnnotation, TypePathSegmentKind,
};
use noak::reader::attributes::{self as typed, AttributeContent};
use noak::reader::cpool::ConstantPool as SourcePool;
use noak::reader::{self, DecodeMany};

use super::{len_u16, put_u16, read_attributes, write_attributes, AccessFlags, Attribute};
use crate::core::error::{WorkspaceError, WorkspaceResult};

pub const CODE: &str = "Code";
pub const SIGNATURE: &str = "Signature";
pub const SOURCE_FILE: &str = "SourceFile";
pub const INNER_CLASSES: &str = "InnerClasses";
pub const ENCLOSING_METHOD: &str = "EnclosingMethod";
pub const RECORD: &str = "Record";
pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
pub const METHOD_PARAMETERS: &str = "MethodParameters";
pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";
pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
pub const RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
pub const RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeInvisibleParameterAnnotations";
pub const RUNTIME_VISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeVisibleTypeAnnotations";
pub const RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeInvisibleTypeAnnotations";

pub type SourceAttributes<'a> = DecodeMany<'a, reader::Attribute<'a>, u16>;

/// First attribute called `name`, with its position in `list`.
pub fn find<'a>(
    pool: &SourcePool<'a>,
    list: &SourceAttributes<'a>,
    name: &str,
) -> WorkspaceResult<Option<(usize, reader::Attribute<'a>)>> {
    for (position, attribute) in list.iter().enumerate() {
        let attribute = attribute?;
        if pool.get(attribute.name())?.content == name {
            return Ok(Some((position, attribute)));
        }
    }
    Ok(None)
}

pub fn name_of<'a>(pool: &SourcePool<'a>, attribute: &reader::Attribute<'a>) -> WorkspaceResult<String> {
    super::text(pool.get(attribute.name())?.content)
}

/// Decode `attribute` as `A`. Only call this for names noak knows.
pub fn read<'a, A>(pool: &SourcePool<'a>, attribute: &reader::Attribute<'a>) -> WorkspaceResult<A>
where
    A: TryFrom<AttributeContent<'a>, Error = DecodeError>,
{
    Ok(A::try_from(attribute.read_content(pool)?)?)
}

/// Body of a single-index attribute (Signature, SourceFile).
pub fn index_info(index: u16) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

// ── Code ────────────────────────────────────────────

/// A Code body split into the part nobody rewrites and its nested attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Limits, bytecode and exception table, copied verbatim.
    pub head: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    pub fn read<'a>(pool: &SourcePool<'a>, attribute: &reader::Attribute<'a>) -> WorkspaceResult<(Self, typed::Code<'a>)> {
        let code: typed::Code<'a> = read(pool, attribute)?;
        let attributes = read_attributes(code.attributes())?;
        let tail = attributes.iter().map(|a| 6 + a.info.len()).sum::<usize>() + 2;
        let content = attribute.content();
        let head = content
            .len()
            .checked_sub(tail)
            .map(|end| content[..end].to_vec())
            .ok_or_else(|| WorkspaceError::ClassFormat("Code attribute shorter than its tables".into()))?;
        Ok((Self { head, attributes }, code))
    }

    pub fn to_bytes(&self) -> WorkspaceResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.head.len() + 32);
        out.extend_from_slice(&self.head);
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }
}

/// Row of a LocalVariableTable; in a LocalVariableTypeTable `descriptor` is a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name: u16,
    pub descriptor: u16,
    pub index: u16,
}

pub fn local_variables(table: &typed::LocalVariableTable<'_>) -> WorkspaceResult<Vec<LocalVariable>> {
    table
        .locals()
        .iter()
        .map(|row| {
            let row = row?;
            let range = row.range();
            Ok(LocalVariable {
                start_pc: range.start.as_u32() as u16,
                length: (range.end.as_u32() - range.start.as_u32()) as u16,
                name: row.name().as_u16(),
                descriptor: row.descriptor().as_u16(),
                index: row.index(),
            })
        })
        .collect()
}

pub fn local_variable_types(table: &typed::LocalVariableTypeTable<'_>) -> WorkspaceResult<Vec<LocalVariable>> {
    table
        .locals()
        .iter()
        .map(|row| {
            let row = row?;
            let range = row.range();
            Ok(LocalVariable {
                start_pc: range.start.as_u32() as u16,
                length: (range.end.as_u32() - range.start.as_u32()) as u16,
                name: row.name().as_u16(),
                descriptor: row.signature().as_u16(),
                index: row.index(),
            })
        })
        .collect()
}

pub fn write_local_variables(variables: &[LocalVariable]) -> WorkspaceResult<Vec<u8>> {
    let mut out = Vec::with_capacity(2 + variables.len() * 10);
    put_u16(&mut out, len_u16(variables.len(), "local variables")?);
    for v in variables {
        put_u16(&mut out, v.start_pc);
        put_u16(&mut out, v.length);
        put_u16(&mut out, v.name);
        put_u16(&mut out, v.descriptor);
        put_u16(&mut out, v.index);
    }
    Ok(out)
}

// ── Class structure ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
    pub inner: u16,
    /// `None` for local and anonymous classes.
    pub outer: Option<u16>,
    /// `None` for anonymous classes.
    pub name: Option<u16>,
    pub access: AccessFlags,
}

pub fn inner_classes(table: &typed::InnerClasses<'_>) -> WorkspaceResult<Vec<InnerClass>> {
    table
        .classes()
        .iter()
        .map(|row| {
            let row = row?;
            Ok(InnerClass {
                inner: row.inner_class().as_u16(),
                outer: row.outer_class().map(|i| i.as_u16()),
                name: row.inner_name().map(|i| i.as_u16()),
                access: row.inner_access_flags(),
            })
        })
        .collect()
}

pub fn write_inner_classes(classes: &[InnerClass]) -> WorkspaceResult<Vec<u8>> {
    let mut out = Vec::with_capacity(2 + classes.len() * 8);
    put_u16(&mut out, len_u16(classes.len(), "inner classes")?);
    for c in classes {
        put_u16(&mut out, c.inner);
        put_u16(&mut out, c.outer.unwrap_or(0));
        put_u16(&mut out, c.name.unwrap_or(0));
        put_u16(&mut out, c.access.bits());
    }
    Ok(out)
}

pub fn write_enclosing_method(class: u16, method: Option<u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    put_u16(&mut out, class);
    put_u16(&mut out, method.unwrap_or(0));
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

pub fn write_record(components: &[RecordComponent]) -> WorkspaceResult<Vec<u8>> {
    let mut out = Vec::new();
    put_u16(&mut out, len_u16(components.len(), "record components")?);
    for c in components {
        put_u16(&mut out, c.name);
        put_u16(&mut out, c.descriptor);
        write_attributes(&mut out, &c.attributes)?;
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_handle: u16,
    pub arguments: Vec<u16>,
}

pub fn bootstrap_methods(table: &typed::BootstrapMethods<'_>) -> WorkspaceResult<Vec<BootstrapMethod>> {
    table
        .methods()
        .iter()
        .map(|method| {
            let method = method?;
            let arguments = method
                .arguments()
                .iter()
                .map(|a| Ok(a?.as_u16()))
                .collect::<WorkspaceResult<_>>()?;
            Ok(BootstrapMethod {
                method_handle: method.method_ref().as_u16(),
                arguments,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    pub name: Option<u16>,
    pub access: AccessFlags,
}

pub fn method_parameters(table: &typed::MethodParameters<'_>) -> WorkspaceResult<Vec<MethodParameter>> {
    table
        .parameters()
        .iter()
        .map(|p| {
            let p = p?;
            Ok(MethodParameter {
                name: p.name().map(|i| i.as_u16()),
                access: p.access_flags(),
            })
        })
        .collect()
}

pub fn write_method_parameters(parameters: &[MethodParameter]) -> WorkspaceResult<Vec<u8>> {
    let count = u8::try_from(parameters.len())
        .map_err(|_| WorkspaceError::ClassFormat("too many method parameters".into()))?;
    let mut out = vec![count];
    for p in parameters {
        put_u16(&mut out, p.name.unwrap_or(0));
        put_u16(&mut out, p.access.bits());
    }
    Ok(out)
}

// ── Annotations ─────────────────────────────────────

/// Constant pool references inside annotation data that depend on naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationRef {
    /// Field descriptor of an annotation or enum type.
    Type(u16),
    /// Element name, i.e. a method of the annotation type.
    Element { annotation_type: u16, name: u16 },
    EnumConstant { enum_type: u16, name: u16 },
    /// Return descriptor of a class literal.
    ClassValue(u16),
}

impl AnnotationRef {
    /// The index as it appears in the source.
    pub fn original(self) -> u16 {
        match self {
            AnnotationRef::Type(i) | AnnotationRef::ClassValue(i) => i,
            AnnotationRef::Element { name, .. } | AnnotationRef::EnumConstant { name, .. } => name,
        }
    }
}

pub fn is_annotation_attribute(name: &str) -> bool {
    matches!(
        name,
        RUNTIME_VISIBLE_ANNOTATIONS
            | RUNTIME_INVISIBLE_ANNOTATIONS
            | RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS
            | RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS
            | RUNTIME_VISIBLE_TYPE_ANNOTATIONS
            | RUNTIME_INVISIBLE_TYPE_ANNOTATIONS
            | ANNOTATION_DEFAULT
    )
}

/// Re-encode annotation data, replacing each naming-dependent index with
/// `rewrite(..)`. `None` when `attribute` holds no annotations.
pub fn rewrite_annotations<'a>(
    pool: &SourcePool<'a>,
    attribute: &reader::Attribute<'a>,
    rewrite: &mut dyn FnMut(AnnotationRef) -> WorkspaceResult<u16>,
) -> WorkspaceResult<Option<Vec<u8>>> {
    if !is_annotation_attribute(&name_of(pool, attribute)?) {
        return Ok(None);
    }
    let mut writer = AnnotationWriter {
        out: Vec::with_capacity(attribute.content().len()),
        rewrite,
    };
    match attribute.read_content(pool)? {
        AttributeContent::RuntimeVisibleAnnotations(a) => writer.annotations(&a.annotations(), 0)?,
        AttributeContent::RuntimeInvisibleAnnotations(a) => writer.annotations(&a.annotations(), 0)?,
        AttributeContent::RuntimeVisibleParameterAnnotations(a) => writer.parameters(&a.parameters())?,
        AttributeContent::RuntimeInvisibleParameterAnnotations(a) => writer.parameters(&a.parameters())?,
        AttributeContent::RuntimeVisibleTypeAnnotations(a) => writer.type_annotations(&a.annotations())?,
        AttributeContent::RuntimeInvisibleTypeAnnotations(a) => writer.type_annotations(&a.annotations())?,
        AttributeContent::AnnotationDefault(a) => writer.element_value(&a.value())?,
        _ => return Ok(None),
    }
    Ok(Some(writer.out))
}

/// A `RuntimeInvisibleAnnotations` body holding everything in `existing`
/// plus a marker annotation without elements.
pub fn append_marker_annotation<'a>(
    pool: &SourcePool<'a>,
    existing: Option<&reader::Attribute<'a>>,
    type_descriptor: u16,
) -> WorkspaceResult<Vec<u8>> {
    let mut identity = |r: AnnotationRef| -> WorkspaceResult<u16> { Ok(r.original()) };
    let mut writer = AnnotationWriter {
        out: Vec::new(),
        rewrite: &mut identity,
    };
    match existing {
        Some(attribute) => {
            let current: typed::RuntimeInvisibleAnnotations<'a> = read(pool, attribute)?;
            writer.annotations(&current.annotations(), 1)?;
        }
        None => put_u16(&mut writer.out, 1),
    }
    put_u16(&mut writer.out, type_descriptor);
    put_u16(&mut writer.out, 0);
    Ok(writer.out)
}

fn target_tag(target: TargetType) -> u8 {
    use TargetType::*;
    match target {
        ClassTypeParameter => 0x00,
        MethodTypeParameter => 0x01,
        ClassExtends => 0x10,
        ClassTypeParameterBound => 0x11,
        MethodTypeParameterBound => 0x12,
        Field => 0x13,
        MethodReturn => 0x14,
        MethodReceiver => 0x15,
        MethodFormalParameter => 0x16,
        Throws => 0x17,
        LocalVariable => 0x40,
        ResourceVariable => 0x41,
        ExceptionParameter => 0x42,
        InstanceOf => 0x43,
        New => 0x44,
        ConstructorReference => 0x45,
        MethodReference => 0x46,
        Cast => 0x47,
        ConstructorInvocationTypeArgument => 0x48,
        MethodInvocationTypeArgument => 0x49,
        ConstructorReferenceTypeArgument => 0x4A,
        MethodReferenceTypeArgument => 0x4B,
    }
}

fn path_tag(kind: TypePathSegmentKind) -> u8 {
    match kind {
        TypePathSegmentKind::ArrayElement => 0,
        TypePathSegmentKind::InnerType => 1,
        TypePathSegmentKind::WildcardBound => 2,
        TypePathSegmentKind::TypeArgument => 3,
    }
}

struct AnnotationWriter<'r> {
    out: Vec<u8>,
    rewrite: &'r mut dyn FnMut(AnnotationRef) -> WorkspaceResult<u16>,
}

impl AnnotationWriter<'_> {
    fn substitute(&mut self, reference: AnnotationRef) -> WorkspaceResult<()> {
        let replacement = (self.rewrite)(reference)?;
        put_u16(&mut self.out, replacement);
        Ok(())
    }

    /// Writes the count (plus `extra` slots the caller fills) and each annotation.
    fn annotations<'a>(&mut self, list: &DecodeMany<'a, Annotation<'a>, u16>, extra: usize) -> WorkspaceResult<()> {
        let items = list.iter().collect::<Result<Vec<_>, _>>()?;
        put_u16(&mut self.out, len_u16(items.len() + extra, "annotations")?);
        for annotation in &items {
            self.annotation(annotation)?;
        }
        Ok(())
    }

    fn parameters<'a>(
        &mut self,
        list: &DecodeMany<'a, typed::annotations::ParameterAnnotations<'a>, u8>,
    ) -> WorkspaceResult<()> {
        let items = list.iter().collect::<Result<Vec<_>, _>>()?;
        let count = u8::try_from(items.len())
            .map_err(|_| WorkspaceError::ClassFormat("too many parameter annotations".into()))?;
        self.out.push(count);
        for parameter in &items {
            self.annotations(&parameter.annotations(), 0)?;
        }
        Ok(())
    }

    fn annotation(&mut self, annotation: &Annotation<'_>) -> WorkspaceResult<()> {
        let annotation_type = annotation.type_().as_u16();
        self.substitute(AnnotationRef::Type(annotation_type))?;
        let pairs = annotation.pairs().iter().collect::<Result<Vec<_>, _>>()?;
        put_u16(&mut self.out, len_u16(pairs.len(), "element values")?);
        for pair in &pairs {
            self.substitute(AnnotationRef::Element {
                annotation_type,
                name: pair.name().as_u16(),
            })?;
            self.element_value(&pair.value())?;
        }
        Ok(())
    }

    fn constant(&mut self, tag: u8, index: u16) {
        self.out.push(tag);
        put_u16(&mut self.out, index);
    }

    fn element_value(&mut self, value: &ElementValue<'_>) -> WorkspaceResult<()> {
        match value {
            ElementValue::Boolean(i) => self.constant(b'Z', i.as_u16()),
            ElementValue::Byte(i) => self.constant(b'B', i.as_u16()),
            ElementValue::Short(i) => self.constant(b'S', i.as_u16()),
            ElementValue::Int(i) => self.constant(b'I', i.as_u16()),
            ElementValue::Char(i) => self.constant(b'C', i.as_u16()),
            ElementValue::Long(i) => self.constant(b'J', i.as_u16()),
            ElementValue::Float(i) => self.constant(b'F', i.as_u16()),
            ElementValue::Double(i) => self.constant(b'D', i.as_u16()),
            ElementValue::String(i) => self.constant(b's', i.as_u16()),
            ElementValue::Class(i) => {
                self.out.push(b'c');
                self.substitute(AnnotationRef::ClassValue(i.as_u16()))?;
            }
            ElementValue::Enum { type_name, const_name } => {
                self.out.push(b'e');
                let enum_type = type_name.as_u16();
                self.substitute(AnnotationRef::Type(enum_type))?;
                self.substitute(AnnotationRef::EnumConstant {
                    enum_type,
                    name: const_name.as_u16(),
                })?;
            }
            ElementValue::Annotation(nested) => {
                self.out.push(b'@');
                self.annotation(nested)?;
            }
            ElementValue::Array(values) => {
                self.out.push(b'[');
                let values = values.iter().collect::<Result<Vec<_>, _>>()?;
                put_u16(&mut self.out, len_u16(values.len(), "array elements")?);
                for value in &values {
                    self.element_value(value)?;
                }
            }
        }
        Ok(())
    }

    fn type_annotations<'a>(&mut self, list: &DecodeMany<'a, TypeAnnotation<'a>, u16>) -> WorkspaceResult<()> {
        let items = list.iter().collect::<Result<Vec<_>, _>>()?;
        put_u16(&mut self.out, len_u16(items.len(), "type annotations")?);
        for annotation in &items {
            self.type_annotation(annotation)?;
        }
        Ok(())
    }

    fn type_annotation(&mut self, annotation: &TypeAnnotation<'_>) -> WorkspaceResult<()> {
        self.out.push(target_tag(annotation.target_type()));
        match annotation.target_info() {
            TargetInfo::TypeParameter { parameter_index } => self.out.push(*parameter_index),
            TargetInfo::SuperType { supertype_index } => match supertype_index {
                SuperTypeIndex::Class => put_u16(&mut self.out, u16::MAX),
                SuperTypeIndex::Interface { index } => put_u16(&mut self.out, *index),
            },
            TargetInfo::TypeParameterBound {
                type_parameter_index,
                bound_index,
            } => {
                self.out.push(*type_parameter_index);
                self.out.push(*bound_index);
            }
            TargetInfo::Empty => {}
            TargetInfo::FormalParameter { formal_parameter_index } => self.out.push(*formal_parameter_index),
            TargetInfo::Throws { throws_type_index } => put_u16(&mut self.out, *throws_type_index),
            TargetInfo::LocalVariable { table } => {
                let rows = table.iter().collect::<Result<Vec<_>, _>>()?;
                put_u16(&mut self.out, len_u16(rows.len(), "local variable targets")?);
                for row in &rows {
                    let range = row.range();
                    put_u16(&mut self.out, range.start.as_u32() as u16);
                    put_u16(&mut self.out, (range.end.as_u32() - range.start.as_u32()) as u16);
                    put_u16(&mut self.out, row.index());
                }
            }
            TargetInfo::Catch { exception_table_index } => put_u16(&mut self.out, *exception_table_index),
            TargetInfo::Offset { offset } => put_u16(&mut self.out, offset.as_u32() as u16),
            TargetInfo::TypeArgument {
                offset,
                type_argument_index,
            } => {
                put_u16(&mut self.out, offset.as_u32() as u16);
                self.out.push(*type_argument_index);
            }
        }
        let path = annotation.target_path().iter().collect::<Result<Vec<_>, _>>()?;
        let path_len = u8::try_from(path.len())
            .map_err(|_| WorkspaceError::ClassFormat("type path too long".into()))?;
        self.out.push(path_len);
        for segment in &path {
            self.out.push(path_tag(segment.kind()));
            self.out.push(segment.type_argument_index());
        }

        let annotation_type = annotation.type_().as_u16();
        self.substitute(AnnotationRef::Type(annotation_type))?;
        let pairs = annotation.pairs().iter().collect::<Result<Vec<_>, _>>()?;
        put_u16(&mut self.out, len_u16(pairs.len(), "element values")?);
        for pair in &pairs {
            self.substitute(AnnotationRef::Element {
                annotation_type,
                name: pair.name().as_u16(),
            })?;
            self.element_value(&pair.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classfile::testing::ClassBuilder;
    use crate::core::classfile::{open, ClassFile};

    #[test]
    fn code_attribute_keeps_the_body_and_splits_nested_tables() {
        let bytes = ClassBuilder::new("a/B")
            .method_with_locals(AccessFlags::PUBLIC, "m", "()V", &[("this", "La/B;", 0)])
            .build();
        let source = open(&bytes).unwrap();
        let pool = source.pool();
        let method = source.methods().iter().next().unwrap().unwrap();
        let (_, attribute) = find(pool, &method.attributes(), CODE).unwrap().unwrap();

        let (code, typed_code) = CodeAttribute::read(pool, &attribute).unwrap();
        assert_eq!(code.to_bytes().unwrap(), attribute.content());
        assert_eq!(code.attributes.len(), 1);

        let (_, lvt) = find(pool, &typed_code.attributes(), LOCAL_VARIABLE_TABLE).unwrap().unwrap();
        let rows = local_variables(&read(pool, &lvt).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].length, 1);
        let class = ClassFile::read(&source).unwrap();
        assert_eq!(class.pool.utf8(rows[0].name).unwrap(), "this");
    }

    #[test]
    fn annotation_rewrite_visits_every_reference() {
        let bytes = ClassBuilder::new("a/B")
            .annotation_with_values("La/T;", "La/E;", "X", "La/C;")
            .build();
        let source = open(&bytes).unwrap();
        let pool = source.pool();
        let (_, attribute) = find(pool, &source.attributes(), RUNTIME_VISIBLE_ANNOTATIONS).unwrap().unwrap();

        let class = ClassFile::read(&source).unwrap();
        let mut seen = Vec::new();
        let out = rewrite_annotations(pool, &attribute, &mut |r| {
            seen.push(r);
            Ok(r.original())
        })
        .unwrap()
        .unwrap();
        assert_eq!(out, attribute.content());

        let names: Vec<String> = seen
            .iter()
            .map(|r| class.pool.utf8(r.original()).unwrap())
            .collect();
        assert_eq!(names, vec!["La/T;", "value", "La/E;", "X", "type", "La/C;", "nested", "La/T;", "list"]);
        assert!(matches!(seen[3], AnnotationRef::EnumConstant { .. }));
        assert!(matches!(seen[5], AnnotationRef::ClassValue(_)));
    }

    #[test]
    fn marker_annotation_is_appended() {
        let bytes = ClassBuilder::new("a/B").invisible_annotation("La/First;").build();
        let source = open(&bytes).unwrap();
        let pool = source.pool();
        let (_, attribute) = find(pool, &source.attributes(), RUNTIME_INVISIBLE_ANNOTATIONS).unwrap().unwrap();
        let first = &attribute.content()[2..6];

        let out = append_marker_annotation(pool, Some(&attribute), 77).unwrap();
        let mut expected = vec![0, 2];
        expected.extend_from_slice(first);
        expected.extend_from_slice(&[0, 77, 0, 0]);
        assert_eq!(out, expected);

        assert_eq!(append_marker_annotation(pool, None, 9).unwrap(), vec![0, 1, 0, 9, 0, 0]);
    }
}
