// ─── Class Files ───
// Class files are read with noak. What transformers edit is an owned model
// that keeps every constant pool index stable, so attribute bodies nobody
// touched (code, stack maps, annotations) stay valid byte for byte.

pub mod attributes;
pub mod constant_pool;
pub mod descriptor;

#[cfg(test)]
pub(crate) mod testing;

use noak::reader::{self, cpool as source_pool, DecodeMany};
pub use noak::{AccessFlags, MStr, MString, Version};

pub use constant_pool::{Constant, ConstantPool};

use crate::core::error::{WorkspaceError, WorkspaceResult};

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const VISIBILITY: AccessFlags = AccessFlags::PUBLIC
    .union(AccessFlags::PRIVATE)
    .union(AccessFlags::PROTECTED);

/// A noak view of a class file, the side every transformer reads from.
pub type ClassSource<'a> = reader::Class<'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: u16,
    pub info: Vec<u8>,
}

impl Attribute {
    pub fn read(attribute: &reader::Attribute<'_>) -> Self {
        Self {
            name: attribute.name().as_u16(),
            info: attribute.content().to_vec(),
        }
    }
}

pub fn read_attributes<'a>(list: DecodeMany<'a, reader::Attribute<'a>, u16>) -> WorkspaceResult<Vec<Attribute>> {
    list.iter().map(|a| Ok(Attribute::read(&a?))).collect()
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access: AccessFlags,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

impl Member {
    fn read<'a>(
        access: AccessFlags,
        name: source_pool::Index<source_pool::Utf8<'a>>,
        descriptor: source_pool::Index<source_pool::Utf8<'a>>,
        attributes: DecodeMany<'a, reader::Attribute<'a>, u16>,
    ) -> WorkspaceResult<Self> {
        Ok(Self {
            access,
            name: name.as_u16(),
            descriptor: descriptor.as_u16(),
            attributes: read_attributes(attributes)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: u16,
    /// `None` only for `java/lang/Object` and module-info.
    pub super_class: Option<u16>,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// Open `data` for reading. Unlike noak on its own, trailing bytes are an error.
pub fn open(data: &[u8]) -> WorkspaceResult<ClassSource<'_>> {
    let source = reader::Class::new(data)?;
    if source.buffer_size() != data.len() {
        return Err(WorkspaceError::ClassFormat("trailing bytes after class file".into()));
    }
    Ok(source)
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> WorkspaceResult<Self> {
        Self::read(&open(data)?)
    }

    /// Copy `source` into an editable model with the same pool layout.
    pub fn read(source: &ClassSource<'_>) -> WorkspaceResult<Self> {
        let interfaces = source
            .interfaces()
            .iter()
            .map(|i| Ok(i?.as_u16()))
            .collect::<WorkspaceResult<_>>()?;
        let fields = source
            .fields()
            .iter()
            .map(|f| {
                let f = f?;
                Member::read(f.access_flags(), f.name(), f.descriptor(), f.attributes())
            })
            .collect::<WorkspaceResult<_>>()?;
        let methods = source
            .methods()
            .iter()
            .map(|m| {
                let m = m?;
                Member::read(m.access_flags(), m.name(), m.descriptor(), m.attributes())
            })
            .collect::<WorkspaceResult<_>>()?;

        let class = Self {
            version: source.version(),
            pool: ConstantPool::read(source.pool())?,
            access: source.access_flags(),
            this_class: source.this_class().as_u16(),
            super_class: source.super_class().map(|s| s.as_u16()),
            interfaces,
            fields,
            methods,
            attributes: read_attributes(source.attributes())?,
        };
        class.name()?;
        Ok(class)
    }

    pub fn to_bytes(&self) -> WorkspaceResult<Vec<u8>> {
        let mut out = Vec::with_capacity(1024);
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.version.minor);
        put_u16(&mut out, self.version.major);
        self.pool.write(&mut out)?;
        put_u16(&mut out, self.access.bits());
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class.unwrap_or(0));
        put_u16(&mut out, len_u16(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            put_u16(&mut out, *interface);
        }
        write_members(&mut out, &self.fields, "fields")?;
        write_members(&mut out, &self.methods, "methods")?;
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    pub fn name(&self) -> WorkspaceResult<String> {
        self.pool.class_name(self.this_class)
    }

    pub fn super_name(&self) -> WorkspaceResult<Option<String>> {
        self.super_class.map(|s| self.pool.class_name(s)).transpose()
    }

    pub fn interface_names(&self) -> WorkspaceResult<Vec<String>> {
        self.interfaces
            .iter()
            .map(|i| self.pool.class_name(*i))
            .collect()
    }

    pub fn member_name(&self, member: &Member) -> WorkspaceResult<String> {
        self.pool.utf8(member.name)
    }

    pub fn member_descriptor(&self, member: &Member) -> WorkspaceResult<String> {
        self.pool.utf8(member.descriptor)
    }

    /// Position of the first attribute called `name` in `attributes`.
    pub fn find_attribute(&self, attributes: &[Attribute], name: &str) -> Option<usize> {
        attributes
            .iter()
            .position(|a| self.pool.utf8(a.name).is_ok_and(|n| n == name))
    }
}

/// Decode modified UTF-8; unpaired surrogates have no `String` form.
pub fn text(value: &MStr) -> WorkspaceResult<String> {
    value
        .chars()
        .collect::<Result<String, u32>>()
        .map_err(|code| WorkspaceError::ClassFormat(format!("unpaired surrogate {:#06x} in string constant", code)))
}

pub fn utf8<'a>(pool: &source_pool::ConstantPool<'a>, index: source_pool::Index<source_pool::Utf8<'a>>) -> WorkspaceResult<String> {
    text(pool.get(index)?.content)
}

pub fn class_name<'a>(
    pool: &source_pool::ConstantPool<'a>,
    index: source_pool::Index<source_pool::Class<'a>>,
) -> WorkspaceResult<String> {
    utf8(pool, pool.get(index)?.name)
}

pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn len_u16(len: usize, what: &str) -> WorkspaceResult<u16> {
    u16::try_from(len).map_err(|_| WorkspaceError::ClassFormat(format!("too many {}", what)))
}

fn write_members(out: &mut Vec<u8>, members: &[Member], what: &str) -> WorkspaceResult<()> {
    put_u16(out, len_u16(members.len(), what)?);
    for member in members {
        put_u16(out, member.access.bits());
        put_u16(out, member.name);
        put_u16(out, member.descriptor);
        write_attributes(out, &member.attributes)?;
    }
    Ok(())
}

pub fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> WorkspaceResult<()> {
    put_u16(out, len_u16(attributes.len(), "attributes")?);
    for attribute in attributes {
        put_u16(out, attribute.name);
        let len = u32::try_from(attribute.info.len())
            .map_err(|_| WorkspaceError::ClassFormat("attribute too large".into()))?;
        put_u32(out, len);
        out.extend_from_slice(&attribute.info);
    }
    Ok(())
}

/// Cheap check used by the jar engine to classify entries.
pub fn is_class_file(data: &[u8]) -> bool {
    data.starts_with(&MAGIC.to_be_bytes())
}
