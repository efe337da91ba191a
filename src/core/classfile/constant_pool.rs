use std::collections::HashMap;

use noak::reader::cpool::{self as source, MethodKind};

use super::{len_u16, put_u16, put_u32, text, MStr, MString};
use crate::core::error::{WorkspaceError, WorkspaceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Shared between identifiers and string literals, so it is never
    /// rewritten in place.
    Utf8(MString),
    Integer(i32),
    /// IEEE bits, kept raw so NaN payloads survive.
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: MethodKind, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// Slot 0, and the slot following a long or double.
    Unusable,
}

impl Constant {
    pub fn from_item(item: &source::Item<'_>) -> Self {
        use source::Item;
        match item {
            Item::Utf8(v) => Constant::Utf8(MString::from(v.content)),
            Item::Integer(v) => Constant::Integer(v.value),
            Item::Float(v) => Constant::Float(v.value.to_bits()),
            Item::Long(v) => Constant::Long(v.value),
            Item::Double(v) => Constant::Double(v.value.to_bits()),
            Item::Class(v) => Constant::Class { name: v.name.as_u16() },
            Item::String(v) => Constant::String { value: v.string.as_u16() },
            Item::FieldRef(v) => Constant::Fieldref {
                class: v.class.as_u16(),
                name_and_type: v.name_and_type.as_u16(),
            },
            Item::MethodRef(v) => Constant::Methodref {
                class: v.class.as_u16(),
                name_and_type: v.name_and_type.as_u16(),
            },
            Item::InterfaceMethodRef(v) => Constant::InterfaceMethodref {
                class: v.class.as_u16(),
                name_and_type: v.name_and_type.as_u16(),
            },
            Item::NameAndType(v) => Constant::NameAndType {
                name: v.name.as_u16(),
                descriptor: v.descriptor.as_u16(),
            },
            Item::MethodHandle(v) => Constant::MethodHandle {
                kind: v.kind,
                reference: v.reference.as_u16(),
            },
            Item::MethodType(v) => Constant::MethodType { descriptor: v.descriptor.as_u16() },
            Item::Dynamic(v) => Constant::Dynamic {
                bootstrap: v.bootstrap_method_attr,
                name_and_type: v.name_and_type.as_u16(),
            },
            Item::InvokeDynamic(v) => Constant::InvokeDynamic {
                bootstrap: v.bootstrap_method_attr,
                name_and_type: v.name_and_type.as_u16(),
            },
            Item::Module(v) => Constant::Module { name: v.name.as_u16() },
            Item::Package(v) => Constant::Package { name: v.name.as_u16() },
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Whether a method handle of this kind must reference a field.
pub fn is_field_kind(kind: MethodKind) -> bool {
    matches!(
        kind,
        MethodKind::GetField | MethodKind::GetStatic | MethodKind::PutField | MethodKind::PutStatic
    )
}

fn method_kind_tag(kind: MethodKind) -> u8 {
    match kind {
        MethodKind::GetField => 1,
        MethodKind::GetStatic => 2,
        MethodKind::PutField => 3,
        MethodKind::PutStatic => 4,
        MethodKind::InvokeVirtual => 5,
        MethodKind::InvokeStatic => 6,
        MethodKind::InvokeSpecial => 7,
        MethodKind::NewInvokeSpecial => 8,
        MethodKind::InvokeInterface => 9,
    }
}

/// An editable pool. Indices handed out by the source pool stay valid;
/// new entries are appended.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    utf8_lookup: HashMap<MString, u16>,
    class_lookup: HashMap<u16, u16>,
    name_and_type_lookup: HashMap<(u16, u16), u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
            ..Default::default()
        }
    }

    pub fn read(source: &source::ConstantPool<'_>) -> WorkspaceResult<Self> {
        let mut pool = Self::new();
        for (index, item) in source.iter_indices() {
            let index = index.as_u16();
            while pool.entries.len() < usize::from(index) {
                pool.entries.push(Constant::Unusable);
            }
            let constant = Constant::from_item(item);
            pool.index(index, &constant);
            let wide = constant.is_wide();
            pool.entries.push(constant);
            if wide {
                pool.entries.push(Constant::Unusable);
            }
        }
        Ok(pool)
    }

    fn index(&mut self, index: u16, constant: &Constant) {
        match constant {
            Constant::Utf8(raw) => {
                self.utf8_lookup.entry(raw.clone()).or_insert(index);
            }
            Constant::Class { name } => {
                self.class_lookup.entry(*name).or_insert(index);
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_type_lookup
                    .entry((*name, *descriptor))
                    .or_insert(index);
            }
            _ => {}
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) -> WorkspaceResult<()> {
        put_u16(out, len_u16(self.entries.len(), "constants")?);
        for constant in self.entries.iter().skip(1) {
            match constant {
                Constant::Utf8(raw) => {
                    out.push(1);
                    put_u16(out, len_u16(raw.len(), "bytes in a Utf8 constant")?);
                    out.extend_from_slice(raw.as_bytes());
                }
                Constant::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Float(v) => {
                    out.push(4);
                    put_u32(out, *v);
                }
                Constant::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(6);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class { name } => {
                    out.push(7);
                    put_u16(out, *name);
                }
                Constant::String { value } => {
                    out.push(8);
                    put_u16(out, *value);
                }
                Constant::Fieldref { class, name_and_type } => {
                    out.push(9);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::Methodref { class, name_and_type } => {
                    out.push(10);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::InterfaceMethodref { class, name_and_type } => {
                    out.push(11);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(12);
                    put_u16(out, *name);
                    put_u16(out, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(method_kind_tag(*kind));
                    put_u16(out, *reference);
                }
                Constant::MethodType { descriptor } => {
                    out.push(16);
                    put_u16(out, *descriptor);
                }
                Constant::Dynamic { bootstrap, name_and_type } => {
                    out.push(17);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                Constant::InvokeDynamic { bootstrap, name_and_type } => {
                    out.push(18);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                Constant::Module { name } => {
                    out.push(19);
                    put_u16(out, *name);
                }
                Constant::Package { name } => {
                    out.push(20);
                    put_u16(out, *name);
                }
                Constant::Unusable => {}
            }
        }
        Ok(())
    }

    /// Number of slots, including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> WorkspaceResult<&Constant> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Unusable) | None => Err(WorkspaceError::ClassFormat(format!(
                "invalid constant pool index {}",
                index
            ))),
            Some(constant) => Ok(constant),
        }
    }

    /// Replace a non-Utf8 entry in place.
    pub fn set(&mut self, index: u16, constant: Constant) -> WorkspaceResult<()> {
        let existing = self.get(index)?.clone();
        if matches!(existing, Constant::Utf8(_)) || existing.is_wide() != constant.is_wide() {
            return Err(WorkspaceError::ClassFormat(format!(
                "cannot replace constant {} with {:?}",
                index, constant
            )));
        }
        match existing {
            Constant::Class { name } if self.class_lookup.get(&name) == Some(&index) => {
                self.class_lookup.remove(&name);
            }
            Constant::NameAndType { name, descriptor }
                if self.name_and_type_lookup.get(&(name, descriptor)) == Some(&index) =>
            {
                self.name_and_type_lookup.remove(&(name, descriptor));
            }
            _ => {}
        }
        self.index(index, &constant);
        self.entries[usize::from(index)] = constant;
        Ok(())
    }

    /// Snapshot of every usable slot.
    pub fn indices(&self) -> Vec<u16> {
        (1..self.entries.len())
            .filter(|i| !matches!(self.entries[*i], Constant::Unusable))
            .map(|i| i as u16)
            .collect()
    }

    pub fn mstr(&self, index: u16) -> WorkspaceResult<&MStr> {
        match self.get(index)? {
            Constant::Utf8(raw) => Ok(raw),
            other => Err(WorkspaceError::ClassFormat(format!(
                "expected Utf8 at {}, found {:?}",
                index, other
            ))),
        }
    }

    pub fn utf8(&self, index: u16) -> WorkspaceResult<String> {
        text(self.mstr(index)?)
    }

    pub fn class_name(&self, index: u16) -> WorkspaceResult<String> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            other => Err(WorkspaceError::ClassFormat(format!(
                "expected Class at {}, found {:?}",
                index, other
            ))),
        }
    }

    /// `(name, descriptor)` of a NameAndType entry.
    pub fn name_and_type(&self, index: u16) -> WorkspaceResult<(String, String)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            other => Err(WorkspaceError::ClassFormat(format!(
                "expected NameAndType at {}, found {:?}",
                index, other
            ))),
        }
    }

    /// `(owner, name, descriptor)` of a field or method reference.
    pub fn member_ref(&self, index: u16) -> WorkspaceResult<(String, String, String)> {
        match self.get(index)? {
            Constant::Fieldref { class, name_and_type }
            | Constant::Methodref { class, name_and_type }
            | Constant::InterfaceMethodref { class, name_and_type } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.class_name(*class)?, name, descriptor))
            }
            other => Err(WorkspaceError::ClassFormat(format!(
                "expected member reference at {}, found {:?}",
                index, other
            ))),
        }
    }

    pub fn add(&mut self, constant: Constant) -> WorkspaceResult<u16> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        let index = u16::try_from(self.entries.len())
            .ok()
            .filter(|i| u32::from(*i) + slots <= u32::from(u16::MAX))
            .ok_or_else(|| WorkspaceError::ClassFormat("constant pool overflow".into()))?;
        self.index(index, &constant);
        self.entries.push(constant);
        if slots == 2 {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    pub fn intern_utf8(&mut self, value: &str) -> WorkspaceResult<u16> {
        let raw = MString::from(value);
        if let Some(index) = self.utf8_lookup.get(&raw) {
            return Ok(*index);
        }
        len_u16(raw.len(), "bytes in a Utf8 constant")?;
        self.add(Constant::Utf8(raw))
    }

    pub fn intern_class(&mut self, name: &str) -> WorkspaceResult<u16> {
        let name = self.intern_utf8(name)?;
        if let Some(index) = self.class_lookup.get(&name) {
            return Ok(*index);
        }
        self.add(Constant::Class { name })
    }

    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> WorkspaceResult<u16> {
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        if let Some(index) = self.name_and_type_lookup.get(&(name, descriptor)) {
            return Ok(*index);
        }
        self.add(Constant::NameAndType { name, descriptor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classfile::testing::ClassBuilder;
    use crate::core::classfile::ClassFile;

    #[test]
    fn wide_constants_take_two_slots() {
        let bytes = ClassBuilder::new("a/B").long_constant(7).string("x").build();
        let class = ClassFile::parse(&bytes).unwrap();
        let pool = &class.pool;

        let long = pool
            .indices()
            .into_iter()
            .find(|i| pool.get(*i).unwrap() == &Constant::Long(7))
            .unwrap();
        assert!(pool.get(long + 1).is_err());
        assert!(!pool.indices().contains(&(long + 1)));
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn interning_reuses_existing_entries() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_class("a/B").unwrap();
        let b = pool.intern_class("a/B").unwrap();
        assert_eq!(a, b);
        let nat = pool.intern_name_and_type("run", "()V").unwrap();
        assert_eq!(pool.intern_name_and_type("run", "()V").unwrap(), nat);
        assert_eq!(pool.name_and_type(nat).unwrap(), ("run".into(), "()V".into()));
        // "a/B" Utf8, Class, "run", "()V", NameAndType
        assert_eq!(pool.len(), 6);
    }

    #[test]
    fn utf8_entries_cannot_be_replaced() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.intern_utf8("x").unwrap();
        assert!(pool.set(utf8, Constant::Integer(1)).is_err());
    }

    #[test]
    fn field_handle_kinds() {
        assert!(is_field_kind(MethodKind::PutStatic));
        assert!(!is_field_kind(MethodKind::InvokeStatic));
        assert_eq!(method_kind_tag(MethodKind::InvokeInterface), 9);
    }
}
