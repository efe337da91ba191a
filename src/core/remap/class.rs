use noak::reader::attributes as typed;
use noak::reader::cpool::ConstantPool as SourcePool;

use super::Remapper;
use crate::core::classfile::attributes::{
    self, AnnotationRef, BootstrapMethod, CodeAttribute, InnerClass, RecordComponent, SourceAttributes,
};
use crate::core::classfile::constant_pool::is_field_kind;
use crate::core::classfile::descriptor::{self, remap_internal_name, remap_signature};
use crate::core::classfile::{
    read_attributes, AccessFlags, Attribute, ClassFile, ClassSource, Constant, ConstantPool, Member,
};
use crate::core::error::{WorkspaceError, WorkspaceResult};

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

/// Rewrites one class. Structure is read from `source`, names from a
/// snapshot of the original pool; new names are interned into the class's
/// own pool.
struct ClassRemapper<'r, 'a> {
    remapper: &'r dyn Remapper,
    source: &'r SourcePool<'a>,
    original: ConstantPool,
    owner: String,
}

/// Remap every naming-dependent part of `class`, freshly read from `source`,
/// through `remapper`.
pub fn remap_class(source: &ClassSource<'_>, class: &mut ClassFile, remapper: &dyn Remapper) -> WorkspaceResult<()> {
    let pool = source.pool();
    let context = ClassRemapper {
        remapper,
        source: pool,
        original: class.pool.clone(),
        owner: class.name()?,
    };
    let bootstrap_methods = match attributes::find(pool, &source.attributes(), attributes::BOOTSTRAP_METHODS)? {
        Some((_, attribute)) => {
            let table: typed::BootstrapMethods = attributes::read(pool, &attribute)?;
            attributes::bootstrap_methods(&table)?
        }
        None => Vec::new(),
    };

    context.remap_pool(&mut class.pool, &bootstrap_methods)?;

    for (field, read) in class.fields.iter_mut().zip(source.fields().iter()) {
        context.remap_field(&mut class.pool, field, &read?.attributes())?;
    }
    for (method, read) in class.methods.iter_mut().zip(source.methods().iter()) {
        context.remap_method(&mut class.pool, method, &read?.attributes())?;
    }
    context.remap_class_attributes(&mut class.pool, &mut class.attributes, &source.attributes())
}

fn internal_name_of(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('L').and_then(|d| d.strip_suffix(';'))
}

impl ClassRemapper<'_, '_> {
    fn map_descriptor(&self, descriptor: &str) -> String {
        self.remapper.map_descriptor(descriptor)
    }

    fn map_signature(&self, signature: &str) -> WorkspaceResult<String> {
        remap_signature(signature, &mut |name| self.remapper.map_type(name))
    }

    /// Intern `new` unless it equals the text at `index`.
    fn repoint(pool: &mut ConstantPool, index: u16, new: &str) -> WorkspaceResult<u16> {
        if pool.utf8(index)? == new {
            return Ok(index);
        }
        pool.intern_utf8(new)
    }

    // ── Constant pool ───────────────────────────────────

    fn remap_pool(&self, pool: &mut ConstantPool, bootstrap_methods: &[BootstrapMethod]) -> WorkspaceResult<()> {
        for index in self.original.indices() {
            match self.original.get(index)?.clone() {
                Constant::Class { name } => {
                    let old = self.original.utf8(name)?;
                    let new = remap_internal_name(&old, &mut |n| self.remapper.map_type(n));
                    if new != old {
                        let name = pool.intern_utf8(&new)?;
                        pool.set(index, Constant::Class { name })?;
                    }
                }
                Constant::Fieldref { class, .. } => {
                    let (owner, name, desc) = self.original.member_ref(index)?;
                    let new_name = self.remapper.map_field(&owner, &name, &desc).unwrap_or(name);
                    let name_and_type = pool.intern_name_and_type(&new_name, &self.map_descriptor(&desc))?;
                    pool.set(index, Constant::Fieldref { class, name_and_type })?;
                }
                Constant::Methodref { class, .. } => {
                    let name_and_type = self.remap_method_ref(pool, index)?;
                    pool.set(index, Constant::Methodref { class, name_and_type })?;
                }
                Constant::InterfaceMethodref { class, .. } => {
                    let name_and_type = self.remap_method_ref(pool, index)?;
                    pool.set(index, Constant::InterfaceMethodref { class, name_and_type })?;
                }
                Constant::MethodType { descriptor } => {
                    let old = self.original.utf8(descriptor)?;
                    let descriptor = Self::repoint(pool, descriptor, &self.map_descriptor(&old))?;
                    pool.set(index, Constant::MethodType { descriptor })?;
                }
                Constant::MethodHandle { kind, reference } => {
                    let is_field = matches!(self.original.get(reference)?, Constant::Fieldref { .. });
                    if is_field_kind(kind) != is_field {
                        return Err(WorkspaceError::ClassFormat(format!(
                            "method handle {} of kind {:?} references {:?}",
                            index,
                            kind,
                            self.original.get(reference)?
                        )));
                    }
                }
                Constant::InvokeDynamic { bootstrap, name_and_type } => {
                    let (name, desc) = self.original.name_and_type(name_and_type)?;
                    let new_name = self
                        .lambda_interface_method(bootstrap_methods, bootstrap, &name, &desc)?
                        .unwrap_or(name);
                    let name_and_type = pool.intern_name_and_type(&new_name, &self.map_descriptor(&desc))?;
                    pool.set(index, Constant::InvokeDynamic { bootstrap, name_and_type })?;
                }
                Constant::Dynamic { bootstrap, name_and_type } => {
                    let (name, desc) = self.original.name_and_type(name_and_type)?;
                    let name_and_type = pool.intern_name_and_type(&name, &self.map_descriptor(&desc))?;
                    pool.set(index, Constant::Dynamic { bootstrap, name_and_type })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn remap_method_ref(&self, pool: &mut ConstantPool, index: u16) -> WorkspaceResult<u16> {
        let (owner, name, desc) = self.original.member_ref(index)?;
        let new_name = self.remapper.map_method(&owner, &name, &desc).unwrap_or(name);
        pool.intern_name_and_type(&new_name, &self.map_descriptor(&desc))
    }

    /// For `LambdaMetafactory` call sites the name is the implemented
    /// interface method, which must be renamed like that method.
    fn lambda_interface_method(
        &self,
        bootstrap_methods: &[BootstrapMethod],
        bootstrap: u16,
        name: &str,
        desc: &str,
    ) -> WorkspaceResult<Option<String>> {
        let method = bootstrap_methods.get(usize::from(bootstrap)).ok_or_else(|| {
            WorkspaceError::ClassFormat(format!("missing bootstrap method {}", bootstrap))
        })?;
        let Constant::MethodHandle { reference, .. } = self.original.get(method.method_handle)? else {
            return Err(WorkspaceError::ClassFormat("bootstrap method is not a method handle".into()));
        };
        let (factory, _, _) = self.original.member_ref(*reference)?;
        if factory != LAMBDA_METAFACTORY {
            return Ok(None);
        }
        let Some(Constant::MethodType { descriptor }) = method
            .arguments
            .first()
            .map(|a| self.original.get(*a))
            .transpose()?
        else {
            return Ok(None);
        };
        let interface_method_desc = self.original.utf8(*descriptor)?;
        let Some(interface) = descriptor::return_class(desc) else {
            return Ok(None);
        };
        Ok(self.remapper.map_method(&interface, name, &interface_method_desc))
    }

    // ── Members ─────────────────────────────────────────

    fn remap_field(&self, pool: &mut ConstantPool, field: &mut Member, read: &SourceAttributes<'_>) -> WorkspaceResult<()> {
        let name = pool.utf8(field.name)?;
        let desc = pool.utf8(field.descriptor)?;
        if let Some(new_name) = self.remapper.map_field(&self.owner, &name, &desc) {
            field.name = pool.intern_utf8(&new_name)?;
        }
        field.descriptor = Self::repoint(pool, field.descriptor, &self.map_descriptor(&desc))?;
        self.remap_common_attributes(pool, &mut field.attributes, read)
    }

    fn remap_method(&self, pool: &mut ConstantPool, method: &mut Member, read: &SourceAttributes<'_>) -> WorkspaceResult<()> {
        let name = pool.utf8(method.name)?;
        let desc = pool.utf8(method.descriptor)?;
        if let Some(new_name) = self.remapper.map_method(&self.owner, &name, &desc) {
            method.name = pool.intern_utf8(&new_name)?;
        }
        method.descriptor = Self::repoint(pool, method.descriptor, &self.map_descriptor(&desc))?;

        let is_static = method.access.contains(AccessFlags::STATIC);
        for (attribute, source) in method.attributes.iter_mut().zip(read.iter()) {
            let source = source?;
            match attributes::name_of(self.source, &source)?.as_str() {
                attributes::CODE => {
                    let (mut code, body) = CodeAttribute::read(self.source, &source)?;
                    self.remap_code(pool, &mut code, &body.attributes(), &name, &desc)?;
                    attribute.info = code.to_bytes()?;
                }
                attributes::METHOD_PARAMETERS => {
                    let table: typed::MethodParameters = attributes::read(self.source, &source)?;
                    let mut parameters = attributes::method_parameters(&table)?;
                    let (slots, _) = descriptor::parameter_layout(&desc, is_static)?;
                    for (parameter, slot) in parameters.iter_mut().zip(slots) {
                        if let Some(named) = self.remapper.parameter_name(&self.owner, &name, &desc, slot) {
                            parameter.name = Some(pool.intern_utf8(&named)?);
                        }
                    }
                    attribute.info = attributes::write_method_parameters(&parameters)?;
                }
                _ => {}
            }
        }
        self.remap_common_attributes(pool, &mut method.attributes, read)
    }

    fn remap_code(
        &self,
        pool: &mut ConstantPool,
        code: &mut CodeAttribute,
        read: &SourceAttributes<'_>,
        method: &str,
        method_desc: &str,
    ) -> WorkspaceResult<()> {
        let mut renamed: Vec<((u16, u16), u16)> = Vec::new();
        // the type table reuses names chosen for the plain table
        for is_type_table in [false, true] {
            for (attribute, source) in code.attributes.iter_mut().zip(read.iter()) {
                let source = source?;
                let kind = attributes::name_of(self.source, &source)?;
                let mut locals = match kind.as_str() {
                    attributes::LOCAL_VARIABLE_TABLE if !is_type_table => {
                        attributes::local_variables(&attributes::read(self.source, &source)?)?
                    }
                    attributes::LOCAL_VARIABLE_TYPE_TABLE if is_type_table => {
                        attributes::local_variable_types(&attributes::read(self.source, &source)?)?
                    }
                    _ => continue,
                };
                for local in &mut locals {
                    if is_type_table {
                        if let Some((_, name)) = renamed.iter().find(|(key, _)| *key == (local.index, local.start_pc)) {
                            local.name = *name;
                        }
                    } else if local.start_pc == 0 {
                        // only the row covering the whole method is the parameter itself
                        let named = self.remapper.parameter_name(&self.owner, method, method_desc, local.index);
                        if let Some(named) = named {
                            local.name = pool.intern_utf8(&named)?;
                            renamed.push(((local.index, local.start_pc), local.name));
                        }
                    }
                    let old = pool.utf8(local.descriptor)?;
                    let new = if is_type_table {
                        self.map_signature(&old)?
                    } else {
                        self.map_descriptor(&old)
                    };
                    local.descriptor = Self::repoint(pool, local.descriptor, &new)?;
                }
                attribute.info = attributes::write_local_variables(&locals)?;
            }
        }
        self.remap_common_attributes(pool, &mut code.attributes, read)
    }

    // ── Attributes ──────────────────────────────────────

    /// Signature and annotation attributes, wherever they appear.
    fn remap_common_attributes(
        &self,
        pool: &mut ConstantPool,
        list: &mut [Attribute],
        read: &SourceAttributes<'_>,
    ) -> WorkspaceResult<()> {
        for (attribute, source) in list.iter_mut().zip(read.iter()) {
            let source = source?;
            let kind = attributes::name_of(self.source, &source)?;
            if kind == attributes::SIGNATURE {
                let signature: typed::Signature = attributes::read(self.source, &source)?;
                let index = signature.signature().as_u16();
                let old = self.original.utf8(index)?;
                let new = Self::repoint(pool, index, &self.map_signature(&old)?)?;
                attribute.info = attributes::index_info(new);
            } else if let Some(info) =
                attributes::rewrite_annotations(self.source, &source, &mut |r| self.annotation_ref(pool, r))?
            {
                attribute.info = info;
            }
        }
        Ok(())
    }

    fn annotation_ref(&self, pool: &mut ConstantPool, reference: AnnotationRef) -> WorkspaceResult<u16> {
        match reference {
            AnnotationRef::Type(index) | AnnotationRef::ClassValue(index) => {
                let old = pool.utf8(index)?;
                Self::repoint(pool, index, &self.map_descriptor(&old))
            }
            AnnotationRef::Element { annotation_type, name } => {
                let annotation = pool.utf8(annotation_type)?;
                let old = pool.utf8(name)?;
                let new = internal_name_of(&annotation)
                    .and_then(|owner| self.remapper.map_annotation_element(owner, &old));
                match new {
                    Some(new) => pool.intern_utf8(&new),
                    None => Ok(name),
                }
            }
            AnnotationRef::EnumConstant { enum_type, name } => {
                let enum_desc = pool.utf8(enum_type)?;
                let old = pool.utf8(name)?;
                let new = internal_name_of(&enum_desc)
                    .and_then(|owner| self.remapper.map_field(owner, &old, &enum_desc));
                match new {
                    Some(new) => pool.intern_utf8(&new),
                    None => Ok(name),
                }
            }
        }
    }

    fn remap_class_attributes(
        &self,
        pool: &mut ConstantPool,
        list: &mut [Attribute],
        read: &SourceAttributes<'_>,
    ) -> WorkspaceResult<()> {
        for (attribute, source) in list.iter_mut().zip(read.iter()) {
            let source = source?;
            match attributes::name_of(self.source, &source)?.as_str() {
                attributes::INNER_CLASSES => {
                    let table: typed::InnerClasses = attributes::read(self.source, &source)?;
                    let mut classes = attributes::inner_classes(&table)?;
                    for entry in &mut classes {
                        self.remap_inner_class(pool, entry)?;
                    }
                    attribute.info = attributes::write_inner_classes(&classes)?;
                }
                attributes::ENCLOSING_METHOD => {
                    let enclosing: typed::EnclosingMethod = attributes::read(self.source, &source)?;
                    if let Some(method) = enclosing.method() {
                        let class = enclosing.class().as_u16();
                        let owner = self.original.class_name(class)?;
                        let (name, desc) = self.original.name_and_type(method.as_u16())?;
                        let new_name = self.remapper.map_method(&owner, &name, &desc).unwrap_or(name);
                        let method = pool.intern_name_and_type(&new_name, &self.map_descriptor(&desc))?;
                        attribute.info = attributes::write_enclosing_method(class, Some(method));
                    }
                }
                attributes::RECORD => {
                    let record: typed::Record = attributes::read(self.source, &source)?;
                    let mut components = Vec::new();
                    for component in record.components().iter() {
                        let component = component?;
                        let name = pool.utf8(component.name().as_u16())?;
                        let desc = pool.utf8(component.descriptor().as_u16())?;
                        let mut remapped = RecordComponent {
                            name: component.name().as_u16(),
                            descriptor: component.descriptor().as_u16(),
                            attributes: read_attributes(component.attributes())?,
                        };
                        if let Some(new_name) = self.remapper.map_field(&self.owner, &name, &desc) {
                            remapped.name = pool.intern_utf8(&new_name)?;
                        }
                        remapped.descriptor = Self::repoint(pool, remapped.descriptor, &self.map_descriptor(&desc))?;
                        self.remap_common_attributes(pool, &mut remapped.attributes, &component.attributes())?;
                        components.push(remapped);
                    }
                    attribute.info = attributes::write_record(&components)?;
                }
                _ => {}
            }
        }
        self.remap_common_attributes(pool, list, read)
    }

    /// The simple name of a named inner class follows its new binary name.
    fn remap_inner_class(&self, pool: &mut ConstantPool, entry: &mut InnerClass) -> WorkspaceResult<()> {
        let Some(simple_name) = entry.name else {
            return Ok(());
        };
        let old_inner = self.original.class_name(entry.inner)?;
        let new_inner = pool.class_name(entry.inner)?;
        if old_inner == new_inner {
            return Ok(());
        }
        let from_outer = match entry.outer {
            None => None,
            Some(outer) => {
                let prefix = format!("{}$", pool.class_name(outer)?);
                new_inner.strip_prefix(&prefix).map(str::to_string)
            }
        };
        let simple = from_outer.unwrap_or_else(|| {
            let tail = new_inner.rsplit('$').next().unwrap_or(&new_inner);
            tail.trim_start_matches(|c: char| c.is_ascii_digit()).to_string()
        });
        if !simple.is_empty() {
            entry.name = Some(Self::repoint(pool, simple_name, &simple)?);
        }
        Ok(())
    }
}
