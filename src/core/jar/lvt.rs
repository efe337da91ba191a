use std::collections::HashSet;

use super::{EntryKind, EntryTransformer, JarEntry};
use noak::reader::attributes as typed;
use noak::reader::Method;

use crate::core::classfile::attributes::{self, CodeAttribute, LocalVariable, MethodParameter};
use crate::core::classfile::{descriptor, open, AccessFlags, ClassFile, ClassSource};
use crate::core::error::WorkspaceResult;

/// Replaces local variable and parameter names that are not valid Java
/// identifiers (obfuscators emit `☃` for every local) with `this`,
/// `param<n>` and `var<n>`.
pub struct LocalVariableNameFixer;

pub fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Picks names for one method, never handing out a name twice.
struct MethodScope {
    taken: HashSet<String>,
    is_static: bool,
    parameter_slots: Vec<u16>,
    parameters_end: u16,
    next_local: usize,
}

impl MethodScope {
    fn new(descriptor: &str, is_static: bool, existing: impl Iterator<Item = String>) -> Self {
        let (parameter_slots, parameters_end) = descriptor::parameter_layout(descriptor, is_static)
            .unwrap_or_else(|_| (Vec::new(), u16::from(!is_static)));
        Self {
            taken: existing.filter(|n| is_java_identifier(n)).collect(),
            is_static,
            parameter_slots,
            parameters_end,
            next_local: 0,
        }
    }

    fn name_for_slot(&mut self, slot: u16) -> String {
        let base = if slot == 0 && !self.is_static {
            return "this".to_string();
        } else if slot < self.parameters_end {
            let position = self
                .parameter_slots
                .iter()
                .rposition(|s| *s <= slot)
                .unwrap_or(0);
            format!("param{}", position)
        } else {
            let local = self.next_local;
            self.next_local += 1;
            format!("var{}", local)
        };
        self.unique(base)
    }

    fn name_for_parameter(&mut self, position: usize) -> String {
        self.unique(format!("param{}", position))
    }

    fn unique(&mut self, mut name: String) -> String {
        while self.taken.contains(&name) {
            name.push('x');
        }
        self.taken.insert(name.clone());
        name
    }
}

fn fix_method(source: &ClassSource<'_>, read: &Method<'_>, class: &mut ClassFile, method_index: usize) -> WorkspaceResult<bool> {
    let pool = source.pool();
    let desc = class.pool.utf8(read.descriptor().as_u16())?;
    let is_static = read.access_flags().contains(AccessFlags::STATIC);
    let code = attributes::find(pool, &read.attributes(), attributes::CODE)?;
    let params = attributes::find(pool, &read.attributes(), attributes::METHOD_PARAMETERS)?;

    let mut body = match &code {
        Some((position, attribute)) => Some((*position, CodeAttribute::read(pool, attribute)?)),
        None => None,
    };
    let (lvt, lvtt) = match &body {
        Some((_, (_, typed_code))) => (
            attributes::find(pool, &typed_code.attributes(), attributes::LOCAL_VARIABLE_TABLE)?,
            attributes::find(pool, &typed_code.attributes(), attributes::LOCAL_VARIABLE_TYPE_TABLE)?,
        ),
        None => (None, None),
    };
    let mut locals: Vec<LocalVariable> = match &lvt {
        Some((_, attribute)) => {
            let table: typed::LocalVariableTable = attributes::read(pool, attribute)?;
            attributes::local_variables(&table)?
        }
        None => Vec::new(),
    };
    let mut parameters: Vec<MethodParameter> = match &params {
        Some((_, attribute)) => {
            let table: typed::MethodParameters = attributes::read(pool, attribute)?;
            attributes::method_parameters(&table)?
        }
        None => Vec::new(),
    };

    let existing: Vec<String> = locals
        .iter()
        .map(|v| v.name)
        .chain(parameters.iter().filter_map(|p| p.name))
        .map(|n| class.pool.utf8(n))
        .collect::<WorkspaceResult<_>>()?;
    let mut scope = MethodScope::new(&desc, is_static, existing.into_iter());

    // (slot, start_pc) -> new name, shared with the type table
    let mut renamed: Vec<((u16, u16), u16)> = Vec::new();
    for local in &mut locals {
        if is_java_identifier(&class.pool.utf8(local.name)?) {
            continue;
        }
        let name = scope.name_for_slot(local.index);
        local.name = class.pool.intern_utf8(&name)?;
        renamed.push(((local.index, local.start_pc), local.name));
    }
    let mut parameters_changed = false;
    for (position, parameter) in parameters.iter_mut().enumerate() {
        let Some(current) = parameter.name else {
            continue;
        };
        if !is_java_identifier(&class.pool.utf8(current)?) {
            let name = scope.name_for_parameter(position);
            parameter.name = Some(class.pool.intern_utf8(&name)?);
            parameters_changed = true;
        }
    }

    if renamed.is_empty() && !parameters_changed {
        return Ok(false);
    }

    if let Some((code_position, (code, _))) = body.as_mut() {
        if let Some((position, _)) = &lvt {
            code.attributes[*position].info = attributes::write_local_variables(&locals)?;
        }
        if let Some((position, attribute)) = &lvtt {
            let table: typed::LocalVariableTypeTable = attributes::read(pool, attribute)?;
            let mut types = attributes::local_variable_types(&table)?;
            for row in &mut types {
                if let Some((_, name)) = renamed.iter().find(|(key, _)| *key == (row.index, row.start_pc)) {
                    row.name = *name;
                }
            }
            code.attributes[*position].info = attributes::write_local_variables(&types)?;
        }
        class.methods[method_index].attributes[*code_position].info = code.to_bytes()?;
    }
    if let (true, Some((position, _))) = (parameters_changed, &params) {
        class.methods[method_index].attributes[*position].info = attributes::write_method_parameters(&parameters)?;
    }
    Ok(true)
}

/// Rename invalid local and parameter names in every method of `class`,
/// freshly read from `source`.
pub fn fix_local_variables(source: &ClassSource<'_>, class: &mut ClassFile) -> WorkspaceResult<bool> {
    let mut changed = false;
    for (index, method) in source.methods().iter().enumerate() {
        changed |= fix_method(source, &method?, class, index)?;
    }
    Ok(changed)
}

impl EntryTransformer for LocalVariableNameFixer {
    fn name(&self) -> &'static str {
        "fix-lvt-names"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        if entry.kind != EntryKind::Class {
            return Ok(Some(entry));
        }
        let source = open(&entry.data)?;
        let mut class = ClassFile::read(&source)?;
        if !fix_local_variables(&source, &mut class)? {
            return Ok(Some(entry));
        }
        let data = class.to_bytes()?;
        Ok(Some(entry.with_data(data)))
    }
}
