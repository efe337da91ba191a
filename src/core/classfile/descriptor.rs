// Field/method descriptors and generic signatures, with class-name rewriting.

use std::str::FromStr;

use jdescriptor::{MethodDescriptor, TypeDescriptor};

use crate::core::error::{WorkspaceError, WorkspaceResult};

/// Rewrite every class name inside a field or method descriptor. Input that
/// does not parse is returned unchanged.
pub fn remap_descriptor(descriptor: &str, map: &mut dyn FnMut(&str) -> String) -> String {
    if !descriptor.contains('L') {
        return descriptor.to_string();
    }
    if descriptor.starts_with('(') {
        let Ok(method) = method_descriptor(descriptor) else {
            return descriptor.to_string();
        };
        let parameters = method
            .parameter_types()
            .iter()
            .map(|t| map_type(t, &mut *map))
            .collect();
        let return_type = map_type(method.return_type(), map);
        MethodDescriptor::new(parameters, return_type).to_string()
    } else {
        match field_type(descriptor) {
            Ok(field) => map_type(&field, map).to_string(),
            Err(_) => descriptor.to_string(),
        }
    }
}

fn map_type(ty: &TypeDescriptor, map: &mut dyn FnMut(&str) -> String) -> TypeDescriptor {
    match ty {
        TypeDescriptor::Object(name) => TypeDescriptor::Object(map(name)),
        TypeDescriptor::Array(element, dimensions) => TypeDescriptor::Array(Box::new(map_type(element, map)), *dimensions),
        primitive => primitive.clone(),
    }
}

/// Rewrite a class name that may be an array descriptor (as used by `Class` constants).
pub fn remap_internal_name(name: &str, map: &mut dyn FnMut(&str) -> String) -> String {
    if name.starts_with('[') {
        remap_descriptor(name, map)
    } else {
        map(name)
    }
}

/// Parse a method descriptor, rejecting trailing input.
pub fn method_descriptor(descriptor: &str) -> WorkspaceResult<MethodDescriptor> {
    let parsed = MethodDescriptor::from_str(descriptor).map_err(|e| malformed(descriptor, e))?;
    if parsed.to_string() != descriptor {
        return Err(malformed(descriptor, "trailing characters"));
    }
    Ok(parsed)
}

/// Parse a single field type, rejecting trailing input.
pub fn field_type(descriptor: &str) -> WorkspaceResult<TypeDescriptor> {
    let parsed = TypeDescriptor::from_str(descriptor).map_err(|e| malformed(descriptor, e))?;
    if parsed.to_string() != descriptor {
        return Err(malformed(descriptor, "trailing characters"));
    }
    Ok(parsed)
}

/// Internal name of the class a method returns, if it returns a plain class.
pub fn return_class(descriptor: &str) -> Option<String> {
    match method_descriptor(descriptor).ok()?.return_type() {
        TypeDescriptor::Object(name) => Some(name.clone()),
        _ => None,
    }
}

/// Local-variable slots taken by a value of this type.
pub fn slot_size(ty: &TypeDescriptor) -> u16 {
    match ty {
        TypeDescriptor::Long | TypeDescriptor::Double => 2,
        _ => 1,
    }
}

/// Starting slot of each argument, after the implicit `this` when not
/// static, and the first slot past the arguments.
pub fn parameter_layout(descriptor: &str, is_static: bool) -> WorkspaceResult<(Vec<u16>, u16)> {
    let method = method_descriptor(descriptor)?;
    let mut slot = if is_static { 0 } else { 1 };
    let mut slots = Vec::with_capacity(method.parameter_types().len());
    for parameter in method.parameter_types() {
        slots.push(slot);
        slot += slot_size(parameter);
    }
    Ok((slots, slot))
}

pub fn argument_slots(descriptor: &str, is_static: bool) -> WorkspaceResult<Vec<u16>> {
    Ok(parameter_layout(descriptor, is_static)?.0)
}

fn malformed(descriptor: &str, reason: impl std::fmt::Display) -> WorkspaceError {
    WorkspaceError::ClassFormat(format!("malformed descriptor {}: {}", descriptor, reason))
}

/// Rewrite class names inside a class, method or field generic signature.
pub fn remap_signature(
    signature: &str,
    map: &mut dyn FnMut(&str) -> String,
) -> WorkspaceResult<String> {
    let mut remapper = SignatureRemapper {
        input: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map,
    };
    remapper.signature()?;
    Ok(remapper.out)
}

struct SignatureRemapper<'a, 'm> {
    input: &'a str,
    pos: usize,
    out: String,
    map: &'m mut dyn FnMut(&str) -> String,
}

impl SignatureRemapper<'_, '_> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn copy(&mut self) -> WorkspaceResult<u8> {
        let c = self.peek().ok_or_else(|| self.error())?;
        self.out.push(c as char);
        self.pos += 1;
        Ok(c)
    }

    fn error(&self) -> WorkspaceError {
        WorkspaceError::ClassFormat(format!(
            "malformed signature {} at offset {}",
            self.input, self.pos
        ))
    }

    /// Read up to, not including, one of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> WorkspaceResult<&str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                return Ok(&self.input[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(self.error())
    }

    fn signature(&mut self) -> WorkspaceResult<()> {
        if self.peek() == Some(b'<') {
            self.formal_type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.copy()?;
            while self.peek() != Some(b')') {
                self.type_signature()?;
            }
            self.copy()?;
            self.type_signature()?;
            while self.peek() == Some(b'^') {
                self.copy()?;
                self.type_signature()?;
            }
        } else {
            while self.peek().is_some() {
                self.type_signature()?;
            }
        }
        if self.pos != self.input.len() {
            return Err(self.error());
        }
        Ok(())
    }

    fn formal_type_parameters(&mut self) -> WorkspaceResult<()> {
        self.copy()?;
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":")?.to_string();
            self.out.push_str(&name);
            // class bound, possibly empty
            self.copy()?;
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.type_signature()?;
            }
            while self.peek() == Some(b':') {
                self.copy()?;
                self.type_signature()?;
            }
        }
        self.copy()?;
        Ok(())
    }

    fn type_signature(&mut self) -> WorkspaceResult<()> {
        match self.copy()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => Ok(()),
            b'[' => self.type_signature(),
            b'T' => {
                let name = self.identifier(b";")?.to_string();
                self.out.push_str(&name);
                self.copy()?;
                Ok(())
            }
            b'L' => self.class_type(),
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> WorkspaceResult<()> {
        let mut original = self.identifier(b"<.;")?.to_string();
        let mut mapped = (self.map)(&original);
        self.out.push_str(&mapped);
        loop {
            match self.peek() {
                Some(b'<') => self.type_arguments()?,
                Some(b'.') => {
                    self.copy()?;
                    let inner = self.identifier(b"<.;")?.to_string();
                    let inner_original = format!("{}${}", original, inner);
                    let inner_mapped = (self.map)(&inner_original);
                    let simple = inner_mapped
                        .strip_prefix(&format!("{}$", mapped))
                        .or_else(|| inner_mapped.rsplit_once('$').map(|(_, s)| s))
                        .unwrap_or(&inner_mapped)
                        .to_string();
                    self.out.push_str(&simple);
                    original = inner_original;
                    mapped = inner_mapped;
                }
                Some(b';') => {
                    self.copy()?;
                    return Ok(());
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn type_arguments(&mut self) -> WorkspaceResult<()> {
        self.copy()?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => {
                    self.copy()?;
                }
                Some(b'+') | Some(b'-') => {
                    self.copy()?;
                    self.type_signature()?;
                }
                Some(_) => self.type_signature()?,
                None => return Err(self.error()),
            }
        }
        self.copy()?;
        Ok(())
    }
}
