// Tiny v1 and v2: several namespaces per file, the caller picks a pair.
// Descriptors are always written in the first namespace.

use indexmap::IndexMap;

use super::{MappingSet, MappingSetBuilder};
use crate::core::classfile::descriptor::remap_descriptor;
use crate::core::error::{WorkspaceError, WorkspaceResult};

const FORMAT: &str = "tiny";

fn error(line: usize, message: impl Into<String>) -> WorkspaceError {
    WorkspaceError::Mappings {
        format: FORMAT,
        message: format!("line {}: {}", line, message.into()),
    }
}

#[derive(Debug, Default)]
struct Member {
    descriptor: String,
    names: Vec<String>,
    javadoc: Option<String>,
    parameters: Vec<(u16, Vec<String>)>,
}

#[derive(Debug, Default)]
struct Class {
    names: Vec<String>,
    javadoc: Option<String>,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

/// A parsed file, not yet projected onto a namespace pair.
#[derive(Debug, Default)]
pub struct TinyFile {
    namespaces: Vec<String>,
    classes: IndexMap<String, Class>,
}

fn names(columns: &[&str], escaped: bool) -> Vec<String> {
    columns
        .iter()
        .map(|c| if escaped { unescape(c) } else { c.to_string() })
        .collect()
}

/// Name in namespace `index`, falling back to the first namespace when the
/// column is absent or empty.
fn name_in(names: &[String], index: usize) -> &str {
    names
        .get(index)
        .filter(|n| !n.is_empty())
        .or_else(|| names.first())
        .map(String::as_str)
        .unwrap_or("")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl TinyFile {
    pub fn parse(text: &str) -> WorkspaceResult<Self> {
        let first = text.lines().next().unwrap_or("");
        if first.starts_with("tiny\t2\t") {
            Self::parse_v2(text)
        } else if first.starts_with("v1\t") {
            Self::parse_v1(text)
        } else {
            Err(error(1, "missing 'v1' or 'tiny\\t2' header"))
        }
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    fn parse_v1(text: &str) -> WorkspaceResult<Self> {
        let mut lines = text.lines().enumerate();
        let mut file = TinyFile::default();
        if let Some((_, header)) = lines.next() {
            file.namespaces = header.split('\t').skip(1).map(str::to_string).collect();
        }
        let width = file.namespaces.len();

        for (number, line) in lines {
            let number = number + 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            match columns.as_slice() {
                ["CLASS", rest @ ..] if rest.len() == width => {
                    let class = file.class_entry(rest[0]);
                    class.names = names(rest, false);
                }
                [kind @ ("FIELD" | "METHOD"), owner, descriptor, rest @ ..] if rest.len() == width => {
                    let member = Member {
                        descriptor: descriptor.to_string(),
                        names: names(rest, false),
                        ..Member::default()
                    };
                    let class = file.class_entry(owner);
                    if *kind == "FIELD" {
                        class.fields.push(member);
                    } else {
                        class.methods.push(member);
                    }
                }
                _ => return Err(error(number, format!("unrecognised line '{}'", line))),
            }
        }
        Ok(file)
    }

    fn parse_v2(text: &str) -> WorkspaceResult<Self> {
        let mut lines = text.lines().enumerate().peekable();
        let mut file = TinyFile::default();
        if let Some((_, header)) = lines.next() {
            // tiny 2 <minor> <namespaces...>
            file.namespaces = header.split('\t').skip(3).map(str::to_string).collect();
        }
        let width = file.namespaces.len();

        let mut escaped = false;
        while let Some((_, property)) = lines.next_if(|(_, l)| l.starts_with('\t') && !l.starts_with("\t\t")) {
            if property.trim() == "escaped-names" {
                escaped = true;
            }
        }

        let mut class: Option<String> = None;
        // (is_method, index) of the member the current depth-2 lines belong to
        let mut member: Option<(bool, usize)> = None;

        for (number, line) in lines {
            let number = number + 1;
            if line.trim().is_empty() {
                continue;
            }
            let depth = line.chars().take_while(|c| *c == '\t').count();
            let columns: Vec<&str> = line[depth..].split('\t').collect();
            match (depth, columns.as_slice()) {
                (0, ["c", rest @ ..]) if rest.len() == width => {
                    let names = names(rest, escaped);
                    let key = names[0].clone();
                    file.class_entry(&key).names = names;
                    class = Some(key);
                    member = None;
                }
                (1, [kind @ ("f" | "m"), descriptor, rest @ ..]) if rest.len() == width => {
                    let owner = class.as_deref().ok_or_else(|| error(number, "member outside of a class"))?;
                    let entry = Member {
                        descriptor: descriptor.to_string(),
                        names: names(rest, escaped),
                        ..Member::default()
                    };
                    let target = file.class_entry(owner);
                    if *kind == "f" {
                        target.fields.push(entry);
                        member = Some((false, target.fields.len() - 1));
                    } else {
                        target.methods.push(entry);
                        member = Some((true, target.methods.len() - 1));
                    }
                }
                (1, ["c", comment]) => {
                    let owner = class.as_deref().ok_or_else(|| error(number, "comment outside of a class"))?;
                    file.class_entry(owner).javadoc = Some(unescape(comment));
                    member = None;
                }
                (2, ["c", comment]) => {
                    let target = file.member_entry(class.as_deref(), member, number)?;
                    target.javadoc = Some(unescape(comment));
                }
                (2, ["p", index, rest @ ..]) if rest.len() == width => {
                    let slot: u16 = index
                        .parse()
                        .map_err(|_| error(number, format!("bad parameter index '{}'", index)))?;
                    let target = file.member_entry(class.as_deref(), member, number)?;
                    target.parameters.push((slot, names(rest, escaped)));
                }
                // local variables and their comments are not tracked
                (2, ["v", ..]) | (3, ..) => {}
                _ => return Err(error(number, format!("unrecognised line '{}'", line.trim()))),
            }
        }
        Ok(file)
    }

    fn class_entry(&mut self, name: &str) -> &mut Class {
        let width = self.namespaces.len().max(1);
        self.classes.entry(name.to_string()).or_insert_with(|| Class {
            names: vec![name.to_string(); width],
            ..Class::default()
        })
    }

    fn member_entry(
        &mut self,
        class: Option<&str>,
        member: Option<(bool, usize)>,
        number: usize,
    ) -> WorkspaceResult<&mut Member> {
        let (Some(owner), Some((is_method, index))) = (class, member) else {
            return Err(error(number, "member detail outside of a member"));
        };
        let class = self
            .classes
            .get_mut(owner)
            .ok_or_else(|| error(number, "member detail outside of a class"))?;
        let members = if is_method { &mut class.methods } else { &mut class.fields };
        members
            .get_mut(index)
            .ok_or_else(|| error(number, "member detail outside of a member"))
    }

    fn namespace_index(&self, namespace: &str) -> WorkspaceResult<usize> {
        self.namespaces
            .iter()
            .position(|n| n == namespace)
            .ok_or_else(|| WorkspaceError::Mappings {
                format: FORMAT,
                message: format!(
                    "unknown namespace '{}' (available: {})",
                    namespace,
                    self.namespaces.join(", ")
                ),
            })
    }

    /// Project onto `from` -> `to`.
    pub fn to_mapping_set(&self, from: &str, to: &str) -> WorkspaceResult<MappingSet> {
        let source = self.namespace_index(from)?;
        let target = self.namespace_index(to)?;

        // descriptors are in the first namespace
        let to_source: std::collections::HashMap<&str, &str> = self
            .classes
            .iter()
            .map(|(key, class)| (key.as_str(), name_in(&class.names, source)))
            .collect();
        let source_descriptor = |descriptor: &str| {
            if source == 0 {
                return descriptor.to_string();
            }
            remap_descriptor(descriptor, &mut |name| {
                to_source.get(name).map(|n| n.to_string()).unwrap_or_else(|| name.to_string())
            })
        };

        let mut builder = MappingSetBuilder::default();
        for class in self.classes.values() {
            let owner = name_in(&class.names, source);
            let class_mapping = builder.class(owner, name_in(&class.names, target));
            class_mapping.javadoc = class.javadoc.clone();

            for field in &class.fields {
                let name = name_in(&field.names, source);
                let descriptor = source_descriptor(&field.descriptor);
                builder.add_field(owner, name, Some(&descriptor), name_in(&field.names, target));
                if let Some(doc) = &field.javadoc {
                    builder.set_field_javadoc(owner, name, Some(&descriptor), doc);
                }
            }
            for method in &class.methods {
                let name = name_in(&method.names, source);
                let descriptor = source_descriptor(&method.descriptor);
                builder.add_method(owner, name, &descriptor, name_in(&method.names, target));
                if let Some(doc) = &method.javadoc {
                    builder.set_method_javadoc(owner, name, &descriptor, doc);
                }
                for (slot, names) in &method.parameters {
                    if let Some(parameter) = names.get(target).filter(|n| !n.is_empty()) {
                        builder.add_parameter(owner, name, &descriptor, *slot, parameter);
                    }
                }
            }
        }
        Ok(builder.build())
    }
}

pub fn read(text: &str, from: &str, to: &str) -> WorkspaceResult<MappingSet> {
    TinyFile::parse(text)?.to_mapping_set(from, to)
}
