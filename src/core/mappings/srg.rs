// The SRG family: SRG, CSRG and TSRG (v1 and v2). All map obfuscated -> named.

use super::{MappingSet, MappingSetBuilder};
use crate::core::error::{WorkspaceError, WorkspaceResult};

fn error(format: &'static str, line: usize, message: impl Into<String>) -> WorkspaceError {
    WorkspaceError::Mappings {
        format,
        message: format!("line {}: {}", line, message.into()),
    }
}

/// `owner/name` -> (`owner`, `name`).
fn split_member(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
}

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").trim_end()))
        .filter(|(_, l)| !l.trim().is_empty())
}

pub fn read_srg(text: &str) -> WorkspaceResult<MappingSet> {
    const FORMAT: &str = "srg";
    let mut builder = MappingSetBuilder::default();
    for (number, line) in content_lines(text) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["PK:", ..] => {}
            ["CL:", obf, named] => {
                builder.add_class(obf, named);
            }
            ["FD:", obf, named] | ["FD:", obf, _, named, _] => {
                let (owner, obf_name) =
                    split_member(obf).ok_or_else(|| error(FORMAT, number, "field without owner"))?;
                let (_, named_name) =
                    split_member(named).ok_or_else(|| error(FORMAT, number, "field without owner"))?;
                let descriptor = match parts.as_slice() {
                    ["FD:", _, desc, _, _] => Some(*desc),
                    _ => None,
                };
                builder.add_field(owner, obf_name, descriptor, named_name);
            }
            ["MD:", obf, obf_desc, named, _named_desc] => {
                let (owner, obf_name) =
                    split_member(obf).ok_or_else(|| error(FORMAT, number, "method without owner"))?;
                let (_, named_name) =
                    split_member(named).ok_or_else(|| error(FORMAT, number, "method without owner"))?;
                builder.add_method(owner, obf_name, obf_desc, named_name);
            }
            _ => return Err(error(FORMAT, number, format!("unrecognised line '{}'", line))),
        }
    }
    Ok(builder.build())
}

pub fn read_csrg(text: &str) -> WorkspaceResult<MappingSet> {
    const FORMAT: &str = "csrg";
    let mut builder = MappingSetBuilder::default();
    for (number, line) in content_lines(text) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [obf, named] if obf.ends_with('/') => {
                // package line
                let _ = named;
            }
            [obf, named] => {
                builder.add_class(obf, named);
            }
            [owner, obf, named] => {
                builder.add_field(owner, obf, None, named);
            }
            [owner, obf, desc, named] => {
                builder.add_method(owner, obf, desc, named);
            }
            _ => return Err(error(FORMAT, number, format!("unrecognised line '{}'", line))),
        }
    }
    Ok(builder.build())
}

/// TSRG v1 and, when the first line is a `tsrg2` header, TSRG v2. For v2 the
/// first two namespaces are used.
pub fn read_tsrg(text: &str) -> WorkspaceResult<MappingSet> {
    const FORMAT: &str = "tsrg";
    let mut builder = MappingSetBuilder::default();
    let mut lines = content_lines(text).peekable();
    let mut namespaces = 2;
    let mut v2 = false;
    if let Some((_, header)) = lines.peek() {
        if let Some(names) = header.strip_prefix("tsrg2 ") {
            namespaces = names.split_whitespace().count().max(2);
            v2 = true;
        }
    }
    if v2 {
        lines.next();
    }

    let mut class: Option<String> = None;
    let mut method: Option<(String, String)> = None;

    for (number, line) in lines {
        let depth = line.chars().take_while(|c| *c == '\t').count();
        let parts: Vec<&str> = line.split_whitespace().collect();
        match depth {
            0 => {
                let [obf, named, ..] = parts.as_slice() else {
                    return Err(error(FORMAT, number, "class line needs two names"));
                };
                if obf.ends_with('/') {
                    class = None;
                    continue;
                }
                builder.add_class(obf, named);
                class = Some(obf.to_string());
                method = None;
            }
            1 => {
                let owner = class
                    .as_deref()
                    .ok_or_else(|| error(FORMAT, number, "member outside of a class"))?;
                match parts.as_slice() {
                    [obf, desc, named, ..] if parts.len() == namespaces + 1 && desc.starts_with('(') => {
                        builder.add_method(owner, obf, desc, named);
                        method = Some((obf.to_string(), desc.to_string()));
                    }
                    // v2 fields may carry a descriptor column
                    [obf, desc, named, ..] if v2 && parts.len() == namespaces + 1 => {
                        builder.add_field(owner, obf, Some(desc), named);
                        method = None;
                    }
                    [obf, named, ..] if parts.len() == namespaces => {
                        builder.add_field(owner, obf, None, named);
                        method = None;
                    }
                    _ => return Err(error(FORMAT, number, format!("unrecognised member '{}'", line.trim()))),
                }
            }
            2 if v2 => {
                let (Some(owner), Some((name, desc))) = (class.as_deref(), method.as_ref()) else {
                    return Err(error(FORMAT, number, "parameter outside of a method"));
                };
                match parts.as_slice() {
                    ["static"] => {}
                    [index, _obf, named, ..] => {
                        let slot: u16 = index
                            .parse()
                            .map_err(|_| error(FORMAT, number, format!("bad parameter index '{}'", index)))?;
                        builder.add_parameter(owner, name, desc, slot, named);
                    }
                    _ => return Err(error(FORMAT, number, "malformed parameter line")),
                }
            }
            _ => return Err(error(FORMAT, number, "unexpected indentation")),
        }
    }
    Ok(builder.build())
}
