// ─── Jar Manifest ───
// `META-INF/MANIFEST.MF`: a main attribute block followed by per-entry
// sections, lines wrapped at 72 bytes with a leading-space continuation.

use indexmap::IndexMap;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const MAX_LINE: usize = 72;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JarManifest {
    main: IndexMap<String, String>,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl JarManifest {
    /// Lenient: malformed lines are skipped rather than rejected.
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut manifest = Self::default();

        // Join continuation lines first.
        let mut lines: Vec<String> = Vec::new();
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match (line.strip_prefix(' '), lines.last_mut()) {
                (Some(rest), Some(previous)) if !previous.is_empty() => previous.push_str(rest),
                _ => lines.push(line.to_string()),
            }
        }

        let mut current: Option<String> = None;
        let mut in_main = true;
        for line in lines {
            if line.is_empty() {
                in_main = false;
                current = None;
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value).to_string();
            if in_main {
                manifest.main.insert(key.to_string(), value);
            } else if key.eq_ignore_ascii_case("Name") && current.is_none() {
                manifest.sections.entry(value.clone()).or_default();
                current = Some(value);
            } else if let Some(section) = current.as_ref().and_then(|s| manifest.sections.get_mut(s)) {
                section.insert(key.to_string(), value);
            }
        }
        manifest
    }

    pub fn main_attribute(&self, name: &str) -> Option<&str> {
        self.main
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_main_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.main.insert(name.into(), value.into());
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &IndexMap<String, String>)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every attribute matching `predicate` from the entry sections, removing
    /// sections left empty. Returns whether anything was removed.
    pub fn strip_section_attributes(&mut self, predicate: impl Fn(&str) -> bool) -> bool {
        let mut removed = false;
        self.sections.retain(|_, attributes| {
            let before = attributes.len();
            attributes.retain(|k, _| !predicate(k));
            if attributes.len() != before {
                removed = true;
                return !attributes.is_empty();
            }
            true
        });
        removed
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if self.main_attribute("Manifest-Version").is_none() {
            write_line(&mut out, "Manifest-Version", "1.0");
        }
        for (k, v) in &self.main {
            write_line(&mut out, k, v);
        }
        out.extend_from_slice(b"\r\n");
        for (name, attributes) in &self.sections {
            write_line(&mut out, "Name", name);
            for (k, v) in attributes {
                write_line(&mut out, k, v);
            }
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

fn write_line(out: &mut Vec<u8>, key: &str, value: &str) {
    let line = format!("{}: {}", key, value);
    let bytes = line.as_bytes();
    let mut start = 0;
    let mut limit = MAX_LINE;
    while bytes.len() - start > limit {
        // never split inside a UTF-8 sequence
        let mut end = start + limit;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        out.extend_from_slice(&bytes[start..end]);
        out.extend_from_slice(b"\r\n ");
        start = end;
        limit = MAX_LINE - 1;
    }
    out.extend_from_slice(&bytes[start..]);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = "Manifest-Version: 1.0\r\nMain-Class: net.minecraft.client.Main\r\n\r\nName: a/B.class\r\nSHA-256-Digest: abc=\r\n\r\nName: c/D.class\r\nSHA-256-Digest: def=\r\nX-Extra: kept\r\n\r\n";

    #[test]
    fn parses_main_and_sections() {
        let manifest = JarManifest::parse(SIGNED.as_bytes());
        assert_eq!(manifest.main_attribute("main-class"), Some("net.minecraft.client.Main"));
        assert_eq!(manifest.sections().count(), 2);
    }

    #[test]
    fn stripping_digests_drops_empty_sections() {
        let mut manifest = JarManifest::parse(SIGNED.as_bytes());
        assert!(manifest.strip_section_attributes(|k| k.ends_with("-Digest")));
        let sections: Vec<&str> = manifest.sections().map(|(name, _)| name).collect();
        assert_eq!(sections, vec!["c/D.class"]);
        assert!(!manifest.strip_section_attributes(|k| k.ends_with("-Digest")));
    }

    #[test]
    fn long_values_wrap_and_parse_back() {
        let mut manifest = JarManifest::default();
        let long = "x".repeat(200);
        manifest.set_main_attribute("Class-Path", long.clone());
        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.lines().all(|l| l.len() <= MAX_LINE));
        assert_eq!(JarManifest::parse(&bytes).main_attribute("Class-Path"), Some(long.as_str()));
    }
}
