// ProGuard mapping files, as published alongside official jars.
// They map named -> obfuscated, so the parsed set is reversed before use.

use super::{MappingSet, MappingSetBuilder};
use crate::core::error::{WorkspaceError, WorkspaceResult};

const FORMAT: &str = "proguard";

fn error(line: usize, message: impl Into<String>) -> WorkspaceError {
    WorkspaceError::Mappings {
        format: FORMAT,
        message: format!("line {}: {}", line, message.into()),
    }
}

/// `int[]` -> `[I`, `java.lang.String` -> `Ljava/lang/String;`.
pub fn java_type_to_descriptor(java_type: &str) -> String {
    let mut base = java_type.trim();
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dims += 1;
    }
    let element = match base {
        "void" => "V".to_string(),
        "boolean" => "Z".to_string(),
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "short" => "S".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "float" => "F".to_string(),
        "double" => "D".to_string(),
        class => format!("L{};", class.replace('.', "/")),
    };
    format!("{}{}", "[".repeat(dims), element)
}

/// Parse into the file's own direction (named -> obfuscated).
pub fn parse_named_to_obfuscated(text: &str) -> WorkspaceResult<MappingSet> {
    let mut builder = MappingSetBuilder::default();
    let mut current: Option<String> = None;

    for (number, raw) in text.lines().enumerate() {
        let number = number + 1;
        let line = raw.trim_end();
        if line.trim_start().starts_with('#') || line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(' ') && !line.starts_with('\t') {
            let (named, obfuscated) = line
                .strip_suffix(':')
                .and_then(|l| l.split_once(" -> "))
                .ok_or_else(|| error(number, format!("malformed class line '{}'", line)))?;
            let named = named.trim().replace('.', "/");
            builder.add_class(&named, &obfuscated.trim().replace('.', "/"));
            current = Some(named);
            continue;
        }

        let owner = current
            .as_deref()
            .ok_or_else(|| error(number, "member before any class"))?;
        let (signature, obfuscated) = line
            .trim()
            .split_once(" -> ")
            .ok_or_else(|| error(number, format!("malformed member line '{}'", line.trim())))?;
        // strip the line-number prefix of methods, `12:34:`
        let signature = signature.trim_start_matches(|c: char| c.is_ascii_digit() || c == ':');
        let (return_type, rest) = signature
            .split_once(' ')
            .ok_or_else(|| error(number, "member without type"))?;

        match rest.split_once('(') {
            Some((name, args)) => {
                let args = args
                    .strip_suffix(')')
                    .ok_or_else(|| error(number, "unterminated argument list"))?;
                let mut descriptor = String::from("(");
                for arg in args.split(',').filter(|a| !a.trim().is_empty()) {
                    descriptor.push_str(&java_type_to_descriptor(arg));
                }
                descriptor.push(')');
                descriptor.push_str(&java_type_to_descriptor(return_type));
                builder.add_method(owner, name, &descriptor, obfuscated.trim());
            }
            None => {
                let descriptor = java_type_to_descriptor(return_type);
                builder.add_field(owner, rest, Some(&descriptor), obfuscated.trim());
            }
        }
    }
    Ok(builder.build())
}

/// Parse and reverse, giving obfuscated -> named.
pub fn read(text: &str) -> WorkspaceResult<MappingSet> {
    Ok(parse_named_to_obfuscated(text)?.reverse())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# {\"fileName\":\"client.txt\"}
net.minecraft.world.World -> a:
    net.minecraft.world.Entity player -> c
    int[] heights -> e
    12:40:net.minecraft.world.World spawn(net.minecraft.world.Entity,long) -> d
    void <init>() -> <init>
net.minecraft.world.Entity -> b:
    java.lang.String getName() -> f
";

    #[test]
    fn java_types() {
        assert_eq!(java_type_to_descriptor("int"), "I");
        assert_eq!(java_type_to_descriptor("java.lang.String[][]"), "[[Ljava/lang/String;");
        assert_eq!(java_type_to_descriptor("void"), "V");
    }

    #[test]
    fn reads_and_reverses() {
        let set = read(SAMPLE).unwrap();
        let world = set.class("a").unwrap();
        assert_eq!(world.named, "net/minecraft/world/World");
        assert_eq!(world.field("c", Some("Lb;")).unwrap().named, "player");
        assert_eq!(world.field("e", Some("[I")).unwrap().named, "heights");
        assert_eq!(world.method("d", "(Lb;J)La;").unwrap().named, "spawn");
        assert_eq!(set.class("b").unwrap().method("f", "()Ljava/lang/String;").unwrap().named, "getName");
    }

    #[test]
    fn malformed_lines_report_their_number() {
        let err = read("a.B -> c:\n    nonsense\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
        assert!(read("    int x -> y\n").is_err());
    }
}
