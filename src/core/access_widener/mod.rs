// ─── Access Wideners ───
// Line-oriented rules relaxing the visibility and finality of classes,
// methods and fields without renaming anything.

pub mod transformer;

use std::collections::HashMap;
use std::path::Path;

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};

pub use transformer::AccessWidenerTransformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Accessible,
    Extendable,
    Mutable,
}

impl AccessChange {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "accessible" | "widen" => Some(Self::Accessible),
            "extendable" => Some(Self::Extendable),
            "mutable" => Some(Self::Mutable),
            _ => None,
        }
    }
}

/// Accumulated changes for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    pub accessible: bool,
    pub extendable: bool,
    pub mutable: bool,
}

impl Access {
    fn add(&mut self, change: AccessChange) {
        match change {
            AccessChange::Accessible => self.accessible = true,
            AccessChange::Extendable => self.extendable = true,
            AccessChange::Mutable => self.mutable = true,
        }
    }

    fn merge(&mut self, other: Access) {
        self.accessible |= other.accessible;
        self.extendable |= other.extendable;
        self.mutable |= other.mutable;
    }
}

type MemberKey = (String, String, String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessWidener {
    namespace: Option<String>,
    classes: HashMap<String, Access>,
    methods: HashMap<MemberKey, Access>,
    fields: HashMap<MemberKey, Access>,
}

fn error(line: usize, message: impl Into<String>) -> WorkspaceError {
    WorkspaceError::AccessWidener {
        line,
        message: message.into(),
    }
}

impl AccessWidener {
    /// Parse `text`. When `expected_namespace` is set, the header must name it.
    pub fn parse(text: &str, expected_namespace: Option<&str>) -> WorkspaceResult<Self> {
        let mut widener = AccessWidener::default();
        widener.read(text, expected_namespace)?;
        Ok(widener)
    }

    pub fn read_file(path: &Path, expected_namespace: Option<&str>) -> WorkspaceResult<Self> {
        let text = std::fs::read_to_string(path).at(path)?;
        Self::parse(&text, expected_namespace)
    }

    /// Add the rules of another file. Namespaces must agree.
    pub fn read(&mut self, text: &str, expected_namespace: Option<&str>) -> WorkspaceResult<()> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").trim()))
            .filter(|(_, l)| !l.is_empty());

        let (number, header) = lines.next().ok_or_else(|| error(1, "empty access widener"))?;
        let version = match header.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["accessWidener", version @ ("v1" | "v2"), namespace] => {
                if let Some(expected) = expected_namespace {
                    if expected != *namespace {
                        return Err(error(
                            number,
                            format!("namespace '{}' does not match the expected '{}'", namespace, expected),
                        ));
                    }
                }
                match &self.namespace {
                    Some(existing) if existing != namespace => {
                        return Err(error(
                            number,
                            format!("namespace '{}' differs from previously read '{}'", namespace, existing),
                        ))
                    }
                    _ => self.namespace = Some(namespace.to_string()),
                }
                *version
            }
            _ => return Err(error(number, format!("invalid header '{}'", header))),
        };

        for (number, line) in lines {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let (change, rest) = tokens
                .split_first()
                .ok_or_else(|| error(number, "empty rule"))?;
            let change_word = match change.strip_prefix("transitive-") {
                Some(_) if version == "v1" => {
                    return Err(error(number, "transitive rules require accessWidener v2"))
                }
                Some(word) => word,
                None => change,
            };
            let change = AccessChange::parse(change_word)
                .ok_or_else(|| error(number, format!("unknown access change '{}'", change_word)))?;

            match rest {
                ["class", class] => {
                    if change == AccessChange::Mutable {
                        return Err(error(number, "classes cannot be made mutable"));
                    }
                    self.classes.entry(class.to_string()).or_default().add(change);
                }
                ["method", owner, name, descriptor] => {
                    if change == AccessChange::Mutable {
                        return Err(error(number, "methods cannot be made mutable"));
                    }
                    if !descriptor.starts_with('(') {
                        return Err(error(number, format!("invalid method descriptor '{}'", descriptor)));
                    }
                    self.methods
                        .entry((owner.to_string(), name.to_string(), descriptor.to_string()))
                        .or_default()
                        .add(change);
                    // members are unreachable without their owner
                    let owner_change = if change == AccessChange::Extendable {
                        AccessChange::Extendable
                    } else {
                        AccessChange::Accessible
                    };
                    self.classes.entry(owner.to_string()).or_default().add(owner_change);
                }
                ["field", owner, name, descriptor] => {
                    if change == AccessChange::Extendable {
                        return Err(error(number, "fields cannot be made extendable"));
                    }
                    self.fields
                        .entry((owner.to_string(), name.to_string(), descriptor.to_string()))
                        .or_default()
                        .add(change);
                    if change == AccessChange::Accessible {
                        self.classes.entry(owner.to_string()).or_default().add(AccessChange::Accessible);
                    }
                }
                _ => return Err(error(number, format!("malformed rule '{}'", line))),
            }
        }
        Ok(())
    }

    pub fn merge(&mut self, other: &AccessWidener) {
        for (class, access) in &other.classes {
            self.classes.entry(class.clone()).or_default().merge(*access);
        }
        for (key, access) in &other.methods {
            self.methods.entry(key.clone()).or_default().merge(*access);
        }
        for (key, access) in &other.fields {
            self.fields.entry(key.clone()).or_default().merge(*access);
        }
        if self.namespace.is_none() {
            self.namespace = other.namespace.clone();
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.methods.is_empty() && self.fields.is_empty()
    }

    pub fn class_access(&self, class: &str) -> Option<Access> {
        self.classes.get(class).copied()
    }

    pub fn method_access(&self, owner: &str, name: &str, descriptor: &str) -> Option<Access> {
        self.methods
            .get(&(owner.to_string(), name.to_string(), descriptor.to_string()))
            .copied()
    }

    pub fn field_access(&self, owner: &str, name: &str, descriptor: &str) -> Option<Access> {
        self.fields
            .get(&(owner.to_string(), name.to_string(), descriptor.to_string()))
            .copied()
    }

    /// Whether `class` itself has a rule, including one implied by a member
    /// rule that widens its owner. A `mutable`-only field does not count.
    pub fn targets(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_widens_owners() {
        let widener = AccessWidener::parse(
            "accessWidener v2 named\n\
             # comment\n\
             accessible class net/minecraft/A\n\
             transitive-extendable method net/minecraft/B run ()V # trailing\n\
             mutable field net/minecraft/C value I\n\
             widen field com/example/Foo bar I\n",
            Some("named"),
        )
        .unwrap();

        assert_eq!(widener.namespace(), Some("named"));
        assert!(widener.class_access("net/minecraft/A").unwrap().accessible);
        assert!(widener.method_access("net/minecraft/B", "run", "()V").unwrap().extendable);
        assert!(widener.class_access("net/minecraft/B").unwrap().extendable);
        assert!(widener.field_access("net/minecraft/C", "value", "I").unwrap().mutable);
        // mutable alone does not need the owner to be visible
        assert!(!widener.targets("net/minecraft/C"));
        assert!(widener.field_access("com/example/Foo", "bar", "I").unwrap().accessible);
        assert!(widener.targets("com/example/Foo"));
    }

    #[test]
    fn rejects_bad_input() {
        let namespace = AccessWidener::parse("accessWidener v1 named\n", Some("official")).unwrap_err();
        assert!(matches!(namespace, WorkspaceError::AccessWidener { line: 1, .. }));

        let transitive =
            AccessWidener::parse("accessWidener v1 named\ntransitive-accessible class a\n", None).unwrap_err();
        assert!(matches!(transitive, WorkspaceError::AccessWidener { line: 2, .. }));

        assert!(AccessWidener::parse("accessWidener v1 named\nmutable class a\n", None).is_err());
        assert!(AccessWidener::parse("accessWidener v1 named\nextendable field a b I\n", None).is_err());
        assert!(AccessWidener::parse("accessWidener v3 named\n", None).is_err());
        assert!(AccessWidener::parse("", None).is_err());
    }

    #[test]
    fn merging_files_unions_the_rules() {
        let mut first = AccessWidener::parse("accessWidener v1 named\naccessible class a\n", None).unwrap();
        let second = AccessWidener::parse("accessWidener v1 named\nextendable class a\n", None).unwrap();
        first.merge(&second);
        let access = first.class_access("a").unwrap();
        assert!(access.accessible && access.extendable);
        assert!(first.read("accessWidener v1 intermediary\n", None).is_err());
    }
}
