use super::{EntryKind, EntryTransformer, JarEntry};
use crate::core::error::WorkspaceResult;

/// Keeps classes inside one of the allowed package prefixes.
///
/// Classes in the root package always pass and directories are dropped.
/// Resources are kept: the data packs of a server jar live outside any
/// code package.
pub struct FilterTransformer {
    allowed_prefixes: Vec<String>,
}

impl FilterTransformer {
    pub fn new<I, S>(allowed_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_prefixes: allowed_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        !class_name.contains('/') || self.allowed_prefixes.iter().any(|p| class_name.starts_with(p.as_str()))
    }
}

impl EntryTransformer for FilterTransformer {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn transform(&self, entry: JarEntry) -> WorkspaceResult<Option<JarEntry>> {
        Ok(match entry.kind {
            EntryKind::Directory => None,
            EntryKind::Class => match entry.class_name() {
                Some(name) if self.matches(name) => Some(entry),
                _ => None,
            },
            EntryKind::Resource | EntryKind::Manifest => Some(entry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept(filter: &FilterTransformer, name: &str) -> bool {
        filter.transform(JarEntry::new(name, vec![])).unwrap().is_some()
    }

    #[test]
    fn keeps_allowed_packages_and_root_classes() {
        let filter = FilterTransformer::new(["net/minecraft"]);
        assert!(kept(&filter, "net/minecraft/server/Main.class"));
        assert!(kept(&filter, "a.class"));
        assert!(kept(&filter, "META-INF/versions/17/net/minecraft/X.class"));
        assert!(!kept(&filter, "com/google/common/Lists.class"));
        assert!(!kept(&filter, "net/"));
        assert!(kept(&filter, "data/minecraft/recipes/stick.json"));
        assert!(kept(&filter, "META-INF/MANIFEST.MF"));
    }
}
