use crate::language::ast::ImportSpec;
use std::collections::{BTreeMap, HashMap};

/// Local alias -> canonical import path for one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportTable {
    aliases: BTreeMap<String, String>,
}

impl ImportTable {
    /// `package_names` maps import paths of loaded packages to their package
    /// clause names, which Go uses as the implicit alias.
    pub fn build(specs: &[ImportSpec], package_names: &HashMap<String, String>) -> Self {
        let mut aliases = BTreeMap::new();
        for spec in specs {
            let alias = match &spec.alias {
                Some(alias) if alias.name == "_" || alias.name == "." => continue,
                Some(alias) => alias.name.clone(),
                None => package_names
                    .get(&spec.path)
                    .cloned()
                    .unwrap_or_else(|| default_alias(&spec.path).to_string()),
            };
            aliases.insert(alias, spec.path.clone());
        }
        Self { aliases }
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }
}

/// Implicit alias of an import path whose package was not loaded: the last
/// path segment, skipping a `/vN` major-version segment and a `.vN` suffix.
pub fn default_alias(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    if is_major_version(last) {
        if let Some(previous) = segments.next() {
            last = previous;
        }
    }
    match last.rsplit_once('.') {
        Some((name, suffix)) if is_major_version(suffix) && !name.is_empty() => name,
        _ => last,
    }
}

fn is_major_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{ast::Ident, span::Span};

    fn spec(alias: Option<&str>, path: &str) -> ImportSpec {
        ImportSpec {
            alias: alias.map(|name| Ident::new(name, Span::default())),
            path: path.to_string(),
            span: Span::default(),
        }
    }

    #[test]
    fn default_alias_uses_last_segment() {
        assert_eq!(default_alias("fmt"), "fmt");
        assert_eq!(default_alias("go-immutable/example/mod1"), "mod1");
        assert_eq!(default_alias("github.com/x/y/v2"), "y");
        assert_eq!(default_alias("gopkg.in/yaml.v3"), "yaml");
    }

    #[test]
    fn explicit_alias_wins_and_blank_imports_are_skipped() {
        let specs = vec![
            spec(Some("m"), "go-immutable/example/mod1"),
            spec(Some("_"), "embed"),
            spec(Some("."), "strings"),
            spec(None, "fmt"),
        ];
        let table = ImportTable::build(&specs, &HashMap::new());
        assert_eq!(table.resolve("m"), Some("go-immutable/example/mod1"));
        assert_eq!(table.resolve("fmt"), Some("fmt"));
        assert!(!table.contains("_"));
        assert!(!table.contains("strings"));
        assert_eq!(table.aliases.len(), 2);
    }

    #[test]
    fn loaded_package_name_overrides_path_segment() {
        let mut names = HashMap::new();
        names.insert("example.com/go-utils".to_string(), "utils".to_string());
        let table = ImportTable::build(&[spec(None, "example.com/go-utils")], &names);
        assert_eq!(table.resolve("utils"), Some("example.com/go-utils"));
        assert!(!table.contains("go-utils"));
    }
}
