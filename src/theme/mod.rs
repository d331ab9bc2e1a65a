//! Stage 3: the theme overlay.
//!
//! A theme replaces or removes entries in the merged config's `imports` map
//! before the import resolver ever runs. It may be given explicitly (a
//! `theme_config` YAML document pointed to by `theme.file`) or discovered
//! implicitly by scanning a themes directory for files named
//! `{theme}-{placeholder}.yaml` or `{theme}-{placeholder}.{style}.yaml`.
//! Explicit entries win over implicit ones when both name the same key.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use walkdir::WalkDir;

use crate::error::PromptloomError;
use crate::loader::Loader;
use crate::types::{ImportSpec, MergedConfig, SourceDocument, ThemeConfig, ThemeImportValue, ThemeSelection};

/// Apply `selection`'s theme overlay to `merged`'s import map. A no-op when
/// `selection` is `None`. Returns the set of placeholder names the theme
/// erased via `[Remove]`, so the import resolver can thread them through as
/// removed placeholders instead of treating them as undeclared.
pub fn apply_theme(
    mut merged: MergedConfig,
    loader: &mut Loader,
    themes_root: Option<&Path>,
    selection: Option<&ThemeSelection>,
) -> Result<(MergedConfig, IndexSet<String>), PromptloomError> {
    let Some(selection) = selection else {
        return Ok((merged, IndexSet::new()));
    };

    let theme = load_theme_config(loader, themes_root, selection)?;
    let style = selection.style.as_deref();

    let imports = imports_mut(&mut merged);
    let mut names: Vec<String> = imports.keys().cloned().collect();
    for key in theme.imports.keys() {
        let base = key.split('.').next().unwrap_or(key).to_string();
        if !names.contains(&base) {
            names.push(base);
        }
    }
    let mut removed = IndexSet::new();
    for name in names {
        match resolve_entry(&theme, &name, style) {
            Some(ThemeImportValue::Remove) => {
                imports.shift_remove(&name);
                removed.insert(name);
            }
            Some(ThemeImportValue::Path(path)) => {
                imports.insert(name, ImportSpec::Path(path.clone()));
            }
            None => {}
        }
    }

    Ok((merged, removed))
}

fn imports_mut(merged: &mut MergedConfig) -> &mut IndexMap<String, ImportSpec> {
    match merged {
        MergedConfig::Template(c) => &mut c.imports,
        MergedConfig::Prompt(c) => &mut c.imports,
        MergedConfig::Chunk(c) => &mut c.imports,
    }
}

/// Resolution order for one placeholder name:
/// `Name.style` first (honoring `[Remove]`), then the unqualified `Name`,
/// then "no override" (the pre-theme import is kept untouched).
fn resolve_entry<'a>(theme: &'a ThemeConfig, name: &str, style: Option<&str>) -> Option<&'a ThemeImportValue> {
    if let Some(style) = style {
        let qualified = format!("{name}.{style}");
        if let Some(value) = theme.imports.get(&qualified) {
            return Some(value);
        }
    }
    theme.imports.get(name)
}

fn load_theme_config(
    loader: &mut Loader,
    themes_root: Option<&Path>,
    selection: &ThemeSelection,
) -> Result<ThemeConfig, PromptloomError> {
    let mut imports = IndexMap::new();

    if let (Some(root), Some(name)) = (themes_root, selection.name.as_deref()) {
        for (key, value) in discover_implicit(root, name)? {
            imports.insert(key, value);
        }
    }

    if let Some(file) = &selection.file {
        let source = loader.load(file)?;
        match source.document {
            SourceDocument::Theme(explicit) => {
                for (key, value) in explicit.imports {
                    imports.insert(key, value);
                }
            }
            _ => {
                return Err(PromptloomError::SchemaViolation {
                    detail: format!("'{}' is not a theme document", file.display()),
                });
            }
        }
    }

    Ok(ThemeConfig { imports })
}

/// Scan `themes_root` for `{theme}-{placeholder}[.{style}].yaml` files and
/// turn each into a `Name` or `Name.style` import entry.
fn discover_implicit(themes_root: &Path, theme_name: &str) -> Result<IndexMap<String, ThemeImportValue>, PromptloomError> {
    let prefix = format!("{theme_name}-");
    let mut imports = IndexMap::new();

    for entry in WalkDir::new(themes_root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from).map_err(PromptloomError::Io)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(rest) = file_name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let Some(key) = rest.strip_suffix(".yaml") else {
            continue;
        };
        imports.insert(key.to_string(), ThemeImportValue::Path(entry.path().to_path_buf()));
    }

    Ok(imports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn template_with_import(name: &str, target: &str) -> MergedConfig {
        let mut imports = IndexMap::new();
        imports.insert(name.to_string(), ImportSpec::Path(PathBuf::from(target)));
        MergedConfig::Template(crate::types::TemplateConfig {
            parent: None,
            template: "{Hair}".to_string(),
            negative: String::new(),
            parameters: IndexMap::new(),
            imports,
        })
    }

    #[test]
    fn implicit_discovery_matches_prefix() {
        let dir = tempdir().unwrap();
        write(dir.path(), "noir-Hair.yaml", "type: variations\nentries:\n  slick: slicked back hair\n");
        write(dir.path(), "other-Hair.yaml", "type: variations\nentries:\n  wavy: wavy hair\n");

        let merged = template_with_import("Hair", "default_hair.yaml");
        let mut loader = Loader::new();
        let selection = ThemeSelection {
            name: Some("noir".to_string()),
            file: None,
            style: None,
        };
        let (result, removed) = apply_theme(merged, &mut loader, Some(dir.path()), Some(&selection)).unwrap();
        assert!(removed.is_empty());
        match result {
            MergedConfig::Template(t) => match t.imports.get("Hair").unwrap() {
                ImportSpec::Path(p) => assert_eq!(p.file_name().unwrap().to_str().unwrap(), "noir-Hair.yaml"),
                _ => panic!("expected a path import"),
            },
            _ => panic!("expected a merged template"),
        }
    }

    #[test]
    fn style_qualified_remove_drops_the_import() {
        let dir = tempdir().unwrap();
        let theme_file = write(
            dir.path(),
            "noir.theme.yaml",
            "type: theme_config\nimports:\n  Hair.winter: \"[Remove]\"\n",
        );

        let merged = template_with_import("Hair", "default_hair.yaml");
        let mut loader = Loader::new();
        let selection = ThemeSelection {
            name: None,
            file: Some(theme_file),
            style: Some("winter".to_string()),
        };
        let (result, removed) = apply_theme(merged, &mut loader, None, Some(&selection)).unwrap();
        assert!(removed.contains("Hair"));
        match result {
            MergedConfig::Template(t) => assert!(!t.imports.contains_key("Hair")),
            _ => panic!("expected a merged template"),
        }
    }

    #[test]
    fn unqualified_fallback_used_when_no_style_entry() {
        let dir = tempdir().unwrap();
        let theme_file = write(
            dir.path(),
            "noir.theme.yaml",
            "type: theme_config\nimports:\n  Hair: noir_hair.yaml\n",
        );

        let merged = template_with_import("Hair", "default_hair.yaml");
        let mut loader = Loader::new();
        let selection = ThemeSelection {
            name: None,
            file: Some(theme_file),
            style: Some("winter".to_string()),
        };
        let (result, removed) = apply_theme(merged, &mut loader, None, Some(&selection)).unwrap();
        assert!(removed.is_empty());
        match result {
            MergedConfig::Template(t) => match t.imports.get("Hair").unwrap() {
                ImportSpec::Path(p) => assert_eq!(p.file_name().unwrap().to_str().unwrap(), "noir_hair.yaml"),
                _ => panic!("expected a path import"),
            },
            _ => panic!("expected a merged template"),
        }
    }

    #[test]
    fn no_selection_is_a_no_op() {
        let merged = template_with_import("Hair", "default_hair.yaml");
        let mut loader = Loader::new();
        let (result, removed) = apply_theme(merged, &mut loader, None, None).unwrap();
        assert!(removed.is_empty());
        match result {
            MergedConfig::Template(t) => match t.imports.get("Hair").unwrap() {
                ImportSpec::Path(p) => assert_eq!(p, &PathBuf::from("default_hair.yaml")),
                _ => panic!("expected a path import"),
            },
            _ => panic!("expected a merged template"),
        }
    }
}
