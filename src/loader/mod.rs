//! Stage 1: the loader.
//!
//! Reads a named source from disk, parses it as YAML, classifies it into
//! one of the five [`crate::types::SourceKind`]s, and projects it into the
//! typed [`crate::types::SourceDocument`] the rest of the pipeline works
//! with. Sources are cached by canonicalised path for the lifetime of one
//! [`Loader`], which in turn lives for the duration of a single plan —
//! never shared across plans.

mod raw;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::PromptloomError;
use crate::types::{
    ChunkConfig, GenerationBlock, GenerationMode, ImportSpec, PromptConfig, SeedMode, Source,
    SourceDocument, SourceKind, TemplateConfig, ThemeConfig, ThemeImportValue, ThemeSelection,
    VariationSet,
};

use raw::{
    GenerationBlockRaw, ImportValueRaw, RawChunkDoc, RawPromptDoc, RawTemplateDoc,
    RawThemeDoc, RawVariationsDoc, ThemeSelectionRaw, VariationEntryRaw,
};

/// Filename infixes that pre-classify a file before its content is parsed,
/// e.g. `widow.chunk.yaml` or `base.template.yaml`.
const CHUNK_INFIXES: &[&str] = &["chunk", "adetailer", "controlnet"];

/// Loads and caches [`Source`]s for the lifetime of one resolution.
#[derive(Debug, Default)]
pub struct Loader {
    cache: HashMap<PathBuf, Source>,
}

impl Loader {
    pub fn new() -> Self {
        Self { cache: HashMap::new() }
    }

    /// Load (or return the cached) [`Source`] at `path`.
    pub fn load(&mut self, path: &Path) -> Result<Source, PromptloomError> {
        let canonical = fs::canonicalize(path).map_err(|_| PromptloomError::MissingSource {
            path: path.to_path_buf(),
        })?;

        if let Some(cached) = self.cache.get(&canonical) {
            return Ok(cached.clone());
        }

        let text = fs::read_to_string(&canonical).map_err(|_| PromptloomError::MissingSource {
            path: path.to_path_buf(),
        })?;

        let raw_value: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|e| PromptloomError::MalformedSource {
                path: canonical.clone(),
                detail: e.to_string(),
            })?;

        let kind = classify(&canonical, &raw_value)?;
        let base_dir = canonical.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let document = project(kind, raw_value, &base_dir, &canonical)?;

        let source = Source { kind, origin: canonical.clone(), document };
        self.cache.insert(canonical, source.clone());
        Ok(source)
    }

    /// Whether `path` (canonicalised) is currently loaded in this loader's
    /// cache — used by callers that want to report cache hit rates, not by
    /// the pipeline itself.
    pub fn is_cached(&self, path: &Path) -> bool {
        fs::canonicalize(path).is_ok_and(|p| self.cache.contains_key(&p))
    }
}

fn classify(path: &Path, raw: &serde_yaml::Value) -> Result<SourceKind, PromptloomError> {
    let mapping = raw.as_mapping().ok_or_else(|| PromptloomError::MalformedSource {
        path: path.to_path_buf(),
        detail: "expected a YAML mapping at the document root".to_string(),
    })?;

    let has_key = |key: &str| {
        mapping
            .get(serde_yaml::Value::String(key.to_string()))
            .is_some_and(|v| !v.is_null())
    };

    if has_key("generation") {
        return Ok(SourceKind::Prompt);
    }

    if let Some(type_value) = mapping.get(serde_yaml::Value::String("type".to_string())) {
        let type_str = type_value.as_str().ok_or_else(|| PromptloomError::UnknownKind {
            path: path.to_path_buf(),
        })?;
        return SourceKind::from_type_field(type_str)
            .ok_or_else(|| PromptloomError::UnknownKind { path: path.to_path_buf() });
    }

    if let Some(kind) = classify_by_filename(path) {
        return Ok(kind);
    }

    Ok(SourceKind::Template)
}

fn classify_by_filename(path: &Path) -> Option<SourceKind> {
    let name = path.file_name()?.to_str()?;
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() < 3 {
        return None;
    }
    for infix in &parts[1..parts.len() - 1] {
        if CHUNK_INFIXES.contains(infix) {
            return Some(SourceKind::Chunk);
        }
        match *infix {
            "template" => return Some(SourceKind::Template),
            "prompt" => return Some(SourceKind::Prompt),
            _ => {}
        }
    }
    None
}

fn project(
    kind: SourceKind,
    raw: serde_yaml::Value,
    base_dir: &Path,
    path: &Path,
) -> Result<SourceDocument, PromptloomError> {
    let malformed = |e: serde_yaml::Error| PromptloomError::MalformedSource {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    match kind {
        SourceKind::Template => {
            let doc: RawTemplateDoc = serde_yaml::from_value(raw).map_err(malformed)?;
            Ok(SourceDocument::Template(TemplateConfig {
                parent: doc.parent.map(|p| base_dir.join(p)),
                template: doc.template,
                negative: doc.negative,
                parameters: doc.parameters,
                imports: convert_imports(doc.imports, base_dir),
            }))
        }
        SourceKind::Prompt => {
            let doc: RawPromptDoc = serde_yaml::from_value(raw).map_err(malformed)?;
            Ok(SourceDocument::Prompt(PromptConfig {
                parent: doc.parent.map(|p| base_dir.join(p)),
                prompt: doc.prompt,
                generation: convert_generation(doc.generation, path)?,
                parameters: doc.parameters,
                imports: convert_imports(doc.imports, base_dir),
                theme: doc.theme.map(|t| convert_theme_selection(t, base_dir)),
            }))
        }
        SourceKind::Chunk => {
            let doc: RawChunkDoc = serde_yaml::from_value(raw).map_err(malformed)?;
            if doc.template.contains("{prompt}") {
                return Err(PromptloomError::SchemaViolation {
                    detail: format!("chunk '{}' must not contain the {{prompt}} marker", path.display()),
                });
            }
            Ok(SourceDocument::Chunk(ChunkConfig {
                parent: doc.parent.map(|p| base_dir.join(p)),
                template: doc.template,
                defaults: doc.defaults,
                imports: convert_imports(doc.imports, base_dir),
            }))
        }
        SourceKind::VariationSet => {
            let doc: RawVariationsDoc = serde_yaml::from_value(raw).map_err(malformed)?;
            Ok(SourceDocument::Variations(convert_variation_entries(doc.entries)))
        }
        SourceKind::Theme => {
            let doc: RawThemeDoc = serde_yaml::from_value(raw).map_err(malformed)?;
            let mut imports = IndexMap::new();
            for (key, value) in doc.imports {
                let entry = if value == "[Remove]" {
                    ThemeImportValue::Remove
                } else {
                    ThemeImportValue::Path(base_dir.join(&value))
                };
                imports.insert(key, entry);
            }
            Ok(SourceDocument::Theme(ThemeConfig { imports }))
        }
    }
}

fn convert_imports(raw: IndexMap<String, ImportValueRaw>, base_dir: &Path) -> IndexMap<String, ImportSpec> {
    raw.into_iter()
        .map(|(name, value)| {
            let spec = match value {
                ImportValueRaw::Single(p) => ImportSpec::Path(base_dir.join(p)),
                ImportValueRaw::Many(paths) => {
                    ImportSpec::Paths(paths.into_iter().map(|p| base_dir.join(p)).collect())
                }
                ImportValueRaw::Inline(entries) => ImportSpec::Inline(convert_variation_entries(entries)),
            };
            (name, spec)
        })
        .collect()
}

fn convert_variation_entries(raw: IndexMap<String, VariationEntryRaw>) -> VariationSet {
    let multi_part = raw.values().any(|v| matches!(v, VariationEntryRaw::Parts(_)));
    let entries = raw
        .into_iter()
        .map(|(key, value)| {
            let parts = match value {
                VariationEntryRaw::Simple(s) => {
                    let mut parts = IndexMap::new();
                    parts.insert("main".to_string(), s);
                    parts
                }
                VariationEntryRaw::Parts(parts) => parts,
            };
            (key, parts)
        })
        .collect();
    VariationSet { multi_part, entries }
}

fn convert_generation(raw: GenerationBlockRaw, path: &Path) -> Result<GenerationBlock, PromptloomError> {
    let mode = match raw.mode.as_deref() {
        None | Some("combinatorial") => GenerationMode::Combinatorial,
        Some("random") => GenerationMode::Random,
        Some(other) => {
            return Err(PromptloomError::SchemaViolation {
                detail: format!("'{}': unknown generation mode '{other}'", path.display()),
            })
        }
    };

    let seed = raw.seed.unwrap_or(0);
    let seed_mode = match raw.seed_mode.as_deref() {
        None | Some("fixed") => SeedMode::Fixed(seed),
        Some("progressive") => SeedMode::Progressive(seed),
        Some("random") => SeedMode::Random,
        Some(other) => {
            return Err(PromptloomError::SchemaViolation {
                detail: format!("'{}': unknown seed mode '{other}'", path.display()),
            })
        }
    };

    Ok(GenerationBlock {
        mode,
        seed_mode,
        max_images: raw.max_images,
        width: raw.width,
        height: raw.height,
        steps: raw.steps,
        cfg_scale: raw.cfg_scale,
        extra: raw.extra,
    })
}

fn convert_theme_selection(raw: ThemeSelectionRaw, base_dir: &Path) -> ThemeSelection {
    ThemeSelection {
        name: raw.name,
        file: raw.file.map(|f| base_dir.join(f)),
        style: raw.style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn classifies_prompt_by_generation_block() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "leaf.yaml",
            "prompt: \"a cat\"\ngeneration:\n  mode: combinatorial\n",
        );
        let mut loader = Loader::new();
        let source = loader.load(&path).unwrap();
        assert_eq!(source.kind, SourceKind::Prompt);
    }

    #[test]
    fn classifies_by_type_field() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "hair.yaml", "type: variations\nentries:\n  blonde: blonde hair\n");
        let mut loader = Loader::new();
        let source = loader.load(&path).unwrap();
        assert_eq!(source.kind, SourceKind::VariationSet);
    }

    #[test]
    fn classifies_by_filename_suffix() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "widow.chunk.yaml", "template: \"detailed hands\"\n");
        let mut loader = Loader::new();
        let source = loader.load(&path).unwrap();
        assert_eq!(source.kind, SourceKind::Chunk);
    }

    #[test]
    fn defaults_to_template() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "base.yaml", "template: \"portrait, {prompt}\"\n");
        let mut loader = Loader::new();
        let source = loader.load(&path).unwrap();
        assert_eq!(source.kind, SourceKind::Template);
    }

    #[test]
    fn missing_source_is_an_error() {
        let mut loader = Loader::new();
        let err = loader.load(Path::new("/no/such/file.yaml")).unwrap_err();
        assert!(matches!(err, PromptloomError::MissingSource { .. }));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "bad.yaml", "template: [unclosed\n");
        let mut loader = Loader::new();
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, PromptloomError::MalformedSource { .. }));
    }

    #[test]
    fn chunk_with_prompt_marker_is_a_schema_violation() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "bad.chunk.yaml", "template: \"{prompt}\"\n");
        let mut loader = Loader::new();
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, PromptloomError::SchemaViolation { .. }));
    }

    #[test]
    fn loads_from_cache_on_second_call() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "base.yaml", "template: \"{prompt}\"\n");
        let mut loader = Loader::new();
        loader.load(&path).unwrap();
        assert!(loader.is_cached(&path));
    }
}
