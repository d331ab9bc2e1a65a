//! Stage 4: the import resolver.
//!
//! Walks each placeholder actually referenced by the (pre-chunk-expansion)
//! template text, loads its declared import(s), and merges multi-source
//! imports with later paths overriding earlier ones. Cycle detection uses
//! an explicit path-stack plus a canonical-path set rather than a shared
//! graph structure — a chunk can only be revisited within the recursive
//! chain that's currently being resolved, so the stack is scoped to one
//! top-level placeholder's resolution, not shared globally.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

use crate::error::{PromptloomError, Warning};
use crate::loader::Loader;
use crate::template::referenced_names;
use crate::types::{ChunkConfig, ImportSpec, ResolvedContext, ResolvedImport, SourceDocument, VariationSet};

/// Resolve every import transitively reachable from `template_text`'s
/// placeholder and chunk references. `theme_removed` names a placeholder
/// the active theme erased via `[Remove]`: such a name has no import
/// declaration left to look up, but it is still a legitimate reference, so
/// it resolves to a [`ResolvedImport`] with `removed: true` instead of
/// raising `UnknownPlaceholder`.
pub fn resolve_imports(
    loader: &mut Loader,
    imports: &IndexMap<String, ImportSpec>,
    template_text: &str,
    max_depth: usize,
    theme_removed: &IndexSet<String>,
) -> Result<ResolvedContext, PromptloomError> {
    let referenced = referenced_names(template_text)?;

    let mut resolved_imports = IndexMap::new();
    let mut chunks = IndexMap::new();
    let mut warnings = Vec::new();

    for name in &referenced {
        if chunks.contains_key(name) || resolved_imports.contains_key(name) {
            continue;
        }
        let Some(spec) = imports.get(name) else {
            if theme_removed.contains(name) {
                resolved_imports.insert(
                    name.clone(),
                    ResolvedImport {
                        variations: VariationSet::default(),
                        provenance: Vec::new(),
                        removed: true,
                    },
                );
                continue;
            }
            return Err(PromptloomError::UnknownPlaceholder { name: name.clone() });
        };
        let mut stack = Vec::new();
        resolve_one(loader, name, spec, 0, max_depth, &mut stack, &mut resolved_imports, &mut chunks)?;
    }

    for name in imports.keys() {
        if !referenced.contains(name) {
            warnings.push(Warning::UnusedImport { placeholder: name.clone() });
        }
    }

    Ok(ResolvedContext {
        imports: resolved_imports,
        chunks,
        style: String::new(),
        warnings,
    })
}

fn resolve_one(
    loader: &mut Loader,
    name: &str,
    spec: &ImportSpec,
    depth: usize,
    max_depth: usize,
    stack: &mut Vec<PathBuf>,
    resolved_imports: &mut IndexMap<String, ResolvedImport>,
    chunks: &mut IndexMap<String, ChunkConfig>,
) -> Result<(), PromptloomError> {
    match spec {
        ImportSpec::Inline(vs) => {
            resolved_imports.insert(
                name.to_string(),
                ResolvedImport {
                    variations: vs.clone(),
                    provenance: Vec::new(),
                    removed: false,
                },
            );
            Ok(())
        }
        ImportSpec::Path(path) => resolve_path(loader, name, path, depth, max_depth, stack, resolved_imports, chunks),
        ImportSpec::Paths(paths) => {
            let mut merged = VariationSet::default();
            let mut provenance = Vec::new();
            for path in paths {
                resolve_path(loader, name, path, depth, max_depth, stack, resolved_imports, chunks)?;
                // A path in a merge list always names a variation set (keyed-entry
                // merging only makes sense for variation sets); a chunk path
                // inside a merge list is a schema violation.
                if chunks.contains_key(name) {
                    return Err(PromptloomError::SchemaViolation {
                        detail: format!("'{name}' cannot merge a chunk path alongside other import paths"),
                    });
                }
                if let Some(entry) = resolved_imports.get(name) {
                    merged.merge_from(entry.variations.clone());
                    provenance.extend(entry.provenance.clone());
                }
            }
            resolved_imports.insert(
                name.to_string(),
                ResolvedImport {
                    variations: merged,
                    provenance,
                    removed: false,
                },
            );
            Ok(())
        }
    }
}

fn resolve_path(
    loader: &mut Loader,
    name: &str,
    path: &Path,
    depth: usize,
    max_depth: usize,
    stack: &mut Vec<PathBuf>,
    resolved_imports: &mut IndexMap<String, ResolvedImport>,
    chunks: &mut IndexMap<String, ChunkConfig>,
) -> Result<(), PromptloomError> {
    if depth > max_depth {
        return Err(PromptloomError::DepthError { limit: max_depth });
    }

    let canonical = std::fs::canonicalize(path).map_err(|_| PromptloomError::MissingSource {
        path: path.to_path_buf(),
    })?;

    if stack.contains(&canonical) {
        let mut closing = stack.clone();
        closing.push(canonical);
        return Err(PromptloomError::CycleError { stack: closing });
    }

    let source = loader.load(path)?;
    match source.document {
        SourceDocument::Variations(vs) => {
            resolved_imports.insert(
                name.to_string(),
                ResolvedImport {
                    variations: vs,
                    provenance: vec![canonical],
                    removed: false,
                },
            );
            Ok(())
        }
        SourceDocument::Chunk(chunk) => {
            stack.push(canonical);
            for (nested_name, nested_spec) in chunk.imports.clone() {
                if chunks.contains_key(&nested_name) || resolved_imports.contains_key(&nested_name) {
                    continue;
                }
                resolve_one(loader, &nested_name, &nested_spec, depth + 1, max_depth, stack, resolved_imports, chunks)?;
            }
            stack.pop();
            chunks.insert(name.to_string(), chunk);
            Ok(())
        }
        other => Err(PromptloomError::SchemaViolation {
            detail: format!(
                "'{}' cannot be used as an import source (expected a variation set or chunk, found {:?})",
                path.display(),
                discriminant_name(&other)
            ),
        }),
    }
}

fn discriminant_name(doc: &SourceDocument) -> &'static str {
    match doc {
        SourceDocument::Template(_) => "template",
        SourceDocument::Prompt(_) => "prompt",
        SourceDocument::Chunk(_) => "chunk",
        SourceDocument::Variations(_) => "variations",
        SourceDocument::Theme(_) => "theme",
    }
}
