//! Stage 2: the inheritance resolver.
//!
//! Follows a single-parent chain (one `parent:` pointer per document, no
//! diamonds) from the requested source up to its root ancestor, then folds
//! the chain back down: each parent's contributed text is substituted into
//! its own `{prompt}` marker by its child's text, root-first. A document's
//! contributed text may itself still contain an (as yet unconsumed)
//! `{prompt}` marker meant for a grandchild further down the chain — that's
//! what lets `prompt → prompt → template` chains compose the same way
//! `template → prompt` does.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{PromptloomError, Warning};
use crate::loader::Loader;
use crate::types::{ChunkConfig, MergedConfig, PromptConfig, Source, SourceDocument, TemplateConfig};

/// Resolve `source`'s inheritance chain, returning the merged config plus
/// any warnings collected along the way (e.g. a parent missing its
/// `{prompt}` marker).
pub fn resolve_inheritance(
    loader: &mut Loader,
    source: Source,
    max_depth: usize,
) -> Result<(MergedConfig, Vec<Warning>), PromptloomError> {
    let mut warnings = Vec::new();
    let merged = merge_chain(loader, source, 0, max_depth, &mut warnings)?;
    Ok((merged, warnings))
}

/// Confirm a fully-merged prompt's final text no longer requires a
/// `{prompt}` substitution: an executable prompt must not require the
/// `{prompt}` token to remain in its final text.
pub fn ensure_fully_resolved(text: &str) -> Result<(), PromptloomError> {
    if text.contains("{prompt}") {
        return Err(PromptloomError::SchemaViolation {
            detail: "final prompt text still contains an unconsumed {prompt} marker".to_string(),
        });
    }
    Ok(())
}

fn merge_chain(
    loader: &mut Loader,
    source: Source,
    depth: usize,
    max_depth: usize,
    warnings: &mut Vec<Warning>,
) -> Result<MergedConfig, PromptloomError> {
    if depth > max_depth {
        return Err(PromptloomError::InheritanceError {
            detail: format!("inheritance chain exceeds the depth limit of {max_depth}"),
        });
    }

    let child = match source.document {
        SourceDocument::Template(t) => MergedConfig::Template(t),
        SourceDocument::Prompt(p) => MergedConfig::Prompt(p),
        SourceDocument::Chunk(c) => MergedConfig::Chunk(c),
        SourceDocument::Variations(_) | SourceDocument::Theme(_) => {
            return Err(PromptloomError::InheritanceError {
                detail: format!("'{}' is not a template/prompt/chunk and cannot inherit or be inherited", source.origin.display()),
            });
        }
    };

    let parent_path = match &child {
        MergedConfig::Template(t) => t.parent.clone(),
        MergedConfig::Prompt(p) => p.parent.clone(),
        MergedConfig::Chunk(c) => c.parent.clone(),
    };

    let Some(parent_path) = parent_path else {
        return Ok(child);
    };

    let parent_source = loader.load(&parent_path)?;
    let parent_origin = parent_source.origin.clone();
    let parent_merged = merge_chain(loader, parent_source, depth + 1, max_depth, warnings)?;

    merge_step(parent_merged, child, &parent_origin, warnings)
}

fn merge_step(
    parent: MergedConfig,
    child: MergedConfig,
    parent_origin: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<MergedConfig, PromptloomError> {
    match (parent, child) {
        (MergedConfig::Template(p), MergedConfig::Template(c)) => {
            let template = inject_or_replace(&p.template, &c.template, parent_origin, warnings)?;
            Ok(MergedConfig::Template(TemplateConfig {
                parent: None,
                template,
                negative: if c.negative.is_empty() { p.negative } else { c.negative },
                parameters: merge_maps(p.parameters, c.parameters),
                imports: merge_maps(p.imports, c.imports),
            }))
        }
        (MergedConfig::Template(p), MergedConfig::Prompt(c)) => {
            let prompt = inject_or_replace(&p.template, &c.prompt, parent_origin, warnings)?;
            Ok(MergedConfig::Prompt(PromptConfig {
                parent: None,
                prompt,
                generation: c.generation,
                parameters: merge_maps(p.parameters, c.parameters),
                imports: merge_maps(p.imports, c.imports),
                theme: c.theme,
            }))
        }
        (MergedConfig::Prompt(p), MergedConfig::Prompt(c)) => {
            let prompt = inject_or_replace(&p.prompt, &c.prompt, parent_origin, warnings)?;
            Ok(MergedConfig::Prompt(PromptConfig {
                parent: None,
                prompt,
                generation: c.generation,
                parameters: merge_maps(p.parameters, c.parameters),
                imports: merge_maps(p.imports, c.imports),
                theme: c.theme.or(p.theme),
            }))
        }
        (MergedConfig::Chunk(p), MergedConfig::Chunk(c)) => {
            let template = inject_or_replace(&p.template, &c.template, parent_origin, warnings)?;
            Ok(MergedConfig::Chunk(ChunkConfig {
                parent: None,
                template,
                defaults: merge_maps(p.defaults, c.defaults),
                imports: merge_maps(p.imports, c.imports),
            }))
        }
        (parent, child) => Err(PromptloomError::InheritanceError {
            detail: format!(
                "parent kind {} is not compatible with child kind {}",
                kind_name(&parent),
                kind_name(&child)
            ),
        }),
    }
}

fn kind_name(cfg: &MergedConfig) -> &'static str {
    match cfg {
        MergedConfig::Template(_) => "template",
        MergedConfig::Prompt(_) => "prompt",
        MergedConfig::Chunk(_) => "chunk",
    }
}

/// Substitute `child_text` into `parent_text`'s single `{prompt}` marker.
/// Zero markers emits a warning and replaces the parent's text wholesale;
/// more than one is a malformed base template.
fn inject_or_replace(
    parent_text: &str,
    child_text: &str,
    parent_origin: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<String, PromptloomError> {
    match parent_text.matches("{prompt}").count() {
        0 => {
            warnings.push(Warning::ParentPromptMarkerMissing { parent: parent_origin.to_path_buf() });
            Ok(child_text.to_string())
        }
        1 => Ok(parent_text.replacen("{prompt}", child_text, 1)),
        _ => Err(PromptloomError::SchemaViolation {
            detail: format!("'{}' contains more than one {{prompt}} marker", parent_origin.display()),
        }),
    }
}

fn merge_maps<V>(mut parent: IndexMap<String, V>, child: IndexMap<String, V>) -> IndexMap<String, V> {
    for (key, value) in child {
        parent.insert(key, value);
    }
    parent
}
