//! Stage 5: the template resolver.
//!
//! Chunk directives (`@Name`, `@{Name k=v}`) expand before placeholders are
//! parsed, since an expanded chunk's own text may introduce further
//! placeholder references. A single compiled regex locates each kind of
//! reference span in the surrounding text, while the selector body inside a
//! placeholder's brackets is handed off to [`crate::selector`]'s
//! hand-written parser.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::error::PromptloomError;
use crate::selector::Selector;
use crate::types::{ChunkConfig, PlaceholderPlan, ResolvedContext, ResolvedConfig, Selection};

/// Matches `{Name}`, `{Name:part}`, or `{Name[selector]}`. Both the
/// selector and part groups are optional so a reference combining both
/// can be rejected explicitly rather than silently mis-parsed.
fn placeholder_regex() -> Regex {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?:\[([^\]]*)\])?(?::([A-Za-z_][A-Za-z0-9_]*))?\}")
        .expect("placeholder regex is a fixed, valid pattern")
}

/// Matches `@Name` or `@{Name p1=v1, p2=v2}`.
fn chunk_regex() -> Regex {
    Regex::new(r"@(?:\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("chunk regex is a fixed, valid pattern")
}

/// Every placeholder/chunk name directly referenced in `text`, in first
/// occurrence order. Used by the import resolver to know which
/// declared imports to actually load, and by this stage to know which
/// chunk directives need an import-map entry.
pub fn referenced_names(text: &str) -> Result<IndexSet<String>, PromptloomError> {
    let mut names = IndexSet::new();
    for caps in placeholder_regex().captures_iter(text) {
        validate_reference(&caps)?;
        names.insert(caps[1].to_string());
    }
    for caps in chunk_regex().captures_iter(text) {
        let name = caps.get(1).or_else(|| caps.get(3)).expect("one alternative always matches");
        names.insert(name.as_str().to_string());
    }
    Ok(names)
}

fn validate_reference(caps: &regex::Captures) -> Result<(), PromptloomError> {
    if caps.get(2).is_some() && caps.get(3).is_some() {
        return Err(PromptloomError::SelectorSyntax {
            fragment: caps[0].to_string(),
        });
    }
    Ok(())
}

/// Recursively expand `@Name`/`@{Name k=v}` chunk directives in `text`,
/// splicing in each chunk's own template text with its invocation params
/// bound over its declared defaults. Depth-bounded the same way imports
/// are.
pub fn expand_chunks(
    chunks: &IndexMap<String, ChunkConfig>,
    text: &str,
    depth: usize,
    max_depth: usize,
) -> Result<String, PromptloomError> {
    if depth > max_depth {
        return Err(PromptloomError::DepthError { limit: max_depth });
    }

    let re = chunk_regex();
    if !re.is_match(text) {
        return Ok(text.to_string());
    }

    let mut output = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in re.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always matches");
        output.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        let (name, params_src) = match caps.get(1) {
            Some(braced_name) => (braced_name.as_str(), caps.get(2).map_or("", |m| m.as_str())),
            None => (caps.get(3).expect("one alternative always matches").as_str(), ""),
        };

        let chunk = chunks.get(name).ok_or_else(|| PromptloomError::UnknownPlaceholder {
            name: name.to_string(),
        })?;

        let bound = parse_bind_params(params_src)?;
        let mut effective = chunk.defaults.clone();
        for (key, value) in bound {
            effective.insert(key, value);
        }

        let substituted = substitute_literal_defaults(&chunk.template, &effective);
        let expanded = expand_chunks(chunks, &substituted, depth + 1, max_depth)?;
        output.push_str(&expanded);
    }
    output.push_str(&text[last_end..]);
    Ok(output)
}

/// Parse `p1=v1, p2=v2` invocation params off a braced chunk directive.
fn parse_bind_params(src: &str) -> Result<IndexMap<String, String>, PromptloomError> {
    let mut params = IndexMap::new();
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Ok(params);
    }
    for pair in trimmed.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').ok_or_else(|| PromptloomError::SelectorSyntax {
            fragment: src.to_string(),
        })?;
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(params)
}

/// Substitute `{Key}` tokens in `text` whose name is in `defaults`,
/// literally. Any other `{Name}` reference is left untouched for the
/// regular placeholder pass later.
fn substitute_literal_defaults(text: &str, defaults: &IndexMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            if caps.get(2).is_none() && caps.get(3).is_none() {
                if let Some(value) = defaults.get(name) {
                    return value.clone();
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}

/// Build the ordered [`PlaceholderPlan`] list for a (chunk-expanded)
/// template's placeholder references, applying the occurrence-merge
/// rule and flagging weights on placeholders that never actually appear.
pub fn build_resolved_config(
    template_text: String,
    negative_text: String,
    parameters: IndexMap<String, crate::types::ParamValue>,
    generation: crate::types::GenerationBlock,
    context: &ResolvedContext,
) -> Result<ResolvedConfig, PromptloomError> {
    let mut plans: IndexMap<String, PlaceholderPlan> = IndexMap::new();
    let warnings = context.warnings.clone();

    for (occurrence, caps) in placeholder_regex().captures_iter(&template_text).enumerate() {
        validate_reference(&caps)?;
        let name = caps[1].to_string();
        let part = caps.get(3).map(|m| m.as_str());

        if !context.imports.contains_key(&name) {
            return Err(PromptloomError::UnknownPlaceholder { name });
        }

        if let Some(part_name) = part {
            validate_part_exists(context, &name, part_name)?;
        }

        let selector = match caps.get(2) {
            Some(m) => Some(Selector::parse(m.as_str())?),
            None => None,
        };

        match plans.get_mut(&name) {
            Some(existing) => {
                let merged = Selector::merge_occurrence(existing.selector.as_ref(), selector.as_ref().unwrap_or(&Selector::All));
                existing.weight = merged.weight().or(existing.weight);
                existing.selector = Some(merged);
            }
            None => {
                plans.insert(
                    name.clone(),
                    PlaceholderPlan {
                        name,
                        weight: selector.as_ref().and_then(Selector::weight),
                        selector,
                        first_occurrence: occurrence,
                    },
                );
            }
        }
    }

    Ok(ResolvedConfig {
        template_text,
        negative_text,
        parameters,
        generation,
        placeholders: plans.into_values().collect(),
        warnings,
    })
}

/// A `{Name:part}` reference must resolve no matter which variation ends
/// up chosen at enumeration time (no per-item failure is allowed after
/// enumeration begins), so `part` must be present on *every* entry, not
/// just some.
fn validate_part_exists(context: &ResolvedContext, name: &str, part: &str) -> Result<(), PromptloomError> {
    let Some(import) = context.imports.get(name) else {
        return Ok(());
    };
    if import.variations.entries.is_empty() {
        return Ok(());
    }
    let all_have = import.variations.entries.values().all(|parts| parts.contains_key(part));
    if !all_have {
        let available: IndexSet<String> = import.variations.parts_in_use();
        return Err(PromptloomError::UnknownPart {
            name: name.to_string(),
            variation_key: String::new(),
            part: part.to_string(),
            available_parts: available.into_iter().collect(),
        });
    }
    Ok(())
}

/// Render one enumerated item's template text: substitute every
/// placeholder reference with the part value from `selections`, or the
/// empty string for a placeholder the active theme removed.
pub fn substitute(
    text: &str,
    selections: &IndexMap<String, Selection>,
    context: &ResolvedContext,
) -> Result<String, PromptloomError> {
    let mut err = None;
    let rendered = placeholder_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let part = caps.get(3).map_or("main", |m| m.as_str());

            if context.imports.get(name).is_some_and(|import| import.removed) {
                return String::new();
            }

            match selections.get(name) {
                Some(selection) => match selection.parts.get(part) {
                    Some(value) => value.clone(),
                    None => {
                        err.get_or_insert(PromptloomError::UnknownPart {
                            name: name.to_string(),
                            variation_key: selection.key.clone(),
                            part: part.to_string(),
                            available_parts: selection.parts.keys().cloned().collect(),
                        });
                        String::new()
                    }
                },
                None => String::new(),
            }
        })
        .into_owned();

    match err {
        Some(e) => Err(e),
        None => Ok(rendered),
    }
}
