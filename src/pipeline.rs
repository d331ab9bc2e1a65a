//! The three external-interface operations wiring the six pipeline stages
//! together: loader → inheritance → theme → imports → template → plan.
//!
//! `pipeline::load_and_resolve` is the only place in the crate that knows
//! about the stage order; every stage module is otherwise ignorant of its
//! neighbors.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::PromptloomError;
use crate::loader::Loader;
use crate::types::{
    EffectiveSeedMode, PlanOptions, ResolvedConfig, ResolvedContext, SeedMode, ThemeSelection,
};
use crate::{imports, inherit, plan, template, theme};

/// Import/inheritance recursion is capped here; the source corpus never
/// nests deeper than a handful of levels, and this bound exists only to
/// turn an authoring mistake into [`PromptloomError::DepthError`] instead
/// of a stack overflow.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Load `template_path`, resolve its inheritance chain, apply the named or
/// explicit theme overlay, resolve every import and chunk it references,
/// and produce the fully resolved template plus its import context.
#[tracing::instrument(skip_all, fields(template = %template_path.display()))]
pub fn load_and_resolve(
    template_path: &Path,
    theme: Option<&str>,
    theme_file: Option<&Path>,
    style: Option<&str>,
    themes_root: Option<&Path>,
) -> Result<(ResolvedConfig, ResolvedContext), PromptloomError> {
    let mut loader = Loader::new();

    tracing::debug!("loading source");
    let source = loader.load(template_path)?;

    tracing::debug!("resolving inheritance chain");
    let (merged, inherit_warnings) = inherit::resolve_inheritance(&mut loader, source, DEFAULT_MAX_DEPTH)?;

    let selection = if theme.is_some() || theme_file.is_some() || style.is_some() {
        Some(ThemeSelection {
            name: theme.map(str::to_string),
            file: theme_file.map(Path::to_path_buf),
            style: style.map(str::to_string),
        })
    } else {
        None
    };

    tracing::debug!(has_theme = selection.is_some(), "applying theme overlay");
    let (merged, theme_removed) = theme::apply_theme(merged, &mut loader, themes_root, selection.as_ref())?;

    let template_text = merged.template_text().to_string();
    inherit::ensure_fully_resolved(&template_text)?;

    tracing::debug!("resolving imports");
    let mut context = imports::resolve_imports(&mut loader, merged.imports(), &template_text, DEFAULT_MAX_DEPTH, &theme_removed)?;
    context.style = style.map(str::to_string).unwrap_or_default();

    tracing::debug!("expanding chunk directives");
    let expanded_text = template::expand_chunks(&context.chunks, &template_text, 0, DEFAULT_MAX_DEPTH)?;

    let (negative_text, parameters, generation) = match &merged {
        crate::types::MergedConfig::Prompt(p) => (String::new(), p.parameters.clone(), p.generation.clone()),
        crate::types::MergedConfig::Template(t) => (t.negative.clone(), t.parameters.clone(), Default::default()),
        crate::types::MergedConfig::Chunk(_) => {
            return Err(PromptloomError::SchemaViolation {
                detail: format!("'{}' resolves to a chunk, which is not directly executable", template_path.display()),
            });
        }
    };

    for warning in &inherit_warnings {
        tracing::warn!(%warning, "inheritance warning");
    }
    for warning in &context.warnings {
        tracing::warn!(%warning, "import warning");
    }

    let mut resolved = template::build_resolved_config(expanded_text, negative_text, parameters, generation, &context)?;
    let own_warnings = std::mem::take(&mut resolved.warnings);
    resolved.warnings = inherit_warnings.into_iter().chain(own_warnings).collect();

    Ok((resolved, context))
}

/// Validate and fold consumer overrides (fixed values, an explicit seed
/// list) into a [`PlanOptions`] that `enumerate_plan` can build a plan
/// from, without mutating `resolved`'s own generation block.
pub fn apply_overrides(
    context: ResolvedContext,
    resolved: &ResolvedConfig,
    fixed_values: Option<IndexMap<String, String>>,
    seed_list: Option<Vec<i64>>,
) -> Result<(ResolvedContext, PlanOptions), PromptloomError> {
    let fixed_values = fixed_values.unwrap_or_default();

    for (name, requested) in &fixed_values {
        let import = context
            .imports
            .get(name)
            .ok_or_else(|| PromptloomError::UnknownPlaceholder { name: name.clone() })?;
        if import.variations.get(requested).is_none() {
            return Err(PromptloomError::UnknownVariationKey {
                name: name.clone(),
                requested: requested.clone(),
                available: import.variations.keys(),
            });
        }
    }

    let seed_mode = match seed_list {
        Some(seeds) if !seeds.is_empty() => EffectiveSeedMode::SeedList(seeds),
        _ => match resolved.generation.seed_mode {
            SeedMode::Fixed(s) => EffectiveSeedMode::Fixed(s),
            SeedMode::Progressive(s) => EffectiveSeedMode::Progressive(s),
            SeedMode::Random => EffectiveSeedMode::Random,
        },
    };

    let options = PlanOptions {
        mode: resolved.generation.mode,
        seed_mode,
        max_images: resolved.generation.max_images,
        fixed_values,
    };

    Ok((context, options))
}

/// Build the lazy [`plan::GenerationPlan`] iterator. The PRNG seed
/// threading every random choice in the plan is derived from the fixed or
/// progressive seed when one is configured, and from the system entropy
/// pool otherwise — the plan's own per-item seed assignment is independent
/// of this value.
pub fn enumerate_plan(
    resolved: &ResolvedConfig,
    context: &ResolvedContext,
    options: PlanOptions,
) -> Result<plan::GenerationPlan, PromptloomError> {
    let prng_seed = match &options.seed_mode {
        EffectiveSeedMode::Fixed(s) | EffectiveSeedMode::Progressive(s) => *s as u64,
        EffectiveSeedMode::SeedList(seeds) => seeds.first().copied().unwrap_or(0) as u64,
        EffectiveSeedMode::Random => rand::random::<u64>(),
    };
    plan::build_plan(resolved, context, options, prng_seed)
}
