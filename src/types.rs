//! Shared data model for the resolution pipeline.
//!
//! Every stage in [`crate::pipeline`] takes one of these types by value or
//! shared reference and returns a fresh one; no stage mutates another
//! stage's output in place.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// The five document kinds a [`Source`] can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Template,
    Prompt,
    Chunk,
    VariationSet,
    Theme,
}

impl SourceKind {
    /// The `type:` field values that map onto each kind.
    pub fn from_type_field(value: &str) -> Option<Self> {
        match value {
            "template" => Some(Self::Template),
            "prompt" => Some(Self::Prompt),
            "chunk" => Some(Self::Chunk),
            "theme_config" => Some(Self::Theme),
            "variations" => Some(Self::VariationSet),
            _ => None,
        }
    }
}

/// A generic scalar parameter value (numeric generation parameters, and
/// anything an author drops into a `parameters:` block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::String(s) => write!(f, "{s}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A loaded, classified document. The raw tree is discarded once the
/// loader has projected it into a [`SourceDocument`]; only that typed
/// projection is cached.
#[derive(Debug, Clone)]
pub struct Source {
    pub kind: SourceKind,
    pub origin: PathBuf,
    pub document: SourceDocument,
}

/// The typed projection of a loaded document, one variant per [`SourceKind`].
#[derive(Debug, Clone)]
pub enum SourceDocument {
    Template(TemplateConfig),
    Prompt(PromptConfig),
    Chunk(ChunkConfig),
    Variations(VariationSet),
    Theme(ThemeConfig),
}

/// Where an import points: a single file, several files to be merged, or a
/// variation set authored inline in the parent document.
#[derive(Debug, Clone)]
pub enum ImportSpec {
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    Inline(VariationSet),
}

/// Base parameterized prompt; not directly executable.
#[derive(Debug, Clone, Default)]
pub struct TemplateConfig {
    pub parent: Option<PathBuf>,
    pub template: String,
    pub negative: String,
    pub parameters: IndexMap<String, ParamValue>,
    pub imports: IndexMap<String, ImportSpec>,
}

/// Executable leaf that implements a template.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub parent: Option<PathBuf>,
    pub prompt: String,
    pub generation: GenerationBlock,
    pub parameters: IndexMap<String, ParamValue>,
    pub imports: IndexMap<String, ImportSpec>,
    pub theme: Option<ThemeSelection>,
}

/// Reusable fragment injected via `@Name` or `@{Name k=v}`.
#[derive(Debug, Clone, Default)]
pub struct ChunkConfig {
    pub parent: Option<PathBuf>,
    pub template: String,
    pub defaults: IndexMap<String, String>,
    pub imports: IndexMap<String, ImportSpec>,
}

/// The merged output of the inheritance resolver: same shape as a
/// child document, but with parent content folded in.
#[derive(Debug, Clone)]
pub enum MergedConfig {
    Template(TemplateConfig),
    Prompt(PromptConfig),
    Chunk(ChunkConfig),
}

impl MergedConfig {
    pub fn imports(&self) -> &IndexMap<String, ImportSpec> {
        match self {
            MergedConfig::Template(c) => &c.imports,
            MergedConfig::Prompt(c) => &c.imports,
            MergedConfig::Chunk(c) => &c.imports,
        }
    }

    pub fn template_text(&self) -> &str {
        match self {
            MergedConfig::Template(c) => &c.template,
            MergedConfig::Prompt(c) => &c.prompt,
            MergedConfig::Chunk(c) => &c.template,
        }
    }
}

/// Which theme to apply and under what style (parsed off a prompt's
/// optional `theme:` block, or supplied by the CLI collaborator).
#[derive(Debug, Clone, Default)]
pub struct ThemeSelection {
    pub name: Option<String>,
    pub file: Option<PathBuf>,
    pub style: Option<String>,
}

/// A replacement import map, optionally style-qualified.
#[derive(Debug, Clone, Default)]
pub struct ThemeConfig {
    /// Keyed by `Name` or `Name.style`.
    pub imports: IndexMap<String, ThemeImportValue>,
}

/// One entry in a [`ThemeConfig`]'s import map.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeImportValue {
    /// The `[Remove]` sentinel: erase the placeholder for this style.
    Remove,
    Path(PathBuf),
}

/// A normalised mapping from variation key to part-map.
///
/// Every entry is stored in multi-part form; a simple string entry becomes
/// a single `main` part at load time. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariationSet {
    pub multi_part: bool,
    pub entries: IndexMap<String, IndexMap<String, String>>,
}

impl VariationSet {
    /// Build a variation set from simple string entries.
    pub fn from_simple(entries: IndexMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| {
                let mut parts = IndexMap::new();
                parts.insert("main".to_string(), value);
                (key, parts)
            })
            .collect();
        Self { multi_part: false, entries }
    }

    /// The ordered list of variation keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<&IndexMap<String, String>> {
        self.entries.get(key)
    }

    /// Every part name that appears on any entry, in first-seen order.
    pub fn parts_in_use(&self) -> IndexSet<String> {
        let mut parts = IndexSet::new();
        for entry in self.entries.values() {
            for part in entry.keys() {
                parts.insert(part.clone());
            }
        }
        parts
    }

    /// Merge `other` into `self`, with `other`'s keyed entries overriding
    /// `self`'s on conflict: later sources override earlier ones.
    pub fn merge_from(&mut self, other: VariationSet) {
        self.multi_part = self.multi_part || other.multi_part;
        for (key, value) in other.entries {
            self.entries.insert(key, value);
        }
    }
}

/// One placeholder's plan for enumeration: its effective weight and the
/// concrete, ordered list of candidate keys selected for it.
#[derive(Debug, Clone)]
pub struct PlaceholderPlan {
    pub name: String,
    /// `None` means "implicit/shared weight"; tie-broken by first occurrence.
    pub weight: Option<u32>,
    pub selector: Option<Selector>,
    pub first_occurrence: usize,
}

/// Output of the template resolver: chunk-expanded text plus the
/// parsed placeholder plans the plan generator will enumerate over.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub template_text: String,
    pub negative_text: String,
    pub parameters: IndexMap<String, ParamValue>,
    pub generation: GenerationBlock,
    pub placeholders: Vec<PlaceholderPlan>,
    pub warnings: Vec<crate::error::Warning>,
}

/// One resolved import entry with provenance, and whether a theme's
/// `[Remove]` sentinel erased it for the active style.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub variations: VariationSet,
    pub provenance: Vec<PathBuf>,
    pub removed: bool,
}

/// Output of the import resolver: every placeholder's resolved
/// variation set, every chunk reachable by name, plus the active style
/// token.
///
/// A chunk-sourced import never produces a [`VariationSet`] entry in
/// `imports` — chunks aren't variation-keyed — so it lives in `chunks`
/// instead, keyed by the same name a `@Name` directive would use.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContext {
    pub imports: IndexMap<String, ResolvedImport>,
    pub chunks: IndexMap<String, ChunkConfig>,
    pub style: String,
    pub warnings: Vec<crate::error::Warning>,
}

/// How the plan generator should enumerate the cross-product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Combinatorial,
    Random,
}

/// Per-item seed assignment policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedMode {
    Fixed(i64),
    Progressive(i64),
    Random,
}

/// Numeric/backend parameters plus the enumeration and seed policy for a
/// prompt.
#[derive(Debug, Clone)]
pub struct GenerationBlock {
    pub mode: GenerationMode,
    pub seed_mode: SeedMode,
    pub max_images: Option<usize>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub extra: IndexMap<String, ParamValue>,
}

impl Default for GenerationBlock {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Combinatorial,
            seed_mode: SeedMode::Fixed(0),
            max_images: None,
            width: None,
            height: None,
            steps: None,
            cfg_scale: None,
            extra: IndexMap::new(),
        }
    }
}

/// The effective seed policy after overrides are applied: the
/// three base modes, plus the seed-list mode entered only via an explicit
/// consumer override.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveSeedMode {
    Fixed(i64),
    Progressive(i64),
    Random,
    SeedList(Vec<i64>),
}

/// Consumer-supplied overrides and the mode/seed policy they produce
/// the return value of [`crate::pipeline::apply_overrides`].
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub mode: GenerationMode,
    pub seed_mode: EffectiveSeedMode,
    pub max_images: Option<usize>,
    pub fixed_values: IndexMap<String, String>,
}

/// The concrete variation chosen for one placeholder in one enumerated
/// item: the key plus its full (already-normalised) part map, so
/// `{Name:part}` substitution never has to re-touch the variation set.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub key: String,
    pub parts: IndexMap<String, String>,
}

/// One fully resolved backend request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedItem {
    pub prompt: String,
    pub negative: String,
    pub parameters: IndexMap<String, ParamValue>,
    pub seed: i64,
    pub applied_variations: IndexMap<String, String>,
}
