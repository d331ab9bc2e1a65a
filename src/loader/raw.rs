//! The on-disk YAML shapes the loader deserializes before projecting them
//! into the typed [`crate::types`] model.
//!
//! Authors write one of five shapes, selected by [`crate::types::SourceKind`].
//! Deserialization happens in two passes: first into a generic
//! [`serde_yaml::Value`] so the loader can inspect the `type`/`generation`
//! keys for classification, then into the shape-specific struct below.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::ParamValue;

/// Either a plain string value or a multi-part map — the two shapes a
/// variation entry may take at authoring time.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariationEntryRaw {
    Simple(String),
    Parts(IndexMap<String, String>),
}

/// The value side of an `imports:` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImportValueRaw {
    Single(String),
    Many(Vec<String>),
    Inline(IndexMap<String, VariationEntryRaw>),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTemplateDoc {
    pub parent: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub negative: String,
    #[serde(default)]
    pub parameters: IndexMap<String, ParamValue>,
    #[serde(default)]
    pub imports: IndexMap<String, ImportValueRaw>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPromptDoc {
    pub parent: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub generation: GenerationBlockRaw,
    #[serde(default)]
    pub parameters: IndexMap<String, ParamValue>,
    #[serde(default)]
    pub imports: IndexMap<String, ImportValueRaw>,
    pub theme: Option<ThemeSelectionRaw>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawChunkDoc {
    pub parent: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub defaults: IndexMap<String, String>,
    #[serde(default)]
    pub imports: IndexMap<String, ImportValueRaw>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawVariationsDoc {
    #[serde(default)]
    pub entries: IndexMap<String, VariationEntryRaw>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawThemeDoc {
    /// Keyed by `Name` or `Name.style`. The sentinel value is the literal
    /// string `"[Remove]"`.
    #[serde(default)]
    pub imports: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerationBlockRaw {
    pub mode: Option<String>,
    pub seed: Option<i64>,
    pub seed_mode: Option<String>,
    pub max_images: Option<usize>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub cfg_scale: Option<f64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, ParamValue>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ThemeSelectionRaw {
    pub name: Option<String>,
    pub file: Option<String>,
    pub style: Option<String>,
}
