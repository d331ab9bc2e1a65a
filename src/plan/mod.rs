//! Stage 6: the plan generator.
//!
//! Builds the ordered dimensions of a combinatorial cross-product (or a
//! random sample of one), assigns seeds per the active seed mode, and
//! exposes the result as a lazy [`Iterator`]. All fallible validation
//! (unknown fixed-value keys, unknown selector keys) happens while
//! building the plan — once iteration starts it cannot fail.

use indexmap::IndexMap;

use crate::error::PromptloomError;
use crate::rng::PlanRng;
use crate::selector::SelectionKind;
use crate::template;
use crate::types::{
    EffectiveSeedMode, GenerationMode, PlanOptions, ResolvedConfig, ResolvedContext, RenderedItem, Selection,
};

/// One placeholder's fixed set of candidate variation keys for this plan,
/// already accounting for selectors and fixed-value overrides.
#[derive(Debug, Clone)]
struct Dimension {
    name: String,
    keys: Vec<String>,
}

/// A placeholder resolved once per enumerated item rather than as a
/// cross-product dimension (weight `0`).
#[derive(Debug, Clone)]
struct RandomEachItem {
    name: String,
    keys: Vec<String>,
}

/// The finite, lazily-enumerated sequence of [`RenderedItem`]s a plan
/// produces. Cancellation-safe: the consumer may stop pulling items at any
/// boundary without corrupting plan state.
pub struct GenerationPlan {
    template_text: String,
    negative_text: String,
    parameters: IndexMap<String, crate::types::ParamValue>,
    context: ResolvedContext,
    dimensions: Vec<Dimension>,
    random_each_item: Vec<RandomEachItem>,
    order: Vec<usize>,
    seeds: SeedAssignment,
    rng: PlanRng,
    next: usize,
}

enum SeedAssignment {
    Fixed(i64),
    Progressive { start: i64 },
    Random,
    /// repeat_count × combinatorial item count == order.len(); `seeds[i /
    /// items_per_seed]` gives this item's seed.
    List { seeds: Vec<i64>, items_per_seed: usize },
}

impl Iterator for GenerationPlan {
    type Item = RenderedItem;

    fn next(&mut self) -> Option<RenderedItem> {
        if self.next >= self.order.len() {
            return None;
        }
        let linear = self.order[self.next];
        let combinatorial_index = linear % self.combinatorial_len();
        let emission_index = self.next;
        self.next += 1;

        let mut selections = IndexMap::new();
        let mut applied = IndexMap::new();
        let mut remaining = combinatorial_index;
        for dim in self.dimensions.iter().rev() {
            let len = dim.keys.len().max(1);
            let idx = remaining % len;
            remaining /= len;
            let key = dim.keys[idx].clone();
            if let Some(selection) = self.selection_for(&dim.name, &key) {
                applied.insert(dim.name.clone(), key.clone());
                selections.insert(dim.name.clone(), selection);
            }
        }
        for entry in &self.random_each_item {
            let idx = self.rng.choose_one(entry.keys.len().max(1));
            let key = entry.keys[idx].clone();
            if let Some(selection) = self.selection_for(&entry.name, &key) {
                applied.insert(entry.name.clone(), key.clone());
                selections.insert(entry.name.clone(), selection);
            }
        }

        let seed = match &self.seeds {
            SeedAssignment::Fixed(s) => *s,
            SeedAssignment::Progressive { start } => start + emission_index as i64,
            SeedAssignment::Random => self.rng.next_seed(),
            SeedAssignment::List { seeds, items_per_seed } => seeds[emission_index / (*items_per_seed).max(1)],
        };

        let prompt = template::substitute(&self.template_text, &selections, &self.context)
            .expect("part existence was validated while building the resolved config");
        let negative = template::substitute(&self.negative_text, &selections, &self.context)
            .expect("part existence was validated while building the resolved config");

        Some(RenderedItem {
            prompt,
            negative,
            parameters: self.parameters.clone(),
            seed,
            applied_variations: applied,
        })
    }
}

impl GenerationPlan {
    fn combinatorial_len(&self) -> usize {
        self.dimensions.iter().map(|d| d.keys.len().max(1)).product::<usize>().max(1)
    }

    fn selection_for(&self, name: &str, key: &str) -> Option<Selection> {
        let import = self.context.imports.get(name)?;
        if import.removed {
            return None;
        }
        let parts = import.variations.get(key)?.clone();
        Some(Selection { key: key.to_string(), parts })
    }
}

/// Build a [`GenerationPlan`] from a resolved template and its import
/// context, validating fixed-value overrides and selector references.
pub fn build_plan(
    resolved: &ResolvedConfig,
    context: &ResolvedContext,
    options: PlanOptions,
    seed: u64,
) -> Result<GenerationPlan, PromptloomError> {
    let mut rng = PlanRng::new(seed);

    let mut dimensions = Vec::new();
    let mut random_each_item = Vec::new();

    let mut ordered_placeholders = resolved.placeholders.clone();
    ordered_placeholders.sort_by_key(|p| (p.weight.unwrap_or(u32::MAX), p.first_occurrence));

    for plan in &ordered_placeholders {
        let Some(import) = context.imports.get(&plan.name) else {
            continue;
        };
        if import.removed {
            continue;
        }

        let available: Vec<String> = import.variations.keys();

        let keys = if let Some(fixed) = options.fixed_values.get(&plan.name) {
            if !available.contains(fixed) {
                return Err(PromptloomError::UnknownVariationKey {
                    name: plan.name.clone(),
                    requested: fixed.clone(),
                    available,
                });
            }
            vec![fixed.clone()]
        } else {
            select_keys(&plan.name, &available, plan.selector.as_ref().map(|s| s.selection()), &mut rng)?
        };

        if plan.weight == Some(0) && options.fixed_values.get(&plan.name).is_none() {
            random_each_item.push(RandomEachItem { name: plan.name.clone(), keys });
        } else {
            dimensions.push(Dimension { name: plan.name.clone(), keys });
        }
    }

    for name in options.fixed_values.keys() {
        if context.imports.get(name).is_none() {
            return Err(PromptloomError::UnknownPlaceholder { name: name.clone() });
        }
    }

    let combinatorial_len: usize = dimensions.iter().map(|d| d.keys.len().max(1)).product::<usize>().max(1);

    let (order, seeds) = match &options.seed_mode {
        EffectiveSeedMode::SeedList(seed_list) => {
            let total = combinatorial_len * seed_list.len().max(1);
            let capped = options.max_images.map_or(total, |m| m.min(total));
            (
                (0..capped).collect(),
                SeedAssignment::List { seeds: seed_list.clone(), items_per_seed: combinatorial_len },
            )
        }
        EffectiveSeedMode::Fixed(s) => (combinatorial_order(&options.mode, combinatorial_len, &mut rng, options.max_images), SeedAssignment::Fixed(*s)),
        EffectiveSeedMode::Progressive(s) => (
            combinatorial_order(&options.mode, combinatorial_len, &mut rng, options.max_images),
            SeedAssignment::Progressive { start: *s },
        ),
        EffectiveSeedMode::Random => (
            combinatorial_order(&options.mode, combinatorial_len, &mut rng, options.max_images),
            SeedAssignment::Random,
        ),
    };

    Ok(GenerationPlan {
        template_text: resolved.template_text.clone(),
        negative_text: resolved.negative_text.clone(),
        parameters: resolved.parameters.clone(),
        context: context.clone(),
        dimensions,
        random_each_item,
        order,
        seeds,
        rng,
        next: 0,
    })
}

/// The linear cross-product indices to visit, in emission order.
fn combinatorial_order(mode: &GenerationMode, len: usize, rng: &mut PlanRng, max_images: Option<usize>) -> Vec<usize> {
    match mode {
        GenerationMode::Combinatorial => {
            let capped = max_images.map_or(len, |m| m.min(len));
            (0..capped).collect()
        }
        GenerationMode::Random => {
            let take = max_images.unwrap_or(len);
            rng.sample_distinct(len, take)
        }
    }
}

fn select_keys(
    name: &str,
    available: &[String],
    selection: Option<SelectionKind>,
    rng: &mut PlanRng,
) -> Result<Vec<String>, PromptloomError> {
    match selection {
        None | Some(SelectionKind::All) => Ok(available.to_vec()),
        Some(SelectionKind::Random(n)) => {
            let indices = rng.choose_distinct_indices(available.len(), n);
            Ok(indices.into_iter().map(|i| available[i].clone()).collect())
        }
        Some(SelectionKind::Indices(indices)) => indices
            .into_iter()
            .map(|i| {
                available.get(i).cloned().ok_or_else(|| PromptloomError::UnknownVariationKey {
                    name: name.to_string(),
                    requested: format!("#{i}"),
                    available: available.to_vec(),
                })
            })
            .collect(),
        Some(SelectionKind::Keys(keys)) => keys
            .into_iter()
            .map(|key| {
                if available.contains(&key) {
                    Ok(key)
                } else {
                    Err(PromptloomError::UnknownVariationKey {
                        name: name.to_string(),
                        requested: key,
                        available: available.to_vec(),
                    })
                }
            })
            .collect(),
    }
}
