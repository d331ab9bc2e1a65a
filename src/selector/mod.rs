//! The selector grammar: `{Name[random:2;$3]}`-style bracket contents.
//!
//! The grammar is small enough to hand-write: a tokenizer that splits on
//! top-level `;`, and a recursive-descent parser over each segment. No
//! regular-expression cascades here — [`crate::template`] uses one compiled
//! regex to *locate* placeholder spans in template text, but the selector
//! body itself is parsed by hand.

use crate::error::PromptloomError;

/// One parsed selector, or a combination of several joined by `;`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// No selection constraint: every variation participates.
    All,
    /// `random:N` — N distinct variations chosen at random.
    Random(usize),
    /// `#i,j,k` — variations at the given positional indices.
    Indices(Vec<usize>),
    /// `key1,key2,…` — variations by name.
    Keys(Vec<String>),
    /// `$W` — assign weight `W`.
    Weight(u32),
    /// Several selector atoms combined with `;`.
    Combo(Vec<Selector>),
}

/// The selection-shape half of a (possibly combined) selector, with the
/// weight stripped out.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionKind {
    All,
    Random(usize),
    Indices(Vec<usize>),
    Keys(Vec<String>),
}

impl Selector {
    /// Parse the contents of a `[...]` bracket (brackets already stripped).
    pub fn parse(input: &str) -> Result<Self, PromptloomError> {
        let atoms: Vec<&str> = input.split(';').map(str::trim).collect();
        if atoms.is_empty() || atoms.iter().any(|a| a.is_empty()) {
            return Err(PromptloomError::SelectorSyntax {
                fragment: input.to_string(),
            });
        }

        let mut parsed = Vec::with_capacity(atoms.len());
        for atom in atoms {
            parsed.push(parse_atom(atom, input)?);
        }

        if parsed.len() == 1 {
            Ok(parsed.into_iter().next().expect("checked len == 1"))
        } else {
            Ok(Selector::Combo(parsed))
        }
    }

    /// The weight assigned by this selector, if any. When several `$W`
    /// atoms are combined (not expected from a single bracket, but possible
    /// across repeated references to the same placeholder — see
    /// [`Selector::merge_occurrence`]), the last one wins.
    pub fn weight(&self) -> Option<u32> {
        match self {
            Selector::Weight(w) => Some(*w),
            Selector::Combo(parts) => parts.iter().filter_map(Selector::weight).last(),
            _ => None,
        }
    }

    /// The selection shape, ignoring any weight atom. Defaults to `All`
    /// when the selector carries only a weight.
    pub fn selection(&self) -> SelectionKind {
        match self {
            Selector::All => SelectionKind::All,
            Selector::Random(n) => SelectionKind::Random(*n),
            Selector::Indices(idx) => SelectionKind::Indices(idx.clone()),
            Selector::Keys(keys) => SelectionKind::Keys(keys.clone()),
            Selector::Weight(_) => SelectionKind::All,
            Selector::Combo(parts) => parts
                .iter()
                .find_map(|p| match p {
                    Selector::Weight(_) => None,
                    other => Some(other.selection()),
                })
                .unwrap_or(SelectionKind::All),
        }
    }

    /// Combine this selector (from an earlier reference to the same
    /// placeholder) with a later one: the union of selections is taken,
    /// but the later occurrence's weight wins.
    pub fn merge_occurrence(earlier: Option<&Selector>, later: &Selector) -> Selector {
        let Some(earlier) = earlier else {
            return later.clone();
        };
        let union = union_selection(&earlier.selection(), &later.selection());
        let weight = later.weight().or_else(|| earlier.weight());

        let mut parts = vec![selection_to_selector(union)];
        if let Some(w) = weight {
            parts.push(Selector::Weight(w));
        }
        if parts.len() == 1 {
            parts.into_iter().next().expect("len == 1")
        } else {
            Selector::Combo(parts)
        }
    }
}

fn selection_to_selector(kind: SelectionKind) -> Selector {
    match kind {
        SelectionKind::All => Selector::All,
        SelectionKind::Random(n) => Selector::Random(n),
        SelectionKind::Indices(idx) => Selector::Indices(idx),
        SelectionKind::Keys(keys) => Selector::Keys(keys),
    }
}

fn union_selection(a: &SelectionKind, b: &SelectionKind) -> SelectionKind {
    match (a, b) {
        (SelectionKind::Keys(x), SelectionKind::Keys(y)) => {
            let mut merged = x.clone();
            for key in y {
                if !merged.contains(key) {
                    merged.push(key.clone());
                }
            }
            SelectionKind::Keys(merged)
        }
        (SelectionKind::Indices(x), SelectionKind::Indices(y)) => {
            let mut merged = x.clone();
            for idx in y {
                if !merged.contains(idx) {
                    merged.push(*idx);
                }
            }
            SelectionKind::Indices(merged)
        }
        // Mismatched or All-involving shapes: the later occurrence's shape
        // is the most specific intent available, so prefer it outright.
        _ => b.clone(),
    }
}

fn parse_atom(atom: &str, whole: &str) -> Result<Selector, PromptloomError> {
    let syntax_err = || PromptloomError::SelectorSyntax {
        fragment: whole.to_string(),
    };

    if let Some(rest) = atom.strip_prefix("random:") {
        let n: usize = rest.trim().parse().map_err(|_| syntax_err())?;
        return Ok(Selector::Random(n));
    }
    if let Some(rest) = atom.strip_prefix('#') {
        let indices = rest
            .split(',')
            .map(|s| s.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| syntax_err())?;
        if indices.is_empty() {
            return Err(syntax_err());
        }
        return Ok(Selector::Indices(indices));
    }
    if let Some(rest) = atom.strip_prefix('$') {
        let weight: u32 = rest.trim().parse().map_err(|_| syntax_err())?;
        return Ok(Selector::Weight(weight));
    }

    let keys: Vec<String> = atom.split(',').map(|s| s.trim().to_string()).collect();
    if keys.iter().any(String::is_empty) {
        return Err(syntax_err());
    }
    Ok(Selector::Keys(keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_random() {
        assert_eq!(Selector::parse("random:3").unwrap(), Selector::Random(3));
    }

    #[test]
    fn parses_indices() {
        assert_eq!(
            Selector::parse("#1,2,3").unwrap(),
            Selector::Indices(vec![1, 2, 3])
        );
    }

    #[test]
    fn parses_keys() {
        assert_eq!(
            Selector::parse("blonde,red").unwrap(),
            Selector::Keys(vec!["blonde".to_string(), "red".to_string()])
        );
    }

    #[test]
    fn parses_single_key() {
        assert_eq!(Selector::parse("blonde").unwrap(), Selector::Keys(vec!["blonde".to_string()]));
    }

    #[test]
    fn parses_weight() {
        assert_eq!(Selector::parse("$5").unwrap(), Selector::Weight(5));
    }

    #[test]
    fn parses_combo() {
        let sel = Selector::parse("random:10;$5").unwrap();
        assert_eq!(sel.weight(), Some(5));
        assert_eq!(sel.selection(), SelectionKind::Random(10));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Selector::parse("random:abc").is_err());
        assert!(Selector::parse("#x,y").is_err());
        assert!(Selector::parse("$abc").is_err());
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse(";").is_err());
    }

    #[test]
    fn merge_occurrence_takes_union_and_last_weight() {
        let first = Selector::parse("blonde;$1").unwrap();
        let second = Selector::parse("red;$9").unwrap();
        let merged = Selector::merge_occurrence(Some(&first), &second);
        assert_eq!(merged.weight(), Some(9));
        assert_eq!(
            merged.selection(),
            SelectionKind::Keys(vec!["blonde".to_string(), "red".to_string()])
        );
    }

    #[test]
    fn merge_occurrence_without_earlier_keeps_later() {
        let later = Selector::parse("$2").unwrap();
        let merged = Selector::merge_occurrence(None, &later);
        assert_eq!(merged, later);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_n_roundtrips(n in 0usize..10_000) {
                let parsed = Selector::parse(&format!("random:{n}")).unwrap();
                prop_assert_eq!(parsed, Selector::Random(n));
            }

            #[test]
            fn weight_roundtrips(w in any::<u32>()) {
                let parsed = Selector::parse(&format!("${w}")).unwrap();
                prop_assert_eq!(parsed.weight(), Some(w));
            }

            #[test]
            fn indices_roundtrip(indices in prop::collection::vec(0usize..50, 1..6)) {
                let fragment = indices.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
                let parsed = Selector::parse(&format!("#{fragment}")).unwrap();
                prop_assert_eq!(parsed, Selector::Indices(indices));
            }

            /// Merging a selector's occurrence with itself never drops any
            /// of its keys: the union is always at least as large.
            #[test]
            fn merge_occurrence_union_never_shrinks(keys in prop::collection::vec("[a-z]{1,6}", 1..5)) {
                let fragment = keys.join(",");
                let sel = Selector::parse(&fragment).unwrap();
                let merged = Selector::merge_occurrence(Some(&sel), &sel);
                if let SelectionKind::Keys(merged_keys) = merged.selection() {
                    prop_assert!(merged_keys.len() >= keys.len());
                } else {
                    prop_assert!(false, "expected a Keys selection");
                }
            }
        }
    }
}
