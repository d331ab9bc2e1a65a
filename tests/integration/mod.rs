//! End-to-end scenarios exercised through the public pipeline API.

use indexmap::IndexMap;
use promptloom::pipeline;
use promptloom::test_utils::TestWorkspace;

fn prompt_doc(prompt: &str, generation: &str, imports: &[(&str, &str)]) -> String {
    let mut body = format!("prompt: {prompt:?}\ngeneration:\n{generation}");
    if !imports.is_empty() {
        body.push_str("imports:\n");
        for (key, path) in imports {
            body.push_str(&format!("  {key}: {path}\n"));
        }
    }
    body
}

/// Scenario A — minimal combinatorial enumeration with progressive seeds.
#[test]
fn scenario_a_minimal_combinatorial() {
    let ws = TestWorkspace::new();
    ws.write_variations("hair.yaml", &[("blonde", "blonde hair"), ("red", "red hair")]);
    ws.write_variations("mood.yaml", &[("happy", "smiling"), ("sad", "crying")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "portrait, {Hair}, {Mood}",
            "  mode: combinatorial\n  seed_mode: progressive\n  seed: 100\n",
            &[("Hair", "hair.yaml"), ("Mood", "mood.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let (context, options) = pipeline::apply_overrides(context, &resolved, None, None).unwrap();
    let items: Vec<_> = pipeline::enumerate_plan(&resolved, &context, options).unwrap().collect();

    let prompts: Vec<&str> = items.iter().map(|i| i.prompt.as_str()).collect();
    assert_eq!(
        prompts,
        vec![
            "portrait, blonde hair, smiling",
            "portrait, blonde hair, crying",
            "portrait, red hair, smiling",
            "portrait, red hair, crying",
        ]
    );
    let seeds: Vec<i64> = items.iter().map(|i| i.seed).collect();
    assert_eq!(seeds, vec![100, 101, 102, 103]);
}

/// Scenario B — weights determine outer/inner enumeration order.
#[test]
fn scenario_b_weights_order_dimensions() {
    let ws = TestWorkspace::new();
    ws.write_variations("a.yaml", &[("a1", "a1"), ("a2", "a2")]);
    ws.write_variations("b.yaml", &[("b1", "b1"), ("b2", "b2"), ("b3", "b3")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "{A[$1]}, {B[$10]}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("A", "a.yaml"), ("B", "b.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let (context, options) = pipeline::apply_overrides(context, &resolved, None, None).unwrap();
    let prompts: Vec<String> = pipeline::enumerate_plan(&resolved, &context, options)
        .unwrap()
        .map(|i| i.prompt)
        .collect();

    assert_eq!(
        prompts,
        vec!["a1, b1", "a1, b2", "a1, b3", "a2, b1", "a2, b2", "a2, b3"]
    );
}

/// Scenario C — a weight-0 placeholder is excluded from the cross-product
/// and resolved once per emitted item instead.
#[test]
fn scenario_c_zero_weight_is_per_item() {
    let ws = TestWorkspace::new();
    ws.write_variations("a.yaml", &[("a1", "a1"), ("a2", "a2")]);
    ws.write_variations("q.yaml", &[("q1", "q1"), ("q2", "q2"), ("q3", "q3")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "{A[$1]}, {Q[$0]}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("A", "a.yaml"), ("Q", "q.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let (context, options) = pipeline::apply_overrides(context, &resolved, None, None).unwrap();
    let items: Vec<_> = pipeline::enumerate_plan(&resolved, &context, options).unwrap().collect();

    assert_eq!(items.len(), 2);
    for item in &items {
        assert!(["q1", "q2", "q3"].iter().any(|q| item.prompt.ends_with(q)));
    }
}

/// Scenario D — a multi-part placeholder referenced with different parts
/// and a selector all agree on the same chosen key.
#[test]
fn scenario_d_multi_part_selector_consistency() {
    let ws = TestWorkspace::new();
    ws.write(
        "hair.yaml",
        "type: variations\nentries:\n  blonde:\n    main: \"blonde hair\"\n    lora: \"<lora:blonde:0.8>\"\n  red:\n    main: \"red hair\"\n    lora: \"<lora:red:0.8>\"\n",
    );
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "{H:main}, detailed, {H:lora}, {H[random:1]}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 42\n",
            &[("H", "hair.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let (context, options) = pipeline::apply_overrides(context, &resolved, None, None).unwrap();
    let items: Vec<_> = pipeline::enumerate_plan(&resolved, &context, options).unwrap().collect();

    assert_eq!(items.len(), 1);
    let prompt = &items[0].prompt;
    let chosen_main = if prompt.contains("blonde hair") { "blonde" } else { "red" };
    let expected_lora = format!("<lora:{chosen_main}:0.8>");
    assert!(prompt.contains(&expected_lora));
    let expected_fourth = if chosen_main == "blonde" { "blonde hair" } else { "red hair" };
    assert_eq!(prompt.matches(expected_fourth).count(), 2);
}

/// Scenario E — an explicit seed list re-emits the full cross-product
/// once per seed, in list order.
#[test]
fn scenario_e_seed_list_repeats_cross_product() {
    let ws = TestWorkspace::new();
    ws.write_variations("k.yaml", &[("k1", "k1"), ("k2", "k2")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "x, {K}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("K", "k.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let (context, options) =
        pipeline::apply_overrides(context, &resolved, None, Some(vec![1000, 1001, 1002])).unwrap();
    let items: Vec<_> = pipeline::enumerate_plan(&resolved, &context, options).unwrap().collect();

    let got: Vec<(String, i64)> = items.into_iter().map(|i| (i.prompt, i.seed)).collect();
    assert_eq!(
        got,
        vec![
            ("x, k1".to_string(), 1000),
            ("x, k2".to_string(), 1000),
            ("x, k1".to_string(), 1001),
            ("x, k2".to_string(), 1001),
            ("x, k1".to_string(), 1002),
            ("x, k2".to_string(), 1002),
        ]
    );
}

/// Scenario F — a theme's `[Remove]` directive erases a placeholder for
/// the active style, leaving the literal empty substitution in place.
#[test]
fn scenario_f_remove_directive_erases_placeholder() {
    let ws = TestWorkspace::new();
    ws.write_variations("jewelry.yaml", &[("gold", "gold necklace")]);
    let theme_path = ws.write(
        "restricted.theme.yaml",
        "type: theme_config\nimports:\n  Jewelry.restricted: \"[Remove]\"\n",
    );
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "portrait, {Jewelry}, smiling",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("Jewelry", "jewelry.yaml")],
        ),
    );

    let (resolved, context) =
        pipeline::load_and_resolve(&prompt_path, None, Some(&theme_path), Some("restricted"), None).unwrap();
    let (context, options) = pipeline::apply_overrides(context, &resolved, None, None).unwrap();
    let items: Vec<_> = pipeline::enumerate_plan(&resolved, &context, options).unwrap().collect();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].prompt, "portrait, , smiling");
}

/// A cyclic import graph is rejected at resolution time; no plan is ever
/// produced for it (invariant 3).
#[test]
fn cyclic_imports_never_reach_enumeration() {
    let ws = TestWorkspace::new();
    ws.write(
        "a.chunk.yaml",
        "template: \"a\"\nimports:\n  B: b.chunk.yaml\n",
    );
    ws.write(
        "b.chunk.yaml",
        "template: \"b\"\nimports:\n  A: a.chunk.yaml\n",
    );
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "@A",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("A", "a.chunk.yaml")],
        ),
    );

    let err = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap_err();
    assert!(matches!(err, promptloom::error::PromptloomError::CycleError { .. }));
}

/// A fixed-value override that names an unknown key surfaces the
/// available-key list instead of silently ignoring the override.
#[test]
fn fixed_override_rejects_unknown_key() {
    let ws = TestWorkspace::new();
    ws.write_variations("hair.yaml", &[("blonde", "blonde hair")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "{Hair}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n",
            &[("Hair", "hair.yaml")],
        ),
    );

    let (resolved, context) = pipeline::load_and_resolve(&prompt_path, None, None, None, None).unwrap();
    let mut fixed = IndexMap::new();
    fixed.insert("Hair".to_string(), "nonexistent".to_string());
    let err = pipeline::apply_overrides(context, &resolved, Some(fixed), None).unwrap_err();
    assert!(matches!(err, promptloom::error::PromptloomError::UnknownVariationKey { .. }));
}

/// Smoke-tests the CLI binary against the same scenario-A fixture.
#[test]
fn cli_binary_prints_enumerated_prompts() {
    let ws = TestWorkspace::new();
    ws.write_variations("hair.yaml", &[("blonde", "blonde hair")]);
    let prompt_path = ws.write(
        "prompt.yaml",
        &prompt_doc(
            "portrait, {Hair}",
            "  mode: combinatorial\n  seed_mode: fixed\n  seed: 7\n",
            &[("Hair", "hair.yaml")],
        ),
    );

    let mut cmd = assert_cmd::Command::cargo_bin("promptloom").unwrap();
    cmd.arg(&prompt_path)
        .assert()
        .success()
        .stdout(predicates::str::contains("portrait, blonde hair"))
        .stdout(predicates::str::contains("1 item(s) enumerated"));
}
