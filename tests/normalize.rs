//! Tests for the response normalizer: every recognized payload shape,
//! the analysis-first reordering, fence stripping, and the guarantee
//! that unrecognized shapes yield an empty list instead of an error.

use serde_json::json;

use mirage::normalize::{ExtractStrategy, normalize, normalize_default};

// ---------------------------------------------------------------------------
// Bare string payloads
// ---------------------------------------------------------------------------

#[test]
fn bare_string_is_one_artifact() {
    let prompts = normalize_default(&json!("a lone prompt"));
    assert_eq!(prompts.as_slice(), ["a lone prompt"]);
}

#[test]
fn bare_string_with_fence_is_stripped() {
    let prompts = normalize_default(&json!("```yaml\nfoo: bar\n```"));
    assert_eq!(prompts.as_slice(), ["foo: bar"]);
}

#[test]
fn whitespace_only_string_yields_empty_list() {
    let prompts = normalize_default(&json!("   \n  "));
    assert!(prompts.is_empty());
}

// ---------------------------------------------------------------------------
// List payloads
// ---------------------------------------------------------------------------

#[test]
fn model_turn_shape_takes_first_part_text() {
    let payload = json!([
        {"content": {"parts": [{"text": "first part"}, {"text": "second part"}]}}
    ]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["first part"]);
}

#[test]
fn fenced_model_turn_round_trips() {
    // End-to-end scenario: fenced text inside a model-turn envelope.
    let payload = json!([{"content": {"parts": [{"text": "```yaml\nfoo: bar\n```"}]}}]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["foo: bar"]);
}

#[test]
fn nested_input_prompt_is_extracted() {
    let payload = json!([{"input": {"prompt": "from the nested input"}}]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["from the nested input"]);
}

#[test]
fn direct_fields_follow_strategy_order() {
    // An element carrying several candidates yields only the first match.
    let payload = json!([{"prompt": "wins", "text": "loses", "output": "loses too"}]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["wins"]);
}

#[test]
fn analysis_text_is_forced_first() {
    let payload = json!([
        {"analysis_text": "A"},
        {"output": "B"},
        {"prompt": "C"}
    ]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["A", "B", "C"]);
}

#[test]
fn analysis_text_moves_ahead_even_from_the_tail() {
    let payload = json!([
        {"output": "B"},
        {"prompt": "C"},
        {"analysis_text": "A"}
    ]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["A", "B", "C"]);
}

#[test]
fn string_elements_inside_lists_are_artifacts() {
    let payload = json!(["one", {"prompt": "two"}]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["one", "two"]);
}

#[test]
fn unrecognized_list_elements_are_skipped() {
    let payload = json!([{"prompt": "kept"}, 42, {"unrelated": true}, null]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["kept"]);
}

// ---------------------------------------------------------------------------
// Single-object payloads
// ---------------------------------------------------------------------------

#[test]
fn object_content_part_text() {
    let payload = json!({"content": {"parts": [{"text": "turn text"}]}});
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["turn text"]);
}

#[test]
fn object_input_list_maps_prompt_fields() {
    let payload = json!({"input": [{"prompt": "one"}, {"prompt": "two"}, {"other": "x"}]});
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["one", "two"]);
}

#[test]
fn object_variants_list() {
    let payload = json!({"variants": ["v1", "v2"]});
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["v1", "v2"]);
}

#[test]
fn object_direct_fields_collect_all_strings() {
    let payload = json!({"output": "O", "text": "T", "result": "R"});
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["O", "T", "R"]);
}

#[test]
fn object_result_field_alone() {
    let prompts = normalize_default(&json!({"result": "just the result"}));
    assert_eq!(prompts.as_slice(), ["just the result"]);
}

#[test]
fn object_analysis_text_collected_last() {
    let payload = json!({"output": "variant", "analysis_text": "analysis"});
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["variant", "analysis"]);
}

// ---------------------------------------------------------------------------
// Unrecognized shapes never throw
// ---------------------------------------------------------------------------

#[test]
fn unrecognized_shapes_yield_empty_list() {
    for payload in [
        json!(42),
        json!(true),
        json!(null),
        json!({"unrelated": {"nested": "thing"}}),
        json!([]),
        json!({}),
    ] {
        let prompts = normalize_default(&payload);
        assert!(prompts.is_empty(), "expected empty for {payload}");
    }
}

#[test]
fn empty_after_trim_is_dropped() {
    let payload = json!([{"prompt": "   "}, {"prompt": "real"}]);
    let prompts = normalize_default(&payload);
    assert_eq!(prompts.as_slice(), ["real"]);
}

// ---------------------------------------------------------------------------
// Purity and strategy overrides
// ---------------------------------------------------------------------------

#[test]
fn normalize_is_idempotent() {
    let payload = json!([
        {"analysis_text": "A"},
        {"output": "```\nB\n```"},
        {"prompt": "C"}
    ]);
    let first = normalize_default(&payload);
    let second = normalize_default(&payload);
    assert_eq!(first, second);
}

#[test]
fn strategy_overrides_the_analysis_field() {
    let strategy = ExtractStrategy {
        analysis_field: "analysis",
        ..ExtractStrategy::default()
    };
    let payload = json!([{"output": "B"}, {"analysis": "A"}]);
    let prompts = normalize(&payload, &strategy);
    assert_eq!(prompts.as_slice(), ["A", "B"]);

    // The default strategy does not recognize the overridden field.
    let default_prompts = normalize_default(&payload);
    assert_eq!(default_prompts.as_slice(), ["B"]);
}

#[test]
fn strategy_overrides_the_text_fields() {
    let strategy = ExtractStrategy {
        text_fields: &["caption"],
        ..ExtractStrategy::default()
    };
    let payload = json!([{"caption": "from caption", "prompt": "ignored"}]);
    let prompts = normalize(&payload, &strategy);
    assert_eq!(prompts.as_slice(), ["from caption"]);
}

#[test]
fn prompt_list_iteration_and_first() {
    let prompts = normalize_default(&json!([{"analysis_text": "A"}, {"prompt": "B"}]));
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts.first(), Some("A"));
    let collected: Vec<String> = prompts.into_iter().collect();
    assert_eq!(collected, ["A", "B"]);
}
