//! Recovers tool calls from free-form model output.
//!
//! Model replies nominally contain a bare JSON array of `{"tool", "args"}`
//! objects, but in practice arrive wrapped in prose, fenced blocks or
//! function-call notation. Each stage below is a pure `&str -> Vec<Action>`
//! extractor; the first one that yields any actions wins. Nothing here
//! returns an error: unparseable text becomes an empty plan, which the
//! orchestrator treats as the model's final answer.

use browser_ai_core::{Action, ActionPlan};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Rationale attached to every parsed plan.
pub const DEFAULT_RATIONALE: &str = "Executing browser automation task";

static EMBEDDED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\{[\s\S]*?\}\s*\]").unwrap());

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap());

static LINE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{"tool":\s*"([^"]+)",\s*"args":\s*(\{[^}]*\})\}"#).unwrap()
});

static FUNCTION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_]+)\((.*?)\)").unwrap());

type Stage = fn(&str) -> Vec<Action>;

const STAGES: [(&str, Stage); 5] = [
    ("whole_text", parse_whole_text),
    ("embedded_array", extract_embedded_array),
    ("fenced_block", extract_fenced_block),
    ("line_items", extract_line_items),
    ("function_calls", extract_function_calls),
];

pub struct ActionPlanParser;

impl ActionPlanParser {
    pub fn parse(raw: &str) -> ActionPlan {
        for (stage, extract) in STAGES {
            let actions = extract(raw);
            if !actions.is_empty() {
                debug!(stage, count = actions.len(), "Parsed action plan");
                return ActionPlan::new(actions, DEFAULT_RATIONALE);
            }
        }
        debug!("No actions found in model output");
        ActionPlan::new(Vec::new(), DEFAULT_RATIONALE)
    }
}

/// Accept items carrying a non-empty string `tool` and any `args` value;
/// drop the rest without failing the batch.
fn actions_from_array(text: &str) -> Vec<Action> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text.trim()) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let Value::Object(mut obj) = item else {
                return None;
            };
            let name = match obj.get("tool") {
                Some(Value::String(name)) if !name.is_empty() => name.clone(),
                _ => return None,
            };
            let args = obj.remove("args")?;
            Some(Action::new(name, args))
        })
        .collect()
}

fn parse_whole_text(raw: &str) -> Vec<Action> {
    actions_from_array(raw)
}

fn extract_embedded_array(raw: &str) -> Vec<Action> {
    EMBEDDED_ARRAY
        .find(raw)
        .map(|m| actions_from_array(m.as_str()))
        .unwrap_or_default()
}

fn extract_fenced_block(raw: &str) -> Vec<Action> {
    FENCED_BLOCK
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| actions_from_array(m.as_str()))
        .unwrap_or_default()
}

fn extract_line_items(raw: &str) -> Vec<Action> {
    LINE_ITEM
        .captures_iter(raw)
        .filter_map(|c| {
            let args: Value = serde_json::from_str(c.get(2)?.as_str()).ok()?;
            Some(Action::new(c.get(1)?.as_str(), args))
        })
        .collect()
}

/// `name(json)` calls. The name is kept even when its arguments are not JSON.
fn extract_function_calls(raw: &str) -> Vec<Action> {
    FUNCTION_CALL
        .captures_iter(raw)
        .filter_map(|c| {
            let name = c.get(1)?.as_str();
            let inner = c.get(2).map(|m| m.as_str()).unwrap_or_default();
            let args = if inner.trim().is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(inner).unwrap_or_else(|_| Value::Object(Map::new()))
            };
            Some(Action::new(name, args))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NAVIGATE: &str = r#"[{"tool":"browser_navigate","args":{"url":"https://example.com"}}]"#;

    #[test]
    fn test_plain_array() {
        let plan = ActionPlanParser::parse(NAVIGATE);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].name, "browser_navigate");
        assert_eq!(plan.actions[0].arguments, json!({"url": "https://example.com"}));
        assert_eq!(plan.rationale, DEFAULT_RATIONALE);
    }

    #[test]
    fn test_fenced_matches_unwrapped() {
        let fenced = format!("```json\n{}\n```", NAVIGATE);
        assert_eq!(ActionPlanParser::parse(&fenced), ActionPlanParser::parse(NAVIGATE));

        let untagged = format!("Here you go:\n```\n{}\n```", NAVIGATE);
        assert_eq!(ActionPlanParser::parse(&untagged), ActionPlanParser::parse(NAVIGATE));
    }

    #[test]
    fn test_fenced_block_recovers_nested_arrays() {
        // The embedded-array pattern stops at the first `}]`, inside the args.
        let raw = "Plan:\n```json\n[{\"tool\":\"browser_evaluate\",\"args\":{\"l\":[{\"k\":1}]}}]\n```";
        assert!(extract_embedded_array(raw).is_empty());

        let plan = ActionPlanParser::parse(raw);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].name, "browser_evaluate");
        assert_eq!(plan.actions[0].arguments, json!({"l": [{"k": 1}]}));
    }

    #[test]
    fn test_prose_is_final_answer() {
        assert!(ActionPlanParser::parse("Done! I navigated and took a screenshot.").is_final_answer());
        assert!(ActionPlanParser::parse("").is_final_answer());
        assert!(ActionPlanParser::parse("   \n\t").is_final_answer());
    }

    #[test]
    fn test_malformed_items_dropped_not_batch() {
        let raw = r#"[
            {"tool": "browser_snapshot", "args": {}},
            {"tool": "browser_click"},
            {"args": {"x": 1}},
            {"tool": 42, "args": {}},
            {"tool": "", "args": {}},
            "browser_close",
            {"tool": "browser_wait_for", "args": null}
        ]"#;
        let plan = ActionPlanParser::parse(raw);
        let names: Vec<_> = plan.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["browser_snapshot", "browser_wait_for"]);
        assert_eq!(plan.actions[1].arguments, Value::Null);
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let raw = format!("I'll start by opening the page.\n{}\nThen I will look around.", NAVIGATE);
        let plan = ActionPlanParser::parse(&raw);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].name, "browser_navigate");
    }

    #[test]
    fn test_first_of_multiple_arrays() {
        let raw = r#"First [{"tool":"browser_snapshot","args":{}}] and later [{"tool":"browser_close","args":{}}]"#;
        let plan = ActionPlanParser::parse(raw);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].name, "browser_snapshot");
    }

    #[test]
    fn test_nested_args_whole_text() {
        let raw = r#"[{"tool":"browser_evaluate","args":{"function":"() => [1,2]","meta":{"deep":[{"k":1}]}}}]"#;
        let plan = ActionPlanParser::parse(raw);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].arguments["meta"]["deep"][0]["k"], 1);
    }

    #[test]
    fn test_line_items_accumulate() {
        let raw = r#"Step one: {"tool": "browser_navigate", "args": {"url": "https://a.test"}}
Step two: {"tool": "browser_wait_for", "args": {"time": 2}}
Step three: {"tool": "browser_type", "args": {"text": "unterminated}"#;
        let plan = ActionPlanParser::parse(raw);
        let names: Vec<_> = plan.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["browser_navigate", "browser_wait_for"]);
        assert_eq!(plan.actions[1].arguments, json!({"time": 2}));
    }

    #[test]
    fn test_function_call_syntax() {
        let plan = ActionPlanParser::parse(
            r#"I will call browser_snapshot() and then browser_click({"element": "button", "ref": "e5"})"#,
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.actions[0].name, "browser_snapshot");
        assert_eq!(plan.actions[0].arguments, json!({}));
        assert_eq!(plan.actions[1].arguments, json!({"element": "button", "ref": "e5"}));
    }

    #[test]
    fn test_function_call_keeps_name_with_bad_args() {
        let plan = ActionPlanParser::parse("browser_type(element=combobox, text=hi)");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions[0].name, "browser_type");
        assert_eq!(plan.actions[0].arguments, json!({}));
    }

    #[test]
    fn test_truncated_json_never_panics() {
        let inputs = [
            r#"[{"tool":"browser_navigate","args":{"url":"https://exa"#,
            "[",
            "[{",
            "```json\n[{\"tool\":",
            "{\"tool\": \"x\", \"args\": {",
            "\\\"escaped\\\" [{\\\"tool\\\":1}]",
            "((((((",
            "[{\"tool\":\"a\",\"args\":{}}",
            "```",
            "\u{1F600}(\u{1F600})",
        ];
        for input in inputs {
            let _ = ActionPlanParser::parse(input);
        }
    }

    #[test]
    fn test_truncated_array_falls_through_to_function_calls() {
        let plan = ActionPlanParser::parse(r#"[{"tool":"browser_navigate","args":{"url":"https://exa"#);
        assert!(plan.is_final_answer());
    }

    #[test]
    fn test_stage_isolation() {
        assert!(parse_whole_text("not json").is_empty());
        assert!(parse_whole_text(r#"{"tool":"a","args":{}}"#).is_empty());
        assert!(extract_embedded_array("no brackets").is_empty());
        assert!(extract_fenced_block("```\nnot json\n```").is_empty());
        assert_eq!(extract_line_items(r#"{"tool": "a", "args": {"k": "v"}}"#).len(), 1);
        assert!(extract_function_calls("Done. Nothing left (really).").is_empty());
    }
}
