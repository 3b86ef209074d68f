use std::sync::OnceLock;

use regex::Regex;

use crate::agent_engine::state::{ClickAction, Decision};
use crate::perception::types::FrameSize;

const DEFAULT_DONE_REASON: &str = "Goal reached";

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("valid fence regex"))
}

/// Object must open with `"done": true` or with a `click`/`done` key.
fn shape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)^\s*\{\s*(?:"done"\s*:\s*true|"(?:click|done)"\s*:)"#)
            .expect("valid shape regex")
    })
}

/// Cut the JSON object out of a noisy completion: drop code fences, keep
/// the span from the first `{` to the last `}`, close unbalanced braces and
/// flatten it to one line. `None` when there is no `{` at all.
pub fn sanitize_json(raw: &str) -> Option<String> {
    let unfenced = fence_re().replace_all(raw.trim(), "");
    let text = unfenced.trim();

    let start = text.find('{')?;
    let mut candidate = match text.rfind('}') {
        Some(end) if end > start => text[start..=end].to_string(),
        _ => text[start..].to_string(),
    };

    let opens = candidate.matches('{').count();
    let closes = candidate.matches('}').count();
    if closes < opens {
        candidate.push_str(&"}".repeat(opens - closes));
    }

    Some(candidate.lines().collect::<Vec<_>>().join(" "))
}

/// Turn a raw completion into a `Decision`. Never fails: anything that is
/// not one of the two accepted shapes comes back as `Decision::Invalid`.
pub fn parse_decision(raw: &str, frame: FrameSize) -> Decision {
    let Some(text) = sanitize_json(raw) else {
        return invalid("No JSON object found in the reply.");
    };

    if !shape_re().is_match(&text) {
        return invalid("The reply does not look like the expected JSON.");
    }

    let value: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, text = %text, "model JSON did not decode");
            return invalid("JSON did not decode.");
        }
    };

    let reason = value
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .to_string();

    if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
        let reason = if reason.is_empty() {
            DEFAULT_DONE_REASON.to_string()
        } else {
            reason
        };
        return Decision::Done { reason };
    }

    let Some(click) = value.get("click").filter(|c| c.is_object()) else {
        return invalid("No 'click' object.");
    };

    let (Some(x), Some(y)) = (
        click.get("x").and_then(|v| v.as_i64()),
        click.get("y").and_then(|v| v.as_i64()),
    ) else {
        return invalid("Coordinates are missing or not integers.");
    };

    if !frame.contains(x, y) {
        return invalid(format!("Coordinates are outside the image ({frame})."));
    }

    Decision::Click(ClickAction {
        x: x as u32,
        y: y as u32,
        reason,
    })
}

fn invalid(diagnostic: impl Into<String>) -> Decision {
    Decision::Invalid {
        diagnostic: diagnostic.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FRAME: FrameSize = FrameSize {
        width: 1280,
        height: 720,
    };

    fn click(x: u32, y: u32, reason: &str) -> Decision {
        Decision::Click(ClickAction {
            x,
            y,
            reason: reason.into(),
        })
    }

    fn is_invalid(decision: &Decision) -> bool {
        matches!(decision, Decision::Invalid { .. })
    }

    #[test]
    fn plain_click_is_decoded() {
        assert_eq!(
            parse_decision(r#"{"click":{"x":640,"y":360},"reason":"open menu"}"#, FRAME),
            click(640, 360, "open menu")
        );
    }

    #[test]
    fn done_with_and_without_reason() {
        assert_eq!(
            parse_decision(r#"{"done":true,"reason":"nothing to do"}"#, FRAME),
            Decision::Done {
                reason: "nothing to do".into()
            }
        );
        assert_eq!(
            parse_decision(r#"{"done": true}"#, FRAME),
            Decision::Done {
                reason: DEFAULT_DONE_REASON.into()
            }
        );
    }

    #[test]
    fn prose_prefix_and_missing_brace_are_repaired() {
        assert_eq!(
            parse_decision(r#"Sure! {"click":{"x":10,"y":20}"#, FRAME),
            click(10, 20, "")
        );
    }

    #[test]
    fn fenced_multiline_reply_is_accepted() {
        let raw = "Here you go:\n```json\n{\n  \"click\": {\"x\": 5, \"y\": 6},\n  \"reason\": \"tap\"\n}\n```";
        assert_eq!(parse_decision(raw, FRAME), click(5, 6, "tap"));
    }

    #[test]
    fn sanitize_balances_and_flattens() {
        assert_eq!(
            sanitize_json("{\"click\":\n{\"x\":1,\"y\":2").as_deref(),
            Some("{\"click\": {\"x\":1,\"y\":2}}")
        );
        assert_eq!(sanitize_json("no braces here"), None);
    }

    #[test]
    fn no_object_is_invalid() {
        assert!(is_invalid(&parse_decision("I cannot help with that.", FRAME)));
    }

    #[test]
    fn wrong_first_key_fails_precheck() {
        let decision = parse_decision(r#"{"reason":"x","click":{"x":1,"y":1}}"#, FRAME);
        assert_eq!(
            decision,
            Decision::Invalid {
                diagnostic: "The reply does not look like the expected JSON.".into()
            }
        );
    }

    #[test]
    fn broken_json_reports_decode_failure() {
        assert_eq!(
            parse_decision(r#"{"click": {"x": 1, "y": }"#, FRAME),
            Decision::Invalid {
                diagnostic: "JSON did not decode.".into()
            }
        );
    }

    #[test]
    fn done_false_without_click_is_invalid() {
        assert!(is_invalid(&parse_decision(r#"{"done":false,"reason":"hm"}"#, FRAME)));
    }

    #[test]
    fn non_integer_coordinates_are_invalid() {
        for raw in [
            r#"{"click":{"x":1.5,"y":2}}"#,
            r#"{"click":{"x":"1","y":2}}"#,
            r#"{"click":{"x":1}}"#,
            r#"{"click":[1,2]}"#,
        ] {
            assert!(is_invalid(&parse_decision(raw, FRAME)), "{raw}");
        }
    }

    #[test]
    fn out_of_bounds_names_the_frame() {
        for raw in [
            r#"{"click":{"x":1280,"y":0}}"#,
            r#"{"click":{"x":0,"y":720}}"#,
            r#"{"click":{"x":-1,"y":10}}"#,
        ] {
            let Decision::Invalid { diagnostic } = parse_decision(raw, FRAME) else {
                panic!("{raw} should be invalid");
            };
            assert!(diagnostic.contains("1280x720"), "{diagnostic}");
        }
        assert_eq!(
            parse_decision(r#"{"click":{"x":1279,"y":719}}"#, FRAME),
            click(1279, 719, "")
        );
    }

    #[test]
    fn uppercase_keys_pass_precheck_but_need_lowercase_fields() {
        // The pre-check is case-insensitive; decoding is not.
        assert!(is_invalid(&parse_decision(r#"{"CLICK":{"x":1,"y":1}}"#, FRAME)));
    }
}
