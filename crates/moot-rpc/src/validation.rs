//! Input validation for RPC parameters.
//!
//! The coordination core treats question `config` payloads as opaque; this
//! layer is where their per-type shapes are enforced, together with the
//! general boundary rules (port ranges, parameter sizes).

use moot_core::QuestionType;
use serde_json::Value;

use crate::errors::RpcError;

/// Maximum general string parameter length (8 KB).
pub const MAX_PARAM_LENGTH: usize = 8_192;

/// Minimum options for choice-style questions.
const MIN_OPTIONS: usize = 2;

/// Validate that a string parameter does not exceed `max_len` bytes.
pub fn validate_string_param(value: &str, name: &str, max_len: usize) -> Result<(), RpcError> {
    if value.len() > max_len {
        return Err(RpcError::invalid_params(format!(
            "Parameter '{name}' exceeds maximum length ({} > {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate a `port` parameter: an integer in `[0, 65535]`.
pub fn validate_port(value: &Value) -> Result<u16, RpcError> {
    let port = value
        .as_i64()
        .ok_or_else(|| RpcError::invalid_params("Parameter 'port' must be an integer"))?;
    u16::try_from(port)
        .map_err(|_| RpcError::invalid_params(format!("Port {port} is outside [0, 65535]")))
}

/// Validate a question `config` payload against its catalog type.
pub fn validate_question_config(
    question_type: QuestionType,
    config: &Value,
) -> Result<(), RpcError> {
    let Some(obj) = config.as_object() else {
        return Err(RpcError::invalid_params("Question config must be an object"));
    };

    let question = obj.get("question").and_then(Value::as_str).unwrap_or("");
    if question.is_empty() {
        return Err(RpcError::invalid_params(
            "Question config requires a non-empty 'question' string",
        ));
    }
    validate_string_param(question, "question", MAX_PARAM_LENGTH)?;

    match question_type {
        QuestionType::PickOne | QuestionType::PickMany | QuestionType::ShowOptions => {
            require_labeled_entries(config, "options", MIN_OPTIONS)
        }
        QuestionType::Rank => require_labeled_entries(config, "items", MIN_OPTIONS),
        QuestionType::Rate => require_labeled_entries(config, "items", 1),
        QuestionType::Slider => {
            let min = require_number(config, "min")?;
            let max = require_number(config, "max")?;
            if min >= max {
                return Err(RpcError::invalid_params(format!(
                    "Slider range is empty (min {min} >= max {max})"
                )));
            }
            Ok(())
        }
        QuestionType::ShowDiff => require_string(config, "diff"),
        QuestionType::ShowPlan => {
            let sections = config
                .get("sections")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    RpcError::invalid_params("show_plan config requires a 'sections' array")
                })?;
            if sections.is_empty() {
                return Err(RpcError::invalid_params(
                    "show_plan config requires at least one section",
                ));
            }
            for (i, section) in sections.iter().enumerate() {
                for field in ["id", "title", "content"] {
                    if section.get(field).and_then(Value::as_str).is_none() {
                        return Err(RpcError::invalid_params(format!(
                            "Plan section {} is missing string field '{field}'",
                            i + 1
                        )));
                    }
                }
            }
            Ok(())
        }
        QuestionType::ReviewSection => require_string(config, "content"),
        // Free-form types need nothing beyond the question text.
        QuestionType::Confirm
        | QuestionType::AskText
        | QuestionType::AskImage
        | QuestionType::AskFile
        | QuestionType::AskCode
        | QuestionType::Thumbs
        | QuestionType::EmojiReact => Ok(()),
    }
}

/// Require `config[key]` to be an array of at least `min` objects carrying
/// string `id` and `label` fields.
fn require_labeled_entries(config: &Value, key: &str, min: usize) -> Result<(), RpcError> {
    let entries = config.get(key).and_then(Value::as_array).ok_or_else(|| {
        RpcError::invalid_params(format!("Question config requires an '{key}' array"))
    })?;
    if entries.len() < min {
        return Err(RpcError::invalid_params(format!(
            "Question config requires at least {min} entries in '{key}'"
        )));
    }
    for (i, entry) in entries.iter().enumerate() {
        let has_id = entry.get("id").and_then(Value::as_str).is_some();
        let has_label = entry.get("label").and_then(Value::as_str).is_some();
        if !has_id || !has_label {
            return Err(RpcError::invalid_params(format!(
                "Entry {} in '{key}' is missing 'id' or 'label'",
                i + 1
            )));
        }
    }
    Ok(())
}

fn require_string(config: &Value, key: &str) -> Result<(), RpcError> {
    if config.get(key).and_then(Value::as_str).is_none() {
        return Err(RpcError::invalid_params(format!(
            "Question config requires a '{key}' string"
        )));
    }
    Ok(())
}

fn require_number(config: &Value, key: &str) -> Result<f64, RpcError> {
    config.get(key).and_then(Value::as_f64).ok_or_else(|| {
        RpcError::invalid_params(format!("Question config requires a numeric '{key}'"))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oversized_param_is_rejected() {
        let s = "x".repeat(MAX_PARAM_LENGTH + 1);
        let err = validate_string_param(&s, "myParam", MAX_PARAM_LENGTH).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert!(err.to_string().contains("myParam"));
    }

    #[test]
    fn at_limit_param_is_accepted() {
        let s = "x".repeat(MAX_PARAM_LENGTH);
        assert!(validate_string_param(&s, "p", MAX_PARAM_LENGTH).is_ok());
    }

    #[test]
    fn port_range_boundaries() {
        assert_eq!(validate_port(&json!(0)).unwrap(), 0);
        assert_eq!(validate_port(&json!(65535)).unwrap(), 65535);
        assert!(validate_port(&json!(65536)).is_err());
        assert!(validate_port(&json!(-1)).is_err());
        assert!(validate_port(&json!("8080")).is_err());
    }

    #[test]
    fn config_must_be_object_with_question() {
        assert!(validate_question_config(QuestionType::AskText, &json!("nope")).is_err());
        assert!(validate_question_config(QuestionType::AskText, &json!({})).is_err());
        assert!(
            validate_question_config(QuestionType::AskText, &json!({"question": ""})).is_err()
        );
        assert!(
            validate_question_config(QuestionType::AskText, &json!({"question": "Which?"}))
                .is_ok()
        );
    }

    #[test]
    fn pick_one_needs_two_labeled_options() {
        let too_few = json!({"question": "Q?", "options": [{"id": "a", "label": "A"}]});
        assert!(validate_question_config(QuestionType::PickOne, &too_few).is_err());

        let missing_label = json!({
            "question": "Q?",
            "options": [{"id": "a", "label": "A"}, {"id": "b"}],
        });
        assert!(validate_question_config(QuestionType::PickOne, &missing_label).is_err());

        let ok = json!({
            "question": "Q?",
            "options": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}],
        });
        assert!(validate_question_config(QuestionType::PickOne, &ok).is_ok());
    }

    #[test]
    fn slider_needs_a_non_empty_range() {
        let inverted = json!({"question": "Q?", "min": 10, "max": 1});
        assert!(validate_question_config(QuestionType::Slider, &inverted).is_err());

        let missing = json!({"question": "Q?", "min": 0});
        assert!(validate_question_config(QuestionType::Slider, &missing).is_err());

        let ok = json!({"question": "Q?", "min": 0, "max": 10});
        assert!(validate_question_config(QuestionType::Slider, &ok).is_ok());
    }

    #[test]
    fn show_plan_needs_full_sections() {
        let empty = json!({"question": "Review", "sections": []});
        assert!(validate_question_config(QuestionType::ShowPlan, &empty).is_err());

        let partial = json!({
            "question": "Review",
            "sections": [{"id": "s1", "title": "One"}],
        });
        assert!(validate_question_config(QuestionType::ShowPlan, &partial).is_err());

        let ok = json!({
            "question": "Review",
            "sections": [{"id": "s1", "title": "One", "content": "text"}],
        });
        assert!(validate_question_config(QuestionType::ShowPlan, &ok).is_ok());
    }

    #[test]
    fn show_diff_needs_diff_text() {
        assert!(
            validate_question_config(QuestionType::ShowDiff, &json!({"question": "Q?"})).is_err()
        );
        let ok = json!({"question": "Q?", "diff": "-a\n+b"});
        assert!(validate_question_config(QuestionType::ShowDiff, &ok).is_ok());
    }

    #[test]
    fn free_form_types_need_only_question() {
        for t in [
            QuestionType::Confirm,
            QuestionType::AskText,
            QuestionType::AskCode,
            QuestionType::Thumbs,
            QuestionType::EmojiReact,
        ] {
            assert!(
                validate_question_config(t, &json!({"question": "Q?"})).is_ok(),
                "{t} should accept a bare question"
            );
        }
    }

    #[test]
    fn rate_accepts_single_item() {
        let ok = json!({"question": "Q?", "items": [{"id": "a", "label": "A"}]});
        assert!(validate_question_config(QuestionType::Rate, &ok).is_ok());
    }
}
