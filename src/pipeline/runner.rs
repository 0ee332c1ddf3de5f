//! Stage runner: renders one stage's messages, makes a single blocking
//! model call, parses the response against the stage's schema, and
//! substitutes the stage's fallback value on any failure.
//!
//! No retries: a failed call is terminal for that stage only. Latency
//! stays predictable for the interactive caller and the fallback keeps
//! downstream consumers supplied with a well-formed value.

use tracing::{debug, warn};

use super::llm::{ChatClient, ChatMessage, ChatRequest};
use super::stage::{fallback_value, ExtractionRequest, ExtractionResult, SchemaKind};

/// Run one extraction stage. Always returns a result; never panics or
/// propagates a service error past the stage boundary.
pub fn run_stage(client: &dyn ChatClient, request: &ExtractionRequest) -> ExtractionResult {
    let chat = ChatRequest {
        messages: build_messages(request),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    let response = match client.complete(&chat) {
        Ok(response) => response,
        Err(e) => {
            warn!(stage = %request.stage, error = %e, "stage call failed, substituting fallback");
            return ExtractionResult::fallback(
                fallback_value(request.stage, &e.to_string()),
                format!("service failure: {e}"),
            );
        }
    };

    match request.schema {
        SchemaKind::Freeform => {
            debug!(stage = %request.stage, "stage produced freeform text");
            ExtractionResult::ok(serde_json::Value::String(response.trim().to_string()))
        }
        SchemaKind::Object | SchemaKind::Array => {
            match parse_structured(&response, request.schema) {
                Ok(value) => {
                    debug!(stage = %request.stage, "stage produced conforming value");
                    ExtractionResult::ok(value)
                }
                Err(reason) => {
                    warn!(stage = %request.stage, reason = %reason, "malformed response, substituting fallback");
                    ExtractionResult::fallback(
                        fallback_value(request.stage, &reason),
                        format!("malformed response: {reason}"),
                    )
                }
            }
        }
    }
}

/// Role-tagged message list for a stage. Stages with a separate persona
/// send it as the system message and the rendered prompt as the user
/// message; the rest send the prompt itself as the system message.
fn build_messages(request: &ExtractionRequest) -> Vec<ChatMessage> {
    match &request.system {
        Some(system) => vec![
            ChatMessage::system(system.clone()),
            ChatMessage::user(request.prompt.clone()),
        ],
        None => vec![ChatMessage::system(request.prompt.clone())],
    }
}

/// Parse a structured response and check its top-level shape.
fn parse_structured(response: &str, schema: SchemaKind) -> Result<serde_json::Value, String> {
    let payload = extract_json_block(response)?;
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("JSON parsing error: {e}"))?;

    match schema {
        SchemaKind::Object if !value.is_object() => {
            Err(format!("expected a JSON object, got {}", kind_name(&value)))
        }
        SchemaKind::Array if !value.is_array() => {
            Err(format!("expected a JSON array, got {}", kind_name(&value)))
        }
        _ => Ok(value),
    }
}

fn kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a JSON array",
        serde_json::Value::Object(_) => "a JSON object",
    }
}

/// Extract a JSON payload from model response text.
/// Handles responses that wrap the JSON in markdown code fences or
/// surround it with prose.
fn extract_json_block(response: &str) -> Result<&str, String> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') || block.starts_with('[') {
                return Ok(block);
            }
        }
    }

    // Bare payload: span from the first opening bracket to the last
    // matching closing bracket of the same kind.
    let obj_start = trimmed.find('{');
    let arr_start = trimmed.find('[');
    let candidate = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => trimmed.find('[').zip(trimmed.rfind(']')),
        (Some(_), _) => trimmed.find('{').zip(trimmed.rfind('}')),
        (None, Some(_)) => trimmed.find('[').zip(trimmed.rfind(']')),
        (None, None) => None,
    };

    match candidate {
        Some((start, end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err("no JSON payload found in response".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::MockChatClient;
    use crate::pipeline::stage::StageName;
    use serde_json::json;

    #[test]
    fn valid_array_response_is_accepted() {
        let client = MockChatClient::new(r#"[{"Complaint": "Cough", "Duration": "3 days"}]"#);
        let result = run_stage(&client, &ExtractionRequest::chief_complaints("transcript"));
        assert!(!result.is_fallback());
        assert_eq!(
            result.value(),
            &json!([{"Complaint": "Cough", "Duration": "3 days"}])
        );
    }

    #[test]
    fn fenced_json_response_is_accepted() {
        let client = MockChatClient::new(
            "Here is the extraction:\n```json\n{\"Summary\": \"stable\", \"KeyFindings\": [], \"NextSteps\": []}\n```\nDone.",
        );
        let value = json!({});
        let result = run_stage(
            &client,
            &ExtractionRequest::patient_summary(&value, &value, &value, &value),
        );
        assert!(!result.is_fallback());
        assert_eq!(result.value()["Summary"], "stable");
    }

    #[test]
    fn prose_wrapped_json_is_accepted() {
        let client =
            MockChatClient::new("Sure! The complaints are: [{\"Complaint\": \"Fever\", \"Duration\": \"2 days\"}] as requested.");
        let result = run_stage(&client, &ExtractionRequest::chief_complaints("t"));
        assert!(!result.is_fallback());
        assert_eq!(result.value()[0]["Complaint"], "Fever");
    }

    #[test]
    fn invalid_json_substitutes_exact_fallback() {
        let client = MockChatClient::new("this is not json at all");
        let result = run_stage(&client, &ExtractionRequest::chief_complaints("t"));
        assert!(result.is_fallback());
        assert_eq!(
            result.value(),
            &json!([{"Complaint": "Unable to extract", "Duration": "N/A"}])
        );
        assert!(result.reason().unwrap().starts_with("malformed response"));
    }

    #[test]
    fn schema_mismatch_substitutes_fallback() {
        // Object where the chief-complaints stage expects an array.
        let client = MockChatClient::new(r#"{"Complaint": "Cough"}"#);
        let result = run_stage(&client, &ExtractionRequest::chief_complaints("t"));
        assert!(result.is_fallback());
        assert!(result.reason().unwrap().contains("expected a JSON array"));
    }

    #[test]
    fn service_failure_substitutes_fallback_with_reason() {
        let client = MockChatClient::failing("connection refused");
        let result = run_stage(&client, &ExtractionRequest::structured_intake("t", ""));
        assert!(result.is_fallback());
        assert_eq!(
            result.value(),
            &json!({"Error": "Unable to extract structured intake"})
        );
        assert!(result.reason().unwrap().starts_with("service failure"));
        assert!(result.reason().unwrap().contains("connection refused"));
    }

    #[test]
    fn freeform_stage_trims_and_accepts_raw_text() {
        let client = MockChatClient::new("  The patient reports progressive dyspnea.  \n");
        let result = run_stage(&client, &ExtractionRequest::presenting_illness("t"));
        assert!(!result.is_fallback());
        assert_eq!(
            result.value(),
            &json!("The patient reports progressive dyspnea.")
        );
    }

    #[test]
    fn freeform_service_failure_embeds_cause_in_placeholder() {
        let client = MockChatClient::failing("socket hang up");
        let result = run_stage(&client, &ExtractionRequest::presenting_illness("t"));
        assert!(result.is_fallback());
        assert!(result.value().as_str().unwrap().contains("socket hang up"));
    }

    #[test]
    fn every_stage_returns_a_result_on_garbage() {
        let value = json!({});
        let requests = [
            ExtractionRequest::chief_complaints(""),
            ExtractionRequest::structured_intake("", ""),
            ExtractionRequest::presenting_illness(""),
            ExtractionRequest::differential_diagnosis(&value),
            ExtractionRequest::patient_summary(&value, &value, &value, &value),
            ExtractionRequest::prescription(""),
        ];
        for request in &requests {
            let client = MockChatClient::new("%%% garbage %%%");
            let result = run_stage(&client, request);
            // Freeform accepts any text; structured stages fall back.
            if request.schema == SchemaKind::Freeform {
                assert!(!result.is_fallback(), "stage {}", request.stage);
            } else {
                assert!(result.is_fallback(), "stage {}", request.stage);
            }
        }
    }

    #[test]
    fn persona_stages_send_system_plus_user_messages() {
        let client = MockChatClient::new(r#"{"Date": "", "Medications": []}"#);
        run_stage(&client, &ExtractionRequest::prescription("take aspirin"));
        let seen = client.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].messages[0].role, crate::pipeline::llm::Role::System);
        assert_eq!(seen[0].messages[1].role, crate::pipeline::llm::Role::User);
        assert!(seen[0].messages[1].content.contains("take aspirin"));
    }

    #[test]
    fn plain_stages_send_single_system_message() {
        let client = MockChatClient::new("[]");
        run_stage(&client, &ExtractionRequest::chief_complaints("hello"));
        let seen = client.seen();
        assert_eq!(seen[0].messages.len(), 1);
        assert_eq!(seen[0].messages[0].role, crate::pipeline::llm::Role::System);
        assert!(seen[0].messages[0].content.contains("hello"));
    }

    #[test]
    fn diagnosis_fallback_identical_for_both_failure_paths() {
        let value = json!({});
        let request = ExtractionRequest::differential_diagnosis(&value);

        let service_failure = run_stage(&MockChatClient::failing("down"), &request);
        let malformed = run_stage(&MockChatClient::new("not json"), &request);

        assert!(service_failure.is_fallback());
        assert!(malformed.is_fallback());
        assert_eq!(service_failure.value(), malformed.value());
        assert_ne!(service_failure.reason(), malformed.reason());
    }

    #[test]
    fn extract_json_block_prefers_json_fence() {
        let text = "prose ```json\n{\"a\": 1}\n``` trailing";
        assert_eq!(extract_json_block(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn extract_json_block_handles_anonymous_fence() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json_block(text).unwrap(), "[1, 2, 3]");
    }

    #[test]
    fn extract_json_block_rejects_plain_prose() {
        assert!(extract_json_block("nothing structured here").is_err());
    }
}
