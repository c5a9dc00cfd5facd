//! Locates action payloads in free-form model replies.
//!
//! A payload is a JSON object with a `function_name` string and a `function_parms` object of
//! scalar values. Models wrap it in prose, code fences, or both, so the extractor scans for
//! balanced `{...}` blocks instead of trying to parse the whole reply.
//!
//! Blocks that never mention `function_name` are treated as prose and skipped. A block that does
//! mention it but is not a well-formed payload is skipped too when the reply carries a well-formed
//! one elsewhere; otherwise it is an [`ExtractError`], which is distinct from the empty result that
//! signals a final answer.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

const NAME_KEY: &str = "function_name";
const PARAMS_KEY: &str = "function_parms";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    pub function_name: String,
    pub function_parms: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("action payload starting at byte {offset} is never closed")]
    Unterminated { offset: usize },
    #[error("action payload is not valid JSON: {message}")]
    InvalidJson { message: String },
    #[error("action payload is malformed: {0}")]
    InvalidShape(String),
}

/// Every well-formed action payload in `text`, in order of appearance. Empty means the reply is
/// an answer. Broken payloads are only an error when no well-formed one is present.
pub fn extract(text: &str) -> Result<Vec<ActionRequest>, ExtractError> {
    let mut requests = Vec::new();
    let mut first_error = None;
    let mut cursor = 0;

    while let Some(relative) = text[cursor..].find('{') {
        let start = cursor + relative;
        let Some(end) = balanced_end(text, start) else {
            if !text[start..].contains(NAME_KEY) {
                break;
            }
            // Stray brace in prose; a payload may still follow it.
            first_error.get_or_insert(ExtractError::Unterminated { offset: start });
            cursor = start + 1;
            continue;
        };

        let block = &text[start..end];
        if !block.contains(NAME_KEY) {
            cursor = start + 1;
            continue;
        }

        match parse_block(block) {
            Ok(request) => {
                requests.push(request);
                cursor = end;
            }
            Err(error) => {
                first_error.get_or_insert(error);
                cursor = start + 1;
            }
        }
    }

    match first_error {
        Some(error) if requests.is_empty() => Err(error),
        _ => Ok(requests),
    }
}

/// Byte index just past the brace that closes the one at `start`, skipping braces in strings.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, character) in text[start..].char_indices() {
        if in_string {
            match character {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match character {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + index + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_block(block: &str) -> Result<ActionRequest, ExtractError> {
    let value: Value = serde_json::from_str(block)
        .map_err(|error| ExtractError::InvalidJson { message: error.to_string() })?;

    let function_name = value
        .get(NAME_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ExtractError::InvalidShape(format!("`{NAME_KEY}` must be a non-empty string"))
        })?
        .to_string();

    let params = match value.get(PARAMS_KEY) {
        Some(Value::Object(params)) => params,
        Some(Value::Null) | None => {
            return Ok(ActionRequest { function_name, function_parms: BTreeMap::new() });
        }
        Some(_) => {
            return Err(ExtractError::InvalidShape(format!("`{PARAMS_KEY}` must be an object")));
        }
    };

    let mut function_parms = BTreeMap::new();
    for (key, value) in params {
        let text = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => {
                return Err(ExtractError::InvalidShape(format!(
                    "parameter `{key}` must be a string, number or boolean"
                )));
            }
        };
        function_parms.insert(key.clone(), text);
    }

    Ok(ActionRequest { function_name, function_parms })
}

#[cfg(test)]
mod tests {
    use super::{extract, ActionRequest, ExtractError};

    fn restart_request() -> ActionRequest {
        ActionRequest {
            function_name: "restart_application".to_string(),
            function_parms: [
                ("customer_name", "Acme Corporation"),
                ("environment", "dv01"),
                ("application", "cbp"),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        }
    }

    #[test]
    fn finds_payload_surrounded_by_prose() {
        let reply = r#"Thought: I need to restart the cbp application for Acme Corporation in dv01.
Action:

{
  "function_name": "restart_application",
  "function_parms": {
    "customer_name": "Acme Corporation",
    "environment": "dv01",
    "application": "cbp"
  }
}

PAUSE"#;

        assert_eq!(extract(reply), Ok(vec![restart_request()]));
    }

    #[test]
    fn finds_payload_inside_code_fence_after_unrelated_braces() {
        let reply = "Placeholders like {customer} are not actions.\n```json\n\
            {\"function_name\": \"restart_application\", \"function_parms\": \
            {\"customer_name\": \"Acme Corporation\", \"environment\": \"dv01\", \"application\": \"cbp\"}}\n```";

        assert_eq!(extract(reply), Ok(vec![restart_request()]));
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_block() {
        let reply = r#"{"function_name": "get_response_time", "function_parms": {"url": "a}b{c.com"}}"#;
        let requests = extract(reply).expect("parses");

        assert_eq!(requests[0].function_parms["url"], "a}b{c.com");
    }

    #[test]
    fn plain_answer_yields_no_requests() {
        let reply = "Answer: Successfully Triggered the restart of cbp application for Acme Corporation in dv01 environment.";
        assert_eq!(extract(reply), Ok(Vec::new()));
    }

    #[test]
    fn multiple_payloads_are_returned_in_order() {
        let reply = r#"{"function_name": "get_response_time", "function_parms": {"url": "google.com"}}
then {"function_name": "get_response_time", "function_parms": {"url": "openai.com"}}"#;

        let urls = extract(reply)
            .expect("parses")
            .into_iter()
            .map(|request| request.function_parms["url"].clone())
            .collect::<Vec<_>>();
        assert_eq!(urls, vec!["google.com", "openai.com"]);
    }

    #[test]
    fn broken_payloads_are_malformed_not_empty() {
        assert!(matches!(
            extract(r#"Action: {"function_name": "restart_application", "function_parms": {"#),
            Err(ExtractError::Unterminated { offset: 8 })
        ));
        assert!(matches!(
            extract(r#"{"function_name": "restart_application", "function_parms": {"a": 1,}}"#),
            Err(ExtractError::InvalidJson { .. })
        ));
        assert!(matches!(
            extract(r#"{"function_name": 7}"#),
            Err(ExtractError::InvalidShape(_))
        ));
        assert!(matches!(
            extract(r#"{"function_name": "x", "function_parms": {"nested": {"a": "b"}}}"#),
            Err(ExtractError::InvalidShape(_))
        ));
    }

    #[test]
    fn unbalanced_brace_in_leading_prose_does_not_hide_the_payload() {
        let reply = "Thought: the syntax is f({ ... I will act now.\n\
            {\"function_name\": \"restart_application\", \"function_parms\": \
            {\"customer_name\": \"Acme Corporation\", \"environment\": \"dv01\", \"application\": \"cbp\"}}";

        assert_eq!(extract(reply), Ok(vec![restart_request()]));
    }

    #[test]
    fn payload_nested_in_a_balanced_prose_block_is_found() {
        let reply = "Note {see below: {\"function_name\": \"restart_application\", \"function_parms\": \
            {\"customer_name\": \"Acme Corporation\", \"environment\": \"dv01\", \"application\": \"cbp\"}}}";

        assert_eq!(extract(reply), Ok(vec![restart_request()]));
    }

    #[test]
    fn broken_block_after_a_valid_payload_is_ignored() {
        let reply = r#"{"function_name": "get_response_time", "function_parms": {"url": "google.com"}}
and later {"function_name": "x", oops}"#;

        let requests = extract(reply).expect("valid payload wins");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].function_name, "get_response_time");
        assert_eq!(requests[0].function_parms["url"], "google.com");
    }

    #[test]
    fn broken_block_before_a_valid_payload_is_ignored() {
        let reply = r#"First try: {"function_name": 7}
Second try: {"function_name": "get_response_time", "function_parms": {"url": "openai.com"}}"#;

        let requests = extract(reply).expect("valid payload wins");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].function_parms["url"], "openai.com");
    }

    #[test]
    fn scalar_parameters_are_stringified() {
        let requests =
            extract(r#"{"function_name": "x", "function_parms": {"count": 3, "dry_run": true}}"#)
                .expect("parses");

        assert_eq!(requests[0].function_parms["count"], "3");
        assert_eq!(requests[0].function_parms["dry_run"], "true");
    }
}
