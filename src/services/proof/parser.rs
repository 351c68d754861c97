//! Plan Parser
//!
//! Turns the generator's raw text into an ordered list of candidate steps.
//! The text may be a bare JSON object, a fenced code block, or an object
//! embedded in surrounding prose.

use thiserror::Error;

use proof_cascade_core::StepStatus;

/// The response is not a usable plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanFormatError {
    #[error("no JSON object found in the response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing 'steps' array")]
    MissingSteps,

    #[error("'steps' is empty")]
    EmptySteps,

    #[error("step {position}: {reason}")]
    InvalidStep { position: usize, reason: String },
}

/// A step as proposed by the generator, before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub content: String,
    pub code: String,
    pub status: StepStatus,
}

/// Parse a plan response.
pub fn parse_plan(text: &str) -> Result<Vec<PlannedStep>, PlanFormatError> {
    let parsed = read_json_object(text)?;

    let steps_array = parsed
        .get("steps")
        .and_then(|v| v.as_array())
        .ok_or(PlanFormatError::MissingSteps)?;

    if steps_array.is_empty() {
        return Err(PlanFormatError::EmptySteps);
    }

    steps_array
        .iter()
        .enumerate()
        .map(|(i, val)| parse_step(i + 1, val))
        .collect()
}

/// Parse a single step from a JSON value. `position` is 1-based.
fn parse_step(position: usize, val: &serde_json::Value) -> Result<PlannedStep, PlanFormatError> {
    let invalid = |reason: &str| PlanFormatError::InvalidStep {
        position,
        reason: reason.to_string(),
    };

    if !val.is_object() {
        return Err(invalid("not an object"));
    }

    let content = val
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid("missing string 'content'"))?
        .to_string();

    let code = val
        .get("code")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid("missing string 'code'"))?
        .to_string();

    let status = match val.get("status") {
        None | Some(serde_json::Value::Null) => StepStatus::Normal,
        Some(serde_json::Value::String(s)) => s
            .parse::<StepStatus>()
            .map_err(|_| invalid(&format!("unknown status '{}'", s)))?,
        Some(_) => return Err(invalid("'status' must be a string")),
    };

    Ok(PlannedStep {
        content,
        code,
        status,
    })
}

/// Read the response as one JSON object. The whole text is tried first;
/// fenced blocks and prose-embedded objects are only searched when it is
/// not JSON on its own.
fn read_json_object(text: &str) -> Result<serde_json::Value, PlanFormatError> {
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }
    let json_str = extract_json_object(text).ok_or(PlanFormatError::NoJson)?;
    match serde_json::from_str(&json_str) {
        Ok(value @ serde_json::Value::Object(_)) => Ok(value),
        Ok(_) => Err(PlanFormatError::NoJson),
        Err(e) => Err(PlanFormatError::InvalidJson(e.to_string())),
    }
}

/// Extract the first JSON object from a text that may contain markdown fences.
fn extract_json_object(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim().to_string());
        }
    }
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let after_lang = if let Some(nl) = after_fence.find('\n') {
            &after_fence[nl + 1..]
        } else {
            after_fence
        };
        if let Some(end) = after_lang.find("```") {
            let content = after_lang[..end].trim();
            if content.starts_with('{') {
                return Some(content.to_string());
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plan_valid() {
        let text = r#"{
  "steps": [
    {"content": "Let $f(x) = x^2$.", "code": "x = sp.symbols('x')\nprint(sp.latex(x**2))", "status": "normal"},
    {"content": "Differentiate: $$f'(x) = 2x$$", "code": "print(sp.latex(sp.diff(x**2, x)))"}
  ]
}"#;
        let steps = parse_plan(text).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].content, "Let $f(x) = x^2$.");
        assert_eq!(steps[0].code, "x = sp.symbols('x')\nprint(sp.latex(x**2))");
        assert_eq!(steps[1].status, StepStatus::Normal);
    }

    #[test]
    fn test_parse_plan_in_code_fence() {
        let text = "Here is the plan:\n```json\n{\"steps\": [{\"content\": \"c\", \"code\": \"print(1)\", \"status\": \"valid\"}]}\n```";
        let steps = parse_plan(text).unwrap();
        assert_eq!(steps[0].status, StepStatus::Valid);

        let text = "```\n{\"steps\": [{\"content\": \"c\", \"code\": \"print(1)\"}]}\n```";
        assert_eq!(parse_plan(text).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_plan_fence_inside_content() {
        let text = r#"{"steps":[{"content":"Write it as ```json {} ``` then continue","code":"print(1)"}]}"#;
        let steps = parse_plan(text).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].content, "Write it as ```json {} ``` then continue");

        let text = "\n  {\"steps\": [{\"content\": \"See ```\\n{}\\n``` below\", \"code\": \"print(2)\"}]}  \n";
        assert_eq!(parse_plan(text).unwrap()[0].code, "print(2)");
    }

    #[test]
    fn test_parse_plan_embedded_in_prose() {
        let text = "Sure! {\"steps\": [{\"content\": \"c\", \"code\": \"print(1)\", \"status\": \"error\"}]} Hope this helps.";
        let steps = parse_plan(text).unwrap();
        assert_eq!(steps[0].status, StepStatus::Error);
    }

    #[test]
    fn test_parse_plan_missing_steps() {
        assert_eq!(
            parse_plan(r#"{"answer": "2x"}"#).unwrap_err(),
            PlanFormatError::MissingSteps
        );
        assert_eq!(
            parse_plan(r#"{"steps": "none"}"#).unwrap_err(),
            PlanFormatError::MissingSteps
        );
        assert_eq!(
            parse_plan(r#"{"steps": []}"#).unwrap_err(),
            PlanFormatError::EmptySteps
        );
    }

    #[test]
    fn test_parse_plan_malformed() {
        assert_eq!(parse_plan("no json here").unwrap_err(), PlanFormatError::NoJson);
        assert!(matches!(
            parse_plan("{\"steps\": [").unwrap_err(),
            PlanFormatError::NoJson | PlanFormatError::InvalidJson(_)
        ));
        assert!(matches!(
            parse_plan("{\"steps\": [}").unwrap_err(),
            PlanFormatError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_parse_step_errors() {
        let err = parse_plan(r#"{"steps": [{"content": "c", "code": "print(1)"}, {"content": "d"}]}"#)
            .unwrap_err();
        assert_eq!(
            err,
            PlanFormatError::InvalidStep {
                position: 2,
                reason: "missing string 'code'".to_string()
            }
        );

        let err = parse_plan(r#"{"steps": [{"content": "c", "code": "x", "status": "maybe"}]}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "step 1: unknown status 'maybe'");

        let err = parse_plan(r#"{"steps": ["just text"]}"#).unwrap_err();
        assert!(matches!(err, PlanFormatError::InvalidStep { position: 1, .. }));
    }
}
