use eventsource_stream::Eventsource;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::gemini::GenerateContentResponse;
use crate::provider::ChatStream;

/// Convert a Gemini `streamGenerateContent?alt=sse` response into a `ChatStream`.
pub(crate) fn gemini_sse_to_stream(response: reqwest::Response) -> ChatStream {
    let event_stream = response.bytes_stream().eventsource();
    let mapped = event_stream.filter_map(|event| match event {
        Ok(event) => parse_gemini_sse_event(&event.data),
        Err(e) => Some(Err(LlmError::SseParse(e.to_string()))),
    });
    Box::pin(mapped)
}

fn parse_gemini_sse_event(data: &str) -> Option<Result<String, LlmError>> {
    if data.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(chunk) => {
            let text = chunk.text();
            if text.is_empty() { None } else { Some(Ok(text)) }
        }
        Err(e) => Some(Err(LlmError::SseParse(format!(
            "failed to parse SSE data: {e}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#;
        let parsed = parse_gemini_sse_event(data).unwrap().unwrap();
        assert_eq!(parsed, "Hello");
    }

    #[test]
    fn joins_multiple_parts() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        assert_eq!(parse_gemini_sse_event(data).unwrap().unwrap(), "ab");
    }

    #[test]
    fn skips_empty_candidates() {
        let data = r#"{"candidates":[],"usageMetadata":{"promptTokenCount":3}}"#;
        assert!(parse_gemini_sse_event(data).is_none());
    }

    #[test]
    fn skips_blank_data() {
        assert!(parse_gemini_sse_event("  ").is_none());
    }

    #[test]
    fn invalid_json_is_error() {
        let result = parse_gemini_sse_event("{not json").unwrap();
        assert!(matches!(result, Err(LlmError::SseParse(_))));
    }
}
