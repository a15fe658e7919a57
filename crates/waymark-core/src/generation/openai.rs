//! Streaming adapter for OpenAI-compatible `/chat/completions` endpoints.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{ApiKey, ChunkStream, ContentGenerator, GenerationError, GenerationRequest};
use crate::text::truncate_for_error;

/// [`ContentGenerator`] over any OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatibleGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn body(model: &str, request: &GenerationRequest) -> Value {
        let messages = request
            .messages()
            .into_iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect::<Vec<_>>();
        json!({
            "model": model,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait]
impl ContentGenerator for OpenAiCompatibleGenerator {
    async fn stream(
        &self,
        credential: &ApiKey,
        model: &str,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let send = self
            .client
            .post(url)
            .bearer_auth(credential.expose())
            .json(&Self::body(model, request))
            .send();

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            resp = send => resp.map_err(transport_error)?,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let bytes = resp.bytes_stream().map(|chunk| chunk.map_err(transport_error));
        Ok(sse_deltas(bytes, cancel))
    }
}

/// Decodes a server-sent event body into content deltas.
///
/// Frames are split on raw bytes and decoded only once complete, so a
/// multi-byte character may straddle network chunks.
fn sse_deltas<S, B>(bytes: S, cancel: CancellationToken) -> ChunkStream
where
    S: Stream<Item = Result<B, GenerationError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let stream = try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            if cancel.is_cancelled() {
                Err::<(), _>(GenerationError::Cancelled)?;
            }

            // CR never occurs inside a UTF-8 sequence or a JSON string.
            buffer.extend(chunk?.as_ref().iter().copied().filter(|&b| b != b'\r'));

            while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
                let frame: Vec<u8> = buffer.drain(..pos + 2).take(pos).collect();
                for delta in parse_frame(&decode_frame(frame)?)? {
                    yield delta;
                }
            }
        }
        if !buffer.iter().all(u8::is_ascii_whitespace) {
            for delta in parse_frame(&decode_frame(buffer)?)? {
                yield delta;
            }
        }
    };

    Box::pin(stream)
}

fn decode_frame(frame: Vec<u8>) -> Result<String, GenerationError> {
    String::from_utf8(frame)
        .map_err(|e| GenerationError::Request(format!("stream is not valid UTF-8: {e}")))
}

fn transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Request(format!("request timed out: {error}"))
    } else if error.is_connect() {
        GenerationError::Request(format!("network error: {error}"))
    } else {
        GenerationError::Request(error.to_string())
    }
}

/// Maps a non-success HTTP status to the condition it signals.
fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let detail = format!("{status}: {}", truncate_for_error(body, 500));
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::QuotaExceeded(detail),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            GenerationError::ServiceUnavailable(detail)
        }
        // Non-standard "overloaded" status used by some providers
        s if s.as_u16() == 529 => GenerationError::ServiceUnavailable(detail),
        _ => GenerationError::Request(detail),
    }
}

/// Extracts the content deltas of one SSE frame.
fn parse_frame(frame: &str) -> Result<Vec<String>, GenerationError> {
    let mut deltas = Vec::new();
    for line in frame.lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }

        let value = serde_json::from_str::<Value>(payload).map_err(|e| {
            GenerationError::Request(format!(
                "malformed stream event ({e}): {}",
                truncate_for_error(payload, 200)
            ))
        })?;

        if let Some(error) = value.get("error") {
            return Err(stream_error(error));
        }

        let choices = value
            .get("choices")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for choice in choices {
            if let Some(text) = choice
                .get("delta")
                .and_then(|delta| delta.get("content"))
                .and_then(Value::as_str)
            {
                if !text.is_empty() {
                    deltas.push(text.to_string());
                }
            }
        }
    }
    Ok(deltas)
}

/// An error object delivered inside the stream.
fn stream_error(error: &Value) -> GenerationError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown stream error")
        .to_string();
    let code = error
        .get("code")
        .or_else(|| error.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    match code {
        "insufficient_quota" | "rate_limit_exceeded" => GenerationError::QuotaExceeded(message),
        "server_error" | "overloaded_error" | "service_unavailable" => {
            GenerationError::ServiceUnavailable(message)
        }
        _ => GenerationError::Request(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationError::QuotaExceeded(_)
        ));
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::from_u16(529).unwrap(),
        ] {
            assert!(matches!(
                status_error(status, ""),
                GenerationError::ServiceUnavailable(_)
            ));
        }
        let error = status_error(StatusCode::BAD_REQUEST, "bad model");
        assert!(matches!(error, GenerationError::Request(_)));
        assert!(error.to_string().contains("bad model"));
    }

    #[test]
    fn test_parse_frame_collects_content_deltas() {
        let frame = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            ": keep-alive\n",
            "data: [DONE]"
        );
        assert_eq!(parse_frame(frame).unwrap(), vec!["Hel", "lo"]);
    }

    #[test]
    fn test_parse_frame_skips_role_only_delta() {
        let frame = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}";
        assert!(parse_frame(frame).unwrap().is_empty());
    }

    #[test]
    fn test_in_stream_error_is_classified() {
        let frame = r#"data: {"error":{"message":"You exceeded your current quota","code":"insufficient_quota"}}"#;
        assert!(matches!(
            parse_frame(frame),
            Err(GenerationError::QuotaExceeded(_))
        ));

        let frame = r#"data: {"error":{"message":"bad","type":"invalid_request_error"}}"#;
        assert!(matches!(parse_frame(frame), Err(GenerationError::Request(_))));
    }

    #[test]
    fn test_parse_frame_rejects_malformed_json() {
        let frame = "data: {\"choices\":[{\"delta\":";
        let error = parse_frame(frame).unwrap_err();
        assert!(matches!(error, GenerationError::Request(_)));
        assert!(error.to_string().contains("malformed stream event"));
    }

    async fn collect(parts: Vec<&'static [u8]>) -> Result<String, GenerationError> {
        let bytes = futures::stream::iter(parts.into_iter().map(Ok::<_, GenerationError>));
        let mut stream = sse_deltas(bytes, CancellationToken::new());
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }

    #[tokio::test]
    async fn test_character_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\ndata: [DONE]\n\n"
            .as_bytes();
        let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let text = collect(vec![&body[..split], &body[split..]]).await.unwrap();
        assert_eq!(text, "café");
    }

    #[tokio::test]
    async fn test_crlf_frames_and_trailing_frame() {
        let text = collect(vec![
            &b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r"[..],
            &b"\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}"[..],
        ])
        .await
        .unwrap();
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let body = &b"data: {\"choices\":[{\"delta\":{\"content\":\"\xff\"}}]}\n\n"[..];
        let result = collect(vec![body]).await;
        assert!(matches!(result, Err(GenerationError::Request(_))));
    }

    #[test]
    fn test_request_body() {
        let body = OpenAiCompatibleGenerator::body(
            "gpt-test",
            &GenerationRequest::new("hi").with_system("sys"),
        );
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let generator = OpenAiCompatibleGenerator::new("http://localhost:8080/v1/");
        assert_eq!(generator.base_url, "http://localhost:8080/v1");
    }
}
