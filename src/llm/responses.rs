//! OpenAI Responses API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Responses
//! API (`/v1/responses`), translating its server-sent events into
//! [`NormalizedEvent`]s.

use futures::{Stream, StreamExt};

use crate::normalized::NormalizedEvent;

use super::{ApiError, EventStream, LlmDriver, LlmRequest, LlmSettings};

/// Driver for the OpenAI Responses API.
#[derive(Clone)]
pub struct ResponsesDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ResponsesDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ResponsesDriver {
    /// Create a new Responses driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn request_body(&self, req: LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": true,
            "input": req.input,
        });
        if let Some(instructions) = req.instructions {
            body["instructions"] = serde_json::Value::String(instructions);
        }
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools);
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmDriver for ResponsesDriver {
    async fn stream(&self, req: LlmRequest) -> Result<EventStream, ApiError> {
        let url = format!(
            "{}/v1/responses",
            self.settings.base_url.trim_end_matches('/')
        );

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            input_items = req.input.len(),
            tool_count = req.tools.len(),
            "Sending Responses API request"
        );

        let mut rb = self.http.post(&url).json(&self.request_body(req));
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = ApiError::from_body(status.as_u16(), &body);
            tracing::error!(status = status.as_u16(), error = %err, "Responses API rejected request");
            return Err(err);
        }

        Ok(Box::pin(parse_event_stream(resp.bytes_stream())))
    }
}

/// Turn a raw SSE byte stream into normalized events.
///
/// The stream ends after `Done` or the first error. A body that closes
/// before the response completed yields an error rather than a silent `Done`.
pub fn parse_event_stream<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<NormalizedEvent, ApiError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        let mut buf = Vec::<u8>::new();

        futures::pin_mut!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ApiError::new(None, format!("Connection error: {e}")));
                    return;
                }
            };
            buf.extend(chunk.as_ref().iter().filter(|b| **b != b'\r'));

            while let Some(pos) = find_double_newline(&buf) {
                let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                let text = String::from_utf8_lossy(&frame);

                let mut event_name = String::new();
                let mut data = String::new();
                for line in text.lines() {
                    if let Some(rest) = line.strip_prefix("event:") {
                        event_name = rest.trim().to_string();
                    } else if let Some(rest) = line.strip_prefix("data:") {
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(rest.trim());
                    }
                }

                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    yield Ok(NormalizedEvent::Done);
                    return;
                }

                let v: serde_json::Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(ApiError::new(None, format!("malformed stream event: {e}")));
                        return;
                    }
                };

                match translate_event(&event_name, &v) {
                    Some(Ok(NormalizedEvent::Done)) => {
                        yield Ok(NormalizedEvent::Done);
                        return;
                    }
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    Some(Ok(ev)) => {
                        yield Ok(ev);
                    }
                    None => {}
                }
            }
        }

        yield Err(ApiError::new(None, "response stream ended before completion"));
    }
}

/// Map one Responses API event onto a [`NormalizedEvent`].
///
/// The `type` field inside the payload wins over the SSE `event:` line.
/// Unknown events map to `None`.
fn translate_event(
    event_name: &str,
    v: &serde_json::Value,
) -> Option<Result<NormalizedEvent, ApiError>> {
    let kind = v.get("type").and_then(|t| t.as_str()).unwrap_or(event_name);
    let output_index = || v.get("output_index").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize;
    let str_field = |obj: &serde_json::Value, key: &str| {
        obj.get(key).and_then(|x| x.as_str()).map(ToString::to_string)
    };

    match kind {
        "response.output_text.delta" => str_field(v, "delta")
            .filter(|d| !d.is_empty())
            .map(|text| Ok(NormalizedEvent::MessageDelta { text })),

        "response.output_item.added" => {
            let item = v.get("item")?;
            if item.get("type").and_then(|t| t.as_str()) != Some("function_call") {
                return None;
            }
            Some(Ok(NormalizedEvent::ToolCallDelta {
                call_index: output_index(),
                id: str_field(item, "call_id"),
                name: str_field(item, "name"),
                arguments_delta: None,
            }))
        }

        "response.function_call_arguments.delta" => Some(Ok(NormalizedEvent::ToolCallDelta {
            call_index: output_index(),
            id: None,
            name: None,
            arguments_delta: str_field(v, "delta"),
        })),

        "response.output_item.done" => {
            let item = v.get("item")?;
            if item.get("type").and_then(|t| t.as_str()) != Some("function_call") {
                return None;
            }
            Some(Ok(NormalizedEvent::ToolCallComplete {
                call_index: output_index(),
                id: str_field(item, "call_id").unwrap_or_default(),
                name: str_field(item, "name").unwrap_or_default(),
                arguments_json: str_field(item, "arguments").unwrap_or_else(|| "{}".to_string()),
            }))
        }

        "response.completed" | "response.done" => Some(Ok(NormalizedEvent::Done)),

        "response.incomplete" => {
            let reason = v
                .get("response")
                .and_then(|r| r.get("incomplete_details"))
                .and_then(|d| str_field(d, "reason"))
                .unwrap_or_else(|| "unknown".to_string());
            tracing::warn!(reason = %reason, "Response ended incomplete");
            Some(Err(ApiError {
                status: None,
                message: format!("Response incomplete: {reason}"),
                code: Some("response_incomplete".to_string()),
            }))
        }

        "response.failed" => {
            let error = v.get("response").and_then(|r| r.get("error"));
            let message = error
                .and_then(|e| str_field(e, "message"))
                .unwrap_or_else(|| "response failed".to_string());
            Some(Err(ApiError {
                status: None,
                message,
                code: error.and_then(|e| str_field(e, "code")),
            }))
        }

        "error" => Some(Err(ApiError {
            status: None,
            message: str_field(v, "message").unwrap_or_else(|| v.to_string()),
            code: str_field(v, "code"),
        })),

        _ => None,
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
