//! Chat transport — the seam between the ingestion pipeline and HTTP.
//!
//! A transport streams one response body into a shared [`ResponseLog`] and
//! returns the HTTP status once the body has fully arrived. Appending as
//! bytes come in is the event-driven delivery path; hosts where progress
//! callbacks are unreliable still fill the log, and the pipeline's poll
//! timer picks the growth up instead.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;

use cs_domain::chat::ChatMessage;
use cs_domain::config::EndpointConfig;
use cs_domain::error::{Error, Result};

use crate::buffer::ResponseLog;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON body for the streaming chat endpoint. Field names follow the server
/// contract.
#[derive(Debug, Clone, Serialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(rename = "SystemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(rename = "conversationHistory", skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<ChatMessage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request, stream the whole body into `sink`, and return the
    /// HTTP status. A non-2xx status is not an `Err` here — the pipeline
    /// decides what to do with it after the body has been consumed.
    async fn run(&self, body: ChatBody, sink: Arc<ResponseLog>) -> Result<u16>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpChatTransport {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpChatTransport {
    /// No client-level timeout here — the pipeline owns the 30s deadline and
    /// the cancellation token, and dropping the transport future aborts the
    /// request.
    pub fn new(endpoints: &EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(from_reqwest)?;
        Ok(Self {
            url: endpoints.chat_url.trim_end_matches('/').to_string(),
            api_key: endpoints.api_key.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpChatTransport {
    async fn run(&self, body: ChatBody, sink: Arc<ResponseLog>) -> Result<u16> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.json(&body).send().await.map_err(from_reqwest)?;
        let status = response.status().as_u16();

        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let bytes = chunk.map_err(from_reqwest)?;
            sink.append(&bytes);
        }

        Ok(status)
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_wire_format() {
        let body = ChatBody {
            message: "who wins tonight?".into(),
            system_prompt: None,
            conversation_history: vec![
                ChatMessage::user("earlier question"),
                ChatMessage::assistant("earlier answer"),
            ],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "who wins tonight?");
        assert!(json.get("SystemPrompt").is_none());
        assert_eq!(json["conversationHistory"][1]["role"], "assistant");
    }
}
