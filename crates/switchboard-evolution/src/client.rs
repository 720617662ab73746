// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Evolution chat gateway.
//!
//! Provides [`EvolutionClient`], the [`ChatGateway`] implementation used in
//! production. Requests carry the `apikey` header; transient failures
//! (429, 500, 502, 503) are retried once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use switchboard_config::EvolutionConfig;
use switchboard_core::{BotSession, BotStatus, ChatGateway, SwitchboardError};

use crate::types::{
    ApiErrorResponse, BotSessionList, ChangeStatusRequest, SendTextRequest, SendTextResponse,
};

/// Suffix stripped from one-to-one addresses before sending.
const PERSONAL_ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// HTTP client for the Evolution gateway API.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

fn gateway_err(message: String, source: Option<reqwest::Error>) -> SwitchboardError {
    SwitchboardError::Gateway {
        message,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

impl EvolutionClient {
    pub fn new(config: &EvolutionConfig) -> Result<Self, SwitchboardError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            headers.insert(
                "apikey",
                HeaderValue::from_str(key).map_err(|e| {
                    SwitchboardError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| gateway_err(format!("failed to build HTTP client: {e}"), Some(e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, SwitchboardError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, url = %url, "retrying gateway request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let mut req = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                req = req.json(body);
            }
            let response = req
                .send()
                .await
                .map_err(|e| gateway_err(format!("HTTP request failed: {e}"), Some(e)))?;

            let status = response.status();
            debug!(status = %status, attempt, url = %url, "gateway response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| {
                    gateway_err(format!("failed to read response body: {e}"), Some(e))
                })?;
                // Some endpoints answer with an empty body.
                let text = if text.trim().is_empty() { "null" } else { text.as_str() };
                return serde_json::from_str(text).map_err(|e| SwitchboardError::Gateway {
                    message: format!("failed to parse gateway response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!("gateway returned {status}: {}", api_err.summary()),
                Err(_) => format!("gateway returned {status}: {text}"),
            };

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %text, "transient gateway error, will retry");
                last_error = Some(gateway_err(message, None));
                continue;
            }
            return Err(gateway_err(message, None));
        }

        Err(last_error
            .unwrap_or_else(|| gateway_err("gateway request failed after retries".into(), None)))
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// The gateway expects bare numbers for one-to-one chats and full JIDs for groups.
fn send_number(address: &str) -> &str {
    address
        .strip_suffix(PERSONAL_ADDRESS_SUFFIX)
        .unwrap_or(address)
}

#[async_trait]
impl ChatGateway for EvolutionClient {
    async fn send_text(
        &self,
        instance: &str,
        address: &str,
        text: &str,
    ) -> Result<String, SwitchboardError> {
        let body = SendTextRequest {
            number: send_number(address),
            text,
        };
        let response: SendTextResponse = self
            .request(
                reqwest::Method::POST,
                &format!("message/sendText/{instance}"),
                Some(&body),
            )
            .await?;
        debug!(instance, address, message_id = %response.key.id, "text sent");
        Ok(response.key.id)
    }

    async fn change_bot_status(
        &self,
        instance: &str,
        address: &str,
        status: BotStatus,
    ) -> Result<(), SwitchboardError> {
        let body = ChangeStatusRequest {
            remote_jid: address,
            status,
        };
        let _: serde_json::Value = self
            .request(
                reqwest::Method::POST,
                &format!("typebot/changeStatus/{instance}"),
                Some(&body),
            )
            .await?;
        debug!(instance, address, %status, "bot session status changed");
        Ok(())
    }

    async fn list_bot_sessions(
        &self,
        instance: &str,
        bot_id: &str,
    ) -> Result<Vec<BotSession>, SwitchboardError> {
        let list: Option<BotSessionList> = self
            .request::<(), _>(
                reqwest::Method::GET,
                &format!("typebot/fetchSessions/{instance}/{bot_id}"),
                None,
            )
            .await?;
        let sessions: Vec<BotSession> = list
            .map(BotSessionList::into_inner)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| raw.into_bot_session(bot_id))
            .collect();
        debug!(instance, bot_id, count = sessions.len(), "bot sessions fetched");
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> EvolutionClient {
        let config = EvolutionConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
            instances: Vec::new(),
        };
        EvolutionClient::new(&config)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn send_text_posts_number_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/main"))
            .and(header("apikey", "test-key"))
            .and(body_json(serde_json::json!({"number": "5511999990000", "text": "hi"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": {"id": "MSG1", "remoteJid": "5511999990000@s.whatsapp.net", "fromMe": true},
                "status": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id = client
            .send_text("main", "5511999990000@s.whatsapp.net", "hi")
            .await
            .unwrap();
        assert_eq!(id, "MSG1");
    }

    #[tokio::test]
    async fn change_status_tolerates_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/typebot/changeStatus/main"))
            .and(body_json(serde_json::json!({"remoteJid": "x@s.whatsapp.net", "status": "closed"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .change_bot_status("main", "x@s.whatsapp.net", BotStatus::Closed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_sessions_maps_snapshots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/typebot/fetchSessions/main/bot-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "s1", "remoteJid": "a@s.whatsapp.net", "status": "opened",
                 "updatedAt": "2026-01-01T00:00:00Z"},
                {"id": "s2", "remoteJid": "b@s.whatsapp.net", "status": "weird"}
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let sessions = client.list_bot_sessions("main", "bot-1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].remote_jid, "a@s.whatsapp.net");
        assert_eq!(sessions[0].bot_id, "bot-1");
    }

    #[tokio::test]
    async fn retries_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/typebot/fetchSessions/main/bot-1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/typebot/fetchSessions/main/bot-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let sessions = client.list_bot_sessions("main", "bot-1").await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn client_error_is_surfaced_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/main"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": 400, "error": "Bad Request", "response": {"message": "number invalid"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_text("main", "bogus", "hi").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Gateway { .. }));
        assert!(err.to_string().contains("number invalid"), "got: {err}");
    }

    #[test]
    fn group_addresses_keep_their_jid() {
        assert_eq!(send_number("123@g.us"), "123@g.us");
        assert_eq!(send_number("5511@s.whatsapp.net"), "5511");
    }
}
