use async_trait::async_trait;
use reqwest::{self, Client};
use serde::Deserialize;
use serde_json::json;

use crate::errors::DeliveryError;
use crate::notifier::Messenger;

pub const DEFAULT_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack Web API reply; HTTP 200 with `ok: false` is still a failure.
#[derive(Deserialize, Debug)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

pub struct SlackMessenger {
    client: Client,
    endpoint: String,
    bot_token: String,
}

impl SlackMessenger {
    pub fn new(client: Client, endpoint: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            bot_token: bot_token.into(),
        }
    }
}

#[async_trait]
impl Messenger for SlackMessenger {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        let payload = json!({
            "channel": channel_id,
            "text": text,
        });

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::HttpStatus(status.as_u16(), body));
        }

        let reply: ApiResponse = res.json().await?;
        if reply.ok {
            tracing::debug!(channel_id, "Slack accepted message");
            Ok(())
        } else {
            Err(DeliveryError::Rejected(
                reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    /// Local stand-in for chat.postMessage answering with `reply`.
    async fn spawn_fake_slack(reply: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorded = seen.clone();
        let app = Router::new().route(
            "/api/chat.postMessage",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let recorded = recorded.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorded.lock().unwrap().push((auth, body));
                    Json(reply)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api/chat.postMessage"), seen)
    }

    #[tokio::test]
    async fn posts_channel_and_text_with_bearer_token() {
        let (endpoint, seen) = spawn_fake_slack(json!({"ok": true})).await;
        let messenger = SlackMessenger::new(Client::new(), endpoint, "xoxb-test");

        messenger.send("C123", "hello").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer xoxb-test"));
        assert_eq!(seen[0].1["channel"], "C123");
        assert_eq!(seen[0].1["text"], "hello");
    }

    #[tokio::test]
    async fn ok_false_is_a_delivery_error() {
        let (endpoint, _seen) =
            spawn_fake_slack(json!({"ok": false, "error": "channel_not_found"})).await;
        let messenger = SlackMessenger::new(Client::new(), endpoint, "xoxb-test");

        let result = messenger.send("C404", "hello").await;

        match result {
            Err(DeliveryError::Rejected(code)) => assert_eq!(code, "channel_not_found"),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let messenger =
            SlackMessenger::new(Client::new(), format!("http://{addr}/api"), "xoxb-test");

        let result = messenger.send("C1", "hello").await;

        assert!(matches!(result, Err(DeliveryError::NetworkError(_))));
    }
}
