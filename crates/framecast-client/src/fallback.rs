//! HTTP fallback: `POST /notifications` and `GET /notifications`.

use std::time::Duration;

use framecast_core::constants::{API_KEY_HEADER, APP_ID_HEADER};
use framecast_core::{NotificationDraft, NotificationRecord};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::errors::ClientError;

/// HTTP client for the broker's Fallback Gateway.
#[derive(Clone, Debug)]
pub struct FallbackGateway {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    app_id: String,
}

impl FallbackGateway {
    /// Client for `base_url` (no trailing slash) with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        app_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
            app_id: app_id.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}/notifications", self.base_url)
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(APP_ID_HEADER, &self.app_id);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Publish over HTTP; returns the broker-built record.
    pub async fn publish(&self, draft: &NotificationDraft) -> Result<NotificationRecord, ClientError> {
        let response = self
            .with_identity(self.http.post(self.url()))
            .json(draft)
            .send()
            .await?;
        let record: NotificationRecord = ok_json(response).await?;
        debug!(notification_id = %record.id, "published over http fallback");
        Ok(record)
    }

    /// Broker history, newest first.
    pub async fn history(&self) -> Result<Vec<NotificationRecord>, ClientError> {
        let response = self
            .with_identity(self.http.get(self.url()))
            .send()
            .await?;
        ok_json(response).await
    }
}

async fn ok_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": "d",
            "source": "orders-app",
            "sourceId": "",
            "type": "success",
            "timestamp": "2026-03-01T10:00:00.000Z",
            "actionable": false,
            "link": "",
            "smsEnabled": false,
            "smsRecipient": ""
        })
    }

    fn gateway(server: &MockServer, key: Option<&str>) -> FallbackGateway {
        FallbackGateway::new(
            server.uri(),
            key.map(str::to_owned),
            "orders-app",
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publish_posts_draft_with_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .and(header("x-api-key", "secret"))
            .and(header("x-app-id", "orders-app"))
            .and(body_partial_json(json!({"title": "Order Placed", "type": "success"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(record_json("n1", "Order Placed")))
            .expect(1)
            .mount(&server)
            .await;

        let record = gateway(&server, Some("secret"))
            .publish(&NotificationDraft::new("Order Placed", "d", "success"))
            .await
            .unwrap();
        assert_eq!(record.id.as_str(), "n1");
    }

    #[tokio::test]
    async fn publish_without_key_omits_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(201).set_body_json(record_json("n2", "t")))
            .mount(&server)
            .await;

        let _ = gateway(&server, None)
            .publish(&NotificationDraft::new("t", "d", "success"))
            .await
            .unwrap();
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("x-api-key").is_none());
    }

    #[tokio::test]
    async fn client_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "missing required fields: title"})))
            .mount(&server)
            .await;

        let err = gateway(&server, None)
            .publish(&NotificationDraft::default())
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Status { status: 400, body } if body.contains("title"));
    }

    #[tokio::test]
    async fn history_decodes_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notifications"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([record_json("b", "second"), record_json("a", "first")])),
            )
            .mount(&server)
            .await;

        let list = gateway(&server, None).history().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "second");
    }

    #[tokio::test]
    async fn unreachable_broker_is_http_error() {
        let gw = FallbackGateway::new("http://127.0.0.1:1", None, "a", Duration::from_millis(500)).unwrap();
        assert_matches!(gw.history().await, Err(ClientError::Http(_)));
    }
}
