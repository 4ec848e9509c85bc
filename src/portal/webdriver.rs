//! Thin W3C WebDriver client implementing [`PageDriver`].
//!
//! Talks to a running WebDriver server (chromedriver, geckodriver, a
//! Selenium grid). All browser mechanics live on the other side.

use super::strategy::{PageDriver, Selector};
use crate::error::PortalError;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Deserialize)]
struct WireResponse {
    value: Value,
}

pub struct WebDriverPage {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverPage {
    /// Open a new browser session on the WebDriver server at `endpoint`.
    pub async fn connect(endpoint: &str, request_timeout: Duration) -> Result<Self, PortalError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PortalError::Session(e.to_string()))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let body = json!({ "capabilities": { "alwaysMatch": {} } });
        let resp = client
            .post(format!("{endpoint}/session"))
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let value = read_value(resp).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| PortalError::Session("WebDriver returned no sessionId".to_string()))?
            .to_string();

        tracing::info!("WebDriver session {} opened at {}", session_id, endpoint);
        Ok(Self {
            client,
            endpoint,
            session_id,
        })
    }

    /// End the browser session. Errors are logged, not returned.
    pub async fn close(self) {
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        if let Err(e) = self.client.delete(&url).send().await {
            tracing::warn!("Closing WebDriver session {} failed: {}", self.session_id, e);
        }
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.endpoint, self.session_id, path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, PortalError> {
        let resp = self
            .client
            .post(self.session_url(path))
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        read_value(resp).await
    }

    async fn get(&self, path: &str) -> Result<Value, PortalError> {
        let resp = self
            .client
            .get(self.session_url(path))
            .send()
            .await
            .map_err(map_transport)?;
        read_value(resp).await
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<String>, PortalError> {
        let (using, value) = match selector {
            Selector::Css(s) => ("css selector", s.as_str()),
            Selector::XPath(s) => ("xpath", s.as_str()),
        };
        let found = self
            .post("/elements", json!({ "using": using, "value": value }))
            .await?;
        let ids = found
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn find_one(&self, selector: &Selector) -> Result<String, PortalError> {
        self.find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::ElementMissing(format!("{selector:?}")))
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn goto(&mut self, url: &str) -> Result<(), PortalError> {
        self.post("/url", json!({ "url": url })).await.map(|_| ())
    }

    async fn exists(&mut self, selector: &Selector) -> Result<bool, PortalError> {
        Ok(!self.find_all(selector).await?.is_empty())
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), PortalError> {
        let id = self.find_one(selector).await?;
        self.post(&format!("/element/{id}/click"), json!({}))
            .await
            .map(|_| ())
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> Result<(), PortalError> {
        let id = self.find_one(selector).await?;
        // <select> elements reject clear; typing still picks the option
        if let Err(e) = self.post(&format!("/element/{id}/clear"), json!({})).await {
            tracing::debug!("clear on {:?} ignored: {}", selector, e);
        }
        self.post(&format!("/element/{id}/value"), json!({ "text": text }))
            .await
            .map(|_| ())
    }

    async fn attach_file(&mut self, selector: &Selector, path: &Path) -> Result<(), PortalError> {
        let absolute = std::fs::canonicalize(path)
            .map_err(|e| PortalError::Unavailable(format!("evidence file {}: {e}", path.display())))?;
        let id = self.find_one(selector).await?;
        self.post(
            &format!("/element/{id}/value"),
            json!({ "text": absolute.to_string_lossy() }),
        )
        .await
        .map(|_| ())
    }

    async fn body_text(&mut self) -> Result<String, PortalError> {
        let id = self.find_one(&Selector::css("body")).await?;
        let value = self.get(&format!("/element/{id}/text")).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, PortalError> {
        let value = self.get("/screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| PortalError::Network("screenshot payload is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PortalError::Network(format!("screenshot decode: {e}")))
    }
}

fn map_transport(e: reqwest::Error) -> PortalError {
    if e.is_timeout() {
        PortalError::Timeout(Duration::ZERO)
    } else {
        PortalError::Network(e.to_string())
    }
}

async fn read_value(resp: reqwest::Response) -> Result<Value, PortalError> {
    let status = resp.status();
    let body: WireResponse = resp.json().await.map_err(map_transport)?;
    if status.is_success() {
        return Ok(body.value);
    }
    if status.as_u16() == 429 {
        return Err(PortalError::RateLimited(status.to_string()));
    }
    Err(map_wire_error(&body.value))
}

/// Map a WebDriver error payload onto the portal taxonomy
fn map_wire_error(value: &Value) -> PortalError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    let detail = format!("{code}: {message}");
    match code {
        "no such element" | "stale element reference" | "element not interactable"
        | "element click intercepted" => PortalError::ElementMissing(detail),
        "timeout" | "script timeout" => PortalError::Timeout(Duration::ZERO),
        "invalid session id" | "session not created" => PortalError::Session(detail),
        _ => PortalError::Network(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_map_to_taxonomy() {
        let err = map_wire_error(&json!({ "error": "no such element", "message": "x\nstack" }));
        assert!(matches!(err, PortalError::ElementMissing(ref d) if d == "no such element: x"));
        assert!(err.is_transient());

        let err = map_wire_error(&json!({ "error": "invalid session id", "message": "gone" }));
        assert!(matches!(err, PortalError::Session(_)));
        assert!(!err.is_transient());

        let err = map_wire_error(&json!({ "error": "timeout" }));
        assert!(matches!(err, PortalError::Timeout(_)));
    }
}
