//! iControl REST binding for the monitor collections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiAttributes, MonitorApi};
use crate::config::ConnectionConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::params::MonitorKind;
use crate::version::user_agent;

pub struct IControlClient {
    base_url: Url,
    user: String,
    password: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
}

impl IControlClient {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        validate_certs: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .danger_accept_invalid_certs(!validate_certs)
            .build()?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| MonitorError::Config(format!("Invalid device URL '{base_url}'")))?;
        Ok(Self {
            base_url,
            user: user.into(),
            password: password.into(),
            client,
        })
    }

    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        Self::new(
            config.base_url(),
            config.user.clone(),
            config.password.clone(),
            config.validate_certs,
            Duration::from_secs(config.timeout_seconds.max(1)),
        )
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` only accepts URLs that can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn collection_url(&self, kind: MonitorKind) -> Url {
        self.url(&["mgmt", "tm", "ltm", "monitor", kind.collection()])
    }

    // Objects are addressed as `~partition~name`, percent-encoded as one segment.
    fn item_url(&self, kind: MonitorKind, name: &str, partition: &str) -> Url {
        let item = format!("~{partition}~{name}");
        self.url(&["mgmt", "tm", "ltm", "monitor", kind.collection(), &item])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = method.as_str(), url = url.as_str(), "Sending management API request.");
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn expect_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(unexpected(status, &body))
    }
}

fn unexpected(status: StatusCode, body: &str) -> MonitorError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| {
            b.message
                .map(|m| format!("{} Unexpected Error: {m}", b.code.unwrap_or(status.as_u16())))
        })
        .unwrap_or_else(|| format!("{} Unexpected Error: {body}", status.as_u16()));
    MonitorError::Api(message)
}

#[async_trait]
impl MonitorApi for IControlClient {
    async fn exists(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<bool> {
        let url = self.item_url(kind, name, partition);
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await?;
        Ok(true)
    }

    async fn load(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<ApiAttributes> {
        let url = self.item_url(kind, name, partition);
        let response = Self::expect_success(self.request(Method::GET, url.clone()).send().await?).await?;
        match response.json::<Value>().await? {
            Value::Object(attrs) => Ok(attrs),
            other => Err(MonitorError::Api(format!(
                "Expected a monitor object from {url}, got: {other}"
            ))),
        }
    }

    async fn create(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        mut attributes: ApiAttributes,
    ) -> Result<()> {
        attributes.insert("name".to_string(), Value::from(name));
        attributes.insert("partition".to_string(), Value::from(partition));
        let url = self.collection_url(kind);
        Self::expect_success(
            self.request(Method::POST, url)
                .json(&attributes)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn modify(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        attributes: ApiAttributes,
    ) -> Result<()> {
        let url = self.item_url(kind, name, partition);
        Self::expect_success(
            self.request(Method::PATCH, url)
                .json(&attributes)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<()> {
        let url = self.item_url(kind, name, partition);
        Self::expect_success(self.request(Method::DELETE, url).send().await?).await?;
        Ok(())
    }
}
