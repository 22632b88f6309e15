use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::api::services::CLI_USER_AGENT;
use crate::config::StaticConfig;
use crate::errors::{LinkstashError, Result};

/// HTTP 请求超时时间（秒）
const HTTP_TIMEOUT_SECS: u64 = 10;

/// admin 接口客户端
///
/// 非 200 响应转换为 `ClientRequest` 错误，错误信息为服务端返回的正文。
pub struct AdminClient {
    agent: Agent,
    admin_url: String,
}

impl AdminClient {
    pub fn new(admin_url: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            admin_url: admin_url.into(),
        }
    }

    pub fn from_config(config: &StaticConfig) -> Self {
        Self::new(config.admin_url())
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    pub fn add(&self, key: &str, url: &str) -> Result<String> {
        let request_url = format!(
            "{}?key={}&url={}",
            self.admin_url,
            urlencoding::encode(key),
            urlencoding::encode(url)
        );
        let resp = self
            .agent
            .post(&request_url)
            .header("User-Agent", CLI_USER_AGENT)
            .send_empty();
        Self::finish("add", resp)
    }

    pub fn delete(&self, key: &str) -> Result<String> {
        let request_url = format!("{}?key={}", self.admin_url, urlencoding::encode(key));
        let resp = self
            .agent
            .delete(&request_url)
            .header("User-Agent", CLI_USER_AGENT)
            .call();
        Self::finish("delete", resp)
    }

    pub fn list(&self) -> Result<String> {
        let resp = self
            .agent
            .get(&self.admin_url)
            .header("User-Agent", CLI_USER_AGENT)
            .call();
        Self::finish("list", resp)
    }

    /// 请求体原样发送，每行一个 `key,url`
    pub fn add_batch(&self, body: &str) -> Result<String> {
        let resp = self
            .agent
            .put(&self.admin_url)
            .header("User-Agent", CLI_USER_AGENT)
            .content_type("text/plain; charset=utf-8")
            .send(body);
        Self::finish("add batch", resp)
    }

    fn finish(
        op: &str,
        resp: std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<String> {
        let mut resp = resp.map_err(|e| {
            LinkstashError::client_request(format!("Could not {} item, reason {}", op, e))
        })?;
        let status = resp.status();
        let body = resp.body_mut().read_to_string().map_err(|e| {
            LinkstashError::client_request(format!("Could not read {} response, reason {}", op, e))
        })?;

        debug!("Admin client {} -> {}", op, status);
        if status == ureq::http::StatusCode::OK {
            Ok(body)
        } else {
            Err(LinkstashError::client_request(body))
        }
    }
}
