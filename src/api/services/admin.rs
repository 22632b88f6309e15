//! Admin 接口
//!
//! 单一路径 `/_admin`，按 HTTP 方法区分操作：
//! - `POST ?key=K&url=U`：新增
//! - `DELETE ?key=K`：删除
//! - `GET`：列出全部
//! - `PUT`，请求体每行 `key,url`：批量新增

use std::sync::Arc;

use actix_web::http::{Method, StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use tracing::{debug, error, info, trace};

use crate::errors::{LinkstashError, Result};
use crate::storage::{BatchOutcome, Item, StateStore};

/// admin 接口路径
pub const ADMIN_PATH: &str = "/_admin";

/// CLI 客户端使用的 User-Agent，列表接口据此返回纯文本
pub const CLI_USER_AGENT: &str = "linkstash-cli";

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Add { key: String, url: String },
    Delete { key: String },
    List,
    AddBatch { items: Vec<Item> },
}

fn required_param(value: Option<&String>, command: &str, name: &str) -> Result<String> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => Ok(v.to_string()),
        None => Err(LinkstashError::validation(format!(
            "{} command is missing {} parameter",
            command, name
        ))),
    }
}

/// 解析批量请求体，格式错误的行直接跳过
pub fn parse_batch_body(body: &str) -> Vec<Item> {
    body.trim()
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split(',');
            let key = tokens.next()?.trim();
            let url = tokens.next()?.trim();
            if tokens.next().is_some() || key.is_empty() || url.is_empty() {
                trace!("Skipping malformed batch line: {:?}", line);
                return None;
            }
            Some(Item::new(key, url))
        })
        .collect()
}

/// 把请求解析为 admin 命令
pub fn parse_admin_command(method: &Method, query: &AdminQuery, body: &[u8]) -> Result<AdminCommand> {
    match *method {
        Method::POST => Ok(AdminCommand::Add {
            key: required_param(query.key.as_ref(), "Add", "key")?,
            url: required_param(query.url.as_ref(), "Add", "url")?,
        }),
        Method::DELETE => Ok(AdminCommand::Delete {
            key: required_param(query.key.as_ref(), "Delete", "key")?,
        }),
        Method::GET => Ok(AdminCommand::List),
        Method::PUT => {
            let body = std::str::from_utf8(body).map_err(|_| {
                LinkstashError::validation("Add batch request body is not valid UTF-8")
            })?;
            let items = parse_batch_body(body);
            if items.is_empty() {
                return Err(LinkstashError::validation("No parameters passed"));
            }
            Ok(AdminCommand::AddBatch { items })
        }
        _ => Err(LinkstashError::validation(format!(
            "Unknown method {}",
            method
        ))),
    }
}

fn text_response(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((header::CONTENT_TYPE, "text/plain; charset=utf-8"))
        .body(body)
}

/// 从 LinkstashError 构建错误响应
pub fn error_response(err: &LinkstashError) -> HttpResponse {
    if err.is_domain() || matches!(err, LinkstashError::Validation(_)) {
        debug!("Admin request rejected: {}", err);
    } else {
        error!("Admin request failed: {}", err);
    }
    text_response(err.http_status(), err.format_simple())
}

/// 纯文本列表，供 CLI 直接打印
pub fn format_plain_listing(items: &[Item]) -> String {
    let mut out = format!("> Number of stored items: {}\n", items.len());
    for item in items {
        out.push_str(&format!("> Short: {}\t URL: {}\n", item.key, item.value));
    }
    out
}

fn format_batch_outcome(outcome: &BatchOutcome) -> String {
    if outcome.skipped.is_empty() {
        format!("Added {} pairs to store", outcome.saved)
    } else {
        format!(
            "Added {} pairs to store, skipped {} existing keys: {}",
            outcome.saved,
            outcome.skipped.len(),
            outcome.skipped.join(", ")
        )
    }
}

pub struct AdminService;

impl AdminService {
    pub async fn handle_admin(
        req: HttpRequest,
        query: web::Query<AdminQuery>,
        body: web::Bytes,
        store: web::Data<Arc<dyn StateStore>>,
    ) -> HttpResponse {
        let command = match parse_admin_command(req.method(), &query, &body) {
            Ok(command) => command,
            Err(e) => return error_response(&e),
        };

        let is_cli = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ua| ua == CLI_USER_AGENT);

        Self::execute(command, store.get_ref().as_ref(), is_cli).await
    }

    async fn execute(command: AdminCommand, store: &dyn StateStore, is_cli: bool) -> HttpResponse {
        match command {
            AdminCommand::Add { key, url } => {
                match store.save(Item::new(key.clone(), url.clone())).await {
                    Ok(()) => {
                        info!("Admin API: added {} -> {}", key, url);
                        text_response(StatusCode::OK, format!("Added <{}, {}> to store", key, url))
                    }
                    Err(e) => error_response(&e),
                }
            }
            AdminCommand::Delete { key } => match store.delete(&key).await {
                Ok(previous) => {
                    if previous.is_some() {
                        info!("Admin API: deleted {}", key);
                    } else {
                        debug!("Admin API: delete of absent key {}", key);
                    }
                    text_response(StatusCode::OK, format!("Deleted key {}", key))
                }
                Err(e) => error_response(&e),
            },
            AdminCommand::List => match store.load_all().await {
                Ok(mut items) => {
                    items.sort_by(|a, b| a.key.cmp(&b.key));
                    if is_cli {
                        text_response(StatusCode::OK, format_plain_listing(&items))
                    } else {
                        HttpResponse::Ok().json(items)
                    }
                }
                Err(e) => error_response(&e),
            },
            AdminCommand::AddBatch { items } => {
                let total = items.len();
                match store.save_all(items).await {
                    Ok(outcome) => {
                        info!(
                            "Admin API: batch of {} saved {}, skipped {}",
                            total,
                            outcome.saved,
                            outcome.skipped.len()
                        );
                        text_response(StatusCode::OK, format_batch_outcome(&outcome))
                    }
                    Err(e) => error_response(&e),
                }
            }
        }
    }
}

pub fn admin_routes() -> actix_web::Resource {
    web::resource(ADMIN_PATH).route(web::route().to(AdminService::handle_admin))
}
