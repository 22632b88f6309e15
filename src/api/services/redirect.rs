use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, web};
use tracing::{debug, error, trace};

use crate::errors::LinkstashError;
use crate::storage::StateStore;

/// 跳转相关设置，由服务器配置构建
#[derive(Debug, Clone, Default)]
pub struct RedirectSettings {
    /// 访问根路径时的跳转地址
    pub default_url: Option<String>,
}

pub struct RedirectService;

impl RedirectService {
    pub async fn handle_redirect(
        path: web::Path<String>,
        store: web::Data<Arc<dyn StateStore>>,
        settings: web::Data<RedirectSettings>,
    ) -> HttpResponse {
        let key = path.into_inner();

        if key.is_empty() {
            return match settings.default_url.as_deref() {
                Some(url) => Self::finish_redirect(url),
                None => Self::not_found_response(),
            };
        }

        match store.load(&key).await {
            Ok(url) => {
                trace!("Redirecting {} -> {}", key, url);
                Self::finish_redirect(&url)
            }
            Err(LinkstashError::KeyNotFound(_)) => {
                debug!("Redirect key not found: {}", key);
                Self::not_found_response()
            }
            Err(e) => {
                error!("Storage error during redirect lookup: {}", e);
                Self::error_response()
            }
        }
    }

    #[inline]
    fn finish_redirect(url: &str) -> HttpResponse {
        HttpResponse::TemporaryRedirect()
            .insert_header((header::LOCATION, url))
            .finish()
    }

    #[inline]
    fn not_found_response() -> HttpResponse {
        HttpResponse::build(StatusCode::NOT_FOUND)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .insert_header(("Cache-Control", "public, max-age=60"))
            .body("Not Found")
    }

    #[inline]
    fn error_response() -> HttpResponse {
        HttpResponse::build(StatusCode::INTERNAL_SERVER_ERROR)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .body("Internal Server Error")
    }
}

/// 跳转路由，必须在其他路由之后注册
pub fn redirect_routes() -> actix_web::Scope {
    web::scope("")
        .route("/{key:.*}", web::get().to(RedirectService::handle_redirect))
        .route("/{key:.*}", web::head().to(RedirectService::handle_redirect))
}
