//! HTTP 接口（actix-web）

pub mod services;
