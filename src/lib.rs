//! 凭据与会话授权服务库
//! 认证人类用户与服务账号，签发/吊销会话，记录审计事件

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
