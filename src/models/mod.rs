//! 数据模型模块

pub mod action;
pub mod auth;
pub mod principal;
pub mod service_account;
pub mod session;
pub mod user;
