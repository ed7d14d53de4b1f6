pub mod analytics;
pub mod api;
pub mod config;
pub mod cookie;
pub mod models;
pub mod service;
pub mod storage;
