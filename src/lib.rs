//! homewatch - home alarm status with a shared OAuth2 credential lifecycle
//!
//! The interactive CLI and the periodic background `sync` job are separate
//! processes. They never talk to each other; they share one credential
//! record and one status cache through [`store`].

pub mod api;
pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod models;
pub mod store;
pub mod sync;
