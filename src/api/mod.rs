//! API client module for the homes service

pub mod client;
mod homes;

pub use client::{ApiError, ResourceClient};
