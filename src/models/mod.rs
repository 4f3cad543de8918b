//! Data models for homes and alarm status

mod home;

pub use home::*;
