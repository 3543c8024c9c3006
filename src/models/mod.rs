//! Data models

pub mod visit;
