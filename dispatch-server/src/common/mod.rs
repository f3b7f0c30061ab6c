//! Cross-cutting utilities

pub mod logger;
