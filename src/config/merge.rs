//! Source composition and deserialization.

pub mod policy;
pub mod service;
