//! Data types for the cover extraction library.

pub mod config;
pub mod extraction;
