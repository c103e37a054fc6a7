//! # Services module
//!
//! This module provide services to interact with the scalechamp api, the
//! instance resource lifecycle and helpers to do so.
pub mod cfg;
pub mod resource;
pub mod scalechamp;
