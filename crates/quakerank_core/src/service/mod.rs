//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate feed, store and report calls into one run.
//! - Keep the CLI decoupled from storage and HTTP details.

pub mod analyzer_service;
