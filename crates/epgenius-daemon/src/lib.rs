//! `EPGenius` Daemon Library
//!
//! HTTP adapters for the core collaborator traits, service wiring from
//! configuration, and text rendering used by the `epgenius` binary.

pub mod app;
pub mod http;
pub mod output;
