//! ragdex - a CLI RAG assistant over hosted vector stores
//!
//! This crate provides:
//! - CLI commands for indexing local documents into remote vector stores
//! - Idempotent incremental extension of existing stores via a local
//!   session cache
//! - Single-shot and interactive retrieval-augmented question answering

pub mod cache;
pub mod collect;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod estimate;
pub mod remote;

pub use config::Config;
pub use error::{Error, Result};
