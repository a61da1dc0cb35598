//! SENTINEL — Trade Admission Control & Guardrail Layer
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod limits;
pub mod guardrail;
pub mod ledger;
