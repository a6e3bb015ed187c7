// src/lib.rs - Library root for LinguaMetrica

pub mod cli;
pub mod core;
pub mod harness;
pub mod infra;
pub mod metrics;
pub mod provider;
pub mod reporter;
pub mod util;
