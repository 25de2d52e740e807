//! Triage Agent - multi-turn tool-calling orchestration for clinical triage
//!
//! This crate drives a conversation with an external reasoning service,
//! executes the tools it asks for, and turns its final answer into a
//! structured triage report.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
