//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps)
//! - `tools` - Tool definitions, the tool registry, and built-in tools
//! - `triage` - Report model, conversation history, request modes, and parsing

pub mod foundation;
pub mod tools;
pub mod triage;
