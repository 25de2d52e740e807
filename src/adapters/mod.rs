//! Adapters implementing the ports.
//!
//! - `ai` - reasoning service clients

pub mod ai;
