//! Ports: interfaces the application layer depends on.
//!
//! - `reasoning_service` - the external model that answers generate calls

mod reasoning_service;

pub use reasoning_service::{
    GenerateRequest, GenerateResponse, ReasoningService, RequestConfig, ServiceError, ServiceInfo,
};
