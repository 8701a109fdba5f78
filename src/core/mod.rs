//! Evaluation core: policy model, matching, quota and engine lifecycle

pub mod config;
pub mod error;
pub mod iam;
pub mod validation;
