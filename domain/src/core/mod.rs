//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: validation and aggregation failures
//! - [`error::TaskError`]: execution failures recorded inside results
//! - [`string`]: UTF-8 safe truncation helpers

pub mod error;
pub mod string;
