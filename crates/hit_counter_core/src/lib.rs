//! Shared hit counter primitives.
//!
//! This crate owns the request/response contract of the counter function and
//! the typed declaration of the stack that provisions it (table, function,
//! REST endpoint). Synthesizing the declaration yields a CloudFormation
//! template. It intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod stack;
