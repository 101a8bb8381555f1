//! AWS-oriented adapters and handlers for the hit counter function.
//!
//! This crate owns runtime integration details (the Lambda handler and the
//! DynamoDB counter store) on top of the contract in `hit_counter_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
