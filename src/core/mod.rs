//! Core types: job definitions, quota state, and the worker boundary.

pub mod job;
pub mod quota;
pub mod types;
pub mod worker;
