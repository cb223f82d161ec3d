//! Store backend implementations.

pub mod consul;
pub mod local;
