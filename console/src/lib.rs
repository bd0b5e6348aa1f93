//! Bosun Console Library
//!
//! Core modules for the Bosun host console daemon: privileged operation
//! execution, progress streaming, stack lifecycle, and audit.

pub mod app;
pub mod audit;
pub mod authn;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod ops;
pub mod server;
pub mod stacks;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
