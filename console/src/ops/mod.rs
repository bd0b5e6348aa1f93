//! Privileged operation execution engine

pub mod classifier;
pub mod gateway;
pub mod invocation;
pub mod locks;
pub mod session;
pub mod supervisor;
