//! Authentication and authorization

pub mod authorizer;

pub use authorizer::{Authorizer, Identity, TokenAuthorizer};
