//! Domain Layer - Core business logic and entities
//!
//! This module contains the user entities, value objects, and the pure
//! visibility rules applied to them.

pub mod user;

pub use user::*;
