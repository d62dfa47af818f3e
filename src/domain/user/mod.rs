//! User domain module
//!
//! Contains the user aggregate, its value objects, the visibility policy,
//! errors, and the repository trait.

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;
pub mod visibility;

pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
pub use visibility::*;
