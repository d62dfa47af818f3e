//! User persistence

pub mod in_memory;
pub mod user_repository;

pub use in_memory::InMemoryUserRepository;
pub use user_repository::{SqlxUserRepository, run_migrations};
