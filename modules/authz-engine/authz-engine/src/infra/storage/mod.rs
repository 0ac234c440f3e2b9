//! Storage backends.

mod memory;

pub use memory::InMemoryStorage;
