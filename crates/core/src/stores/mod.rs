pub mod memory;

pub use memory::InMemoryIndex;
