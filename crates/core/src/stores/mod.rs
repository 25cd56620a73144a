pub mod memory;

pub use memory::InMemoryVectorIndex;
