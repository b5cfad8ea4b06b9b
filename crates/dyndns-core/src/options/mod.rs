// # Option Store Implementations
//
// This module provides implementations of the ConfigStore trait.

pub mod memory;

pub use memory::MemoryConfigStore;
