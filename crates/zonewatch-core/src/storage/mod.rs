// # Cache Storage Implementations
//
// This module provides implementations of the CacheStorage trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileCacheStorage;
pub use memory::MemoryCacheStorage;
