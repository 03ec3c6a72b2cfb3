//! Reference `DocumentStore` backends
//!
//! `MemoryStore` is the in-process implementation used by the facade's
//! `TermStore::in_memory()` constructor and by the test suites. The
//! `testing` module provides instrumented wrappers for failure injection.

pub mod memory;
pub mod testing;

pub use memory::MemoryStore;
pub use testing::FaultingStore;
