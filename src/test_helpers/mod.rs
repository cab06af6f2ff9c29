// Test Helpers Module
//
// In-memory store, scriptable engine and record service fakes, and model
// fixtures shared by unit and integration tests.

pub mod fixtures;
pub mod in_memory_store;
pub mod mocks;

pub use fixtures::*;
pub use in_memory_store::InMemoryRunStore;
pub use mocks::{
    MockExecutionEngine, MockRecordSink, MockRecordSource, RecordUpdate, SubmittedBatch,
};
