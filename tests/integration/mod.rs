//! Integration tests

pub mod api_test;
pub mod delivery_test;
pub mod queue_persistence_test;
pub mod realtime_test;
