//! Property-based tests

pub mod delivery_proptest;
