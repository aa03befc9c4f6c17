//! Runtime adapters.

pub mod storage;
