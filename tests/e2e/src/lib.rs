//! End-to-end test support for Recollect
//!
//! - [`harness`]: temporary store roots that can be reopened and damaged
//! - [`mocks`]: deterministic embedders and seed data

pub mod harness;
pub mod mocks;

pub use harness::TestStore;
pub use mocks::{
    FailingEmbedder, KeywordBucketEmbedder, TestDataFactory, UnavailableEmbedder,
    WrongDimensionEmbedder,
};
