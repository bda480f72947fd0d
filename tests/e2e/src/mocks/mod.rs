//! Deterministic embedders and fixture data

mod embedders;
mod fixtures;

pub use embedders::{
    FailingEmbedder, KeywordBucketEmbedder, UnavailableEmbedder, WrongDimensionEmbedder,
};
pub use fixtures::{TestDataFactory, TestScenario};
