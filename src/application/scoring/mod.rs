//! Signal ingest quality filter and factor scorer.

pub mod factor_scorer;
pub mod quality_filter;

pub use factor_scorer::FactorScorer;
pub use quality_filter::QualityFilter;
