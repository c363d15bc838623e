//! Adapters for every capability trait in `domain::ports` and
//! `domain::repositories`.
//!
//! One subdirectory per concern (`repositories`, `persistence`,
//! `observability`), each concrete adapter implementing its domain trait
//! directly with no shared base type.

pub mod market_data;
pub mod observability;
pub mod paper_broker;
pub mod persistence;
pub mod repositories;
pub mod signal_fetchers;
