//! Signal source adapters.
//!
//! Real scraping of Congress.gov, SEC EDGAR Form 4 filings, and 13F
//! aggregators is out of scope; these fetchers produce structurally valid
//! `RawSignalRecord`s so the ingestion pipeline has a concrete
//! `SignalFetcher` to drive end to end.

pub mod congressional;
pub mod form4;
pub mod institutional13f;
