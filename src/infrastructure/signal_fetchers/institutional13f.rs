//! 13F institutional holdings fetcher (source `INSTITUTIONAL_13F`). Real
//! EDGAR 13F aggregation is out of scope; see
//! `congressional::CongressionalFetcher` for the shared queue-and-drain
//! simulation pattern this adapter follows. 13F filings are quarterly, so
//! this fetcher is expected to be polled far less often than the Form 4 and
//! congressional adapters.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{RawSignalRecord, SignalFetcher};
use crate::domain::signal::SignalSource;

pub struct Institutional13FFetcher {
    pending: Arc<RwLock<Vec<RawSignalRecord>>>,
}

impl Institutional13FFetcher {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn enqueue(&self, records: Vec<RawSignalRecord>) {
        self.pending.write().await.extend(records);
    }
}

impl Default for Institutional13FFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalFetcher for Institutional13FFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::Institutional13F
    }

    async fn fetch_recent(&self) -> anyhow::Result<Vec<RawSignalRecord>> {
        let mut pending = self.pending.write().await;
        Ok(std::mem::take(&mut *pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_institutional_13f() {
        assert_eq!(
            Institutional13FFetcher::new().source(),
            SignalSource::Institutional13F
        );
    }
}
