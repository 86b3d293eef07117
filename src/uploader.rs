// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Delivers graded cards to the store, one at a time, off the calling
//! thread.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::spawn_blocking;

use crate::session::upload::SessionId;
use crate::session::upload::UploadItem;
use crate::session::upload::UploadReport;
use crate::session::upload::UploadStatus;
use crate::store::Store;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Ticket {
    session: SessionId,
    index: usize,
}

pub struct Uploader {
    store: Arc<dyn Store>,
    in_flight: Option<Ticket>,
    tx: UnboundedSender<UploadReport>,
    rx: UnboundedReceiver<UploadReport>,
}

impl Uploader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store,
            in_flight: None,
            tx,
            rx,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Whether `item` of `session` is the one being persisted.
    pub fn is_uploading(&self, session: SessionId, index: usize) -> bool {
        self.in_flight == Some(Ticket { session, index })
    }

    /// Start persisting `item`. Returns `false`, doing nothing, if another
    /// item is still in flight. Must be called from within a tokio runtime.
    pub fn start(&mut self, session: SessionId, item: &UploadItem) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let ticket = Ticket {
            session,
            index: item.index,
        };
        self.in_flight = Some(ticket);
        let store = Arc::clone(&self.store);
        let result = item.to_result();
        let tx = self.tx.clone();
        log::debug!("Uploading card at {} of session {session}", item.index);
        tokio::spawn(async move {
            let status = match spawn_blocking(move || store.persist_result(&result)).await {
                Ok(Ok(())) => UploadStatus::Success,
                Ok(Err(e)) => {
                    log::error!("Failed to store card at {}: {}", ticket.index, e.message());
                    UploadStatus::Error
                }
                Err(e) => {
                    log::error!("Upload task for card at {} failed: {e}", ticket.index);
                    UploadStatus::Error
                }
            };
            let report = UploadReport {
                session: ticket.session,
                index: ticket.index,
                status,
            };
            // The receiver only goes away with the uploader itself.
            let _ = tx.send(report);
        });
        true
    }

    /// Wait for the in-flight upload to finish. Returns `None` at once if
    /// nothing is in flight.
    pub async fn recv(&mut self) -> Option<UploadReport> {
        self.in_flight?;
        let report = self.rx.recv().await?;
        self.in_flight = None;
        Some(report)
    }

    /// The in-flight upload's report, if it has already arrived.
    pub fn try_recv(&mut self) -> Option<UploadReport> {
        self.in_flight?;
        let report = self.rx.try_recv().ok()?;
        self.in_flight = None;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DailyLimits;
    use crate::error::Fallible;
    use crate::fsrs::Rating;
    use crate::helper::MemoryStore;
    use crate::helper::sample_data;
    use crate::params::Algorithm;
    use crate::scheduler::Scheduler;
    use crate::store::Consumption;
    use crate::types::counts::Counts;
    use crate::types::timestamp::Timestamp;

    fn store() -> MemoryStore {
        let consumption = Consumption {
            daily_limits: DailyLimits::default(),
            consumed: Counts::default(),
        };
        MemoryStore::new(sample_data(2), consumption)
    }

    fn item(index: usize) -> Fallible<UploadItem> {
        let card = &sample_data(2).cards[index];
        let outcome = Scheduler::from_algorithm(&Algorithm::default())?.grade(card, Timestamp::now(), Rating::Good);
        Ok(UploadItem {
            index,
            card: outcome.card,
            review: outcome.review,
        })
    }

    #[tokio::test]
    async fn test_single_flight() -> Fallible<()> {
        let store = Arc::new(store().delay(Duration::from_millis(20)));
        let mut uploader = Uploader::new(store.clone());
        assert!(uploader.is_idle());
        assert!(uploader.start(1, &item(0)?));
        assert!(!uploader.start(1, &item(1)?));
        assert!(uploader.is_uploading(1, 0));
        let report = uploader.recv().await;
        assert_eq!(
            report,
            Some(UploadReport {
                session: 1,
                index: 0,
                status: UploadStatus::Success
            })
        );
        assert!(uploader.is_idle());
        assert!(uploader.start(1, &item(1)?));
        assert!(uploader.recv().await.is_some());
        assert_eq!(store.persisted().len(), 2);
        assert_eq!(store.max_in_flight(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_is_reported() -> Fallible<()> {
        let item = item(0)?;
        let store = Arc::new(store().failing(&[item.card.id]));
        let mut uploader = Uploader::new(store.clone());
        uploader.start(7, &item);
        let report = uploader.recv().await;
        assert_eq!(report.map(|r| r.status), Some(UploadStatus::Error));
        assert!(store.persisted().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_recv_when_idle() {
        let mut uploader = Uploader::new(Arc::new(store()));
        assert_eq!(uploader.recv().await, None);
        assert_eq!(uploader.try_recv(), None);
    }
}
