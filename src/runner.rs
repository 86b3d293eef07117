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

//! Hosts a [`Session`]: performs the fetches it asks for and keeps its
//! upload queue moving.

use std::mem::take;
use std::sync::Arc;

use crate::error::Fallible;
use crate::session::Effect;
use crate::session::Session;
use crate::session::event::Event;
use crate::session::upload::UploadReport;
use crate::store::Store;
use crate::types::timestamp::Timestamp;
use crate::uploader::Uploader;

pub struct SessionRunner {
    store: Arc<dyn Store>,
    session: Session,
    uploader: Uploader,
}

impl SessionRunner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let uploader = Uploader::new(Arc::clone(&store));
        Self {
            store,
            session: Session::new(),
            uploader,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Apply `event`, then perform whatever fetches the session is waiting
    /// on. A failed fetch is returned and retried on the next dispatch.
    pub fn dispatch(&mut self, event: Event) -> Fallible<()> {
        self.apply(event);
        while let Some(effect) = self.session.pending_effect() {
            let event = self.perform(effect)?;
            self.apply(event);
        }
        self.sync_uploads();
        Ok(())
    }

    /// Feed every upload report that has already arrived into the session.
    pub fn poll_uploads(&mut self) -> usize {
        let mut count = 0;
        while let Some(report) = self.uploader.try_recv() {
            self.apply(Event::UploadResult(report));
            self.sync_uploads();
            count += 1;
        }
        count
    }

    /// Wait for the in-flight upload and feed its report into the session.
    /// Returns `None` at once if nothing is in flight.
    pub async fn recv_report(&mut self) -> Option<UploadReport> {
        let report = self.uploader.recv().await?;
        self.apply(Event::UploadResult(report));
        self.sync_uploads();
        Some(report)
    }

    /// Wait until every queued result has been delivered.
    pub async fn drain(&mut self) {
        self.sync_uploads();
        while self.recv_report().await.is_some() {}
    }

    fn apply(&mut self, event: Event) {
        let session = take(&mut self.session);
        self.session = session.reduce(event);
    }

    fn perform(&self, effect: Effect) -> Fallible<Event> {
        let now = Timestamp::now();
        let event = match effect {
            Effect::FetchAvailableCounts(filter) => {
                Event::AvailableCountsReceived(self.store.available_counts(filter, now)?)
            }
            Effect::FetchConsumption => {
                Event::ConsumptionReceived(self.store.today_consumption(now)?)
            }
            Effect::FetchSessionData(filter, amounts) => Event::SessionDataReceived {
                data: self.store.session_cards(filter, &amounts, now)?,
                now,
            },
        };
        Ok(event)
    }

    /// Start the queue head if nothing is in flight.
    fn sync_uploads(&mut self) {
        if let Some(head) = self.session.upload().head() {
            if self.uploader.start(self.session.id(), head) {
                log::debug!("Started upload for card at {}", head.index);
            }
        }
    }
}
