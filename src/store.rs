// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ledger storage.
//!
//! The engine never stores anything itself; callers load an order's ledger,
//! run a request against it and append the returned events. [`LedgerStore`]
//! is that contract, and [`InMemoryLedgerStore`] a thread-safe implementation
//! that also serializes reconciliation per order.

use crate::base::{EventGuid, OrderRef};
use crate::event::PaymentEvent;
use crate::response::PaymentApiResponse;
use crate::PaymentsError;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Append-only storage of order ledgers.
pub trait LedgerStore: Send + Sync {
    /// Full ordered history of `order`; empty for an unknown order.
    fn load(&self, order: &OrderRef) -> Vec<PaymentEvent>;

    /// Appends `events` to `order`'s ledger, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::DuplicateEvent`] - An event guid is already stored.
    /// - [`PaymentsError::InvalidLedger`] - A parent guid resolves to no earlier event of the
    ///   order.
    fn append(&self, order: &OrderRef, events: &[PaymentEvent]) -> Result<(), PaymentsError>;
}

/// In-memory ledgers with per-order locking.
///
/// Ledgers live in a [`DashMap`] of per-order [`Mutex`]es, so different orders
/// never contend. Event guids are unique across all orders. Every appended
/// guid is also published to a [`SegQueue`] feed, in append order.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: DashMap<OrderRef, Arc<Mutex<Vec<PaymentEvent>>>>,
    guids: DashMap<EventGuid, OrderRef>,
    appended: SegQueue<(OrderRef, EventGuid)>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, order: &OrderRef) -> Arc<Mutex<Vec<PaymentEvent>>> {
        Arc::clone(
            self.ledgers
                .entry(order.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                .value(),
        )
    }

    /// Runs `process` on a snapshot of `order`'s ledger and appends the
    /// events it returns, holding the order's lock throughout.
    ///
    /// Concurrent calls for the same order run one after the other and each
    /// sees the events of the previous one. Nothing is appended when
    /// `process` fails.
    ///
    /// # Errors
    ///
    /// Whatever `process` returns, or the [`LedgerStore::append`] errors.
    pub fn reconcile<F>(
        &self,
        order: &OrderRef,
        process: F,
    ) -> Result<PaymentApiResponse, PaymentsError>
    where
        F: FnOnce(Vec<PaymentEvent>) -> Result<PaymentApiResponse, PaymentsError>,
    {
        let ledger = self.ledger(order);
        let mut ledger = ledger.lock();
        let response = process(ledger.clone())?;
        self.append_locked(order, &mut ledger, &response.events)?;
        Ok(response)
    }

    fn append_locked(
        &self,
        order: &OrderRef,
        ledger: &mut Vec<PaymentEvent>,
        events: &[PaymentEvent],
    ) -> Result<(), PaymentsError> {
        let mut known: HashSet<&EventGuid> = ledger.iter().map(|event| &event.guid).collect();
        for event in events {
            if !known.insert(&event.guid) {
                return Err(PaymentsError::DuplicateEvent(event.guid.clone()));
            }
            if let Some(parent) = &event.parent_guid
                && !known.contains(parent)
            {
                return Err(PaymentsError::InvalidLedger(format!(
                    "event {} references unknown parent {}",
                    event.guid, parent
                )));
            }
        }

        // Claim the guids store-wide; give them back if another order holds one.
        for (claimed, event) in events.iter().enumerate() {
            match self.guids.entry(event.guid.clone()) {
                Entry::Occupied(_) => {
                    for released in &events[..claimed] {
                        self.guids.remove(&released.guid);
                    }
                    return Err(PaymentsError::DuplicateEvent(event.guid.clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(order.clone());
                }
            }
        }

        for event in events {
            self.appended.push((order.clone(), event.guid.clone()));
        }
        ledger.extend_from_slice(events);
        tracing::debug!(
            order = %order,
            appended = events.len(),
            total = ledger.len(),
            "ledger appended"
        );
        Ok(())
    }

    /// Drains the feed of appended event guids, oldest first.
    pub fn take_appended(&self) -> Vec<(OrderRef, EventGuid)> {
        std::iter::from_fn(|| self.appended.pop()).collect()
    }

    /// Order that owns `guid`, if stored.
    pub fn order_of(&self, guid: &EventGuid) -> Option<OrderRef> {
        self.guids.get(guid).map(|entry| entry.value().clone())
    }

    pub fn order_count(&self) -> usize {
        self.ledgers.len()
    }

    /// Number of events stored across all orders.
    pub fn len(&self) -> usize {
        self.guids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, order: &OrderRef) -> Vec<PaymentEvent> {
        self.ledgers
            .get(order)
            .map(|ledger| ledger.lock().clone())
            .unwrap_or_default()
    }

    fn append(&self, order: &OrderRef, events: &[PaymentEvent]) -> Result<(), PaymentsError> {
        let ledger = self.ledger(order);
        let mut ledger = ledger.lock();
        self.append_locked(order, &mut ledger, events)
    }
}
