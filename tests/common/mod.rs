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

//! Shared fixtures: a scripted provider that records every call.

#![allow(dead_code)]

use parking_lot::Mutex;
use payment_ledger::{
    CancelCapability, CapabilityRequest, CapabilityRequestFailed, CapabilityResponse,
    CapabilityResult, ChargeCapability, CreditCapability, Money, ModifyCapability, Operation,
    OrderContext, PaymentEngine, PaymentEvent, PaymentInstrument, PaymentProvider, PaymentStatus,
    ProviderRegistry, ReserveCapability, ReverseChargeCapability, TransactionType,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

pub const ALL: [Operation; 6] = [
    Operation::Reserve,
    Operation::Modify,
    Operation::Cancel,
    Operation::Charge,
    Operation::Credit,
    Operation::ReverseCharge,
];

/// A provider whose replies are scripted per operation.
///
/// Every call is logged with its amount. Calls are approved unless a decline
/// is queued for the operation.
#[derive(Clone, Default)]
pub struct Gateway {
    calls: Arc<Mutex<Vec<(Operation, Decimal)>>>,
    declines: Arc<Mutex<HashMap<Operation, usize>>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines the next `times` calls of `operation`.
    pub fn decline(&self, operation: Operation, times: usize) {
        self.declines.lock().insert(operation, times);
    }

    pub fn decline_always(&self, operation: Operation) {
        self.decline(operation, usize::MAX);
    }

    pub fn calls(&self) -> Vec<(Operation, Decimal)> {
        self.calls.lock().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls.lock().iter().filter(|(op, _)| *op == operation).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// A provider exposing only `operations`.
    pub fn provider(&self, name: &str, operations: &[Operation]) -> PaymentProvider {
        let mut provider = PaymentProvider::new(name);
        for operation in operations {
            provider = match operation {
                Operation::Reserve => provider.with_reserve(self.clone()),
                Operation::Modify => provider.with_modify(self.clone()),
                Operation::Cancel => provider.with_cancel(self.clone()),
                Operation::Charge => provider.with_charge(self.clone()),
                Operation::Credit => provider.with_credit(self.clone()),
                Operation::ReverseCharge => provider.with_reverse_charge(self.clone()),
            };
        }
        provider
    }

    fn reply(&self, operation: Operation, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.calls.lock().push((operation, request.amount.amount));
        let mut declines = self.declines.lock();
        if let Some(remaining) = declines.get_mut(&operation)
            && *remaining > 0
        {
            *remaining = remaining.saturating_sub(1);
            return Err(CapabilityRequestFailed::new(
                format!("{operation} declined by gateway"),
                "The capability throws exception.",
            ));
        }
        Ok(CapabilityResponse {
            data: HashMap::from([("operation".to_string(), operation.to_string())]),
        })
    }
}

impl ReserveCapability for Gateway {
    fn reserve(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::Reserve, request)
    }
}

impl ModifyCapability for Gateway {
    fn modify(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::Modify, request)
    }
}

impl CancelCapability for Gateway {
    fn cancel(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::Cancel, request)
    }
}

impl ChargeCapability for Gateway {
    fn charge(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::Charge, request)
    }
}

impl CreditCapability for Gateway {
    fn credit(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::Credit, request)
    }
}

impl ReverseChargeCapability for Gateway {
    fn reverse_charge(&self, request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply(Operation::ReverseCharge, request)
    }
}

/// Engine with `gateway` registered as provider "gateway" exposing `operations`.
pub fn engine_with(gateway: &Gateway, operations: &[Operation]) -> PaymentEngine {
    let registry = ProviderRegistry::new();
    registry.register("gateway", gateway.provider("gateway", operations));
    PaymentEngine::new(Arc::new(registry))
}

pub fn usd(amount: Decimal) -> Money {
    Money::new(amount, "USD")
}

pub fn order(total: Decimal) -> OrderContext {
    OrderContext::new("20001", usd(total))
}

pub fn card() -> PaymentInstrument {
    PaymentInstrument::unlimited("card", "gateway")
}

pub fn gift_card(guid: &str, limit: Decimal) -> PaymentInstrument {
    PaymentInstrument::limited(guid, "gateway", usd(limit))
}

/// `(type, status, amount)` of each event, for compact assertions.
pub fn summary(events: &[PaymentEvent]) -> Vec<(TransactionType, PaymentStatus, Decimal)> {
    events
        .iter()
        .map(|event| (event.transaction_type, event.status, event.amount.amount))
        .collect()
}

/// Concatenates ledgers.
pub fn ledger(parts: &[&[PaymentEvent]]) -> Vec<PaymentEvent> {
    parts.iter().flat_map(|part| part.iter().cloned()).collect()
}
