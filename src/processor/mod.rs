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

//! Request processors.
//!
//! Each processor decides one request against an immutable ledger snapshot.
//! Produced events are kept in a [`Reconciliation`] which also appends them to
//! a private working copy of the ledger, so later steps of the same call see
//! the effect of earlier ones. Nothing outside the call is mutated.

pub(crate) mod cancel;
pub(crate) mod charge;
pub(crate) mod credit;
pub(crate) mod modify;
pub(crate) mod reserve;

use crate::capability::{
    CapabilityRequest, CapabilityResolver, Operation, Outcome, ProviderRegistry,
};
use crate::event::{FailureDetails, PaymentEvent, PaymentInstrument, PaymentStatus, TransactionType};
use crate::history::PaymentHistory;
use crate::money::Money;
use crate::request::OrderContext;
use crate::response::{FailureMessages, PaymentApiResponse, ResponseAggregator};
use crate::PaymentsError;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Result of a processor step that other processors may build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Completed,
    Failed(FailureMessages),
}

/// Working state of one processor call.
pub(crate) struct Reconciliation<'a> {
    resolver: CapabilityResolver<'a>,
    order: &'a OrderContext,
    ledger: Vec<PaymentEvent>,
    produced: ResponseAggregator,
}

impl<'a> Reconciliation<'a> {
    pub(crate) fn new(
        registry: &'a ProviderRegistry,
        order: &'a OrderContext,
        ledger: &[PaymentEvent],
    ) -> Self {
        Self {
            resolver: CapabilityResolver::new(registry),
            order,
            ledger: ledger.to_vec(),
            produced: ResponseAggregator::new(),
        }
    }

    pub(crate) fn order(&self) -> &OrderContext {
        self.order
    }

    pub(crate) fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.order.currency())
    }

    /// Folds the snapshot plus everything produced so far.
    pub(crate) fn history(&self) -> Result<PaymentHistory, PaymentsError> {
        PaymentHistory::build(&self.ledger, self.order.currency())
    }

    pub(crate) fn record(&mut self, event: PaymentEvent) -> PaymentEvent {
        tracing::debug!(
            order = %self.order.order_number,
            event = %event.guid,
            kind = %event.transaction_type,
            status = ?event.status,
            amount = %event.amount,
            "payment event recorded"
        );
        self.ledger.push(event.clone());
        self.produced.push(event.clone());
        event
    }

    pub(crate) fn supports(
        &self,
        operation: Operation,
        instrument: &PaymentInstrument,
    ) -> Result<bool, PaymentsError> {
        self.resolver.supports(operation, instrument)
    }

    /// Fails with `CapabilityUnsupported` unless every distinct provider in
    /// `instruments` exposes `operation`.
    pub(crate) fn require<'i>(
        &self,
        operation: Operation,
        instruments: impl IntoIterator<Item = &'i PaymentInstrument>,
    ) -> Result<(), PaymentsError> {
        let mut checked = HashSet::new();
        for instrument in instruments {
            if checked.insert(instrument.provider.clone())
                && !self.supports(operation, instrument)?
            {
                return Err(PaymentsError::CapabilityUnsupported {
                    operation,
                    provider: instrument.provider.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fails with `ProviderNotFound` before any call is made when one of
    /// `instruments` has no registered provider.
    pub(crate) fn resolve<'i>(
        &self,
        instruments: impl IntoIterator<Item = &'i PaymentInstrument>,
    ) -> Result<(), PaymentsError> {
        let mut checked = HashSet::new();
        for instrument in instruments {
            if checked.insert(instrument.provider.clone()) {
                self.resolver.ensure_registered(instrument)?;
            }
        }
        Ok(())
    }

    /// One provider call for `amount` on `instrument`, acting on `parent`'s payload.
    pub(crate) fn invoke(
        &self,
        operation: Operation,
        instrument: &PaymentInstrument,
        amount: Decimal,
        parent: Option<&PaymentEvent>,
    ) -> Result<Outcome, PaymentsError> {
        let amount = self.money(amount);
        let empty = HashMap::new();
        let request = CapabilityRequest {
            amount: &amount,
            instrument_data: &instrument.provider_data,
            event_data: parent.map_or(&empty, |event| &event.event_data),
            order: self.order,
        };
        self.resolver.invoke(operation, instrument, &request)
    }

    /// New event for this order, chained to `parent` when given.
    pub(crate) fn event(
        &self,
        transaction_type: TransactionType,
        status: PaymentStatus,
        instrument: &PaymentInstrument,
        amount: Decimal,
        parent: Option<&PaymentEvent>,
    ) -> PaymentEvent {
        let event = PaymentEvent::new(
            transaction_type,
            status,
            instrument.clone(),
            self.money(amount),
            self.order.order_number.clone(),
        );
        match parent {
            Some(parent) => event.with_parent(&parent.guid),
            None => event,
        }
    }

    /// Event mirroring `outcome`: approved events carry the provider payload,
    /// skipped events inherit their parent's, failed events carry the details.
    pub(crate) fn event_from(
        &self,
        transaction_type: TransactionType,
        outcome: &Outcome,
        instrument: &PaymentInstrument,
        amount: Decimal,
        parent: Option<&PaymentEvent>,
    ) -> PaymentEvent {
        match outcome {
            Outcome::Approved(data) => self
                .event(transaction_type, PaymentStatus::Approved, instrument, amount, parent)
                .with_event_data(data.clone()),
            Outcome::Skipped => {
                let inherited = parent.map(|event| event.event_data.clone()).unwrap_or_default();
                self.event(transaction_type, PaymentStatus::Skipped, instrument, amount, parent)
                    .with_event_data(inherited)
            }
            Outcome::Failed(failure) => self
                .event(transaction_type, PaymentStatus::Failed, instrument, amount, parent)
                .with_failure(FailureDetails::from(failure)),
        }
    }

    /// Invokes `operation` and records the matching event.
    pub(crate) fn perform(
        &mut self,
        operation: Operation,
        transaction_type: TransactionType,
        instrument: &PaymentInstrument,
        amount: Decimal,
        parent: Option<&PaymentEvent>,
    ) -> Result<PaymentEvent, PaymentsError> {
        let outcome = self.invoke(operation, instrument, amount, parent)?;
        let event = self.event_from(transaction_type, &outcome, instrument, amount, parent);
        Ok(self.record(event))
    }

    pub(crate) fn finish(self, success: bool, fallback: FailureMessages) -> PaymentApiResponse {
        self.produced.finish(success, fallback)
    }

    pub(crate) fn finish_with(
        self,
        success: bool,
        messages: FailureMessages,
    ) -> PaymentApiResponse {
        self.produced.finish_with(success, messages)
    }

    pub(crate) fn into_response(self, step: Step) -> PaymentApiResponse {
        match step {
            Step::Completed => PaymentApiResponse::success(self.produced.into_events()),
            Step::Failed(messages) => {
                PaymentApiResponse::failure(self.produced.into_events(), messages)
            }
        }
    }
}

/// Whether any selected instrument holds at most one reservation.
pub(crate) fn has_single_reserve(instruments: &[PaymentInstrument]) -> bool {
    instruments
        .iter()
        .any(|instrument| instrument.single_reserve_per_instrument)
}

/// Rejects negative request amounts and amounts in a foreign currency.
pub(crate) fn validate_amount(order: &OrderContext, amount: &Money) -> Result<(), PaymentsError> {
    amount.ensure_currency(order.currency())?;
    if amount.is_negative() {
        return Err(PaymentsError::InvalidRequest(format!(
            "amount must not be negative, got {amount}"
        )));
    }
    Ok(())
}
