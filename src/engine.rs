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

//! Payment reconciliation engine.
//!
//! The [`PaymentEngine`] is the entry point for every payment operation on an
//! order. It owns nothing but the provider registry: every call gets the
//! order's ledger snapshot in its request and returns the new events in a
//! [`PaymentApiResponse`], for the caller to append to its ledger store.
//!
//! # Operations
//!
//! | Operation | Produces |
//! |-----------|----------|
//! | reserve | `Reserve` per allocated instrument |
//! | modify reservation | `ModifyReserve`, or `CancelReserve` + `Reserve`, or new `Reserve`s |
//! | charge | `Charge`, remainder `Reserve`, compensation `CancelReserve` + `Reserve` + `Charge` |
//! | credit / manual credit | `Credit` / `ManualCredit` per refunded charge |
//! | cancel reservation(s) | `CancelReserve` per outstanding chain |
//! | reverse charge | `ReverseCharge` per selected charge |
//!
//! # Thread Safety
//!
//! The engine is `Send + Sync` and holds no per-order state. Calls for the same
//! order must still be serialized by the caller, e.g. with
//! [`InMemoryLedgerStore::reconcile`](crate::InMemoryLedgerStore::reconcile).

use crate::capability::ProviderRegistry;
use crate::processor::{cancel, charge, credit, modify, reserve};
use crate::request::{
    CancelAllReservationsRequest, CancelReservationRequest, ChargeRequest, CreditRequest,
    ManualCreditRequest, ModifyReservationRequest, ReserveRequest, ReverseChargeRequest,
};
use crate::response::PaymentApiResponse;
use crate::PaymentsError;
use std::sync::Arc;

/// Reconciles payment requests against order ledgers.
///
/// # Invariants
///
/// - Every provider call made is reflected by a returned event. A declined
///   reservation increase returns none, and a charge reversal that falls back
///   to a credit records one `ReverseCharge` for both calls.
/// - Returned events only ever append to the request ledger; no input event is changed.
#[derive(Debug, Clone)]
pub struct PaymentEngine {
    registry: Arc<ProviderRegistry>,
}

impl PaymentEngine {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        PaymentEngine { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Reserves a new amount across the selected instruments.
    ///
    /// Limited instruments are filled first; the rest goes to the first
    /// unlimited one. A zero amount is a no-op.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::InsufficientFunds`] - No unlimited instrument can take the remainder.
    /// - [`PaymentsError::CurrencyMismatch`] - Amount or ledger not in the order currency.
    pub fn reserve(&self, request: &ReserveRequest) -> Result<PaymentApiResponse, PaymentsError> {
        reserve::process(&self.registry, request)
    }

    /// Moves the reserved order amount to `request.amount`.
    ///
    /// Decreases always succeed; an increase that a provider declines fails
    /// with no events.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::PaymentFailed`] - Decrease below the amount already charged.
    /// - [`PaymentsError::InsufficientFunds`] - Increase cannot be placed on any instrument.
    pub fn modify_reservation(
        &self,
        request: &ModifyReservationRequest,
    ) -> Result<PaymentApiResponse, PaymentsError> {
        modify::process(&self.registry, request)
    }

    /// Charges the order up to `request.total_chargeable`.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::Configuration`] - A provider that would be charged lacks the charge
    ///   capability.
    pub fn charge(&self, request: &ChargeRequest) -> Result<PaymentApiResponse, PaymentsError> {
        charge::process(&self.registry, request)
    }

    /// Refunds through the providers, oldest charge first.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::InsufficientFunds`] - More than was charged and not yet refunded.
    /// - [`PaymentsError::CapabilityUnsupported`] - A provider to be credited lacks the credit
    ///   capability.
    pub fn credit(&self, request: &CreditRequest) -> Result<PaymentApiResponse, PaymentsError> {
        credit::process_credit(&self.registry, request)
    }

    /// Records a refund made outside the providers. Never calls a provider.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::InsufficientFunds`] - More than was charged and not yet refunded.
    pub fn manual_credit(
        &self,
        request: &ManualCreditRequest,
    ) -> Result<PaymentApiResponse, PaymentsError> {
        credit::process_manual_credit(&self.registry, request)
    }

    /// Cancels the outstanding chains containing the selected events.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::NoCancellableEvents`] - None of the selected chains has anything
    ///   reserved.
    pub fn cancel_reservation(
        &self,
        request: &CancelReservationRequest,
    ) -> Result<PaymentApiResponse, PaymentsError> {
        cancel::process_selected(&self.registry, request)
    }

    /// Cancels every outstanding chain; charged ones are left alone.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::NoCancellableEvents`] - Nothing is reserved.
    pub fn cancel_all_reservations(
        &self,
        request: &CancelAllReservationsRequest,
    ) -> Result<PaymentApiResponse, PaymentsError> {
        cancel::process_all(&self.registry, request)
    }

    /// Reverses the selected charges, falling back to credits.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::InvalidRequest`] - A selected event is not an approved charge with a
    ///   balance.
    pub fn reverse_charge(
        &self,
        request: &ReverseChargeRequest,
    ) -> Result<PaymentApiResponse, PaymentsError> {
        credit::process_reverse_charge(&self.registry, request)
    }
}

impl Default for PaymentEngine {
    fn default() -> Self {
        Self::new(Arc::new(ProviderRegistry::new()))
    }
}
