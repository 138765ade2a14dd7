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

//! Payment events and the instruments they are booked against.
//!
//! Events form a forest rooted at `Reserve` events:
//! - `Reserve` ──► `ModifyReserve` / `CancelReserve` / `Charge`
//! - `Charge` ──► `Credit` / `ManualCredit` / `ReverseCharge`
//!
//! Events are immutable once produced; the ledger only grows.

use crate::base::{EventGuid, InstrumentGuid, OrderRef, ProviderConfigRef};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Reserve,
    ModifyReserve,
    CancelReserve,
    Charge,
    Credit,
    ManualCredit,
    ReverseCharge,
}

impl TransactionType {
    /// Whether a `Skipped` event of this type is assumed to have taken effect.
    ///
    /// Reservation-side operations and charges are assumed to happen on the
    /// provider side when the provider does not expose them. Refunds never are.
    pub fn skipped_is_effective(&self) -> bool {
        matches!(
            self,
            Self::Reserve | Self::ModifyReserve | Self::CancelReserve | Self::Charge
        )
    }

    pub fn is_reservation(&self) -> bool {
        matches!(self, Self::Reserve | Self::ModifyReserve)
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, Self::Credit | Self::ManualCredit)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reserve => "RESERVE",
            Self::ModifyReserve => "MODIFY_RESERVE",
            Self::CancelReserve => "CANCEL_RESERVE",
            Self::Charge => "CHARGE",
            Self::Credit => "CREDIT",
            Self::ManualCredit => "MANUAL_CREDIT",
            Self::ReverseCharge => "REVERSE_CHARGE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Approved,
    Failed,
    Skipped,
}

/// Spending limit of an instrument.
///
/// A limited instrument with a zero amount is legal and simply exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Unlimited,
    Limited(Money),
}

/// An order payment instrument together with its provider wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub guid: InstrumentGuid,
    pub provider: ProviderConfigRef,
    pub limit: Limit,
    /// The provider can capture one reservation several times.
    pub supports_multiple_charges: bool,
    /// The provider holds at most one reservation per instrument.
    pub single_reserve_per_instrument: bool,
    pub provider_data: HashMap<String, String>,
}

impl PaymentInstrument {
    pub fn unlimited(
        guid: impl Into<InstrumentGuid>,
        provider: impl Into<ProviderConfigRef>,
    ) -> Self {
        Self {
            guid: guid.into(),
            provider: provider.into(),
            limit: Limit::Unlimited,
            supports_multiple_charges: false,
            single_reserve_per_instrument: false,
            provider_data: HashMap::new(),
        }
    }

    pub fn limited(
        guid: impl Into<InstrumentGuid>,
        provider: impl Into<ProviderConfigRef>,
        limit: Money,
    ) -> Self {
        Self {
            limit: Limit::Limited(limit),
            ..Self::unlimited(guid, provider)
        }
    }

    pub fn with_multiple_charges(mut self) -> Self {
        self.supports_multiple_charges = true;
        self
    }

    pub fn with_single_reserve(mut self) -> Self {
        self.single_reserve_per_instrument = true;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_data.insert(key.into(), value.into());
        self
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self.limit, Limit::Unlimited)
    }
}

/// Provider diagnostics attached to a `Failed` or `Skipped` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetails {
    pub internal_message: String,
    pub external_message: String,
    /// Hint that retrying later may succeed.
    pub temporary: bool,
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub guid: EventGuid,
    /// Event this one acts upon; `None` only for root reservations.
    pub parent_guid: Option<EventGuid>,
    pub instrument: PaymentInstrument,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub reference_id: OrderRef,
    /// Opaque provider response payload.
    pub event_data: HashMap<String, String>,
    pub failure: Option<FailureDetails>,
}

impl PaymentEvent {
    /// Creates a root event with a fresh guid, stamped now.
    pub fn new(
        transaction_type: TransactionType,
        status: PaymentStatus,
        instrument: PaymentInstrument,
        amount: Money,
        reference_id: OrderRef,
    ) -> Self {
        Self {
            guid: EventGuid::generate(),
            parent_guid: None,
            instrument,
            amount,
            transaction_type,
            status,
            timestamp: Utc::now(),
            reference_id,
            event_data: HashMap::new(),
            failure: None,
        }
    }

    pub fn with_guid(mut self, guid: impl Into<EventGuid>) -> Self {
        self.guid = guid.into();
        self
    }

    pub fn with_parent(mut self, parent: &EventGuid) -> Self {
        self.parent_guid = Some(parent.clone());
        self
    }

    pub fn with_event_data(mut self, event_data: HashMap<String, String>) -> Self {
        self.event_data = event_data;
        self
    }

    pub fn with_failure(mut self, failure: FailureDetails) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Whether this event contributes to aggregate state.
    pub fn is_effective(&self) -> bool {
        match self.status {
            PaymentStatus::Approved => true,
            PaymentStatus::Skipped => self.transaction_type.skipped_is_effective(),
            PaymentStatus::Failed => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == PaymentStatus::Failed
    }
}
