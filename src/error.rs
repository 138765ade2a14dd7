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

//! Error types for payment reconciliation.
//!
//! Provider-side declines are not errors: they surface as `Failed` events
//! (see [`Outcome`](crate::Outcome)). A [`PaymentsError`] means the request
//! itself could not be processed, usually before any provider was called.

use crate::base::{EventGuid, ProviderConfigRef};
use crate::capability::Operation;
use std::fmt;
use thiserror::Error;

/// Reconciliation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentsError {
    /// The request is arithmetically impossible against the ledger
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A cancel request selected nothing that can still be cancelled
    #[error("no cancellable payment events")]
    NoCancellableEvents,

    /// A capability the operation cannot do without is not exposed by the provider
    #[error("{operation} capability is not supported by payment provider {provider}")]
    CapabilityUnsupported {
        operation: Operation,
        provider: ProviderConfigRef,
    },

    /// Mandatory provider wiring is missing
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No provider is registered for an instrument's configuration
    #[error("payment provider not found: {0}")]
    ProviderNotFound(ProviderConfigRef),

    /// Amounts in one reconciliation must share a currency
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// The ledger snapshot is not a well-formed event forest
    #[error("invalid ledger: {0}")]
    InvalidLedger(String),

    /// The request references events or amounts that make no sense
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request cannot be fulfilled for a non-provider reason
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// An event with this guid is already stored
    #[error("duplicate payment event: {0}")]
    DuplicateEvent(EventGuid),
}

/// Stable message identifiers, one per error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentsMessageId {
    PaymentInsufficientFunds,
    PaymentFailed,
    PaymentCapabilityUnsupported,
    PaymentNoCancellableEvents,
    PaymentConfigurationError,
    PaymentInvalidRequest,
}

impl PaymentsMessageId {
    pub fn key(&self) -> &'static str {
        match self {
            Self::PaymentInsufficientFunds => "payment.insufficient.funds",
            Self::PaymentFailed => "payment.failed",
            Self::PaymentCapabilityUnsupported => "payment.capability.unsupported",
            Self::PaymentNoCancellableEvents => "payment.no.cancellable.events",
            Self::PaymentConfigurationError => "payment.configuration.error",
            Self::PaymentInvalidRequest => "payment.invalid.request",
        }
    }
}

impl fmt::Display for PaymentsMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl PaymentsError {
    pub fn message_id(&self) -> PaymentsMessageId {
        match self {
            Self::InsufficientFunds(_) => PaymentsMessageId::PaymentInsufficientFunds,
            Self::NoCancellableEvents => PaymentsMessageId::PaymentNoCancellableEvents,
            Self::CapabilityUnsupported { .. } => PaymentsMessageId::PaymentCapabilityUnsupported,
            Self::Configuration(_) | Self::ProviderNotFound(_) => {
                PaymentsMessageId::PaymentConfigurationError
            }
            Self::CurrencyMismatch { .. }
            | Self::InvalidLedger(_)
            | Self::InvalidRequest(_)
            | Self::DuplicateEvent(_) => PaymentsMessageId::PaymentInvalidRequest,
            Self::PaymentFailed(_) => PaymentsMessageId::PaymentFailed,
        }
    }
}
