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

//! # Payment Ledger
//!
//! This library reconciles payment requests for an order against the order's
//! append-only ledger of payment events. Given a request (reserve, modify,
//! charge, credit, cancel or reverse a charge) and the ledger so far, it decides
//! which provider capabilities to call and returns the new events to append.
//!
//! ## Core Components
//!
//! - [`PaymentEngine`]: Entry point dispatching requests to the processors
//! - [`PaymentHistory`]: Aggregate view of a ledger (reserved, charged, refunded)
//! - [`ProviderRegistry`]: Pluggable provider capabilities per configuration
//! - [`PaymentEvent`]: Immutable ledger entry
//! - [`PaymentsError`]: Errors for requests that cannot be processed
//! - [`InMemoryLedgerStore`]: Thread-safe ledger storage with per-order serialization
//!
//! ## Example
//!
//! ```
//! use payment_ledger::{
//!     CapabilityRequest, CapabilityResponse, CapabilityResult, Money, OrderContext, PaymentEngine,
//!     PaymentInstrument, PaymentProvider, ProviderRegistry, ReserveCapability, ReserveRequest,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! struct Gateway;
//!
//! impl ReserveCapability for Gateway {
//!     fn reserve(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
//!         Ok(CapabilityResponse::default())
//!     }
//! }
//!
//! let registry = ProviderRegistry::new();
//! registry.register("gateway", PaymentProvider::new("gateway").with_reserve(Gateway));
//! let engine = PaymentEngine::new(Arc::new(registry));
//!
//! let response = engine
//!     .reserve(&ReserveRequest {
//!         order: OrderContext::new("20001", Money::new(dec!(10.00), "USD")),
//!         ledger: Vec::new(),
//!         instruments: vec![PaymentInstrument::unlimited("card", "gateway")],
//!         amount: Money::new(dec!(10.00), "USD"),
//!     })
//!     .unwrap();
//!
//! assert!(response.success);
//! assert_eq!(response.events.len(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! The engine is stateless between calls and can be shared between threads.
//! Requests for the same order must be serialized, which
//! [`InMemoryLedgerStore::reconcile`] does with a per-order lock.

mod base;
pub mod capability;
mod engine;
pub mod error;
pub mod event;
pub mod history;
mod money;
mod processor;
pub mod request;
pub mod response;
pub mod selection;
pub mod store;

pub use base::{EventGuid, InstrumentGuid, OrderRef, ProviderConfigRef};
pub use capability::{
    CancelCapability, CapabilityRequest, CapabilityRequestFailed, CapabilityResolver,
    CapabilityResponse, CapabilityResult, ChargeCapability, CreditCapability, ModifyCapability,
    Operation, Outcome, PaymentProvider, ProviderRegistry, ReserveCapability,
    ReverseChargeCapability,
};
pub use engine::PaymentEngine;
pub use error::{PaymentsError, PaymentsMessageId};
pub use event::{
    FailureDetails, Limit, PaymentEvent, PaymentInstrument, PaymentStatus, TransactionType,
};
pub use history::PaymentHistory;
pub use money::Money;
pub use request::{
    CancelAllReservationsRequest, CancelReservationRequest, ChargeRequest, CreditRequest,
    ManualCreditRequest, ModifyReservationRequest, OrderContext, ReserveRequest,
    ReverseChargeRequest,
};
pub use response::{FailureMessages, PaymentApiResponse};
pub use store::{InMemoryLedgerStore, LedgerStore};
