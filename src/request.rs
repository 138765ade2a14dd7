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

//! Request types, one per public operation.
//!
//! Every request carries the ledger snapshot it is decided against and the
//! [`OrderContext`]. The order total's currency is the currency of the whole
//! reconciliation.

use crate::base::{EventGuid, OrderRef};
use crate::event::{PaymentEvent, PaymentInstrument};
use crate::money::Money;
use std::collections::HashMap;

/// Order-level data passed through to providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderContext {
    pub order_number: OrderRef,
    pub order_total: Money,
    /// Free-form data forwarded to every capability call.
    pub custom_data: HashMap<String, String>,
}

impl OrderContext {
    pub fn new(order_number: impl Into<OrderRef>, order_total: Money) -> Self {
        Self {
            order_number: order_number.into(),
            order_total,
            custom_data: HashMap::new(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.order_total.currency
    }
}

/// Reserve `amount` across the selected instruments.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub instruments: Vec<PaymentInstrument>,
    pub amount: Money,
}

/// Move the secured order amount to `amount`.
#[derive(Debug, Clone)]
pub struct ModifyReservationRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub instruments: Vec<PaymentInstrument>,
    pub amount: Money,
    pub final_payment: bool,
}

/// Capture up to `total_chargeable` for the order.
///
/// `total_chargeable` is cumulative: amounts already charged count towards it.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub instruments: Vec<PaymentInstrument>,
    pub total_chargeable: Money,
    pub final_payment: bool,
}

/// Refund `amount` through the providers.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub amount: Money,
}

/// Record a refund paid outside any provider.
#[derive(Debug, Clone)]
pub struct ManualCreditRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub amount: Money,
}

/// Cancel the reservation chains containing the selected events.
#[derive(Debug, Clone)]
pub struct CancelReservationRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub selected: Vec<EventGuid>,
}

/// Cancel every outstanding reservation chain.
#[derive(Debug, Clone)]
pub struct CancelAllReservationsRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
}

/// Reverse the selected charge events.
#[derive(Debug, Clone)]
pub struct ReverseChargeRequest {
    pub order: OrderContext,
    pub ledger: Vec<PaymentEvent>,
    pub selected: Vec<EventGuid>,
}
