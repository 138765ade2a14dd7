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

//! Exact monetary amounts.
//!
//! All arithmetic happens on [`Decimal`], never on floating point. Combining two
//! amounts with different currency codes is an error: a single reconciliation
//! works in exactly one currency.

use crate::PaymentsError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An exact amount tagged with its ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    /// Number of decimal places used when rendering amounts.
    pub const DECIMAL_PRECISION: u32 = 4;

    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Returns the same currency with a different amount.
    pub fn with_amount(&self, amount: Decimal) -> Self {
        Self::new(amount, self.currency.clone())
    }

    /// Fails with [`PaymentsError::CurrencyMismatch`] unless `currency` matches.
    pub fn ensure_currency(&self, currency: &str) -> Result<(), PaymentsError> {
        if self.currency != currency {
            return Err(PaymentsError::CurrencyMismatch {
                expected: currency.to_string(),
                found: self.currency.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, PaymentsError> {
        other.ensure_currency(&self.currency)?;
        Ok(self.with_amount(self.amount + other.amount))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, PaymentsError> {
        other.ensure_currency(&self.currency)?;
        Ok(self.with_amount(self.amount - other.amount))
    }

    /// Amount rounded to [`Money::DECIMAL_PRECISION`] places (banker's rounding).
    pub fn rounded(&self) -> Decimal {
        self.amount.round_dp(Self::DECIMAL_PRECISION)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
