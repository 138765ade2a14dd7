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

//! Instrument selection.
//!
//! New money is spread over limited instruments first, in the order the
//! customer selected them, and whatever is left goes to the first unlimited
//! instrument. Released money comes off the most recent reservations first so
//! filled gift cards and vouchers keep their holds the longest.

use crate::event::PaymentInstrument;
use crate::PaymentsError;
use rust_decimal::Decimal;

/// How much more an instrument can back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unlimited,
    Limited(Decimal),
}

/// One slice of a target amount assigned to an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub instrument: PaymentInstrument,
    pub amount: Decimal,
}

/// Splits `target` over `candidates`.
///
/// The allocations sum exactly to `target`. Limited instruments with no
/// capacity left are passed over.
///
/// # Errors
///
/// [`PaymentsError::InsufficientFunds`] when the limited instruments cannot
/// cover `target` and no unlimited instrument is among the candidates.
pub fn allocate(
    target: Decimal,
    candidates: &[(PaymentInstrument, Capacity)],
) -> Result<Vec<Allocation>, PaymentsError> {
    let mut allocations = Vec::new();
    let mut remaining = target;
    if remaining <= Decimal::ZERO {
        return Ok(allocations);
    }

    for (instrument, capacity) in candidates {
        let Capacity::Limited(capacity) = capacity else {
            continue;
        };
        if remaining.is_zero() {
            break;
        }
        let amount = remaining.min(*capacity);
        if amount > Decimal::ZERO {
            allocations.push(Allocation {
                instrument: instrument.clone(),
                amount,
            });
            remaining -= amount;
        }
    }

    if remaining > Decimal::ZERO {
        let unlimited = candidates
            .iter()
            .find(|(_, capacity)| *capacity == Capacity::Unlimited)
            .ok_or_else(|| {
                PaymentsError::InsufficientFunds(format!(
                    "selected payment instruments cannot cover {remaining}"
                ))
            })?;
        allocations.push(Allocation {
            instrument: unlimited.0.clone(),
            amount: remaining,
        });
    }
    Ok(allocations)
}

/// Takes `delta` off `available` amounts, last entry first.
///
/// Returns `(index, new_amount)` pairs for the entries that change, most
/// recent first.
///
/// # Errors
///
/// [`PaymentsError::PaymentFailed`] when `delta` exceeds the total available.
pub fn release_lifo(
    delta: Decimal,
    available: &[Decimal],
) -> Result<Vec<(usize, Decimal)>, PaymentsError> {
    let mut remaining = delta;
    let mut releases = Vec::new();
    for (index, amount) in available.iter().enumerate().rev() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let taken = remaining.min(*amount);
        if taken > Decimal::ZERO {
            releases.push((index, *amount - taken));
            remaining -= taken;
        }
    }
    if remaining > Decimal::ZERO {
        return Err(PaymentsError::PaymentFailed(
            "Not enough reservation events found".to_string(),
        ));
    }
    Ok(releases)
}
