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

//! Reservations of new money.

use super::{Reconciliation, Step, validate_amount};
use crate::capability::{Operation, ProviderRegistry};
use crate::event::{PaymentEvent, PaymentInstrument, TransactionType};
use crate::request::ReserveRequest;
use crate::response::{FailureMessages, PaymentApiResponse};
use crate::selection::{self, Capacity};
use crate::PaymentsError;
use rust_decimal::Decimal;

pub(crate) fn process(
    registry: &ProviderRegistry,
    request: &ReserveRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    validate_amount(&request.order, &request.amount)?;
    if request.amount.is_zero() {
        return Ok(PaymentApiResponse::empty());
    }
    tracing::info!(
        order = %request.order.order_number,
        amount = %request.amount,
        instruments = request.instruments.len(),
        "reserving"
    );
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let step = reserve_across(&mut reconciliation, &request.instruments, request.amount.amount)?;
    Ok(reconciliation.into_response(step))
}

/// Splits `amount` over `instruments` and reserves every slice.
///
/// Every slice is attempted even after one fails; the step fails if any did.
pub(crate) fn reserve_across(
    reconciliation: &mut Reconciliation<'_>,
    instruments: &[PaymentInstrument],
    amount: Decimal,
) -> Result<Step, PaymentsError> {
    let history = reconciliation.history()?;
    let candidates: Vec<(PaymentInstrument, Capacity)> = instruments
        .iter()
        .map(|instrument| (instrument.clone(), history.reservable_capacity(instrument)))
        .collect();
    let allocations = selection::allocate(amount, &candidates)?;
    reconciliation.resolve(allocations.iter().map(|allocation| &allocation.instrument))?;

    let mut declined = 0;
    for allocation in &allocations {
        let event = reserve_on(reconciliation, &allocation.instrument, allocation.amount)?;
        if event.is_failed() {
            declined += 1;
        }
    }
    if declined > 0 {
        tracing::warn!(
            order = %reconciliation.order().order_number,
            declined,
            allocations = allocations.len(),
            "reservation incomplete"
        );
        return Ok(Step::Failed(FailureMessages::RESERVE_FAILED));
    }
    Ok(Step::Completed)
}

/// Opens one new reservation chain on `instrument`.
pub(crate) fn reserve_on(
    reconciliation: &mut Reconciliation<'_>,
    instrument: &PaymentInstrument,
    amount: Decimal,
) -> Result<PaymentEvent, PaymentsError> {
    reconciliation.perform(Operation::Reserve, TransactionType::Reserve, instrument, amount, None)
}
