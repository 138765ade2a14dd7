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

//! Changes to the reserved order amount.
//!
//! The secured amount of an order is what is still reserved plus what has been
//! charged. A modification moves it to the requested amount:
//!
//! - an increase is modified onto an unlimited reservation, or reserved anew
//!   when the provider cannot modify;
//! - a decrease releases the most recent reservations first and never fails
//!   because of a provider.

use super::cancel::cancel_chain;
use super::reserve::{reserve_across, reserve_on};
use super::{Reconciliation, Step, has_single_reserve, validate_amount};
use crate::capability::{Operation, Outcome, ProviderRegistry};
use crate::event::{FailureDetails, PaymentEvent, PaymentInstrument, TransactionType};
use crate::request::ModifyReservationRequest;
use crate::response::{FailureMessages, PaymentApiResponse};
use crate::selection;
use crate::PaymentsError;
use rust_decimal::Decimal;
use std::cmp::Ordering;

pub(crate) fn process(
    registry: &ProviderRegistry,
    request: &ModifyReservationRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    validate_amount(&request.order, &request.amount)?;
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let step = modify(
        &mut reconciliation,
        &request.instruments,
        request.amount.amount,
        request.final_payment,
    )?;
    Ok(reconciliation.into_response(step))
}

/// Moves the secured order amount to `new_amount`.
///
/// # Errors
///
/// - [`PaymentsError::PaymentFailed`] when a decrease goes below what has already been charged.
/// - [`PaymentsError::InsufficientFunds`] when an increase cannot be placed on any instrument.
pub(crate) fn modify(
    reconciliation: &mut Reconciliation<'_>,
    instruments: &[PaymentInstrument],
    new_amount: Decimal,
    final_payment: bool,
) -> Result<Step, PaymentsError> {
    let history = reconciliation.history()?;
    let delta = new_amount - history.secured_amount().amount;
    let chains: Vec<(PaymentEvent, Decimal)> = history
        .chargeable()
        .into_iter()
        .map(|chain| (chain.head().clone(), chain.available()))
        .collect();
    reconciliation.resolve(chains.iter().map(|(head, _)| &head.instrument))?;

    tracing::info!(
        order = %reconciliation.order().order_number,
        %new_amount,
        %delta,
        chains = chains.len(),
        final_payment,
        "modifying reservation"
    );

    if chains.is_empty() {
        if delta <= Decimal::ZERO {
            return Ok(Step::Completed);
        }
        return reserve_across(reconciliation, instruments, delta);
    }

    match delta.cmp(&Decimal::ZERO) {
        Ordering::Greater => increase(reconciliation, instruments, &chains, delta, final_payment),
        Ordering::Less => decrease(reconciliation, instruments, &chains, -delta, final_payment),
        Ordering::Equal => Ok(Step::Completed),
    }
}

fn increase(
    reconciliation: &mut Reconciliation<'_>,
    instruments: &[PaymentInstrument],
    chains: &[(PaymentEvent, Decimal)],
    delta: Decimal,
    final_payment: bool,
) -> Result<Step, PaymentsError> {
    let modifiable =
        |instrument: &PaymentInstrument| final_payment || !instrument.single_reserve_per_instrument;

    if let Some((head, available)) = chains
        .iter()
        .find(|(head, _)| head.instrument.is_unlimited() && modifiable(&head.instrument))
    {
        let increased = *available + delta;
        let outcome =
            reconciliation.invoke(Operation::Modify, &head.instrument, increased, Some(head))?;
        match &outcome {
            Outcome::Approved(_) => {
                let event = reconciliation.event_from(
                    TransactionType::ModifyReserve,
                    &outcome,
                    &head.instrument,
                    increased,
                    Some(head),
                );
                reconciliation.record(event);
                return Ok(Step::Completed);
            }
            Outcome::Failed(failure) => {
                tracing::warn!(
                    order = %reconciliation.order().order_number,
                    instrument = %head.instrument.guid,
                    reason = %failure.internal_message,
                    "reservation increase declined"
                );
                return Ok(Step::Failed(FailureMessages::INCREASE_FAILED));
            }
            Outcome::Skipped => {}
        }
    }

    let eligible: Vec<PaymentInstrument> = instruments
        .iter()
        .filter(|instrument| modifiable(instrument))
        .cloned()
        .collect();
    if eligible.is_empty() {
        return Ok(Step::Failed(FailureMessages::INCREASE_IMPOSSIBLE));
    }
    Ok(match reserve_across(reconciliation, &eligible, delta)? {
        Step::Completed => Step::Completed,
        Step::Failed(_) => Step::Failed(FailureMessages::INCREASE_FAILED),
    })
}

fn decrease(
    reconciliation: &mut Reconciliation<'_>,
    instruments: &[PaymentInstrument],
    chains: &[(PaymentEvent, Decimal)],
    amount: Decimal,
    final_payment: bool,
) -> Result<Step, PaymentsError> {
    if has_single_reserve(instruments) && !final_payment {
        return Ok(Step::Completed);
    }
    let available: Vec<Decimal> = chains.iter().map(|(_, available)| *available).collect();
    for (index, reduced) in selection::release_lifo(amount, &available)? {
        let (head, current) = &chains[index];
        shrink_chain(reconciliation, head, *current, reduced)?;
    }
    Ok(Step::Completed)
}

/// Brings one chain from `current` down to `reduced`.
fn shrink_chain(
    reconciliation: &mut Reconciliation<'_>,
    head: &PaymentEvent,
    current: Decimal,
    reduced: Decimal,
) -> Result<(), PaymentsError> {
    if reduced.is_zero() {
        cancel_chain(reconciliation, head, current)?;
        return Ok(());
    }
    let outcome = reconciliation.invoke(Operation::Modify, &head.instrument, reduced, Some(head))?;
    match &outcome {
        Outcome::Approved(_) => {
            let event = reconciliation.event_from(
                TransactionType::ModifyReserve,
                &outcome,
                &head.instrument,
                reduced,
                Some(head),
            );
            reconciliation.record(event);
        }
        Outcome::Failed(failure) => {
            // The excess stays reserved at the provider.
            let event = skipped_modify(reconciliation, head, reduced)
                .with_failure(FailureDetails::from(failure));
            reconciliation.record(event);
        }
        Outcome::Skipped => replace_chain(reconciliation, head, current, reduced)?,
    }
    Ok(())
}

/// Emulates a decrease with cancel followed by a fresh reservation.
fn replace_chain(
    reconciliation: &mut Reconciliation<'_>,
    head: &PaymentEvent,
    current: Decimal,
    reduced: Decimal,
) -> Result<(), PaymentsError> {
    if !reconciliation.supports(Operation::Cancel, &head.instrument)? {
        let event = skipped_modify(reconciliation, head, reduced);
        reconciliation.record(event);
        return Ok(());
    }
    let cancelled = cancel_chain(reconciliation, head, current)?;
    if cancelled.is_failed() {
        let mut event = skipped_modify(reconciliation, head, reduced);
        event.failure = cancelled.failure;
        reconciliation.record(event);
        return Ok(());
    }
    reserve_on(reconciliation, &head.instrument, reduced)?;
    Ok(())
}

fn skipped_modify(
    reconciliation: &Reconciliation<'_>,
    head: &PaymentEvent,
    amount: Decimal,
) -> PaymentEvent {
    reconciliation.event_from(
        TransactionType::ModifyReserve,
        &Outcome::Skipped,
        &head.instrument,
        amount,
        Some(head),
    )
}
