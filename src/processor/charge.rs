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

//! Capture of reserved money.
//!
//! A charge request names the cumulative amount that should be charged for the
//! order. The missing part is charged off the chargeable reservations in ledger
//! order, after growing the reservation when it does not cover it. A declined
//! charge usually means the reservation expired: the chain is cancelled and, once
//! the cancel took effect, a fresh reservation on the same instrument is charged
//! right away.

use super::cancel::cancel_chain;
use super::modify::modify;
use super::reserve::reserve_on;
use super::{Reconciliation, Step, has_single_reserve, validate_amount};
use crate::capability::{Operation, Outcome, ProviderRegistry};
use crate::event::{PaymentEvent, PaymentInstrument, TransactionType};
use crate::request::ChargeRequest;
use crate::response::{FailureMessages, PaymentApiResponse};
use crate::PaymentsError;
use rust_decimal::Decimal;

pub(crate) fn process(
    registry: &ProviderRegistry,
    request: &ChargeRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    validate_amount(&request.order, &request.total_chargeable)?;
    if request.order.order_total.is_zero() {
        return Ok(PaymentApiResponse::empty());
    }

    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;
    let total_chargeable = request.total_chargeable.amount;
    let to_be_charged = total_chargeable - history.total_charged().amount;
    if to_be_charged <= Decimal::ZERO {
        return Ok(PaymentApiResponse::empty());
    }

    let chargeable_instruments: Vec<PaymentInstrument> = history
        .chargeable()
        .into_iter()
        .map(|chain| chain.instrument().clone())
        .chain(request.instruments.iter().cloned())
        .collect();
    ensure_chargeable(&reconciliation, &chargeable_instruments)?;

    tracing::info!(
        order = %request.order.order_number,
        total = %request.total_chargeable,
        %to_be_charged,
        available = %history.available_reserved(),
        final_payment = request.final_payment,
        "charging"
    );

    if to_be_charged > history.available_reserved().amount {
        // The step outcome is judged by the reserved amount below.
        modify(
            &mut reconciliation,
            &request.instruments,
            total_chargeable,
            request.final_payment,
        )?;
        if to_be_charged > reconciliation.history()?.available_reserved().amount {
            return Ok(reconciliation.finish_with(false, FailureMessages::CHARGE_NOT_RESERVED));
        }
    }

    if has_single_reserve(&request.instruments) && !request.final_payment {
        return Ok(reconciliation.into_response(Step::Completed));
    }

    let chains: Vec<(PaymentEvent, Decimal)> = reconciliation
        .history()?
        .chargeable()
        .into_iter()
        .map(|chain| (chain.head().clone(), chain.available()))
        .collect();
    let mut remaining = to_be_charged;
    for (head, available) in &chains {
        if remaining <= Decimal::ZERO {
            break;
        }
        let amount = remaining.min(*available);
        charge_chain(&mut reconciliation, head, *available, amount, request.final_payment)?;
        remaining -= amount;
    }

    let charged = reconciliation.history()?.total_charged().amount;
    Ok(reconciliation.finish(charged == total_chargeable, FailureMessages::CHARGE_FAILED))
}

/// Charge is the one capability without a fallback.
fn ensure_chargeable(
    reconciliation: &Reconciliation<'_>,
    instruments: &[PaymentInstrument],
) -> Result<(), PaymentsError> {
    reconciliation
        .require(Operation::Charge, instruments)
        .map_err(|error| match error {
            PaymentsError::CapabilityUnsupported { operation, provider } => {
                PaymentsError::Configuration(format!(
                    "{operation} capability is mandatory but not supported by payment provider \
                     {provider}"
                ))
            }
            other => other,
        })
}

/// Charges `amount` off the chain ending at `head`.
fn charge_chain(
    reconciliation: &mut Reconciliation<'_>,
    head: &PaymentEvent,
    available: Decimal,
    amount: Decimal,
    final_payment: bool,
) -> Result<(), PaymentsError> {
    let instrument = &head.instrument;
    let charge = charge_once(reconciliation, head, amount)?;
    if !charge.is_failed() {
        let remainder = available - amount;
        if remainder > Decimal::ZERO && !instrument.supports_multiple_charges && !final_payment {
            reserve_on(reconciliation, instrument, remainder)?;
        }
        return Ok(());
    }

    tracing::warn!(
        order = %reconciliation.order().order_number,
        instrument = %instrument.guid,
        %amount,
        "charge declined, retrying on a fresh reservation"
    );
    let cancelled = cancel_chain(reconciliation, head, available)?;
    if !cancelled.is_effective() {
        // The old hold still stands.
        return Ok(());
    }
    let reserve = reserve_on(reconciliation, instrument, amount)?;
    if reserve.is_effective() {
        charge_once(reconciliation, &reserve, amount)?;
    }
    Ok(())
}

fn charge_once(
    reconciliation: &mut Reconciliation<'_>,
    parent: &PaymentEvent,
    amount: Decimal,
) -> Result<PaymentEvent, PaymentsError> {
    let instrument = &parent.instrument;
    let outcome = reconciliation.invoke(Operation::Charge, instrument, amount, Some(parent))?;
    if outcome == Outcome::Skipped {
        return Err(PaymentsError::Configuration(format!(
            "charge capability is mandatory but not supported by payment provider {}",
            instrument.provider
        )));
    }
    let event = reconciliation.event_from(
        TransactionType::Charge,
        &outcome,
        instrument,
        amount,
        Some(parent),
    );
    Ok(reconciliation.record(event))
}
