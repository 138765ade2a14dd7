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

//! Refunds: provider credits, manual credits and charge reversals.
//!
//! Refunds are never assumed. A credit the provider did not confirm is a
//! visible failure.

use super::{Reconciliation, validate_amount};
use crate::capability::{Operation, Outcome, ProviderRegistry};
use crate::event::{PaymentEvent, PaymentStatus, TransactionType};
use crate::history::PaymentHistory;
use crate::money::Money;
use crate::request::{CreditRequest, ManualCreditRequest, ReverseChargeRequest};
use crate::response::{FailureMessages, PaymentApiResponse};
use crate::PaymentsError;
use rust_decimal::Decimal;

pub(crate) fn process_credit(
    registry: &ProviderRegistry,
    request: &CreditRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    validate_amount(&request.order, &request.amount)?;
    if request.amount.is_zero() {
        return Ok(PaymentApiResponse::empty());
    }
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;
    let plan = plan_refund(&history, &request.amount)?;
    reconciliation.require(Operation::Credit, plan.iter().map(|(charge, _)| &charge.instrument))?;

    tracing::info!(
        order = %request.order.order_number,
        amount = %request.amount,
        charges = plan.len(),
        "crediting"
    );

    let refunded_before = history.total_credited().amount;
    for (charge, amount) in &plan {
        let outcome =
            reconciliation.invoke(Operation::Credit, &charge.instrument, *amount, Some(charge))?;
        if outcome == Outcome::Skipped {
            return Err(PaymentsError::CapabilityUnsupported {
                operation: Operation::Credit,
                provider: charge.instrument.provider.clone(),
            });
        }
        let event = reconciliation.event_from(
            TransactionType::Credit,
            &outcome,
            &charge.instrument,
            *amount,
            Some(charge),
        );
        if reconciliation.record(event).is_failed() {
            break;
        }
    }

    let refunded = reconciliation.history()?.total_credited().amount;
    let success = refunded == refunded_before + request.amount.amount;
    Ok(reconciliation.finish(success, FailureMessages::CREDIT_FAILED))
}

pub(crate) fn process_manual_credit(
    registry: &ProviderRegistry,
    request: &ManualCreditRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    validate_amount(&request.order, &request.amount)?;
    if request.amount.is_zero() {
        return Ok(PaymentApiResponse::empty());
    }
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;
    let plan = plan_refund(&history, &request.amount)?;

    tracing::info!(
        order = %request.order.order_number,
        amount = %request.amount,
        charges = plan.len(),
        "recording manual credit"
    );

    for (charge, amount) in &plan {
        let event = reconciliation.event(
            TransactionType::ManualCredit,
            PaymentStatus::Approved,
            &charge.instrument,
            *amount,
            Some(charge),
        );
        reconciliation.record(event);
    }
    let refunded = reconciliation.history()?.total_credited().amount;
    let success = refunded == history.total_credited().amount + request.amount.amount;
    Ok(reconciliation.finish(success, FailureMessages::CREDIT_FAILED))
}

/// Spreads `amount` over the refundable charges, oldest first.
///
/// # Errors
///
/// [`PaymentsError::InsufficientFunds`] when `amount` exceeds what was charged and not yet
/// refunded.
fn plan_refund(
    history: &PaymentHistory,
    amount: &Money,
) -> Result<Vec<(PaymentEvent, Decimal)>, PaymentsError> {
    let refundable = history.total_charged().amount - history.total_credited().amount;
    if amount.amount > refundable {
        tracing::warn!(requested = %amount, %refundable, "refund exceeds charged amount");
        return Err(PaymentsError::InsufficientFunds(
            "Trying to refund more than had been charged".to_string(),
        ));
    }
    let mut remaining = amount.amount;
    let mut plan = Vec::new();
    for charge in history.refundable() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let slice = remaining.min(charge.remaining());
        plan.push((charge.event().clone(), slice));
        remaining -= slice;
    }
    Ok(plan)
}

pub(crate) fn process_reverse_charge(
    registry: &ProviderRegistry,
    request: &ReverseChargeRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;

    let mut targets = Vec::with_capacity(request.selected.len());
    for guid in &request.selected {
        let charge = history
            .charge(guid)
            .filter(|charge| charge.event().status == PaymentStatus::Approved)
            .ok_or_else(|| {
                PaymentsError::InvalidRequest(format!("{guid} is not an approved charge event"))
            })?;
        if charge.remaining() <= Decimal::ZERO {
            return Err(PaymentsError::InvalidRequest(format!(
                "charge {guid} has nothing left to reverse"
            )));
        }
        targets.push((charge.event().clone(), charge.remaining()));
    }
    reconciliation.resolve(targets.iter().map(|(charge, _)| &charge.instrument))?;

    tracing::info!(
        order = %request.order.order_number,
        charges = targets.len(),
        "reversing charges"
    );

    let mut reversed = 0;
    for (charge, amount) in &targets {
        if reverse_one(&mut reconciliation, charge, *amount)? {
            reversed += 1;
        }
    }
    let success = !targets.is_empty() && reversed == targets.len();
    Ok(reconciliation.finish(success, FailureMessages::REVERSE_CHARGE_FAILED))
}

/// Reverses one charge, falling back to a credit. Returns whether either was approved.
///
/// Whichever capability serviced it, the recorded event is a `ReverseCharge`.
fn reverse_one(
    reconciliation: &mut Reconciliation<'_>,
    charge: &PaymentEvent,
    amount: Decimal,
) -> Result<bool, PaymentsError> {
    let instrument = &charge.instrument;
    let reversal =
        reconciliation.invoke(Operation::ReverseCharge, instrument, amount, Some(charge))?;
    let outcome = match reversal {
        Outcome::Approved(_) => reversal,
        Outcome::Failed(_) | Outcome::Skipped => {
            match reconciliation.invoke(Operation::Credit, instrument, amount, Some(charge))? {
                // Report why the reversal itself did not go through.
                Outcome::Skipped => reversal,
                credit => credit,
            }
        }
    };
    if outcome == Outcome::Skipped {
        tracing::warn!(
            order = %reconciliation.order().order_number,
            charge = %charge.guid,
            "neither reverse charge nor credit is supported"
        );
        return Ok(false);
    }
    let event = reconciliation.event_from(
        TransactionType::ReverseCharge,
        &outcome,
        instrument,
        amount,
        Some(charge),
    );
    Ok(!reconciliation.record(event).is_failed())
}
