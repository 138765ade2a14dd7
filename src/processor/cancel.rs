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

//! Cancellation of outstanding reservations.
//!
//! Cancelling is best effort: a declined cancel is recorded and the batch still
//! succeeds, so order completion is never blocked on a provider.

use super::{Reconciliation, Step};
use crate::base::EventGuid;
use crate::capability::{Operation, ProviderRegistry};
use crate::event::{PaymentEvent, TransactionType};
use crate::history::PaymentHistory;
use crate::request::{CancelAllReservationsRequest, CancelReservationRequest};
use crate::response::PaymentApiResponse;
use crate::PaymentsError;
use rust_decimal::Decimal;
use std::collections::HashSet;

pub(crate) fn process_selected(
    registry: &ProviderRegistry,
    request: &CancelReservationRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;
    let roots: HashSet<&EventGuid> = request
        .selected
        .iter()
        .filter_map(|guid| history.chain_of(guid))
        .map(|chain| chain.root())
        .collect();
    let targets = outstanding(&history, |root| roots.contains(root));
    cancel_all(&mut reconciliation, targets)?;
    Ok(reconciliation.into_response(Step::Completed))
}

pub(crate) fn process_all(
    registry: &ProviderRegistry,
    request: &CancelAllReservationsRequest,
) -> Result<PaymentApiResponse, PaymentsError> {
    let mut reconciliation = Reconciliation::new(registry, &request.order, &request.ledger);
    let history = reconciliation.history()?;
    let targets = outstanding(&history, |_| true);
    cancel_all(&mut reconciliation, targets)?;
    Ok(reconciliation.into_response(Step::Completed))
}

/// Heads and available amounts of the chargeable chains whose root passes `keep`.
fn outstanding(
    history: &PaymentHistory,
    keep: impl Fn(&EventGuid) -> bool,
) -> Vec<(PaymentEvent, Decimal)> {
    history
        .chargeable()
        .into_iter()
        .filter(|chain| keep(chain.root()))
        .map(|chain| (chain.head().clone(), chain.available()))
        .collect()
}

fn cancel_all(
    reconciliation: &mut Reconciliation<'_>,
    targets: Vec<(PaymentEvent, Decimal)>,
) -> Result<(), PaymentsError> {
    if targets.is_empty() {
        return Err(PaymentsError::NoCancellableEvents);
    }
    reconciliation.resolve(targets.iter().map(|(head, _)| &head.instrument))?;
    tracing::info!(
        order = %reconciliation.order().order_number,
        chains = targets.len(),
        "cancelling reservations"
    );
    for (head, available) in &targets {
        cancel_chain(reconciliation, head, *available)?;
    }
    Ok(())
}

/// Releases everything still reserved on the chain ending at `head`.
pub(crate) fn cancel_chain(
    reconciliation: &mut Reconciliation<'_>,
    head: &PaymentEvent,
    available: Decimal,
) -> Result<PaymentEvent, PaymentsError> {
    reconciliation.perform(
        Operation::Cancel,
        TransactionType::CancelReserve,
        &head.instrument,
        available,
        Some(head),
    )
}
