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

//! Ledger query engine.
//!
//! [`PaymentHistory`] folds a ledger snapshot once into reservation chains and
//! charge balances, then answers the aggregate questions processors ask.
//!
//! ```text
//!  Reserve ──► ModifyReserve ──► ... ──► CancelReserve  (chain: available)
//!     │              │
//!     └──────────────┴──► Charge ──► Credit / ReverseCharge
//!                                          (charge: remaining)
//! ```
//!
//! Only effective events (see [`PaymentEvent::is_effective`]) move balances.
//! Failed events stay in the forest so their children still resolve.

use crate::base::{EventGuid, InstrumentGuid};
use crate::event::{Limit, PaymentEvent, PaymentInstrument, TransactionType};
use crate::money::Money;
use crate::selection::Capacity;
use crate::PaymentsError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A reservation rooted at one `Reserve` event, with everything booked against it.
#[derive(Debug, Clone)]
pub struct ReservationChain {
    root: EventGuid,
    head: PaymentEvent,
    available: Decimal,
    charged: Decimal,
    refunded: Decimal,
    reverse_charged: Decimal,
}

impl ReservationChain {
    pub fn root(&self) -> &EventGuid {
        &self.root
    }

    /// Latest effective reservation-side event; new events chain to it.
    pub fn head(&self) -> &PaymentEvent {
        &self.head
    }

    pub fn instrument(&self) -> &PaymentInstrument {
        &self.head.instrument
    }

    /// Reserved and not yet charged or cancelled.
    pub fn available(&self) -> Decimal {
        self.available
    }

    pub fn charged(&self) -> Decimal {
        self.charged
    }

    pub fn refunded(&self) -> Decimal {
        self.refunded
    }

    /// Amount of the instrument's limit this chain still occupies.
    fn used(&self) -> Decimal {
        self.available + self.charged - self.reverse_charged - self.refunded
    }
}

/// An effective charge and what has been given back against it.
#[derive(Debug, Clone)]
pub struct ChargeBalance {
    event: PaymentEvent,
    chain: usize,
    credited: Decimal,
    reversed: Decimal,
}

impl ChargeBalance {
    pub fn event(&self) -> &PaymentEvent {
        &self.event
    }

    /// Charged amount not yet credited or reversed.
    pub fn remaining(&self) -> Decimal {
        self.event.amount.amount - self.credited - self.reversed
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed > Decimal::ZERO
    }
}

/// Totals of one instrument across its chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentBalance {
    pub reserved: Decimal,
    /// Charged minus reverse-charged.
    pub charged: Decimal,
    pub refunded: Decimal,
    pub capacity: Capacity,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Chain(usize),
    Charge(usize),
    Detached,
}

/// Aggregate state of one order's ledger, in one currency.
#[derive(Debug, Clone)]
pub struct PaymentHistory {
    currency: String,
    chains: Vec<ReservationChain>,
    charges: Vec<ChargeBalance>,
    nodes: HashMap<EventGuid, Node>,
    instruments: Vec<PaymentInstrument>,
    violations: Vec<String>,
}

impl PaymentHistory {
    /// Folds `ledger` in order.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::CurrencyMismatch`] if an amount or limit is not in `currency`.
    /// - [`PaymentsError::InvalidLedger`] on duplicate guids or a parent that is not an
    ///   earlier event.
    pub fn build(ledger: &[PaymentEvent], currency: &str) -> Result<Self, PaymentsError> {
        let mut history = PaymentHistory {
            currency: currency.to_string(),
            chains: Vec::new(),
            charges: Vec::new(),
            nodes: HashMap::with_capacity(ledger.len()),
            instruments: Vec::new(),
            violations: Vec::new(),
        };
        for event in ledger {
            history.accumulate(event)?;
        }
        Ok(history)
    }

    fn accumulate(&mut self, event: &PaymentEvent) -> Result<(), PaymentsError> {
        event.amount.ensure_currency(&self.currency)?;
        if let Limit::Limited(limit) = &event.instrument.limit {
            limit.ensure_currency(&self.currency)?;
        }
        if self.nodes.contains_key(&event.guid) {
            return Err(PaymentsError::InvalidLedger(format!(
                "duplicate event guid {}",
                event.guid
            )));
        }
        let parent = match &event.parent_guid {
            None => None,
            Some(guid) => Some(*self.nodes.get(guid).ok_or_else(|| {
                PaymentsError::InvalidLedger(format!(
                    "event {} references unknown parent {}",
                    event.guid, guid
                ))
            })?),
        };
        if !self.instruments.iter().any(|known| known.guid == event.instrument.guid) {
            self.instruments.push(event.instrument.clone());
        }

        let node = match event.transaction_type {
            TransactionType::Reserve => self.open_chain(event),
            TransactionType::ModifyReserve | TransactionType::CancelReserve => {
                self.adjust_chain(event, parent)
            }
            TransactionType::Charge => self.charge_chain(event, parent),
            TransactionType::Credit
            | TransactionType::ManualCredit
            | TransactionType::ReverseCharge => self.refund_charge(event, parent),
        };
        self.nodes.insert(event.guid.clone(), node);
        Ok(())
    }

    fn open_chain(&mut self, event: &PaymentEvent) -> Node {
        if !event.is_effective() {
            return Node::Detached;
        }
        self.chains.push(ReservationChain {
            root: event.guid.clone(),
            head: event.clone(),
            available: event.amount.amount,
            charged: Decimal::ZERO,
            refunded: Decimal::ZERO,
            reverse_charged: Decimal::ZERO,
        });
        Node::Chain(self.chains.len() - 1)
    }

    fn adjust_chain(&mut self, event: &PaymentEvent, parent: Option<Node>) -> Node {
        let Some(Node::Chain(index)) = parent else {
            self.violations.push(format!(
                "{} {} does not reference a reservation",
                event.transaction_type, event.guid
            ));
            return Node::Detached;
        };
        if event.is_effective() {
            let chain = &mut self.chains[index];
            chain.available = match event.transaction_type {
                TransactionType::CancelReserve => Decimal::ZERO,
                _ => event.amount.amount,
            };
            chain.head = event.clone();
        }
        Node::Chain(index)
    }

    fn charge_chain(&mut self, event: &PaymentEvent, parent: Option<Node>) -> Node {
        let Some(Node::Chain(index)) = parent else {
            self.violations.push(format!(
                "charge {} does not reference a reservation",
                event.guid
            ));
            return Node::Detached;
        };
        if !event.is_effective() {
            return Node::Chain(index);
        }
        let amount = event.amount.amount;
        let chain = &mut self.chains[index];
        if amount > chain.available {
            self.violations.push(format!(
                "charge {} of {} exceeds the {} reserved on chain {}",
                event.guid, amount, chain.available, chain.root
            ));
        }
        chain.charged += amount;
        chain.available = if event.instrument.supports_multiple_charges {
            (chain.available - amount).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        self.charges.push(ChargeBalance {
            event: event.clone(),
            chain: index,
            credited: Decimal::ZERO,
            reversed: Decimal::ZERO,
        });
        Node::Charge(self.charges.len() - 1)
    }

    fn refund_charge(&mut self, event: &PaymentEvent, parent: Option<Node>) -> Node {
        let Some(Node::Charge(index)) = parent else {
            self.violations.push(format!(
                "{} {} does not reference a charge",
                event.transaction_type, event.guid
            ));
            return Node::Detached;
        };
        if !event.is_effective() {
            return Node::Detached;
        }
        let amount = event.amount.amount;
        let charge = &mut self.charges[index];
        if amount > charge.remaining() {
            self.violations.push(format!(
                "{} {} of {} exceeds the {} left on charge {}",
                event.transaction_type,
                event.guid,
                amount,
                charge.remaining(),
                charge.event.guid
            ));
        }
        let chain = &mut self.chains[charge.chain];
        if event.transaction_type == TransactionType::ReverseCharge {
            charge.reversed += amount;
            chain.reverse_charged += amount;
        } else {
            charge.credited += amount;
            chain.refunded += amount;
        }
        Node::Detached
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency.clone())
    }

    /// Reserved across all chains and not yet charged or cancelled.
    pub fn available_reserved(&self) -> Money {
        self.money(self.chains.iter().map(|chain| chain.available).sum())
    }

    /// Charged minus reverse-charged.
    pub fn total_charged(&self) -> Money {
        self.money(
            self.chains
                .iter()
                .map(|chain| chain.charged - chain.reverse_charged)
                .sum(),
        )
    }

    /// Credited, manually or through a provider.
    pub fn total_credited(&self) -> Money {
        self.money(self.chains.iter().map(|chain| chain.refunded).sum())
    }

    /// Order amount currently secured: reserved plus charged.
    pub fn secured_amount(&self) -> Money {
        self.money(self.available_reserved().amount + self.total_charged().amount)
    }

    /// Reserved on `instrument` and not yet charged or cancelled.
    pub fn outstanding_reserved(&self, instrument: &InstrumentGuid) -> Money {
        let outstanding: Decimal = self
            .chains
            .iter()
            .filter(|chain| &chain.instrument().guid == instrument)
            .map(|chain| chain.available)
            .sum();
        self.money(outstanding.max(Decimal::ZERO))
    }

    /// Chains with something left to charge or cancel, in ledger order.
    pub fn chargeable(&self) -> Vec<&ReservationChain> {
        self.chains
            .iter()
            .filter(|chain| chain.available > Decimal::ZERO)
            .collect()
    }

    /// Charges with a balance left to refund, oldest first.
    pub fn refundable(&self) -> Vec<&ChargeBalance> {
        self.charges
            .iter()
            .filter(|charge| charge.remaining() > Decimal::ZERO)
            .collect()
    }

    /// Chain containing `guid`, whether it is a reservation-side event or a charge.
    pub fn chain_of(&self, guid: &EventGuid) -> Option<&ReservationChain> {
        match self.nodes.get(guid)? {
            Node::Chain(index) => self.chains.get(*index),
            Node::Charge(index) => self.chains.get(self.charges[*index].chain),
            Node::Detached => None,
        }
    }

    /// Charge balance for an effective charge event.
    pub fn charge(&self, guid: &EventGuid) -> Option<&ChargeBalance> {
        match self.nodes.get(guid)? {
            Node::Charge(index) => self.charges.get(*index),
            _ => None,
        }
    }

    /// Limit occupied on `instrument` by reservations and unrefunded charges.
    pub fn used_amount(&self, instrument: &InstrumentGuid) -> Money {
        self.money(
            self.chains
                .iter()
                .filter(|chain| &chain.instrument().guid == instrument)
                .map(ReservationChain::used)
                .sum(),
        )
    }

    /// How much more `instrument` can back.
    pub fn reservable_capacity(&self, instrument: &PaymentInstrument) -> Capacity {
        match &instrument.limit {
            Limit::Unlimited => Capacity::Unlimited,
            Limit::Limited(limit) => {
                let used = self.used_amount(&instrument.guid).amount;
                Capacity::Limited((limit.amount - used).max(Decimal::ZERO))
            }
        }
    }

    /// Instruments seen in the ledger, in order of first appearance.
    pub fn instruments(&self) -> &[PaymentInstrument] {
        &self.instruments
    }

    /// Per-instrument totals.
    pub fn balance(&self, instrument: &PaymentInstrument) -> InstrumentBalance {
        let mut balance = InstrumentBalance {
            reserved: Decimal::ZERO,
            charged: Decimal::ZERO,
            refunded: Decimal::ZERO,
            capacity: self.reservable_capacity(instrument),
        };
        for chain in self.chains.iter().filter(|chain| chain.instrument().guid == instrument.guid) {
            balance.reserved += chain.available;
            balance.charged += chain.charged - chain.reverse_charged;
            balance.refunded += chain.refunded;
        }
        balance
    }

    /// Ledger inconsistencies found while folding, plus limit overruns.
    ///
    /// Empty for every ledger this crate produces.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = self.violations.clone();
        for instrument in &self.instruments {
            if let Limit::Limited(limit) = &instrument.limit {
                let used = self.used_amount(&instrument.guid).amount;
                if used > limit.amount {
                    violations.push(format!(
                        "instrument {} uses {} over its limit of {}",
                        instrument.guid, used, limit.amount
                    ));
                }
            }
        }
        violations
    }
}
