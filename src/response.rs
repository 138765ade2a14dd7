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

//! Responses returned to callers.

use crate::event::PaymentEvent;
use serde::{Deserialize, Serialize};

/// Fixed pair of messages for one failure case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureMessages {
    /// Safe to show to the shopper.
    pub external: &'static str,
    /// Diagnostic text for operators.
    pub internal: &'static str,
}

impl FailureMessages {
    pub const RESERVE_FAILED: Self = Self {
        external: "The system could not reserve funds.",
        internal: "The reserve process failed as one or more payment instruments declined the \
                   reservation.",
    };

    pub const INCREASE_IMPOSSIBLE: Self = Self {
        external: "The system could not reserve funds.",
        internal: "The reserve process cannot continue because increase amount is impossible.",
    };

    pub const INCREASE_FAILED: Self = Self {
        external: "Increase amount modification failed.",
        internal: "Attempted to replace the existing reservation with a new, higher amount, but \
                   was unsuccessful.\n\
                   Therefore, the order modification cannot be completed.",
    };

    pub const CHARGE_NOT_RESERVED: Self = Self {
        external: "Charge request failed due to insufficient funds reserved in the Payment \
                   instrument.",
        internal: "The charge failed because there was not enough amount reserved on the \
                   payment instrument.",
    };

    pub const CHARGE_FAILED: Self = Self {
        external: "The system could not charge the reservation.",
        internal: "The charge process failed as the charged amount does not match the \
                   requested amount.",
    };

    pub const CREDIT_FAILED: Self = Self {
        external: "The system could not credit the payment.",
        internal: "The credit process failed as the refunded amount does not match the \
                   requested amount.",
    };

    pub const REVERSE_CHARGE_FAILED: Self = Self {
        external: "The reverse charge request failed.",
        internal: "The reverse charge process failed as there are no chargeable events or the \
                   reverse-charge capability is not supported by the payment provider.",
    };
}

/// Outcome of one public operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApiResponse {
    pub success: bool,
    /// Events produced by this call, in the order they happened.
    pub events: Vec<PaymentEvent>,
    pub internal_message: Option<String>,
    pub external_message: Option<String>,
}

impl PaymentApiResponse {
    pub fn success(events: Vec<PaymentEvent>) -> Self {
        Self {
            success: true,
            events,
            internal_message: None,
            external_message: None,
        }
    }

    /// Successful call that produced nothing.
    pub fn empty() -> Self {
        Self::success(Vec::new())
    }

    pub fn failure(events: Vec<PaymentEvent>, messages: FailureMessages) -> Self {
        Self::failure_with(events, messages.external, messages.internal)
    }

    pub fn failure_with(
        events: Vec<PaymentEvent>,
        external: impl Into<String>,
        internal: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            events,
            internal_message: Some(internal.into()),
            external_message: Some(external.into()),
        }
    }
}

/// Collects the events one processor call produces and decides the response.
#[derive(Debug, Clone, Default)]
pub struct ResponseAggregator {
    events: Vec<PaymentEvent>,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PaymentEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[PaymentEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_failed(&self) -> Option<&PaymentEvent> {
        self.events.iter().rev().find(|event| event.is_failed())
    }

    pub fn into_events(self) -> Vec<PaymentEvent> {
        self.events
    }

    /// Successful response, or a failure carrying the provider messages of the
    /// last failed event, falling back to `fallback`.
    pub fn finish(self, success: bool, fallback: FailureMessages) -> PaymentApiResponse {
        if success {
            return PaymentApiResponse::success(self.events);
        }
        match self.last_failed().and_then(|event| event.failure.clone()) {
            Some(failure) => PaymentApiResponse::failure_with(
                self.events,
                failure.external_message,
                failure.internal_message,
            ),
            None => PaymentApiResponse::failure(self.events, fallback),
        }
    }

    /// Like [`finish`](Self::finish) but always uses `messages` on failure.
    pub fn finish_with(self, success: bool, messages: FailureMessages) -> PaymentApiResponse {
        if success {
            PaymentApiResponse::success(self.events)
        } else {
            PaymentApiResponse::failure(self.events, messages)
        }
    }
}
