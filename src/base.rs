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

//! Core identifier types for events, instruments, providers and orders.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a payment event.
///
/// Freshly produced events get a random v4 UUID; events loaded from a store
/// keep whatever identifier they were persisted with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EventGuid(pub String);

impl EventGuid {
    /// Generates a new random identifier.
    pub fn generate() -> Self {
        EventGuid(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventGuid {
    fn from(value: &str) -> Self {
        EventGuid(value.to_string())
    }
}

impl From<String> for EventGuid {
    fn from(value: String) -> Self {
        EventGuid(value)
    }
}

impl fmt::Display for EventGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an order payment instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct InstrumentGuid(pub String);

impl From<&str> for InstrumentGuid {
    fn from(value: &str) -> Self {
        InstrumentGuid(value.to_string())
    }
}

impl fmt::Display for InstrumentGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the provider configuration backing an instrument.
///
/// This is the key under which a [`PaymentProvider`](crate::PaymentProvider)
/// is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProviderConfigRef(pub String);

impl From<&str> for ProviderConfigRef {
    fn from(value: &str) -> Self {
        ProviderConfigRef(value.to_string())
    }
}

impl fmt::Display for ProviderConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier, recorded as `reference_id` on every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct OrderRef(pub String);

impl From<&str> for OrderRef {
    fn from(value: &str) -> Self {
        OrderRef(value.to_string())
    }
}

impl From<String> for OrderRef {
    fn from(value: String) -> Self {
        OrderRef(value)
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
