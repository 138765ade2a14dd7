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

//! Provider capabilities and their resolution.
//!
//! A payment provider exposes any subset of six capabilities. Absence is not
//! an error: the [`CapabilityResolver`] reports it as [`Outcome::Skipped`]
//! without calling anything, and each processor decides what a skip means for
//! its operation.
//!
//! Providers are registered per [`ProviderConfigRef`] in a [`ProviderRegistry`],
//! which can be shared between threads and extended at runtime.

use crate::base::ProviderConfigRef;
use crate::event::{FailureDetails, PaymentInstrument};
use crate::money::Money;
use crate::request::OrderContext;
use crate::PaymentsError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Operations a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Reserve,
    Modify,
    Cancel,
    Charge,
    Credit,
    ReverseCharge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reserve => "reserve",
            Self::Modify => "modify",
            Self::Cancel => "cancel",
            Self::Charge => "charge",
            Self::Credit => "credit",
            Self::ReverseCharge => "reverse charge",
        };
        f.write_str(name)
    }
}

/// Everything a provider gets to see for one call.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRequest<'a> {
    pub amount: &'a Money,
    pub instrument_data: &'a HashMap<String, String>,
    /// Payload of the reservation or charge being acted upon (empty for new reservations).
    pub event_data: &'a HashMap<String, String>,
    pub order: &'a OrderContext,
}

/// Successful provider reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityResponse {
    pub data: HashMap<String, String>,
}

/// Provider-reported failure of a capability call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{internal_message}")]
pub struct CapabilityRequestFailed {
    pub internal_message: String,
    pub external_message: String,
    pub temporary: bool,
}

impl CapabilityRequestFailed {
    pub fn new(internal_message: impl Into<String>, external_message: impl Into<String>) -> Self {
        Self {
            internal_message: internal_message.into(),
            external_message: external_message.into(),
            temporary: false,
        }
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }
}

impl From<&CapabilityRequestFailed> for FailureDetails {
    fn from(failure: &CapabilityRequestFailed) -> Self {
        FailureDetails {
            internal_message: failure.internal_message.clone(),
            external_message: failure.external_message.clone(),
            temporary: failure.temporary,
        }
    }
}

pub type CapabilityResult = Result<CapabilityResponse, CapabilityRequestFailed>;

pub trait ReserveCapability: Send + Sync {
    fn reserve(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

pub trait ModifyCapability: Send + Sync {
    fn modify(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

pub trait CancelCapability: Send + Sync {
    fn cancel(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

pub trait ChargeCapability: Send + Sync {
    fn charge(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

pub trait CreditCapability: Send + Sync {
    fn credit(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

pub trait ReverseChargeCapability: Send + Sync {
    fn reverse_charge(&self, request: &CapabilityRequest<'_>) -> CapabilityResult;
}

/// The capability set of one provider configuration.
#[derive(Default)]
pub struct PaymentProvider {
    name: String,
    reserve: Option<Arc<dyn ReserveCapability>>,
    modify: Option<Arc<dyn ModifyCapability>>,
    cancel: Option<Arc<dyn CancelCapability>>,
    charge: Option<Arc<dyn ChargeCapability>>,
    credit: Option<Arc<dyn CreditCapability>>,
    reverse_charge: Option<Arc<dyn ReverseChargeCapability>>,
}

impl PaymentProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_reserve(mut self, capability: impl ReserveCapability + 'static) -> Self {
        self.reserve = Some(Arc::new(capability));
        self
    }

    pub fn with_modify(mut self, capability: impl ModifyCapability + 'static) -> Self {
        self.modify = Some(Arc::new(capability));
        self
    }

    pub fn with_cancel(mut self, capability: impl CancelCapability + 'static) -> Self {
        self.cancel = Some(Arc::new(capability));
        self
    }

    pub fn with_charge(mut self, capability: impl ChargeCapability + 'static) -> Self {
        self.charge = Some(Arc::new(capability));
        self
    }

    pub fn with_credit(mut self, capability: impl CreditCapability + 'static) -> Self {
        self.credit = Some(Arc::new(capability));
        self
    }

    pub fn with_reverse_charge(
        mut self,
        capability: impl ReverseChargeCapability + 'static,
    ) -> Self {
        self.reverse_charge = Some(Arc::new(capability));
        self
    }

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Reserve => self.reserve.is_some(),
            Operation::Modify => self.modify.is_some(),
            Operation::Cancel => self.cancel.is_some(),
            Operation::Charge => self.charge.is_some(),
            Operation::Credit => self.credit.is_some(),
            Operation::ReverseCharge => self.reverse_charge.is_some(),
        }
    }

    /// Calls the capability, or returns `None` when the provider lacks it.
    fn execute(
        &self,
        operation: Operation,
        request: &CapabilityRequest<'_>,
    ) -> Option<CapabilityResult> {
        match operation {
            Operation::Reserve => self.reserve.as_ref().map(|c| c.reserve(request)),
            Operation::Modify => self.modify.as_ref().map(|c| c.modify(request)),
            Operation::Cancel => self.cancel.as_ref().map(|c| c.cancel(request)),
            Operation::Charge => self.charge.as_ref().map(|c| c.charge(request)),
            Operation::Credit => self.credit.as_ref().map(|c| c.credit(request)),
            Operation::ReverseCharge => self
                .reverse_charge
                .as_ref()
                .map(|c| c.reverse_charge(request)),
        }
    }
}

impl fmt::Debug for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supported: Vec<String> = [
            Operation::Reserve,
            Operation::Modify,
            Operation::Cancel,
            Operation::Charge,
            Operation::Credit,
            Operation::ReverseCharge,
        ]
        .into_iter()
        .filter(|operation| self.supports(*operation))
        .map(|operation| operation.to_string())
        .collect();
        f.debug_struct("PaymentProvider")
            .field("name", &self.name)
            .field("capabilities", &supported)
            .finish()
    }
}

/// Providers indexed by configuration reference.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<ProviderConfigRef, Arc<PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider, replacing any previous one for the same reference.
    pub fn register(&self, config: impl Into<ProviderConfigRef>, provider: PaymentProvider) {
        self.providers.insert(config.into(), Arc::new(provider));
    }

    pub fn get(&self, config: &ProviderConfigRef) -> Result<Arc<PaymentProvider>, PaymentsError> {
        self.providers
            .get(config)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PaymentsError::ProviderNotFound(config.clone()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Classified result of one capability invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The provider accepted; carries its response payload.
    Approved(HashMap<String, String>),
    /// The provider was called and declined.
    Failed(CapabilityRequestFailed),
    /// The provider does not expose the capability and was not called.
    Skipped,
}

impl Outcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Outcome::Approved(_))
    }
}

/// Resolves operations against the provider registered for an instrument.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityResolver<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Whether the instrument's provider exposes `operation`. Never calls the provider.
    pub fn supports(
        &self,
        operation: Operation,
        instrument: &PaymentInstrument,
    ) -> Result<bool, PaymentsError> {
        Ok(self.registry.get(&instrument.provider)?.supports(operation))
    }

    /// Fails unless a provider is registered for `instrument`. Never calls the provider.
    pub fn ensure_registered(&self, instrument: &PaymentInstrument) -> Result<(), PaymentsError> {
        self.registry.get(&instrument.provider).map(|_| ())
    }

    /// Performs exactly one provider call, or none when the capability is absent.
    ///
    /// # Errors
    ///
    /// [`PaymentsError::ProviderNotFound`] if no provider is registered for the instrument.
    pub fn invoke(
        &self,
        operation: Operation,
        instrument: &PaymentInstrument,
        request: &CapabilityRequest<'_>,
    ) -> Result<Outcome, PaymentsError> {
        let provider = self.registry.get(&instrument.provider)?;
        let outcome = match provider.execute(operation, request) {
            None => {
                tracing::debug!(
                    %operation,
                    provider = provider.name(),
                    instrument = %instrument.guid,
                    "capability not supported, skipping"
                );
                Outcome::Skipped
            }
            Some(Ok(response)) => {
                tracing::debug!(
                    %operation,
                    provider = provider.name(),
                    instrument = %instrument.guid,
                    amount = %request.amount,
                    "capability approved"
                );
                Outcome::Approved(response.data)
            }
            Some(Err(failure)) => {
                tracing::warn!(
                    %operation,
                    provider = provider.name(),
                    instrument = %instrument.guid,
                    amount = %request.amount,
                    temporary = failure.temporary,
                    reason = %failure.internal_message,
                    "capability failed"
                );
                Outcome::Failed(failure)
            }
        };
        Ok(outcome)
    }
}
