// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{BoxError, Error, Result};
use log::info;
use std::fmt;

/// The two states of an LED.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndicatorState {
    /// The LED is on.
    Active,

    /// The LED is off.
    Inactive,
}

impl IndicatorState {
    /// The value of the LED `State` property corresponding to the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorState::Active => "xyz.openbmc_project.Led.Physical.Action.On",
            IndicatorState::Inactive => "xyz.openbmc_project.Led.Physical.Action.Off",
        }
    }

    /// Determine the state from a value of the LED `State` property.
    ///
    /// Returns None for any value other than on or off.
    pub fn from_property(value: &str) -> Option<IndicatorState> {
        match value {
            "xyz.openbmc_project.Led.Physical.Action.On" => Some(IndicatorState::Active),
            "xyz.openbmc_project.Led.Physical.Action.Off" => Some(IndicatorState::Inactive),
            _ => None,
        }
    }

    /// The opposite state.
    pub fn not(&self) -> IndicatorState {
        match self {
            IndicatorState::Active => IndicatorState::Inactive,
            IndicatorState::Inactive => IndicatorState::Active,
        }
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorState::Active => write!(f, "on"),
            IndicatorState::Inactive => write!(f, "off"),
        }
    }
}

/// A service that can report and change the state of named LEDs.
#[allow(async_fn_in_trait)]
pub trait StateService {
    /// Query the raw value of the LED `State` property.
    async fn state(&self, target: &str) -> std::result::Result<String, BoxError>;

    /// Request the LED be changed to the given state.
    ///
    /// The request is not confirmed, so success only indicates the request was sent.
    async fn set_state(
        &self,
        target: &str,
        state: IndicatorState,
    ) -> std::result::Result<(), BoxError>;
}

/// Toggles LEDs provided by a [`StateService`].
///
/// Each toggle is an independent query then command, so concurrent toggles of
/// the same LED may race.
#[derive(Debug)]
pub struct ActionDispatcher<S> {
    service: S,
}

impl<S: StateService> ActionDispatcher<S> {
    /// Create a dispatcher toggling the LEDs provided by the service.
    pub fn new(service: S) -> Self {
        ActionDispatcher { service }
    }

    /// The service providing the LEDs.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Flip the state of the target LED.
    ///
    /// Returns the state requested for the LED, or None if the target is
    /// empty and so nothing was done.
    pub async fn toggle(&self, target: &str) -> Result<Option<IndicatorState>> {
        if target.is_empty() {
            return Ok(None);
        }
        let value = self
            .service
            .state(target)
            .await
            .map_err(|e| Error::TargetUnreachable(target.into(), e))?;
        let state = IndicatorState::from_property(&value)
            .ok_or_else(|| Error::UnexpectedState(target.into(), value))?;
        let new_state = state.not();
        self.service
            .set_state(target, new_state)
            .await
            .map_err(|e| Error::TargetUnreachable(target.into(), e))?;
        info!("LED '{}' toggled {}", target, new_state);
        Ok(Some(new_state))
    }
}

#[cfg(test)]
mod tests {
    use super::IndicatorState;

    #[test]
    fn property_values() {
        for state in [IndicatorState::Active, IndicatorState::Inactive] {
            assert_eq!(IndicatorState::from_property(state.as_str()), Some(state));
        }
        assert_eq!(
            IndicatorState::from_property("xyz.openbmc_project.Led.Physical.Action.Blink"),
            None
        );
        assert_eq!(IndicatorState::from_property(""), None);
    }

    #[test]
    fn not() {
        assert_eq!(IndicatorState::Active.not(), IndicatorState::Inactive);
        assert_eq!(IndicatorState::Inactive.not(), IndicatorState::Active);
    }
}
