// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::dispatch::{IndicatorState, StateService};
use crate::BoxError;
use zbus::zvariant::{OwnedValue, Value};
use zbus::{Connection, Proxy};

const SERVICE_PREFIX: &str = "xyz.openbmc_project.LED.Controller.";
const PATH_PREFIX: &str = "/xyz/openbmc_project/led/physical/";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const LED_INTERFACE: &str = "xyz.openbmc_project.Led.Physical";
const STATE_PROPERTY: &str = "State";

/// LEDs provided by the OpenBMC LED controller over D-Bus.
///
/// The LED named `target` is served by `xyz.openbmc_project.LED.Controller.<target>`
/// at `/xyz/openbmc_project/led/physical/<target>`.
#[derive(Clone, Debug)]
pub struct DbusLeds {
    conn: Connection,
}

impl DbusLeds {
    pub fn new(conn: Connection) -> Self {
        DbusLeds { conn }
    }

    /// Connect to the LEDs on the system bus.
    pub async fn system() -> zbus::Result<Self> {
        Ok(DbusLeds::new(Connection::system().await?))
    }

    async fn properties(&self, target: &str) -> zbus::Result<Proxy<'static>> {
        Proxy::new(
            &self.conn,
            format!("{SERVICE_PREFIX}{target}"),
            format!("{PATH_PREFIX}{target}"),
            PROPERTIES_INTERFACE,
        )
        .await
    }
}

impl StateService for DbusLeds {
    async fn state(&self, target: &str) -> Result<String, BoxError> {
        let proxy = self.properties(target).await?;
        let value: OwnedValue = proxy.call("Get", &(LED_INTERFACE, STATE_PROPERTY)).await?;
        // anything other than a string is reported as is and rejected as a state
        Ok(match Value::from(value) {
            Value::Str(s) => s.as_str().to_owned(),
            v => format!("{v:?}"),
        })
    }

    async fn set_state(&self, target: &str, state: IndicatorState) -> Result<(), BoxError> {
        let proxy = self.properties(target).await?;
        proxy
            .call_noreply(
                "Set",
                &(LED_INTERFACE, STATE_PROPERTY, Value::from(state.as_str())),
            )
            .await?;
        Ok(())
    }
}
