// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for monitoring GPIO lines for edge events and toggling LEDs
//! in response.
//!
//! Each monitored line is driven by a [`LineMonitor`], which arms the line for
//! edge detection and waits for events as a task on a single-threaded
//! [`tokio`] event loop.
//! Falling edges are passed to the [`ActionDispatcher`], which flips the state
//! of the LED named by the line's target.
//!
//! The [`Registry`] constructs the monitors for a set of [`LineEntry`]
//! configurations, collecting the entries that fail rather than aborting.
//!
//! Hardware access is via the [`Backend`] trait, implemented for the GPIO
//! character device by [`Cdev`].
//! LED state is accessed via the [`StateService`] trait, implemented for
//! the OpenBMC LED controller D-Bus interface by [`DbusLeds`].
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ledmon::{ActionDispatcher, Cdev, DbusLeds, EdgeMode, LineEntry, LineId, Registry};
//! use std::rc::Rc;
//!
//! let leds = DbusLeds::system().await?;
//! let dispatcher = Rc::new(ActionDispatcher::new(leds));
//! let mut entry = LineEntry::new(LineId::Name("POWER_BUTTON".into()));
//! entry.edge_mode = EdgeMode::Falling;
//! entry.continue_after_event = true;
//! entry.target = Some("power_led".into());
//!
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let registry = Registry::start(&Cdev::default(), dispatcher, vec![entry]);
//!         registry.run().await;
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```
//!
//! [`ActionDispatcher`]: dispatch::ActionDispatcher
//! [`LineMonitor`]: monitor::LineMonitor
//! [`Registry`]: registry::Registry
//! [`StateService`]: dispatch::StateService

#[cfg(not(any(feature = "uapi_v1", feature = "uapi_v2")))]
compile_error!("Either feature \"uapi_v1\" or \"uapi_v2\" must be enabled for this crate.");

/// The gpiocdev implementation of the [`Backend`].
pub mod cdev;
pub use self::cdev::Cdev;

/// Toggling LEDs.
pub mod dispatch;
pub use self::dispatch::{ActionDispatcher, IndicatorState, StateService};

/// The D-Bus implementation of the [`StateService`].
#[cfg(feature = "dbus")]
pub mod dbus;
#[cfg(feature = "dbus")]
pub use self::dbus::DbusLeds;

/// Types describing monitored lines and the hardware they are found on.
pub mod line;
pub use self::line::{
    Backend, BiasMode, EdgeMode, EdgeSource, LineEntry, LineHandle, LineId, MonitorDescriptor,
    RequestConfig,
};

/// Monitoring a single line.
pub mod monitor;
pub use self::monitor::{LineMonitor, MonitorState};

/// Monitoring a set of lines.
pub mod registry;
pub use self::registry::{Failure, Registry};

/// The underlying cause of an error, as reported by a [`Backend`] or [`StateService`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`ledmon`] functions.
///
/// Line errors identify the line by its [`LineId`], and LED errors
/// identify the LED by its target name, so a failure can be traced back
/// to the configuration entry that caused it.
///
/// [`ledmon`]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The line identifier does not map to a line on the platform.
    #[error("cannot find line {0}")]
    LineResolutionFailed(LineId, #[source] BoxError),

    /// The line exists but could not be requested for edge detection.
    #[error("failed to request line {0}")]
    LineUnavailable(LineId, #[source] BoxError),

    /// An edge event could not be read from an armed line.
    #[error("failed to read event from line {0}")]
    EventReadFailed(LineId, #[source] std::io::Error),

    /// The LED service could not be reached.
    #[error("cannot reach LED '{0}'")]
    TargetUnreachable(String, #[source] BoxError),

    /// The LED reported a state that is neither on nor off.
    #[error("LED '{0}' has unexpected state '{1}'")]
    UnexpectedState(String, String),
}

/// The result for [`ledmon`] functions.
///
/// [`ledmon`]: crate
pub type Result<T> = std::result::Result<T, Error>;
