// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{BoxError, Error, Result};
use gpiocdev::line::{Bias, EdgeDetection, EdgeEvent, Offset};
#[cfg(feature = "serde")]
use serde_derive::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// The consumer label applied to requested lines unless otherwise specified.
pub const DEFAULT_CONSUMER: &str = "gpio_monitor";

/// Identifies a line, either by name or by its offset on a chip.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum LineId {
    /// The name of the line, searched for on all chips.
    Name(String),

    /// The offset of the line on a particular chip.
    ///
    /// The chip may be identified by number, name, or path.
    /// e.g. `0`, `gpiochip0` and `/dev/gpiochip0` all select the same chip.
    Offset {
        /// The chip identifier.
        chip: String,

        /// The offset of the line on the chip.
        offset: Offset,
    },
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Name(name) => write!(f, "'{name}'"),
            LineId::Offset { chip, offset } => write!(f, "{offset} on chip '{chip}'"),
        }
    }
}

/// A line that has been located on the platform.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LineHandle {
    /// The path to the chip containing the line.
    pub chip: PathBuf,

    /// The offset of the line on the chip.
    pub offset: Offset,
}

/// The edges that generate events for a monitored line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum EdgeMode {
    /// Only rising edges generate events.
    Rising,

    /// Only falling edges generate events.
    Falling,

    /// Both rising and falling edges generate events.
    #[default]
    Both,
}

impl From<EdgeMode> for EdgeDetection {
    fn from(m: EdgeMode) -> Self {
        match m {
            EdgeMode::Rising => EdgeDetection::RisingEdge,
            EdgeMode::Falling => EdgeDetection::FallingEdge,
            EdgeMode::Both => EdgeDetection::BothEdges,
        }
    }
}

/// The bias applied to a monitored line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum BiasMode {
    /// The line is pulled up.
    PullUp,

    /// The line is pulled down.
    PullDown,

    /// The line is left floating.
    Disabled,
}

impl From<BiasMode> for Bias {
    fn from(b: BiasMode) -> Self {
        match b {
            BiasMode::PullUp => Bias::PullUp,
            BiasMode::PullDown => Bias::PullDown,
            BiasMode::Disabled => Bias::Disabled,
        }
    }
}

/// The configuration applied when requesting a line for monitoring.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestConfig {
    /// The consumer label identifying this process to the kernel.
    pub consumer: String,

    /// The edges to be detected.
    pub edge_mode: EdgeMode,

    /// Treat the line as active-low, swapping the sense of rising and falling.
    pub active_low: bool,

    /// The bias to apply, if any.
    ///
    /// If not set then the bias is left unchanged.
    pub bias: Option<BiasMode>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        RequestConfig {
            consumer: DEFAULT_CONSUMER.into(),
            edge_mode: EdgeMode::default(),
            active_low: false,
            bias: None,
        }
    }
}

/// The configuration for one monitored line, prior to locating the line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineEntry {
    /// The line to monitor.
    pub line: LineId,

    /// The consumer label applied to the requested line.
    pub consumer: String,

    /// The edges to be detected.
    pub edge_mode: EdgeMode,

    /// Treat the line as active-low.
    pub active_low: bool,

    /// The bias to apply, if any.
    pub bias: Option<BiasMode>,

    /// Keep monitoring after the first event.
    pub continue_after_event: bool,

    /// The LED to toggle on a falling edge.
    ///
    /// If not set then edges are logged but no action is taken.
    pub target: Option<String>,
}

impl LineEntry {
    /// Create an entry for a line with the default settings.
    ///
    /// The defaults detect both edges, stop after the first event, and take no action.
    pub fn new(line: LineId) -> LineEntry {
        LineEntry {
            line,
            consumer: DEFAULT_CONSUMER.into(),
            edge_mode: EdgeMode::default(),
            active_low: false,
            bias: None,
            continue_after_event: false,
            target: None,
        }
    }

    /// The configuration for requesting the line.
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            consumer: self.consumer.clone(),
            edge_mode: self.edge_mode,
            active_low: self.active_low,
            bias: self.bias,
        }
    }
}

/// The validated configuration driving a single [`LineMonitor`].
///
/// [`LineMonitor`]: crate::monitor::LineMonitor
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitorDescriptor {
    /// Identifies the line in diagnostics.
    pub id: LineId,

    /// The located line.
    pub handle: LineHandle,

    /// The configuration applied when arming the line.
    pub config: RequestConfig,

    /// Keep monitoring after the first event.
    pub continue_after_event: bool,

    /// The LED to toggle on a falling edge.
    pub target: Option<String>,
}

impl MonitorDescriptor {
    /// Locate the line for an entry.
    pub fn resolve<B: Backend>(backend: &B, entry: &LineEntry) -> Result<MonitorDescriptor> {
        let handle = backend
            .resolve(&entry.line)
            .map_err(|e| Error::LineResolutionFailed(entry.line.clone(), e))?;
        Ok(MonitorDescriptor {
            id: entry.line.clone(),
            handle,
            config: entry.request_config(),
            continue_after_event: entry.continue_after_event,
            target: entry.target.clone().filter(|t| !t.is_empty()),
        })
    }
}

/// A source of edge events from an armed line.
#[allow(async_fn_in_trait)]
pub trait EdgeSource {
    /// Wait for and read a single edge event.
    ///
    /// Only one event is drained per call, so any other pending events remain
    /// queued for subsequent calls.
    async fn read_edge_event(&self) -> std::io::Result<EdgeEvent>;
}

/// Access to the GPIO lines on a platform.
pub trait Backend {
    /// The armed line returned by [`arm`](Backend::arm).
    type Line: EdgeSource + 'static;

    /// Locate a line.
    fn resolve(&self, id: &LineId) -> std::result::Result<LineHandle, BoxError>;

    /// Request a line for edge detection.
    ///
    /// The line remains requested until the returned line is dropped.
    fn arm(
        &self,
        handle: &LineHandle,
        config: &RequestConfig,
    ) -> std::result::Result<Self::Line, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_detection_from_edge_mode() {
        assert_eq!(
            EdgeDetection::from(EdgeMode::Rising),
            EdgeDetection::RisingEdge
        );
        assert_eq!(
            EdgeDetection::from(EdgeMode::Falling),
            EdgeDetection::FallingEdge
        );
        assert_eq!(
            EdgeDetection::from(EdgeMode::Both),
            EdgeDetection::BothEdges
        );
        assert_eq!(EdgeMode::default(), EdgeMode::Both);
    }

    #[test]
    fn line_id_display() {
        assert_eq!(LineId::Name("FAN_BUTTON".into()).to_string(), "'FAN_BUTTON'");
        let id = LineId::Offset {
            chip: "gpiochip1".into(),
            offset: 17,
        };
        assert_eq!(id.to_string(), "17 on chip 'gpiochip1'");
    }

    #[test]
    fn entry_defaults() {
        let e = LineEntry::new(LineId::Name("BUTTON".into()));
        assert_eq!(e.consumer, DEFAULT_CONSUMER);
        assert_eq!(e.edge_mode, EdgeMode::Both);
        assert!(!e.continue_after_event);
        assert!(e.target.is_none());

        let cfg = e.request_config();
        assert_eq!(cfg, RequestConfig::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn edge_mode_names() {
        let m: EdgeMode = serde_json::from_str("\"FALLING\"").unwrap();
        assert_eq!(m, EdgeMode::Falling);
        let m: EdgeMode = serde_json::from_str("\"BOTH\"").unwrap();
        assert_eq!(m, EdgeMode::Both);
        assert!(serde_json::from_str::<EdgeMode>("\"falling\"").is_err());

        let b: BiasMode = serde_json::from_str("\"pull-up\"").unwrap();
        assert_eq!(b, BiasMode::PullUp);
    }
}
