// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use ledmon::{BiasMode, EdgeMode, LineEntry, LineId};
use serde_derive::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors in the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}'", .0.display())]
    Unreadable(PathBuf, #[source] std::io::Error),

    #[error("invalid config file '{}'", .0.display())]
    Invalid(PathBuf, #[source] serde_json::Error),

    #[error("entry {0}: {1}")]
    BadEntry(usize, serde_json::Error),

    #[error("entry {0}: requires LineName, or ChipId and GpioNum")]
    NoLine(usize),
}

/// The entry as it appears in the file.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "LineName")]
    line_name: Option<String>,

    #[serde(rename = "ChipId")]
    chip_id: Option<String>,

    #[serde(rename = "GpioNum")]
    gpio_num: Option<u32>,

    #[serde(rename = "EventMon", default)]
    edge_mode: EdgeMode,

    #[serde(rename = "Continue", default)]
    continue_after_event: bool,

    #[serde(rename = "ledTargetName")]
    target: Option<String>,

    #[serde(rename = "ActiveLow", default)]
    active_low: bool,

    #[serde(rename = "Bias")]
    bias: Option<BiasMode>,
}

/// The entries found in a configuration file.
#[derive(Debug, Default)]
pub struct Config {
    /// The valid entries, with the index of each in the file.
    pub entries: Vec<(usize, LineEntry)>,

    /// The entries that could not be used.
    pub errors: Vec<ConfigError>,
}

impl Config {
    /// Load the entries from a JSON file.
    ///
    /// The file must contain an array of entries.
    /// Each entry is validated separately, so a bad entry is reported in
    /// `errors` without affecting the others.
    pub fn load_from_file<P: AsRef<Path>>(path: P, consumer: &str) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::Unreadable(path.into(), e))?;
        Config::from_json(&contents, consumer).map_err(|e| ConfigError::Invalid(path.into(), e))
    }

    fn from_json(json: &str, consumer: &str) -> Result<Config, serde_json::Error> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut cfg = Config::default();
        for (idx, v) in values.into_iter().enumerate() {
            match entry_from_value(idx, v, consumer) {
                Ok(entry) => cfg.entries.push((idx, entry)),
                Err(e) => cfg.errors.push(e),
            }
        }
        Ok(cfg)
    }
}

fn entry_from_value(
    idx: usize,
    v: serde_json::Value,
    consumer: &str,
) -> Result<LineEntry, ConfigError> {
    let raw: RawEntry = serde_json::from_value(v).map_err(|e| ConfigError::BadEntry(idx, e))?;
    // a name takes precedence over the chip and offset
    let line = match (raw.line_name, raw.chip_id, raw.gpio_num) {
        (Some(name), _, _) => LineId::Name(name),
        (None, Some(chip), Some(offset)) => LineId::Offset { chip, offset },
        _ => return Err(ConfigError::NoLine(idx)),
    };
    let mut entry = LineEntry::new(line);
    entry.consumer = consumer.into();
    entry.edge_mode = raw.edge_mode;
    entry.continue_after_event = raw.continue_after_event;
    entry.target = raw.target;
    entry.active_low = raw.active_low;
    entry.bias = raw.bias;
    Ok(entry)
}
