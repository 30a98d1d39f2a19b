// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::{Backend, EdgeSource, LineHandle, LineId, RequestConfig};
use crate::BoxError;
use gpiocdev::chip::{is_chip, Chip};
use gpiocdev::line::{Bias, EdgeDetection, EdgeEvent};
use gpiocdev::request::Request;
use gpiocdev_uapi as uapi;
use std::io;
use std::path::PathBuf;
use tokio::io::unix::AsyncFd;

/// A [`Backend`] for lines accessed via the GPIO character device.
#[derive(Clone, Debug, Default)]
pub struct Cdev {}

impl Backend for Cdev {
    type Line = CdevLine;

    fn resolve(&self, id: &LineId) -> Result<LineHandle, BoxError> {
        match id {
            LineId::Name(name) => match gpiocdev::find_named_line(name) {
                Some(fl) => Ok(LineHandle {
                    chip: fl.chip,
                    offset: fl.info.offset,
                }),
                None => Err("no line with that name".into()),
            },
            LineId::Offset { chip, offset } => {
                let path = is_chip(chip_path_from_id(chip))?;
                let info = Chip::from_path(&path)?.info()?;
                if *offset >= info.num_lines {
                    return Err(format!(
                        "offset {} is out of range on chip '{}'",
                        offset, info.name
                    )
                    .into());
                }
                Ok(LineHandle {
                    chip: path,
                    offset: *offset,
                })
            }
        }
    }

    fn arm(&self, handle: &LineHandle, config: &RequestConfig) -> Result<CdevLine, BoxError> {
        let mut bld = Request::builder();
        bld.on_chip(handle.chip.clone())
            .with_consumer(config.consumer.as_str())
            .with_line(handle.offset)
            .as_input()
            .with_edge_detection(EdgeDetection::from(config.edge_mode));
        if config.active_low {
            bld.as_active_low();
        }
        if let Some(bias) = config.bias {
            bld.with_bias(Bias::from(bias));
        }
        let req = bld.request()?;
        Ok(CdevLine::new(req)?)
    }
}

fn chip_path_from_id(id: &str) -> PathBuf {
    if id.chars().all(char::is_numeric) {
        // from number
        return format!("/dev/gpiochip{id}").into();
    }
    if !id.chars().any(|x| x == '/') {
        // from name
        let mut p: PathBuf = "/dev".into();
        p.push(id);
        return p;
    }
    // from raw path
    id.into()
}

/// A requested line registered with the tokio reactor.
pub struct CdevLine(AsyncFd<Request>);

impl CdevLine {
    /// Register the request with the reactor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(req: Request) -> io::Result<Self> {
        Ok(CdevLine(AsyncFd::new(req)?))
    }
}

impl AsRef<Request> for CdevLine {
    fn as_ref(&self) -> &Request {
        self.0.get_ref()
    }
}

impl EdgeSource for CdevLine {
    async fn read_edge_event(&self) -> io::Result<EdgeEvent> {
        loop {
            let mut guard = self.0.readable().await?;
            let req = self.0.get_ref();
            if req.has_edge_event().map_err(io_error)? {
                let res = req.read_edge_event().map_err(io_error);
                if !req.has_edge_event().map_err(io_error)? {
                    guard.clear_ready();
                }
                return res;
            }
            // spurious wakeup
            guard.clear_ready();
        }
    }
}

// Errors from system calls keep their errno, so EINTR and EAGAIN retain their kind.
fn io_error(e: gpiocdev::Error) -> io::Error {
    match e {
        gpiocdev::Error::Os(errno) | gpiocdev::Error::Uapi(_, uapi::Error::Os(errno)) => {
            io::Error::from_raw_os_error(errno.0)
        }
        e => io::Error::other(e),
    }
}
