//! Device streams producing [`RawFrame`]s
//!
//! [`EvdevStream`] reads a kernel event device. It waits on the descriptor with
//! `poll(2)` for a bounded time before each read, so the reader thread gets
//! back control regularly and can notice a stop request even when the
//! controller is idle. [`ReaderStream`] decodes frames from any [`Read`]
//! (recorded sessions, pipes, tests).

use crate::controller::frame::{FrameLayout, RawFrame};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors raised by a device stream
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Event device {0} does not exist")]
    NotFound(PathBuf),

    #[error("Failed to open event device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Event stream closed")]
    Closed,

    #[error("Failed to read event stream: {0}")]
    Io(#[from] io::Error),
}

/// Source of raw input frames
///
/// `Ok(None)` means no frame arrived within the stream's wait budget and the
/// caller may check for shutdown before asking again. Any `Err` is terminal.
pub trait RawEventStream: Send + 'static {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, DeviceError>;
}

/// Kernel event device, e.g. `/dev/input/event4`
#[derive(Debug)]
pub struct EvdevStream {
    path: PathBuf,
    file: File,
    layout: FrameLayout,
    poll_timeout: Duration,
    buffer: Vec<u8>,
}

impl EvdevStream {
    /// Open the device, failing if the path is missing or unreadable
    pub fn open(
        path: impl AsRef<Path>,
        layout: FrameLayout,
        poll_timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DeviceError::NotFound(path));
        }

        let file = File::open(&path).map_err(|source| DeviceError::Open {
            path: path.clone(),
            source,
        })?;
        info!(
            "Opened event device {} ({:?} frames, {}ms poll timeout)",
            path.display(),
            layout,
            poll_timeout.as_millis()
        );

        Ok(Self {
            path,
            file,
            layout,
            poll_timeout,
            buffer: vec![0u8; layout.frame_size()],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Wait until the descriptor is readable or the timeout expires
    fn wait_readable(&self) -> Result<bool, DeviceError> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = self.poll_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: pollfd is a valid, exclusively borrowed pollfd for one descriptor
        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(DeviceError::Io(err));
        }
        if ready == 0 {
            return Ok(false);
        }
        if pollfd.revents & libc::POLLIN != 0 {
            return Ok(true);
        }
        if pollfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
            warn!("Event device {} hung up", self.path.display());
            return Err(DeviceError::Closed);
        }
        Ok(false)
    }
}

impl RawEventStream for EvdevStream {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, DeviceError> {
        if !self.wait_readable()? {
            return Ok(None);
        }

        read_frame(&mut self.file, self.layout, &mut self.buffer).map(Some)
    }
}

/// Frames decoded from an arbitrary reader; blocking, no timeout
pub struct ReaderStream<R> {
    reader: R,
    layout: FrameLayout,
    buffer: Vec<u8>,
}

impl<R: Read + Send + 'static> ReaderStream<R> {
    pub fn new(reader: R, layout: FrameLayout) -> Self {
        Self {
            reader,
            layout,
            buffer: vec![0u8; layout.frame_size()],
        }
    }
}

impl<R: Read + Send + 'static> RawEventStream for ReaderStream<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, DeviceError> {
        read_frame(&mut self.reader, self.layout, &mut self.buffer).map(Some)
    }
}

fn read_frame<R: Read>(
    reader: &mut R,
    layout: FrameLayout,
    buffer: &mut [u8],
) -> Result<RawFrame, DeviceError> {
    match reader.read_exact(buffer) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("End of event stream reached");
            return Err(DeviceError::Closed);
        }
        Err(e) => return Err(DeviceError::Io(e)),
    }

    layout.decode(buffer).ok_or(DeviceError::Closed)
}
