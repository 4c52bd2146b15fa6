use crate::controller::channel::Channel;
use crate::controller::device::RawEventStream;
use crate::controller::event_cache::{ChannelEvent, EventCache};
use crate::controller::frame::RawFrame;
use chrono::Local;
use statum::{machine, state};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

// Event source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Event reader task failed: {0}")]
    TaskError(String),
}

/// Lifecycle of the event source as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Idle,
    Running,
    Stopped,
    Failed,
}

impl SourceStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SourceStatus::Idle,
            1 => SourceStatus::Running,
            2 => SourceStatus::Stopped,
            _ => SourceStatus::Failed,
        }
    }
}

// Why the reader loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    Cancelled,
    DeviceLost(String),
}

// Counters for the periodic stats line
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    pub frames_read: u64,
    pub events_written: u64,
    pub frames_dropped: u64,
}

// Define reader states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum ReaderState {
    Idle,
    Reading,
    Finished,
}

#[machine]
pub struct DeviceReader<S: ReaderState> {
    // Raw frame supplier, owned by the reader thread once started
    stream: Box<dyn RawEventStream>,

    // Shared cache, we are its only writer
    cache: Arc<EventCache>,

    // Stop request from the handle
    cancel: CancellationToken,

    stats: ReaderStats,
}

impl<S: ReaderState> DeviceReader<S> {
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }
}

impl DeviceReader<Idle> {
    pub fn create(
        stream: Box<dyn RawEventStream>,
        cache: Arc<EventCache>,
        cancel: CancellationToken,
    ) -> Self {
        debug!("Creating device reader");
        Self::new(stream, cache, cancel, ReaderStats::default())
    }

    pub fn begin(self) -> DeviceReader<Reading> {
        info!("Device reader entering Reading state");
        self.transition()
    }
}

impl DeviceReader<Reading> {
    /// Decode one frame and store it if it maps to a channel
    pub fn handle_frame(&mut self, frame: RawFrame) -> Option<Channel> {
        self.stats.frames_read += 1;

        let Some(channel) = Channel::from_raw(frame.event_type, frame.code) else {
            trace!(
                "Dropping unmapped frame type={} code={}",
                frame.event_type,
                frame.code
            );
            self.stats.frames_dropped += 1;
            return None;
        };

        let event =
            ChannelEvent::from_timeval(frame.seconds, frame.microseconds, channel, frame.value);
        debug!("{} = {}", channel, frame.value);
        self.cache.write(channel, event);
        self.stats.events_written += 1;
        Some(channel)
    }

    /// Read until cancelled or the device goes away. Blocks the calling thread.
    pub fn run(mut self) -> (DeviceReader<Finished>, ReaderExit) {
        info!("Starting device read loop");

        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);
        let mut frames_at_last_log = 0u64;

        let exit = loop {
            if self.cancel.is_cancelled() {
                info!("Device reader stop requested");
                break ReaderExit::Cancelled;
            }

            match self.stream.next_frame() {
                Ok(Some(frame)) => {
                    self.handle_frame(frame);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Event stream failed: {}", e);
                    self.cache.clear_all();
                    self.cache.seal();
                    break ReaderExit::DeviceLost(e.to_string());
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                let frames = self.stats.frames_read - frames_at_last_log;
                info!(
                    "Event source stats: {} frames in last {} seconds ({} written, {} dropped total)",
                    frames,
                    log_interval.num_seconds(),
                    self.stats.events_written,
                    self.stats.frames_dropped
                );
                frames_at_last_log = self.stats.frames_read;
                last_log_time = now;
            }
        };

        (self.transition(), exit)
    }
}

impl DeviceReader<Finished> {}

/// Handle for the single producer feeding the [`EventCache`]
///
/// The reader runs on tokio's blocking pool since device reads block. `start`
/// and `stop` may be called any number of times.
pub struct EventSource {
    reader: Option<DeviceReader<Idle>>,
    cancel: CancellationToken,
    status: Arc<AtomicU8>,
    task_handle: Option<JoinHandle<ReaderExit>>,
}

impl EventSource {
    pub fn new(stream: Box<dyn RawEventStream>, cache: Arc<EventCache>) -> Self {
        let cancel = CancellationToken::new();
        let reader = DeviceReader::create(stream, cache, cancel.clone());
        Self {
            reader: Some(reader),
            cancel,
            status: Arc::new(AtomicU8::new(SourceStatus::Idle as u8)),
            task_handle: None,
        }
    }

    /// Spawn the read loop. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        let Some(reader) = self.reader.take() else {
            debug!("Event source already started");
            return;
        };
        if self.cancel.is_cancelled() {
            info!("Event source stopped before start, not spawning reader");
            self.status
                .store(SourceStatus::Stopped as u8, Ordering::Release);
            return;
        }

        self.status
            .store(SourceStatus::Running as u8, Ordering::Release);
        let status = Arc::clone(&self.status);

        info!("Spawning event source reader");
        self.task_handle = Some(tokio::task::spawn_blocking(move || {
            let (finished, exit) = reader.begin().run();
            let stats = finished.stats();
            match &exit {
                ReaderExit::Cancelled => {
                    status.store(SourceStatus::Stopped as u8, Ordering::Release);
                    info!(
                        "Event source stopped after {} frames ({} written)",
                        stats.frames_read, stats.events_written
                    );
                }
                ReaderExit::DeviceLost(reason) => {
                    status.store(SourceStatus::Failed as u8, Ordering::Release);
                    error!(
                        "Event source terminated after {} frames: {}",
                        stats.frames_read, reason
                    );
                }
            }
            exit
        }));
    }

    /// Request the reader to stop at its next poll boundary
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            debug!("Event source stop already requested");
            return;
        }
        info!("Stopping event source");
        self.cancel.cancel();
    }

    /// Stop and wait for the reader to finish
    pub async fn shutdown(&mut self) -> Result<Option<ReaderExit>, SourceError> {
        self.stop();
        let Some(handle) = self.task_handle.take() else {
            debug!("Event source has no running reader");
            return Ok(None);
        };

        match handle.await {
            Ok(exit) => Ok(Some(exit)),
            Err(e) => {
                warn!("Event reader task ended abnormally: {}", e);
                Err(SourceError::TaskError(e.to_string()))
            }
        }
    }

    pub fn status(&self) -> SourceStatus {
        SourceStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
