//! Capture session: one producer thread draining an audio source into an
//! encoder until a stop signal arrives.
//!
//! Ordering on the stop path is fixed: signal observed, source stopped,
//! buffered samples drained, encoder finished (file closed), done reported.
//! Only the producer receives from the stop channel, so the encoder is never
//! touched from two threads.

use crate::audio::recorder::AudioSource;
use crate::audio::wav::FrameEncoder;
use crate::error::{KiraError, Result};
use crate::process::CommandExecutor;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the producer sleeps when the source had nothing new.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// What the producer wrote before it closed the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub path: PathBuf,
    pub buffers_written: u64,
    pub samples_written: u64,
}

/// Cloneable handle that can stop a running session from another thread
/// (used by the Ctrl+C path).
#[derive(Debug, Clone)]
pub struct CaptureControl {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl CaptureControl {
    /// Deliver the stop signal. Extra requests are dropped: the channel holds
    /// at most one signal and only the producer consumes it.
    pub fn request_stop(&self) {
        if self.stop_tx.try_send(()).is_err() {
            tracing::trace!("capture stop already pending or producer gone");
        }
    }

    /// Wait until the producer has closed the source and the encoder.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// A running capture.
pub struct CaptureSession {
    control: CaptureControl,
    producer: Option<JoinHandle<Result<CaptureSummary>>>,
    path: PathBuf,
}

impl CaptureSession {
    /// Start the source and launch the producer.
    ///
    /// The encoder must already be open on `path`; if the source fails to
    /// start, nothing is captured and the encoder is dropped.
    pub fn start(
        mut source: Box<dyn AudioSource>,
        encoder: Box<dyn FrameEncoder>,
        path: &Path,
    ) -> Result<Self> {
        source.start()?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let output = path.to_path_buf();

        let producer = thread::Builder::new()
            .name("kira-capture".to_string())
            .spawn(move || run_producer(source, encoder, stop_rx, done_tx, output))
            .map_err(|e| KiraError::AudioCapture {
                message: format!("Failed to spawn capture thread: {}", e),
            })?;

        tracing::debug!(path = %path.display(), "capture started");

        Ok(Self {
            control: CaptureControl { stop_tx, done_rx },
            producer: Some(producer),
            path: path.to_path_buf(),
        })
    }

    pub fn control(&self) -> CaptureControl {
        self.control.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal the producer and wait for it to close everything.
    ///
    /// Consumes the session, so a session is stopped exactly once.
    pub fn stop(mut self) -> Result<CaptureSummary> {
        self.control.request_stop();
        join_producer(self.producer.take())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.producer.is_some() {
            self.control.request_stop();
            if let Err(e) = join_producer(self.producer.take()) {
                tracing::warn!(error = %e, "capture closed with error on drop");
            }
        }
    }
}

fn join_producer(producer: Option<JoinHandle<Result<CaptureSummary>>>) -> Result<CaptureSummary> {
    let Some(handle) = producer else {
        return Err(KiraError::AudioCapture {
            message: "capture already stopped".to_string(),
        });
    };
    handle.join().map_err(|_| KiraError::AudioCapture {
        message: "capture thread panicked".to_string(),
    })?
}

fn run_producer(
    mut source: Box<dyn AudioSource>,
    mut encoder: Box<dyn FrameEncoder>,
    stop_rx: Receiver<()>,
    done_tx: Sender<()>,
    path: PathBuf,
) -> Result<CaptureSummary> {
    let mut summary = CaptureSummary {
        path,
        buffers_written: 0,
        samples_written: 0,
    };

    let loop_result = loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break Ok(()),
            Err(TryRecvError::Empty) => {}
        }

        match source.read_samples() {
            Ok(samples) if samples.is_empty() => thread::sleep(IDLE_POLL),
            Ok(samples) => {
                if let Err(e) = encoder.write_frames(&samples) {
                    break Err(e);
                }
                summary.buffers_written += 1;
                summary.samples_written += samples.len() as u64;
            }
            Err(e) => break Err(e),
        }
    };

    // Device first, then whatever it buffered, then the encoder, which
    // closes the file.
    let stop_result = source.stop();
    let drain_result = match (&loop_result, &stop_result) {
        (Ok(()), Ok(())) => drain_remaining(source.as_mut(), encoder.as_mut(), &mut summary),
        _ => Ok(()),
    };
    drop(source);
    let finish_result = encoder.finish();
    drop(done_tx);

    tracing::debug!(
        buffers = summary.buffers_written,
        samples = summary.samples_written,
        "capture closed"
    );

    loop_result?;
    stop_result?;
    drain_result?;
    finish_result?;
    Ok(summary)
}

/// Write the samples a stopped source still holds.
fn drain_remaining(
    source: &mut dyn AudioSource,
    encoder: &mut dyn FrameEncoder,
    summary: &mut CaptureSummary,
) -> Result<()> {
    let samples = source.read_samples()?;
    if samples.is_empty() {
        return Ok(());
    }
    encoder.write_frames(&samples)?;
    summary.buffers_written += 1;
    summary.samples_written += samples.len() as u64;
    tracing::trace!(samples = samples.len(), "drained buffered samples");
    Ok(())
}

/// Transcode the raw capture to AAC for upload, then drop the raw file.
///
/// The raw WAV is kept when ffmpeg fails so the turn can be inspected.
pub fn transcode_to_upload(
    executor: &dyn CommandExecutor,
    raw: &Path,
    upload: &Path,
) -> Result<()> {
    let raw_arg = raw.to_string_lossy();
    let upload_arg = upload.to_string_lossy();
    executor.execute("ffmpeg", &["-y", "-i", &raw_arg, "-c:a", "aac", &upload_arg])?;

    if let Err(e) = std::fs::remove_file(raw) {
        tracing::debug!(path = %raw.display(), error = %e, "raw capture not removed");
    }
    Ok(())
}
