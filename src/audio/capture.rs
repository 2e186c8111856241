//! Microphone input through cpal.

use crate::audio::recorder::{AudioSource, AudioSourceConfig};
use crate::audio::wav::resample;
use crate::error::{KiraError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Grace period after `play()` before we decide the stream is silent.
const FIRST_CALLBACK_WAIT: Duration = Duration::from_millis(200);

/// Run `f` with fd 2 pointed at /dev/null.
///
/// ALSA and JACK print probing noise straight to stderr while cpal enumerates
/// hosts; the prompt the user is reading would get buried under it.
///
/// # Safety
/// Only sound while no other thread touches fd 2.
fn quiet_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved >= 0 {
            libc::dup2(saved, 2);
            libc::close(saved);
        }
        result
    }
}

/// Keep JACK from trying to start a server and silence backend debug output.
///
/// Must run before any thread is spawned.
pub fn quiet_audio_backends() {
    // SAFETY: called from main before the runtime starts.
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Sound servers that follow the desktop's chosen microphone.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Output-only or multichannel endpoints that are never a microphone.
const IGNORED_DEVICES: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn contains_any(name: &str, patterns: &[&str]) -> bool {
    let lower = name.to_lowercase();
    patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
}

fn is_ignored_device(name: &str) -> bool {
    contains_any(name, IGNORED_DEVICES)
}

fn is_preferred_device(name: &str) -> bool {
    contains_any(name, PREFERRED_DEVICES)
}

/// Names of usable input devices; sound-server devices carry a
/// `[recommended]` suffix.
pub fn list_devices() -> Result<Vec<String>> {
    let (_host, devices) = quiet_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let devices = devices.map_err(|e| KiraError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .filter(|name| !is_ignored_device(name))
        .map(|name| {
            if is_preferred_device(&name) {
                format!("{} [recommended]", name)
            } else {
                name
            }
        })
        .collect())
}

fn find_device(name: Option<&str>) -> Result<cpal::Device> {
    quiet_stderr(|| {
        let host = cpal::default_host();

        let Some(name) = name else {
            if let Ok(devices) = host.input_devices() {
                for device in devices {
                    if device.name().is_ok_and(|n| is_preferred_device(&n)) {
                        return Ok(device);
                    }
                }
            }
            return host
                .default_input_device()
                .ok_or_else(|| KiraError::AudioDeviceNotFound {
                    device: "default".to_string(),
                });
        };

        let devices = host.input_devices().map_err(|e| KiraError::AudioCapture {
            message: format!("Failed to enumerate input devices: {}", e),
        })?;
        for device in devices {
            if device.name().is_ok_and(|n| n == name) {
                return Ok(device);
            }
        }
        Err(KiraError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// cpal streams are `!Send` on some hosts. The stream is only created,
/// paused and dropped by whichever thread currently owns the source, and the
/// source is owned by exactly one capture session at a time.
struct OwnedStream(cpal::Stream);

unsafe impl Send for OwnedStream {}

/// Samples shared between the cpal callback and `read_samples`.
#[derive(Clone, Default)]
struct SharedBuffer {
    samples: Arc<Mutex<Vec<i16>>>,
    callbacks: Arc<AtomicU64>,
}

impl SharedBuffer {
    fn push(&self, data: &[i16]) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut buf) = self.samples.lock() {
            buf.extend_from_slice(data);
        }
    }

    fn take(&self) -> Result<Vec<i16>> {
        let mut buf = self.samples.lock().map_err(|e| KiraError::AudioCapture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;
        Ok(std::mem::take(&mut *buf))
    }

    fn clear(&self) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.clear();
        }
        self.callbacks.store(0, Ordering::Relaxed);
    }

    fn has_data(&self) -> bool {
        self.callbacks.load(Ordering::Relaxed) > 0
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::warn!(error = %err, "audio stream error");
}

/// Microphone source delivering 16-bit PCM in the configured layout.
///
/// Asks the device for the exact rate and channel count first (i16, then
/// f32). If neither opens, or the stream opens but never calls back, the
/// device's native layout is captured and converted in software.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<OwnedStream>,
    buffer: SharedBuffer,
    config: AudioSourceConfig,
}

impl CpalAudioSource {
    /// Open `device_name`, or the best default input when `None`.
    ///
    /// # Errors
    /// `KiraError::AudioDeviceNotFound` when no matching input exists.
    pub fn open(device_name: Option<&str>, config: AudioSourceConfig) -> Result<Self> {
        let device = find_device(device_name)?;
        if let Ok(name) = device.name() {
            tracing::debug!(device = %name, rate = config.sample_rate, "input device selected");
        }

        Ok(Self {
            device,
            stream: None,
            buffer: SharedBuffer::default(),
            config,
        })
    }

    fn requested_stream_config(&self) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }

    fn build_requested(&self) -> Option<cpal::Stream> {
        let config = self.requested_stream_config();

        let buffer = self.buffer.clone();
        if let Ok(stream) = self.device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| buffer.push(data),
            log_stream_error,
            None,
        ) {
            return Some(stream);
        }

        let buffer = self.buffer.clone();
        self.device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data.iter().map(|&s| to_i16(s)).collect();
                    buffer.push(&converted);
                },
                log_stream_error,
                None,
            )
            .ok()
    }

    fn build_native(&self) -> Result<cpal::Stream> {
        let native = self
            .device
            .default_input_config()
            .map_err(|e| KiraError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;

        let layout = Conversion {
            native_channels: native.channels() as usize,
            native_rate: native.sample_rate().0,
            target_channels: self.config.channels as usize,
            target_rate: self.config.sample_rate,
        };
        tracing::info!(
            channels = layout.native_channels,
            rate = layout.native_rate,
            format = ?native.sample_format(),
            "using native input format, converting in software"
        );

        let stream_config: cpal::StreamConfig = native.clone().into();
        let buffer = self.buffer.clone();

        let stream = match native.sample_format() {
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    buffer.push(&layout.apply(data));
                },
                log_stream_error,
                None,
            ),
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let pcm: Vec<i16> = data.iter().map(|&s| to_i16(s)).collect();
                    buffer.push(&layout.apply(&pcm));
                },
                log_stream_error,
                None,
            ),
            other => {
                return Err(KiraError::AudioCapture {
                    message: format!(
                        "Unsupported native sample format {:?}; pick another input with --device",
                        other
                    ),
                });
            }
        };

        stream.map_err(|e| KiraError::AudioCapture {
            message: format!("Failed to build native input stream: {}", e),
        })
    }
}

fn play(stream: &cpal::Stream) -> Result<()> {
    stream.play().map_err(|e| KiraError::AudioCapture {
        message: format!("Failed to start audio stream: {}", e),
    })
}

/// Software conversion from the device's native layout.
#[derive(Debug, Clone, Copy)]
struct Conversion {
    native_channels: usize,
    native_rate: u32,
    target_channels: usize,
    target_rate: u32,
}

impl Conversion {
    fn apply(&self, samples: &[i16]) -> Vec<i16> {
        let framed = remap_channels(samples, self.native_channels, self.target_channels);
        if self.native_rate == self.target_rate {
            framed
        } else if self.target_channels <= 1 {
            resample(&framed, self.native_rate, self.target_rate)
        } else {
            resample_interleaved(&framed, self.target_channels, self.native_rate, self.target_rate)
        }
    }
}

/// Resample each channel on its own and interleave the results again.
fn resample_interleaved(
    samples: &[i16],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Vec<i16> {
    let planes: Vec<Vec<i16>> = (0..channels)
        .map(|c| {
            let plane: Vec<i16> = samples.iter().skip(c).step_by(channels).copied().collect();
            resample(&plane, from_rate, to_rate)
        })
        .collect();
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);

    (0..frames)
        .flat_map(|i| planes.iter().map(move |plane| plane[i]))
        .collect()
}

/// Average down to mono, or keep/duplicate leading channels per frame.
fn remap_channels(samples: &[i16], from: usize, to: usize) -> Vec<i16> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    if to == 1 {
        return samples
            .chunks_exact(from)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / from as i32) as i16
            })
            .collect();
    }
    samples
        .chunks_exact(from)
        .flat_map(|frame| (0..to).map(move |c| frame[c.min(from - 1)]))
        .collect()
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.buffer.clear();

        let stream = match self.build_requested() {
            Some(stream) => {
                play(&stream)?;
                std::thread::sleep(FIRST_CALLBACK_WAIT);
                if self.buffer.has_data() {
                    stream
                } else {
                    // Some PipeWire ALSA shims accept the layout and then stay silent.
                    tracing::debug!("requested layout delivered nothing, retrying natively");
                    drop(stream);
                    self.buffer.clear();
                    let native = self.build_native()?;
                    play(&native)?;
                    native
                }
            }
            None => {
                let native = self.build_native()?;
                play(&native)?;
                native
            }
        };

        self.stream = Some(OwnedStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(OwnedStream(stream)) = self.stream.take() {
            stream.pause().map_err(|e| KiraError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        self.buffer.take()
    }
}
