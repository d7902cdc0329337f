// LiveDevice - capture from an input device via cpal
//
// The cpal callback runs on the host's audio thread. It only copies the first
// channel of each frame into a lock-free rtrb queue and counts the samples it
// had to drop when the queue was full. The measurement loop drains the queue
// from `read()`, polling until a full block is available.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::source::AcquisitionSource;
use crate::error::AudioError;

/// Seconds of audio the capture queue can hold before overrunning
const QUEUE_SECONDS: u32 = 2;

/// Poll interval while waiting for captured frames
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A read that sees no new frames for this long fails the stream
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Device name selecting the host default input
pub const DEFAULT_DEVICE: &str = "default";

/// Live capture source
///
/// Dropping the device stops the stream.
pub struct LiveDevice {
    _stream: cpal::Stream,
    consumer: Consumer<i16>,
    sample_rate: u32,
    overruns: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl LiveDevice {
    /// Open `device_name` for mono capture at `sample_rate`
    ///
    /// # Arguments
    /// * `device_name` - Device name as reported by the host, or "default"
    /// * `sample_rate` - Requested capture rate in Hz
    ///
    /// # Returns
    /// * `Err(AudioError::DeviceOpenFailed)` - Unknown device or stream start failure
    /// * `Err(AudioError::UnsupportedFormat)` - No config offers the rate as i16 or f32
    pub fn open(device_name: &str, sample_rate: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = find_device(&host, device_name)?;
        let open_failed = |reason: String| AudioError::DeviceOpenFailed {
            device: device_name.to_string(),
            reason,
        };

        let supported = device
            .supported_input_configs()
            .map_err(|e| open_failed(format!("Failed to query input configs: {}", e)))?
            .filter(|range| {
                range.min_sample_rate().0 <= sample_rate
                    && range.max_sample_rate().0 >= sample_rate
                    && matches!(
                        range.sample_format(),
                        cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                    )
            })
            // Prefer i16 and the fewest channels
            .min_by_key(|range| {
                (
                    range.sample_format() != cpal::SampleFormat::I16,
                    range.channels(),
                )
            })
            .ok_or_else(|| AudioError::UnsupportedFormat {
                details: format!(
                    "device {} offers no i16/f32 input at {} Hz",
                    device_name, sample_rate
                ),
            })?
            .with_sample_rate(cpal::SampleRate(sample_rate));

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let channels = stream_config.channels.max(1) as usize;

        let (producer, consumer) = RingBuffer::<i16>::new((sample_rate * QUEUE_SECONDS) as usize);
        let overruns = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let err_flag = Arc::clone(&failed);
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("[LiveDevice] Input stream error: {}", err);
            err_flag.store(true, Ordering::Release);
        };

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                let mut writer = CaptureWriter::new(producer, Arc::clone(&overruns), channels);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| writer.push_frames(data, |s| s),
                    err_fn,
                    None,
                )
            }
            _ => {
                let mut writer = CaptureWriter::new(producer, Arc::clone(&overruns), channels);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        writer.push_frames(data, f32_to_pcm)
                    },
                    err_fn,
                    None,
                )
            }
        }
        .map_err(|e| open_failed(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| open_failed(format!("Failed to start input stream: {}", e)))?;

        tracing::info!(
            "[LiveDevice] Capturing from {:?} at {} Hz ({:?}, {} channel(s), using channel 0)",
            device.name().unwrap_or_else(|_| device_name.to_string()),
            sample_rate,
            sample_format,
            channels
        );

        Ok(Self {
            _stream: stream,
            consumer,
            sample_rate,
            overruns,
            failed,
        })
    }

    /// Samples dropped because the measurement loop fell behind
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl AcquisitionSource for LiveDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        let wanted = buffer.len();
        let mut last_progress = Instant::now();
        let mut last_slots = 0;

        loop {
            if self.failed.load(Ordering::Acquire) {
                return Err(AudioError::StreamFailure {
                    reason: "input stream reported an error".to_string(),
                });
            }

            let slots = self.consumer.slots();
            if slots >= wanted {
                break;
            }
            if slots != last_slots {
                last_slots = slots;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(AudioError::StreamFailure {
                    reason: format!("no audio captured for {:?}", STALL_TIMEOUT),
                });
            }
            if self.consumer.is_abandoned() {
                return Err(AudioError::StreamFailure {
                    reason: "capture callback disconnected".to_string(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }

        let chunk = self
            .consumer
            .read_chunk(wanted)
            .map_err(|e| AudioError::ReadFailed {
                reason: e.to_string(),
            })?;
        let (first, second) = chunk.as_slices();
        buffer[..first.len()].copy_from_slice(first);
        buffer[first.len()..first.len() + second.len()].copy_from_slice(second);
        chunk.commit_all();

        Ok(wanted)
    }
}

/// Callback-side half of the capture queue
struct CaptureWriter {
    producer: Producer<i16>,
    overruns: Arc<AtomicU64>,
    channels: usize,
}

impl CaptureWriter {
    fn new(producer: Producer<i16>, overruns: Arc<AtomicU64>, channels: usize) -> Self {
        Self {
            producer,
            overruns,
            channels,
        }
    }

    /// Queue channel 0 of each interleaved frame
    fn push_frames<T: Copy>(&mut self, data: &[T], convert: impl Fn(T) -> i16) {
        let mut dropped = 0u64;
        for frame in data.chunks(self.channels) {
            if self.producer.push(convert(frame[0])).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.overruns.fetch_add(dropped, Ordering::Relaxed);
        }
    }
}

fn f32_to_pcm(sample: f32) -> i16 {
    (sample * 32_767.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn find_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    if device_name == DEFAULT_DEVICE {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceOpenFailed {
                device: device_name.to_string(),
                reason: "No default input device found".to_string(),
            });
    }

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceOpenFailed {
            device: device_name.to_string(),
            reason: format!("Failed to enumerate input devices: {}", e),
        })?;
    for device in devices {
        if device.name().map(|name| name == device_name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceOpenFailed {
        device: device_name.to_string(),
        reason: "no input device with this name".to_string(),
    })
}

/// Names of the available input devices
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceOpenFailed {
            device: DEFAULT_DEVICE.to_string(),
            reason: format!("Failed to enumerate input devices: {}", e),
        })?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}
