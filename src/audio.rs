use crate::error::{Result, RttyError};
use crate::sink::{AudioSink, Negotiated, StreamParams};
use crate::SampleFormat;
use byteorder::{LittleEndian, ReadBytesExt};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

const WAIT_SLICE: Duration = Duration::from_millis(20);

struct Playback {
    queue: VecDeque<f32>,
    capacity: usize,
    start_threshold: usize,
    running: bool,
    starved: bool,
}

impl Playback {
    /// `capacity` and `period` in samples. Playback starts once the largest
    /// whole number of periods that fits is queued.
    fn new(capacity: usize, period: usize) -> Self {
        let period = period.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            start_threshold: (capacity / period).max(1) * period,
            running: false,
            starved: false,
        }
    }

    fn headroom(&self) -> usize {
        self.capacity - self.queue.len()
    }

    /// Device side: fills `data` from the queue, or with silence before start.
    fn fill(&mut self, data: &mut [f32]) {
        if !self.running && self.queue.len() >= self.start_threshold {
            self.running = true;
        }

        for sample in data.iter_mut() {
            *sample = if self.running {
                match self.queue.pop_front() {
                    Some(value) => value,
                    None => {
                        self.starved = true;
                        0.0
                    }
                }
            } else {
                0.0
            };
        }
    }

    /// Writer side: reports an underrun seen by the device since the last
    /// write, once.
    fn admit(&mut self) -> Result<()> {
        if self.starved {
            self.starved = false;
            return Err(RttyError::Underrun);
        }
        Ok(())
    }

    fn recover(&mut self) {
        self.starved = false;
        self.running = false;
    }
}

type Shared = Arc<(Mutex<Playback>, Condvar)>;

/// Live playback through the system audio device.
///
/// cpal pulls samples from a callback, so writes go into a queue of
/// `buffer_time` frames that the callback drains. Like a hardware ring
/// buffer, playback only starts once the start threshold is queued, and a
/// callback that finds the queue empty after start marks an underrun that
/// the next `write` reports.
pub struct CpalSink {
    _stream: Stream,
    shared: Shared,
    format: SampleFormat,
    negotiated: Negotiated,
}

fn lock(shared: &Shared) -> MutexGuard<'_, Playback> {
    // A panicking audio callback leaves the queue itself consistent.
    shared.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        None | Some("default") => host
            .default_output_device()
            .ok_or_else(|| RttyError::AudioDevice("No output device found".into())),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| RttyError::AudioDevice(e.to_string()))?
            .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| RttyError::AudioDevice(format!("No output device named {}", wanted))),
    }
}

impl CpalSink {
    pub fn open(device_name: Option<&str>, params: &StreamParams) -> Result<Self> {
        let device = find_device(device_name)?;
        let negotiated = Negotiated::from(params);

        let config = StreamConfig {
            channels: params.channels,
            sample_rate: cpal::SampleRate(params.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = negotiated.buffer_frames * usize::from(params.channels);
        let period = negotiated.period_frames * usize::from(params.channels);
        let shared: Shared = Arc::new((
            Mutex::new(Playback::new(capacity, period)),
            Condvar::new(),
        ));

        let callback_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut playback = lock(&callback_shared);
                    playback.fill(data);
                    drop(playback);
                    callback_shared.1.notify_all();
                },
                |err| log::error!("Audio output error: {}", err),
                None,
            )
            .map_err(|e| RttyError::AudioDevice(e.to_string()))?;

        stream
            .play()
            .map_err(|e| RttyError::AudioDevice(e.to_string()))?;

        log::debug!(
            "opened {} at {} Hz: {:?}",
            device.name().unwrap_or_else(|_| "output device".into()),
            params.sample_rate,
            negotiated
        );

        Ok(Self {
            _stream: stream,
            shared,
            format: params.format,
            negotiated,
        })
    }
}

/// Converts packed device frames to the f32 samples cpal plays.
fn decode(format: SampleFormat, frames: &[u8]) -> Vec<f32> {
    match format {
        SampleFormat::U8 => frames
            .iter()
            .map(|&b| (f32::from(b) - 128.0) / 128.0)
            .collect(),
        SampleFormat::S16Le => {
            let mut samples = Vec::with_capacity(frames.len() / 2);
            let mut cursor = Cursor::new(frames);
            while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
                samples.push(f32::from(sample) / 32768.0);
            }
            samples
        }
    }
}

impl AudioSink for CpalSink {
    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn write(&mut self, frames: &[u8]) -> Result<usize> {
        let samples = decode(self.format, frames);
        let mut playback = lock(&self.shared);
        playback.admit()?;

        while playback.headroom() < samples.len() {
            // Full ring: start playing even if the threshold was never hit.
            playback.running = true;
            playback = self
                .shared
                .1
                .wait_timeout(playback, WAIT_SLICE)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }

        playback.queue.extend(samples.iter().copied());
        Ok(samples.len())
    }

    fn available_headroom(&self) -> usize {
        lock(&self.shared).headroom()
    }

    fn recover(&mut self) -> Result<()> {
        lock(&self.shared).recover();
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        let mut playback = lock(&self.shared);
        playback.running = true;
        while !playback.queue.is_empty() {
            playback = self
                .shared
                .1
                .wait_timeout(playback, WAIT_SLICE)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        drop(playback);

        // Let the device play out its own hardware buffer.
        std::thread::sleep(Duration::from_millis(100));
        Ok(())
    }
}

pub fn list_audio_devices() -> Vec<String> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let marker = if Some(&name) == default_name.as_ref() {
                    " (default)"
                } else {
                    ""
                };
                devices.push(format!("{}{}", name, marker));
            }
        }
    }

    devices
}
