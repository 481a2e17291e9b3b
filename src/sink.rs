//! Audio sink abstraction and the non-device backends.
//!
//! A backend is opened and negotiated by its constructor; afterwards the
//! sample buffer only needs the negotiated sizes, a blocking `write`, the
//! current headroom for keep-alive decisions, and `recover` after an underrun.

use crate::error::{Result, RttyError};
use crate::SampleFormat;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

/// What the caller asks of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub channels: u16,
    pub buffer_time_us: u32,
    pub period_time_us: u32,
}

impl StreamParams {
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * usize::from(self.channels)
    }

    pub fn period_frames(&self) -> usize {
        (u64::from(self.sample_rate) * u64::from(self.period_time_us) / 1_000_000) as usize
    }

    pub fn buffer_frames(&self) -> usize {
        (u64::from(self.sample_rate) * u64::from(self.buffer_time_us) / 1_000_000) as usize
    }
}

/// What the sink agreed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Bytes per frame.
    pub frame_size: usize,
    /// Frames per write.
    pub period_frames: usize,
    /// Frames the device can queue.
    pub buffer_frames: usize,
}

impl From<&StreamParams> for Negotiated {
    fn from(params: &StreamParams) -> Self {
        Self {
            frame_size: params.frame_size(),
            period_frames: params.period_frames().max(1),
            buffer_frames: params.buffer_frames().max(1),
        }
    }
}

pub trait AudioSink {
    fn negotiated(&self) -> Negotiated;

    /// Blocks until `frames` are queued. Returns the number of frames
    /// written, or `RttyError::Underrun` if the device starved since the
    /// last write, in which case the frames are dropped.
    fn write(&mut self, frames: &[u8]) -> Result<usize>;

    fn available_headroom(&self) -> usize;

    /// Re-arms the device after an underrun.
    fn recover(&mut self) -> Result<()>;

    /// Plays out everything queued.
    fn drain(&mut self) -> Result<()>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn negotiated(&self) -> Negotiated {
        (**self).negotiated()
    }

    fn write(&mut self, frames: &[u8]) -> Result<usize> {
        (**self).write(frames)
    }

    fn available_headroom(&self) -> usize {
        (**self).available_headroom()
    }

    fn recover(&mut self) -> Result<()> {
        (**self).recover()
    }

    fn drain(&mut self) -> Result<()> {
        (**self).drain()
    }
}

/// Headerless PCM to any writer, e.g. stdout piped into `aplay`.
///
/// There is no device clock to pace against, so it never reports headroom
/// and keep-alive tones are not generated.
pub struct RawSink<W: Write> {
    writer: W,
    negotiated: Negotiated,
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W, params: &StreamParams) -> Self {
        Self {
            writer,
            negotiated: Negotiated::from(params),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AudioSink for RawSink<W> {
    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn write(&mut self, frames: &[u8]) -> Result<usize> {
        self.writer.write_all(frames)?;
        Ok(frames.len() / self.negotiated.frame_size)
    }

    fn available_headroom(&self) -> usize {
        0
    }

    fn recover(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Mono WAV file in the configured sample depth.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    format: SampleFormat,
    negotiated: Negotiated,
    frames_written: u64,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, params: &StreamParams) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: params.channels,
            sample_rate: params.sample_rate,
            bits_per_sample: params.format.bits(),
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;

        Ok(Self {
            writer: Some(writer),
            format: params.format,
            negotiated: Negotiated::from(params),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for WavSink {
    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn write(&mut self, frames: &[u8]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RttyError::AudioDevice("WAV file already finalized".into()))?;

        let mut count = 0;
        match self.format {
            SampleFormat::U8 => {
                // hound stores 8-bit WAV as unsigned but takes signed samples.
                for &byte in frames {
                    writer.write_sample((i16::from(byte) - 128) as i8)?;
                    count += 1;
                }
            }
            SampleFormat::S16Le => {
                let mut cursor = Cursor::new(frames);
                while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
                    writer.write_sample(sample)?;
                    count += 1;
                }
            }
        }

        self.frames_written += count as u64;
        Ok(count)
    }

    fn available_headroom(&self) -> usize {
        0
    }

    fn recover(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_negotiated_sizes() {
        let params = Config::default().stream_params();
        let negotiated = Negotiated::from(&params);
        assert_eq!(negotiated.frame_size, 2);
        assert_eq!(negotiated.period_frames, 4410);
        assert_eq!(negotiated.buffer_frames, 22050);
    }

    #[test]
    fn test_raw_sink_passes_bytes() {
        let params = Config::default().stream_params();
        let mut sink = RawSink::new(Vec::new(), &params);
        assert_eq!(sink.write(&[1, 2, 3, 4]).unwrap(), 2);
        sink.drain().unwrap();
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_wav_sink_roundtrip() {
        let path = std::env::temp_dir().join(format!("rtty-tone-{}.wav", std::process::id()));
        let params = Config::default().stream_params();

        let mut sink = WavSink::create(&path, &params).unwrap();
        sink.write(&[0x00, 0x80, 0xFF, 0x7F, 0x01, 0x00]).unwrap();
        assert_eq!(sink.frames_written(), 3);
        sink.drain().unwrap();
        assert!(sink.write(&[0, 0]).is_err());

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MIN, i16::MAX, 1]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_wav_sink_u8_roundtrip() {
        let path = std::env::temp_dir().join(format!("rtty-tone-u8-{}.wav", std::process::id()));
        let params = Config {
            format: SampleFormat::U8,
            ..Default::default()
        }
        .stream_params();

        let mut sink = WavSink::create(&path, &params).unwrap();
        assert_eq!(sink.write(&[0x00, 0x80, 0xFF, 0x81]).unwrap(), 4);
        sink.drain().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 8);
        let samples: Vec<i8> = reader.samples::<i8>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![-128, 0, 127, 1]);
        std::fs::remove_file(&path).ok();
    }
}
