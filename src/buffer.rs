use crate::error::{Result, RttyError};
use crate::sink::{AudioSink, Negotiated};
use crate::SampleFormat;
use byteorder::{LittleEndian, WriteBytesExt};

/// Anything the oscillator can feed one signed 16-bit sample at a time.
pub trait SampleSink {
    fn push_sample(&mut self, raw: i16) -> Result<()>;

    /// Frames the downstream device could take right now without blocking.
    fn available_headroom(&self) -> usize {
        0
    }

    /// Total frames the downstream device can hold.
    fn buffer_frames(&self) -> usize {
        0
    }
}

impl SampleSink for Vec<i16> {
    fn push_sample(&mut self, raw: i16) -> Result<()> {
        self.push(raw);
        Ok(())
    }
}

/// Packs samples into the sink's wire format and hands them over one period
/// at a time.
pub struct SampleBuffer<S: AudioSink> {
    sink: S,
    format: SampleFormat,
    negotiated: Negotiated,
    bytes: Vec<u8>,
    capacity: usize,
    periods_written: u64,
    underruns: u64,
}

impl<S: AudioSink> SampleBuffer<S> {
    pub fn new(sink: S, format: SampleFormat) -> Result<Self> {
        let negotiated = sink.negotiated();
        let mut buffer = Self {
            sink,
            format,
            negotiated,
            bytes: Vec::new(),
            capacity: 0,
            periods_written: 0,
            underruns: 0,
        };
        buffer.allocate()?;
        Ok(buffer)
    }

    fn allocate(&mut self) -> Result<()> {
        if self.negotiated.frame_size != self.format.bytes_per_sample() {
            return Err(RttyError::AudioDevice(format!(
                "sink negotiated {}-byte frames for {}-bit mono",
                self.negotiated.frame_size,
                self.format.bits()
            )));
        }

        let capacity = self.negotiated.period_frames.max(1) * self.negotiated.frame_size;
        self.bytes = Vec::new();
        self.bytes
            .try_reserve_exact(capacity)
            .map_err(|e| RttyError::Allocation(format!("sample buffer: {}", e)))?;
        self.capacity = capacity;
        Ok(())
    }

    /// Picks up a renegotiated period size. Pending bytes are discarded.
    pub fn resize(&mut self) -> Result<()> {
        let negotiated = self.sink.negotiated();
        if negotiated != self.negotiated {
            log::debug!(
                "sink renegotiated: {:?} -> {:?}",
                self.negotiated,
                negotiated
            );
            self.negotiated = negotiated;
            self.allocate()?;
        } else {
            self.bytes.clear();
        }
        Ok(())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pending_frames(&self) -> usize {
        self.bytes.len() / self.negotiated.frame_size
    }

    pub fn periods_written(&self) -> u64 {
        self.periods_written
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.bytes.is_empty() {
            return Ok(());
        }

        match self.sink.write(&self.bytes) {
            Ok(_) => self.periods_written += 1,
            Err(RttyError::Underrun) => {
                self.underruns += 1;
                log::warn!("audio sink underrun, recovering ({} so far)", self.underruns);
                self.sink.recover()?;
            }
            Err(e) => return Err(e),
        }

        self.bytes.clear();
        Ok(())
    }

    /// Sends the partial period, waits for playback to finish and returns the sink.
    pub fn finish(mut self) -> Result<S> {
        self.flush()?;
        self.sink.drain()?;
        log::debug!(
            "sample buffer finished: {} periods, {} underruns",
            self.periods_written,
            self.underruns
        );
        Ok(self.sink)
    }
}

impl<S: AudioSink> SampleSink for SampleBuffer<S> {
    fn push_sample(&mut self, raw: i16) -> Result<()> {
        match self.format {
            SampleFormat::U8 => self.bytes.push((128 + (raw >> 8)) as u8),
            SampleFormat::S16Le => self.bytes.write_i16::<LittleEndian>(raw)?,
        }

        if self.bytes.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    fn available_headroom(&self) -> usize {
        self.sink.available_headroom()
    }

    fn buffer_frames(&self) -> usize {
        self.negotiated.buffer_frames
    }
}
