pub mod audio;
pub mod baudot;
pub mod buffer;
pub mod error;
pub mod input;
pub mod oscillator;
pub mod sink;
pub mod tone;
pub mod transmitter;

pub use audio::*;
pub use baudot::{BaudotEncoder, Encoded, Shift};
pub use buffer::*;
pub use error::*;
pub use input::*;
pub use oscillator::*;
pub use sink::*;
pub use tone::*;
pub use transmitter::*;

pub const SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_LOW_FREQUENCY: u32 = 950;
pub const DEFAULT_VOLUME: u8 = 100;
pub const DEFAULT_TABLE_SIZE: usize = 8192;
pub const MIN_TABLE_SIZE: usize = 2;
pub const MAX_TABLE_SIZE: usize = 65536;
pub const COLUMN_LIMIT: usize = 76;
pub const BUFFER_TIME_US: u32 = 500_000;
pub const PERIOD_TIME_US: u32 = 100_000;

/// Teletype speed. Each standard speed has a fixed bit duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    /// 45.45 baud
    Wpm60,
    /// 50 baud
    Wpm66,
    /// 56.9 baud
    Wpm75,
    /// 74.2 baud
    Wpm100,
}

impl Speed {
    pub fn from_wpm(wpm: u32) -> Option<Self> {
        match wpm {
            60 => Some(Speed::Wpm60),
            66 => Some(Speed::Wpm66),
            75 => Some(Speed::Wpm75),
            100 => Some(Speed::Wpm100),
            _ => None,
        }
    }

    pub fn wpm(&self) -> u32 {
        match self {
            Speed::Wpm60 => 60,
            Speed::Wpm66 => 66,
            Speed::Wpm75 => 75,
            Speed::Wpm100 => 100,
        }
    }

    pub fn bit_duration_ms(&self) -> u32 {
        match self {
            Speed::Wpm60 => 22,
            Speed::Wpm66 => 20,
            Speed::Wpm75 => 18,
            Speed::Wpm100 => 13,
        }
    }
}

/// Distance between the space (low) and mark (high) tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftWidth {
    Narrow,
    Medium,
    Wide,
}

impl ShiftWidth {
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            170 => Some(ShiftWidth::Narrow),
            425 => Some(ShiftWidth::Medium),
            850 => Some(ShiftWidth::Wide),
            _ => None,
        }
    }

    pub fn hz(&self) -> u32 {
        match self {
            ShiftWidth::Narrow => 170,
            ShiftWidth::Medium => 425,
            ShiftWidth::Wide => 850,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit unsigned, centred on 128
    U8,
    /// 16-bit signed little-endian
    S16Le,
}

impl SampleFormat {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(SampleFormat::U8),
            16 => Some(SampleFormat::S16Le),
            _ => None,
        }
    }

    pub fn bits(&self) -> u16 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::S16Le => 16,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub low_frequency: u32,
    pub shift: ShiftWidth,
    pub speed: Speed,
    pub volume: u8,
    pub table_size: usize,
    pub column_limit: usize,
    pub buffer_time_us: u32,
    pub period_time_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            format: SampleFormat::S16Le,
            low_frequency: DEFAULT_LOW_FREQUENCY,
            shift: ShiftWidth::Narrow,
            speed: Speed::Wpm60,
            volume: DEFAULT_VOLUME,
            table_size: DEFAULT_TABLE_SIZE,
            column_limit: COLUMN_LIMIT,
            buffer_time_us: BUFFER_TIME_US,
            period_time_us: PERIOD_TIME_US,
        }
    }
}

impl Config {
    /// Mark tone, binary 1.
    pub fn high_frequency(&self) -> u32 {
        self.low_frequency + self.shift.hz()
    }

    pub fn bit_duration_ms(&self) -> u32 {
        self.speed.bit_duration_ms()
    }

    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            sample_rate: self.sample_rate,
            format: self.format,
            channels: 1,
            buffer_time_us: self.buffer_time_us,
            period_time_us: self.period_time_us,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(5000..=48000).contains(&self.sample_rate) {
            return Err(RttyError::InvalidConfig(format!(
                "sample rate {} Hz outside 5000..=48000",
                self.sample_rate
            )));
        }
        if !(500..=3000).contains(&self.low_frequency) {
            return Err(RttyError::InvalidConfig(format!(
                "base frequency {} Hz outside 500..=3000",
                self.low_frequency
            )));
        }
        if self.volume > 100 {
            return Err(RttyError::InvalidConfig(format!(
                "volume {} outside 0..=100",
                self.volume
            )));
        }
        if !(MIN_TABLE_SIZE..=MAX_TABLE_SIZE).contains(&self.table_size) {
            return Err(RttyError::InvalidConfig(format!(
                "table size {} outside {}..={}",
                self.table_size, MIN_TABLE_SIZE, MAX_TABLE_SIZE
            )));
        }
        if self.column_limit == 0 {
            return Err(RttyError::InvalidConfig("column limit must be positive".into()));
        }
        if self.period_time_us == 0 || self.buffer_time_us < self.period_time_us {
            return Err(RttyError::InvalidConfig(format!(
                "buffer time {} us must hold at least one period of {} us",
                self.buffer_time_us, self.period_time_us
            )));
        }
        // Above Nyquist the phase step reaches the table size and the tone aliases.
        if self.high_frequency() * 2 >= self.sample_rate {
            return Err(RttyError::InvalidConfig(format!(
                "mark tone {} Hz is not below half the sample rate {} Hz",
                self.high_frequency(),
                self.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.high_frequency(), 1120);
        assert_eq!(config.bit_duration_ms(), 22);
    }

    #[test]
    fn test_speed_table() {
        let durations: Vec<u32> = [60, 66, 75, 100]
            .iter()
            .map(|&wpm| Speed::from_wpm(wpm).unwrap().bit_duration_ms())
            .collect();
        assert_eq!(durations, vec![22, 20, 18, 13]);
        assert!(Speed::from_wpm(45).is_none());
    }

    #[test]
    fn test_shift_widths() {
        for hz in [170, 425, 850] {
            assert_eq!(ShiftWidth::from_hz(hz).unwrap().hz(), hz);
        }
        assert!(ShiftWidth::from_hz(200).is_none());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.volume = 101;
        assert!(matches!(config.validate(), Err(RttyError::InvalidConfig(_))));

        let mut config = Config::default();
        config.low_frequency = 400;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.table_size = 1;
        assert!(config.validate().is_err());

        let mut config = Config {
            sample_rate: 5000,
            low_frequency: 3000,
            shift: ShiftWidth::Wide,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.low_frequency = 1000;
        config.shift = ShiftWidth::Narrow;
        assert!(config.validate().is_ok());
    }
}
