use crate::baudot::{
    self, is_printable, BaudotEncoder, BITS_PER_CHARACTER, CLOSED, CR, LF, LTRS, NULL,
};
use crate::buffer::SampleSink;
use crate::error::Result;
use crate::input::{KeyEvent, KeySource};
use crate::oscillator::Oscillator;
use crate::tone::ToneTable;
use crate::Config;
use std::io::{BufRead, Write};
use std::time::Duration;

pub const PREROLL_MS: u32 = 500;
pub const PREROLL_CLOSED: usize = 10;
pub const TRAILER_LENGTH: usize = 10;
pub const TEST_PATTERN_TAIL_MS: u32 = 2000;

const TEST_PATTERN: &str = "the quick brown fox jumped over the lazy dog's back 1234567890\n\
ryryryryryryryryryryryryryryryryryryryryryryryryryryryryryryry\n\
sgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsgsg\n\
ryryryryryryryryryryryryryryryryryryryryryryryryryryryryryryry\n";

/// Timing of the interactive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// How long to wait for a key before considering keep-alive.
    pub input_timeout: Duration,
    /// Minimum amount of idle signal rendered per keep-alive.
    pub keepalive: Duration,
    /// Key that ends the session.
    pub terminator: char,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            input_timeout: Duration::from_millis(100),
            keepalive: Duration::from_millis(150),
            // Ctrl-D
            terminator: '\u{4}',
        }
    }
}

/// Turns text into FSK audio: Baudot codes become eight framed bits, each
/// rendered as one bit-duration of mark (high) or space (low) tone.
pub struct Transmitter<O: SampleSink> {
    encoder: BaudotEncoder,
    oscillator: Oscillator,
    output: O,
    echo: Option<Box<dyn Write>>,
    low_frequency: u32,
    high_frequency: u32,
    bit_duration_ms: u32,
    characters_sent: u64,
}

impl<O: SampleSink> Transmitter<O> {
    pub fn new(config: &Config, output: O) -> Result<Self> {
        config.validate()?;
        let table = ToneTable::build(config.table_size, config.volume)?;

        log::debug!(
            "transmitter: space {} Hz, mark {} Hz, {} ms/bit",
            config.low_frequency,
            config.high_frequency(),
            config.bit_duration_ms()
        );

        Ok(Self {
            encoder: BaudotEncoder::new(config.column_limit),
            oscillator: Oscillator::new(table, config.sample_rate),
            output,
            echo: None,
            low_frequency: config.low_frequency,
            high_frequency: config.high_frequency(),
            bit_duration_ms: config.bit_duration_ms(),
            characters_sent: 0,
        })
    }

    /// Mirrors transmitted text, upper-cased as the printer would show it.
    pub fn with_echo(mut self, echo: Box<dyn Write>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn encoder(&self) -> &BaudotEncoder {
        &self.encoder
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn characters_sent(&self) -> u64 {
        self.characters_sent
    }

    pub fn into_output(self) -> O {
        self.output
    }

    pub fn encode_bit(&mut self, bit: bool) -> Result<()> {
        let frequency = if bit {
            self.high_frequency
        } else {
            self.low_frequency
        };
        self.oscillator
            .render(frequency, self.bit_duration_ms, &mut self.output)
    }

    /// Sends the framed bits of one Baudot code. Unknown codes are skipped.
    pub fn send_code(&mut self, code: u8) -> Result<()> {
        if let Some(bits) = baudot::frame_bits(code) {
            for bit in bits {
                self.encode_bit(bit)?;
            }
        }
        Ok(())
    }

    fn send_codes(&mut self, codes: &[u8]) -> Result<()> {
        for &code in codes {
            self.send_code(code)?;
        }
        Ok(())
    }

    fn echo(&mut self, text: &str) -> Result<()> {
        if let Some(echo) = self.echo.as_mut() {
            echo.write_all(text.as_bytes())?;
            echo.flush()?;
        }
        Ok(())
    }

    pub fn send_char(&mut self, c: char) -> Result<()> {
        let encoded = self.encoder.encode_char(c);
        self.send_codes(&encoded.codes)?;
        self.characters_sent += 1;

        if is_printable(c) {
            if c == '\n' || c == '\r' {
                self.echo("\r\n")?;
            } else {
                self.echo(&c.to_ascii_uppercase().to_string())?;
            }
        }
        if encoded.line_wrapped {
            self.echo("\r\n")?;
        }
        Ok(())
    }

    pub fn send_text<I: IntoIterator<Item = char>>(&mut self, text: I) -> Result<()> {
        for c in text {
            self.send_char(c)?;
        }
        Ok(())
    }

    /// Explicit carriage return and line feed from the operator.
    pub fn new_line(&mut self) -> Result<()> {
        self.send_codes(&[CR, LF])?;
        self.encoder.reset_column();
        self.echo("\r\n")
    }

    /// Streams lines from `reader` byte by byte, skipping characters that
    /// cannot be printed. Input need not be UTF-8. A read error ends the
    /// text but is not fatal to the transmission. Returns the number of
    /// lines sent.
    pub fn send_lines<R: BufRead>(&mut self, mut reader: R) -> Result<usize> {
        let mut line = Vec::new();
        let mut lines = 0;
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text: Vec<char> = line
                        .iter()
                        .map(|&b| char::from(b))
                        .filter(|&c| is_printable(c))
                        .collect();
                    self.send_text(text)?;
                    lines += 1;
                }
                Err(e) => {
                    log::error!("stopped reading input after {} lines: {}", lines, e);
                    break;
                }
            }
        }
        Ok(lines)
    }

    /// Steady mark tone.
    pub fn hold_mark(&mut self, duration_ms: u32) -> Result<()> {
        self.oscillator
            .render(self.high_frequency, duration_ms, &mut self.output)
    }

    /// Steady space tone.
    pub fn hold_space(&mut self, duration_ms: u32) -> Result<()> {
        self.oscillator
            .render(self.low_frequency, duration_ms, &mut self.output)
    }

    /// Queues mark tone ahead of the first character: a steady stretch,
    /// then whole CLOSED characters.
    pub fn preroll(&mut self) -> Result<()> {
        self.hold_mark(PREROLL_MS)?;
        for _ in 0..PREROLL_CLOSED {
            self.send_code(CLOSED)?;
        }
        Ok(())
    }

    /// Synchronization preamble: puts the receiving machine in letters mode
    /// at the start of a fresh line.
    pub fn begin(&mut self) -> Result<()> {
        self.encoder.reset();
        self.send_codes(&[NULL, NULL, LTRS, CR, LF])
    }

    /// Closes the last line and sends the idle trailer.
    pub fn end(&mut self) -> Result<()> {
        self.send_codes(&[CR, LF])?;
        self.encoder.reset();
        self.idle(TRAILER_LENGTH)?;
        log::info!("transmission ended after {} characters", self.characters_sent);
        Ok(())
    }

    pub fn idle(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.send_code(NULL)?;
        }
        Ok(())
    }

    pub fn transmit<I: IntoIterator<Item = char>>(&mut self, text: I) -> Result<()> {
        self.begin()?;
        self.send_text(text)?;
        self.end()
    }

    /// Fox and RY/SG test lines, then a long mark for tuning.
    pub fn send_test_pattern(&mut self) -> Result<()> {
        self.begin()?;
        self.send_text(TEST_PATTERN.chars())?;
        self.begin()?;
        self.hold_mark(TEST_PATTERN_TAIL_MS)
    }

    /// Idle characters needed to cover at least `duration`.
    fn keepalive_characters(&self, duration: Duration) -> usize {
        let character_ms = u128::from(self.bit_duration_ms) * BITS_PER_CHARACTER as u128;
        let wanted = duration.as_millis();
        ((wanted + character_ms - 1) / character_ms).max(1) as usize
    }

    /// Tops up the sink with idle characters when less than half of its
    /// buffer is queued. Returns whether anything was rendered.
    pub fn keep_alive(&mut self, duration: Duration) -> Result<bool> {
        let low_water = self.output.buffer_frames() / 2;
        if self.output.available_headroom() <= low_water {
            return Ok(false);
        }
        let count = self.keepalive_characters(duration);
        log::trace!("keep-alive: {} idle characters", count);
        self.idle(count)?;
        Ok(true)
    }

    /// Sends keys as they are typed until the terminator or end of input,
    /// keeping the sink fed while the operator pauses.
    pub fn run_interactive<K: KeySource>(&mut self, keys: &mut K, policy: &PollPolicy) -> Result<()> {
        log::info!("interactive mode, terminator {:?}", policy.terminator);
        loop {
            match keys.poll_key(policy.input_timeout)? {
                KeyEvent::Key(c) if c == policy.terminator => break,
                KeyEvent::Key('\r') | KeyEvent::Key('\n') => self.new_line()?,
                KeyEvent::Key(c) => self.send_char(c)?,
                KeyEvent::Idle => {
                    self.keep_alive(policy.keepalive)?;
                }
                KeyEvent::Closed => break,
            }
        }
        Ok(())
    }
}
