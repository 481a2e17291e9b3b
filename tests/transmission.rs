use rtty_tone_core::{
    baudot, AudioSink, Config, KeyEvent, Negotiated, Oscillator, PollPolicy, Result, RttyError,
    SampleBuffer, SampleFormat, ScriptedKeys, ToneTable, Transmitter,
};
use std::cell::Cell;
use std::rc::Rc;

/// In-memory sink that fails chosen writes with an underrun.
struct ScriptedSink {
    negotiated: Negotiated,
    bytes: Vec<u8>,
    fail_on: Vec<usize>,
    attempts: usize,
    recoveries: usize,
    headroom: Rc<Cell<usize>>,
}

impl ScriptedSink {
    fn new(config: &Config) -> Self {
        Self {
            negotiated: Negotiated::from(&config.stream_params()),
            bytes: Vec::new(),
            fail_on: Vec::new(),
            attempts: 0,
            recoveries: 0,
            headroom: Rc::new(Cell::new(0)),
        }
    }
}

impl AudioSink for ScriptedSink {
    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn write(&mut self, frames: &[u8]) -> Result<usize> {
        self.attempts += 1;
        if self.fail_on.contains(&self.attempts) {
            return Err(RttyError::Underrun);
        }
        self.bytes.extend_from_slice(frames);
        Ok(frames.len() / self.negotiated.frame_size)
    }

    fn available_headroom(&self) -> usize {
        self.headroom.get()
    }

    fn recover(&mut self) -> Result<()> {
        self.recoveries += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

fn reference_tones(config: &Config, bits: &[bool]) -> Vec<i16> {
    let table = ToneTable::build(config.table_size, config.volume).unwrap();
    let mut osc = Oscillator::new(table, config.sample_rate);
    let mut out: Vec<i16> = Vec::new();
    for &bit in bits {
        let frequency = if bit { 1120 } else { 950 };
        osc.render(frequency, 22, &mut out).unwrap();
    }
    out
}

#[test]
fn test_letters_render_their_frame_bits() {
    let config = Config::default();
    assert_eq!(config.low_frequency, 950);
    assert_eq!(config.high_frequency(), 1120);

    let mut tx = Transmitter::new(&config, Vec::<i16>::new()).unwrap();
    tx.send_text("AB".chars()).unwrap();

    // Letters mode is the initial state, so no LTRS precedes A.
    let mut bits = Vec::new();
    bits.extend(baudot::frame_bits(baudot::LETTER_A).unwrap());
    bits.extend(baudot::frame_bits(1).unwrap());
    assert_eq!(bits.len(), 16);

    let output = tx.into_output();
    assert_eq!(output.len(), 16 * 970);
    assert_eq!(output, reference_tones(&config, &bits));
}

#[test]
fn test_letters_after_figures_get_ltrs() {
    let config = Config::default();
    let mut tx = Transmitter::new(&config, Vec::<i16>::new()).unwrap();
    tx.send_text("5AB".chars()).unwrap();

    let mut bits = Vec::new();
    for code in [baudot::FIGS, 19, baudot::LTRS, 0, 1] {
        bits.extend(baudot::frame_bits(code).unwrap());
    }
    assert_eq!(tx.into_output(), reference_tones(&config, &bits));
}

#[test]
fn test_u8_output_through_sample_buffer() {
    let config = Config {
        format: SampleFormat::U8,
        ..Default::default()
    };
    let sink = ScriptedSink::new(&config);
    let buffer = SampleBuffer::new(sink, config.format).unwrap();
    let mut tx = Transmitter::new(&config, buffer).unwrap();
    tx.send_char('E').unwrap();

    let sink = tx.into_output().finish().unwrap();
    assert_eq!(sink.bytes.len(), 8 * 970);
    let expected: Vec<u8> = reference_tones(&config, &baudot::frame_bits(4).unwrap())
        .into_iter()
        .map(|s| (128 + (s >> 8)) as u8)
        .collect();
    assert_eq!(sink.bytes, expected);
}

#[test]
fn test_underrun_does_not_stop_transmission() {
    let config = Config::default();
    let mut sink = ScriptedSink::new(&config);
    sink.fail_on = vec![1, 3];
    let buffer = SampleBuffer::new(sink, config.format).unwrap();

    let mut tx = Transmitter::new(&config, buffer).unwrap();
    tx.transmit("RYRYRYRYRY".chars()).unwrap();

    let buffer = tx.into_output();
    assert_eq!(buffer.underruns(), 2);
    let sink = buffer.finish().unwrap();
    assert_eq!(sink.recoveries, 2);

    // 27 characters of 8 bits at 970 samples, minus two dropped periods.
    let total_frames = 27 * 8 * 970;
    let period = 4410;
    assert_eq!(sink.bytes.len() / 2, total_frames - 2 * period);
}

#[test]
fn test_keep_alive_follows_sink_headroom() {
    let config = Config::default();
    let sink = ScriptedSink::new(&config);
    let headroom = Rc::clone(&sink.headroom);
    let buffer = SampleBuffer::new(sink, config.format).unwrap();
    let mut tx = Transmitter::new(&config, buffer).unwrap();

    // Sink more than half full: polls time out without rendering.
    headroom.set(1000);
    let mut keys = ScriptedKeys::new([KeyEvent::Idle, KeyEvent::Idle]);
    tx.run_interactive(&mut keys, &PollPolicy::default()).unwrap();
    assert_eq!(tx.output().pending_frames(), 0);
    assert_eq!(tx.output().periods_written(), 0);

    // Sink nearly empty: each idle poll adds one NULL character.
    headroom.set(20000);
    let mut keys = ScriptedKeys::new([KeyEvent::Idle, KeyEvent::Idle]);
    tx.run_interactive(&mut keys, &PollPolicy::default()).unwrap();
    let sink = tx.into_output().finish().unwrap();
    assert_eq!(sink.bytes.len() / 2, 2 * 8 * 970);
}
