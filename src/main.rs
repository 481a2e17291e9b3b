use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rtty_tone_core::{
    audio::{list_audio_devices, CpalSink},
    input::words_to_text,
    sink::{AudioSink, RawSink, WavSink},
    Config, PollPolicy, SampleBuffer, SampleFormat, ShiftWidth, Speed, Transmitter,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

#[derive(Parser)]
#[command(name = "rtty-tone")]
#[command(about = "Radio Teletype (RTTY) AFSK tone generator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ToneArgs {
    /// Teletype speed in words per minute (60, 66, 75 or 100)
    #[arg(long, default_value = "60", value_parser = parse_wpm)]
    wpm: Speed,

    /// Distance from space to mark tone in Hz (170, 425 or 850)
    #[arg(long, default_value = "170", value_parser = parse_shift)]
    shift: ShiftWidth,

    /// Space (low) tone frequency in Hz
    #[arg(long, default_value = "950", value_parser = clap::value_parser!(u32).range(500..=3000))]
    freq: u32,

    /// Volume level (0 - 100)
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: u8,

    /// Bits per sample (8 or 16)
    #[arg(long, default_value = "16", value_parser = parse_bits)]
    bits: SampleFormat,

    /// Sample rate in Hz
    #[arg(long, default_value = "44100", value_parser = clap::value_parser!(u32).range(5000..=48000))]
    rate: u32,

    /// Output device name, "-" for raw PCM on stdout, or a path ending in .wav
    #[arg(short, long, default_value = "default")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit text as RTTY tones
    Send {
        #[command(flatten)]
        tone: ToneArgs,

        /// Read text from a file
        #[arg(short, long, conflicts_with_all = ["keyboard", "test_data"])]
        input_file: Option<String>,

        /// Send keys as they are typed; Ctrl-D ends the session
        #[arg(short, long, conflicts_with = "test_data")]
        keyboard: bool,

        /// Send the quick brown fox and RY test pattern
        #[arg(long)]
        test_data: bool,

        /// Text to send
        #[arg(conflicts_with_all = ["input_file", "keyboard", "test_data"])]
        text: Vec<String>,
    },

    /// Hold a steady tone for setting transmitter audio levels
    Tune {
        #[command(flatten)]
        tone: ToneArgs,

        /// Duration in milliseconds
        #[arg(long, default_value = "5000")]
        duration: u32,

        /// Send the space tone instead of mark
        #[arg(long)]
        space: bool,
    },

    /// List available audio output devices
    Devices,
}

fn parse_wpm(value: &str) -> std::result::Result<Speed, String> {
    value
        .parse()
        .ok()
        .and_then(Speed::from_wpm)
        .ok_or_else(|| format!("{} is not one of 60, 66, 75, 100", value))
}

fn parse_shift(value: &str) -> std::result::Result<ShiftWidth, String> {
    value
        .parse()
        .ok()
        .and_then(ShiftWidth::from_hz)
        .ok_or_else(|| format!("{} is not one of 170, 425, 850", value))
}

fn parse_bits(value: &str) -> std::result::Result<SampleFormat, String> {
    value
        .parse()
        .ok()
        .and_then(SampleFormat::from_bits)
        .ok_or_else(|| format!("{} is not 8 or 16", value))
}

impl ToneArgs {
    fn config(&self) -> Result<Config> {
        let config = Config {
            sample_rate: self.rate,
            format: self.bits,
            low_frequency: self.freq,
            shift: self.shift,
            speed: self.wpm,
            volume: self.volume,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn open_sink(output: &str, config: &Config) -> Result<Box<dyn AudioSink>> {
    let params = config.stream_params();
    let sink: Box<dyn AudioSink> = if output == "-" {
        Box::new(RawSink::new(io::stdout().lock(), &params))
    } else if output.to_ascii_lowercase().ends_with(".wav") {
        Box::new(
            WavSink::create(output, &params)
                .with_context(|| format!("Failed to create {}", output))?,
        )
    } else {
        Box::new(
            CpalSink::open(Some(output), &params)
                .with_context(|| format!("Failed to open audio device {}", output))?,
        )
    };
    Ok(sink)
}

fn transmitter(tone: &ToneArgs) -> Result<Transmitter<SampleBuffer<Box<dyn AudioSink>>>> {
    let config = tone.config()?;
    let sink = open_sink(&tone.output, &config)?;
    let buffer = SampleBuffer::new(sink, config.format)?;

    eprintln!(
        "Space {} Hz, mark {} Hz, {} WPM ({} ms/bit), {}-bit at {} Hz",
        config.low_frequency,
        config.high_frequency(),
        config.speed.wpm(),
        config.bit_duration_ms(),
        config.format.bits(),
        config.sample_rate
    );

    let tx = Transmitter::new(&config, buffer)?.with_echo(Box::new(io::stderr()));
    Ok(tx)
}

fn finish(tx: Transmitter<SampleBuffer<Box<dyn AudioSink>>>) -> Result<()> {
    let buffer = tx.into_output();
    let underruns = buffer.underruns();
    buffer.finish().context("Failed to drain audio output")?;
    if underruns > 0 {
        eprintln!("Audio underran {} times", underruns);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            tone,
            input_file,
            keyboard,
            test_data,
            text,
        } => {
            // Fail on a missing file before any audio is produced.
            let reader = match input_file.as_deref() {
                Some(path) => Some(open_input(path)?),
                None => None,
            };

            if !keyboard && !test_data && reader.is_none() && text.is_empty() {
                eprintln!("Error: No text to send");
                std::process::exit(1);
            }

            let mut tx = transmitter(&tone)?;
            tx.preroll()?;

            if test_data {
                tx.send_test_pattern()?;
            } else {
                tx.begin()?;
                if keyboard {
                    send_keyboard(&mut tx)?;
                } else if let Some(reader) = reader {
                    let lines = tx.send_lines(reader)?;
                    log::info!("sent {} lines", lines);
                } else {
                    tx.send_text(words_to_text(&text).chars())?;
                }
                tx.end()?;
            }

            finish(tx)?;
            eprintln!("\r\nTransmission complete!");
        }

        Commands::Tune {
            tone,
            duration,
            space,
        } => {
            let mut tx = transmitter(&tone)?;
            if space {
                tx.hold_space(duration)?;
            } else {
                tx.hold_mark(duration)?;
            }
            finish(tx)?;
        }

        Commands::Devices => {
            let devices = list_audio_devices();
            println!("Available output devices:");
            for device in devices {
                println!("  {}", device);
            }
        }
    }

    Ok(())
}

fn open_input(path: &str) -> Result<BufReader<File>> {
    let file = File::open(Path::new(path)).with_context(|| format!("Failed to open {}", path))?;
    Ok(BufReader::new(file))
}

#[cfg(unix)]
fn send_keyboard<O: rtty_tone_core::SampleSink>(tx: &mut Transmitter<O>) -> Result<()> {
    let mut keys = rtty_tone_core::Keyboard::open().context("Failed to set up the terminal")?;
    eprintln!("Type to transmit, Ctrl-D to finish.\r");
    tx.run_interactive(&mut keys, &PollPolicy::default())?;
    Ok(())
}

#[cfg(not(unix))]
fn send_keyboard<O: rtty_tone_core::SampleSink>(_tx: &mut Transmitter<O>) -> Result<()> {
    anyhow::bail!("Keyboard mode needs a Unix terminal")
}
