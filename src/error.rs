use thiserror::Error;

#[derive(Error, Debug)]
pub enum RttyError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio sink underrun")]
    Underrun,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RttyError>;
