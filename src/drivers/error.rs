use thiserror::Error;
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("frequency {0} Hz is outside the supported range 0.1..=10.0")]
    InvalidFrequency(f64),
    #[error("invalid frequency sweep: {0}")]
    InvalidSweep(String),
    #[error("live buffer capacity {0} is not supported")]
    InvalidCapacity(usize),
    #[error("configuration rejected: {0}")]
    InvalidConfig(String),
    #[error("a recording session is already active")]
    RecordingActive,
    #[error("sample source is already running")]
    SourceRunning,
    #[error("hardware link is not connected")]
    LinkDown,
    #[error("handshake rejected, device replied {0:?}")]
    Handshake(String),
    #[error("link error: {0}")]
    Link(String),
    #[error("failed to open serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode sample payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("stored sample payload is empty")]
    EmptyPayload,
    #[error("no stored session with id {0}")]
    SessionNotFound(String),
    #[error("processing engine is no longer running")]
    EngineStopped,
}
