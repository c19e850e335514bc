// src/types.rs
use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};

use crate::drivers::{BenchError, FinishedRecording};

/// One reading as delivered by a sample source, before calibration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawSample {
    /// Milliseconds, monotonic, assigned by the producer.
    pub t: f64,
    /// Millimetres.
    pub raw_position: f64,
    /// Kilogram-force.
    pub raw_force: f64,
}

impl RawSample {
    pub fn new(t: f64, raw_position: f64, raw_force: f64) -> Self {
        Self {
            t,
            raw_position,
            raw_force,
        }
    }
}

/// Calibrated, derived and filtered sample.
///
/// The serde field names are the persisted wire contract: `t`, `position`, `force`,
/// `velocity`, all `f64`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub t: f64,
    pub position: f64,
    pub force: f64,
    pub velocity: f64,
}

// Which physical path feeds the pipeline
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}

/// Statistics shown next to the live curves.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LiveStats {
    pub max_compression: f64,
    pub max_expansion: f64,
    pub cycles: u64,
    pub frequency_hz: f64,
    pub recording: bool,
    pub viewing_history: bool,
    pub dropped_samples: u64,
}

/// Read-only copy of the live buffer channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiveFrame {
    pub time: Vec<f64>,
    pub position: Vec<f64>,
    pub force: Vec<f64>,
    pub velocity: Vec<f64>,
    pub stats: LiveStats,
}

// Commands sent from the front end into the engine thread
#[derive(Debug)]
pub enum BenchCommand {
    StartSource(Sender<Result<(), BenchError>>),
    StopSource(Sender<()>),
    SetFrequency(f64, Sender<Result<(), BenchError>>),
    Tare(Sender<bool>),
    StartRecording(Sender<Result<(), BenchError>>),
    StopRecording(Sender<Option<FinishedRecording>>),
    NewTest(Sender<Result<(), BenchError>>),
    ViewHistory(Vec<ProcessedSample>),
    LeaveHistory,
    SetReference(Option<Vec<ProcessedSample>>),
    Snapshot(Sender<LiveFrame>),
    Shutdown,
}

// Messages published by the engine thread
#[derive(Clone, Debug)]
pub enum BenchEvent {
    Log(String),
    SourceStatus(bool),
    RecordingStatus(bool),
    Frame(LiveFrame),
    History(Vec<ProcessedSample>),
}
