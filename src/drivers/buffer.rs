use std::collections::VecDeque;
use std::time::SystemTime;
use crate::drivers::trackers::PeakValues;
use crate::drivers::BenchError;
use crate::types::{LiveFrame, LiveStats, ProcessedSample};
/// Smallest live window the front end is configured with.
pub const MIN_LIVE_CAPACITY: usize = 500;
/// Largest live window the front end is configured with.
pub const MAX_LIVE_CAPACITY: usize = 1000;
/// Rolling buffer of the last `capacity` processed samples, one queue per channel.
///
/// Feeds visualization only; nothing in here is ever persisted.
#[derive(Clone, Debug)]
pub struct LiveBuffer {
    time: VecDeque<f64>,
    position: VecDeque<f64>,
    force: VecDeque<f64>,
    velocity: VecDeque<f64>,
    capacity: usize,
}
impl LiveBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, BenchError> {
        if capacity == 0 {
            return Err(BenchError::InvalidCapacity(capacity));
        }
        Ok(Self {
            time: VecDeque::with_capacity(capacity),
            position: VecDeque::with_capacity(capacity),
            force: VecDeque::with_capacity(capacity),
            velocity: VecDeque::with_capacity(capacity),
            capacity,
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn push(&mut self, sample: &ProcessedSample) {
        if self.time.len() == self.capacity {
            self.time.pop_front();
            self.position.pop_front();
            self.force.pop_front();
            self.velocity.pop_front();
        }
        self.time.push_back(sample.t);
        self.position.push_back(sample.position);
        self.force.push_back(sample.force);
        self.velocity.push_back(sample.velocity);
    }
    pub fn clear(&mut self) {
        self.time.clear();
        self.position.clear();
        self.force.clear();
        self.velocity.clear();
    }
    pub fn time(&self) -> &VecDeque<f64> {
        &self.time
    }
    pub fn position(&self) -> &VecDeque<f64> {
        &self.position
    }
    pub fn force(&self) -> &VecDeque<f64> {
        &self.force
    }
    pub fn velocity(&self) -> &VecDeque<f64> {
        &self.velocity
    }
    pub fn last(&self) -> Option<ProcessedSample> {
        Some(ProcessedSample {
            t: *self.time.back()?,
            position: *self.position.back()?,
            force: *self.force.back()?,
            velocity: *self.velocity.back()?,
        })
    }
    pub fn frame(&self, stats: LiveStats) -> LiveFrame {
        LiveFrame {
            time: self.time.iter().copied().collect(),
            position: self.position.iter().copied().collect(),
            force: self.force.iter().copied().collect(),
            velocity: self.velocity.iter().copied().collect(),
            stats,
        }
    }
}
/// Samples captured between start and stop of one recording.
#[derive(Clone, Debug)]
pub struct RecordingSession {
    samples: Vec<ProcessedSample>,
    started_at: SystemTime,
}
impl RecordingSession {
    pub fn start() -> Self {
        Self {
            samples: Vec::new(),
            started_at: SystemTime::now(),
        }
    }
    pub fn push(&mut self, sample: ProcessedSample) {
        self.samples.push(sample);
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
    pub fn samples(&self) -> &[ProcessedSample] {
        &self.samples
    }
    /// Consume the session; the samples move out untouched.
    pub fn finish(self, peaks: PeakValues) -> FinishedRecording {
        FinishedRecording {
            samples: self.samples,
            started_at: self.started_at,
            stopped_at: SystemTime::now(),
            peaks,
        }
    }
}
/// Immutable result of a stopped recording, ready for persistence.
#[derive(Clone, Debug)]
pub struct FinishedRecording {
    pub samples: Vec<ProcessedSample>,
    pub started_at: SystemTime,
    pub stopped_at: SystemTime,
    pub peaks: PeakValues,
}
impl FinishedRecording {
    pub fn duration_ms(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0.0,
        }
    }
}
