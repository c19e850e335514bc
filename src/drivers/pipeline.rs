use crate::drivers::buffer::{FinishedRecording, LiveBuffer, RecordingSession, MAX_LIVE_CAPACITY};
use crate::drivers::processor::{CalibrationState, SignalProcessor};
use crate::drivers::trackers::{CycleCounter, PeakTracker, PeakValues};
use crate::drivers::BenchError;
use crate::types::{LiveFrame, LiveStats, ProcessedSample, RawSample};
/// Knobs the pipeline is built with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSettings {
    pub live_capacity: usize,
    pub hysteresis_mm: f64,
}
impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            live_capacity: MAX_LIVE_CAPACITY,
            hysteresis_mm: 0.0,
        }
    }
}
/// All per-sample state of the bench, owned by a single consumer.
///
/// Feeds every raw sample through calibration and filtering, then into the live window,
/// the trackers and (while recording) the active session. In history mode the live window
/// and the trackers are frozen; recording keeps going.
pub struct SignalPipeline {
    processor: SignalProcessor,
    peaks: PeakTracker,
    cycles: CycleCounter,
    live: LiveBuffer,
    session: Option<RecordingSession>,
    history: Option<Vec<ProcessedSample>>,
    reference: Option<Vec<ProcessedSample>>,
}
impl SignalPipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self, BenchError> {
        Ok(Self {
            processor: SignalProcessor::new(),
            peaks: PeakTracker::new(),
            cycles: CycleCounter::with_hysteresis(settings.hysteresis_mm),
            live: LiveBuffer::with_capacity(settings.live_capacity)?,
            session: None,
            history: None,
            reference: None,
        })
    }
    pub fn on_raw_sample(&mut self, raw: &RawSample) -> ProcessedSample {
        let processed = self.processor.process(raw);
        if self.history.is_none() {
            self.peaks.observe(processed.force);
            self.cycles.observe(processed.position);
            self.live.push(&processed);
        }
        if let Some(session) = self.session.as_mut() {
            session.push(processed);
        }
        processed
    }
    pub fn tare(&mut self) -> bool {
        self.processor.tare()
    }
    pub fn calibration(&self) -> CalibrationState {
        self.processor.calibration()
    }
    pub fn start_recording(&mut self) -> Result<(), BenchError> {
        if self.session.is_some() {
            return Err(BenchError::RecordingActive);
        }
        self.history = None;
        self.peaks.reset();
        self.session = Some(RecordingSession::start());
        Ok(())
    }
    /// Move the active session out, together with the peaks at this instant.
    pub fn stop_recording(&mut self) -> Option<FinishedRecording> {
        let session = self.session.take()?;
        Some(session.finish(self.peaks.values()))
    }
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }
    pub fn recorded_len(&self) -> usize {
        self.session.as_ref().map_or(0, RecordingSession::len)
    }
    /// Start over: clear the live window and zero peaks and cycle count.
    pub fn new_test(&mut self) -> Result<(), BenchError> {
        if self.session.is_some() {
            return Err(BenchError::RecordingActive);
        }
        self.history = None;
        self.live.clear();
        self.peaks.reset();
        self.cycles.reset();
        Ok(())
    }
    pub fn view_history(&mut self, samples: Vec<ProcessedSample>) {
        self.history = Some(samples);
    }
    pub fn leave_history(&mut self) {
        self.history = None;
    }
    pub fn history(&self) -> Option<&[ProcessedSample]> {
        self.history.as_deref()
    }
    pub fn is_viewing_history(&self) -> bool {
        self.history.is_some()
    }
    pub fn set_reference(&mut self, samples: Vec<ProcessedSample>) {
        self.reference = Some(samples);
    }
    pub fn clear_reference(&mut self) {
        self.reference = None;
    }
    pub fn reference(&self) -> Option<&[ProcessedSample]> {
        self.reference.as_deref()
    }
    pub fn live(&self) -> &LiveBuffer {
        &self.live
    }
    pub fn peaks(&self) -> PeakValues {
        self.peaks.values()
    }
    pub fn cycles(&self) -> u64 {
        self.cycles.count()
    }
    pub fn stats(&self) -> LiveStats {
        LiveStats {
            max_compression: self.peaks.max_compression(),
            max_expansion: self.peaks.max_expansion(),
            cycles: self.cycles.count(),
            recording: self.is_recording(),
            viewing_history: self.is_viewing_history(),
            ..LiveStats::default()
        }
    }
    pub fn frame(&self) -> LiveFrame {
        self.live.frame(self.stats())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn pipeline(capacity: usize) -> SignalPipeline {
        SignalPipeline::new(PipelineSettings {
            live_capacity: capacity,
            hysteresis_mm: 0.0,
        })
        .unwrap()
    }
    fn sine_samples(n: usize) -> Vec<RawSample> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 10.0;
                let phase = t / 1000.0 * std::f64::consts::TAU;
                RawSample::new(t, 50.0 * phase.sin(), 30.0 * phase.cos())
            })
            .collect()
    }
    #[test]
    fn recording_captures_exactly_samples_between_start_and_stop() {
        let mut p = pipeline(500);
        let samples = sine_samples(300);
        let mut expected = Vec::new();
        for (i, raw) in samples.iter().enumerate() {
            if i == 100 {
                p.start_recording().unwrap();
            }
            if i == 250 {
                let finished = p.stop_recording().unwrap();
                assert_eq!(finished.samples, expected);
            }
            let processed = p.on_raw_sample(raw);
            if (100..250).contains(&i) {
                expected.push(processed);
            }
        }
        assert!(!p.is_recording());
        assert!(p.stop_recording().is_none());
    }
    #[test]
    fn second_start_is_rejected() {
        let mut p = pipeline(500);
        p.start_recording().unwrap();
        assert!(matches!(p.start_recording(), Err(BenchError::RecordingActive)));
    }
    #[test]
    fn start_recording_resets_peaks_but_not_cycles() {
        let mut p = pipeline(500);
        for raw in sine_samples(250) {
            p.on_raw_sample(&raw);
        }
        let cycles = p.cycles();
        assert!(cycles >= 2);
        assert!(p.peaks().max_compression > 0.0);
        p.start_recording().unwrap();
        assert_eq!(p.peaks(), PeakValues::default());
        assert_eq!(p.cycles(), cycles);
    }
    #[test]
    fn history_mode_freezes_live_state_but_keeps_recording() {
        let mut p = pipeline(500);
        let samples = sine_samples(200);
        for raw in &samples[..50] {
            p.on_raw_sample(raw);
        }
        p.start_recording().unwrap();
        let live_len = p.live().len();
        let cycles = p.cycles();
        let peaks = p.peaks();
        p.view_history(vec![ProcessedSample {
            t: 0.0,
            position: 1.0,
            force: 2.0,
            velocity: 3.0,
        }]);
        for raw in &samples[50..] {
            p.on_raw_sample(raw);
        }
        assert_eq!(p.live().len(), live_len);
        assert_eq!(p.cycles(), cycles);
        assert_eq!(p.peaks(), peaks);
        assert_eq!(p.recorded_len(), 150);
        assert_eq!(p.history().map(<[_]>::len), Some(1));
        p.leave_history();
        p.on_raw_sample(&RawSample::new(2000.0, 0.0, 0.0));
        assert_eq!(p.live().len(), live_len + 1);
    }
    #[test]
    fn new_test_clears_live_state() {
        let mut p = pipeline(500);
        for raw in sine_samples(120) {
            p.on_raw_sample(&raw);
        }
        p.start_recording().unwrap();
        assert!(matches!(p.new_test(), Err(BenchError::RecordingActive)));
        p.stop_recording().unwrap();
        p.view_history(Vec::new());
        p.new_test().unwrap();
        assert!(p.live().is_empty());
        assert_eq!(p.cycles(), 0);
        assert_eq!(p.peaks(), PeakValues::default());
        assert!(!p.is_viewing_history());
    }
    #[test]
    fn live_window_is_bounded() {
        let mut p = pipeline(500);
        for raw in sine_samples(1200) {
            p.on_raw_sample(&raw);
        }
        assert_eq!(p.live().len(), 500);
        assert_eq!(p.live().time().front().copied(), Some(7000.0));
    }
    #[test]
    fn tare_through_pipeline_zeroes_next_sample() {
        let mut p = pipeline(500);
        for i in 0..30 {
            p.on_raw_sample(&RawSample::new(i as f64 * 10.0, 20.0, 15.0));
        }
        assert!(p.tare());
        let next = p.on_raw_sample(&RawSample::new(300.0, 20.0, 15.0));
        assert!(next.position.abs() < 1e-9);
        assert!(next.force.abs() < 1e-9);
        assert_eq!(p.calibration().offset_force, 15.0);
    }
    #[test]
    fn reference_is_independent_of_live_state() {
        let mut p = pipeline(500);
        assert!(p.reference().is_none());
        p.set_reference(vec![ProcessedSample {
            t: 1.0,
            position: 2.0,
            force: 3.0,
            velocity: 4.0,
        }]);
        p.new_test().unwrap();
        assert_eq!(p.reference().map(<[_]>::len), Some(1));
        p.clear_reference();
        assert!(p.reference().is_none());
    }
}
