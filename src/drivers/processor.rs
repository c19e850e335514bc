use crate::drivers::filter::FilterWindow;
use crate::types::{ProcessedSample, RawSample};
/// Tare offsets subtracted from every raw sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationState {
    pub offset_position: f64,
    pub offset_force: f64,
}
impl CalibrationState {
    pub fn apply(&self, raw: &RawSample) -> (f64, f64) {
        (
            raw.raw_position - self.offset_position,
            raw.raw_force - self.offset_force,
        )
    }
}
/// Per-sample transform: calibration, discrete derivative, moving average.
///
/// Output depends only on the input sequence and the processor state, so replaying the
/// same samples into two processors built the same way yields identical results.
#[derive(Clone, Debug, Default)]
pub struct SignalProcessor {
    calibration: CalibrationState,
    last_position: f64,
    last_time: f64,
    // calibrated, pre-filter values of the most recent sample
    last_calibrated: Option<(f64, f64)>,
    velocity_window: FilterWindow,
    force_window: FilterWindow,
}
impl SignalProcessor {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_calibration(calibration: CalibrationState) -> Self {
        Self {
            calibration,
            ..Self::default()
        }
    }
    pub fn calibration(&self) -> CalibrationState {
        self.calibration
    }
    pub fn process(&mut self, raw: &RawSample) -> ProcessedSample {
        let (position, force) = self.calibration.apply(raw);
        let dt = raw.t - self.last_time;
        let velocity_raw = if dt > 0.0 {
            (position - self.last_position) / dt
        } else {
            0.0
        };
        self.last_position = position;
        self.last_time = raw.t;
        self.last_calibrated = Some((position, force));
        ProcessedSample {
            t: raw.t,
            position,
            force: self.force_window.filter(force),
            velocity: self.velocity_window.filter(velocity_raw),
        }
    }
    /// Make the most recent reading the new zero.
    ///
    /// Returns `false` when no sample has been processed yet. The filter windows are
    /// emptied and the derivative state is rebased so the next sample starts clean in
    /// the new frame.
    pub fn tare(&mut self) -> bool {
        let Some((position, force)) = self.last_calibrated else {
            return false;
        };
        self.calibration.offset_position += position;
        self.calibration.offset_force += force;
        self.last_position -= position;
        self.last_calibrated = Some((0.0, 0.0));
        self.velocity_window.clear();
        self.force_window.clear();
        true
    }
}
