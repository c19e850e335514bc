/// Running force extrema for the active session.
///
/// Both peaks start at zero, so a session that only ever pushes (or only pulls) keeps
/// the other peak at 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakTracker {
    max_compression: f64,
    max_expansion: f64,
}
impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn observe(&mut self, force: f64) {
        if force > self.max_compression {
            self.max_compression = force;
        }
        if force < self.max_expansion {
            self.max_expansion = force;
        }
    }
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    pub fn max_compression(&self) -> f64 {
        self.max_compression
    }
    pub fn max_expansion(&self) -> f64 {
        self.max_expansion
    }
    pub fn values(&self) -> PeakValues {
        PeakValues {
            max_compression: self.max_compression,
            max_expansion: self.max_expansion,
        }
    }
}
/// Frozen copy of the peaks, handed to persistence with a finished session.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakValues {
    pub max_compression: f64,
    pub max_expansion: f64,
}
/// Counts negative-to-positive crossings of calibrated position.
///
/// With a zero band an exactly-zero position changes nothing. A positive band requires
/// the position to clear `+band` to count and to drop below `-band` to re-arm, which
/// rejects chatter around zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleCounter {
    count: u64,
    in_positive_half: bool,
    band: f64,
}
impl CycleCounter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_hysteresis(band: f64) -> Self {
        Self {
            band: if band.is_finite() { band.abs() } else { 0.0 },
            ..Self::default()
        }
    }
    pub fn observe(&mut self, position: f64) {
        if position > self.band && !self.in_positive_half {
            self.in_positive_half = true;
            self.count += 1;
        } else if position < -self.band {
            self.in_positive_half = false;
        }
    }
    /// Zero the count; the band is kept.
    pub fn reset(&mut self) {
        self.count = 0;
        self.in_positive_half = false;
    }
    pub fn count(&self) -> u64 {
        self.count
    }
    pub fn in_positive_half(&self) -> bool {
        self.in_positive_half
    }
    pub fn band(&self) -> f64 {
        self.band
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn count_of(counter: &mut CycleCounter, positions: &[f64]) -> u64 {
        for &p in positions {
            counter.observe(p);
        }
        counter.count()
    }
    #[test]
    fn peaks_follow_extremes() {
        let mut peaks = PeakTracker::new();
        for f in [3.0, -2.0, 7.0, -9.0, 1.0] {
            peaks.observe(f);
        }
        assert_eq!(peaks.max_compression(), 7.0);
        assert_eq!(peaks.max_expansion(), -9.0);
    }
    #[test]
    fn reset_peaks_start_from_zero() {
        let mut peaks = PeakTracker::new();
        peaks.observe(12.0);
        peaks.observe(-4.0);
        peaks.reset();
        peaks.observe(0.5);
        assert_eq!(
            peaks.values(),
            PeakValues {
                max_compression: 0.5,
                max_expansion: 0.0
            }
        );
    }
    #[test]
    fn counts_full_crossings() {
        let mut counter = CycleCounter::new();
        assert_eq!(count_of(&mut counter, &[-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]), 3);
    }
    #[test]
    fn no_crossing_no_count() {
        let mut counter = CycleCounter::new();
        assert_eq!(count_of(&mut counter, &[1.0, 1.0, 1.0]), 0);
    }
    #[test]
    fn exact_zero_changes_nothing() {
        // 1 counts, 0 holds, -1 re-arms, 0 holds, 1 counts again.
        let mut counter = CycleCounter::new();
        assert_eq!(count_of(&mut counter, &[0.0, 1.0, 0.0, -1.0, 0.0, 1.0]), 2);
    }
    #[test]
    fn starting_positive_counts_once() {
        // A run that starts on the positive side counts its first half as a cycle.
        let mut counter = CycleCounter::new();
        assert_eq!(count_of(&mut counter, &[1.0, -1.0, 1.0]), 2);
    }
    #[test]
    fn hysteresis_band_keeps_reference_vectors() {
        let mut counter = CycleCounter::with_hysteresis(0.5);
        assert_eq!(count_of(&mut counter, &[-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]), 3);
        let mut counter = CycleCounter::with_hysteresis(0.5);
        assert_eq!(count_of(&mut counter, &[0.0, 1.0, 0.0, -1.0, 0.0, 1.0]), 2);
    }
    #[test]
    fn hysteresis_band_rejects_chatter() {
        let chatter = [-1.0, 0.2, -0.1, 0.3, -0.2, 0.1, 1.0, 0.1, -0.3, 0.4];
        let mut plain = CycleCounter::new();
        assert_eq!(count_of(&mut plain, &chatter), 4);
        let mut banded = CycleCounter::with_hysteresis(0.5);
        assert_eq!(count_of(&mut banded, &chatter), 1);
    }
    #[test]
    fn reset_keeps_band() {
        let mut counter = CycleCounter::with_hysteresis(-0.25);
        counter.observe(1.0);
        counter.reset();
        assert_eq!(counter.count(), 0);
        assert!(!counter.in_positive_half());
        assert_eq!(counter.band(), 0.25);
    }
}
