// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::drivers::buffer::{MAX_LIVE_CAPACITY, MIN_LIVE_CAPACITY};
use crate::drivers::pipeline::PipelineSettings;
use crate::drivers::protocol::{DEFAULT_BAUD_RATE, MAX_MOTOR_HZ, MIN_MOTOR_HZ};
use crate::drivers::source::{
    HardwareSource, HeldPosition, PositionChannel, SampleSource, SimulatedSource,
    SyntheticPosition, DEFAULT_AMPLITUDE_MM,
};
use crate::drivers::BenchError;
use crate::engine::{EngineSettings, DEFAULT_EVENT_CAPACITY, DEFAULT_QUEUE_CAPACITY};
// Above this the rig shakes hard enough that a typo is more likely than intent.
const CAUTION_HZ: f64 = 5.0;
// Slack for accumulated float error when stepping a sweep.
const SWEEP_EPSILON: f64 = 0.001;
/// Longest sweep a plan may expand to.
pub const MAX_SWEEP_STEPS: usize = 1000;
/// Which frequencies a test runs at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrequencyPlan {
    Single {
        hz: f64,
    },
    Sweep {
        start_hz: f64,
        end_hz: f64,
        step_hz: f64,
    },
}
impl Default for FrequencyPlan {
    fn default() -> Self {
        FrequencyPlan::Single { hz: 1.0 }
    }
}
impl FrequencyPlan {
    /// Expand into the ordered list of frequencies, validating each one.
    pub fn frequencies(&self) -> Result<Vec<f64>, BenchError> {
        let list = match *self {
            FrequencyPlan::Single { hz } => vec![hz],
            FrequencyPlan::Sweep {
                start_hz,
                end_hz,
                step_hz,
            } => {
                for hz in [start_hz, end_hz] {
                    if !hz.is_finite() || !(MIN_MOTOR_HZ..=MAX_MOTOR_HZ).contains(&hz) {
                        return Err(BenchError::InvalidFrequency(hz));
                    }
                }
                if !(step_hz > 0.0) || !step_hz.is_finite() {
                    return Err(BenchError::InvalidSweep(format!(
                        "step must be a positive number, got {step_hz}"
                    )));
                }
                if start_hz > end_hz {
                    return Err(BenchError::InvalidSweep(format!(
                        "start {start_hz} Hz is above end {end_hz} Hz"
                    )));
                }
                let steps = ((end_hz + SWEEP_EPSILON - start_hz) / step_hz).floor() + 1.0;
                if start_hz + step_hz == start_hz || steps > MAX_SWEEP_STEPS as f64 {
                    return Err(BenchError::InvalidSweep(format!(
                        "step {step_hz} Hz gives more than {MAX_SWEEP_STEPS} steps"
                    )));
                }
                let mut list = Vec::with_capacity(steps as usize);
                let mut v = start_hz;
                while v <= end_hz + SWEEP_EPSILON && list.len() < MAX_SWEEP_STEPS {
                    list.push((v * 100.0).round() / 100.0);
                    v += step_hz;
                }
                list
            }
        };
        for &hz in &list {
            if !hz.is_finite() || !(MIN_MOTOR_HZ..=MAX_MOTOR_HZ).contains(&hz) {
                return Err(BenchError::InvalidFrequency(hz));
            }
            if hz > CAUTION_HZ {
                warn!("{hz} Hz is above {CAUTION_HZ} Hz, check the rig before starting");
            }
        }
        Ok(list)
    }
    /// The frequency the source starts at.
    pub fn initial(&self) -> Result<f64, BenchError> {
        self.frequencies()?
            .first()
            .copied()
            .ok_or_else(|| BenchError::InvalidSweep("plan yields no frequency".into()))
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionConfig {
    /// Crank stroke computed from the commanded frequency.
    Synthetic { amplitude_mm: f64 },
    Held { position_mm: f64 },
}
impl Default for PositionConfig {
    fn default() -> Self {
        PositionConfig::Synthetic {
            amplitude_mm: DEFAULT_AMPLITUDE_MM,
        }
    }
}
impl PositionConfig {
    fn channel(&self) -> Box<dyn PositionChannel> {
        match *self {
            PositionConfig::Synthetic { amplitude_mm } => {
                Box::new(SyntheticPosition { amplitude_mm })
            }
            PositionConfig::Held { position_mm } => Box::new(HeldPosition(position_mm)),
        }
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Simulated {
        #[serde(default = "default_amplitude")]
        amplitude_mm: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
    Hardware {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default)]
        position: PositionConfig,
    },
}
impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated {
            amplitude_mm: DEFAULT_AMPLITUDE_MM,
            seed: None,
        }
    }
}
fn default_amplitude() -> f64 {
    DEFAULT_AMPLITUDE_MM
}
fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_poll_interval_ms() -> u64 {
    20
}
/// Everything the runner needs, loaded from a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub source: SourceConfig,
    pub frequency: FrequencyPlan,
    pub live_capacity: usize,
    pub queue_capacity: usize,
    pub frame_interval: usize,
    pub hysteresis_mm: f64,
    pub store_dir: PathBuf,
    pub run_seconds: f64,
    pub client: String,
    pub vehicle: String,
    pub notes: String,
    pub csv_export: Option<PathBuf>,
}
impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            frequency: FrequencyPlan::default(),
            live_capacity: MAX_LIVE_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            frame_interval: 1,
            hysteresis_mm: 0.0,
            store_dir: PathBuf::from("sessions"),
            run_seconds: 5.0,
            client: String::new(),
            vehicle: String::new(),
            notes: String::new(),
            csv_export: None,
        }
    }
}
impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path)?;
        let config: BenchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("configuration loaded from {}", path.display());
        Ok(config)
    }
    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, BenchError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
    pub fn validate(&self) -> Result<(), BenchError> {
        self.frequency.frequencies()?;
        if !(MIN_LIVE_CAPACITY..=MAX_LIVE_CAPACITY).contains(&self.live_capacity) {
            return Err(BenchError::InvalidCapacity(self.live_capacity));
        }
        if self.queue_capacity == 0 {
            return Err(BenchError::InvalidConfig("queue_capacity must be positive".into()));
        }
        if self.frame_interval == 0 {
            return Err(BenchError::InvalidConfig("frame_interval must be positive".into()));
        }
        if !self.hysteresis_mm.is_finite() || self.hysteresis_mm < 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "hysteresis_mm must be a non-negative number, got {}",
                self.hysteresis_mm
            )));
        }
        if !self.run_seconds.is_finite() || self.run_seconds < 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "run_seconds must be a non-negative number, got {}",
                self.run_seconds
            )));
        }
        if let SourceConfig::Hardware {
            port, baud_rate, ..
        } = &self.source
        {
            if port.trim().is_empty() {
                return Err(BenchError::InvalidConfig("hardware source needs a port".into()));
            }
            if *baud_rate == 0 {
                return Err(BenchError::InvalidConfig("baud_rate must be positive".into()));
            }
        }
        Ok(())
    }
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            pipeline: PipelineSettings {
                live_capacity: self.live_capacity,
                hysteresis_mm: self.hysteresis_mm,
            },
            queue_capacity: self.queue_capacity,
            frame_interval: self.frame_interval,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs_f64(self.run_seconds)
    }
    /// Construct the configured source. Hardware sources connect and handshake here.
    pub fn build_source(&self) -> Result<Box<dyn SampleSource>, BenchError> {
        let hz = self.frequency.initial()?;
        match &self.source {
            SourceConfig::Simulated { amplitude_mm, seed } => {
                let source = SimulatedSource::new(hz, *amplitude_mm)?;
                Ok(Box::new(match seed {
                    Some(seed) => source.with_seed(*seed),
                    None => source,
                }))
            }
            SourceConfig::Hardware {
                port,
                baud_rate,
                poll_interval_ms,
                position,
            } => Ok(Box::new(HardwareSource::connect(
                port,
                *baud_rate,
                position.channel(),
                hz,
                Duration::from_millis(*poll_interval_ms),
            )?)),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    fn sweep(start_hz: f64, end_hz: f64, step_hz: f64) -> FrequencyPlan {
        FrequencyPlan::Sweep {
            start_hz,
            end_hz,
            step_hz,
        }
    }
    #[test]
    fn sweep_includes_end_despite_float_error() {
        assert_eq!(
            sweep(0.5, 1.0, 0.1).frequencies().unwrap(),
            vec![0.5, 0.6, 0.7, 0.8, 0.9, 1.0]
        );
        assert_eq!(sweep(1.0, 2.0, 0.3).frequencies().unwrap(), vec![1.0, 1.3, 1.6, 1.9]);
        assert_eq!(sweep(2.0, 2.0, 1.0).frequencies().unwrap(), vec![2.0]);
    }
    #[test]
    fn bad_sweeps_are_rejected() {
        assert!(matches!(sweep(1.0, 2.0, 0.0).frequencies(), Err(BenchError::InvalidSweep(_))));
        assert!(matches!(sweep(1.0, 2.0, -0.5).frequencies(), Err(BenchError::InvalidSweep(_))));
        assert!(matches!(sweep(3.0, 2.0, 0.5).frequencies(), Err(BenchError::InvalidSweep(_))));
        assert!(matches!(
            sweep(8.0, 12.0, 2.0).frequencies(),
            Err(BenchError::InvalidFrequency(v)) if v == 12.0
        ));
    }
    #[test]
    fn degenerate_step_is_rejected_without_expanding() {
        assert!(matches!(sweep(1.0, 2.0, 1e-20).frequencies(), Err(BenchError::InvalidSweep(_))));
        assert!(matches!(sweep(1.0, 2.0, 1e-9).frequencies(), Err(BenchError::InvalidSweep(_))));
        assert!(matches!(
            sweep(1.0, 2.0, f64::INFINITY).frequencies(),
            Err(BenchError::InvalidSweep(_))
        ));
        assert!(matches!(
            sweep(0.0, 2.0, 0.1).frequencies(),
            Err(BenchError::InvalidFrequency(v)) if v == 0.0
        ));
        assert_eq!(sweep(0.1, 10.0, 0.01).frequencies().unwrap().len(), 991);
    }
    #[test]
    fn single_frequency_is_range_checked() {
        assert_eq!(FrequencyPlan::Single { hz: 2.5 }.initial().unwrap(), 2.5);
        assert!(FrequencyPlan::Single { hz: 0.0 }.frequencies().is_err());
        assert!(FrequencyPlan::Single { hz: f64::NAN }.frequencies().is_err());
        assert_eq!(sweep(0.5, 3.0, 0.5).initial().unwrap(), 0.5);
    }
    #[test]
    fn defaults_are_valid() {
        let config = BenchConfig::load_or_default(None).unwrap();
        assert_eq!(config.live_capacity, 1000);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.frame_interval, 1);
        assert_eq!(config.hysteresis_mm, 0.0);
    }
    #[test]
    fn loads_partial_json_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "source": {{ "kind": "hardware", "port": "/dev/ttyUSB0" }},
                "frequency": {{ "mode": "sweep", "start_hz": 1.0, "end_hz": 3.0, "step_hz": 1.0 }},
                "live_capacity": 600,
                "notes": "rear left"
            }}"#
        )
        .unwrap();
        let config = BenchConfig::load(file.path()).unwrap();
        assert_eq!(config.live_capacity, 600);
        assert_eq!(config.notes, "rear left");
        assert_eq!(config.frequency.frequencies().unwrap(), vec![1.0, 2.0, 3.0]);
        match config.source {
            SourceConfig::Hardware {
                port,
                baud_rate,
                poll_interval_ms,
                position,
            } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert_eq!(baud_rate, 9600);
                assert_eq!(poll_interval_ms, 20);
                assert_eq!(position, PositionConfig::default());
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
    #[test]
    fn rejects_out_of_range_settings() {
        let config = BenchConfig {
            live_capacity: 200,
            ..BenchConfig::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::InvalidCapacity(200))));
        let config = BenchConfig {
            frame_interval: 0,
            ..BenchConfig::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));
        let config = BenchConfig {
            source: SourceConfig::Hardware {
                port: " ".into(),
                baud_rate: 9600,
                poll_interval_ms: 20,
                position: PositionConfig::default(),
            },
            ..BenchConfig::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));
    }
    #[test]
    fn malformed_json_is_a_payload_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(BenchConfig::load(file.path()), Err(BenchError::Payload(_))));
    }
    #[test]
    fn builds_seeded_simulation() {
        let config = BenchConfig {
            source: SourceConfig::Simulated {
                amplitude_mm: 30.0,
                seed: Some(5),
            },
            frequency: FrequencyPlan::Single { hz: 2.0 },
            ..BenchConfig::default()
        };
        let source = config.build_source().unwrap();
        assert_eq!(source.frequency(), 2.0);
        assert!(!source.is_running());
    }
}
