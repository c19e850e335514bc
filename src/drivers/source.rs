use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::handoff::SampleSender;
use crate::drivers::protocol::{ProtocolLink, MAX_MOTOR_HZ, MIN_MOTOR_HZ};
use crate::drivers::BenchError;
use crate::types::{ConnectionMode, RawSample};
/// Simulation step, also the nominal tick period.
pub const SIM_STEP_MS: f64 = 10.0;
pub const DEFAULT_AMPLITUDE_MM: f64 = 50.0;
/// Hardware poll period; keeps the serial line from saturating.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
// Peak-to-peak noise is twice this, in kgf.
const SIM_NOISE_KGF: f64 = 2.5;
// Smallest step between two hardware timestamps.
const MIN_TICK_MS: f64 = 0.001;
const COMPRESSION_DAMPING: f64 = 0.15;
const EXPANSION_DAMPING: f64 = 0.25;
/// Anything that produces raw (position, force) pairs on its own thread.
///
/// `start` hands the source the producer end of the hand-off; `stop` returns only after
/// the production thread has exited, so no sample is delivered after it returns.
pub trait SampleSource: Send {
    fn mode(&self) -> ConnectionMode;
    fn start(&mut self, sink: SampleSender) -> Result<(), BenchError>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Takes effect on the next tick, never resets the time base.
    fn set_frequency(&mut self, hz: f64) -> Result<(), BenchError>;
    fn frequency(&self) -> f64;
}
/// Clamp a requested frequency into the supported motor range.
pub fn clamp_frequency(hz: f64) -> Result<f64, BenchError> {
    if !hz.is_finite() {
        return Err(BenchError::InvalidFrequency(hz));
    }
    Ok(hz.clamp(MIN_MOTOR_HZ, MAX_MOTOR_HZ))
}
/// Frequency shared between the owner and its production thread.
#[derive(Clone)]
struct SharedFrequency(Arc<AtomicU64>);
impl SharedFrequency {
    fn new(hz: f64) -> Self {
        Self(Arc::new(AtomicU64::new(hz.to_bits())))
    }
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
    fn set(&self, hz: f64) {
        self.0.store(hz.to_bits(), Ordering::Relaxed);
    }
}
/// Damper physics behind the simulated bench, one fixed step at a time.
pub struct SimulationModel {
    amplitude_mm: f64,
    t_ms: f64,
    rng: StdRng,
}
impl SimulationModel {
    pub fn new(amplitude_mm: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            amplitude_mm,
            t_ms: 0.0,
            rng,
        }
    }
    pub fn elapsed_ms(&self) -> f64 {
        self.t_ms
    }
    /// Produce the sample at the current time, then advance by one step.
    pub fn step(&mut self, frequency_hz: f64) -> RawSample {
        let t_s = self.t_ms / 1000.0;
        let omega = TAU * frequency_hz;
        let position = self.amplitude_mm * (omega * t_s).sin();
        let velocity = self.amplitude_mm * omega * (omega * t_s).cos();
        let noise = self.rng.gen_range(-1.0..=1.0) * SIM_NOISE_KGF;
        let force = velocity * damping(velocity) + noise;
        let sample = RawSample::new(self.t_ms, position, force);
        self.t_ms += SIM_STEP_MS;
        sample
    }
}
/// Expansion damping (0.25) is higher than compression damping (0.15), giving an
/// asymmetric loop.
fn damping(velocity: f64) -> f64 {
    if velocity > 0.0 {
        COMPRESSION_DAMPING
    } else {
        EXPANSION_DAMPING
    }
}
/// Physics generator standing in for the rig.
///
/// The model, and with it the time base, survives stop and restart.
pub struct SimulatedSource {
    amplitude_mm: f64,
    seed: Option<u64>,
    model: Option<SimulationModel>,
    frequency: SharedFrequency,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<SimulationModel>>,
}
impl SimulatedSource {
    pub fn new(frequency_hz: f64, amplitude_mm: f64) -> Result<Self, BenchError> {
        Ok(Self {
            amplitude_mm,
            seed: None,
            model: Some(SimulationModel::new(amplitude_mm, None)),
            frequency: SharedFrequency::new(clamp_frequency(frequency_hz)?),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
    /// Deterministic noise, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.model = Some(SimulationModel::new(self.amplitude_mm, self.seed));
        self
    }
}
impl SampleSource for SimulatedSource {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::Simulation
    }
    fn start(&mut self, sink: SampleSender) -> Result<(), BenchError> {
        if self.worker.is_some() {
            return Err(BenchError::SourceRunning);
        }
        let mut model = match self.model.take() {
            Some(model) => model,
            None => SimulationModel::new(self.amplitude_mm, self.seed),
        };
        let frequency = self.frequency.clone();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);
        info!("simulation started at {:.2} Hz", frequency.get());
        self.worker = Some(thread::spawn(move || {
            let tick = Duration::from_secs_f64(SIM_STEP_MS / 1000.0);
            let mut next = Instant::now();
            while running.load(Ordering::SeqCst) {
                if !sink.send(model.step(frequency.get())) {
                    debug!("sample consumer went away, simulation stops");
                    break;
                }
                next += tick;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    // fell behind, do not try to catch up with a burst
                    next = now;
                }
            }
            model
        }));
        Ok(())
    }
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(model) => self.model = Some(model),
                Err(_) => error!("simulation thread panicked, time base restarts"),
            }
            info!("simulation stopped");
        }
    }
    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
    fn set_frequency(&mut self, hz: f64) -> Result<(), BenchError> {
        self.frequency.set(clamp_frequency(hz)?);
        Ok(())
    }
    fn frequency(&self) -> f64 {
        self.frequency.get()
    }
}
impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}
/// Second channel for the hardware source.
///
/// The controller command set exposes no position read, so position comes from a
/// pluggable reader.
pub trait PositionChannel: Send {
    fn read_position(&mut self, t_ms: f64, frequency_hz: f64) -> f64;
}
/// Constant position, e.g. a rig without a displacement sensor.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeldPosition(pub f64);
impl PositionChannel for HeldPosition {
    fn read_position(&mut self, _t_ms: f64, _frequency_hz: f64) -> f64 {
        self.0
    }
}
/// Ideal stroke of the crank at the commanded frequency.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticPosition {
    pub amplitude_mm: f64,
}
impl Default for SyntheticPosition {
    fn default() -> Self {
        Self {
            amplitude_mm: DEFAULT_AMPLITUDE_MM,
        }
    }
}
impl PositionChannel for SyntheticPosition {
    fn read_position(&mut self, t_ms: f64, frequency_hz: f64) -> f64 {
        self.amplitude_mm * (TAU * frequency_hz * t_ms / 1000.0).sin()
    }
}
/// Everything the poll thread owns while it runs.
struct PollLoop {
    link: ProtocolLink,
    position: Box<dyn PositionChannel>,
    // time of the last delivered sample; a restart continues from here
    clock_ms: f64,
}
/// Bench controller on the serial link.
///
/// Force comes from `C04Z`, position from the configured [`PositionChannel`]. A failed
/// poll drops that one sample and the loop carries on.
pub struct HardwareSource {
    parts: Option<PollLoop>,
    worker: Option<JoinHandle<PollLoop>>,
    poll_interval: Duration,
    frequency: SharedFrequency,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}
impl HardwareSource {
    /// `link` must already have completed its handshake.
    pub fn new(
        link: ProtocolLink,
        position: Box<dyn PositionChannel>,
        frequency_hz: f64,
        poll_interval: Duration,
    ) -> Result<Self, BenchError> {
        if !link.is_connected() {
            return Err(BenchError::LinkDown);
        }
        Ok(Self {
            parts: Some(PollLoop {
                link,
                position,
                clock_ms: 0.0,
            }),
            worker: None,
            poll_interval,
            frequency: SharedFrequency::new(clamp_frequency(frequency_hz)?),
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }
    /// Open `port_name`, handshake, and wrap the link.
    pub fn connect(
        port_name: &str,
        baud_rate: u32,
        position: Box<dyn PositionChannel>,
        frequency_hz: f64,
        poll_interval: Duration,
    ) -> Result<Self, BenchError> {
        let mut link = ProtocolLink::new();
        link.connect(port_name, baud_rate)?;
        Self::new(link, position, frequency_hz, poll_interval)
    }
    /// Polls that produced no sample since construction.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
    /// Stop polling and close the link. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.stop();
        if let Some(parts) = self.parts.as_mut() {
            parts.link.disconnect();
        }
    }
    pub fn is_connected(&self) -> bool {
        self.parts.as_ref().is_some_and(|p| p.link.is_connected())
    }
}
impl SampleSource for HardwareSource {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::Hardware
    }
    fn start(&mut self, sink: SampleSender) -> Result<(), BenchError> {
        if self.worker.is_some() {
            return Err(BenchError::SourceRunning);
        }
        let mut parts = self.parts.take().ok_or(BenchError::LinkDown)?;
        let mut applied_hz = self.frequency.get();
        if let Err(err) = parts.link.enable_motor(applied_hz) {
            self.parts = Some(parts);
            return Err(err);
        }
        let frequency = self.frequency.clone();
        let running = Arc::clone(&self.running);
        let dropped = Arc::clone(&self.dropped);
        let poll_interval = self.poll_interval;
        running.store(true, Ordering::SeqCst);
        self.worker = Some(thread::spawn(move || {
            let started = Instant::now();
            let base_ms = parts.clock_ms;
            while running.load(Ordering::SeqCst) {
                let wanted_hz = frequency.get();
                if wanted_hz.to_bits() != applied_hz.to_bits() {
                    match parts.link.enable_motor(wanted_hz) {
                        Ok(()) => applied_hz = wanted_hz,
                        Err(err) => warn!("could not retune motor to {wanted_hz} Hz: {err}"),
                    }
                }
                match parts.link.poll_data() {
                    Ok(force) => {
                        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                        let t_ms = (base_ms + elapsed_ms).max(parts.clock_ms + MIN_TICK_MS);
                        parts.clock_ms = t_ms;
                        let position = parts.position.read_position(t_ms, applied_hz);
                        if !sink.send(RawSample::new(t_ms, position, force)) {
                            debug!("sample consumer went away, polling stops");
                            break;
                        }
                    }
                    Err(reason) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("dropped sample: {reason:?}");
                    }
                }
                thread::sleep(poll_interval);
            }
            parts
        }));
        Ok(())
    }
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.join() {
            Ok(mut parts) => {
                if let Err(err) = parts.link.disable_motor() {
                    warn!("motor stop not confirmed: {err}");
                }
                self.parts = Some(parts);
                info!("hardware polling stopped");
            }
            Err(_) => error!("poll thread panicked, link lost"),
        }
    }
    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
    fn set_frequency(&mut self, hz: f64) -> Result<(), BenchError> {
        self.frequency.set(clamp_frequency(hz)?);
        Ok(())
    }
    fn frequency(&self) -> f64 {
        self.frequency.get()
    }
}
impl Drop for HardwareSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}
/// Replays a fixed list of samples as fast as the hand-off accepts them.
///
/// Useful for tests and for feeding a stored run back through the pipeline.
pub struct ManualSource {
    queue: VecDeque<RawSample>,
    frequency_hz: f64,
    running: bool,
}
impl ManualSource {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            frequency_hz: 1.0,
            running: false,
        }
    }
}
impl SampleSource for ManualSource {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::Simulation
    }
    fn start(&mut self, sink: SampleSender) -> Result<(), BenchError> {
        if self.running {
            return Err(BenchError::SourceRunning);
        }
        self.running = true;
        while let Some(sample) = self.queue.pop_front() {
            if !sink.send(sample) {
                break;
            }
        }
        Ok(())
    }
    fn stop(&mut self) {
        self.running = false;
    }
    fn is_running(&self) -> bool {
        self.running
    }
    fn set_frequency(&mut self, hz: f64) -> Result<(), BenchError> {
        self.frequency_hz = clamp_frequency(hz)?;
        Ok(())
    }
    fn frequency(&self) -> f64 {
        self.frequency_hz
    }
}
