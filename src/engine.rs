// src/engine.rs
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, error, info, warn};
use crate::drivers::handoff::{self, SampleReceiver, SampleSender};
use crate::drivers::pipeline::{PipelineSettings, SignalPipeline};
use crate::drivers::source::SampleSource;
use crate::drivers::{BenchError, FinishedRecording};
use crate::types::*;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub pipeline: PipelineSettings,
    /// Raw samples the hand-off holds before the oldest is dropped.
    pub queue_capacity: usize,
    /// Publish a live frame every N processed samples.
    pub frame_interval: usize,
    pub event_capacity: usize,
}
impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            frame_interval: 1,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
/// The consumer context: a single thread owning the pipeline and the active source.
pub struct Engine {
    pipeline: SignalPipeline,
    source: Box<dyn SampleSource>,
    handoff_tx: SampleSender,
    handoff_rx: SampleReceiver,
    events: Sender<BenchEvent>,
    frame_interval: usize,
    since_frame: usize,
}
impl Engine {
    /// Build the pipeline and start the consumer thread. The source is not started.
    pub fn spawn(
        source: Box<dyn SampleSource>,
        settings: EngineSettings,
    ) -> Result<EngineHandle, BenchError> {
        let pipeline = SignalPipeline::new(settings.pipeline)?;
        let (handoff_tx, handoff_rx) = handoff::bounded(settings.queue_capacity);
        let (cmd_tx, cmd_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::bounded(settings.event_capacity.max(1));
        let engine = Engine {
            pipeline,
            source,
            handoff_tx,
            handoff_rx,
            events: event_tx,
            frame_interval: settings.frame_interval.max(1),
            since_frame: 0,
        };
        let worker = thread::Builder::new()
            .name("bench-engine".into())
            .spawn(move || engine.run(cmd_rx))?;
        Ok(EngineHandle {
            commands: cmd_tx,
            events: event_rx,
            worker: Some(worker),
        })
    }
    fn run(mut self, commands: Receiver<BenchCommand>) {
        self.publish(BenchEvent::Log(format!(
            "engine ready ({:?} source)",
            self.source.mode()
        )));
        let samples = self.handoff_rx.channel().clone();
        loop {
            select! {
                recv(commands) -> cmd => {
                    let Ok(cmd) = cmd else {
                        debug!("all engine handles dropped");
                        break;
                    };
                    // a command applies at the point in the stream where it was issued
                    self.drain();
                    if self.apply(cmd).is_break() {
                        break;
                    }
                }
                recv(samples) -> raw => {
                    if let Ok(raw) = raw {
                        self.ingest(&raw);
                    }
                }
            }
        }
        self.source.stop();
        info!("engine stopped");
    }
    fn drain(&mut self) {
        while let Some(raw) = self.handoff_rx.try_recv() {
            self.ingest(&raw);
        }
    }
    fn ingest(&mut self, raw: &RawSample) {
        self.pipeline.on_raw_sample(raw);
        if self.pipeline.is_viewing_history() {
            return;
        }
        self.since_frame += 1;
        if self.since_frame >= self.frame_interval {
            self.since_frame = 0;
            self.publish(BenchEvent::Frame(self.frame()));
        }
    }
    fn frame(&self) -> LiveFrame {
        let mut frame = self.pipeline.frame();
        frame.stats.frequency_hz = self.source.frequency();
        frame.stats.dropped_samples = self.handoff_rx.dropped();
        frame
    }
    // slow observers lose events, the consumer never waits on them
    fn publish(&self, event: BenchEvent) {
        if self.events.try_send(event).is_err() {
            debug!("event dropped, observer is behind");
        }
    }
    fn apply(&mut self, cmd: BenchCommand) -> ControlFlow<()> {
        match cmd {
            BenchCommand::StartSource(reply) => {
                let result = if self.source.is_running() {
                    Err(BenchError::SourceRunning)
                } else {
                    self.source.start(self.handoff_tx.clone())
                };
                match &result {
                    Ok(()) => {
                        self.publish(BenchEvent::SourceStatus(true));
                        self.publish(BenchEvent::Log(format!(
                            "source started at {:.2} Hz",
                            self.source.frequency()
                        )));
                    }
                    Err(err) => warn!("source start failed: {err}"),
                }
                reply.send(result).ok();
            }
            BenchCommand::StopSource(reply) => {
                self.source.stop();
                // whatever the source produced before it stopped still counts
                self.drain();
                self.publish(BenchEvent::SourceStatus(false));
                reply.send(()).ok();
            }
            BenchCommand::SetFrequency(hz, reply) => {
                let result = self.source.set_frequency(hz);
                if result.is_ok() {
                    info!("frequency set to {:.2} Hz", self.source.frequency());
                }
                reply.send(result).ok();
            }
            BenchCommand::Tare(reply) => {
                let applied = self.pipeline.tare();
                if applied {
                    let calibration = self.pipeline.calibration();
                    self.publish(BenchEvent::Log(format!(
                        "zero set: position offset {:.2} mm, force offset {:.2} kgf",
                        calibration.offset_position, calibration.offset_force
                    )));
                }
                reply.send(applied).ok();
            }
            BenchCommand::StartRecording(reply) => {
                let result = self.pipeline.start_recording();
                if result.is_ok() {
                    self.publish(BenchEvent::RecordingStatus(true));
                }
                reply.send(result).ok();
            }
            BenchCommand::StopRecording(reply) => {
                let finished = self.pipeline.stop_recording();
                if let Some(recording) = &finished {
                    info!("recording stopped with {} samples", recording.samples.len());
                    self.publish(BenchEvent::RecordingStatus(false));
                }
                reply.send(finished).ok();
            }
            BenchCommand::NewTest(reply) => {
                let result = self.pipeline.new_test();
                if result.is_ok() {
                    self.since_frame = 0;
                    self.publish(BenchEvent::Frame(self.frame()));
                }
                reply.send(result).ok();
            }
            BenchCommand::ViewHistory(samples) => {
                self.pipeline.view_history(samples.clone());
                self.publish(BenchEvent::History(samples));
            }
            BenchCommand::LeaveHistory => self.pipeline.leave_history(),
            BenchCommand::SetReference(Some(samples)) => self.pipeline.set_reference(samples),
            BenchCommand::SetReference(None) => self.pipeline.clear_reference(),
            BenchCommand::Snapshot(reply) => {
                reply.send(self.frame()).ok();
            }
            BenchCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}
/// Front-end side of a running engine.
///
/// Request methods block until the engine answers and fail with
/// [`BenchError::EngineStopped`] once the consumer thread is gone.
pub struct EngineHandle {
    commands: Sender<BenchCommand>,
    events: Receiver<BenchEvent>,
    worker: Option<JoinHandle<()>>,
}
impl EngineHandle {
    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> BenchCommand) -> Result<T, BenchError> {
        let (tx, rx) = channel::bounded(1);
        self.commands
            .send(build(tx))
            .map_err(|_| BenchError::EngineStopped)?;
        rx.recv().map_err(|_| BenchError::EngineStopped)
    }
    fn notify(&self, cmd: BenchCommand) -> Result<(), BenchError> {
        self.commands.send(cmd).map_err(|_| BenchError::EngineStopped)
    }
    pub fn start_source(&self) -> Result<(), BenchError> {
        self.request(BenchCommand::StartSource)?
    }
    pub fn stop_source(&self) -> Result<(), BenchError> {
        self.request(BenchCommand::StopSource)
    }
    pub fn set_frequency(&self, hz: f64) -> Result<(), BenchError> {
        self.request(|reply| BenchCommand::SetFrequency(hz, reply))?
    }
    /// `false` when nothing has been sampled yet.
    pub fn tare(&self) -> Result<bool, BenchError> {
        self.request(BenchCommand::Tare)
    }
    pub fn start_recording(&self) -> Result<(), BenchError> {
        self.request(BenchCommand::StartRecording)?
    }
    /// `None` when no recording was active.
    pub fn stop_recording(&self) -> Result<Option<FinishedRecording>, BenchError> {
        self.request(BenchCommand::StopRecording)
    }
    pub fn new_test(&self) -> Result<(), BenchError> {
        self.request(BenchCommand::NewTest)?
    }
    pub fn view_history(&self, samples: Vec<ProcessedSample>) -> Result<(), BenchError> {
        self.notify(BenchCommand::ViewHistory(samples))
    }
    pub fn leave_history(&self) -> Result<(), BenchError> {
        self.notify(BenchCommand::LeaveHistory)
    }
    pub fn set_reference(&self, samples: Vec<ProcessedSample>) -> Result<(), BenchError> {
        self.notify(BenchCommand::SetReference(Some(samples)))
    }
    pub fn clear_reference(&self) -> Result<(), BenchError> {
        self.notify(BenchCommand::SetReference(None))
    }
    pub fn snapshot(&self) -> Result<LiveFrame, BenchError> {
        self.request(BenchCommand::Snapshot)
    }
    pub fn events(&self) -> &Receiver<BenchEvent> {
        &self.events
    }
    /// Stop the source and join the consumer thread.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.commands.send(BenchCommand::Shutdown).ok();
        if worker.join().is_err() {
            error!("engine thread panicked");
        }
    }
}
impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::drivers::source::{ManualSource, SimulatedSource};
    fn ramp(n: usize) -> Vec<RawSample> {
        (0..n)
            .map(|i| RawSample::new(i as f64 * 10.0, i as f64 * 0.5, 3.0))
            .collect()
    }
    fn spawn_manual(samples: Vec<RawSample>) -> EngineHandle {
        let settings = EngineSettings {
            pipeline: PipelineSettings {
                live_capacity: 500,
                hysteresis_mm: 0.0,
            },
            ..EngineSettings::default()
        };
        Engine::spawn(Box::new(ManualSource::new(samples)), settings).unwrap()
    }
    #[test]
    fn stop_recording_captures_everything_queued_before_it() {
        let engine = spawn_manual(ramp(100));
        engine.start_recording().unwrap();
        engine.start_source().unwrap();
        let finished = engine.stop_recording().unwrap().unwrap();
        assert_eq!(finished.samples.len(), 100);
        assert!(finished.samples.windows(2).all(|w| w[0].t < w[1].t));
        assert!(engine.stop_recording().unwrap().is_none());
    }
    #[test]
    fn second_start_is_rejected() {
        let engine = spawn_manual(ramp(5));
        engine.start_source().unwrap();
        assert!(matches!(engine.start_source(), Err(BenchError::SourceRunning)));
        engine.stop_source().unwrap();
        assert!(engine.start_source().is_ok());
    }
    #[test]
    fn tare_needs_a_sample_first() {
        let engine = spawn_manual(ramp(20));
        assert!(!engine.tare().unwrap());
        engine.start_source().unwrap();
        assert!(engine.tare().unwrap());
    }
    #[test]
    fn snapshot_reflects_live_state_and_history_freezes_it() {
        let engine = spawn_manual(ramp(50));
        engine.start_source().unwrap();
        let frame = engine.snapshot().unwrap();
        assert_eq!(frame.time.len(), 50);
        assert_eq!(frame.stats.dropped_samples, 0);
        assert!(frame.stats.max_compression > 0.0);
        engine.view_history(Vec::new()).unwrap();
        assert!(engine.snapshot().unwrap().stats.viewing_history);
        engine.leave_history().unwrap();
        engine.new_test().unwrap();
        let cleared = engine.snapshot().unwrap();
        assert!(cleared.time.is_empty());
        assert_eq!(cleared.stats.cycles, 0);
    }
    #[test]
    fn new_test_refused_while_recording() {
        let engine = spawn_manual(Vec::new());
        engine.start_recording().unwrap();
        assert!(matches!(engine.new_test(), Err(BenchError::RecordingActive)));
        assert!(matches!(engine.start_recording(), Err(BenchError::RecordingActive)));
    }
    #[test]
    fn publishes_status_events() {
        let engine = spawn_manual(ramp(3));
        engine.start_source().unwrap();
        engine.start_recording().unwrap();
        engine.stop_recording().unwrap();
        let events: Vec<BenchEvent> = engine.events().try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, BenchEvent::SourceStatus(true))));
        assert!(events.iter().any(|e| matches!(e, BenchEvent::RecordingStatus(true))));
        assert!(events.iter().any(|e| matches!(e, BenchEvent::RecordingStatus(false))));
        assert!(events.iter().any(|e| matches!(e, BenchEvent::Frame(_))));
    }
    #[test]
    fn calls_fail_after_shutdown() {
        let mut engine = spawn_manual(ramp(3));
        engine.shutdown();
        assert!(matches!(engine.snapshot(), Err(BenchError::EngineStopped)));
        assert!(matches!(engine.tare(), Err(BenchError::EngineStopped)));
        engine.shutdown();
    }
    #[test]
    fn rejects_bad_capacity() {
        let settings = EngineSettings {
            pipeline: PipelineSettings {
                live_capacity: 0,
                hysteresis_mm: 0.0,
            },
            ..EngineSettings::default()
        };
        assert!(matches!(
            Engine::spawn(Box::new(ManualSource::new(Vec::new())), settings),
            Err(BenchError::InvalidCapacity(0))
        ));
    }
    #[test]
    fn recording_across_source_restart_keeps_time_increasing() {
        let source = SimulatedSource::new(1.0, 50.0).unwrap().with_seed(4);
        let engine = Engine::spawn(Box::new(source), EngineSettings::default()).unwrap();
        engine.start_source().unwrap();
        engine.start_recording().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        engine.stop_source().unwrap();
        engine.start_source().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        let finished = engine.stop_recording().unwrap().unwrap();
        engine.stop_source().unwrap();
        assert!(finished.samples.len() > 2);
        assert!(finished.samples.windows(2).all(|w| w[1].t > w[0].t));
    }
    #[test]
    fn simulated_run_records_ordered_samples() {
        let source = SimulatedSource::new(2.0, 50.0).unwrap().with_seed(11);
        let engine = Engine::spawn(Box::new(source), EngineSettings::default()).unwrap();
        engine.start_source().unwrap();
        engine.start_recording().unwrap();
        std::thread::sleep(Duration::from_millis(120));
        engine.set_frequency(3.0).unwrap();
        assert!(engine.set_frequency(f64::NAN).is_err());
        std::thread::sleep(Duration::from_millis(60));
        let finished = engine.stop_recording().unwrap().unwrap();
        engine.stop_source().unwrap();
        assert!(!finished.samples.is_empty());
        assert!(finished.samples.windows(2).all(|w| w[0].t < w[1].t));
        assert_eq!(engine.snapshot().unwrap().stats.frequency_hz, 3.0);
    }
}
