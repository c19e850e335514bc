// src/drivers/mod.rs
// acquisition and processing building blocks, one component per file
pub mod buffer;
pub mod curve;
pub mod error;
pub mod filter;
pub mod handoff;
pub mod pipeline;
pub mod processor;
pub mod protocol;
pub mod source;
pub mod trackers;
// re-exports for callers outside the drivers tree
pub use buffer::{FinishedRecording, LiveBuffer, RecordingSession};
pub use curve::{average_curve, CharacteristicCurve};
pub use error::BenchError;
pub use filter::FilterWindow;
pub use handoff::{SampleReceiver, SampleSender};
pub use pipeline::{PipelineSettings, SignalPipeline};
pub use processor::{CalibrationState, SignalProcessor};
pub use protocol::{DroppedSample, LinkReply, LinkState, LinkTransport, ProtocolLink};
pub use source::{
    HardwareSource, HeldPosition, ManualSource, PositionChannel, SampleSource, SimulatedSource,
    SyntheticPosition,
};
pub use trackers::{CycleCounter, PeakTracker, PeakValues};
