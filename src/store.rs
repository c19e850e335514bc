// src/store.rs
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use crate::drivers::{BenchError, FinishedRecording};
use crate::types::ProcessedSample;
/// Serialize samples into the persisted payload: a UTF-8 JSON array of
/// `{ "t", "position", "force", "velocity" }` objects.
pub fn encode_samples(samples: &[ProcessedSample]) -> Result<Vec<u8>, BenchError> {
    Ok(serde_json::to_vec(samples)?)
}
/// Inverse of [`encode_samples`]. An empty or blank payload is an error, not an empty run.
pub fn decode_samples(payload: &[u8]) -> Result<Vec<ProcessedSample>, BenchError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(BenchError::EmptyPayload);
    }
    Ok(serde_json::from_slice(payload)?)
}
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);
impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
/// A finished recording plus the bookkeeping entered when saving it.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub client: String,
    pub vehicle: String,
    pub notes: String,
    pub recorded_at: SystemTime,
    pub max_compression: f64,
    pub max_expansion: f64,
    pub samples: Vec<ProcessedSample>,
}
impl NewSession {
    pub fn from_recording(
        recording: FinishedRecording,
        client: impl Into<String>,
        vehicle: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            vehicle: vehicle.into(),
            notes: notes.into(),
            recorded_at: recording.started_at,
            max_compression: recording.peaks.max_compression,
            max_expansion: recording.peaks.max_expansion,
            samples: recording.samples,
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub client: String,
    pub vehicle: String,
    pub notes: String,
    pub recorded_at: SystemTime,
    pub max_compression: f64,
    pub max_expansion: f64,
    pub sample_count: usize,
}
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSession {
    pub summary: SessionSummary,
    pub samples: Vec<ProcessedSample>,
}
/// Where finished test sessions are kept.
pub trait SessionStore {
    fn save(&mut self, session: NewSession) -> Result<SessionId, BenchError>;
    fn load(&self, id: &SessionId) -> Result<StoredSession, BenchError>;
    /// Just the samples, for viewing a run or overlaying it as a reference.
    fn load_samples(&self, id: &SessionId) -> Result<Vec<ProcessedSample>, BenchError> {
        Ok(self.load(id)?.samples)
    }
    /// Newest first.
    fn list(&self) -> Result<Vec<SessionSummary>, BenchError>;
    fn delete(&mut self, id: &SessionId) -> Result<(), BenchError>;
}
/// On-disk header fields, shared by the full document and the listing view.
#[derive(Serialize, Deserialize)]
struct SessionHeader {
    id: SessionId,
    client: String,
    vehicle: String,
    notes: String,
    recorded_at_ms: u64,
    max_compression: f64,
    max_expansion: f64,
    sample_count: usize,
}
impl SessionHeader {
    fn into_summary(self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            client: self.client,
            vehicle: self.vehicle,
            notes: self.notes,
            recorded_at: UNIX_EPOCH + Duration::from_millis(self.recorded_at_ms),
            max_compression: self.max_compression,
            max_expansion: self.max_expansion,
            sample_count: self.sample_count,
        }
    }
}
#[derive(Serialize, Deserialize)]
struct SessionDocument {
    #[serde(flatten)]
    header: SessionHeader,
    /// Payload as produced by [`encode_samples`].
    samples: String,
}
const SESSION_EXT: &str = "json";
/// One JSON document per session inside a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}
impl JsonFileStore {
    /// Open `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BenchError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    fn path_of(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.{SESSION_EXT}", id.as_str()))
    }
    fn next_id(&self, recorded_at_ms: u64) -> SessionId {
        let mut seq = 0u32;
        loop {
            let id = SessionId(format!("{recorded_at_ms:013}-{seq:03}"));
            if !self.path_of(&id).exists() {
                return id;
            }
            seq += 1;
        }
    }
    fn read_document(&self, id: &SessionId) -> Result<String, BenchError> {
        fs::read_to_string(self.path_of(id)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BenchError::SessionNotFound(id.to_string()),
            _ => BenchError::Io(err),
        })
    }
}
fn unix_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
impl SessionStore for JsonFileStore {
    fn save(&mut self, session: NewSession) -> Result<SessionId, BenchError> {
        let recorded_at_ms = unix_ms(session.recorded_at);
        let id = self.next_id(recorded_at_ms);
        let payload = String::from_utf8(encode_samples(&session.samples)?)
            .map_err(|err| BenchError::Io(io::Error::new(ErrorKind::InvalidData, err)))?;
        let document = SessionDocument {
            header: SessionHeader {
                id: id.clone(),
                client: session.client,
                vehicle: session.vehicle,
                notes: session.notes,
                recorded_at_ms,
                max_compression: session.max_compression,
                max_expansion: session.max_expansion,
                sample_count: session.samples.len(),
            },
            samples: payload,
        };
        let text = serde_json::to_string_pretty(&document)?;
        // write beside the target first so a crash never leaves a torn session behind
        let target = self.path_of(&id);
        let staging = target.with_extension("tmp");
        fs::write(&staging, text)?;
        if let Err(err) = fs::rename(&staging, &target) {
            fs::remove_file(&staging).ok();
            return Err(err.into());
        }
        info!("session {id} saved ({} samples)", document.header.sample_count);
        Ok(id)
    }
    fn load(&self, id: &SessionId) -> Result<StoredSession, BenchError> {
        let text = self.read_document(id)?;
        let document: SessionDocument = serde_json::from_str(&text)?;
        let samples = decode_samples(document.samples.as_bytes())?;
        Ok(StoredSession {
            summary: document.header.into_summary(),
            samples,
        })
    }
    fn list(&self) -> Result<Vec<SessionSummary>, BenchError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(BenchError::from)
                .and_then(|text| Ok(serde_json::from_str::<SessionHeader>(&text)?));
            match parsed {
                Ok(header) => sessions.push(header.into_summary()),
                Err(err) => warn!("skipping unreadable session {}: {err}", path.display()),
            }
        }
        sessions.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        debug!("{} sessions in {}", sessions.len(), self.dir.display());
        Ok(sessions)
    }
    fn delete(&mut self, id: &SessionId) -> Result<(), BenchError> {
        fs::remove_file(self.path_of(id)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BenchError::SessionNotFound(id.to_string()),
            _ => BenchError::Io(err),
        })?;
        info!("session {id} deleted");
        Ok(())
    }
}
