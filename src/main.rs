// src/main.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use log::{info, warn};
use damper_bench::config::BenchConfig;
use damper_bench::drivers::average_curve;
use damper_bench::engine::Engine;
use damper_bench::recorder::export_csv_file;
use damper_bench::store::{JsonFileStore, NewSession, SessionStore};
use damper_bench::types::{BenchEvent, LiveStats};
// usage: damper-bench [config.json]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = BenchConfig::load_or_default(config_path.as_deref())
        .context("invalid bench configuration")?;
    let plan = config.frequency.frequencies()?;
    if plan.len() > 1 {
        warn!(
            "sweep of {} steps configured, running at the first ({} Hz)",
            plan.len(),
            plan[0]
        );
    }
    let source = config.build_source().context("could not open the sample source")?;
    let mut engine = Engine::spawn(source, config.engine_settings())
        .context("could not start the processing engine")?;
    engine.start_source().context("source refused to start")?;
    engine.start_recording()?;
    info!("recording for {:.1} s", config.run_seconds);
    // follow the engine until the run is over
    let deadline = Instant::now() + config.run_duration();
    let mut stats = LiveStats::default();
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match engine.events().recv_timeout(left.min(Duration::from_millis(250))) {
            Ok(BenchEvent::Log(line)) => info!("{line}"),
            Ok(BenchEvent::Frame(frame)) => stats = frame.stats,
            Ok(_) | Err(_) => {}
        }
    }
    let recording = engine
        .stop_recording()?
        .context("recording was not active at the end of the run")?;
    engine.stop_source()?;
    let curve = average_curve(&recording.samples);
    info!(
        "{} samples over {:.0} ms, {} cycles, compression {:.1} kgf, expansion {:.1} kgf, {} dropped",
        recording.samples.len(),
        recording.duration_ms(),
        stats.cycles,
        recording.peaks.max_compression,
        recording.peaks.max_expansion,
        stats.dropped_samples
    );
    if let (Some(lo), Some(hi)) = (curve.velocity.first(), curve.velocity.last()) {
        info!("characteristic curve spans {lo:.1} .. {hi:.1} mm/s ({} points)", curve.len());
    }
    if let Some(path) = &config.csv_export {
        export_csv_file(path, &recording.samples)
            .with_context(|| format!("could not export {}", path.display()))?;
    }
    let mut store = JsonFileStore::open(&config.store_dir)
        .with_context(|| format!("could not open store {}", config.store_dir.display()))?;
    let id = store.save(NewSession::from_recording(
        recording,
        config.client.clone(),
        config.vehicle.clone(),
        config.notes.clone(),
    ))?;
    info!("saved session {id} in {}", store.dir().display());
    engine.shutdown();
    Ok(())
}
