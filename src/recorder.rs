use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use log::info;
use crate::drivers::BenchError;
use crate::types::ProcessedSample;
pub const CSV_HEADER: &str = "time_ms;position_mm;force_kgf;velocity";
/// Write samples as semicolon separated values, one row per sample.
pub fn export_csv<W: Write>(writer: &mut W, samples: &[ProcessedSample]) -> Result<(), BenchError> {
    writeln!(writer, "{CSV_HEADER}")?;
    for s in samples {
        writeln!(
            writer,
            "{:.3};{:.2};{:.2};{:.2}",
            s.t, s.position, s.force, s.velocity
        )?;
    }
    writer.flush()?;
    Ok(())
}
pub fn export_csv_file(path: &Path, samples: &[ProcessedSample]) -> Result<(), BenchError> {
    let mut w = BufWriter::new(File::create(path)?);
    export_csv(&mut w, samples)?;
    info!("exported {} samples to {}", samples.len(), path.display());
    Ok(())
}
