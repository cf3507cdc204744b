use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::domain::SampleBatch;

/// Writes named columns as CSV, one row per point. All columns must have
/// the same length.
pub fn write_csv<P: AsRef<Path>>(path: P, columns: &[(&str, &DVector<f64>)]) -> io::Result<()> {
    let rows = columns.first().map_or(0, |(_, col)| col.len());
    if let Some((name, col)) = columns.iter().find(|(_, col)| col.len() != rows) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("column {name} has {} rows, expected {rows}", col.len()),
        ));
    }

    let mut out = BufWriter::new(File::create(path)?);
    for (k, (name, _)) in columns.iter().enumerate() {
        let sep = if k == 0 { "" } else { "," };
        write!(out, "{sep}{name}")?;
    }
    writeln!(out)?;
    for i in 0..rows {
        for (k, (_, col)) in columns.iter().enumerate() {
            let sep = if k == 0 { "" } else { "," };
            write!(out, "{sep}{:.15e}", col[i])?;
        }
        writeln!(out)?;
    }
    out.flush()
}

/// Inputs, then targets, then weights of one batch.
pub fn write_batch<P: AsRef<Path>>(path: P, batch: &SampleBatch) -> io::Result<()> {
    let columns: Vec<_> = batch
        .invar
        .iter()
        .chain(batch.outvar.iter())
        .chain(batch.lambda.iter())
        .collect();
    write_csv(path, &columns)
}
