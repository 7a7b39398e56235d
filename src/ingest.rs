//! CSV readers and writers around the canonical records.
//!
//! Blank cells deserialize as absent fields; unknown columns are ignored.

use std::io::{Read, Write};
use std::path::Path;

use crate::catalog::PropellantCatalog;
use crate::error::Result;
use crate::records::{CartridgeRecord, PredictionRecord, PropellantRecord};

pub const PREDICTION_HEADERS: [&str; 6] = [
    "Cartridge",
    "Eff Case Vol (gr H2O)",
    "Eff Barrel Length (in)",
    "Predicted Charge (gr)",
    "Actual Charge (gr)",
    "Difference (gr)",
];

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input)
}

pub fn read_cartridges_from<R: Read>(input: R) -> Result<Vec<CartridgeRecord>> {
    let mut rdr = reader(input);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        let record: CartridgeRecord = row?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_cartridges(path: &Path) -> Result<Vec<CartridgeRecord>> {
    let records = read_cartridges_from(std::fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), count = records.len(), "read cartridge table");
    Ok(records)
}

/// Propellant rows; the name column may be `name` or `pname`
pub fn read_propellants_from<R: Read>(input: R) -> Result<Vec<PropellantRecord>> {
    let mut rdr = reader(input);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        let record: PropellantRecord = row?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_propellants(path: &Path) -> Result<Vec<PropellantRecord>> {
    let records = read_propellants_from(std::fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), count = records.len(), "read propellant table");
    Ok(records)
}

pub fn write_predictions<W: Write>(output: W, predictions: &[PredictionRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(output);
    wtr.write_record(PREDICTION_HEADERS)?;
    for p in predictions {
        wtr.write_record([
            p.cartridge.clone(),
            p.eff_case_vol.to_string(),
            p.eff_barrel_length.to_string(),
            p.predicted_charge.to_string(),
            p.actual_charge.to_string(),
            p.difference.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Propellant table with the resolved Ba_eff column appended
pub fn write_propellant_table<W: Write>(output: W, catalog: &PropellantCatalog) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(output);
    wtr.write_record(["name", "Ba", "a0", "z1", "z2", "bulk_density", "Qex", "k", "Ba_eff"])?;
    for entry in catalog.entries() {
        let r = &entry.record;
        wtr.write_record([
            entry.name.clone(),
            opt(r.ba),
            opt(r.a0),
            opt(r.z1),
            opt(r.z2),
            opt(r.bulk_density),
            opt(r.qex),
            opt(r.k),
            opt(entry.ba_eff),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
