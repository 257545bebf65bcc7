//! Text exporters: CSV, tab separated and the OOIBase32 scope file.
//!
//! Every writer produces `{wavelength:.2}` and `{value:.3}` columns, one
//! point per line, `\n` terminated.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use labpanel_core::error::{AppResult, PanelError};

use crate::record::SpectrumRecord;

fn create(path: &Path) -> AppResult<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        PanelError::Export(format!("cannot create '{}': {}", path.display(), e))
    })?;
    Ok(BufWriter::new(file))
}

fn write_rows<W: Write>(out: &mut W, record: &SpectrumRecord) -> AppResult<()> {
    for (wl, value) in record.points()? {
        writeln!(out, "{:.2}\t{:.3}", wl, value)?;
    }
    Ok(())
}

/// Comma separated `wavelength,value` rows without header.
pub fn write_csv(path: &Path, record: &SpectrumRecord) -> AppResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(create(path)?);
    for (wl, value) in record.points()? {
        writer
            .write_record([format!("{:.2}", wl), format!("{:.3}", value)])
            .map_err(|e| PanelError::Export(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Tab separated rows without header.
pub fn write_tsv(path: &Path, record: &SpectrumRecord) -> AppResult<()> {
    let mut out = create(path)?;
    write_rows(&mut out, record)?;
    out.flush()?;
    Ok(())
}

/// Header of an OOIBase32 scope file, up to the begin marker.
pub fn ooibase_header(record: &SpectrumRecord) -> String {
    let meta = &record.metadata;
    let lines = [
        "OOIBase32 Version 2.0.6.3 Data File".to_string(),
        "++++++++++++++++++++++++++++++++++++".to_string(),
        format!("Date: {}", record.acquired.format("%m-%d-%Y, %H:%M:%S")),
        "User: Valued Ocean Optics Customer".to_string(),
        format!("Spectrometer Serial Number: {}", meta.serial),
        "Spectrometer Channel: Master".to_string(),
        format!("Integration Time (msec): {}", meta.integration_time.trunc() as i64),
        format!("Spectra Averaged: {}", meta.averages),
        format!("Boxcar Smoothing: {}", meta.boxcar_width),
        format!(
            "Correct for Electrical Dark: {}",
            if meta.dark_correction { "Enabled" } else { "Disabled" }
        ),
        "Time Normalized: Disabled".to_string(),
        "Dual-beam Reference: Disabled".to_string(),
        "Reference Channel: Master".to_string(),
        "Temperature: Not acquired".to_string(),
        format!("Spectrometer Type: {}", meta.model),
        format!("ADC Type: {}", meta.model),
        format!("Number of Pixels in File: {}", record.len()),
        "Graph Title:".to_string(),
        ">>>>>Begin Spectral Data<<<<<".to_string(),
    ];
    let mut header = lines.join("\n");
    header.push('\n');
    header
}

/// OOIBase32 scope file: header, tab separated rows, end marker.
pub fn write_ooibase(path: &Path, record: &SpectrumRecord) -> AppResult<()> {
    // Fail before touching the file.
    record.points()?;
    let mut out = create(path)?;
    out.write_all(ooibase_header(record).as_bytes())?;
    write_rows(&mut out, record)?;
    writeln!(out, ">>>>>End Spectral Data<<<<<")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SpectrumMetadata;
    use chrono::{Local, TimeZone};

    fn record() -> SpectrumRecord {
        let mut record = SpectrumRecord::new(
            vec![400.0, 400.456],
            vec![12.0, -0.0004],
            SpectrumMetadata {
                model: "HR4000".into(),
                serial: "HR4C1234".into(),
                boxcar_width: 2,
                averages: 10,
                integration_time: 99.9,
                dark_correction: true,
                nl_correction: false,
            },
        );
        if let Some(t) = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).single() {
            record.acquired = t;
        }
        record
    }

    #[test]
    fn csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        write_csv(&path, &record()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "400.00,12.000\n400.46,-0.000\n"
        );
    }

    #[test]
    fn tab_separated_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.dat");
        write_tsv(&path, &record()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "400.00\t12.000\n400.46\t-0.000\n"
        );
    }

    #[test]
    fn ooibase_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.Master.Scope");
        write_ooibase(&path, &record()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 19 + 2 + 1);
        assert_eq!(lines[0], "OOIBase32 Version 2.0.6.3 Data File");
        assert_eq!(lines[2], "Date: 03-07-2024, 09:05:01");
        assert_eq!(lines[4], "Spectrometer Serial Number: HR4C1234");
        assert_eq!(lines[6], "Integration Time (msec): 99");
        assert_eq!(lines[7], "Spectra Averaged: 10");
        assert_eq!(lines[8], "Boxcar Smoothing: 2");
        assert_eq!(lines[9], "Correct for Electrical Dark: Enabled");
        assert_eq!(lines[14], "Spectrometer Type: HR4000");
        assert_eq!(lines[15], "ADC Type: HR4000");
        assert_eq!(lines[16], "Number of Pixels in File: 2");
        assert_eq!(lines[17], "Graph Title:");
        assert_eq!(lines[18], ">>>>>Begin Spectral Data<<<<<");
        assert_eq!(lines[19], "400.00\t12.000");
        assert_eq!(lines[21], ">>>>>End Spectral Data<<<<<");
        assert!(text.ends_with("<<<<<\n"));
    }

    #[test]
    fn mismatched_record_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.Master.Scope");
        let mut bad = record();
        bad.spectrum.pop();
        assert!(write_ooibase(&path, &bad).is_err());
        assert!(!path.exists());
    }
}
