//! # labpanel-storage
//!
//! Spectrum exporters used by the spectrometer panel. Downstream tools parse
//! these files, so every layout is fixed to the byte.
//!
//! | format | extension | content |
//! |---|---|---|
//! | HDF5 (`storage_hdf5`) | `.h5` | `wavelength` and `spectrum` datasets plus settings attributes |
//! | CSV | `.csv` | `wl,value` rows |
//! | DAT | `.dat` | `wl\tvalue` rows |
//! | OOIBase32 | `.Master.Scope` | vendor header, rows, end marker |
//! | generic | none | `wl\tvalue` rows |

pub mod hdf5_writer;
pub mod record;
pub mod text;

use std::path::{Path, PathBuf};

use labpanel_core::error::AppResult;

pub use record::{ExportFormat, SpectrumMetadata, SpectrumRecord};

/// Write `record` in `format`, appending the format's extension to `path`
/// when missing. Returns the path actually written.
pub fn export(format: ExportFormat, path: &Path, record: &SpectrumRecord) -> AppResult<PathBuf> {
    let path = format.with_extension(path);
    match format {
        ExportFormat::Hdf5 => hdf5_writer::write_hdf5(&path, record)?,
        ExportFormat::Csv => text::write_csv(&path, record)?,
        ExportFormat::Dat | ExportFormat::Generic => text::write_tsv(&path, record)?,
        ExportFormat::OoiBase => text::write_ooibase(&path, record)?,
    }
    tracing::info!(path = %path.display(), format = ?format, "Spectrum exported");
    Ok(path)
}
