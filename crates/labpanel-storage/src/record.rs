//! Spectrum snapshot and export format selection.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use labpanel_core::error::{AppResult, PanelError};

/// Spectrometer settings stored next to the data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumMetadata {
    pub model: String,
    pub serial: String,
    pub boxcar_width: i64,
    pub averages: i64,
    /// Milliseconds.
    pub integration_time: f64,
    pub dark_correction: bool,
    pub nl_correction: bool,
}

/// One spectrum ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRecord {
    pub wavelength: Vec<f64>,
    pub spectrum: Vec<f64>,
    pub metadata: SpectrumMetadata,
    /// Time written into headers and attributes.
    pub acquired: DateTime<Local>,
}

impl SpectrumRecord {
    /// Snapshot taken now.
    pub fn new(wavelength: Vec<f64>, spectrum: Vec<f64>, metadata: SpectrumMetadata) -> Self {
        Self {
            wavelength,
            spectrum,
            metadata,
            acquired: Local::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// `(wavelength, value)` pairs. Fails when the axes differ in length.
    pub fn points(&self) -> AppResult<impl Iterator<Item = (f64, f64)> + '_> {
        if self.wavelength.len() != self.spectrum.len() {
            return Err(PanelError::Export(format!(
                "wavelength has {} points but spectrum has {}",
                self.wavelength.len(),
                self.spectrum.len()
            )));
        }
        Ok(self
            .wavelength
            .iter()
            .copied()
            .zip(self.spectrum.iter().copied()))
    }
}

/// File formats offered by the export dialog, in dialog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Hdf5,
    Csv,
    Dat,
    OoiBase,
    /// Tab separated, no extension enforced.
    Generic,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Hdf5,
        ExportFormat::Csv,
        ExportFormat::Dat,
        ExportFormat::OoiBase,
        ExportFormat::Generic,
    ];

    /// Dialog filter label.
    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Hdf5 => "HDF5 file (*.h5)",
            ExportFormat::Csv => "CSV file (*.csv)",
            ExportFormat::Dat => "Text file (*.dat)",
            ExportFormat::OoiBase => "OOIBASE file (*.Master.Scope)",
            ExportFormat::Generic => "All files (*)",
        }
    }

    /// Extension appended when missing, without the leading dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            ExportFormat::Hdf5 => Some("h5"),
            ExportFormat::Csv => Some("csv"),
            ExportFormat::Dat => Some("dat"),
            ExportFormat::OoiBase => Some("Master.Scope"),
            ExportFormat::Generic => None,
        }
    }

    /// Format matching the extension of `path`, generic otherwise.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().is_some_and(|ext| name.ends_with(&format!(".{}", ext))))
            .unwrap_or(ExportFormat::Generic)
    }

    /// `path` with this format's extension appended unless already present.
    ///
    /// The check is case-sensitive, so `data.CSV` becomes `data.CSV.csv`.
    pub fn with_extension(self, path: &Path) -> PathBuf {
        let Some(ext) = self.extension() else {
            return path.to_path_buf();
        };
        let suffix = format!(".{}", ext);
        if path.to_string_lossy().ends_with(&suffix) {
            path.to_path_buf()
        } else {
            let mut name = path.as_os_str().to_os_string();
            name.push(&suffix);
            PathBuf::from(name)
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_appended_once() {
        let p = Path::new("/tmp/run1");
        assert_eq!(ExportFormat::Csv.with_extension(p), PathBuf::from("/tmp/run1.csv"));
        assert_eq!(
            ExportFormat::Csv.with_extension(Path::new("/tmp/run1.csv")),
            PathBuf::from("/tmp/run1.csv")
        );
        assert_eq!(
            ExportFormat::OoiBase.with_extension(p),
            PathBuf::from("/tmp/run1.Master.Scope")
        );
        assert_eq!(
            ExportFormat::Dat.with_extension(Path::new("a.CSV")),
            PathBuf::from("a.CSV.dat")
        );
        assert_eq!(ExportFormat::Generic.with_extension(p), PathBuf::from("/tmp/run1"));
    }

    #[test]
    fn format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("x.h5")), ExportFormat::Hdf5);
        assert_eq!(
            ExportFormat::from_path(Path::new("x.Master.Scope")),
            ExportFormat::OoiBase
        );
        assert_eq!(ExportFormat::from_path(Path::new("x.txt")), ExportFormat::Generic);
    }

    #[test]
    fn mismatched_axes_are_rejected() {
        let record = SpectrumRecord::new(vec![1.0, 2.0], vec![1.0], SpectrumMetadata::default());
        assert!(matches!(record.points(), Err(PanelError::Export(_))));
    }
}
