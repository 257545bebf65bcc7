//! HDF5 spectrum export (feature `storage_hdf5`).
//!
//! Layout: datasets `wavelength` and `spectrum` (f64). The acquisition
//! settings are attributes of `spectrum`.

use std::path::Path;

use labpanel_core::error::{AppResult, PanelError};

use crate::record::SpectrumRecord;

#[cfg(feature = "storage_hdf5")]
fn h5_error(e: impl std::fmt::Display) -> PanelError {
    PanelError::Export(format!("HDF5: {}", e))
}

#[cfg(feature = "storage_hdf5")]
fn string_attr(ds: &hdf5::Dataset, name: &str, value: &str) -> AppResult<()> {
    use hdf5::types::VarLenUnicode;
    let value = value.parse::<VarLenUnicode>().map_err(h5_error)?;
    ds.new_attr::<VarLenUnicode>()
        .create(name)
        .and_then(|attr| attr.write_scalar(&value))
        .map_err(h5_error)
}

#[cfg(feature = "storage_hdf5")]
fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Write `record` as an HDF5 file.
#[cfg(feature = "storage_hdf5")]
pub fn write_hdf5(path: &Path, record: &SpectrumRecord) -> AppResult<()> {
    record.points()?;
    let meta = &record.metadata;
    let file = hdf5::File::create(path).map_err(h5_error)?;

    file.new_dataset::<f64>()
        .shape([record.wavelength.len()])
        .create("wavelength")
        .and_then(|ds| ds.write(&record.wavelength))
        .map_err(h5_error)?;
    let spectrum = file
        .new_dataset::<f64>()
        .shape([record.spectrum.len()])
        .create("spectrum")
        .map_err(h5_error)?;
    spectrum.write(&record.spectrum).map_err(h5_error)?;

    string_attr(&spectrum, "Spectrometer model", &meta.model)?;
    string_attr(&spectrum, "Spectrometer serial", &meta.serial)?;
    spectrum
        .new_attr::<i64>()
        .create("Boxcar width")
        .and_then(|a| a.write_scalar(&meta.boxcar_width))
        .map_err(h5_error)?;
    spectrum
        .new_attr::<i64>()
        .create("Averages")
        .and_then(|a| a.write_scalar(&meta.averages))
        .map_err(h5_error)?;
    spectrum
        .new_attr::<f64>()
        .create("Integration time")
        .and_then(|a| a.write_scalar(&meta.integration_time))
        .map_err(h5_error)?;
    string_attr(
        &spectrum,
        "Electrical dark subtraction",
        python_bool(meta.dark_correction),
    )?;
    string_attr(&spectrum, "Detector NL correction", python_bool(meta.nl_correction))?;
    string_attr(
        &spectrum,
        "Date",
        &record.acquired.format("%Y-%m-%d, %H:%M:%S").to_string(),
    )?;
    let timestamp = record.acquired.timestamp_millis() as f64 / 1000.0;
    spectrum
        .new_attr::<f64>()
        .create("Timestamp")
        .and_then(|a| a.write_scalar(&timestamp))
        .map_err(h5_error)?;

    tracing::debug!(path = %path.display(), points = record.len(), "HDF5 spectrum written");
    Ok(())
}

/// Without the `storage_hdf5` feature HDF5 export is refused.
#[cfg(not(feature = "storage_hdf5"))]
pub fn write_hdf5(_path: &Path, _record: &SpectrumRecord) -> AppResult<()> {
    Err(PanelError::Unsupported(
        "HDF5 export requires the storage_hdf5 feature".into(),
    ))
}

#[cfg(all(test, feature = "storage_hdf5"))]
mod tests {
    use super::*;
    use crate::record::SpectrumMetadata;

    #[test]
    fn datasets_and_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.h5");
        let record = SpectrumRecord::new(
            vec![500.0, 501.0, 502.0],
            vec![1.0, 5.0, 2.0],
            SpectrumMetadata {
                model: "HR4000".into(),
                averages: 4,
                ..Default::default()
            },
        );
        write_hdf5(&path, &record).unwrap();

        let file = hdf5::File::open(&path).unwrap();
        let spectrum = file.dataset("spectrum").unwrap();
        assert_eq!(spectrum.read_raw::<f64>().unwrap(), vec![1.0, 5.0, 2.0]);
        assert_eq!(
            file.dataset("wavelength").unwrap().read_raw::<f64>().unwrap(),
            vec![500.0, 501.0, 502.0]
        );
        let averages: i64 = spectrum.attr("Averages").unwrap().read_scalar().unwrap();
        assert_eq!(averages, 4);
        let dark: hdf5::types::VarLenUnicode = spectrum
            .attr("Electrical dark subtraction")
            .unwrap()
            .read_scalar()
            .unwrap();
        assert_eq!(dark.as_str(), "False");
    }
}
