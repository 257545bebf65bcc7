//! Export dispatch through [`labpanel_storage::export`].

use labpanel_core::error::PanelError;
use labpanel_storage::{export, ExportFormat, SpectrumMetadata, SpectrumRecord};

fn record() -> SpectrumRecord {
    SpectrumRecord::new(
        vec![650.0, 650.5, 651.0],
        vec![10.0, 250.25, 12.5],
        SpectrumMetadata {
            model: "AvaSpec-ULS2048".into(),
            serial: "1607123U1".into(),
            boxcar_width: 0,
            averages: 1,
            integration_time: 100.0,
            dark_correction: false,
            nl_correction: true,
        },
    )
}

#[test]
fn text_formats_append_their_extension() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("scan");

    let csv = export(ExportFormat::Csv, &base, &record()).unwrap();
    assert_eq!(csv, dir.path().join("scan.csv"));
    assert_eq!(
        std::fs::read_to_string(&csv).unwrap(),
        "650.00,10.000\n650.50,250.250\n651.00,12.500\n"
    );

    let dat = export(ExportFormat::Dat, &base, &record()).unwrap();
    assert_eq!(dat, dir.path().join("scan.dat"));

    let generic = export(ExportFormat::Generic, &base, &record()).unwrap();
    assert_eq!(generic, base);
    assert_eq!(
        std::fs::read_to_string(&generic).unwrap(),
        std::fs::read_to_string(&dat).unwrap()
    );

    let scope = export(ExportFormat::OoiBase, &base, &record()).unwrap();
    assert_eq!(scope, dir.path().join("scan.Master.Scope"));
    let text = std::fs::read_to_string(&scope).unwrap();
    assert!(text.contains("\nCorrect for Electrical Dark: Disabled\n"));
    assert!(text.contains("\nNumber of Pixels in File: 3\n"));
}

#[test]
fn existing_extension_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kept.csv");
    assert_eq!(export(ExportFormat::Csv, &path, &record()).unwrap(), path);
}

#[test]
fn unwritable_location_is_an_export_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("scan");
    let err = export(ExportFormat::Dat, &path, &record()).unwrap_err();
    assert!(matches!(err, PanelError::Export(_)));
}

#[cfg(not(feature = "storage_hdf5"))]
#[test]
fn hdf5_needs_the_feature() {
    let dir = tempfile::tempdir().unwrap();
    let err = export(ExportFormat::Hdf5, &dir.path().join("scan"), &record()).unwrap_err();
    assert!(matches!(err, PanelError::Unsupported(_)));
}
