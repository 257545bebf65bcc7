//! Command-line flags shared by the panel binaries.

use std::path::PathBuf;

use clap::Parser;

/// Flags every panel accepts.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Laboratory control panel")]
pub struct Args {
    /// Log at debug level regardless of the configured level.
    #[arg(long)]
    pub debug: bool,

    /// Configuration file, `config/labpanel.toml` when omitted.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Flags of the camera panel.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Laser camera panel")]
pub struct CameraArgs {
    #[command(flatten)]
    pub common: Args,

    /// Show synthetic frames instead of connecting to the camera.
    #[arg(long)]
    pub simulation: bool,
}

/// Flags of the camera setup window.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Camera configuration")]
pub struct SetupArgs {
    #[command(flatten)]
    pub common: Args,

    /// Camera to configure, the first live camera when omitted.
    pub camera: Option<String>,
}

/// Flags of the command console.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Device command console")]
pub struct ExecuterArgs {
    #[command(flatten)]
    pub common: Args,

    /// Device to open at startup.
    pub device: Option<String>,
}

/// Flags of the program browser.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Laboratory program browser")]
pub struct BrowserArgs {
    #[command(flatten)]
    pub common: Args,

    /// Program tree file, overriding `launcher.config`.
    #[arg(long, value_name = "FILE")]
    pub programs: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from(["labpanel-vacuum", "--debug"]).unwrap();
        assert!(args.debug);
        assert!(args.config.is_none());

        let args =
            CameraArgs::try_parse_from(["labpanel-camera", "--simulation", "--config", "lab.toml"])
                .unwrap();
        assert!(args.simulation);
        assert!(!args.common.debug);
        assert_eq!(args.common.config.as_deref(), Some(std::path::Path::new("lab.toml")));

        assert!(Args::try_parse_from(["labpanel-vacuum", "--simulation"]).is_err());

        let args = ExecuterArgs::try_parse_from(["labpanel-executer", "udyni/cooling/chiller"]).unwrap();
        assert_eq!(args.device.as_deref(), Some("udyni/cooling/chiller"));
        let args = SetupArgs::try_parse_from(["labpanel-camera-setup"]).unwrap();
        assert!(args.camera.is_none());
        let args = BrowserArgs::try_parse_from(["labpanel-browser", "--programs", "lab.toml", "--debug"]).unwrap();
        assert!(args.common.debug);
        assert!(args.programs.is_some());
    }
}
