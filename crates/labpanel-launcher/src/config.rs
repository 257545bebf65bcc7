//! Program tree configuration.
//!
//! ```toml
//! [[category]]
//! name = "Laser"
//! expanded = true
//!
//!   [[category.program]]
//!   name = "Compressor"
//!   command = ["labpanel-compressor"]
//!
//!   [[category.category]]
//!   name = "Diagnostics"
//!
//!     [[category.category.program]]
//!     name = "Camera"
//!     command = ["labpanel-camera", "--simulation"]
//!     cwd = "work"
//! ```
//!
//! Executables and working directories given as relative paths that do not
//! exist from the current directory are looked up next to the file.

use std::path::{Path, PathBuf};

use labpanel_core::error::{AppResult, PanelError};
use serde::Deserialize;

/// Root of the program tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    #[serde(default)]
    pub category: Vec<CategoryConfig>,
    #[serde(default)]
    pub program: Vec<ProgramConfig>,
}

/// A named group of programs and sub-categories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    pub name: String,
    /// Shown expanded when the browser opens.
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub category: Vec<CategoryConfig>,
    #[serde(default)]
    pub program: Vec<ProgramConfig>,
}

/// One launchable program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    pub name: String,
    /// Executable followed by its arguments.
    pub command: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl LauncherConfig {
    /// Parse a configuration. Relative paths are left untouched.
    pub fn parse(text: &str) -> AppResult<Self> {
        let config: LauncherConfig = toml::from_str(text)
            .map_err(|e| PanelError::Configuration(format!("Invalid launcher configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` and resolve relative paths against its directory.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve(base);
        tracing::debug!(path = %path.display(), programs = config.program_count(), "Loaded launcher configuration");
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        fn check(programs: &[ProgramConfig], categories: &[CategoryConfig]) -> AppResult<()> {
            if let Some(p) = programs.iter().find(|p| p.command.is_empty()) {
                return Err(PanelError::Configuration(format!(
                    "Program '{}' has an empty command",
                    p.name
                )));
            }
            categories
                .iter()
                .try_for_each(|c| check(&c.program, &c.category))
        }
        check(&self.program, &self.category)
    }

    /// Rewrite relative executables, scripts and working directories that
    /// exist under `base`.
    pub fn resolve(&mut self, base: &Path) {
        fn walk(programs: &mut [ProgramConfig], categories: &mut [CategoryConfig], base: &Path) {
            for program in programs {
                program.resolve(base);
            }
            for category in categories {
                walk(&mut category.program, &mut category.category, base);
            }
        }
        walk(&mut self.program, &mut self.category, base);
    }

    /// Number of programs in the whole tree.
    pub fn program_count(&self) -> usize {
        fn count(programs: &[ProgramConfig], categories: &[CategoryConfig]) -> usize {
            programs.len()
                + categories
                    .iter()
                    .map(|c| count(&c.program, &c.category))
                    .sum::<usize>()
        }
        count(&self.program, &self.category)
    }
}

fn relocate(entry: &mut String, base: &Path) {
    if Path::new(entry.as_str()).exists() {
        return;
    }
    let candidate = base.join(entry.as_str());
    if candidate.exists() {
        *entry = candidate.to_string_lossy().into_owned();
    }
}

impl ProgramConfig {
    fn resolve(&mut self, base: &Path) {
        let Some(exe) = self.command.first_mut() else {
            return;
        };
        relocate(exe, base);
        // Interpreted programs name their script second.
        if is_interpreter(&self.command[0]) {
            if let Some(script) = self.command.get_mut(1) {
                relocate(script, base);
            }
        }
        if let Some(cwd) = &self.cwd {
            if cwd.is_relative() && !cwd.exists() {
                self.cwd = Some(base.join(cwd));
            }
        }
    }
}

/// File name of an executable path.
pub fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// The executable runs a script given as first argument.
pub fn is_interpreter(exe: &str) -> bool {
    file_name(exe).starts_with("python")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"
[[category]]
name = "Laser"
expanded = true

  [[category.program]]
  name = "Compressor"
  command = ["labpanel-compressor", "--debug"]

  [[category.category]]
  name = "Diagnostics"

    [[category.category.program]]
    name = "Camera"
    command = ["labpanel-camera"]

[[program]]
name = "Console"
command = ["labpanel-executer"]
"#;

    #[test]
    fn nested_tree_parses() {
        let config = LauncherConfig::parse(TREE).unwrap();
        assert_eq!(config.program_count(), 3);
        let laser = &config.category[0];
        assert!(laser.expanded);
        assert_eq!(laser.program[0].command, ["labpanel-compressor", "--debug"]);
        assert!(!laser.category[0].expanded);
        assert_eq!(laser.category[0].program[0].name, "Camera");
        assert_eq!(config.program[0].cwd, None);
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = LauncherConfig::parse("[[program]]\nname = \"x\"\ncommand = []\n").unwrap_err();
        assert!(err.to_string().contains("Program 'x' has an empty command"));
        assert!(LauncherConfig::parse("[[program]]\nname = \"x\"\n").is_err());
        assert!(LauncherConfig::parse("[[program]]\nname = \"x\"\ncommand = [\"a\"]\nicon = \"i\"\n").is_err());
    }

    #[test]
    fn interpreters() {
        assert!(is_interpreter("/usr/bin/python3"));
        assert!(is_interpreter("python"));
        assert!(!is_interpreter("labpanel-camera"));
        assert_eq!(file_name("/opt/lab/bin/panel"), "panel");
    }
}
