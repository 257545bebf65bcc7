//! Child-process lifecycle of one launchable program.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::time::Duration;

use labpanel_core::error::{AppResult, PanelError};

use crate::config::{file_name, is_interpreter, ProgramConfig};

/// Whether an instance of the program is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramStatus {
    #[default]
    NotRunning,
    Running,
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgramStatus::NotRunning => "Not running",
            ProgramStatus::Running => "Running",
        })
    }
}

/// A process seen on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub cmdline: Vec<String>,
}

/// A program of the launcher tree.
///
/// Programs started elsewhere are recognised from the process table, so a
/// panel already open on the desktop is shown as running and not started a
/// second time.
#[derive(Debug)]
pub struct Program {
    pub name: String,
    command: Vec<String>,
    cwd: Option<PathBuf>,
    pid: Option<u32>,
    child: Option<Child>,
    status: ProgramStatus,
    startup_grace: Duration,
}

impl Program {
    pub fn new(config: ProgramConfig, startup_grace: Duration) -> Self {
        Self {
            name: config.name,
            command: config.command,
            cwd: config.cwd,
            pid: None,
            child: None,
            status: ProgramStatus::NotRunning,
            startup_grace,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> ProgramStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    /// Start the program unless an instance is already known.
    ///
    /// The child is given the startup grace period; exiting within it is
    /// reported as an error carrying the exit code and its stderr.
    pub fn start(&mut self) -> AppResult<()> {
        if self.is_running() {
            tracing::debug!(program = %self.name, pid = ?self.pid, "Already running");
            return Ok(());
        }
        let (exe, args) = self
            .command
            .split_first()
            .ok_or_else(|| PanelError::Process(format!("Program '{}' has no command", self.name)))?;

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        // Started programs outlive the launcher.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::info!(program = %self.name, command = ?self.command, "Starting program");
        let mut child = cmd.spawn()?;

        std::thread::sleep(self.startup_grace);
        if let Some(status) = child.try_wait()? {
            let stderr = child.stderr.take().map(read_all).unwrap_or_default();
            let message = exit_message(status, &stderr);
            tracing::error!(program = %self.name, %message, "Program ended during startup");
            return Err(PanelError::Process(message));
        }

        if let Some(stderr) = child.stderr.take() {
            forward_stderr(&self.name, stderr);
        }
        self.pid = Some(child.id());
        self.child = Some(child);
        self.status = ProgramStatus::Running;
        tracing::info!(program = %self.name, pid = ?self.pid, "Program started");
        Ok(())
    }

    /// Refresh the status from our own child, or from the process table for
    /// instances started elsewhere. Finished children are reaped.
    pub fn update(&mut self, processes: &[ProcessInfo]) {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {
                    self.status = ProgramStatus::Running;
                    return;
                }
                Ok(Some(status)) => {
                    tracing::info!(program = %self.name, %status, "Program exited");
                }
                Err(e) => {
                    tracing::warn!(program = %self.name, error = %e, "Failed to check program status");
                }
            }
            self.child = None;
            self.pid = None;
        }

        let known = self
            .pid
            .filter(|pid| processes.iter().any(|p| p.pid == *pid && self.matches(p)));
        let found = known.or_else(|| processes.iter().find(|p| self.matches(p)).map(|p| p.pid));
        if found != self.pid {
            match found {
                Some(pid) => tracing::debug!(program = %self.name, pid, "Found running instance"),
                None => tracing::debug!(program = %self.name, "No running instance"),
            }
        }
        self.pid = found;
        self.status = if found.is_some() {
            ProgramStatus::Running
        } else {
            ProgramStatus::NotRunning
        };
    }

    /// `process` is an instance of this program.
    pub fn matches(&self, process: &ProcessInfo) -> bool {
        let Some(exe) = self.command.first() else {
            return false;
        };
        let exe_name = file_name(exe);
        if !process.cmdline.iter().any(|arg| arg.contains(exe_name)) {
            return false;
        }
        if !is_interpreter(exe) {
            return true;
        }
        // Interpreters match on the script they run.
        match (self.command.get(1), process.cmdline.get(1)) {
            (Some(ours), Some(theirs)) => file_name(ours) == file_name(theirs),
            _ => false,
        }
    }
}

fn read_all(mut stderr: ChildStderr) -> String {
    let mut text = String::new();
    if let Err(e) = stderr.read_to_string(&mut text) {
        tracing::debug!(error = %e, "Failed to read stderr");
    }
    text
}

fn exit_message(status: ExitStatus, stderr: &str) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("Process ended by signal {}", signal);
        }
    }
    format!(
        "Return code: {}, Error: {}",
        status.code().unwrap_or(-1),
        stderr.trim()
    )
}

/// Log the program's stderr until it closes.
fn forward_stderr(name: &str, stderr: ChildStderr) {
    let program = name.to_string();
    let spawned = std::thread::Builder::new()
        .name(format!("stderr-{}", name))
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                tracing::debug!(program = %program, "{}", line);
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(program = name, error = %e, "Failed to forward stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(command: &[&str]) -> Program {
        Program::new(
            ProgramConfig {
                name: "test".into(),
                command: command.iter().map(|s| s.to_string()).collect(),
                cwd: None,
            },
            Duration::from_millis(10),
        )
    }

    fn process(pid: u32, cmdline: &[&str]) -> ProcessInfo {
        ProcessInfo {
            pid,
            cmdline: cmdline.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn matches_by_executable_name() {
        let p = program(&["/opt/lab/bin/labpanel-camera", "--simulation"]);
        assert!(p.matches(&process(1, &["labpanel-camera"])));
        assert!(p.matches(&process(2, &["/usr/local/bin/labpanel-camera", "--debug"])));
        assert!(!p.matches(&process(3, &["labpanel-cryostat"])));
    }

    #[test]
    fn interpreters_match_on_script() {
        let p = program(&["python3", "/lab/panels/cryostat.py"]);
        assert!(p.matches(&process(1, &["/usr/bin/python3", "cryostat.py"])));
        assert!(!p.matches(&process(2, &["/usr/bin/python3", "vacuum.py"])));
        assert!(!p.matches(&process(3, &["python3"])));
    }

    #[test]
    fn external_instances_are_adopted_and_kept() {
        let mut p = program(&["labpanel-vacuum"]);
        p.update(&[process(10, &["labpanel-vacuum"])]);
        assert_eq!(p.pid(), Some(10));
        assert_eq!(p.status(), ProgramStatus::Running);

        p.update(&[process(7, &["labpanel-vacuum"]), process(10, &["labpanel-vacuum"])]);
        assert_eq!(p.pid(), Some(10));

        p.update(&[process(7, &["labpanel-vacuum"])]);
        assert_eq!(p.pid(), Some(7));

        p.update(&[]);
        assert_eq!(p.pid(), None);
        assert_eq!(p.status().to_string(), "Not running");
    }
}
