//! Starting and supervising real child processes.
#![cfg(unix)]

use std::io::Write;
use std::time::{Duration, Instant};

use labpanel_launcher::{LauncherConfig, LauncherTree, Program, ProgramConfig, ProgramStatus};
use tracing_test::traced_test;

fn program(command: &[&str], grace_ms: u64) -> Program {
    Program::new(
        ProgramConfig {
            name: "child".into(),
            command: command.iter().map(|s| s.to_string()).collect(),
            cwd: None,
        },
        Duration::from_millis(grace_ms),
    )
}

#[test]
fn early_exit_reports_code_and_stderr() {
    let mut p = program(&["sh", "-c", "echo boom >&2; exit 3"], 300);
    let err = p.start().unwrap_err();
    assert_eq!(err.to_string(), "Process error: Return code: 3, Error: boom");
    assert!(!p.is_running());
    assert_eq!(p.status(), ProgramStatus::NotRunning);
}

#[test]
fn early_signal_is_reported() {
    let mut p = program(&["sh", "-c", "kill -9 $$"], 300);
    let err = p.start().unwrap_err();
    assert!(err.to_string().ends_with("Process ended by signal 9"), "{}", err);
}

#[test]
fn missing_executable_fails_to_start() {
    let mut p = program(&["/nonexistent/labpanel-nothing"], 10);
    assert!(p.start().is_err());
    assert!(!p.is_running());
}

#[traced_test]
#[test]
fn running_child_is_tracked_then_reaped() {
    let mut p = program(&["sleep", "1"], 50);
    p.start().unwrap();
    let pid = p.pid().unwrap();
    assert_eq!(p.status(), ProgramStatus::Running);

    // A second start is a no-op while the child lives.
    p.start().unwrap();
    assert_eq!(p.pid(), Some(pid));

    p.update(&[]);
    assert_eq!(p.pid(), Some(pid));

    let deadline = Instant::now() + Duration::from_secs(5);
    while p.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
        p.update(&[]);
    }
    assert!(!p.is_running());
    assert_eq!(p.status(), ProgramStatus::NotRunning);
    assert!(logs_contain("Program exited"));
}

#[test]
fn relative_programs_resolve_next_to_the_config() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("panel.sh");
    std::fs::write(&script, "#!/bin/sh\nsleep 1\n").unwrap();
    std::fs::write(dir.path().join("viewer.py"), "").unwrap();
    std::fs::create_dir(dir.path().join("work")).unwrap();

    let path = dir.path().join("launcher.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"[[category]]
name = "Panels"
expanded = true

  [[category.program]]
  name = "Panel"
  command = ["panel.sh", "--debug"]
  cwd = "work"

  [[category.program]]
  name = "Viewer"
  command = ["python3", "viewer.py"]

  [[category.program]]
  name = "Shell"
  command = ["sh"]"#
    )
    .unwrap();

    let config = LauncherConfig::load(&path).unwrap();
    let programs = &config.category[0].program;
    assert_eq!(programs[0].command[0], script.to_string_lossy());
    assert_eq!(programs[0].command[1], "--debug");
    assert_eq!(programs[0].cwd.as_deref(), Some(dir.path().join("work").as_path()));
    assert_eq!(programs[1].command[0], "python3");
    assert_eq!(programs[1].command[1], dir.path().join("viewer.py").to_string_lossy());
    assert_eq!(programs[2].command, ["sh"]);

    let tree = LauncherTree::load(&path, Duration::from_millis(10)).unwrap();
    assert_eq!(tree.programs().len(), 3);
}

#[test]
fn process_table_lists_this_test() {
    let mut tree = LauncherTree::new(LauncherConfig::default(), Duration::ZERO);
    let processes = tree.scan_processes();
    let me = std::process::id();
    assert!(processes.iter().any(|p| p.pid == me));
    assert_eq!(tree.refresh(), 0);
}
