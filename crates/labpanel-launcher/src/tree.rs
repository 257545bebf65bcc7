//! The browser's program tree.

use std::path::Path;
use std::time::Duration;

use labpanel_core::error::{AppResult, PanelError};
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

use crate::config::{CategoryConfig, LauncherConfig, ProgramConfig};
use crate::process::{ProcessInfo, Program};

/// Column headers of the tree view.
pub const COLUMNS: [&str; 3] = ["Program", "PID", "Status"];

/// Node of the program tree.
#[derive(Debug)]
pub enum Node {
    Category(Category),
    Program(Program),
}

/// A named group of nodes.
#[derive(Debug)]
pub struct Category {
    pub name: String,
    pub expanded: bool,
    pub children: Vec<Node>,
}

impl Category {
    fn from_config(config: CategoryConfig, grace: Duration) -> Self {
        Self {
            name: config.name,
            expanded: config.expanded,
            children: nodes(config.category, config.program, grace),
        }
    }
}

fn nodes(
    categories: Vec<CategoryConfig>,
    programs: Vec<ProgramConfig>,
    grace: Duration,
) -> Vec<Node> {
    categories
        .into_iter()
        .map(|c| Node::Category(Category::from_config(c, grace)))
        .chain(programs.into_iter().map(|p| Node::Program(Program::new(p, grace))))
        .collect()
}

fn visit<'a>(nodes: &'a [Node], out: &mut Vec<&'a Program>) {
    for node in nodes {
        match node {
            Node::Category(c) => visit(&c.children, out),
            Node::Program(p) => out.push(p),
        }
    }
}

fn visit_mut<'a>(nodes: &'a mut [Node], out: &mut Vec<&'a mut Program>) {
    for node in nodes {
        match node {
            Node::Category(c) => visit_mut(&mut c.children, out),
            Node::Program(p) => out.push(p),
        }
    }
}

/// Launcher state: the configured tree plus a process table for finding
/// instances started outside the launcher.
pub struct LauncherTree {
    pub roots: Vec<Node>,
    system: System,
}

impl LauncherTree {
    pub fn new(config: LauncherConfig, startup_grace: Duration) -> Self {
        Self {
            roots: nodes(config.category, config.program, startup_grace),
            system: System::new(),
        }
    }

    /// Load the tree from a configuration file.
    pub fn load(path: &Path, startup_grace: Duration) -> AppResult<Self> {
        let config = LauncherConfig::load(path)?;
        tracing::info!(path = %path.display(), programs = config.program_count(), "Program tree loaded");
        Ok(Self::new(config, startup_grace))
    }

    /// Programs in tree order.
    pub fn programs(&self) -> Vec<&Program> {
        let mut out = Vec::new();
        visit(&self.roots, &mut out);
        out
    }

    pub fn programs_mut(&mut self) -> Vec<&mut Program> {
        let mut out = Vec::new();
        visit_mut(&mut self.roots, &mut out);
        out
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Program> {
        self.programs_mut().into_iter().find(|p| p.name == name)
    }

    /// Start `name` unless it is running.
    pub fn activate(&mut self, name: &str) -> AppResult<()> {
        let program = self
            .find_mut(name)
            .ok_or_else(|| PanelError::Process(format!("Unknown program '{}'", name)))?;
        program.start()
    }

    /// Snapshot of the live processes with a command line.
    pub fn scan_processes(&mut self) -> Vec<ProcessInfo> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );
        self.system
            .processes()
            .values()
            .filter(|p| p.status() != ProcessStatus::Zombie)
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                cmdline: p
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect(),
            })
            .filter(|p| !p.cmdline.is_empty())
            .collect()
    }

    /// Refresh every program against the process table. Returns the number
    /// of running programs.
    pub fn refresh(&mut self) -> usize {
        let processes = self.scan_processes();
        self.refresh_with(&processes)
    }

    /// Refresh every program against a given process list.
    pub fn refresh_with(&mut self, processes: &[ProcessInfo]) -> usize {
        let mut running = 0;
        for program in self.programs_mut() {
            program.update(processes);
            if program.is_running() {
                running += 1;
            }
        }
        running
    }
}

/// Status bar text.
pub fn status_message(running: usize) -> String {
    format!("{} programs running", running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_keeps_categories_before_programs() {
        let config = LauncherConfig::parse(
            r#"
[[program]]
name = "Console"
command = ["labpanel-executer"]

[[category]]
name = "Vacuum"
expanded = true

  [[category.program]]
  name = "Dry pump"
  command = ["labpanel-vacuum"]
"#,
        )
        .unwrap();
        let mut tree = LauncherTree::new(config, Duration::ZERO);
        assert!(matches!(&tree.roots[0], Node::Category(c) if c.name == "Vacuum" && c.expanded));
        let names: Vec<&str> = tree.programs().into_iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Dry pump", "Console"]);

        let running = tree.refresh_with(&[ProcessInfo {
            pid: 42,
            cmdline: vec!["labpanel-vacuum".into()],
        }]);
        assert_eq!(running, 1);
        assert_eq!(status_message(running), "1 programs running");
        assert_eq!(tree.find_mut("Dry pump").and_then(|p| p.pid()), Some(42));
        assert!(tree.activate("Nope").is_err());
    }
}
