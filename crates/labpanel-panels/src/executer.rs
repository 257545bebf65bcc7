//! Generic command console for any device.

use std::sync::Arc;
use std::time::Instant;

use labpanel_core::bus::{connect_checked, ArgType, CommandInfo, DeviceBus, DeviceProxy};
use labpanel_core::convert::parse_command_argument;
use labpanel_core::error::{PanelError, UserError};

const UNINITIALISED: &str = "Uninitialised";

fn describe(description: &str) -> &str {
    if description == UNINITIALISED {
        "None"
    } else {
        description
    }
}

fn type_name(arg: Option<ArgType>) -> String {
    arg.map_or_else(|| "DevVoid".to_string(), |t| t.to_string())
}

/// Input/output description shown under the command selector.
pub fn command_description(info: &CommandInfo) -> String {
    format!(
        "Input: {} (type: {})\nOutput: {} (type: {})",
        describe(&info.in_description),
        type_name(info.in_type),
        describe(&info.out_description),
        type_name(info.out_type)
    )
}

/// Command console controller.
pub struct CommandExecuter {
    bus: Arc<dyn DeviceBus>,
    device: Option<Arc<dyn DeviceProxy>>,
    /// Commands of the device, sorted.
    pub commands: Vec<String>,
    info: Option<CommandInfo>,
    pub description: String,
    /// Last result, or the error of the last execution.
    pub result: String,
}

impl CommandExecuter {
    pub fn new(bus: Arc<dyn DeviceBus>) -> Self {
        Self {
            bus,
            device: None,
            commands: Vec::new(),
            info: None,
            description: String::new(),
            result: String::new(),
        }
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name())
    }

    /// Target another device. An unreachable device leaves the console
    /// disabled.
    pub fn set_device(&mut self, device: &str) {
        self.device = None;
        self.commands.clear();
        self.info = None;
        self.description.clear();
        let proxy = match connect_checked(self.bus.as_ref(), device) {
            Ok(proxy) => proxy,
            Err(e) => {
                tracing::warn!(device, error = %e, "Device not available");
                return;
            }
        };
        match proxy.command_list() {
            Ok(mut commands) => {
                commands.sort();
                self.commands = commands;
            }
            Err(e) => tracing::error!(device, error = %e, "Failed to list commands"),
        }
        self.device = Some(proxy);
        if let Some(first) = self.commands.first().cloned() {
            self.select_command(&first);
        }
    }

    /// Execution is possible.
    pub fn is_enabled(&self) -> bool {
        self.device.is_some() && self.info.is_some()
    }

    /// The argument field is editable.
    pub fn argument_enabled(&self) -> bool {
        self.info.as_ref().is_some_and(|i| i.in_type.is_some())
    }

    pub fn selected_command(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.name.as_str())
    }

    pub fn select_command(&mut self, command: &str) {
        let Some(device) = &self.device else { return };
        match device.command_info(command) {
            Ok(info) => {
                self.description = command_description(&info);
                self.info = Some(info);
            }
            Err(e) => {
                tracing::error!(command, error = %e, "Failed to read command info");
                self.info = None;
                self.description.clear();
            }
        }
    }

    /// Run the selected command with `argument`.
    ///
    /// Malformed arguments are returned as errors; a failing command is
    /// reported in [`Self::result`].
    pub fn execute(&mut self, argument: &str) -> Result<(), UserError> {
        let (Some(device), Some(info)) = (&self.device, &self.info) else {
            return Ok(());
        };
        let started = Instant::now();
        let value = parse_command_argument(argument, info.in_type).map_err(|e| match e {
            PanelError::Unsupported(msg) => UserError::new("Not implemented", msg),
            other => UserError::new("Bad argument", other.to_string()),
        })?;
        self.result = match device.command(&info.name, value) {
            Ok(reply) => format!(
                "Command: {}/{}\nDuration: {} msec\nResult: {}",
                device.name(),
                info.name,
                started.elapsed().as_millis(),
                reply
            ),
            Err(e) => e.message,
        };
        Ok(())
    }
}
