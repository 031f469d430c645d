//! Command admission — service name to approved executable.

use std::collections::HashMap;

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info, warn};

use edgeorch_core::{EngineError, EngineResult, ServiceName};

/// Executables that may never be registered, matched by base name.
pub const DENYLIST: [&str; 25] = [
    "sudo", "su", "bash", "bsh", "csh", "adb", "sh", "ssh", "scp", "cat", "chage", "chpasswd",
    "dmidecode", "dmsetup", "fcinfo", "fdisk", "iscsiadm", "lsof", "multipath", "oratab",
    "prtvtoc", "ps", "pburn", "pfexec", "dzdo",
];

/// Shell control operators that must not appear in forwarded arguments.
const INJECTION_PATTERN: &str = r"[;|&`<>\n]|\$\(";

/// Text after the last `/`, or the whole string when there is none.
pub fn executable_base_name(executable: &str) -> &str {
    executable.rsplit('/').next().unwrap_or(executable)
}

#[derive(Default)]
pub struct CommandAdmission {
    commands: Mutex<HashMap<ServiceName, String>>,
}

impl CommandAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve `executable` for `service`, replacing any earlier entry.
    pub fn register(&self, service: &str, executable: &str) -> EngineResult<()> {
        let base = executable_base_name(executable);
        if base.is_empty() {
            return Err(EngineError::InvalidCommand(format!(
                "empty executable for service {service}"
            )));
        }
        if DENYLIST.iter().any(|denied| *denied == base) {
            warn!(%service, %executable, "refusing denylisted executable");
            return Err(EngineError::DisallowedExecutable(executable.to_string()));
        }

        let previous = self
            .commands
            .lock()
            .insert(service.to_string(), executable.to_string());

        match previous {
            Some(old) if old != executable => {
                info!(%service, %executable, previous = %old, "service command replaced")
            }
            Some(_) => debug!(%service, "service command re-registered"),
            None => info!(%service, %executable, "service command registered"),
        }
        Ok(())
    }

    /// The executable approved for `service`.
    pub fn resolve(&self, service: &str) -> EngineResult<String> {
        self.commands
            .lock()
            .get(service)
            .cloned()
            .ok_or_else(|| EngineError::ServiceNotRegistered(service.to_string()))
    }

    /// Confirm a forwarded `executable` is the one registered here.
    pub fn verify(&self, service: &str, executable: &str) -> EngineResult<()> {
        let local = self.resolve(service)?;
        if local != executable {
            warn!(%service, forwarded = %executable, %local, "forwarded executable mismatch");
            return Err(EngineError::InvalidCommand(format!(
                "executable {executable} does not match registration of {service}"
            )));
        }
        Ok(())
    }

    /// Reject arguments carrying shell control operators.
    pub fn check_args(&self, args: &[String]) -> EngineResult<()> {
        let pattern = Regex::new(INJECTION_PATTERN)
            .map_err(|e| EngineError::InvalidCommand(format!("argument filter: {e}")))?;

        if let Some(arg) = args.iter().find(|arg| pattern.is_match(arg)) {
            warn!(argument = %arg, "rejecting argument with shell operator");
            return Err(EngineError::InvalidCommand(format!(
                "argument contains a shell operator: {arg:?}"
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}
