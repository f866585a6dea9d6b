//! Platform screen-lock actuators.
//!
//! [`detect_actuator`] picks the lock command family for the running OS and,
//! on Linux, the `DESKTOP_SESSION`. Combinations without a known command get
//! an [`UnsupportedLock`] that reports instead of acting.
//!
//! Capture is V4L2-only, so built binaries run on Linux. The Windows and
//! macOS arms of [`select_actuator`] are kept so the selection table stays
//! complete and testable on any host; a non-Linux capture backend would pick
//! them up unchanged.

use std::process::Command;
use thiserror::Error;

const MACOS_LOCK_SCRIPT: &str =
    r#"tell application "System Events" to keystroke "q" using {control down, command down}"#;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("screen locking is not supported on {os} (desktop session: {desktop})")]
    Unsupported { os: String, desktop: String },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Locks the workstation. Calling it is terminal for a monitoring run.
pub trait LockActuator {
    /// Human-readable description of what [`lock`](Self::lock) will do.
    fn describe(&self) -> String;
    fn lock(&self) -> Result<(), LockError>;
}

/// Locks by running an external command and waiting for it to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLock {
    program: String,
    args: Vec<String>,
}

impl CommandLock {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Build from a full argv (`["loginctl", "lock-session"]`); `None` if empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl LockActuator for CommandLock {
    fn describe(&self) -> String {
        self.command_line()
    }

    fn lock(&self) -> Result<(), LockError> {
        let command = self.command_line();
        tracing::info!(%command, "locking workstation");

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|source| LockError::Spawn {
                command: command.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(LockError::Failed { command, status })
        }
    }
}

/// Placeholder for platforms without a lock command; always reports an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedLock {
    os: String,
    desktop: String,
}

impl LockActuator for UnsupportedLock {
    fn describe(&self) -> String {
        format!("unsupported ({} / {})", self.os, self.desktop)
    }

    fn lock(&self) -> Result<(), LockError> {
        Err(LockError::Unsupported {
            os: self.os.clone(),
            desktop: self.desktop.clone(),
        })
    }
}

/// Select the lock actuator for `os` (as in `std::env::consts::OS`) and the
/// Linux desktop session name.
pub fn select_actuator(os: &str, desktop_session: Option<&str>) -> Box<dyn LockActuator> {
    match os {
        "windows" => Box::new(CommandLock::new("rundll32.exe", &["user32.dll,LockWorkStation"])),
        "macos" => Box::new(CommandLock::new("osascript", &["-e", MACOS_LOCK_SCRIPT])),
        "linux" => match desktop_session {
            Some("gnome") | Some("ubuntu") => Box::new(CommandLock::new("xdg-screensaver", &["lock"])),
            Some("kde") => Box::new(CommandLock::new("loginctl", &["lock-session"])),
            _ => Box::new(CommandLock::new("xscreensaver-command", &["-lock"])),
        },
        other => Box::new(UnsupportedLock {
            os: other.to_string(),
            desktop: desktop_session.unwrap_or("none").to_string(),
        }),
    }
}

/// Select the actuator for the running system.
pub fn detect_actuator() -> Box<dyn LockActuator> {
    let desktop = std::env::var("DESKTOP_SESSION").ok();
    let actuator = select_actuator(std::env::consts::OS, desktop.as_deref());
    tracing::debug!(
        os = std::env::consts::OS,
        desktop = desktop.as_deref().unwrap_or("none"),
        actuator = %actuator.describe(),
        "selected lock actuator"
    );
    actuator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_desktop_selection() {
        assert_eq!(select_actuator("linux", Some("gnome")).describe(), "xdg-screensaver lock");
        assert_eq!(select_actuator("linux", Some("ubuntu")).describe(), "xdg-screensaver lock");
        assert_eq!(select_actuator("linux", Some("kde")).describe(), "loginctl lock-session");
        assert_eq!(select_actuator("linux", Some("xfce")).describe(), "xscreensaver-command -lock");
        assert_eq!(select_actuator("linux", None).describe(), "xscreensaver-command -lock");
    }

    #[test]
    fn test_windows_and_macos_selection() {
        assert_eq!(
            select_actuator("windows", None).describe(),
            "rundll32.exe user32.dll,LockWorkStation"
        );
        assert!(select_actuator("macos", None).describe().starts_with("osascript -e"));
    }

    #[test]
    fn test_unsupported_os_reports_instead_of_panicking() {
        let actuator = select_actuator("freebsd", Some("xfce"));
        assert_eq!(actuator.describe(), "unsupported (freebsd / xfce)");
        let err = actuator.lock().unwrap_err();
        assert!(matches!(err, LockError::Unsupported { .. }));
        assert!(err.to_string().contains("freebsd"));
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["loginctl".to_string(), "lock-session".to_string()];
        assert_eq!(
            CommandLock::from_argv(&argv),
            Some(CommandLock::new("loginctl", &["lock-session"]))
        );
        assert_eq!(CommandLock::from_argv(&[]), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_lock_success_and_failure() {
        assert!(CommandLock::new("true", &[]).lock().is_ok());
        assert!(matches!(
            CommandLock::new("false", &[]).lock(),
            Err(LockError::Failed { .. })
        ));
    }

    #[test]
    fn test_command_lock_missing_program() {
        let err = CommandLock::new("vigil-no-such-lock-program", &[]).lock().unwrap_err();
        assert!(matches!(err, LockError::Spawn { .. }));
    }
}
