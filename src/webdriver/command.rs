//! WebDriver command errors
//!
//! Failed commands are reported as [`Error::CommandFailed`] carrying the
//! W3C error code, so callers can tell "not ready yet" apart from real
//! failures.

use fantoccini::error::{CmdError, ErrorStatus, NewSessionError};

use crate::common::{Error, Result};

/// WebDriver errors that mean "not ready yet, try again"
pub const TRANSIENT_ERRORS: &[&str] = &[
    "no such element",
    "stale element reference",
    "element not interactable",
    "element click intercepted",
    "invalid element state",
];

/// Attach the command name to a `fantoccini` result
pub trait CommandExt<T> {
    fn during(self, command: &str) -> Result<T>;
}

impl<T> CommandExt<T> for std::result::Result<T, CmdError> {
    fn during(self, command: &str) -> Result<T> {
        self.map_err(|e| command_error(command, e))
    }
}

impl<T> CommandExt<T> for std::result::Result<T, NewSessionError> {
    fn during(self, command: &str) -> Result<T> {
        self.map_err(|e| Error::SessionCreateFailed(format!("{}: {}", command, e)))
    }
}

/// Map a `fantoccini` command error into ours
pub fn command_error(command: &str, error: CmdError) -> Error {
    match error {
        CmdError::Standard(wd) => {
            Error::command_failed(command, &error_code(&wd.error), &wd.message)
        }
        other => Error::DriverCommunication(format!("'{}' failed: {}", command, other)),
    }
}

/// W3C error code for a status
fn error_code(status: &ErrorStatus) -> String {
    let code = match status {
        ErrorStatus::NoSuchElement => "no such element",
        ErrorStatus::StaleElementReference => "stale element reference",
        ErrorStatus::ElementNotInteractable => "element not interactable",
        ErrorStatus::ElementClickIntercepted => "element click intercepted",
        ErrorStatus::InvalidElementState => "invalid element state",
        ErrorStatus::InvalidSelector => "invalid selector",
        ErrorStatus::InvalidArgument => "invalid argument",
        ErrorStatus::InvalidSessionId => "invalid session id",
        ErrorStatus::NoSuchWindow => "no such window",
        ErrorStatus::NoSuchFrame => "no such frame",
        ErrorStatus::JavascriptError => "javascript error",
        ErrorStatus::ScriptTimeout => "script timeout",
        ErrorStatus::Timeout => "timeout",
        ErrorStatus::UnknownError => "unknown error",
        other => return format!("{:?}", other),
    };
    code.to_string()
}

/// Whether an error means the element is not actionable yet
pub fn is_transient(error: &Error) -> bool {
    error
        .webdriver_code()
        .map(|code| TRANSIENT_ERRORS.contains(&code))
        .unwrap_or(false)
}
