//! WebDriver plumbing
//!
//! Session capabilities, command error mapping and driver process
//! management. The protocol itself is spoken by `fantoccini`.

pub mod capabilities;
pub mod command;
pub mod process;

pub use capabilities::{chrome_capabilities, PageLoadStrategy};
pub use command::{is_transient, CommandExt, TRANSIENT_ERRORS};
pub use process::{status, DriverProcess, DriverStatus};
