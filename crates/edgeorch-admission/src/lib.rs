//! edgeorch-admission — what may run, and who may ask for it.
//!
//! Two independent tables, each behind its own lock:
//!
//! - [`CommandAdmission`] maps a service name to its approved executable
//!   and refuses anything on the fixed denylist.
//! - [`RequesterAdmission`] maps a service name to the callers allowed to
//!   invoke it.
//!
//! Requester checks run first on every invoke, then command resolution,
//! then argument screening.

pub mod command;
pub mod requester;

pub use command::{CommandAdmission, DENYLIST, executable_base_name};
pub use requester::RequesterAdmission;
