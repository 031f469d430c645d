//! edgeorch-dispatch — carries a placement decision out.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!   ├── is_local  → Executor::execute(executable, args)
//!   └── remote    → SecureTransport::send(address, RemoteExecution, Cipher)
//!                     └── POST http://{address}/api/v1/execute
//!                         body = Cipher::seal(json)
//! ```
//!
//! Every failure on either path reaches callers as
//! `EngineError::DispatchFailed` with a [`DispatchError`] cause. Nothing
//! is retried and a failed remote call never falls back to local.

pub mod cipher;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod transport;

pub use cipher::Cipher;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use executor::{Executor, ProcessExecutor};
pub use transport::{EXECUTE_PATH, HttpTransport, SecureTransport};
