//! Session-oriented client for the Check Point management API.
//!
//! Log in once to obtain a [`Session`], issue commands through it, wait for
//! asynchronous tasks with [`Session::sync_task`], and keep idle sessions
//! alive with [`Session::start_keepalive`]. Every failure arrives as a
//! [`checkpoint_core::Error`] classified by [`decode_response`].
//!
//! ```no_run
//! use checkpoint_core::config::ManagementConfig;
//! use checkpoint_mgmt::{Credentials, Session, TaskPollOptions};
//!
//! # async fn run() -> checkpoint_mgmt::Result<()> {
//! let config = ManagementConfig::new("https://mgmt.example.com/")?;
//! let session = Session::connect(&config, &Credentials::password("admin", "secret"), false).await?;
//! let keepalive = session.start_keepalive(None);
//!
//! if let Some(task) = session.publish().await? {
//!     session.sync_task(task, TaskPollOptions::from_config(&config)).await?;
//! }
//!
//! keepalive.shutdown().await;
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod keepalive;
pub mod models;
pub mod session;
pub mod task;
pub mod transport;

pub use checkpoint_core::{decode_response, Error};
pub use keepalive::{KeepaliveHandle, KeepaliveScheduler};
pub use models::{Credentials, LoginResult, PolicyPushParameters, TaskRecord};
pub use session::{resolve_user_data, Session, SessionOptions};
pub use task::{extract_task_id, first_task, task_status, TaskPollOptions};
pub use transport::{ApiRequest, HttpTransport, HttpTransportBuilder, RawResponse, SessionId, Transport};

/// Convenient result alias that reuses the shared management error type.
pub type Result<T> = checkpoint_core::Result<T>;
