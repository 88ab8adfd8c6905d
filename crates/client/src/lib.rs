//! Client-side session and data access for the PO management API.
//!
//! The crate is built around one shared [`ApiClient`](http::ApiClient):
//!
//! - [`session_store`] / [`storage`]: the active credential and its durable
//!   copy on disk.
//! - [`auth`]: login, logout and start-up restore via
//!   [`SessionController`](auth::SessionController).
//! - [`data_view`]: filter/page state for the merged PO data, with stale
//!   responses discarded.
//! - [`upload`]: local validation and dispatch of PO and acceptance files.
//! - [`dashboard`]: headline counters and chart data.
//! - [`events`]: broadcast of login, logout and expiry.
//!
//! [`Client`] wires these together from a [`ClientConfig`](config::ClientConfig).

pub mod auth;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod data_view;
pub mod events;
pub mod http;
pub mod session_store;
pub mod storage;
pub mod upload;

pub use auth::{AuthState, LoginFailure, SessionController};
pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use data_view::{DataView, ExportFile, ViewSnapshot};
pub use events::{SessionEvent, SessionEvents};
pub use http::{ApiClient, ApiError};
pub use upload::{UploadCandidate, UploadCoordinator};
