//! Remote sync client
//!
//! Pushes script files to the game's HTTP file API.
//!
//! ## Protocol
//!
//! - `POST /` with `{ "filename", "code" }` creates or overwrites a file,
//!   `code` being the base64 encoded contents
//! - `DELETE /` with `{ "filename" }` removes one
//! - every request carries `Authorization: Bearer <token>`
//! - 200 means accepted, 401 means the token was rejected, anything else
//!   is a failure whose body may explain why
//!
//! ## Usage
//!
//! ```ignore
//! let client = SyncClient::new();
//! let outcome = client.sync(&event, &config, &workspace_roots).await?;
//! ```

mod client;
mod outcome;
mod payload;

pub use client::{SyncClient, DEFAULT_ENDPOINT};
pub use outcome::{OutcomeStatus, SyncOutcome};
pub use payload::{build_payload, HttpMethod, RemoteFilePayload, RemoteRequest, SyncEvent, SyncKind};
