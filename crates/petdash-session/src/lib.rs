//! Resilient sessions for slow, session-authenticated remote device APIs.
//!
//! # Components
//!
//! - [`session`]: [`ResilientSession`]: login, persisted-session restore, and
//!   a single re-login + retry when a call reports session expiry
//! - [`store`]: Durable session storage with a freshness window
//! - [`http`]: Generic JSON-over-HTTP device API client with typed failures
//! - [`fallback`]: Ordered candidate operations tried until one succeeds

pub mod error;
pub mod fallback;
pub mod http;
pub mod session;
pub mod store;

pub use error::{RemoteError, Result, StoreError};
pub use fallback::{AttemptFailure, FallbackChain, FallbackError};
pub use http::{HttpApiClient, HttpApiConfig};
pub use session::{Authenticator, ResilientSession, SessionConfig, SessionState};
pub use store::{
    Credentials, FileSessionStore, MemorySessionStore, SessionStore, SharedSessionStore,
    StoredSession,
};
