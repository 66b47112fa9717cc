//! In-memory per-user state

pub mod session;

pub use session::{SessionError, SessionStore, SessionTicket};
