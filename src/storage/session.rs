//! Per-user selection sessions.
//!
//! Each user has at most one live set of selection tokens. Starting a new
//! request (`begin`) bumps the user's generation and drops the previous set
//! immediately, before any provider is contacted, so a button from an older
//! message can never resolve to a stale URL.
//!
//! The store is an explicit object injected into the pipeline; tests build a
//! fresh one each.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::config;
use crate::core::types::{FormatOption, MediaRequest, SelectionToken, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A newer request from the same user replaced this one while it was resolving
    #[error("session superseded by a newer request")]
    Superseded,
}

/// Reservation for one in-flight request. Only the latest ticket per user can be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub user_id: UserId,
    pub generation: u64,
}

#[derive(Debug)]
struct UserSession {
    generation: u64,
    request: Option<MediaRequest>,
    options: Vec<FormatOption>,
    touched_at: Instant,
}

impl UserSession {
    fn empty() -> Self {
        Self {
            generation: 0,
            request: None,
            options: Vec::new(),
            touched_at: Instant::now(),
        }
    }
}

/// In-memory session store keyed by user id
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<UserId, UserSession>,
    next_generation: AtomicU64,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(config::session::ttl())
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            next_generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Starts a new request for `user_id`, invalidating every token issued before.
    pub fn begin(&self, user_id: UserId) -> SessionTicket {
        // The generation is drawn while the entry's shard lock is held, so the
        // session stored last always carries the highest generation for the user
        let mut session = self.sessions.entry(user_id).or_insert_with(UserSession::empty);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *session = UserSession {
            generation,
            ..UserSession::empty()
        };
        drop(session);
        log::debug!("Session generation {} started for user {}", generation, user_id);
        SessionTicket { user_id, generation }
    }

    /// Stores the resolved request and issues one token per option, in order.
    ///
    /// Fails with `Superseded` if `begin` was called again for the same user
    /// after this ticket was issued; the options are then discarded.
    pub fn put(
        &self,
        ticket: SessionTicket,
        request: MediaRequest,
        options: Vec<FormatOption>,
    ) -> Result<Vec<(SelectionToken, FormatOption)>, SessionError> {
        // get_mut holds the shard write lock, so check-and-store is atomic per user
        let mut entry = self
            .sessions
            .get_mut(&ticket.user_id)
            .filter(|session| session.generation == ticket.generation)
            .ok_or(SessionError::Superseded)?;

        let options: Vec<FormatOption> = options.into_iter().take(usize::from(u16::MAX)).collect();
        let tokens = options
            .iter()
            .enumerate()
            .map(|(index, option)| (SelectionToken::new(ticket.generation, index as u16), option.clone()))
            .collect();

        entry.request = Some(request);
        entry.options = options;
        entry.touched_at = Instant::now();

        Ok(tokens)
    }

    /// Resolves a token back to its request and option.
    ///
    /// Returns `None` for tokens from superseded or expired sessions, from another
    /// user's session, or with an out-of-range index.
    pub fn resolve(&self, user_id: UserId, token: &SelectionToken) -> Option<(MediaRequest, FormatOption)> {
        let session = self.sessions.get(&user_id)?;

        if session.generation != token.generation {
            log::info!(
                "Rejecting stale token {} for user {} (current generation {})",
                token,
                user_id,
                session.generation
            );
            return None;
        }
        if session.touched_at.elapsed() >= self.ttl {
            log::info!("Rejecting expired token {} for user {}", token, user_id);
            return None;
        }

        let request = session.request.clone()?;
        let option = session.options.get(usize::from(token.index))?.clone();
        Some((request, option))
    }

    /// Drops the user's session, if any.
    pub fn invalidate(&self, user_id: UserId) {
        self.sessions.remove(&user_id);
    }

    /// Whether `ticket` still belongs to the user's latest request.
    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.sessions
            .get(&ticket.user_id)
            .is_some_and(|session| session.generation == ticket.generation)
    }

    /// Removes sessions older than the TTL. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.touched_at.elapsed() < self.ttl);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            log::debug!("Pruned {} expired session(s)", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
