//! Session provider for request handlers.
//!
//! Handlers depend on a [`SessionProvider`] (or on `Arc<dyn ProvideSession>`)
//! rather than on the engine directly:
//!
//! ```no_run
//! use notification_db::{Engine, SessionError, SessionProvider, SqlQuery};
//!
//! # fn main() -> Result<(), SessionError> {
//! let provider = SessionProvider::new(Engine::from_uri("sqlite:///notifications.db")?);
//! let changed = provider.with_session(|session| {
//!     session.execute(&SqlQuery::new("DELETE FROM notifications WHERE read = 1"))
//! })?;
//! # let _ = changed;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::task;

use crate::engine::Engine;
use crate::error::SessionError;
use crate::session::Session;

/// Async seam for handlers that need a session per request.
#[async_trait]
pub trait ProvideSession: Send + Sync {
    /// Acquire a session owned by the caller until it is dropped or closed.
    async fn acquire(&self) -> Result<Session, SessionError>;
}

/// Hands out one [`Session`] per invocation from a shared [`Engine`].
#[derive(Debug, Clone)]
pub struct SessionProvider {
    engine: Arc<Engine>,
}

impl SessionProvider {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Acquire a session.
    ///
    /// Fails without returning a session if no connection can be obtained
    /// within the engine's connect timeout.
    pub fn session(&self) -> Result<Session, SessionError> {
        self.engine.acquire()
    }

    /// Run `f` with a fresh session and release it afterwards.
    ///
    /// An error from `f` is returned unchanged after the session has been
    /// released; a failed release only surfaces when `f` succeeded.
    pub fn with_session<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let mut session = self.session()?;
        let outcome = f(&mut session);
        match outcome {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(err) => {
                drop(session);
                Err(err)
            }
        }
    }

    /// Async counterpart of [`with_session`](Self::with_session).
    ///
    /// Waiting for a free connection happens on tokio's blocking pool, so
    /// this must run inside a tokio runtime. The session is also released if
    /// the returned future is dropped before completion.
    pub async fn with_session_async<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<SessionError>,
    {
        let mut session = self.checkout().await?;
        let outcome = f(&mut session).await;
        match outcome {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(err) => {
                drop(session);
                Err(err)
            }
        }
    }

    // r2d2 blocks the calling thread while the pool is exhausted; a runtime
    // worker stuck there could never poll the task that would free a
    // connection.
    async fn checkout(&self) -> Result<Session, SessionError> {
        let engine = Arc::clone(&self.engine);
        task::spawn_blocking(move || engine.acquire())
            .await
            .map_err(|err| SessionError::Internal(format!("session checkout task failed: {err}")))?
    }
}

#[async_trait]
impl ProvideSession for SessionProvider {
    async fn acquire(&self) -> Result<Session, SessionError> {
        self.checkout().await
    }
}
