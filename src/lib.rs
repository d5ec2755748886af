//! Scoped SQLite sessions for the notification service.
//!
//! # Intention
//!
//! - Build one process-wide [`Engine`] from a configured connection descriptor.
//! - Hand request handlers one [`Session`] per request through a
//!   [`SessionProvider`], releasing it exactly once when their scope ends.
//!
//! # Architectural Boundaries
//!
//! - Only connection and session plumbing belongs here.
//! - No ORM, query building or migrations; callers bring their own SQL.

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod provider;
pub mod session;
pub mod sqlite;

pub use config::{ConfigError, DatabaseConfig};
pub use descriptor::ConnectionDescriptor;
pub use engine::Engine;
pub use error::SessionError;
pub use provider::{ProvideSession, SessionProvider};
pub use session::{Session, SessionStats};
pub use sqlite::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, ForeignKey, ForeignKeyAction,
    IndexDefinition, Params, Row, Schema, SqlQuery, TableDefinition, Value,
};
