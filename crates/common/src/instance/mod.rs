//! Single-instance coordination
//!
//! At start-up every launch races for a session-wide named mutex. The winner
//! becomes [`Role::Elected`]: it opens a receiving endpoint under a well-known
//! class and title, processes its own arguments, then renames the endpoint to
//! the "ready" title. Losers become [`Role::Relay`]: they look the elected
//! endpoint up by class and ready title, send it their arguments and exit.
//!
//! The rename is the publication signal. An endpoint that is still
//! initialising carries the plain title and cannot be found by a relay.
//!
//! ```text
//! Unelected --(mutex created)--> Elected
//!     |
//!     +------(mutex existed)---> Relay
//! ```
//!
//! The OS specifics live behind [`SessionBackend`]; [`memory::MemoryHost`]
//! provides an in-process backend.

pub mod memory;

use crate::queue::ArgBatch;
use crate::relay::{self, CopyData, RelayError};

pub const CLASS_NAME: &str = "MergeFSMC.CLS";
pub const MUTEX_NAME: &str = "MergeFSMC.MTX";
pub const WINDOW_NAME: &str = "MergeFSMC.WND";
pub const READY_WINDOW_NAME: &str = "MergeFSMC.WNDRDY";

/// Well-known names shared by every launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceNames {
    pub mutex: String,
    pub class: String,
    pub window: String,
    pub ready_window: String,
}

impl Default for InstanceNames {
    fn default() -> Self {
        Self {
            mutex: MUTEX_NAME.to_string(),
            class: CLASS_NAME.to_string(),
            window: WINDOW_NAME.to_string(),
            ready_window: READY_WINDOW_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Elected,
    Relay,
}

/// Outcome of trying to create the election mutex
pub enum Acquired<G> {
    /// Created fresh and owned by this process
    Owned(G),
    /// Already held by another process
    Existing,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("failed to create election mutex: {0}")]
    Election(String),
    #[error("failed to open receiving endpoint: {0}")]
    Endpoint(String),
    #[error("failed to publish receiving endpoint: {0}")]
    Publish(String),
    #[error("{0}")]
    Init(String),
    #[error("no ready instance found")]
    ElectedNotFound,
    #[error("failed to send arguments: {0}")]
    Send(String),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Session-scoped primitives the coordinator needs from the host OS
pub trait SessionBackend {
    /// Keeps the election mutex owned until dropped
    type Guard;
    /// Receiving endpoint of the elected process
    type Endpoint;
    /// Address of another process's endpoint
    type Target;

    fn acquire(&self, mutex_name: &str) -> Result<Acquired<Self::Guard>, CoordinationError>;

    fn open_endpoint(&self, class: &str, title: &str) -> Result<Self::Endpoint, CoordinationError>;

    fn publish(&self, endpoint: &Self::Endpoint, ready_title: &str) -> Result<(), CoordinationError>;

    fn find(&self, class: &str, ready_title: &str) -> Option<Self::Target>;

    /// Deliver a message synchronously; `Ok(false)` when the receiver declined it
    fn send(&self, target: &Self::Target, message: &CopyData) -> Result<bool, CoordinationError>;
}

/// Resources owned by the elected process for its whole lifetime
///
/// The endpoint is dropped before the guard, so the mutex is released last.
pub struct Elected<B: SessionBackend> {
    pub endpoint: B::Endpoint,
    _guard: B::Guard,
}

pub enum Role<B: SessionBackend> {
    Elected(Elected<B>),
    Relay {
        /// Whether the elected process acknowledged the arguments
        delivered: bool,
    },
}

impl<B: SessionBackend> Role<B> {
    pub fn state(&self) -> InstanceState {
        match self {
            Role::Elected(_) => InstanceState::Elected,
            Role::Relay { .. } => InstanceState::Relay,
        }
    }
}

pub struct Coordinator<B: SessionBackend> {
    backend: B,
    names: InstanceNames,
}

impl<B: SessionBackend> Coordinator<B> {
    pub fn new(backend: B, names: InstanceNames) -> Self {
        Self { backend, names }
    }

    /// Decide this launch's role
    ///
    /// When elected, `init` runs with the open endpoint and this launch's
    /// arguments before the endpoint is published; if it fails the endpoint
    /// and mutex are released and the error returned. When relaying, the
    /// arguments are sent to the elected process; a send the receiver
    /// declines or that fails is logged and reported as not delivered.
    pub fn start<F>(self, args: ArgBatch, init: F) -> Result<Role<B>, CoordinationError>
    where
        F: FnOnce(&B::Endpoint, ArgBatch) -> Result<(), CoordinationError>,
    {
        match self.backend.acquire(&self.names.mutex)? {
            Acquired::Owned(guard) => {
                tracing::info!(mutex = %self.names.mutex, "elected as controlling instance");
                let endpoint = self
                    .backend
                    .open_endpoint(&self.names.class, &self.names.window)?;
                init(&endpoint, args)?;
                self.backend
                    .publish(&endpoint, &self.names.ready_window)?;
                tracing::debug!(title = %self.names.ready_window, "receiving endpoint published");
                Ok(Role::Elected(Elected {
                    endpoint,
                    _guard: guard,
                }))
            }
            Acquired::Existing => {
                tracing::info!("another instance is running, relaying arguments");
                let target = self
                    .backend
                    .find(&self.names.class, &self.names.ready_window)
                    .ok_or(CoordinationError::ElectedNotFound)?;
                let message = relay::encode_args(&args)?;
                let delivered = match self.backend.send(&target, &message) {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!("elected instance did not accept the arguments");
                        false
                    }
                    Err(e) => {
                        tracing::warn!("relay failed: {}", e);
                        false
                    }
                };
                tracing::info!(count = args.len(), delivered, "arguments relayed");
                Ok(Role::Relay { delivered })
            }
        }
    }
}
