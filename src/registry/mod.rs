//! Connection registry
//!
//! The registry owns the listening socket and the set of live TCP
//! connections, drives one asynchronous receive loop per connection,
//! and provides addressed send primitives. Everything it observes is
//! reported through one typed event mailbox.
//!
//! # Architecture
//!
//! ```text
//!                    Arc<ConnectionRegistry>
//!               ┌───────────────────────────────┐
//!               │ connections: HashMap<u64,     │
//!               │   ConnectionEntry {           │
//!               │     writer: Mutex<WriteHalf>, │
//!               │     closing: Notify,          │
//!               │   }                           │
//!               │ >                             │
//!               └───────────────┬───────────────┘
//!        accept loop ──insert──►│◄──remove── receive loops / close
//!                               │
//!                               ▼
//!               mpsc::UnboundedSender<RegistryEvent>
//!                               │
//!                               ▼
//!                  [event pump: streaming server]
//! ```
//!
//! Connections are addressed by a stable identifier assigned at accept
//! time and never reused, so a send can never land on the wrong peer
//! after an earlier client disconnects.

pub mod config;
pub(crate) mod connection;
pub mod error;
pub mod event;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use event::RegistryEvent;
pub use store::ConnectionRegistry;
