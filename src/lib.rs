//! # sync-signals
//!
//! Synchronous, transaction-scoped signal dispatch for entity mutations.
//!
//! Every entity write goes through the [`service::MutationGateway`], which
//! runs the handlers registered for the `(entity kind, event kind)` pair on
//! the caller's thread, inside the caller's unit of work, before returning.
//! A failing handler dooms that unit of work, and a rollback discards the
//! handlers' writes together with the triggering mutation.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SignalService (service/)
//!     ├── MutationGateway ──▶ EventDispatcher ──▶ HandlerRegistry
//!     │        │                    │
//!     │        └──── TransactionContext ◀── HandlerContext
//!     │
//!     └── Storage (persistence/) ── MemoryStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
