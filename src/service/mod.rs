//! Service layer: transactions, handler dispatch, and the mutation gateway.
//!
//! [`MutationGateway`] is the only writer of domain entities. It validates
//! input, writes through the caller's [`TransactionContext`], and runs the
//! handlers found in the [`HandlerRegistry`] before returning.
//! [`SignalService`] builds one unit of work per request on top of it.

pub mod dispatcher;
pub mod gateway;
pub mod handler_registry;
pub mod receivers;
pub mod signal_service;
pub mod transaction;

pub use dispatcher::{EventDispatcher, HandlerContext};
pub use gateway::MutationGateway;
pub use handler_registry::{FnHandler, HandlerRegistry, SignalHandler};
pub use receivers::{ProofReceiver, register_receivers};
pub use signal_service::SignalService;
pub use transaction::{TransactionContext, TxState};
