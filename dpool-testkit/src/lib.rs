//! Test support for dpool.
//!
//! Provides [`InMemoryTicketStore`], an in-process [`TicketStore`]
//! implementation with call accounting and one-shot failure injection,
//! for exercising the gate without a real backing table.
//!
//! [`TicketStore`]: dpool::TicketStore

mod store;

pub use store::{InMemoryTicketStore, StoreStats};
