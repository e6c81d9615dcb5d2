//! Entity resolvers
//!
//! One module per normalized table. Every resolver takes a
//! transaction-scoped connection, finds its entity by natural key, inserts
//! on miss, and returns the durable id. Resolving the same natural key
//! twice is always a no-op success, never an error.

pub mod attendance;
pub mod donations;
pub mod event_instances;
pub mod event_types;
pub mod milestones;
pub mod participants;
pub mod surveys;
