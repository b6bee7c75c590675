//! # Synchronization Primitives
//!
//! Wakeup plumbing shared by producers and consumers.

mod rendezvous;

pub use rendezvous::{Notify, RendezvousSlot};
