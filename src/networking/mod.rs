/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! The crate does not manage connections itself. The node's protocol manager resolves validator addresses
//! into connected peers through the [`Broadcaster`] trait, and each resolved [`Peer`] sends opaque payloads
//! tagged with a [message code](messages::MessageCode).

pub mod network;
pub use network::{Broadcaster, Peer, SendError};

pub mod messages;
