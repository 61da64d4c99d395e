/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Backend`]: signing, message dissemination, and the emission gate of the consensus engine.
//!
//! ## Starting a backend
//!
//! A backend is started by building a [`BackendSpec`] from a [`Configuration`], optionally a
//! [broadcaster](crate::networking::Broadcaster), and any number of event handlers, then calling
//! [`start`](BackendSpec::start) on it.
//!
//! ## Dissemination
//!
//! The backend offers two ways of sending a consensus message to other validators:
//! - [`Backend::gossip`] is fire-and-forget. It hands the message to a background worker that keeps retrying
//!   until enough validators have it, or until the chain moves past the message's height
//!   ([`Backend::handle_new_chain_head`]).
//! - [`Backend::multicast`] is a blocking, best-effort, single-shot send to an explicit set of addresses that
//!   reports exactly how many sends failed and how many addresses were unreachable.
//!
//! ## Fault injection
//!
//! Every consensus message the engine emits passes through [`Backend::check_and_send_msg`], which consults
//! the configured [`FaultyMode`] before posting it onto the event bus.

mod byzantine;
pub use byzantine::{decide_send, FaultyMode};

mod configuration;
pub use configuration::{BackendSpec, Configuration, GossipDeliveryThreshold, DEFAULT_GOSSIP_RETRY_INTERVAL};

mod gossip;

mod implementation;
pub use implementation::{Backend, EventBusError, GossipError, MulticastError, SignError};
