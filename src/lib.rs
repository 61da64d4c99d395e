/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The message-distribution layer of a Tendermint-style BFT consensus engine.
//!
//! This crate sits between the consensus state machine and the peer-to-peer network. It:
//! 1. Determines the [validator set](types::validator_set::ValidatorSet) that governs a height, either from
//!    a fixed list or from staking checkpoint headers ([validator_set_info]).
//! 2. Signs consensus messages with the node's key.
//! 3. Disseminates them to validators, with background retry ([`Backend::gossip`](backend::Backend::gossip))
//!    or as a blocking single shot ([`Backend::multicast`](backend::Backend::multicast)).
//! 4. Optionally simulates Byzantine behavior for testing ([`FaultyMode`](backend::FaultyMode)).
//!
//! Outcomes of interest are published as [events](events), which can be handled by user-defined closures
//! registered on the [`BackendSpec`](backend::BackendSpec), and optionally logged ([logging]).

pub mod types;

pub mod validator_set_info;

pub mod networking;

pub mod backend;

pub mod events;

pub mod logging;

pub(crate) mod event_bus;
