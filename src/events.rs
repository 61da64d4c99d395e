/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Events that the [backend](crate::backend) publishes onto the node's internal event bus.
//!
//! [`MessageEvent`]s carry consensus messages that passed the
//! [emission gate](crate::backend::Backend::check_and_send_msg) towards whichever component disseminates
//! them, and [`NewChainHeadEvent`]s announce that the canonical chain advanced. The remaining events report
//! what the gossip and multicast machinery did, and exist for observability.
//!
//! Note: an event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::data_types::{Address, BlockHeight, Round, Sequence};

pub enum Event {
    // Events consumed by the consensus engine.
    Message(MessageEvent),
    NewChainHead(NewChainHeadEvent),
    // Events that report on message dissemination.
    Gossip(GossipEvent),
    DeliverGossip(DeliverGossipEvent),
    CancelGossip(CancelGossipEvent),
    Multicast(MulticastEvent),
    DropMessage(DropMessageEvent),
}

impl Event {
    /// Publish `event` onto the event bus. Failures are ignored, since the event bus only goes away while
    /// the backend is shutting down.
    pub(crate) fn publish(event_publisher: &Sender<Event>, event: Event) {
        let _ = event_publisher.send(event);
    }
}

/// A consensus message was posted for dissemination.
pub struct MessageEvent {
    pub timestamp: SystemTime,
    pub payload: Vec<u8>,
}

/// The canonical chain advanced to `height`.
pub struct NewChainHeadEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
}

/// A background gossip task was started towards `targets` validators.
pub struct GossipEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub round: Round,
    pub sequence: Sequence,
    pub targets: usize,
}

/// A gossip task reached its delivery threshold after `attempts` attempts and terminated.
pub struct DeliverGossipEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub round: Round,
    pub sequence: Sequence,
    pub delivered: Vec<Address>,
    pub attempts: u32,
}

/// The gossip tasks of `height` were cancelled because the chain advanced past it.
pub struct CancelGossipEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
}

/// A multicast to `targets` addresses completed.
pub struct MulticastEvent {
    pub timestamp: SystemTime,
    pub targets: usize,
    pub failed: usize,
    pub missing: usize,
}

/// A consensus message was deliberately dropped by the fault injector.
pub struct DropMessageEvent {
    pub timestamp: SystemTime,
    pub payload: Vec<u8>,
}
