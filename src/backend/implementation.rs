/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Implementation of the [`Backend`]'s methods.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crate::events::*;
use crate::networking::{messages::TENDERMINT_MSG, Broadcaster};
use crate::types::{
    block::Block,
    crypto_primitives::Keypair,
    data_types::{Address, BlockHeight, Round, Sequence, SignatureBytes},
    validator_set::ValidatorSet,
};
use crate::validator_set_info::{ChainReader, ValidatorSetInfo, ValidatorSetInfoError};

use super::byzantine::{decide_send, FaultyMode};
use super::configuration::GossipDeliveryThreshold;
use super::gossip::{lock, GossipTask, SharedState};

/// The consensus message-distribution engine of a node.
///
/// A `Backend` is started from a [`BackendSpec`](super::BackendSpec). It is meant to be shared (e.g., in an
/// `Arc`) between the consensus engine's threads: every method takes `&self`. When it is dropped, every live
/// gossip task is cancelled and the event bus thread is shut down.
pub struct Backend {
    pub(crate) keypair: Option<Keypair>,
    pub(crate) faulty_mode: FaultyMode,
    pub(crate) gossip_retry_interval: Duration,
    pub(crate) gossip_delivery_threshold: GossipDeliveryThreshold,
    pub(crate) validator_set_info: Arc<dyn ValidatorSetInfo>,
    pub(crate) shared: Arc<Mutex<SharedState>>,
    pub(crate) event_publisher: Sender<Event>,
    pub(crate) event_bus: Option<JoinHandle<()>>,
    pub(crate) event_bus_shutdown: Option<Sender<()>>,
}

impl Backend {
    /// Get the address of this node, if it has a signing key.
    pub fn address(&self) -> Option<Address> {
        self.keypair.as_ref().map(Keypair::address)
    }

    /// Sign `data` with this node's signing key.
    pub fn sign(&self, data: &[u8]) -> Result<SignatureBytes, SignError> {
        match &self.keypair {
            Some(keypair) => Ok(keypair.sign(data)),
            None => {
                log::error!("cannot sign: the backend was configured without a signing key");
                Err(SignError::MissingSigningKey)
            }
        }
    }

    /// Replace the broadcaster that gossip and multicast resolve peers with. Live gossip tasks use the new
    /// broadcaster from their next attempt on.
    pub fn set_broadcaster(&self, broadcaster: Arc<dyn Broadcaster>) {
        lock(&self.shared).broadcaster = Some(broadcaster);
    }

    /// Resolve the validator set of `height` using the configured validator source.
    pub fn validators(
        &self,
        chain: &dyn ChainReader,
        height: BlockHeight,
    ) -> Result<ValidatorSet, ValidatorSetInfoError> {
        self.validator_set_info
            .validator_set(chain, height)
            .map_err(|err| {
                log::error!("cannot resolve the validator set of height {}: {}", height, err);
                err
            })
    }

    /// Disseminate `payload` to every member of `validator_set` other than this node, in the background.
    ///
    /// This returns as soon as the inputs are validated and the task is registered. The task keeps retrying,
    /// every [retry interval](super::Configuration::gossip_retry_interval), until the payload has reached the
    /// [configured number](GossipDeliveryThreshold) of validators, or until
    /// [`handle_new_chain_head`](Self::handle_new_chain_head) is called with a height greater than or equal
    /// to `height`. Its outcome is never reported to the caller.
    ///
    /// Several tasks may be live for the same height at once. They run independently, and are cancelled
    /// together.
    pub fn gossip(
        &self,
        validator_set: &ValidatorSet,
        height: BlockHeight,
        round: Round,
        sequence: Sequence,
        payload: Vec<u8>,
    ) -> Result<(), GossipError> {
        if validator_set.is_empty() {
            return Err(GossipError::EmptyValidatorSet);
        }
        if payload.is_empty() {
            return Err(GossipError::EmptyPayload);
        }

        let me = self.address();
        let mut targets = validator_set.address_set();
        let includes_me = match me {
            Some(me) => targets.remove(&me),
            None => false,
        };
        if targets.is_empty() {
            log::debug!("gossip of height {}: this node is the only validator", height);
            return Ok(());
        }

        let required_deliveries =
            self.gossip_delivery_threshold
                .required_deliveries(validator_set, targets.len(), includes_me);
        let num_targets = targets.len();
        let signal = lock(&self.shared).registry.register(height);
        let task = GossipTask {
            targets,
            height,
            round,
            sequence,
            payload,
            required_deliveries,
            signal,
            created_at: Instant::now(),
        };

        let shared = self.shared.clone();
        let retry_interval = self.gossip_retry_interval;
        let event_publisher = self.event_publisher.clone();
        thread::spawn(move || task.run(shared, retry_interval, event_publisher));

        Event::publish(
            &self.event_publisher,
            Event::Gossip(GossipEvent {
                timestamp: SystemTime::now(),
                height,
                round,
                sequence,
                targets: num_targets,
            }),
        );
        Ok(())
    }

    /// Send `payload` once to every address in `targets`, blocking until every send returns.
    ///
    /// Fails if any target could not be found or sent to, reporting how many of each.
    pub fn multicast(&self, targets: &HashSet<Address>, payload: &[u8]) -> Result<(), MulticastError> {
        let broadcaster = lock(&self.shared)
            .broadcaster
            .clone()
            .ok_or(MulticastError::BroadcasterNotSet)?;

        let peers = broadcaster.find_peers(targets);
        let mut found = 0;
        let mut failed = 0;
        for (address, peer) in peers.iter().filter(|(address, _)| targets.contains(*address)) {
            found += 1;
            if let Err(err) = peer.send(TENDERMINT_MSG, payload) {
                log::warn!("multicast: failed to send to {}: {}", address, err);
                failed += 1;
            }
        }
        let missing = targets.len() - found;

        Event::publish(
            &self.event_publisher,
            Event::Multicast(MulticastEvent {
                timestamp: SystemTime::now(),
                targets: targets.len(),
                failed,
                missing,
            }),
        );

        if missing + failed == 0 {
            Ok(())
        } else {
            log::debug!(
                "multicast to {} address(es): {} failed, {} not found",
                targets.len(),
                failed,
                missing
            );
            Err(MulticastError::PartialDelivery { failed, missing })
        }
    }

    /// Inform the backend that the canonical chain advanced to `height`. Every gossip task started for
    /// `height` or a lower height is cancelled, and a [`NewChainHeadEvent`] is posted.
    pub fn handle_new_chain_head(&self, height: BlockHeight) -> Result<(), EventBusError> {
        let cancelled = lock(&self.shared).registry.cancel_up_to(height);
        for cancelled_height in cancelled {
            log::debug!(
                "new chain head {}: cancelled gossip of height {}",
                height,
                cancelled_height
            );
            Event::publish(
                &self.event_publisher,
                Event::CancelGossip(CancelGossipEvent {
                    timestamp: SystemTime::now(),
                    height: cancelled_height,
                }),
            );
        }

        self.post(Event::NewChainHead(NewChainHeadEvent {
            timestamp: SystemTime::now(),
            height,
        }))
    }

    /// Post `payload` as a [`MessageEvent`], unless the fault injector decides to drop it.
    pub fn check_and_send_msg(&self, payload: Vec<u8>) -> Result<(), EventBusError> {
        if !decide_send(self.faulty_mode) {
            Event::publish(
                &self.event_publisher,
                Event::DropMessage(DropMessageEvent {
                    timestamp: SystemTime::now(),
                    payload,
                }),
            );
            return Ok(());
        }

        self.post(Event::Message(MessageEvent {
            timestamp: SystemTime::now(),
            payload,
        }))
    }

    /// Pass `block`, received from `origin`, to the block fetcher.
    pub fn enqueue(&self, origin: &str, block: Block) {
        let broadcaster = lock(&self.shared).broadcaster.clone();
        match broadcaster {
            Some(broadcaster) => broadcaster.enqueue(origin, block),
            None => log::debug!(
                "dropping block {} from {}: no broadcaster set",
                block.number(),
                origin
            ),
        }
    }

    /// Get the heights that currently have live gossip tasks, in ascending order.
    pub fn live_gossip_heights(&self) -> Vec<BlockHeight> {
        lock(&self.shared).registry.heights()
    }

    /// Post `event` onto the event bus.
    fn post(&self, event: Event) -> Result<(), EventBusError> {
        self.event_publisher
            .send(event)
            .map_err(|_| EventBusError::Disconnected)
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        lock(&self.shared).registry.cancel_all();

        if let Some(shutdown) = self.event_bus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}

/// Ways in which [`Backend::sign`] can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum SignError {
    /// The backend was configured without a signing key.
    MissingSigningKey,
}

impl Display for SignError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SignError::MissingSigningKey => write!(f, "no signing key configured"),
        }
    }
}

impl std::error::Error for SignError {}

/// Ways in which [`Backend::gossip`] can reject its inputs.
#[derive(Debug, PartialEq, Eq)]
pub enum GossipError {
    EmptyValidatorSet,
    EmptyPayload,
}

impl Display for GossipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GossipError::EmptyValidatorSet => write!(f, "cannot gossip to an empty validator set"),
            GossipError::EmptyPayload => write!(f, "cannot gossip an empty payload"),
        }
    }
}

impl std::error::Error for GossipError {}

/// Ways in which [`Backend::multicast`] can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum MulticastError {
    /// `failed` targets were found but could not be sent to, and `missing` targets were not found.
    PartialDelivery { failed: usize, missing: usize },

    /// No broadcaster has been set yet.
    BroadcasterNotSet,
}

impl Display for MulticastError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MulticastError::PartialDelivery { failed, missing } => write!(
                f,
                "failed to multicast: failed to send {} address, not found {} address",
                failed, missing
            ),
            MulticastError::BroadcasterNotSet => write!(f, "failed to multicast: no broadcaster set"),
        }
    }
}

impl std::error::Error for MulticastError {}

/// Error returned when an event cannot be posted because the event bus thread is gone.
#[derive(Debug, PartialEq, Eq)]
pub enum EventBusError {
    Disconnected,
}

impl Display for EventBusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EventBusError::Disconnected => write!(f, "event bus disconnected"),
        }
    }
}

impl std::error::Error for EventBusError {}
