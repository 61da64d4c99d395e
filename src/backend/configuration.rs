/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The backend's [`Configuration`], and the [`BackendSpec`] that starts a [`Backend`] from it.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::event_bus::{start_event_bus, EventHandlers, HandlerPtr};
use crate::events::*;
use crate::networking::Broadcaster;
use crate::types::{
    crypto_primitives::{Keypair, SigningKey},
    data_types::{Address, EpochLength},
    validator_set::{ProposerPolicy, ValidatorSet},
};
use crate::validator_set_info::validator_set_info_from_config;

use super::byzantine::FaultyMode;
use super::gossip::SharedState;
use super::implementation::Backend;

/// Default time a gossip worker waits between two delivery attempts.
pub const DEFAULT_GOSSIP_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// How many validators a gossiped message must reach before its worker stops retrying.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GossipDeliveryThreshold {
    /// Stop after the first attempt that reaches at least one validator.
    #[default]
    AtLeastOne,
    /// Keep retrying the validators that have not received the message until a quorum of the validator set
    /// (counting this node, if it is a member) has it.
    Quorum,
}

impl GossipDeliveryThreshold {
    /// Get the number of `targets` (the validator set minus this node) that must receive a message.
    pub(crate) fn required_deliveries(
        &self,
        validator_set: &ValidatorSet,
        targets: usize,
        includes_me: bool,
    ) -> usize {
        match self {
            GossipDeliveryThreshold::AtLeastOne => 1.min(targets),
            GossipDeliveryThreshold::Quorum => validator_set
                .quorum_size()
                .saturating_sub(includes_me as usize)
                .max(1)
                .min(targets),
        }
    }
}

/// Stores the user-defined parameters required to start a [`Backend`].
///
/// ## Signing key
///
/// Validators must set [`me`](Self::me). A backend without a signing key can still disseminate messages
/// (e.g., on a non-validating node), but [`Backend::sign`] fails on it.
///
/// ## Validator source
///
/// If [`fixed_validators`](Self::fixed_validators) is non-empty, every height is governed by that list.
/// Otherwise validator sets are read from the staking checkpoint headers, one every
/// [`epoch_length`](Self::epoch_length) blocks.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages printed
/// onto a terminal or to a file, set up a
/// [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. Every parameter is optional:
    - `.me(...)`
    - `.faulty_mode(...)`
    - `.proposer_policy(...)`
    - `.epoch_length(...)`
    - `.fixed_validators(...)`
    - `.gossip_retry_interval(...)`
    - `.gossip_delivery_threshold(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(default, setter(strip_option, doc = "Set the node's signing key, used to sign consensus messages."))]
    pub me: Option<SigningKey>,
    #[builder(default, setter(doc = "Set the kind of Byzantine behavior to simulate. Defaults to none."))]
    pub faulty_mode: FaultyMode,
    #[builder(default, setter(doc = "Set the proposer selection policy. Defaults to round robin."))]
    pub proposer_policy: ProposerPolicy,
    #[builder(default, setter(doc = "Set the number of blocks between staking checkpoints. Defaults to 30000."))]
    pub epoch_length: EpochLength,
    #[builder(default, setter(doc = "Set a static validator list that governs every height."))]
    pub fixed_validators: Vec<Address>,
    #[builder(default = DEFAULT_GOSSIP_RETRY_INTERVAL, setter(doc = "Set the time between two gossip delivery attempts. Defaults to 20ms."))]
    pub gossip_retry_interval: Duration,
    #[builder(default, setter(doc = "Set how many validators a gossiped message must reach. Defaults to at least one."))]
    pub gossip_delivery_threshold: GossipDeliveryThreshold,
    #[builder(default, setter(doc = "Enable logging of events. Defaults to false."))]
    pub log_events: bool,
}

/// Stores the configuration, the broadcaster, and the event handlers required to start a [`Backend`].
///
/// ```ignore
/// let backend =
///     BackendSpec::builder()
///     .configuration(configuration)
///     .broadcaster(protocol_manager)
///     .on_message(message_handler)
///     .build()
///     .start()
/// ```
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [BackendSpec]. On the builder call the following methods to construct a valid [BackendSpec].

    Required:
    - `.configuration(...)`

    Optional:
    - `.broadcaster(...)`
    - `.on_message(...)`
    - `.on_new_chain_head(...)`
    - `.on_gossip(...)`
    - `.on_deliver_gossip(...)`
    - `.on_cancel_gossip(...)`
    - `.on_multicast(...)`
    - `.on_drop_message(...)`
"))]
pub struct BackendSpec {
    // Required parameters
    #[builder(setter(doc = "Set the [configuration](Configuration) of the backend. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(strip_option, doc = "Set the broadcaster used to find peers. It can also be set later with [Backend::set_broadcaster]. Optional."))]
    broadcaster: Option<Arc<dyn Broadcaster>>,
    #[builder(default, setter(transform = |handler: impl Fn(&MessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<MessageEvent>),
    doc = "Register a handler closure to be invoked after a consensus message passes the emission gate. Optional."))]
    on_message: Option<HandlerPtr<MessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&NewChainHeadEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<NewChainHeadEvent>),
    doc = "Register a handler closure to be invoked after the canonical chain advances. Optional."))]
    on_new_chain_head: Option<HandlerPtr<NewChainHeadEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&GossipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<GossipEvent>),
    doc = "Register a handler closure to be invoked after a gossip task is started. Optional."))]
    on_gossip: Option<HandlerPtr<GossipEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DeliverGossipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DeliverGossipEvent>),
    doc = "Register a handler closure to be invoked after a gossip task reaches its delivery threshold. Optional."))]
    on_deliver_gossip: Option<HandlerPtr<DeliverGossipEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CancelGossipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CancelGossipEvent>),
    doc = "Register a handler closure to be invoked after the gossip tasks of a height are cancelled. Optional."))]
    on_cancel_gossip: Option<HandlerPtr<CancelGossipEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&MulticastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<MulticastEvent>),
    doc = "Register a handler closure to be invoked after a multicast completes. Optional."))]
    on_multicast: Option<HandlerPtr<MulticastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DropMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DropMessageEvent>),
    doc = "Register a handler closure to be invoked after the fault injector drops a message. Optional."))]
    on_drop_message: Option<HandlerPtr<DropMessageEvent>>,
}

impl BackendSpec {
    /// Start the event bus thread and return the [`Backend`] that owns it.
    pub fn start(self) -> Backend {
        let configuration = self.configuration;
        let validator_set_info = validator_set_info_from_config(&configuration);

        let event_handlers = EventHandlers::new(
            configuration.log_events,
            self.on_message,
            self.on_new_chain_head,
            self.on_gossip,
            self.on_deliver_gossip,
            self.on_cancel_gossip,
            self.on_multicast,
            self.on_drop_message,
        );

        let (event_publisher, event_subscriber) = mpsc::channel();
        let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
        let event_bus =
            start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);

        Backend {
            keypair: configuration.me.map(Keypair::new),
            faulty_mode: configuration.faulty_mode,
            gossip_retry_interval: configuration.gossip_retry_interval,
            gossip_delivery_threshold: configuration.gossip_delivery_threshold,
            validator_set_info,
            shared: Arc::new(Mutex::new(SharedState::new(self.broadcaster))),
            event_publisher,
            event_bus: Some(event_bus),
            event_bus_shutdown: Some(event_bus_shutdown),
        }
    }
}
