/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which receives [events](crate::events) published by the backend and its gossip
//! workers, and invokes the handlers registered for them.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::{first_seven_base64_chars, Logger};

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus waits for an event before checking for shutdown again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) message_handlers: Vec<HandlerPtr<MessageEvent>>,
    pub(crate) new_chain_head_handlers: Vec<HandlerPtr<NewChainHeadEvent>>,
    pub(crate) gossip_handlers: Vec<HandlerPtr<GossipEvent>>,
    pub(crate) deliver_gossip_handlers: Vec<HandlerPtr<DeliverGossipEvent>>,
    pub(crate) cancel_gossip_handlers: Vec<HandlerPtr<CancelGossipEvent>>,
    pub(crate) multicast_handlers: Vec<HandlerPtr<MulticastEvent>>,
    pub(crate) drop_message_handlers: Vec<HandlerPtr<DropMessageEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, preceded by the default loggers if `log_events` is set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        message_handler: Option<HandlerPtr<MessageEvent>>,
        new_chain_head_handler: Option<HandlerPtr<NewChainHeadEvent>>,
        gossip_handler: Option<HandlerPtr<GossipEvent>>,
        deliver_gossip_handler: Option<HandlerPtr<DeliverGossipEvent>>,
        cancel_gossip_handler: Option<HandlerPtr<CancelGossipEvent>>,
        multicast_handler: Option<HandlerPtr<MulticastEvent>>,
        drop_message_handler: Option<HandlerPtr<DropMessageEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(user_handler);
            handlers
        }

        EventHandlers {
            message_handlers: handlers(log_events, message_handler),
            new_chain_head_handlers: handlers(log_events, new_chain_head_handler),
            gossip_handlers: handlers(log_events, gossip_handler),
            deliver_gossip_handlers: handlers(log_events, deliver_gossip_handler),
            cancel_gossip_handlers: handlers(log_events, cancel_gossip_handler),
            multicast_handlers: handlers(log_events, multicast_handler),
            drop_message_handlers: handlers(log_events, drop_message_handler),
        }
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::Message(message_event) => {
                if self.message_handlers.is_empty() {
                    log::warn!(
                        "no handler registered for consensus messages, message {} is not disseminated",
                        first_seven_base64_chars(&message_event.payload)
                    );
                }
                self.message_handlers
                    .iter()
                    .for_each(|handler| handler(&message_event))
            }

            Event::NewChainHead(new_chain_head_event) => self
                .new_chain_head_handlers
                .iter()
                .for_each(|handler| handler(&new_chain_head_event)),

            Event::Gossip(gossip_event) => self
                .gossip_handlers
                .iter()
                .for_each(|handler| handler(&gossip_event)),

            Event::DeliverGossip(deliver_gossip_event) => self
                .deliver_gossip_handlers
                .iter()
                .for_each(|handler| handler(&deliver_gossip_event)),

            Event::CancelGossip(cancel_gossip_event) => self
                .cancel_gossip_handlers
                .iter()
                .for_each(|handler| handler(&cancel_gossip_event)),

            Event::Multicast(multicast_event) => self
                .multicast_handlers
                .iter()
                .for_each(|handler| handler(&multicast_event)),

            Event::DropMessage(drop_message_event) => self
                .drop_message_handlers
                .iter()
                .for_each(|handler| handler(&drop_message_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher is gone, so no more events can arrive.
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
