/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the backend's
//! [configuration](crate::backend::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [DeliverGossip](crate::events::DeliverGossipEvent) is printed:
//!
//! ```text
//! DeliverGossip, 1701329264, 12, 0, 2, 1, 3
//! ```
//!
//! In the snippet:
//! - The third, fourth, and fifth values are the height, round, and sequence of the gossiped message.
//! - The sixth value is the number of validators the message was delivered to.
//! - The seventh value is the number of attempts it took.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const MESSAGE: &str = "Message";
pub const NEW_CHAIN_HEAD: &str = "NewChainHead";
pub const GOSSIP: &str = "Gossip";
pub const DELIVER_GOSSIP: &str = "DeliverGossip";
pub const CANCEL_GOSSIP: &str = "CancelGossip";
pub const MULTICAST: &str = "Multicast";
pub const DROP_MESSAGE: &str = "DropMessage";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for MessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |message_event: &MessageEvent| {
            log::info!(
                "{}, {}, {}, {}",
                MESSAGE,
                secs_since_unix_epoch(message_event.timestamp),
                first_seven_base64_chars(&message_event.payload),
                message_event.payload.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for NewChainHeadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |new_chain_head_event: &NewChainHeadEvent| {
            log::info!(
                "{}, {}, {}",
                NEW_CHAIN_HEAD,
                secs_since_unix_epoch(new_chain_head_event.timestamp),
                new_chain_head_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for GossipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |gossip_event: &GossipEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                GOSSIP,
                secs_since_unix_epoch(gossip_event.timestamp),
                gossip_event.height,
                gossip_event.round,
                gossip_event.sequence,
                gossip_event.targets
            )
        };
        Box::new(logger)
    }
}

impl Logger for DeliverGossipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |deliver_gossip_event: &DeliverGossipEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                DELIVER_GOSSIP,
                secs_since_unix_epoch(deliver_gossip_event.timestamp),
                deliver_gossip_event.height,
                deliver_gossip_event.round,
                deliver_gossip_event.sequence,
                deliver_gossip_event.delivered.len(),
                deliver_gossip_event.attempts
            )
        };
        Box::new(logger)
    }
}

impl Logger for CancelGossipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |cancel_gossip_event: &CancelGossipEvent| {
            log::info!(
                "{}, {}, {}",
                CANCEL_GOSSIP,
                secs_since_unix_epoch(cancel_gossip_event.timestamp),
                cancel_gossip_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for MulticastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |multicast_event: &MulticastEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                MULTICAST,
                secs_since_unix_epoch(multicast_event.timestamp),
                multicast_event.targets,
                multicast_event.failed,
                multicast_event.missing
            )
        };
        Box::new(logger)
    }
}

impl Logger for DropMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |drop_message_event: &DropMessageEvent| {
            log::warn!(
                "{}, {}, {}",
                DROP_MESSAGE,
                secs_since_unix_epoch(drop_message_event.timestamp),
                first_seven_base64_chars(&drop_message_event.payload)
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
