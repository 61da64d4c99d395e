/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::types::{block::Block, data_types::Address};

use super::messages::MessageCode;

/// Resolves validator addresses into connected peers, and feeds blocks to the node's block fetcher.
pub trait Broadcaster: Send + Sync {
    /// Get the connected peers among `targets`. Addresses that are not connected are absent from the
    /// returned map; an empty map means that none of the targets is reachable.
    fn find_peers(&self, targets: &HashSet<Address>) -> HashMap<Address, Arc<dyn Peer>>;

    /// Add a `block` received from the peer identified by `origin` into the block fetcher's queue.
    fn enqueue(&self, origin: &str, block: Block);
}

/// A connected network participant.
pub trait Peer: Send + Sync {
    /// Send `payload` to this peer, tagged with `code`. Blocks until the transport accepts or rejects it.
    fn send(&self, code: MessageCode, payload: &[u8]) -> Result<(), SendError>;

    /// Get the address of this peer.
    fn address(&self) -> Address;
}

/// Error returned by a [`Peer`] that failed to send a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError(pub String);

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SendError {}
