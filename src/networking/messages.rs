/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Message codes shared with the node's wire protocol.

/// Code that the wire protocol uses to tell message kinds apart.
pub type MessageCode = u64;

/// Code of consensus messages. It tells the protocol handler to pass the payload to the consensus engine
/// instead of handling it itself.
pub const TENDERMINT_MSG: MessageCode = 0x11;
