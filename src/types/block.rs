/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Header`] and [`Block`] types, the format of the validator list that staking
//! checkpoints embed into their headers, and the arithmetic that maps heights onto checkpoints.
//!
//! ## Header extra data
//!
//! The `extra` field of a header starts with [`EXTRA_VANITY`] bytes that block producers are free to fill
//! as they like, followed by the Borsh serialization of a [`TendermintExtra`]:
//!
//! ```text
//! | vanity (32 bytes) | borsh(TendermintExtra { validators, seal, committed_seals }) |
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use super::{
    crypto_primitives::sha256,
    data_types::{Address, BlockHeight, CryptoHash, EpochLength},
};

/// Number of bytes reserved at the start of a header's extra data for producer vanity.
pub const EXTRA_VANITY: usize = 32;

/// Header of a block, as read from the chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub number: BlockHeight,
    pub parent_hash: CryptoHash,
    pub extra: Vec<u8>,
    pub hash: CryptoHash,
}

impl Header {
    /// Create a header, computing its [hash](Self::hash).
    pub fn new(number: BlockHeight, parent_hash: CryptoHash, extra: Vec<u8>) -> Header {
        Header {
            number,
            parent_hash,
            hash: Header::hash(number, &parent_hash, &extra),
            extra,
        }
    }

    /// Compute the hash of a header with the given contents.
    pub fn hash(number: BlockHeight, parent_hash: &CryptoHash, extra: &Vec<u8>) -> CryptoHash {
        // Safety: serializing into a Vec cannot fail.
        let mut bytes = number.try_to_vec().unwrap();
        bytes.extend(parent_hash.try_to_vec().unwrap());
        bytes.extend(extra.try_to_vec().unwrap());
        sha256(&bytes)
    }
}

/// A block, which this crate only passes through to the block fetcher.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Vec<u8>>) -> Block {
        Block {
            header,
            transactions,
        }
    }

    pub fn number(&self) -> BlockHeight {
        self.header.number
    }
}

/// Consensus metadata carried in the extra data of a header after the vanity bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TendermintExtra {
    /// The validator set elected at this header. Only meaningful at checkpoints.
    pub validators: Vec<Address>,
    /// The proposer's seal over the header.
    pub seal: Vec<u8>,
    /// Seals of the validators that committed the block.
    pub committed_seals: Vec<Vec<u8>>,
}

impl TendermintExtra {
    /// Create the extra data of a header that carries only a validator list.
    pub fn with_validators(validators: Vec<Address>) -> TendermintExtra {
        TendermintExtra {
            validators,
            ..Default::default()
        }
    }

    /// Serialize into the [header extra data format](self#header-extra-data), using `vanity` for the prefix.
    /// `vanity` is truncated or zero-padded to exactly [`EXTRA_VANITY`] bytes.
    pub fn encode(&self, vanity: &[u8]) -> Vec<u8> {
        let mut extra = vec![0u8; EXTRA_VANITY];
        let len = vanity.len().min(EXTRA_VANITY);
        extra[..len].copy_from_slice(&vanity[..len]);
        // Safety: serializing into a Vec cannot fail.
        self.serialize(&mut extra).unwrap();
        extra
    }

    /// Parse the [header extra data format](self#header-extra-data).
    pub fn decode(extra: &[u8]) -> Result<TendermintExtra, ExtraDataError> {
        if extra.len() < EXTRA_VANITY {
            return Err(ExtraDataError::InvalidExtraDataFormat { len: extra.len() });
        }
        TendermintExtra::try_from_slice(&extra[EXTRA_VANITY..]).map_err(ExtraDataError::Deserialize)
    }
}

/// Read the validator addresses embedded into `header`'s extra data.
pub fn extract_validators(header: &Header) -> Result<Vec<Address>, ExtraDataError> {
    Ok(TendermintExtra::decode(&header.extra)?.validators)
}

/// Get the height of the checkpoint that governs the validator set of `height`, i.e., the greatest
/// multiple of `epoch` that is not greater than `height`.
pub fn checkpoint_height(epoch: EpochLength, height: BlockHeight) -> BlockHeight {
    match epoch.int() {
        0 => BlockHeight::new(0),
        epoch => BlockHeight::new(height.int() / epoch * epoch),
    }
}

/// Ways in which the extra data of a header can fail to parse.
#[derive(Debug)]
pub enum ExtraDataError {
    /// The extra data is shorter than the vanity prefix.
    InvalidExtraDataFormat { len: usize },

    /// The bytes after the vanity prefix are not a valid [`TendermintExtra`].
    Deserialize(std::io::Error),
}

impl Display for ExtraDataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExtraDataError::InvalidExtraDataFormat { len } => write!(
                f,
                "invalid extra-data format: {} bytes is shorter than the {} byte vanity",
                len, EXTRA_VANITY
            ),
            ExtraDataError::Deserialize(err) => write!(f, "cannot deserialize extra-data: {}", err),
        }
    }
}

impl std::error::Error for ExtraDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtraDataError::InvalidExtraDataFormat { .. } => None,
            ExtraDataError::Deserialize(err) => Some(err),
        }
    }
}
