/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable strategies for resolving the [`ValidatorSet`] that is authoritative at a given height.
//!
//! Two strategies are provided:
//! 1. [`FixedValidatorSetInfo`]: a static list of validators, used by permissioned or test deployments.
//! 2. [`StakingValidatorSetInfo`]: reads the validator list that the staking contract embeds into the header
//!    of every epoch checkpoint.
//!
//! Resolvers hold no mutable state, so the same resolver can be shared between threads and queried
//! concurrently without locking. New strategies can be added by implementing [`ValidatorSetInfo`]; the
//! [backend](crate::backend) only ever consumes the `ValidatorSet`s they produce.

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::backend::Configuration;
use crate::types::{
    block::{ExtraDataError, Header},
    data_types::BlockHeight,
    validator_set::ValidatorSet,
};

pub mod fixed;
pub use fixed::FixedValidatorSetInfo;

pub mod staking;
pub use staking::StakingValidatorSetInfo;

/// Read-only view into the local chain, provided by chain storage.
pub trait ChainReader {
    /// Get the canonical header at `height`, if the chain has one.
    fn header_by_number(&self, height: BlockHeight) -> Option<Header>;
}

/// Strategy that produces the validator set of a height.
pub trait ValidatorSetInfo: Send + Sync {
    /// Get the validator set that is authoritative at `height`.
    fn validator_set(
        &self,
        chain: &dyn ChainReader,
        height: BlockHeight,
    ) -> Result<ValidatorSet, ValidatorSetInfoError>;
}

/// Build the resolver selected by `config`: the fixed resolver if
/// [`fixed_validators`](Configuration::fixed_validators) is non-empty, otherwise the staking resolver.
pub fn validator_set_info_from_config(config: &Configuration) -> Arc<dyn ValidatorSetInfo> {
    if !config.fixed_validators.is_empty() {
        Arc::new(FixedValidatorSetInfo::new(
            config.fixed_validators.clone(),
            config.proposer_policy,
        ))
    } else {
        Arc::new(StakingValidatorSetInfo::new(
            config.epoch_length,
            config.proposer_policy,
        ))
    }
}

/// Ways in which resolving a validator set can fail.
#[derive(Debug)]
pub enum ValidatorSetInfoError {
    /// The header of the checkpoint that governs the requested height is not known to the chain.
    UnknownBlock { checkpoint: BlockHeight },

    /// The checkpoint header's extra data does not carry a valid validator list.
    ExtraData(ExtraDataError),
}

impl From<ExtraDataError> for ValidatorSetInfoError {
    fn from(value: ExtraDataError) -> Self {
        ValidatorSetInfoError::ExtraData(value)
    }
}

impl Display for ValidatorSetInfoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorSetInfoError::UnknownBlock { checkpoint } => {
                write!(f, "unknown block: checkpoint {}", checkpoint)
            }
            ValidatorSetInfoError::ExtraData(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for ValidatorSetInfoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidatorSetInfoError::UnknownBlock { .. } => None,
            ValidatorSetInfoError::ExtraData(err) => Some(err),
        }
    }
}
