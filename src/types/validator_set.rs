/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`ValidatorSet`] type and the [`ProposerPolicy`] it selects proposers with.

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};

use super::data_types::{Address, BlockHeight, Round};

/// Rule that deterministically selects the proposer of a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProposerPolicy {
    /// The proposer of `round` at `height` is the validator at index `(height + round) mod size`.
    #[default]
    RoundRobin,
}

/// The ordered set of validators that is authoritative for a given block height.
///
/// ## Ordering of validators
///
/// Validators are kept in the order in which they were passed to [`ValidatorSet::new`]; a validator's
/// position in this order is its index. Duplicate addresses are dropped on construction, keeping the first
/// occurrence.
///
/// ## Immutability
///
/// A `ValidatorSet` is computed fresh by a [resolver](crate::validator_set_info::ValidatorSetInfo) for every
/// height and offers no way to change its members after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Address>,
    policy: ProposerPolicy,
    height: BlockHeight,
}

impl ValidatorSet {
    /// Create the validator set of `height` from `addresses`, selecting proposers using `policy`.
    pub fn new(
        addresses: impl IntoIterator<Item = Address>,
        policy: ProposerPolicy,
        height: BlockHeight,
    ) -> ValidatorSet {
        let mut seen = HashSet::new();
        let validators = addresses
            .into_iter()
            .filter(|address| seen.insert(*address))
            .collect();

        Self {
            validators,
            policy,
            height,
        }
    }

    /// Get the validators in canonical order.
    pub fn list(&self) -> &[Address] {
        &self.validators
    }

    /// Get the number of validators in the set.
    pub fn size(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Get the height this validator set was computed for.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    /// Get the index of `validator` in the [canonical order](Self#ordering-of-validators).
    pub fn position(&self, validator: &Address) -> Option<usize> {
        self.validators.iter().position(|v| v == validator)
    }

    /// Get the validators as an unordered set, e.g., to look up their peers.
    pub fn address_set(&self) -> HashSet<Address> {
        self.validators.iter().copied().collect()
    }

    /// Get the maximum number of faulty validators the set tolerates.
    pub fn f(&self) -> usize {
        self.size().saturating_sub(1) / 3
    }

    /// Get the number of validators that form a quorum, i.e., `ceil(2n / 3)`. An empty set has no quorum.
    pub fn quorum_size(&self) -> usize {
        (2 * self.size() + 2) / 3
    }

    /// Deterministically select the proposer of `round` at this set's height.
    ///
    /// Fails if the validator set is empty, which indicates a misconfigured validator source.
    pub fn proposer_for(&self, round: Round) -> Result<Address, ValidatorSetError> {
        if self.is_empty() {
            return Err(ValidatorSetError::EmptyValidatorSet {
                height: self.height,
            });
        }

        let index = match self.policy {
            ProposerPolicy::RoundRobin => {
                let size = self.size() as u64;
                ((self.height.int() % size + round.int() % size) % size) as usize
            }
        };

        Ok(self.validators[index])
    }
}

/// Ways in which a query on a [`ValidatorSet`] can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidatorSetError {
    /// A proposer was requested from a validator set with no members.
    EmptyValidatorSet { height: BlockHeight },
}

impl Display for ValidatorSetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorSetError::EmptyValidatorSet { height } => {
                write!(f, "validator set of height {} is empty", height)
            }
        }
    }
}

impl std::error::Error for ValidatorSetError {}
