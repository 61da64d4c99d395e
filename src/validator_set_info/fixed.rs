/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Resolver backed by a static list of validators.

use crate::types::{
    data_types::{Address, BlockHeight},
    validator_set::{ProposerPolicy, ValidatorSet},
};

use super::{ChainReader, ValidatorSetInfo, ValidatorSetInfoError};

/// Resolves the same validators at every height.
#[derive(Clone, Debug)]
pub struct FixedValidatorSetInfo {
    addresses: Vec<Address>,
    policy: ProposerPolicy,
}

impl FixedValidatorSetInfo {
    pub fn new(addresses: Vec<Address>, policy: ProposerPolicy) -> Self {
        Self { addresses, policy }
    }
}

impl ValidatorSetInfo for FixedValidatorSetInfo {
    /// Never fails. `chain` is not consulted, and `height` is only recorded in the returned set.
    fn validator_set(
        &self,
        _chain: &dyn ChainReader,
        height: BlockHeight,
    ) -> Result<ValidatorSet, ValidatorSetInfoError> {
        Ok(ValidatorSet::new(
            self.addresses.iter().copied(),
            self.policy,
            height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::Header;

    struct EmptyChain;

    impl ChainReader for EmptyChain {
        fn header_by_number(&self, _: BlockHeight) -> Option<Header> {
            None
        }
    }

    #[test]
    fn same_members_at_every_height() {
        let addresses: Vec<Address> = (1..=4).map(|i| Address::new([i; 20])).collect();
        let info = FixedValidatorSetInfo::new(addresses.clone(), ProposerPolicy::RoundRobin);

        for height in [0, 1, 2, 1_000_000] {
            let validator_set = info
                .validator_set(&EmptyChain, BlockHeight::new(height))
                .unwrap();
            assert_eq!(validator_set.list(), addresses.as_slice());
            assert_eq!(validator_set.height(), BlockHeight::new(height));
        }
    }
}
