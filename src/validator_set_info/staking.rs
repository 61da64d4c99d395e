/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Resolver that reads validator sets from staking checkpoints.
//!
//! At every checkpoint, i.e., every height that is a multiple of the [epoch length](EpochLength), the block
//! producer embeds the validators elected by the staking contract into the header's
//! [extra data](crate::types::block#header-extra-data). The validator set of any height is the one embedded
//! into the header of the latest checkpoint at or below that height.

use crate::types::{
    block::{checkpoint_height, extract_validators},
    data_types::{BlockHeight, EpochLength},
    validator_set::{ProposerPolicy, ValidatorSet},
};

use super::{ChainReader, ValidatorSetInfo, ValidatorSetInfoError};

#[derive(Clone, Debug)]
pub struct StakingValidatorSetInfo {
    epoch: EpochLength,
    policy: ProposerPolicy,
}

impl StakingValidatorSetInfo {
    pub fn new(epoch: EpochLength, policy: ProposerPolicy) -> Self {
        Self { epoch, policy }
    }
}

impl ValidatorSetInfo for StakingValidatorSetInfo {
    fn validator_set(
        &self,
        chain: &dyn ChainReader,
        height: BlockHeight,
    ) -> Result<ValidatorSet, ValidatorSetInfoError> {
        let checkpoint = checkpoint_height(self.epoch, height);

        let header = match chain.header_by_number(checkpoint) {
            Some(header) if !header.hash.is_zero() => header,
            _ => return Err(ValidatorSetInfoError::UnknownBlock { checkpoint }),
        };

        let validators = extract_validators(&header).map_err(|err| {
            log::error!(
                "can't get the validators' addresses from extra-data, height: {}, checkpoint: {}, error: {}",
                height,
                checkpoint,
                err
            );
            err
        })?;

        Ok(ValidatorSet::new(validators, self.policy, height))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::{
        block::{Header, TendermintExtra},
        data_types::{Address, CryptoHash},
    };

    struct MapChain(HashMap<BlockHeight, Header>);

    impl ChainReader for MapChain {
        fn header_by_number(&self, height: BlockHeight) -> Option<Header> {
            self.0.get(&height).cloned()
        }
    }

    fn checkpoint(height: u64, validators: Vec<Address>) -> (BlockHeight, Header) {
        let extra = TendermintExtra::with_validators(validators).encode(&[]);
        (
            BlockHeight::new(height),
            Header::new(BlockHeight::new(height), CryptoHash::zero(), extra),
        )
    }

    #[test]
    fn heights_in_the_same_epoch_share_a_validator_set() {
        let first: Vec<Address> = (1..=3).map(|i| Address::new([i; 20])).collect();
        let second: Vec<Address> = (4..=7).map(|i| Address::new([i; 20])).collect();
        let chain = MapChain(HashMap::from([
            checkpoint(0, first.clone()),
            checkpoint(10, second.clone()),
        ]));
        let info = StakingValidatorSetInfo::new(EpochLength::new(10), ProposerPolicy::RoundRobin);

        for height in 0..10 {
            let validator_set = info.validator_set(&chain, BlockHeight::new(height)).unwrap();
            assert_eq!(validator_set.list(), first.as_slice());
            assert_eq!(validator_set.height(), BlockHeight::new(height));
        }
        for height in 10..20 {
            let validator_set = info.validator_set(&chain, BlockHeight::new(height)).unwrap();
            assert_eq!(validator_set.list(), second.as_slice());
        }
    }

    #[test]
    fn missing_checkpoint_is_an_unknown_block() {
        let chain = MapChain(HashMap::from([checkpoint(0, vec![Address::new([1; 20])])]));
        let info = StakingValidatorSetInfo::new(EpochLength::new(10), ProposerPolicy::RoundRobin);

        assert!(matches!(
            info.validator_set(&chain, BlockHeight::new(15)),
            Err(ValidatorSetInfoError::UnknownBlock { checkpoint }) if checkpoint == BlockHeight::new(10)
        ));
    }

    #[test]
    fn zero_hash_checkpoint_is_an_unknown_block() {
        let extra = TendermintExtra::with_validators(vec![Address::new([1; 20])]).encode(&[]);
        let header = Header {
            number: BlockHeight::new(0),
            parent_hash: CryptoHash::zero(),
            extra,
            hash: CryptoHash::zero(),
        };
        let chain = MapChain(HashMap::from([(BlockHeight::new(0), header)]));
        let info = StakingValidatorSetInfo::new(EpochLength::new(10), ProposerPolicy::RoundRobin);

        assert!(matches!(
            info.validator_set(&chain, BlockHeight::new(3)),
            Err(ValidatorSetInfoError::UnknownBlock { .. })
        ));
    }

    #[test]
    fn malformed_extra_data_is_propagated() {
        let header = Header::new(BlockHeight::new(0), CryptoHash::zero(), vec![7u8; 4]);
        let chain = MapChain(HashMap::from([(BlockHeight::new(0), header)]));
        let info = StakingValidatorSetInfo::new(EpochLength::new(10), ProposerPolicy::RoundRobin);

        assert!(matches!(
            info.validator_set(&chain, BlockHeight::new(1)),
            Err(ValidatorSetInfoError::ExtraData(_))
        ));
    }
}
