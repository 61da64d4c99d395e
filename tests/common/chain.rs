use std::collections::HashMap;

use tendermint_gossip::{
    types::{
        block::{Header, TendermintExtra},
        data_types::{Address, BlockHeight, CryptoHash},
    },
    validator_set_info::ChainReader,
};

/// A chain stub that serves whichever headers it was given.
#[allow(dead_code)]
#[derive(Default)]
pub(crate) struct MockChain {
    headers: HashMap<BlockHeight, Header>,
}

#[allow(dead_code)]
impl MockChain {
    /// Create a chain whose genesis header elects `validators`.
    pub(crate) fn with_genesis(validators: Vec<Address>) -> MockChain {
        let mut chain = MockChain::default();
        chain.insert_checkpoint(BlockHeight::new(0), validators);
        chain
    }

    /// Insert a header at `height` that elects `validators`.
    pub(crate) fn insert_checkpoint(&mut self, height: BlockHeight, validators: Vec<Address>) {
        let extra = TendermintExtra::with_validators(validators).encode(b"test vanity");
        self.headers
            .insert(height, Header::new(height, CryptoHash::zero(), extra));
    }
}

impl ChainReader for MockChain {
    fn header_by_number(&self, height: BlockHeight) -> Option<Header> {
        self.headers.get(&height).cloned()
    }
}
