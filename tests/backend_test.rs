use std::{
    sync::mpsc::{self, RecvTimeoutError},
    time::Duration,
};

use log::LevelFilter;
use rand_core::OsRng;
use tendermint_gossip::{
    backend::{BackendSpec, Configuration, FaultyMode, SignError},
    events::{DropMessageEvent, MessageEvent, NewChainHeadEvent},
    types::{
        block::{Block, Header},
        crypto_primitives::{verify, SigningKey},
        data_types::{Address, BlockHeight, CryptoHash, EpochLength, Round},
    },
    validator_set_info::ValidatorSetInfoError,
};

mod common;

use crate::common::{chain::MockChain, logging::setup_logger, network::mock_broadcaster};

const EVENT_TIMEOUT: Duration = Duration::from_millis(500);

#[test]
fn sign_test() {
    setup_logger(LevelFilter::Trace);

    let me = SigningKey::generate(&mut OsRng {});
    let verifying_key = me.verifying_key();
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().me(me).build())
        .build()
        .start();

    let data = b"Here is a string....";
    let signature = backend.sign(data).unwrap();
    assert!(verify(&verifying_key, data, &signature));
    assert!(!verify(&verifying_key, b"Here is another string", &signature));
    assert_eq!(
        backend.address(),
        Some(Address::from_verifying_key(&verifying_key))
    );
}

#[test]
fn sign_without_key_fails() {
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().build())
        .build()
        .start();

    assert_eq!(backend.address(), None);
    assert_eq!(backend.sign(b"data"), Err(SignError::MissingSigningKey));
}

#[test]
fn fixed_validators_test() {
    setup_logger(LevelFilter::Trace);

    let me = SigningKey::generate(&mut OsRng {});
    let my_address = Address::from_verifying_key(&me.verifying_key());
    let backend = BackendSpec::builder()
        .configuration(
            Configuration::builder()
                .me(me)
                .fixed_validators(vec![my_address])
                .build(),
        )
        .build()
        .start();
    let chain = MockChain::default();

    for height in 0..3 {
        let validator_set = backend.validators(&chain, BlockHeight::new(height)).unwrap();
        assert_eq!(validator_set.size(), 1);
        assert_eq!(validator_set.list(), &[my_address]);
        assert_eq!(validator_set.proposer_for(Round::new(0)), Ok(my_address));
    }
}

#[test]
fn staking_validators_test() {
    setup_logger(LevelFilter::Trace);

    let genesis_validators: Vec<Address> = (1..=4).map(|i| Address::new([i; 20])).collect();
    let mut chain = MockChain::with_genesis(genesis_validators.clone());
    chain.insert_checkpoint(BlockHeight::new(10), genesis_validators[..3].to_vec());
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().epoch_length(EpochLength::new(10)).build())
        .build()
        .start();

    let validator_set = backend.validators(&chain, BlockHeight::new(9)).unwrap();
    assert_eq!(validator_set.list(), genesis_validators.as_slice());
    assert_eq!(validator_set.height(), BlockHeight::new(9));

    let validator_set = backend.validators(&chain, BlockHeight::new(10)).unwrap();
    assert_eq!(validator_set.size(), 3);

    assert!(matches!(
        backend.validators(&chain, BlockHeight::new(25)),
        Err(ValidatorSetInfoError::UnknownBlock { checkpoint })
            if checkpoint == BlockHeight::new(20)
    ));
}

#[test]
fn check_and_send_msg_posts_message_events() {
    setup_logger(LevelFilter::Trace);

    let (sender, messages) = mpsc::channel();
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().log_events(true).build())
        .on_message(move |event: &MessageEvent| sender.send(event.payload.clone()).unwrap())
        .build()
        .start();

    for i in 0..10u8 {
        backend.check_and_send_msg(vec![i]).unwrap();
    }
    for i in 0..10u8 {
        assert_eq!(messages.recv_timeout(EVENT_TIMEOUT).unwrap(), vec![i]);
    }
}

#[test]
fn faulty_backend_drops_some_messages() {
    setup_logger(LevelFilter::Trace);

    let (message_sender, messages) = mpsc::channel();
    let (drop_sender, drops) = mpsc::channel();
    let backend = BackendSpec::builder()
        .configuration(
            Configuration::builder()
                .faulty_mode(FaultyMode::RandomlyStopSendingMsg)
                .build(),
        )
        .on_message(move |_: &MessageEvent| message_sender.send(()).unwrap())
        .on_drop_message(move |_: &DropMessageEvent| drop_sender.send(()).unwrap())
        .build()
        .start();

    const MESSAGES: usize = 200;
    for _ in 0..MESSAGES {
        backend.check_and_send_msg(b"vote".to_vec()).unwrap();
    }

    let mut sent = 0;
    let mut dropped = 0;
    while sent + dropped < MESSAGES {
        if messages.recv_timeout(Duration::from_millis(1)).is_ok() {
            sent += 1;
        }
        if drops.recv_timeout(Duration::from_millis(1)).is_ok() {
            dropped += 1;
        }
    }
    assert!(sent > 0);
    assert!(dropped > 0);
}

#[test]
fn new_chain_head_is_posted() {
    setup_logger(LevelFilter::Trace);

    let (sender, heads) = mpsc::channel();
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().build())
        .on_new_chain_head(move |event: &NewChainHeadEvent| sender.send(event.height).unwrap())
        .build()
        .start();

    backend.handle_new_chain_head(BlockHeight::new(42)).unwrap();
    assert_eq!(heads.recv_timeout(EVENT_TIMEOUT), Ok(BlockHeight::new(42)));
    assert_eq!(
        heads.recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn handlers_registered_on_one_event_do_not_hide_others() {
    setup_logger(LevelFilter::Trace);

    // Only a chain head handler is registered: messages still go through the event bus.
    let (sender, heads) = mpsc::channel();
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().build())
        .on_new_chain_head(move |event: &NewChainHeadEvent| sender.send(event.height).unwrap())
        .build()
        .start();

    assert_eq!(backend.check_and_send_msg(b"vote".to_vec()), Ok(()));
    backend.handle_new_chain_head(BlockHeight::new(1)).unwrap();
    assert_eq!(heads.recv_timeout(EVENT_TIMEOUT), Ok(BlockHeight::new(1)));
}

#[test]
fn messages_are_posted_without_any_handler() {
    setup_logger(LevelFilter::Trace);

    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().build())
        .build()
        .start();

    for _ in 0..10 {
        assert_eq!(backend.check_and_send_msg(b"vote".to_vec()), Ok(()));
    }
    assert_eq!(backend.handle_new_chain_head(BlockHeight::new(1)), Ok(()));
}

#[test]
fn enqueue_forwards_to_the_broadcaster() {
    let backend = BackendSpec::builder()
        .configuration(Configuration::builder().build())
        .build()
        .start();
    let block = Block::new(
        Header::new(BlockHeight::new(5), CryptoHash::zero(), Vec::new()),
        Vec::new(),
    );

    // Without a broadcaster the block is dropped.
    backend.enqueue("peer-0", block.clone());

    let (broadcaster, _data) = mock_broadcaster(false);
    backend.set_broadcaster(broadcaster.clone());
    backend.enqueue("peer-1", block);
    assert_eq!(
        broadcaster.enqueued(),
        vec![("peer-1".to_string(), BlockHeight::new(5))]
    );
}
