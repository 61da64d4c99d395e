use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
};

use tendermint_gossip::{
    networking::{messages::MessageCode, Broadcaster, Peer, SendError},
    types::{
        block::Block,
        data_types::{Address, BlockHeight},
    },
};

/// A mock broadcaster whose connectivity can be switched at runtime.
///
/// Every successful send to a peer marked as forwarding is passed on through the channel returned by
/// [`mock_broadcaster`]. Unless `forward_all` is set, only one (arbitrary) peer per [`find_peers`] call
/// forwards; the others accept the message silently.
pub(crate) struct MockBroadcaster {
    disconnected: AtomicBool,
    send_failed: AtomicBool,
    unreachable: Mutex<HashSet<Address>>,
    forward_all: bool,
    handler: Mutex<Sender<(Address, Vec<u8>)>>,
    sends: Arc<AtomicUsize>,
    enqueued: Mutex<Vec<(String, BlockHeight)>>,
}

pub(crate) fn mock_broadcaster(
    forward_all: bool,
) -> (Arc<MockBroadcaster>, Receiver<(Address, Vec<u8>)>) {
    let (sender, receiver) = mpsc::channel();
    let broadcaster = MockBroadcaster {
        disconnected: AtomicBool::new(false),
        send_failed: AtomicBool::new(false),
        unreachable: Mutex::new(HashSet::new()),
        forward_all,
        handler: Mutex::new(sender),
        sends: Arc::new(AtomicUsize::new(0)),
        enqueued: Mutex::new(Vec::new()),
    };
    (Arc::new(broadcaster), receiver)
}

#[allow(dead_code)]
impl MockBroadcaster {
    /// Make `find_peers` resolve nothing.
    pub(crate) fn set_disconnected(&self, disconnected: bool) {
        self.disconnected.store(disconnected, Ordering::SeqCst);
    }

    /// Make every resolved peer fail to send.
    pub(crate) fn set_send_failed(&self, send_failed: bool) {
        self.send_failed.store(send_failed, Ordering::SeqCst);
    }

    /// Make `find_peers` never resolve `address`.
    pub(crate) fn set_unreachable(&self, address: Address, unreachable: bool) {
        let mut set = self.unreachable.lock().unwrap();
        if unreachable {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    /// Number of sends attempted through peers resolved by this broadcaster, successful or not.
    pub(crate) fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub(crate) fn enqueued(&self) -> Vec<(String, BlockHeight)> {
        self.enqueued.lock().unwrap().clone()
    }
}

impl Broadcaster for MockBroadcaster {
    fn find_peers(&self, targets: &HashSet<Address>) -> HashMap<Address, Arc<dyn Peer>> {
        if self.disconnected.load(Ordering::SeqCst) {
            return HashMap::new();
        }

        let unreachable = self.unreachable.lock().unwrap().clone();
        let send_failed = self.send_failed.load(Ordering::SeqCst);
        let mut has_handler = false;
        let mut peers: HashMap<Address, Arc<dyn Peer>> = HashMap::new();
        for address in targets.difference(&unreachable) {
            let behavior = if send_failed {
                PeerBehavior::Fail
            } else if self.forward_all || !has_handler {
                has_handler = true;
                PeerBehavior::Forward(self.handler.lock().unwrap().clone())
            } else {
                PeerBehavior::Accept
            };
            let peer = MockPeer {
                address: *address,
                behavior: Mutex::new(behavior),
                sends: self.sends.clone(),
            };
            peers.insert(*address, Arc::new(peer));
        }
        peers
    }

    fn enqueue(&self, origin: &str, block: Block) {
        self.enqueued
            .lock()
            .unwrap()
            .push((origin.to_string(), block.number()));
    }
}

enum PeerBehavior {
    Forward(Sender<(Address, Vec<u8>)>),
    Accept,
    Fail,
}

struct MockPeer {
    address: Address,
    behavior: Mutex<PeerBehavior>,
    sends: Arc<AtomicUsize>,
}

impl Peer for MockPeer {
    fn send(&self, _code: MessageCode, payload: &[u8]) -> Result<(), SendError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        match &*self.behavior.lock().unwrap() {
            PeerBehavior::Forward(handler) => {
                let _ = handler.send((self.address, payload.to_vec()));
                Ok(())
            }
            PeerBehavior::Accept => Ok(()),
            PeerBehavior::Fail => Err(SendError("test send failed".to_string())),
        }
    }

    fn address(&self) -> Address {
        self.address
    }
}
