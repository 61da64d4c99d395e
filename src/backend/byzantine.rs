/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byzantine fault injection.
//!
//! A backend configured with a [`FaultyMode`] other than [`FaultyMode::None`] deliberately misbehaves, so
//! that test networks can check that consensus stays safe and live in the presence of faulty validators.
//! Dropping a message this way is not an error.

use rand::Rng;

/// The kind of misbehavior a backend simulates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FaultyMode {
    /// Behave correctly.
    #[default]
    None,
    /// Drop each outgoing consensus message with probability one half.
    RandomlyStopSendingMsg,
}

impl FaultyMode {
    /// Read a faulty mode from its numeric code. Unknown codes mean [`FaultyMode::None`].
    pub fn from_u64(code: u64) -> FaultyMode {
        match code {
            1 => FaultyMode::RandomlyStopSendingMsg,
            _ => FaultyMode::None,
        }
    }

    pub fn to_u64(&self) -> u64 {
        match self {
            FaultyMode::None => 0,
            FaultyMode::RandomlyStopSendingMsg => 1,
        }
    }
}

/// Decide whether an outgoing consensus message should be sent (`true`) or silently dropped (`false`).
pub fn decide_send(faulty_mode: FaultyMode) -> bool {
    match faulty_mode {
        FaultyMode::RandomlyStopSendingMsg => {
            if rand::thread_rng().gen_bool(0.5) {
                log::warn!("Byzantine mode: sending message.");
                true
            } else {
                log::warn!("Byzantine mode: stop sending message.");
                false
            }
        }
        FaultyMode::None => true,
    }
}
