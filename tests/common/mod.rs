pub(crate) mod chain;

pub(crate) mod logging;

pub(crate) mod network;
