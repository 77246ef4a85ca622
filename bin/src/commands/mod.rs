//! Command implementations for the ohlcvault CLI.

pub(crate) mod archive;
#[cfg(feature = "fetch")]
pub(crate) mod download;
pub(crate) mod restore;
