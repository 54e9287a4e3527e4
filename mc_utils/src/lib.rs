#![warn(missing_docs)]

//! Crypto and file-handling helpers shared by the replica and client binaries.

pub mod crypto;
pub mod filehelper;
