extern crate log;
extern crate log4rs;
extern crate mc_utils;
extern crate rand;
extern crate tokio;

pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod messages;
pub mod network;
pub mod replica;
