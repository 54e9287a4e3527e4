//! The demo client (§4.6, §6): reads lines from stdin, wraps each as a
//! `Request` addressed to the primary, and listens for the plain-text
//! REPLYs replicas send back.

use std::io::{self, BufRead};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use rand::Rng;

use crate::codec::{self};
use crate::config::{ClientConfig, PRIMARY_ID};
use crate::messages::{ClientMessage, Command, Request};
use crate::network;

/// Runs the client driver until stdin closes. Spawns its own REPLY listener
/// first so replies to the very first request aren't missed.
pub async fn run(config: ClientConfig) -> io::Result<()> {
    let listener = network::bind(&config.client_addr)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let _reply_listener = tokio::spawn(network::serve(listener, |frame| {
        info!("REPLY: {}", String::from_utf8_lossy(&frame));
    }));

    let primary_addr = match config.roster.addr_of(PRIMARY_ID) {
        Some(addr) => addr.to_string(),
        None => {
            error!("roster has no primary '{}'", PRIMARY_ID);
            return Ok(());
        }
    };

    println!("listening for replies on {}", config.client_addr);
    println!("enter a line to send it to the primary, or Ctrl-D to quit");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let content = line.trim().to_string();
        if content.is_empty() {
            continue;
        }

        let request = Request {
            timestamp: now_nanos(),
            client_addr: config.client_addr.clone(),
            message: ClientMessage {
                id: random_message_id(),
                content,
            },
        };

        let payload = serde_json::to_vec(&request).expect("Request serialises infallibly");
        let frame = codec::join(Command::Request, &payload);
        if let Err(e) = network::send_frame(&primary_addr, &frame).await {
            warn!("failed to send request to primary: {}", e);
        }
    }

    Ok(())
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_nanos() as i64
}

/// A ten-digit message id, rejecting the low end of the range the way the
/// reference client's `getRandom` does.
fn random_message_id() -> u64 {
    let mut rng = rand::rngs::OsRng;
    loop {
        let candidate: u64 = rng.gen_range(0..10_000_000_000);
        if candidate > 1_000_000_000 {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_message_id_is_always_ten_digits() {
        for _ in 0..100 {
            let id = random_message_id();
            assert!(id > 1_000_000_000);
            assert!(id < 10_000_000_000);
        }
    }
}
