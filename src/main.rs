extern crate pbft_replica;

use std::env;
use std::process;

use log::error;

use pbft_replica::config::{self, ClientConfig, ReplicaConfig};
use pbft_replica::crypto::{self, Keys};
use pbft_replica::error::ReplicaError;
use pbft_replica::replica::Replica;

#[tokio::main]
async fn main() {
    if let Err(e) = config::initialize_logging() {
        eprintln!("failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run().await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ReplicaError> {
    let arg = env::args()
        .nth(1)
        .ok_or_else(|| ReplicaError::UnknownNodeId("<none given>".to_string()))?;

    if arg == "client" {
        let client_config = ClientConfig::new();
        crypto::provision_keys(&client_config.roster, &config::key_dir())?;
        if let Err(e) = pbft_replica::client::run(client_config).await {
            error!("client exited: {}", e);
            process::exit(1);
        }
        return Ok(());
    }

    let replica_config = ReplicaConfig::new(arg)?;
    crypto::provision_keys(&replica_config.roster, &replica_config.key_dir)?;

    let keys = Keys::load(
        &replica_config.roster,
        &replica_config.id,
        &replica_config.key_dir,
    )?;
    let replica = Replica::new(replica_config.id, replica_config.roster, keys);
    replica.run().await
}
