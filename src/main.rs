//! `nexus-agent`: binary entry point. Initializes logging, loads configuration, builds the
//! [`Engine`], and runs the stdio JSON-RPC tool server until stdin closes (spec §10.4).

use nexus_core::config;
use nexus_core::engine::Engine;
use nexus_core::logging;
use nexus_core::protocol;
use tracing::{error, info};

fn main() {
    logging::init(&logging::default_log_dir());

    let config = config::load().clone();

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "failed to initialize engine");
            std::process::exit(1);
        }
    };

    info!("nexus-agent starting stdio tool server");
    protocol::run_stdio(engine);
    info!("nexus-agent stdin closed, exiting");
}
