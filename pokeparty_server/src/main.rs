// CLI entry point for the roster server.
//
// Loads the catalogue, then listens for clients until the process is
// killed. Every flag can also be set through the environment variable named
// in its help text. See `server.rs` for the networking architecture and
// `connection.rs` for the per-connection protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use pokeparty_server::{
    BundledSample, CatalogueFetcher, CatalogueStore, FileRosterStore, ServerConfig, init_tracing,
    start_server,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "party-server")]
#[command(author, version, about = "Serve the creature catalogue and collect rosters", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "POKEPARTY_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Catalogue document to serve
    #[arg(short, long, env = "POKEPARTY_CATALOGUE", default_value = "pokedex.json")]
    catalogue: PathBuf,

    /// Directory that receives `<name>.json` roster files
    #[arg(short, long, env = "POKEPARTY_ROSTER_DIR", default_value = ".")]
    roster_dir: PathBuf,

    /// Largest roster frame accepted from a client, in bytes
    #[arg(long, env = "POKEPARTY_MAX_FRAME", default_value_t = pokeparty_protocol::MAX_FRAME_SIZE)]
    max_frame_size: u32,

    /// Per-connection read/write timeout in seconds (unset waits forever)
    #[arg(long, env = "POKEPARTY_IO_TIMEOUT")]
    io_timeout_secs: Option<u64>,

    /// Maximum simultaneous connections (unset is unbounded)
    #[arg(long, env = "POKEPARTY_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Write the bundled sample catalogue if the catalogue document is missing
    #[arg(long)]
    bootstrap_sample: bool,
}

impl Cli {
    fn into_config(self) -> (ServerConfig, bool) {
        let config = ServerConfig {
            listen_addr: self.listen,
            catalogue_path: self.catalogue,
            roster_dir: self.roster_dir,
            max_frame_size: self.max_frame_size,
            io_timeout: self.io_timeout_secs.map(Duration::from_secs),
            max_connections: self.max_connections,
        };
        (config, self.bootstrap_sample)
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing("pokeparty_server=info");
    let (config, bootstrap_sample) = Cli::parse().into_config();

    let fetcher: Option<&dyn CatalogueFetcher> = if bootstrap_sample {
        Some(&BundledSample)
    } else {
        None
    };
    let store = CatalogueStore::load_or_fetch(&config.catalogue_path, fetcher)
        .with_context(|| format!("loading catalogue {}", config.catalogue_path.display()))?;
    let sink = FileRosterStore::new(&config.roster_dir);

    let (handle, addr) = start_server(&config, Arc::new(store), Arc::new(sink))
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(%addr, roster_dir = %config.roster_dir.display(), "ready for clients");

    handle.wait();
    Ok(())
}
