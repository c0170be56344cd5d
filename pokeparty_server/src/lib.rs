// pokeparty_server — roster server and interactive client.
//
// The server loads a creature catalogue once, then accepts TCP connections
// on a thread per connection. Each connection sends a display name, receives
// the catalogue, and submits one three-creature roster, which is validated
// and written to `<name>.json`. The client half drives the same exchange from
// a terminal.
//
// Module overview:
// - `server.rs`:          `ServerConfig`, `start_server`, accept loop,
//                         optional connection limit, `ServerHandle`.
// - `connection.rs`:      per-connection state machine and `serve_stream`.
// - `registry.rs`:        mutex-guarded append-only `SessionRegistry`.
// - `catalogue_store.rs`: load/bootstrap/validate/pre-encode the catalogue.
// - `roster_store.rs`:    `RosterSink` and the atomic-rename file store.
// - `client.rs`:          `PartyClient` and `ClientError`.
// - `picker.rs`:          numbered menus and roster assembly for the client.
//
// Binaries: `party-server` (src/main.rs) and `party-client`
// (src/bin/party_client.rs).

pub mod catalogue_store;
pub mod client;
pub mod connection;
pub mod picker;
pub mod registry;
pub mod roster_store;
pub mod server;

pub use catalogue_store::{BundledSample, CatalogueError, CatalogueFetcher, CatalogueStore};
pub use client::{ClientError, PartyClient};
pub use connection::{Completed, Connection, ConnectionContext, ConnectionError, HandlerState};
pub use registry::{SessionId, SessionRegistry, UserSession};
pub use roster_store::{FileRosterStore, PersistenceError, RosterSink};
pub use server::{ServerConfig, ServerHandle, start_server};

/// Install the `tracing` subscriber used by both binaries. `RUST_LOG`
/// overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
