// Test-only harness for end-to-end roster tests.
//
// `TestServer` starts a real server on a random localhost port, serving the
// bundled sample catalogue and writing rosters into its own temporary
// directory. `TestClient` wraps the real `PartyClient` and the picker's
// menu helpers, so a test makes the same calls the terminal client makes,
// minus the prompts.
//
// The only test-specific code is the polling in `wait_for_*`: the server
// writes rosters and registers sessions on its own threads, so tests wait
// for the effect with a deadline instead of sleeping a fixed time.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pokeparty_protocol::{Catalogue, RosterSelection};
use pokeparty_server::picker::{build_selection, select_type};
use pokeparty_server::{
    BundledSample, CatalogueFetcher, CatalogueStore, FileRosterStore, PartyClient, ServerConfig,
    ServerHandle, SessionRegistry, start_server,
};
use tempfile::TempDir;

/// Default timeout for blocking waits.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running server plus the directory its rosters land in.
pub struct TestServer {
    handle: Option<ServerHandle>,
    pub addr: SocketAddr,
    pub store: FileRosterStore,
    // Dropped last so the directory outlives the server.
    _dir: TempDir,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Start with `tweak` applied to the default test configuration.
    pub fn start_with(tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().expect("create roster dir");
        let mut config = ServerConfig {
            listen_addr: "127.0.0.1:0".into(),
            roster_dir: dir.path().to_path_buf(),
            io_timeout: Some(WAIT_TIMEOUT),
            ..ServerConfig::default()
        };
        tweak(&mut config);

        let catalogue = BundledSample.fetch().expect("bundled sample catalogue");
        let store = Arc::new(CatalogueStore::new(catalogue).expect("valid catalogue"));
        let roster_store = FileRosterStore::new(dir.path());
        let (handle, addr) = start_server(&config, store, Arc::new(roster_store.clone()))
            .expect("start_server failed");
        Self {
            handle: Some(handle),
            addr,
            store: roster_store,
            _dir: dir,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.handle.as_ref().expect("server running").registry()
    }

    pub fn roster_path(&self, name: &str) -> PathBuf {
        self.store.path_for(name).expect("usable name")
    }

    /// Block until `name`'s roster file exists and return its contents.
    pub fn wait_for_roster(&self, name: &str) -> RosterSelection {
        let mut found = None;
        wait_until(&format!("roster for {name:?}"), || {
            found = self.store.load(name).expect("readable roster");
            found.is_some()
        });
        found.expect("roster present")
    }

    /// Block until `name`'s roster satisfies `cond`.
    pub fn wait_for_roster_where(
        &self,
        name: &str,
        mut cond: impl FnMut(&RosterSelection) -> bool,
    ) -> RosterSelection {
        let mut found = None;
        wait_until(&format!("matching roster for {name:?}"), || {
            found = self.store.load(name).expect("readable roster");
            found.as_ref().is_some_and(&mut cond)
        });
        found.expect("roster present")
    }

    /// Block until the registry holds at least `count` sessions.
    pub fn wait_for_sessions(&self, count: usize) {
        wait_until(&format!("{count} sessions"), || self.registry().len() >= count);
    }

    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// A test client wrapping a real `PartyClient`.
pub struct TestClient {
    client: PartyClient,
    pub name: String,
    pub catalogue: Catalogue,
}

impl TestClient {
    /// Connect, send the handshake, and receive the catalogue.
    pub fn connect(addr: SocketAddr, name: &str) -> Self {
        let (client, catalogue) = PartyClient::connect(&addr.to_string(), name, Some(WAIT_TIMEOUT))
            .expect("TestClient::connect failed");
        Self {
            client,
            name: name.to_owned(),
            catalogue,
        }
    }

    /// Answer the menus as a human would (type number, then three creature
    /// numbers) and submit the roster. Returns what was sent.
    pub fn pick(&mut self, type_choice: &str, picks: [&str; 3]) -> RosterSelection {
        let group = select_type(&self.catalogue, type_choice).expect("valid type choice");
        let selection = build_selection(&self.name, group, &picks).expect("valid picks");
        self.submit(&selection);
        selection
    }

    /// Send an arbitrary roster, bypassing the menus.
    pub fn submit(&mut self, selection: &RosterSelection) {
        self.client.submit(selection).expect("submit failed");
    }

    pub fn send_start_game(&mut self, name: &str) {
        self.client.send_start_game(name).expect("send_start_game failed");
    }
}

/// Poll `cond` until it holds, panicking after `WAIT_TIMEOUT`.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < WAIT_TIMEOUT, "timed out waiting for {what}");
        thread::sleep(POLL_INTERVAL);
    }
}
