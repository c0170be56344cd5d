// End-to-end tests for the roster pipeline.
//
// Each test starts a real server (via TestServer), connects real
// PartyClient instances (via TestClient), and checks what the server
// recorded: the session registry and the roster files on disk. Misbehaving
// peers are plain sockets so the test controls the exact bytes sent.

use std::collections::BTreeSet;
use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;

use pokeparty_protocol::{RosterSelection, read_frame, write_frame};
use pokeparty_tests::{TestClient, TestServer, WAIT_TIMEOUT};

fn names(selection: &RosterSelection) -> Vec<&str> {
    selection.selected.iter().map(|c| c.name.as_str()).collect()
}

/// Open a raw socket and complete the handshake, discarding the catalogue.
fn raw_handshake(addr: SocketAddr, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT_TIMEOUT)).unwrap();
    stream.write_all(format!("{name}\n").as_bytes()).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    read_frame(&mut reader).unwrap();
    stream
}

/// Block until the server closes `stream`.
fn assert_closed_by_server(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("expected the server to close, got {n} bytes"),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_client_round_trip() {
    let server = TestServer::start();
    let mut client = TestClient::connect(server.addr, "Ash");
    assert_eq!(client.catalogue.type_names(), vec!["grass", "fire", "water"]);

    let sent = client.pick("2", ["2", "1", "1"]);
    let stored = server.wait_for_roster("Ash");
    assert_eq!(stored, sent);
    assert_eq!(stored.type_name, "fire");
    assert_eq!(names(&stored), vec!["charmeleon", "charmander", "charmander"]);
    assert_eq!(server.roster_path("Ash").file_name().unwrap(), "Ash.json");

    let sessions = server.registry().snapshot();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name, "Ash");
}

#[test]
fn two_clients_select_concurrently() {
    let server = TestServer::start();
    let addr = server.addr;

    let ash = thread::spawn(move || TestClient::connect(addr, "Ash").pick("2", ["1", "2", "3"]));
    let misty =
        thread::spawn(move || TestClient::connect(addr, "Misty").pick("3", ["3", "3", "1"]));
    let ash_sent = ash.join().unwrap();
    let misty_sent = misty.join().unwrap();

    assert_eq!(server.wait_for_roster("Ash"), ash_sent);
    assert_eq!(server.wait_for_roster("Misty"), misty_sent);
    assert_eq!(names(&misty_sent), vec!["psyduck", "psyduck", "squirtle"]);

    let registered: BTreeSet<_> = server
        .registry()
        .snapshot()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(registered, BTreeSet::from(["Ash".to_owned(), "Misty".to_owned()]));
}

#[test]
fn many_clients_get_unique_sessions() {
    const CLIENTS: usize = 16;
    let server = TestServer::start();
    let addr = server.addr;

    let handles: Vec<_> = (0..CLIENTS)
        .map(|i| {
            thread::spawn(move || {
                TestClient::connect(addr, &format!("trainer-{i}")).pick("1", ["1", "2", "3"]);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for i in 0..CLIENTS {
        server.wait_for_roster(&format!("trainer-{i}"));
    }
    let sessions = server.registry().snapshot();
    assert_eq!(sessions.len(), CLIENTS);
    let ids: BTreeSet<_> = sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), CLIENTS);
}

#[test]
fn resubmission_overwrites_previous_roster() {
    let server = TestServer::start();

    TestClient::connect(server.addr, "Ash").pick("2", ["1", "1", "1"]);
    server.wait_for_roster_where("Ash", |r| r.type_name == "fire");

    TestClient::connect(server.addr, "Ash").pick("3", ["2", "2", "2"]);
    let stored = server.wait_for_roster_where("Ash", |r| r.type_name == "water");
    assert_eq!(names(&stored), vec!["wartortle"; 3]);

    // Both connections registered, even under the same name.
    server.wait_for_sessions(2);
}

#[test]
fn line_breaks_in_roster_name_are_stripped_from_file_name() {
    let server = TestServer::start();
    let mut client = TestClient::connect(server.addr, "Alice");

    // The name travels inside the roster exactly as typed, terminator and all.
    let grass = client.catalogue.group("grass").unwrap();
    let selection = RosterSelection {
        name: "Alice\r\n".into(),
        type_name: "grass".into(),
        selected: vec![grass.member_at(1).unwrap().clone(); 3],
    };
    client.submit(&selection);

    let stored = server.wait_for_roster("Alice");
    assert_eq!(stored.name, "Alice\r\n");
    assert!(server.roster_path("Alice").ends_with("Alice.json"));
}

#[test]
fn malformed_selection_aborts_only_that_connection() {
    let server = TestServer::start();

    let mut bad = raw_handshake(server.addr, "Mallory");
    write_frame(&mut bad, b"{\"Name\": ").unwrap();
    assert_closed_by_server(&mut bad);

    // The handshake had already registered Mallory; nothing was written.
    server.wait_for_sessions(1);
    assert!(server.store.load("Mallory").unwrap().is_none());

    TestClient::connect(server.addr, "Brock").pick("1", ["4", "4", "4"]);
    assert_eq!(names(&server.wait_for_roster("Brock")), vec!["bellsprout"; 3]);
}

#[test]
fn roster_violating_catalogue_is_not_persisted() {
    let server = TestServer::start();

    let mut stream = raw_handshake(server.addr, "Gary");
    let catalogue = TestClient::connect(server.addr, "Observer").catalogue;
    let fire = catalogue.group("fire").unwrap();

    // Only two picks.
    let short = RosterSelection {
        name: "Gary".into(),
        type_name: "fire".into(),
        selected: vec![fire.member_at(1).unwrap().clone(); 2],
    };
    write_frame(&mut stream, &serde_json::to_vec(&short).unwrap()).unwrap();
    assert_closed_by_server(&mut stream);
    assert!(server.store.load("Gary").unwrap().is_none());

    // Fire creatures declared as water.
    let mut stream = raw_handshake(server.addr, "Gary");
    let mislabeled = RosterSelection {
        name: "Gary".into(),
        type_name: "water".into(),
        selected: vec![fire.member_at(1).unwrap().clone(); 3],
    };
    write_frame(&mut stream, &serde_json::to_vec(&mislabeled).unwrap()).unwrap();
    assert_closed_by_server(&mut stream);
    assert!(server.store.load("Gary").unwrap().is_none());
}

#[test]
fn oversize_selection_frame_is_refused() {
    // Room for a real roster (about 2.3 KiB of JSON) but far below the
    // declared 1 MiB.
    const LIMIT: u32 = 4096;
    let server = TestServer::start_with(|c| c.max_frame_size = LIMIT);

    let mut stream = raw_handshake(server.addr, "Ash");
    stream.write_all(&(1u32 << 20).to_le_bytes()).unwrap();
    assert_closed_by_server(&mut stream);
    assert!(server.store.load("Ash").unwrap().is_none());

    // A normal roster still fits.
    let sent = TestClient::connect(server.addr, "Misty").pick("3", ["1", "1", "1"]);
    assert!(serde_json::to_vec(&sent).unwrap().len() < LIMIT as usize);
    assert_eq!(server.wait_for_roster("Misty"), sent);
}

#[test]
fn start_game_line_is_not_a_new_session() {
    let server = TestServer::start();
    let mut client = TestClient::connect(server.addr, "Ash");
    client.pick("2", ["1", "2", "3"]);
    client.send_start_game("Ash");

    server.wait_for_roster("Ash");
    drop(client);
    assert_eq!(server.registry().len(), 1);
}
