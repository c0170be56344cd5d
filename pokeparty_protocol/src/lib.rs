// pokeparty_protocol — wire protocol shared by the roster server and clients.
//
// A client connects, sends its display name as a plain line, receives the
// whole creature catalogue as one frame, and answers with one framed Roster
// Selection. This crate defines every byte of that exchange and has no
// networking of its own: everything runs over `std::io::{Read, BufRead,
// Write}`, so the same code drives TCP streams, buffered wrappers, and
// in-memory cursors in tests.
//
// Module overview:
// - `framing.rs`:   4-byte little-endian length prefix + payload codec with a
//                   maximum frame size guard.
// - `handshake.rs`: the bare `\n`-terminated display-name line.
// - `catalogue.rs`: `Catalogue` / `TypeGroup` / `CreatureDetail` data model.
// - `roster.rs`:    `RosterSelection`, its validation rules, and the inert
//                   `Lobby` record.
// - `error.rs`:     `FrameError` and `RosterError`.
//
// Payloads are JSON (serde_json). The codec itself is payload-agnostic.

pub mod catalogue;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod roster;

pub use catalogue::{
    Catalogue, CreatureDetail, DamageRelations, MemberEntry, NamedRef, StatEntry, TypeGroup,
    TypeTag,
};
pub use error::{FrameError, RosterError};
pub use framing::{MAX_FRAME_SIZE, read_frame, read_frame_limited, write_frame};
pub use handshake::{MAX_NAME_LINE, read_name_line, write_name_line};
pub use roster::{Lobby, ROSTER_SIZE, RosterSelection};
