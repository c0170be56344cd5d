// Per-connection protocol handler.
//
// Every accepted TCP connection gets its own thread running one `Connection`
// through a fixed sequence of states:
//
//   AwaitingHandshake → CatalogueSent → AwaitingSelection → Done
//                                                           ↘ Aborted
//
// - `AwaitingHandshake`: read the display-name line, register a session.
// - `CatalogueSent`: write the pre-encoded catalogue as one frame.
// - `AwaitingSelection`: read one frame, decode and validate the Roster
//   Selection, hand it to the roster sink.
// - `Done` / `Aborted`: terminal.
//
// Any error aborts: `step` returns it, the state becomes `Aborted` (the
// state that failed is kept for diagnostics), and the caller drops the
// stream. There are no retries and the peer is not told why.
// Errors never touch shared state beyond the registry append, which happens
// only after a good handshake.
//
// `Connection` is generic over its read and write halves so tests can drive
// it with in-memory buffers; `serve_stream` is the TCP entry point used by
// the accept loop.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pokeparty_protocol::{
    FrameError, MAX_NAME_LINE, RosterError, RosterSelection, read_frame_limited, read_name_line,
    write_frame,
};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::catalogue_store::CatalogueStore;
use crate::registry::{SessionRegistry, UserSession, format_listing};
use crate::roster_store::{PersistenceError, RosterSink};

/// Everything a connection needs from the server, shared by all of them.
pub struct ConnectionContext {
    pub store: Arc<CatalogueStore>,
    pub registry: Arc<SessionRegistry>,
    pub sink: Arc<dyn RosterSink>,
    pub max_frame_size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    AwaitingHandshake,
    CatalogueSent,
    AwaitingSelection,
    Done,
    Aborted,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("handshake failed: {0}")]
    Handshake(#[source] FrameError),

    #[error("failed to send catalogue: {0}")]
    SendCatalogue(#[source] FrameError),

    #[error("failed to read selection: {0}")]
    ReadSelection(#[source] FrameError),

    #[error("undecodable selection: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid selection: {0}")]
    InvalidSelection(#[from] RosterError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("connection already finished")]
    Finished,
}

impl ConnectionError {
    /// True when the transport failed rather than the peer misbehaving.
    pub fn is_io(&self) -> bool {
        match self {
            ConnectionError::Handshake(e)
            | ConnectionError::SendCatalogue(e)
            | ConnectionError::ReadSelection(e) => !e.is_protocol_violation(),
            _ => false,
        }
    }
}

/// What a connection produced when it reached `Done`.
#[derive(Debug)]
pub struct Completed {
    pub session: UserSession,
    pub selection: RosterSelection,
    pub saved_to: PathBuf,
}

pub struct Connection<'a, R, W> {
    reader: R,
    writer: W,
    peer_port: u16,
    ctx: &'a ConnectionContext,
    state: HandlerState,
    failed_in: Option<HandlerState>,
    session: Option<UserSession>,
    result: Option<(RosterSelection, PathBuf)>,
}

impl<'a, R: BufRead, W: Write> Connection<'a, R, W> {
    pub fn new(reader: R, writer: W, peer_port: u16, ctx: &'a ConnectionContext) -> Self {
        Self {
            reader,
            writer,
            peer_port,
            ctx,
            state: HandlerState::AwaitingHandshake,
            failed_in: None,
            session: None,
            result: None,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// The state whose work failed, once the connection is `Aborted`.
    pub fn failed_in(&self) -> Option<HandlerState> {
        self.failed_in
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    /// Perform the work of the current state and advance to the next one.
    pub fn step(&mut self) -> Result<HandlerState, ConnectionError> {
        let next = match self.state {
            HandlerState::AwaitingHandshake => self
                .receive_handshake()
                .map(|()| HandlerState::CatalogueSent),
            HandlerState::CatalogueSent => self
                .send_catalogue()
                .map(|()| HandlerState::AwaitingSelection),
            HandlerState::AwaitingSelection => {
                self.receive_selection().map(|()| HandlerState::Done)
            }
            HandlerState::Done | HandlerState::Aborted => return Err(ConnectionError::Finished),
        };
        match next {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(e) => {
                self.failed_in = Some(self.state);
                self.state = HandlerState::Aborted;
                Err(e)
            }
        }
    }

    /// Step until `Done` and return what the connection produced.
    pub fn run(mut self) -> Result<Completed, ConnectionError> {
        while self.state != HandlerState::Done {
            self.step()?;
        }
        match (self.session, self.result) {
            (Some(session), Some((selection, saved_to))) => Ok(Completed {
                session,
                selection,
                saved_to,
            }),
            _ => Err(ConnectionError::Finished),
        }
    }

    fn receive_handshake(&mut self) -> Result<(), ConnectionError> {
        let name =
            read_name_line(&mut self.reader, MAX_NAME_LINE).map_err(ConnectionError::Handshake)?;
        let session = self.ctx.registry.register(self.peer_port, name);
        info!(session = %session.id, peer_port = session.peer_port, name = %session.name, "new session");
        debug!("{}", format_listing(&self.ctx.registry.snapshot()));
        self.session = Some(session);
        Ok(())
    }

    fn send_catalogue(&mut self) -> Result<(), ConnectionError> {
        let payload = self.ctx.store.encoded();
        write_frame(&mut self.writer, payload).map_err(ConnectionError::SendCatalogue)?;
        info!(bytes = payload.len(), "catalogue delivered");
        Ok(())
    }

    fn receive_selection(&mut self) -> Result<(), ConnectionError> {
        let body = read_frame_limited(&mut self.reader, self.ctx.max_frame_size)
            .map_err(ConnectionError::ReadSelection)?;
        let selection: RosterSelection = serde_json::from_slice(&body)?;
        selection.validate_against(self.ctx.store.catalogue())?;
        let saved_to = self.ctx.sink.persist(&selection)?;
        info!(
            type_name = %selection.type_name,
            path = %saved_to.display(),
            "selection persisted"
        );
        self.result = Some((selection, saved_to));
        Ok(())
    }
}

/// Run the protocol over an accepted TCP stream and log how it ended. The
/// stream is closed when this returns.
pub fn serve_stream(stream: TcpStream, ctx: &ConnectionContext, io_timeout: Option<Duration>) {
    let peer = stream.peer_addr().ok();
    let span = info_span!("conn", peer = %peer.map_or_else(|| "?".to_owned(), |p| p.to_string()));
    let _enter = span.enter();

    if let Err(e) = stream
        .set_read_timeout(io_timeout)
        .and_then(|()| stream.set_write_timeout(io_timeout))
    {
        warn!(error = %e, "failed to set socket timeouts");
        return;
    }
    let read_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to clone stream");
            return;
        }
    };

    let peer_port = peer.map_or(0, |p| p.port());
    let mut conn = Connection::new(
        BufReader::new(read_half),
        BufWriter::new(stream),
        peer_port,
        ctx,
    );
    loop {
        match conn.step() {
            Ok(HandlerState::Done) => {
                debug!("connection done");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let state = conn.failed_in();
                match e {
                    ConnectionError::Persistence(_) => {
                        warn!(error = %e, ?state, "could not persist roster; connection aborted");
                    }
                    _ if e.is_io() => info!(error = %e, ?state, "connection aborted"),
                    _ => warn!(error = %e, ?state, "protocol violation; connection aborted"),
                }
                return;
            }
        }
    }
}
