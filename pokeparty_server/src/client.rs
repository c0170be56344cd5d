// TCP client side of the roster exchange.
//
// `PartyClient::connect` performs the first two protocol steps on the calling
// thread: send the display-name line, then block for the catalogue frame. The
// caller picks a roster (see `picker.rs`) and hands it to `submit`, which
// frames and sends it. Nothing comes back from the server after the
// catalogue, so there is no reader thread.
//
// `send_start_game` writes the optional trailing name line. The server does
// not read it; it is sent and forgotten.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use pokeparty_protocol::{
    Catalogue, FrameError, RosterSelection, read_frame, write_frame, write_name_line,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    #[error("could not decode server data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid choice {input:?}: expected a number from 1 to {max}")]
    InvalidChoice { input: String, max: usize },

    #[error("type {0:?} has no creatures to choose from")]
    NoMembers(String),
}

/// An open connection that has completed the handshake.
pub struct PartyClient {
    writer: BufWriter<TcpStream>,
    // Held so the read half stays open until the client is dropped.
    _reader: BufReader<TcpStream>,
}

impl PartyClient {
    /// Connect to `addr`, announce `name`, and wait for the catalogue.
    ///
    /// `read_timeout` bounds the wait for the catalogue frame; `None` waits
    /// indefinitely.
    pub fn connect(
        addr: &str,
        name: &str,
        read_timeout: Option<Duration>,
    ) -> Result<(Self, Catalogue), ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(read_timeout)?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        write_name_line(&mut writer, name)?;
        let body = read_frame(&mut reader)?;
        let catalogue: Catalogue = serde_json::from_slice(&body)?;
        debug!(bytes = body.len(), types = catalogue.type_count(), "catalogue received");

        let client = Self {
            writer,
            _reader: reader,
        };
        Ok((client, catalogue))
    }

    /// Frame and send the finished roster.
    pub fn submit(&mut self, selection: &RosterSelection) -> Result<(), ClientError> {
        let json = serde_json::to_vec(selection)?;
        write_frame(&mut self.writer, &json)?;
        debug!(bytes = json.len(), "selection sent");
        Ok(())
    }

    /// Send the start-game name line. No reply is expected.
    pub fn send_start_game(&mut self, name: &str) -> Result<(), ClientError> {
        write_name_line(&mut self.writer, name)?;
        Ok(())
    }
}
