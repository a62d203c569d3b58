//! # TCP Connection Abstraction
//!
//! Wraps a client stream in the line-oriented framing the command protocol
//! uses: one newline-terminated ASCII command per read, CR/LF stripped, plain
//! text responses with no explicit terminator. Line framing keeps the server
//! usable from netcat-style tools.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Upper bound on a single command line, to keep a hostile client from
/// growing the read buffer without ever sending a newline.
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// A client connection with buffered line reads.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Read one line, with CR/LF trimmed.
    ///
    /// Returns `Ok(None)` when the client closed the connection. A line
    /// longer than [`MAX_LINE_BYTES`] is an error that tears the
    /// connection down.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_BYTES);
        let bytes = limited.read_line(&mut line).await?;

        if bytes == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') && bytes as u64 == MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "command line too long",
            ));
        }

        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Write a text response and flush so the client sees it promptly.
    pub async fn send(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, peer) = listener.accept().await.unwrap();
        (Connection::new(server_side, peer), client)
    }

    #[tokio::test]
    async fn strips_cr_and_lf() {
        let (mut conn, mut client) = pair().await;
        client.write_all(b"init 3\r\n").await.unwrap();
        assert_eq!(conn.read_line().await.unwrap(), Some("init 3".to_string()));
    }

    #[tokio::test]
    async fn eof_yields_none() {
        let (mut conn, client) = pair().await;
        drop(client);
        assert_eq!(conn.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let (mut conn, mut client) = pair().await;
        let huge = vec![b'a'; 2 * MAX_LINE_BYTES as usize];
        client.write_all(&huge).await.unwrap();
        client.flush().await.unwrap();
        assert!(conn.read_line().await.is_err());
    }
}
