//! Minimal SCPI client for bench power supplies.
//!
//! Commands and responses are newline-terminated ASCII over a raw TCP
//! socket (the "SCPI raw" service most LAN-capable supplies expose on port
//! 5025).

use crate::error::SourceError;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const DEFAULT_SCPI_PORT: u16 = 5025;

#[async_trait]
pub trait ScpiTransport: Send {
    /// Send a query and return the trimmed response line
    async fn query(&mut self, command: &str) -> Result<String, SourceError>;
}

/// SCPI over a raw TCP socket.
///
/// A timed-out or failed exchange can leave a late reply (or half of one)
/// in flight, so the next query reconnects instead of reading it as its own
/// answer.
pub struct TcpScpi {
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
    stale: bool,
}

async fn open(
    addr: &str,
    timeout: Duration,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf), SourceError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| SourceError::Timeout {
            query: format!("connect {addr}"),
            timeout_ms: timeout.as_millis() as u64,
        })??;
    stream.set_nodelay(true)?;

    let (read_half, write_half) = stream.into_split();
    Ok((BufReader::new(read_half), write_half))
}

impl TcpScpi {
    /// Connect to `addr` (`host` or `host:port`)
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, SourceError> {
        let addr = if addr.contains(':') {
            addr.to_string()
        } else {
            format!("{addr}:{DEFAULT_SCPI_PORT}")
        };

        let (reader, writer) = open(&addr, timeout).await?;
        Ok(Self {
            addr,
            reader,
            writer,
            timeout,
            stale: false,
        })
    }

    async fn reconnect(&mut self) -> Result<(), SourceError> {
        debug!("reconnecting to {} after a failed exchange", self.addr);
        let (reader, writer) = open(&self.addr, self.timeout).await?;
        self.reader = reader;
        self.writer = writer;
        self.stale = false;
        Ok(())
    }
}

#[async_trait]
impl ScpiTransport for TcpScpi {
    async fn query(&mut self, command: &str) -> Result<String, SourceError> {
        if self.stale {
            self.reconnect().await?;
        }

        let timeout = self.timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let exchange = async {
            self.writer.write_all(command.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await?;

            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "instrument closed the connection",
                )));
            }
            Ok::<String, SourceError>(line)
        };

        let result = tokio::time::timeout(timeout, exchange).await;
        let line = match result {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                self.stale = true;
                return Err(e);
            }
            Err(_) => {
                self.stale = true;
                return Err(SourceError::Timeout {
                    query: command.to_string(),
                    timeout_ms,
                });
            }
        };

        debug!("SCPI {} -> {}", command, line.trim());
        Ok(line.trim().to_string())
    }
}

/// Build a measurement query, optionally channel-qualified (`MEAS:VOLT? CH1`)
pub fn measure_query(quantity: &str, channel: Option<&str>) -> String {
    match channel {
        Some(ch) => format!("MEAS:{quantity}? {ch}"),
        None => format!("MEAS:{quantity}?"),
    }
}

/// Parse an SCPI numeric response such as `12.000`, `+1.2345E+00` or `0.512A`
pub fn parse_scpi_number(field: &str, raw: &str) -> Result<f64, SourceError> {
    let trimmed = raw.trim();
    let number = trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic() && c != 'E' && c != 'e');
    number.parse::<f64>().map_err(|_| SourceError::Malformed {
        field: field.to_string(),
        raw: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn builds_queries() {
        assert_eq!(measure_query("VOLT", None), "MEAS:VOLT?");
        assert_eq!(measure_query("CURR", Some("CH2")), "MEAS:CURR? CH2");
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_scpi_number("v", "12.000\n").unwrap(), 12.0);
        assert_eq!(parse_scpi_number("v", "+1.2345E+00").unwrap(), 1.2345);
        assert_eq!(parse_scpi_number("a", "0.512A").unwrap(), 0.512);
        assert!(parse_scpi_number("a", "ERR").is_err());
    }

    #[tokio::test]
    async fn queries_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                let reply = match line.as_str() {
                    "MEAS:VOLT?" => "5.012\n",
                    "MEAS:CURR?" => "0.734\n",
                    _ => "ERR\n",
                };
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let mut scpi = TcpScpi::connect(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(scpi.query("MEAS:VOLT?").await.unwrap(), "5.012");
        assert_eq!(scpi.query("MEAS:CURR?").await.unwrap(), "0.734");
        drop(scpi);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn silent_instrument_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut scpi = TcpScpi::connect(&addr.to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        let err = scpi.query("MEAS:VOLT?").await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout { .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn late_reply_is_not_taken_as_the_next_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // The first connection answers 150 ms late, later ones answer at once
        let server = tokio::spawn(async move {
            let mut connection = 0;
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                let slow = connection == 0;
                connection += 1;
                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.into_split();
                    let mut lines = BufReader::new(read_half).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if slow {
                            tokio::time::sleep(Duration::from_millis(150)).await;
                        }
                        let reply = match line.as_str() {
                            "MEAS:VOLT?" => "5.012\n",
                            "MEAS:CURR?" => "0.734\n",
                            _ => "ERR\n",
                        };
                        if write_half.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let mut scpi = TcpScpi::connect(&addr.to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        let err = scpi.query("MEAS:VOLT?").await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout { .. }));

        assert_eq!(scpi.query("MEAS:CURR?").await.unwrap(), "0.734");
        // Still in step once the stale reply would have landed
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(scpi.query("MEAS:VOLT?").await.unwrap(), "5.012");
        server.abort();
    }

    #[tokio::test]
    async fn closed_connection_is_reopened() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // Hang up on the first client without answering
            let (first, _) = listener.accept().await.unwrap();
            drop(first);
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                if write_half.write_all(b"0.734\n").await.is_err() {
                    break;
                }
            }
        });

        let mut scpi = TcpScpi::connect(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(scpi.query("MEAS:CURR?").await.is_err());
        assert_eq!(scpi.query("MEAS:CURR?").await.unwrap(), "0.734");
        drop(scpi);
        server.await.unwrap();
    }
}
