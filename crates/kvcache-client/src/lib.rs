//! Minimal async client for the text memcached-subset protocol, used by
//! `kvcache-server`'s integration tests and suitable for ad hoc tooling.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected server reply: {0}")]
    Protocol(String),
}

pub struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ClientError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(ClientError::Protocol("connection closed".into()));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    async fn store_command(
        &mut self,
        verb: &str,
        key: &str,
        value: &[u8],
    ) -> Result<bool, ClientError> {
        let header = format!("{verb} {key} 0 0 {}\r\n", value.len());
        self.send(header.as_bytes()).await?;
        self.send(value).await?;
        self.send(b"\r\n").await?;
        let reply = self.read_line().await?;
        match reply.as_str() {
            "STORED" => Ok(true),
            "NOT_STORED" => Ok(false),
            other => Err(ClientError::Protocol(other.to_string())),
        }
    }

    pub async fn set(&mut self, key: &str, value: &[u8]) -> Result<bool, ClientError> {
        self.store_command("set", key, value).await
    }

    pub async fn add(&mut self, key: &str, value: &[u8]) -> Result<bool, ClientError> {
        self.store_command("add", key, value).await
    }

    pub async fn replace(&mut self, key: &str, value: &[u8]) -> Result<bool, ClientError> {
        self.store_command("replace", key, value).await
    }

    pub async fn append(&mut self, key: &str, value: &[u8]) -> Result<bool, ClientError> {
        self.store_command("append", key, value).await
    }

    pub async fn delete(&mut self, key: &str) -> Result<bool, ClientError> {
        self.send(format!("delete {key}\r\n").as_bytes()).await?;
        let reply = self.read_line().await?;
        match reply.as_str() {
            "DELETED" => Ok(true),
            "NOT_FOUND" => Ok(false),
            other => Err(ClientError::Protocol(other.to_string())),
        }
    }

    /// Fetch one or more keys, returning `None` for keys without a value.
    pub async fn get(&mut self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, ClientError> {
        self.send(format!("get {}\r\n", keys.join(" ")).as_bytes())
            .await?;
        let mut found = std::collections::HashMap::new();
        loop {
            let line = self.read_line().await?;
            if line == "END" {
                break;
            }
            let mut parts = line.splitn(4, ' ');
            let (Some("VALUE"), Some(key), Some(_flags), Some(len)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(ClientError::Protocol(line));
            };
            let len: usize = len
                .parse()
                .map_err(|_| ClientError::Protocol(line.clone()))?;
            let mut buf = vec![0u8; len + 2];
            use tokio::io::AsyncReadExt;
            self.reader.read_exact(&mut buf).await?;
            buf.truncate(len);
            found.insert(key.to_string(), buf);
        }
        Ok(keys.iter().map(|k| found.remove(*k)).collect())
    }
}
