//! RESP (Redis serialization protocol) framing over async streams.
//!
//! Only the five classic frame types are needed: simple strings, errors,
//! integers, bulk strings, and arrays. Requests arrive as arrays of bulk
//! strings; replies are whatever the command handler produced.

use core::future::Future;
use core::pin::Pin;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

pub type RespResult<T> = core::result::Result<T, RespError>;

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid RESP frame")]
    InvalidProtocol,

    #[error("invalid bulk string size")]
    InvalidBulkSize,
}

impl RespError {
    /// Whether this error is a clean end-of-stream (client hung up between
    /// commands) rather than a protocol violation.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// One RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(String),
    /// The `$-1` null bulk string.
    Null,
    Array(Vec<Value>),
}

/// Reads RESP frames from a buffered stream.
pub struct RespReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> RespReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Reads one complete frame. Arrays recurse, hence the boxed future.
    pub fn read_value(&mut self) -> Pin<Box<dyn Future<Output = RespResult<Value>> + Send + '_>> {
        Box::pin(async move {
            let mut type_byte = [0u8; 1];
            self.inner.read_exact(&mut type_byte).await?;
            match type_byte[0] {
                b'+' => Ok(Value::Simple(self.read_line().await?)),
                b'-' => Ok(Value::Error(self.read_line().await?)),
                b':' => {
                    let line = self.read_line().await?;
                    let number = line.parse().map_err(|_| RespError::InvalidProtocol)?;
                    Ok(Value::Integer(number))
                }
                b'$' => self.read_bulk().await,
                b'*' => self.read_array().await,
                _ => Err(RespError::InvalidProtocol),
            }
        })
    }

    async fn read_bulk(&mut self) -> RespResult<Value> {
        let line = self.read_line().await?;
        let size: i64 = line.parse().map_err(|_| RespError::InvalidBulkSize)?;
        if size == -1 {
            return Ok(Value::Null);
        }
        if size < 0 {
            return Err(RespError::InvalidBulkSize);
        }
        // Payload plus the trailing \r\n.
        let mut payload = vec![0u8; size as usize + 2];
        self.inner.read_exact(&mut payload).await?;
        payload.truncate(size as usize);
        String::from_utf8(payload)
            .map(Value::Bulk)
            .map_err(|_| RespError::InvalidProtocol)
    }

    async fn read_array(&mut self) -> RespResult<Value> {
        let line = self.read_line().await?;
        let count: i64 = line.parse().map_err(|_| RespError::InvalidProtocol)?;
        if count < 0 {
            return Ok(Value::Array(Vec::new()));
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(self.read_value().await?);
        }
        Ok(Value::Array(items))
    }

    async fn read_line(&mut self) -> RespResult<String> {
        let mut line = String::new();
        let read = self.inner.read_line(&mut line).await?;
        if read == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        if line.pop() != Some('\n') {
            return Err(RespError::InvalidProtocol);
        }
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Writes RESP frames to a buffered stream, one flush per frame.
pub struct RespWriter<W> {
    inner: BufWriter<W>,
    scratch: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> RespWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            scratch: Vec::new(),
        }
    }

    pub async fn write_value(&mut self, value: &Value) -> io::Result<()> {
        self.scratch.clear();
        encode(value, &mut self.scratch);
        self.inner.write_all(&self.scratch).await?;
        self.inner.flush().await
    }
}

fn encode(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Simple(text) => {
            buf.extend_from_slice(format!("+{text}\r\n").as_bytes());
        }
        Value::Error(text) => {
            buf.extend_from_slice(format!("-{text}\r\n").as_bytes());
        }
        Value::Integer(number) => {
            buf.extend_from_slice(format!(":{number}\r\n").as_bytes());
        }
        Value::Bulk(text) => {
            buf.extend_from_slice(format!("${}\r\n{text}\r\n", text.len()).as_bytes());
        }
        Value::Null => buf.extend_from_slice(b"$-1\r\n"),
        Value::Array(items) => {
            buf.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode(item, buf);
            }
        }
    }
}
