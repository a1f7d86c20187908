//! LSP base protocol framing
//!
//! Every message is a `Content-Length` header block, a blank line and the
//! JSON body.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::client::error::ClientError;

const CONTENT_LENGTH: &str = "content-length";

/// Largest body accepted from the server
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Write one framed message and flush
pub async fn write_message<W>(writer: &mut W, body: &[u8]) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` when the stream ends before a new header starts.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ClientError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut content_length = None;
    let mut started = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            if started {
                return Err(ClientError::InvalidHeader(
                    "stream ended inside header".to_string(),
                ));
            }
            return Ok(None);
        }
        started = true;

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        // Other headers (Content-Type) are allowed and ignored.
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(ClientError::InvalidHeader(trimmed.to_string()));
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let length = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ClientError::InvalidHeader(trimmed.to_string()))?;
            if length > MAX_CONTENT_LENGTH {
                return Err(ClientError::InvalidHeader(format!(
                    "message of {length} bytes exceeds the {MAX_CONTENT_LENGTH} byte limit"
                )));
            }
            content_length = Some(length);
        }
    }

    let Some(length) = content_length else {
        return Err(ClientError::InvalidHeader(
            "missing Content-Length".to_string(),
        ));
    };

    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}
