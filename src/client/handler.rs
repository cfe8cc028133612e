//! Client session loop

use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::{Client, SessionContext};
use crate::error::{ProtocolError, ServerError};
use crate::gateway::ObjectBody;
use crate::protocol::responses::{READY, message_response};
use crate::protocol::{CommandStatus, error_result, handle_command, parse_command};

/// Serves one TCP connection until the client quits or disconnects.
pub async fn handle_client(stream: TcpStream, client_addr: SocketAddr, context: Arc<SessionContext>) {
    let (read_half, write_half) = stream.into_split();
    if let Err(e) = serve(read_half, write_half, client_addr, &context).await {
        warn!("Session with {} ended with error: {}", client_addr, e);
    }
    info!("Client {} disconnected", client_addr);
}

/// Runs the command loop over any byte stream.
///
/// - Greets the client, then reads one command per line.
/// - Lines longer than the configured limit are rejected without parsing.
/// - A reply line is written for every command; downloads append their
///   raw bytes after it.
pub async fn serve<R, W>(
    reader: R,
    mut writer: W,
    client_addr: SocketAddr,
    context: &SessionContext,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut client = Client::new();
    let mut line = String::new();

    writer
        .write_all(message_response(READY, "Cloud storage server ready").as_bytes())
        .await?;
    writer.flush().await?;

    loop {
        line.clear();
        let n = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                return Err(e.into());
            }
        };
        if n == 0 {
            info!("Connection closed by client {}", client_addr);
            return Ok(());
        }

        let mut result = if line.len() > context.max_command_length {
            error_result(
                ProtocolError::Malformed(format!(
                    "command exceeds {} bytes",
                    context.max_command_length
                ))
                .into(),
            )
        } else {
            match parse_command(&line) {
                Ok(command) => {
                    info!("Received from {}: {:?}", client_addr, command);
                    handle_command(&mut client, command, context, &mut reader).await
                }
                Err(e) => error_result(e.into()),
            }
        };

        if let Some(msg) = &result.message {
            writer.write_all(msg.as_bytes()).await?;
        }
        if let Some(payload) = result.payload.take() {
            send_payload(payload, &mut writer, client_addr).await?;
        }
        writer.flush().await?;

        if result.status == CommandStatus::CloseConnection {
            info!("Closing session with {}", client_addr);
            return Ok(());
        }
    }
}

/// Streams a download body to the client.
///
/// The reply line already announced `payload.size` bytes; a body that ends
/// early leaves the client unable to resynchronize, so the session ends.
async fn send_payload<W>(
    payload: ObjectBody,
    writer: &mut W,
    client_addr: SocketAddr,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let expected = payload.size;
    let sent = tokio::io::copy(&mut payload.into_reader(), writer).await?;
    if sent != expected {
        error!(
            "Download to {} ended after {} of {} bytes",
            client_addr, sent, expected
        );
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("body ended after {} of {} bytes", sent, expected),
        )
        .into());
    }
    debug!("Sent {} bytes to {}", sent, client_addr);
    Ok(())
}
