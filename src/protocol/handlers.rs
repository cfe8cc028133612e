//! Command handlers
//!
//! Dispatches parsed commands to the account table and the storage service
//! and turns their outcome into a reply.

use log::info;
use serde_json::json;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::auth::Caller;
use crate::client::{Client, SessionContext};
use crate::error::handlers::handle_error;
use crate::error::{AuthError, ProtocolError, ServerError, StorageError};
use crate::protocol::commands::{Command, CommandResult, CommandStatus, UploadManifest};
use crate::protocol::responses::{
    CLOSING, CREATED, LOGIN_SUCCESS, NO_CONTENT, OK, PASSWORD_REQUIRED, error_response,
    json_response, message_response,
};
use crate::storage::UploadFile;

type HandlerResult = Result<CommandResult, ServerError>;

/// Dispatches a received command to its handler.
///
/// `reader` is the command stream; `STOR` reads the announced file bytes
/// from it.
pub async fn handle_command<R>(
    client: &mut Client,
    command: Command,
    context: &SessionContext,
    reader: &mut R,
) -> CommandResult
where
    R: AsyncRead + Unpin,
{
    let outcome = match command {
        Command::USER(username) => handle_cmd_user(client, &username, context),
        Command::PASS(password) => handle_cmd_pass(client, &password, context),
        Command::LOGOUT => handle_cmd_logout(client),
        Command::QUIT => Ok(handle_cmd_quit(client)),
        Command::NOOP => Ok(success(message_response(OK, "OK"))),
        Command::STAT(path) => handle_cmd_stat(client, &path, context).await,
        Command::LIST(path) => handle_cmd_list(client, &path, context).await,
        Command::MKD(path) => handle_cmd_mkd(client, &path, context).await,
        Command::DELE(path) => handle_cmd_dele(client, &path, context).await,
        Command::MOVE { from, to } => handle_cmd_move(client, &from, &to, context).await,
        Command::FIND(query) => handle_cmd_find(client, &query, context).await,
        Command::STOR(manifest) => handle_cmd_stor(client, manifest, context, reader).await,
        Command::RETR(path) => handle_cmd_retr(client, &path, context).await,
    };

    outcome.unwrap_or_else(error_result)
}

/// Builds the reply for a failed command.
///
/// Oversized uploads and I/O failures close the connection since the
/// stream can no longer be trusted to be at a line boundary.
pub fn error_result(err: ServerError) -> CommandResult {
    handle_error(&err);
    let message = Some(error_response(&err));
    let status = match err {
        ServerError::Protocol(ProtocolError::PayloadTooLarge { .. }) | ServerError::Io(_) => {
            CommandStatus::CloseConnection
        }
        other => CommandStatus::Failure(other.to_string()),
    };
    CommandResult {
        status,
        message,
        payload: None,
    }
}

fn success(message: String) -> CommandResult {
    CommandResult {
        status: CommandStatus::Success,
        message: Some(message),
        payload: None,
    }
}

/// Handles the USER command: remembers the username until PASS arrives.
fn handle_cmd_user(client: &mut Client, username: &str, context: &SessionContext) -> HandlerResult {
    client.set_caller(Caller::anonymous());
    client.set_pending_user(None);

    context.accounts.validate_user(username)?;
    client.set_pending_user(Some(username.to_string()));
    Ok(success(message_response(
        PASSWORD_REQUIRED,
        &format!("Password required for {}", username),
    )))
}

/// Handles the PASS command: authenticates the pending user.
fn handle_cmd_pass(client: &mut Client, password: &str, context: &SessionContext) -> HandlerResult {
    let username = client
        .pending_user()
        .ok_or(AuthError::UsernameRequired)?
        .to_string();

    let principal = context.accounts.validate_password(&username, password)?;
    info!(
        "User {} (id {}) logged in, bucket {}",
        username,
        principal.user_id(),
        principal.bucket_name()
    );
    client.set_caller(Caller::authenticated(principal));
    Ok(success(message_response(LOGIN_SUCCESS, "Login successful")))
}

fn handle_cmd_logout(client: &mut Client) -> HandlerResult {
    if !client.is_logged_in() {
        return Err(StorageError::Unauthenticated.into());
    }
    client.logout();
    Ok(success(message_response(CLOSING, "Logout successful")))
}

fn handle_cmd_quit(client: &mut Client) -> CommandResult {
    client.logout();
    CommandResult {
        status: CommandStatus::CloseConnection,
        message: Some(message_response(CLOSING, "Goodbye")),
        payload: None,
    }
}

async fn handle_cmd_stat(client: &Client, path: &str, context: &SessionContext) -> HandlerResult {
    let descriptor = context.storage.resource_info(client.caller(), path).await?;
    Ok(success(json_response(OK, &descriptor)))
}

async fn handle_cmd_list(client: &Client, path: &str, context: &SessionContext) -> HandlerResult {
    let contents = context.storage.list_directory(client.caller(), path).await?;
    Ok(success(json_response(OK, &contents)))
}

async fn handle_cmd_mkd(client: &Client, path: &str, context: &SessionContext) -> HandlerResult {
    let descriptor = context.storage.create_directory(client.caller(), path).await?;
    Ok(success(json_response(CREATED, &descriptor)))
}

async fn handle_cmd_dele(client: &Client, path: &str, context: &SessionContext) -> HandlerResult {
    context.storage.remove(client.caller(), path).await?;
    Ok(success(json_response(NO_CONTENT, &json!({}))))
}

async fn handle_cmd_move(
    client: &Client,
    from: &str,
    to: &str,
    context: &SessionContext,
) -> HandlerResult {
    let descriptor = context.storage.move_resource(client.caller(), from, to).await?;
    Ok(success(json_response(OK, &descriptor)))
}

async fn handle_cmd_find(client: &Client, query: &str, context: &SessionContext) -> HandlerResult {
    let results = context.storage.search(client.caller(), query).await?;
    Ok(success(json_response(OK, &results)))
}

/// Handles the STOR command: reads every announced file from the stream,
/// then uploads them in order.
///
/// The announced sizes are checked against the upload limit as a whole
/// before any byte is read. A caller that is not logged in has the bodies
/// drained and discarded so the stream stays at a line boundary.
async fn handle_cmd_stor<R>(
    client: &Client,
    manifest: UploadManifest,
    context: &SessionContext,
    reader: &mut R,
) -> HandlerResult
where
    R: AsyncRead + Unpin,
{
    let limit = context.max_upload_size;
    let total = manifest.total_size();
    if total > limit {
        return Err(ProtocolError::PayloadTooLarge { size: total, limit }.into());
    }

    if !client.is_logged_in() {
        tokio::io::copy(&mut (&mut *reader).take(total), &mut tokio::io::sink()).await?;
        return Err(StorageError::Unauthenticated.into());
    }

    let mut files = Vec::with_capacity(manifest.files.len());
    for entry in manifest.files {
        let mut body = Vec::new();
        let read = (&mut *reader).take(entry.size).read_to_end(&mut body).await?;
        if (read as u64) < entry.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} ended after {} of {} bytes", entry.name, read, entry.size),
            )
            .into());
        }
        files.push(UploadFile::new(entry.name, body));
    }

    let uploaded = context
        .storage
        .upload(client.caller(), &manifest.directory, files)
        .await?;
    Ok(success(json_response(CREATED, &uploaded)))
}

/// Handles the RETR command: replies with the download metadata. The session
/// loop streams the body after the reply line.
async fn handle_cmd_retr(client: &Client, path: &str, context: &SessionContext) -> HandlerResult {
    let download = context.storage.download(client.caller(), path).await?;
    let header = json!({
        "fileName": download.file_name,
        "contentType": download.content_type,
        "contentDisposition": download.content_disposition(),
        "size": download.body.size,
    });
    Ok(CommandResult {
        status: CommandStatus::Success,
        message: Some(json_response(OK, &header)),
        payload: Some(download.body),
    })
}
