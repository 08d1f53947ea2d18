//! Non-interactive command execution with output mirroring.

use std::io;
use std::time::Instant;

use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use super::response::CommandOutput;
use crate::channel::Console;
use crate::error::{Result, SessionError};
use crate::transport::{Launch, OutputStream, RemoteSession, Transport};

/// Run `command` in a fresh session and capture its standard output.
///
/// Standard output is mirrored to the console and captured; standard error
/// is only mirrored. Both copy tasks are joined before returning, so output
/// written just before exit is never lost. A non-zero exit is an error.
pub(crate) async fn execute<T: Transport>(
    transport: &T,
    command: &str,
    console: Console,
) -> Result<CommandOutput> {
    info!("$ {}", command);
    let start = Instant::now();

    let mut session = transport.open_session().await?;
    let io = session.start(Launch::Exec(command.to_string())).await?;
    // Nothing is fed to one-shot commands; the remote side sees EOF.
    drop(io.stdin);

    let capture = tokio::spawn(tee(io.stdout, console.stdout()));
    let mirror = tokio::spawn(mirror(io.stderr, console.stderr()));

    let status = session.wait().await;
    let captured = join(capture).await;
    let mirrored = join(mirror).await;
    let closed = session.close().await;

    let status = status?;
    debug!("'{}' finished with {:?}", command, status);
    status.into_result()?;
    let stdout = captured?;
    mirrored?;
    closed?;

    Ok(CommandOutput::new(command, stdout, start.elapsed()))
}

/// Copy a stream to the console while accumulating it.
async fn tee(
    mut stream: OutputStream,
    mut console: Box<dyn AsyncWrite + Send + Unpin>,
) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        console.write_all(&buf[..n]).await?;
        console.flush().await?;
        captured.extend_from_slice(&buf[..n]);
    }
    Ok(captured)
}

/// Copy a stream to the console only.
async fn mirror(
    mut stream: OutputStream,
    mut console: Box<dyn AsyncWrite + Send + Unpin>,
) -> io::Result<u64> {
    let copied = tokio::io::copy(&mut stream, &mut console).await?;
    console.flush().await?;
    Ok(copied)
}

async fn join<T>(handle: JoinHandle<io::Result<T>>) -> Result<T> {
    let value = handle
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
        .map_err(SessionError::Io)?;
    Ok(value)
}
