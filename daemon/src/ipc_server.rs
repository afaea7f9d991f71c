use anyhow::{Context, Result};
use common::{Command, Response, ViewError};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

/// A client command waiting to be run by the view loop
#[derive(Debug)]
pub struct ViewRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

pub async fn start(
    socket_path: &Path,
    view_tx: mpsc::UnboundedSender<ViewRequest>,
    should_exit: Arc<AtomicBool>,
) -> Result<()> {
    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove stale socket {}", socket_path.display()))?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind {}", socket_path.display()))?;
    log::info!("IPC server listening on: {}", socket_path.display());

    while !should_exit.load(Ordering::Relaxed) {
        // Accept connections with timeout so the exit flag gets checked
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let tx = view_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, tx).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => continue,
        }
    }

    let _ = std::fs::remove_file(socket_path);
    log::info!("IPC server stopped");
    Ok(())
}

async fn handle_client(
    stream: UnixStream,
    view_tx: mpsc::UnboundedSender<ViewRequest>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => forward(command, &view_tx).await,
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(ViewError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

/// Hand a command to the view loop and wait for its answer
async fn forward(command: Command, view_tx: &mpsc::UnboundedSender<ViewRequest>) -> Response {
    log::debug!("Handling command: {:?}", command);

    // answered here so liveness checks don't queue behind the view
    if matches!(command, Command::Ping) {
        return Response::Pong;
    }

    let (reply, response) = oneshot::channel();
    if let Err(e) = view_tx.send(ViewRequest { command, reply }) {
        return Response::Error(ViewError::Ipc(format!(
            "Failed to send command to view loop: {}",
            e
        )));
    }

    response.await.unwrap_or_else(|_| {
        Response::Error(ViewError::Ipc(
            "View loop dropped the command".to_string(),
        ))
    })
}
