use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::auth::Accounts;
use crate::client::{SessionContext, handle_client};
use crate::config::ServerConfig;
use crate::protocol::responses::{TOO_MANY_CLIENTS, message_response};
use crate::storage::StorageService;

pub struct Server {
    listener: TcpListener,
    context: Arc<SessionContext>,
    sessions: Arc<Semaphore>,
    max_clients: usize,
}

impl Server {
    /// Binds the listener configured in `[server]`.
    pub async fn new(
        config: &ServerConfig,
        storage: StorageService,
        accounts: Accounts,
    ) -> std::io::Result<Self> {
        let socket = config.server.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => {
                info!("Server bound to {}", socket);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e);
            }
        };

        let max_clients = config.server.max_clients;
        Ok(Self {
            listener,
            context: Arc::new(SessionContext::new(
                storage,
                Arc::new(accounts),
                &config.server,
            )),
            sessions: Arc::new(Semaphore::new(max_clients)),
            max_clients,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn start(&self) {
        info!(
            "Starting cloud storage server on {:?} (max {} clients)",
            self.listener.local_addr(),
            self.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let permit = match Arc::clone(&self.sessions).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tokio::spawn(refuse_client(stream, addr));
                            continue;
                        }
                    };

                    let context = Arc::clone(&self.context);
                    info!(
                        "Accepted client {} ({}/{} clients)",
                        addr,
                        self.max_clients - self.sessions.available_permits(),
                        self.max_clients
                    );

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        handle_client(stream, addr, context).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

async fn refuse_client(mut stream: TcpStream, addr: SocketAddr) {
    warn!("Refusing client {}: too many connections", addr);
    let reply = message_response(TOO_MANY_CLIENTS, "Too many connections. Try again later.");
    if let Err(e) = stream.write_all(reply.as_bytes()).await {
        warn!("Failed to notify refused client {}: {}", addr, e);
    }
}
