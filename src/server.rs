//! Streaming RPC server: accepts connections over TCP, a Unix domain
//! socket, or a Windows named pipe, and drives each one through a
//! `Connection`. Each accept loop spawns a `Connection` that runs the
//! classifier and dispatcher against whatever frames arrive on it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::connection::{Connection, Side};
use crate::dispatch::ServiceRegistry;
use crate::protocol::ProtocolVariant;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tcp_bind: Option<String>,
    pub socket_path: Option<String>,
    pub max_connections: usize,
    pub connection_timeout_secs: u64,
    pub variant: ProtocolVariant,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_bind: None,
            socket_path: Some(if cfg!(windows) {
                r"\\.\pipe\framewire".to_string()
            } else {
                "/tmp/framewire.sock".to_string()
            }),
            max_connections: 100,
            connection_timeout_secs: 300,
            variant: ProtocolVariant::Rich,
        }
    }
}

#[derive(Clone)]
pub struct Server {
    config: ServerConfig,
    services: Arc<ServiceRegistry>,
    active_connections: Arc<AtomicUsize>,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: ServerConfig, services: Arc<ServiceRegistry>) -> Self {
        let (shutdown, _) = tokio::sync::broadcast::channel(1);
        Self { config, services, active_connections: Arc::new(AtomicUsize::new(0)), shutdown }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("starting framewire server");
        let mut handles = Vec::new();

        if let Some(bind_addr) = self.config.tcp_bind.clone() {
            let services = self.services.clone();
            let active = self.active_connections.clone();
            let variant = self.config.variant;
            let max = self.config.max_connections;
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = run_tcp_server(&bind_addr, services, active, variant, max, shutdown_rx).await {
                    error!(error = %e, "tcp server error");
                }
            }));
        }

        #[cfg(unix)]
        if let Some(socket_path) = self.config.socket_path.clone() {
            let services = self.services.clone();
            let active = self.active_connections.clone();
            let variant = self.config.variant;
            let max = self.config.max_connections;
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = run_unix_server(&socket_path, services, active, variant, max, shutdown_rx).await {
                    error!(error = %e, "unix socket server error");
                }
            }));
        }

        #[cfg(windows)]
        if let Some(pipe_name) = self.config.socket_path.clone() {
            let services = self.services.clone();
            let active = self.active_connections.clone();
            let variant = self.config.variant;
            let max = self.config.max_connections;
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = run_named_pipe_server(&pipe_name, services, active, variant, max, shutdown_rx).await {
                    error!(error = %e, "named pipe server error");
                }
            }));
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let _ = shutdown_rx.recv().await;
        info!("shutting down server");
        for handle in handles {
            handle.abort();
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

async fn run_tcp_server(
    addr: &str,
    services: Arc<ServiceRegistry>,
    active: Arc<AtomicUsize>,
    variant: ProtocolVariant,
    max_connections: usize,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "tcp server listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        if active.load(Ordering::Relaxed) >= max_connections {
                            warn!(%peer_addr, "rejecting connection, at capacity");
                            continue;
                        }
                        info!(%peer_addr, "accepted tcp connection");
                        spawn_connection(stream, services.clone(), active.clone(), variant);
                    }
                    Err(e) => {
                        error!(error = %e, "tcp accept error");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn run_unix_server(
    socket_path: &str,
    services: Arc<ServiceRegistry>,
    active: Arc<AtomicUsize>,
    variant: ProtocolVariant,
    max_connections: usize,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = tokio::net::UnixListener::bind(socket_path)?;
    info!(%socket_path, "unix socket server listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        if active.load(Ordering::Relaxed) >= max_connections {
                            warn!("rejecting unix connection, at capacity");
                            continue;
                        }
                        info!("accepted unix socket connection");
                        spawn_connection(stream, services.clone(), active.clone(), variant);
                    }
                    Err(e) => {
                        error!(error = %e, "unix accept error");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

#[cfg(windows)]
async fn run_named_pipe_server(
    pipe_name: &str,
    services: Arc<ServiceRegistry>,
    active: Arc<AtomicUsize>,
    variant: ProtocolVariant,
    max_connections: usize,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    use tokio::net::windows::named_pipe::ServerOptions;

    info!(%pipe_name, "named pipe server listening");
    let mut server = ServerOptions::new().first_pipe_instance(true).create(pipe_name)?;
    loop {
        tokio::select! {
            connected = server.connect() => {
                connected?;
                if active.load(Ordering::Relaxed) >= max_connections {
                    warn!("rejecting named pipe connection, at capacity");
                    server = ServerOptions::new().create(pipe_name)?;
                    continue;
                }
                let next_server = ServerOptions::new().create(pipe_name)?;
                let connected_pipe = std::mem::replace(&mut server, next_server);
                info!("accepted named pipe connection");
                spawn_connection(connected_pipe, services.clone(), active.clone(), variant);
            }
            _ = shutdown.recv() => break,
        }
    }
    Ok(())
}

fn spawn_connection<T>(transport: T, services: Arc<ServiceRegistry>, active: Arc<AtomicUsize>, variant: ProtocolVariant)
where
    T: crate::transport::Transport,
{
    active.fetch_add(1, Ordering::Relaxed);
    tokio::spawn(async move {
        let connection = Connection::start(transport, Side::Server, variant, services);
        connection.closed().await;
        active.fetch_sub(1, Ordering::Relaxed);
        info!("connection closed");
    });
}
