//! Server module for running Terraform providers
//!
//! Binds an ephemeral localhost port, prints the go-plugin handshake line
//! Terraform waits for on stdout, and serves the provider until Terraform
//! stops it or the process receives ctrl-c.
//!
//! Terraform launches plugins with automatic mutual TLS: it passes its client
//! certificate in `PLUGIN_CLIENT_CERT` and expects the server certificate in
//! the handshake. Plaintext is only served when `TF_DISABLE_PLUGIN_TLS` is
//! set, and configured certificate files cover plugins started by hand.

use crate::error::{Result, TfplugError};
use crate::grpc::ProviderService;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use crate::tls::{self, ServerCertificate};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

/// Core protocol version of the go-plugin handshake
const CORE_PROTOCOL_VERSION: u8 = 1;
/// Terraform plugin protocol major version
const PROTOCOL_VERSION: u8 = 6;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
pub const DISABLE_TLS_ENV: &str = "TF_DISABLE_PLUGIN_TLS";

/// How the plugin secures its listener
pub enum Transport {
    /// Generated server certificate, Terraform's client certificate required
    AutoMtls(rustls::ServerConfig, ServerCertificate),
    /// Certificate files from `ServerConfig`
    Tls(Identity),
    Plaintext,
}

/// Log level for the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to TLS certificate file
    pub cert_path: Option<PathBuf>,
    /// Path to TLS key file
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Default log level when no filter is set in the environment
    pub log_level: LogLevel,
    /// Timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            log_level: LogLevel::Info,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the certificate path
    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    /// Set the key path
    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    /// Set the maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the log level
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Loads the TLS identity when both files are configured and present.
    pub async fn tls_identity(&self) -> Result<Option<Identity>> {
        let (Some(cert_path), Some(key_path)) = (&self.cert_path, &self.key_path) else {
            return Ok(None);
        };
        if !cert_path.exists() || !key_path.exists() {
            tracing::debug!(
                "TLS certificate {} or key {} not found",
                cert_path.display(),
                key_path.display()
            );
            return Ok(None);
        }

        let cert = tokio::fs::read(cert_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
        let key = tokio::fs::read(key_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

        Ok(Some(Identity::from_pem(cert, key)))
    }

    /// Picks the transport from Terraform's environment: its client
    /// certificate first, then `TF_DISABLE_PLUGIN_TLS`, then the configured
    /// certificate files. Anything else would leave Terraform unable to
    /// connect, so it is an error.
    pub async fn transport(
        &self,
        client_cert: Option<&str>,
        tls_disabled: bool,
    ) -> Result<Transport> {
        if let Some(client_pem) = client_cert.filter(|pem| !pem.trim().is_empty()) {
            let server_cert = ServerCertificate::generate()?;
            let tls = tls::auto_mtls_config(&server_cert, client_pem)?;
            return Ok(Transport::AutoMtls(tls, server_cert));
        }
        if tls_disabled {
            return Ok(Transport::Plaintext);
        }
        match self.tls_identity().await? {
            Some(identity) => Ok(Transport::Tls(identity)),
            None => Err(TfplugError::TlsError(format!(
                "{} is not set and no certificate files were found; set {}=1 to serve without TLS",
                tls::CLIENT_CERT_ENV,
                DISABLE_TLS_ENV
            ))),
        }
    }
}

/// The go-plugin handshake line, e.g. `1|6|tcp|127.0.0.1:50051|grpc`, with
/// the server certificate appended under automatic mutual TLS.
pub fn handshake_line(addr: &std::net::SocketAddr, server_cert: Option<&str>) -> String {
    let line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    );
    match server_cert {
        Some(cert) => format!("{}|{}", line, cert),
        None => line,
    }
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if std::env::var(MAGIC_COOKIE_KEY).as_deref() != Ok(MAGIC_COOKIE_VALUE) {
        tracing::warn!(
            "{} is not set; this binary is a plugin and is normally started by Terraform",
            MAGIC_COOKIE_KEY
        );
    }

    // Installing fails when another provider is already installed, which is fine.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let service = ProviderService::new(provider);
    let stop = service.context().clone();
    let provider_service = ProviderServer::new(service)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("plugin", tonic_health::ServingStatus::Serving)
        .await;

    let client_cert = std::env::var(tls::CLIENT_CERT_ENV).ok();
    let tls_disabled = std::env::var(DISABLE_TLS_ENV).is_ok_and(|v| !v.is_empty());
    let transport = config
        .transport(client_cert.as_deref(), tls_disabled)
        .await?;

    let mut builder = Server::builder();
    if let Transport::Tls(identity) = &transport {
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity.clone()))?;
    }
    let router = builder
        .add_service(health_service)
        .add_service(provider_service);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tracing::info!("Provider listening on {}", addr);

    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        let _ = signal_rx.await;
    };
    let mut server = match transport {
        Transport::AutoMtls(tls, server_cert) => {
            tracing::debug!("Serving with automatic mutual TLS");
            println!("{}", handshake_line(&addr, Some(&server_cert.handshake_field())));
            tokio::spawn(
                router.serve_with_incoming_shutdown(tls::tls_incoming(listener, tls), shutdown),
            )
        }
        Transport::Tls(_) | Transport::Plaintext => {
            println!("{}", handshake_line(&addr, None));
            tokio::spawn(
                router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown),
            )
        }
    };

    tokio::select! {
        joined = &mut server => return server_result(joined),
        _ = tokio::signal::ctrl_c() => tracing::info!("Received interrupt, shutting down"),
        _ = stop.cancelled() => tracing::info!("Provider stopped, shutting down"),
    }

    let _ = signal_tx.send(());
    match tokio::time::timeout(config.shutdown_timeout, server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            tracing::warn!(
                "Server did not shut down within {:?}",
                config.shutdown_timeout
            );
            Ok(())
        }
    }
}

fn server_result(
    joined: std::result::Result<
        std::result::Result<(), tonic::transport::Error>,
        tokio::task::JoinError,
    >,
) -> Result<()> {
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(TfplugError::Custom(format!("Server task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_files() -> ServerConfig {
        ServerConfig::new()
            .with_cert_path(PathBuf::from("/nonexistent/cert.pem"))
            .with_key_path(PathBuf::from("/nonexistent/key.pem"))
    }

    #[test]
    fn handshake_line_format() {
        let addr: std::net::SocketAddr = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(handshake_line(&addr, None), "1|6|tcp|127.0.0.1:50051|grpc");
        assert_eq!(
            handshake_line(&addr, Some("MIIB")),
            "1|6|tcp|127.0.0.1:50051|grpc|MIIB"
        );
    }

    #[test]
    fn default_config_has_no_tls() {
        let config = ServerConfig::new();
        assert!(config.cert_path.is_none());
        assert_eq!(config.max_message_size, 256 << 20);
        assert_eq!(config.log_level.as_str(), "info");
    }

    #[tokio::test]
    async fn missing_certificate_files_load_nothing() {
        assert!(missing_files().tls_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terraform_client_certificate_selects_auto_mtls() {
        let client = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let transport = missing_files()
            .transport(Some(&client.cert.pem()), true)
            .await
            .unwrap();
        assert!(matches!(transport, Transport::AutoMtls(..)));
    }

    #[tokio::test]
    async fn plaintext_requires_tls_to_be_disabled() {
        let transport = missing_files().transport(Some(""), true).await.unwrap();
        assert!(matches!(transport, Transport::Plaintext));

        let err = missing_files().transport(None, false).await.err().unwrap();
        assert!(err.to_string().contains(DISABLE_TLS_ENV));
    }
}
