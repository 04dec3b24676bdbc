//! Automatic mutual TLS for the go-plugin handshake
//!
//! Terraform generates a client certificate for every plugin it launches and
//! passes it in `PLUGIN_CLIENT_CERT`. The plugin answers with a freshly
//! generated server certificate, announced base64 encoded as the sixth field
//! of the handshake line, and only accepts connections presenting exactly
//! the client certificate it was given.

use crate::error::{Result, TfplugError};
use base64::Engine;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{aws_lc_rs, verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_stream::wrappers::ReceiverStream;

/// Environment variable carrying Terraform's client certificate (PEM)
pub const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

fn tls_error(context: &str, err: impl std::fmt::Display) -> TfplugError {
    TfplugError::TlsError(format!("{}: {}", context, err))
}

/// A generated server certificate with its private key
pub struct ServerCertificate {
    pub cert: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
}

impl ServerCertificate {
    /// Self-signed certificate for `localhost`, the name go-plugin verifies
    pub fn generate() -> Result<Self> {
        let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .map_err(|e| tls_error("Invalid certificate parameters", e))?;
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "localhost");
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::DigitalSignature,
            rcgen::KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let key_pair =
            rcgen::KeyPair::generate().map_err(|e| tls_error("Failed to generate key", e))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| tls_error("Failed to sign certificate", e))?;

        Ok(Self {
            cert: cert.der().clone(),
            key: PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
        })
    }

    /// The handshake field: DER, base64 without padding
    pub fn handshake_field(&self) -> String {
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(self.cert.as_ref())
    }
}

/// Accepts exactly one client certificate, compared byte for byte.
///
/// Terraform's client certificate is self-signed and marked as a CA, which
/// webpki refuses as an end-entity certificate, so chain building is not
/// used here.
#[derive(Debug)]
struct PinnedClientCert {
    cert: CertificateDer<'static>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ClientCertVerifier for PinnedClientCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.cert.as_ref() {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Server TLS configuration requiring the client certificate in `client_pem`.
/// Negotiates `h2`, which gRPC clients insist on.
pub fn auto_mtls_config(
    server: &ServerCertificate,
    client_pem: &str,
) -> Result<rustls::ServerConfig> {
    let client_cert = CertificateDer::from_pem_slice(client_pem.as_bytes())
        .map_err(|e| tls_error("Invalid PLUGIN_CLIENT_CERT", e))?;

    let provider = Arc::new(aws_lc_rs::default_provider());
    let verifier = PinnedClientCert {
        cert: client_cert,
        algorithms: provider.signature_verification_algorithms,
    };

    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error("Unsupported TLS versions", e))?
        .with_client_cert_verifier(Arc::new(verifier))
        .with_single_cert(
            vec![server.cert.clone()],
            PrivateKeyDer::Pkcs8(server.key.clone_key()),
        )
        .map_err(|e| tls_error("Invalid server certificate", e))?;
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// Accepts connections and completes their TLS handshakes off the accept
/// loop. Failed handshakes are logged and dropped. The loop ends once the
/// returned stream is dropped.
pub fn tls_incoming(
    listener: TcpListener,
    config: rustls::ServerConfig,
) -> ReceiverStream<std::io::Result<TlsStream<TcpStream>>> {
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = tx.closed() => return,
            };
            let (tcp, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match acceptor.accept(tcp).await {
                    Ok(stream) => {
                        let _ = tx.send(Ok(stream)).await;
                    }
                    Err(e) => tracing::warn!("TLS handshake with {} failed: {}", peer, e),
                }
            });
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_rustls::TlsConnector;
    use tokio_stream::StreamExt;

    struct ClientIdentity {
        pem: String,
        der: CertificateDer<'static>,
        key: PrivateKeyDer<'static>,
    }

    fn client_identity() -> ClientIdentity {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        ClientIdentity {
            pem: generated.cert.pem(),
            der: generated.cert.der().clone(),
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
                generated.key_pair.serialize_der(),
            )),
        }
    }

    fn connector(server: &ServerCertificate, client: ClientIdentity) -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(server.cert.clone()).unwrap();
        let mut config =
            rustls::ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_root_certificates(roots)
                .with_client_auth_cert(vec![client.der], client.key)
                .unwrap();
        config.alpn_protocols = vec![b"h2".to_vec()];
        TlsConnector::from(Arc::new(config))
    }

    async fn listen() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn handshake_field_is_unpadded_base64_der() {
        let server = ServerCertificate::generate().unwrap();
        let field = server.handshake_field();
        assert!(!field.ends_with('='));
        let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(&field)
            .unwrap();
        assert_eq!(decoded, server.cert.as_ref());
    }

    #[test]
    fn rejects_malformed_client_certificate() {
        let server = ServerCertificate::generate().unwrap();
        let err = auto_mtls_config(&server, "not a certificate").unwrap_err();
        assert!(err.to_string().contains("PLUGIN_CLIENT_CERT"));
    }

    #[tokio::test]
    async fn accepts_the_pinned_client_and_negotiates_h2() {
        let server = ServerCertificate::generate().unwrap();
        let client = client_identity();
        let config = auto_mtls_config(&server, &client.pem).unwrap();
        let (listener, addr) = listen().await;
        let mut incoming = tls_incoming(listener, config);

        let connector = connector(&server, client);
        let tcp = TcpStream::connect(addr).await.unwrap();
        let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
        let _client = connector.connect(name, tcp).await.unwrap();

        let accepted = tokio::time::timeout(Duration::from_secs(5), incoming.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(accepted.get_ref().1.alpn_protocol(), Some(&b"h2"[..]));
    }

    #[tokio::test]
    async fn refuses_other_client_certificates() {
        let server = ServerCertificate::generate().unwrap();
        let expected = client_identity();
        let config = auto_mtls_config(&server, &expected.pem).unwrap();
        let (listener, addr) = listen().await;
        let mut incoming = tls_incoming(listener, config);

        let connector = connector(&server, client_identity());
        let tcp = TcpStream::connect(addr).await.unwrap();
        let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
        // The client may finish its side before the server rejects it.
        let _client = connector.connect(name, tcp).await;

        let accepted = tokio::time::timeout(Duration::from_millis(300), incoming.next()).await;
        assert!(accepted.is_err(), "connection with a foreign certificate was accepted");
    }
}
