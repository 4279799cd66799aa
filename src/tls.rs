//! Trust policies for TLS connections.
//!
//! The trust model is a tagged choice, decided by the caller and consumed by
//! the transport at connection establishment:
//!
//! - [`TrustPolicy::AcceptAll`] validates every certificate chain
//!   unconditionally. This is a deliberate, explicitly insecure escape hatch
//!   (the `curl -k` of this client); every accepted chain produces a `warn!`
//!   diagnostic naming the peer so it can never pass silently.
//! - [`TrustPolicy::Store`] validates chains against exactly the supplied
//!   certificates. There is no fallback to the platform trust store; trust
//!   is opt-in, certificate by certificate.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;
use tracing::warn;

/// Error constructing a certificate-store trust policy.
///
/// Construction is all-or-nothing: on any failure no policy exists.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    /// An entry's bytes did not parse as a DER certificate.
    #[error("certificate {alias:?} could not be parsed: {source}")]
    CertificateParse {
        /// Alias of the offending entry.
        alias: String,
        /// Underlying parse failure.
        #[source]
        source: rustls::Error,
    },

    /// Two entries share an alias.
    #[error("duplicate certificate alias {alias:?}")]
    DuplicateAlias {
        /// The repeated alias.
        alias: String,
    },
}

/// The rule set used to decide whether a peer's certificate chain is
/// acceptable.
#[derive(Debug, Clone)]
pub enum TrustPolicy {
    /// Accept every chain unconditionally. Insecure; loudly diagnosed.
    AcceptAll,
    /// Validate chains against exactly the supplied certificates.
    Store(TrustStore),
}

/// An ordered set of trusted certificates, each keyed by an opaque alias.
#[derive(Debug, Clone)]
pub struct TrustStore {
    roots: RootCertStore,
    aliases: Vec<String>,
}

impl TrustStore {
    /// Aliases of the stored certificates, in insertion order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl TrustPolicy {
    /// A policy that accepts every certificate chain.
    ///
    /// Every accepted chain emits a `warn!` naming the peer. Use only
    /// against peers you control, or for debugging.
    pub fn accept_all() -> Self {
        TrustPolicy::AcceptAll
    }

    /// A policy trusting exactly the given `(alias, DER bytes)` entries.
    ///
    /// Fails with [`TrustStoreError::CertificateParse`] if an entry does not
    /// parse as a certificate and [`TrustStoreError::DuplicateAlias`] if two
    /// entries share an alias.
    pub fn store<I, A, C>(entries: I) -> Result<Self, TrustStoreError>
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<Vec<u8>>,
    {
        let mut roots = RootCertStore::empty();
        let mut aliases: Vec<String> = Vec::new();

        for (alias, der) in entries {
            let alias = alias.into();
            if aliases.iter().any(|existing| *existing == alias) {
                return Err(TrustStoreError::DuplicateAlias { alias });
            }

            let certificate = CertificateDer::from(der.into());
            roots
                .add(certificate)
                .map_err(|source| TrustStoreError::CertificateParse {
                    alias: alias.clone(),
                    source,
                })?;
            aliases.push(alias);
        }

        Ok(TrustPolicy::Store(TrustStore { roots, aliases }))
    }

    /// Lower this policy to a rustls client configuration.
    pub(crate) fn client_config(&self) -> ClientConfig {
        let mut config = match self {
            TrustPolicy::AcceptAll => ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAllVerifier::new()))
                .with_no_client_auth(),
            TrustPolicy::Store(store) => ClientConfig::builder()
                .with_root_certificates(store.roots.clone())
                .with_no_client_auth(),
        };

        config.alpn_protocols.push(b"http/1.1".to_vec());
        config
    }
}

/// Certificate verifier that accepts every chain, loudly.
#[derive(Debug)]
struct AcceptAllVerifier {
    provider: CryptoProvider,
}

impl AcceptAllVerifier {
    fn new() -> Self {
        Self {
            provider: rustls::crypto::ring::default_provider(),
        }
    }
}

impl ServerCertVerifier for AcceptAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        warn!(
            server = ?server_name,
            "accepting certificate chain without validation"
        );
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate() -> Vec<u8> {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
        cert.cert.der().to_vec()
    }

    #[test]
    fn store_rejects_duplicate_alias() {
        let der = certificate();
        let err = TrustPolicy::store([("1", der.clone()), ("1", der)]).unwrap_err();
        assert!(matches!(err, TrustStoreError::DuplicateAlias { alias } if alias == "1"));
    }

    #[test]
    fn store_rejects_garbage_certificate() {
        let err =
            TrustPolicy::store([("ca", b"not a certificate".to_vec())]).unwrap_err();
        assert!(matches!(err, TrustStoreError::CertificateParse { alias, .. } if alias == "ca"));
    }

    #[test]
    fn store_keeps_alias_order() {
        let policy = TrustPolicy::store([("first", certificate()), ("second", certificate())])
            .unwrap();
        match policy {
            TrustPolicy::Store(store) => assert_eq!(store.aliases(), ["first", "second"]),
            TrustPolicy::AcceptAll => panic!("expected a store policy"),
        }
    }

    #[test]
    fn accept_all_verifier_accepts_arbitrary_chain() {
        let verifier = AcceptAllVerifier::new();
        let end_entity = CertificateDer::from(certificate());
        let server_name = ServerName::try_from("self-signed.badssl.com").unwrap();

        let verdict = verifier.verify_server_cert(
            &end_entity,
            &[],
            &server_name,
            &[],
            UnixTime::now(),
        );
        assert!(verdict.is_ok());
    }

    #[derive(Debug, Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn accept_all_diagnoses_each_accepted_chain_once() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let verifier = AcceptAllVerifier::new();
            let end_entity = CertificateDer::from(certificate());
            let server_name = ServerName::try_from("self-signed.badssl.com").unwrap();

            verifier
                .verify_server_cert(&end_entity, &[], &server_name, &[], UnixTime::now())
                .unwrap();
        });

        let logs = String::from_utf8(capture.0.lock().expect("poisoned").clone()).unwrap();
        assert_eq!(
            logs.matches("accepting certificate chain without validation")
                .count(),
            1,
            "logs: {logs}"
        );
        assert!(logs.contains("self-signed.badssl.com"), "logs: {logs}");
    }

    #[test]
    fn policies_lower_to_client_configs() {
        let accept_all = TrustPolicy::accept_all().client_config();
        assert_eq!(accept_all.alpn_protocols, vec![b"http/1.1".to_vec()]);

        let store = TrustPolicy::store([("1", certificate())]).unwrap();
        let config = store.client_config();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
