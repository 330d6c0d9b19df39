//! Client TLS configuration for `smtps` delivery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Environment variable naming a PEM bundle of trusted roots.
pub const CA_FILE_ENV: &str = "SSL_CERT_FILE";

const SYSTEM_CA_BUNDLES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/ca-bundle.pem",
    "/etc/ssl/cert.pem",
];

/// Load every certificate in a PEM file as a trust anchor.
pub fn load_root_certificates(path: &Path) -> Result<RootCertStore> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| {
            TransportError::Tls(format!("failed to read CA bundle {}: {}", path.display(), e))
        })?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(TransportError::Tls(format!(
            "no usable certificates in {}",
            path.display()
        )));
    }
    debug!(path = %path.display(), added, ignored, "loaded CA bundle");
    Ok(roots)
}

pub fn client_config(roots: RootCertStore) -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Roots from [`CA_FILE_ENV`], else the first system bundle found.
pub(crate) fn default_client_config() -> Result<Arc<ClientConfig>> {
    let path = match std::env::var_os(CA_FILE_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => SYSTEM_CA_BUNDLES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
            .ok_or_else(|| {
                TransportError::Tls(format!("no system CA bundle found, set {}", CA_FILE_ENV))
            })?,
    };
    Ok(client_config(load_root_certificates(&path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_loads_ca_fixture() {
        let roots = load_root_certificates(&fixture("ca.pem")).unwrap();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_missing_bundle_is_tls_error() {
        let err = load_root_certificates(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)));
    }

    #[test]
    fn test_bundle_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();
        assert!(matches!(
            load_root_certificates(&path),
            Err(TransportError::Tls(_))
        ));
    }
}
