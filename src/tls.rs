/*!
 * PEM loading for client TLS (CA bundles and mutual-TLS identities)
 */

use reqwest::{Certificate, Identity};
use std::path::Path;

use crate::error::{FerryError, Result};

/// Load a PEM CA bundle to trust in addition to the system roots
pub fn load_certificate(path: &Path) -> Result<Certificate> {
    let pem = std::fs::read(path).map_err(|e| {
        FerryError::Config(format!("Failed to read CA bundle {}: {}", path.display(), e))
    })?;
    Certificate::from_pem(&pem)
        .map_err(|e| FerryError::Config(format!("Invalid CA bundle {}: {}", path.display(), e)))
}

/// Load a client certificate chain and its private key (both PEM)
pub fn load_identity(cert: &Path, key: &Path) -> Result<Identity> {
    let mut pem = std::fs::read(cert).map_err(|e| {
        FerryError::Config(format!("Failed to read certificate {}: {}", cert.display(), e))
    })?;
    let key_pem = std::fs::read(key)
        .map_err(|e| FerryError::Config(format!("Failed to read key {}: {}", key.display(), e)))?;
    pem.push(b'\n');
    pem.extend_from_slice(&key_pem);
    Identity::from_pem(&pem).map_err(|e| {
        FerryError::Config(format!("Invalid client identity {}: {}", cert.display(), e))
    })
}
