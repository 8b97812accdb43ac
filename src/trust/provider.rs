//! Sources of IACA trust anchors.

use std::fs;
use std::path::{Path, PathBuf};

use super::x5chain::CertificateWithDer;
use super::Error;

/// Provides trust anchors from a specific source.
pub trait TrustProvider: Send + Sync {
    fn load_anchors(&self) -> Result<Vec<CertificateWithDer>, Error>;
}

/// Loads DER-encoded `.cer` anchors from a read-only bundle directory,
/// discovered recursively. An empty or missing bundle is an error: callers
/// must be able to distinguish "no anchors installed" from "nothing trusted".
#[derive(Debug, Clone)]
pub struct DirectoryTrustProvider {
    root: PathBuf,
}

impl DirectoryTrustProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect(&self, dir: &Path, found: &mut Vec<CertificateWithDer>) -> Result<(), Error> {
        let entries = fs::read_dir(dir)
            .map_err(|e| Error::Provider(format!("unable to read {}: {e}", dir.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Provider(format!("unable to read directory entry: {e}")))?;
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, found)?;
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("cer"))
            {
                let der = fs::read(&path).map_err(|e| {
                    Error::Provider(format!("unable to read {}: {e}", path.display()))
                })?;
                let certificate = CertificateWithDer::from_der(&der).map_err(|e| {
                    Error::Provider(format!("invalid certificate {}: {e}", path.display()))
                })?;
                found.push(certificate);
            }
        }
        Ok(())
    }
}

impl TrustProvider for DirectoryTrustProvider {
    fn load_anchors(&self) -> Result<Vec<CertificateWithDer>, Error> {
        let mut found = vec![];
        self.collect(&self.root, &mut found)?;
        if found.is_empty() {
            return Err(Error::Provider(format!(
                "no trust anchors found under {}",
                self.root.display()
            )));
        }
        Ok(found)
    }
}

/// In-memory anchor source, used for tests and for development bundles that
/// ship inside the binary.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustProvider {
    anchors: Vec<CertificateWithDer>,
}

impl StaticTrustProvider {
    pub fn new(anchors: Vec<CertificateWithDer>) -> Self {
        Self { anchors }
    }
}

impl TrustProvider for StaticTrustProvider {
    fn load_anchors(&self) -> Result<Vec<CertificateWithDer>, Error> {
        if self.anchors.is_empty() {
            return Err(Error::Provider("static anchor source is empty".to_string()));
        }
        Ok(self.anchors.clone())
    }
}
