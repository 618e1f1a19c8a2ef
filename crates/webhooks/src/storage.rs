//! Invoice PDF storage collaborator contract.

use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfStorageError {
    #[error("pdf fetch failed: {0}")]
    Fetch(String),
    #[error("pdf storage unavailable: {0}")]
    Unavailable(String),
}

/// Archives the fiscal-note PDF under our own storage so the order keeps a
/// durable URL even after the provider's link expires. Implementations fetch
/// the document at `source_url` and return the stored URL.
pub trait PdfStorage: Send + Sync {
    fn archive(&self, key: &str, source_url: &str) -> Result<String, PdfStorageError>;
}

/// In-memory fake, recording `(key, source_url)` pairs.
#[derive(Debug, Default)]
pub struct InMemoryPdfStorage {
    stored: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl InMemoryPdfStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<(String, String)> {
        self.stored.lock().unwrap().clone()
    }

    pub fn fail_all(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl PdfStorage for InMemoryPdfStorage {
    fn archive(&self, key: &str, source_url: &str) -> Result<String, PdfStorageError> {
        if *self.fail.lock().unwrap() {
            return Err(PdfStorageError::Unavailable("bucket offline".to_string()));
        }
        self.stored
            .lock()
            .unwrap()
            .push((key.to_string(), source_url.to_string()));
        Ok(format!("memory://{key}"))
    }
}
