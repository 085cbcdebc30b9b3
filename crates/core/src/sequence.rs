use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("no sequence is configured for code `{0}`")]
    UnknownCode(String),
    #[error("sequence backend unavailable: {0}")]
    Unavailable(String),
}

/// Monotonic reference generator, unique per code. References follow the
/// `CODE/YYYY/NNNN` format used on every request.
#[async_trait]
pub trait ReferenceSequence: Send + Sync {
    async fn next_reference(&self, code: &str) -> Result<String, SequenceError>;
}

pub fn format_reference(code: &str, year: i32, number: u32) -> String {
    format!("{code}/{year}/{number:04}")
}

/// In-process sequence for tests and single-node tooling.
#[derive(Debug, Default)]
pub struct InMemorySequence {
    counters: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl ReferenceSequence for InMemorySequence {
    async fn next_reference(&self, code: &str) -> Result<String, SequenceError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("sequence lock poisoned".to_string()))?;
        let counter = counters.entry(code.to_string()).or_insert(0);
        *counter += 1;
        Ok(format_reference(code, Utc::now().year(), *counter))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Utc};

    use super::{format_reference, InMemorySequence, ReferenceSequence};

    #[test]
    fn references_are_zero_padded() {
        assert_eq!(format_reference("CRD", 2026, 7), "CRD/2026/0007");
        assert_eq!(format_reference("COU", 2026, 12_345), "COU/2026/12345");
    }

    #[tokio::test]
    async fn in_memory_sequence_is_monotonic_per_code() {
        let sequence = InMemorySequence::default();
        let year = Utc::now().year();

        let first = sequence.next_reference("CRD").await.expect("first");
        let second = sequence.next_reference("CRD").await.expect("second");
        let other = sequence.next_reference("COU").await.expect("other code");

        assert_eq!(first, format_reference("CRD", year, 1));
        assert_eq!(second, format_reference("CRD", year, 2));
        assert_eq!(other, format_reference("COU", year, 1));
    }
}
