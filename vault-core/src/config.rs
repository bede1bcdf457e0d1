use crate::chunker::CHUNK_SIZE;

/// Ledger file kept at the collection root.
pub const LEDGER_NAME: &str = ".collection";

#[derive(Clone, Debug)]
pub struct CollectionConfig {
    /// Block size used for new ledgers. Existing ledgers carry their own.
    pub chunk_size: usize,
    pub ledger_name: String,
    pub progress: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self { chunk_size: CHUNK_SIZE, ledger_name: LEDGER_NAME.to_string(), progress: false }
    }
}
