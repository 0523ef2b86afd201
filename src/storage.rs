use crate::errors::DbError;
use crate::types::Operation;

/// Append-only sink for store mutations. `read_all` returns operations in append order.
pub trait StorageEngine: Send + Sync {
    /// # Errors
    /// Returns an error if the operation cannot be encoded or durably written.
    fn append(&mut self, operation: &Operation) -> Result<(), DbError>;

    /// # Errors
    /// Returns an error if the log cannot be read or a complete frame fails verification.
    fn read_all(&self) -> Result<Vec<Operation>, DbError>;
}

/// Keeps nothing; used for ephemeral stores and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    appended: u64,
}

impl MemoryStorage {
    #[must_use]
    pub const fn new() -> Self {
        Self { appended: 0 }
    }

    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.appended
    }
}

impl StorageEngine for MemoryStorage {
    fn append(&mut self, _operation: &Operation) -> Result<(), DbError> {
        self.appended += 1;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Operation>, DbError> {
        Ok(Vec::new())
    }
}
