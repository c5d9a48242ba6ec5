/// Handle for the single active transaction of an executor.
///
/// Not `Clone`: commit and rollback consume it, which is how the executor
/// releases it.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
}

impl Transaction {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }

    /// Sequence number of this transaction within its executor, starting at 1.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}
