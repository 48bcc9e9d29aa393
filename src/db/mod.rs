//! Database layer (document store adapter).

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use store::{
    new_document_id, BatchWrite, BatchWriteKind, DocumentStore, FieldFilter, FilterOp, OrderBy,
    SortDirection, StoreError, WriteBatch, DOC_ID_FIELD, MAX_BATCH_WRITES,
};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const EVENTS: &str = "events";
    /// Participation records (one per event/user pair)
    pub const PARTICIPANTS: &str = "participants";
}
