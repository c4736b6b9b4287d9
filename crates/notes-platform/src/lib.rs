// Storage contract shared by every backend

pub mod auth;
pub mod path;
pub mod storage;

pub use auth::AuthSession;
pub use storage::{
    BackendRef, ChildEntry, EntryKind, LocalHandle, RemoteHandle, StorageError, StorageProvider,
    StorageType,
};
