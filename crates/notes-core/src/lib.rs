pub mod auth;
pub mod config;
pub mod drive;
pub mod filename;
pub mod node;
pub mod operations;
pub mod store;
pub mod tabs;
pub mod tree;
pub mod workspace;

pub use auth::DriveSession;
pub use config::NotesConfig;
pub use drive::{HttpDriveTransport, RemoteProvider};
pub use node::FileNode;
pub use operations::{OperationKind, OperationTracker};
pub use tabs::{TabId, TabManager};
pub use workspace::{Workspace, WorkspaceError};
