//! # absterco-content
//!
//! Blog posts, categories and admin users on top of a schemaless
//! [`DocumentStore`], plus the [`LifecycleManager`] that keeps post documents
//! and their image blobs consistent.
//!
//! Public pages read through [`ContentRepository`] with fallback enabled, so an
//! empty or unreachable store degrades to bundled sample content. Admin pages
//! disable fallback to avoid masking real data issues.

pub mod fallback;
pub mod firestore;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod repository;
pub mod store;
pub mod text;
pub mod users;

pub use firestore::{FirestoreSettings, FirestoreStore};
pub use lifecycle::{
    CleanupAction, CleanupWarning, CreatePost, ImageDisposition, LifecycleManager, LifecycleOutcome,
    UpdatePost,
};
pub use memory::MemoryDocumentStore;
pub use model::{Author, BlogPost, Category, PostFields};
pub use repository::{ContentRepository, ListPostsQuery, PostOrder, PostPage, PostSource};
pub use store::{Direction, DocumentStore, Query};
pub use users::{AdminUser, AdminUserDirectory, EditAdminUser, NewAdminUser, Role, SetupReport};
