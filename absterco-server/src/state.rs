use std::sync::Arc;

use absterco_auth::{AuthOptions, AuthStrategy, SessionGate, StaticAllowList};
use absterco_blob::{BlobStorage, BlobStore, MemoryBlobStore, S3CompatibleStore};
use absterco_content::{
    AdminUserDirectory, ContentRepository, DocumentStore, FirestoreStore, LifecycleManager, MemoryDocumentStore,
};
use absterco_core::{AppError, AppResult};
use tracing::info;

use crate::allowlist::DirectoryAllowList;
use crate::config::{BlobBackend, ServerSettings, Settings, StoreSettings};

/// Shared handles every route works with.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SessionGate>,
    pub repo: Arc<ContentRepository>,
    pub lifecycle: Arc<LifecycleManager>,
    pub users: Arc<AdminUserDirectory>,
    /// Emails registered as admins by `POST /api/admin/setup`
    pub bootstrap_admins: Arc<Vec<String>>,
    pub server: Arc<ServerSettings>,
}

impl AppState {
    /// Wire the state from already-built stores.
    pub fn assemble(
        settings: &Settings,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        strategy: AuthStrategy,
    ) -> Self {
        let repo = Arc::new(ContentRepository::new(Arc::clone(&documents)));
        let storage = Arc::new(BlobStorage::new(blobs, settings.blob.clone()));
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&repo),
            storage,
            settings.compression.clone(),
        ));
        let users = Arc::new(AdminUserDirectory::new(documents));

        let allow_list = Arc::new(DirectoryAllowList::new(
            StaticAllowList::new(&settings.auth.admin_emails),
            Arc::clone(&users),
        ));
        let gate = Arc::new(SessionGate::new(&settings.auth, strategy, allow_list));

        Self {
            gate,
            repo,
            lifecycle,
            users,
            bootstrap_admins: Arc::new(settings.auth.admin_emails.clone()),
            server: Arc::new(settings.server.clone()),
        }
    }

    /// Connect to the configured backends.
    pub async fn connect(settings: &Settings) -> AppResult<Self> {
        let documents: Arc<dyn DocumentStore> = match &settings.store {
            StoreSettings::Memory => {
                info!("store.memory: posts and users are kept in process memory");
                Arc::new(MemoryDocumentStore::new())
            }
            StoreSettings::Firestore(fs) => {
                info!(project_id = %fs.project_id, emulator = ?fs.emulator_host, "store.firestore");
                Arc::new(FirestoreStore::new(fs.clone())?)
            }
        };

        let blobs: Arc<dyn BlobStore> = match &settings.blob_backend {
            BlobBackend::Memory => {
                info!("blob.memory: uploaded images are kept in process memory");
                Arc::new(MemoryBlobStore::new())
            }
            BlobBackend::S3(s3) => {
                info!(bucket = %s3.bucket, endpoint = ?s3.endpoint_url, "blob.s3");
                Arc::new(S3CompatibleStore::new(s3.clone()).await.map_err(|e| {
                    AppError::storage("Failed to configure blob store")
                        .with_source(e.into())
                        .into_anyhow()
                })?)
            }
        };

        let strategy = select_strategy(&settings.auth)?;
        Ok(Self::assemble(settings, documents, blobs, strategy))
    }
}

fn select_strategy(options: &AuthOptions) -> AppResult<AuthStrategy> {
    let strategy = AuthStrategy::from_options(options)?;
    if !strategy.is_bypass() && options.admin_emails.is_empty() {
        info!("auth.no_bootstrap_admins: only directory admins can sign in");
    }
    Ok(strategy)
}
