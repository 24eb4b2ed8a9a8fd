/// Configuration for blog image storage
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Logical bucket folder every object path starts with
    pub folder: String,

    /// Base of the public URL, e.g. `https://storage.example.com/v0/b/site-assets`
    pub public_base_url: String,

    /// Absolute max size accepted for a single upload (safety guard)
    pub max_blob_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            folder: "blog-images".to_string(),
            public_base_url: "http://localhost:3000/blobs".to_string(),
            max_blob_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl BlobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_public_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.public_base_url = url.into();
        self
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }
}
