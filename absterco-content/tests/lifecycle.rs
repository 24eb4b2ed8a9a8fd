use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use absterco_blob::{
    BlobConfig, BlobError, BlobResult, BlobStorage, BlobStore, CompressionOptions, ImageFile,
    MemoryBlobStore, ObjectHead, PutResult,
};
use absterco_content::{
    Author, CleanupAction, ContentRepository, CreatePost, DocumentStore, LifecycleManager,
    MemoryDocumentStore, PostFields, Query, UpdatePost,
};
use absterco_core::{AppError, AppResult, ErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::Value;

/// Memory store that can be told to fail post writes.
#[derive(Default)]
struct FlakyDocuments {
    inner: MemoryDocumentStore,
    fail_writes: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        self.inner.get(collection, id).await
    }
    async fn create(&self, collection: &str, data: Value) -> AppResult<Value> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::repository("write rejected").into_anyhow());
        }
        self.inner.create(collection, data).await
    }
    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<Value> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::repository("write rejected").into_anyhow());
        }
        self.inner.update(collection, id, patch).await
    }
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.inner.delete(collection, id).await
    }
    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Value>> {
        self.inner.query(collection, query).await
    }
}

/// Memory blob store that records deletes and can be told to fail them.
#[derive(Default)]
struct RecordingBlobs {
    inner: MemoryBlobStore,
    fail_deletes: AtomicBool,
    deletes: tokio::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStore for RecordingBlobs {
    async fn put(&self, key: &str, content_type: Option<&str>, data: Bytes) -> BlobResult<PutResult> {
        self.inner.put(key, content_type, data).await
    }
    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.deletes.lock().await.push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::upload_failed("bucket unavailable"));
        }
        self.inner.delete(key).await
    }
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>> {
        self.inner.head(key).await
    }
}

struct Harness {
    docs: Arc<FlakyDocuments>,
    blobs: Arc<RecordingBlobs>,
    storage: Arc<BlobStorage>,
    manager: LifecycleManager,
}

fn harness() -> Harness {
    let docs = Arc::new(FlakyDocuments::default());
    let blobs = Arc::new(RecordingBlobs::default());
    let storage = Arc::new(BlobStorage::new(
        blobs.clone(),
        BlobConfig::new().with_public_base_url("https://cdn.test/v0/b/site"),
    ));
    let repo = Arc::new(ContentRepository::new(docs.clone()));
    let manager = LifecycleManager::new(repo, storage.clone(), CompressionOptions::default());
    Harness {
        docs,
        blobs,
        storage,
        manager,
    }
}

fn png(name: &str, shade: u8) -> ImageFile {
    let img = ImageBuffer::from_pixel(48, 32, Rgb([shade, 90, 140]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    ImageFile::new(name, "image/png", buf)
}

fn fields(title: &str) -> PostFields {
    PostFields {
        title: title.to_string(),
        content: "<p>Hello from the studio.</p>".to_string(),
        excerpt: None,
        category_id: "branding".to_string(),
        author: Author {
            name: "Maya".to_string(),
            ..Author::default()
        },
        featured_image: None,
        is_featured: false,
        is_published: false,
    }
}

async fn exists(h: &Harness, url: &str) -> bool {
    h.storage.exists(url).await.unwrap()
}

#[tokio::test]
async fn create_without_image_omits_featured_image() {
    let h = harness();
    let out = h
        .manager
        .create(CreatePost {
            fields: fields("Hello World"),
            ..CreatePost::default()
        })
        .await
        .unwrap();

    let post = out.value;
    assert_eq!(post.slug, "hello-world");
    assert_eq!(post.featured_image, None);
    assert_eq!(post.excerpt, "Hello from the studio.");
    assert_eq!(post.category.name, "Branding");
    assert!(post.created_at.is_some());
    assert!(post.published_at.is_none());

    let raw = h.docs.get("blogPosts", &post.id).await.unwrap().unwrap();
    assert!(raw.get("featuredImage").is_none());
}

#[tokio::test]
async fn create_with_image_uploads_compressed_blob() {
    let h = harness();
    let out = h
        .manager
        .create(CreatePost {
            fields: PostFields {
                is_published: true,
                ..fields("Cover Story")
            },
            image: Some(png("cover.png", 10)),
            ..CreatePost::default()
        })
        .await
        .unwrap();

    let url = out.value.featured_image.clone().unwrap();
    assert!(url.contains("blog-images%2F"));
    assert!(url.ends_with("-cover.webp?alt=media"));
    assert!(exists(&h, &url).await);
    assert!(out.value.published_at.is_some());
}

async fn stored_red_channel(h: &Harness, url: &str) -> u8 {
    let path = absterco_blob::storage::storage_path_from_url(url).unwrap();
    let bytes = h.blobs.inner.bytes(&path).await.unwrap();
    image::load_from_memory(&bytes).unwrap().to_rgb8().get_pixel(0, 0).0[0]
}

#[tokio::test]
async fn featured_and_author_images_with_same_name_get_their_own_blobs() {
    let h = harness();

    for round in 0..10 {
        let post = h
            .manager
            .create(CreatePost {
                fields: fields(&format!("Twin Photos {round}")),
                image: Some(png("photo.png", 10)),
                author_image: Some(png("photo.png", 250)),
            })
            .await
            .unwrap()
            .value;

        let featured = post.featured_image.clone().unwrap();
        let author = post.author.author_image.clone().unwrap();
        assert_ne!(featured, author);
        assert!(stored_red_channel(&h, &featured).await.abs_diff(10) <= 8);
        assert!(stored_red_channel(&h, &author).await.abs_diff(250) <= 8);
    }

    assert_eq!(h.blobs.inner.len().await, 20);
}

#[tokio::test]
async fn update_uploading_both_images_keeps_each_slot_on_its_own_blob() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost { fields: fields("Swap Both"), ..CreatePost::default() })
        .await
        .unwrap()
        .value;

    let updated = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: fields("Swap Both"),
                image: Some(png("photo.png", 40)),
                author_image: Some(png("photo.png", 200)),
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap()
        .value;

    let featured = updated.featured_image.clone().unwrap();
    let author = updated.author.author_image.clone().unwrap();
    assert_ne!(featured, author);
    assert!(stored_red_channel(&h, &featured).await.abs_diff(40) <= 8);
    assert!(stored_red_channel(&h, &author).await.abs_diff(200) <= 8);
}

#[tokio::test]
async fn duplicate_titles_get_distinct_slugs() {
    let h = harness();
    let a = h.manager.create(CreatePost { fields: fields("Same"), ..CreatePost::default() }).await.unwrap();
    let b = h.manager.create(CreatePost { fields: fields("Same"), ..CreatePost::default() }).await.unwrap();
    assert_eq!(a.value.slug, "same");
    assert_eq!(b.value.slug, "same-2");
}

#[tokio::test]
async fn validation_fails_before_any_side_effect() {
    let h = harness();

    let err = h
        .manager
        .create(CreatePost {
            fields: PostFields {
                title: "   ".into(),
                ..fields("x")
            },
            image: Some(png("a.png", 1)),
            ..CreatePost::default()
        })
        .await
        .unwrap_err();
    assert_eq!(AppError::kind_of(&err), ErrorKind::Validation);

    let err = h
        .manager
        .create(CreatePost {
            fields: PostFields {
                category_id: "no-such-category".into(),
                ..fields("x")
            },
            ..CreatePost::default()
        })
        .await
        .unwrap_err();
    assert_eq!(AppError::kind_of(&err), ErrorKind::Validation);

    let err = h
        .manager
        .create(CreatePost {
            fields: fields("x"),
            image: Some(ImageFile::new("a.jpg", "image/jpeg", b"not an image".to_vec())),
            ..CreatePost::default()
        })
        .await
        .unwrap_err();
    let app = AppError::from_anyhow(&err).unwrap();
    assert_eq!(app.kind, ErrorKind::Validation);
    assert_eq!(app.message, "image could not be decoded");

    assert!(h.blobs.inner.is_empty().await);
}

#[tokio::test]
async fn failed_document_write_cleans_up_uploaded_blob() {
    let h = harness();
    h.docs.fail_writes.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .create(CreatePost {
            fields: fields("Doomed"),
            image: Some(png("doomed.png", 20)),
            ..CreatePost::default()
        })
        .await
        .unwrap_err();

    assert_eq!(AppError::kind_of(&err), ErrorKind::Repository);
    assert_eq!(h.blobs.deletes.lock().await.len(), 1);
    assert!(h.blobs.inner.is_empty().await);
}

#[tokio::test]
async fn update_image_disposition() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: fields("Disposition"),
            image: Some(png("a.png", 30)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let a = created.featured_image.clone().unwrap();

    // omitted
    let out = h
        .manager
        .update(&created.id, UpdatePost { fields: fields("Disposition"), ..UpdatePost::default() })
        .await
        .unwrap();
    assert_eq!(out.value.featured_image.as_deref(), Some(a.as_str()));

    // same value
    let out = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: PostFields {
                    featured_image: Some(a.clone()),
                    ..fields("Disposition")
                },
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(out.value.featured_image.as_deref(), Some(a.as_str()));
    assert!(h.blobs.deletes.lock().await.is_empty());

    // replaced by upload
    let out = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: fields("Disposition"),
                image: Some(png("b.png", 40)),
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap();
    let b = out.value.featured_image.clone().unwrap();
    assert_ne!(a, b);
    assert!(out.warnings.is_empty());
    assert!(!exists(&h, &a).await);
    assert!(exists(&h, &b).await);

    // removed
    let out = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: PostFields {
                    featured_image: Some(String::new()),
                    ..fields("Disposition")
                },
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(out.value.featured_image.as_deref(), Some(""));
    assert!(!exists(&h, &b).await);

    let raw = h.docs.get("blogPosts", &created.id).await.unwrap().unwrap();
    assert_eq!(raw["featuredImage"], "");
}

#[tokio::test]
async fn superseded_blob_survives_failed_update() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: fields("Keep"),
            image: Some(png("a.png", 50)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let a = created.featured_image.clone().unwrap();

    h.docs.fail_writes.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: fields("Keep"),
                image: Some(png("b.png", 60)),
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(AppError::kind_of(&err), ErrorKind::Repository);
    assert!(exists(&h, &a).await);
    // only the new, never-committed upload is cleaned up
    assert_eq!(h.blobs.inner.keys().await.len(), 1);
}

#[tokio::test]
async fn title_change_recomputes_slug_and_publish_stamps_once() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost { fields: fields("First Title"), ..CreatePost::default() })
        .await
        .unwrap()
        .value;

    let published = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: PostFields {
                    is_published: true,
                    content: "<p>Rewritten opening line.</p>".into(),
                    ..fields("Second Title")
                },
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(published.slug, "second-title");
    assert_eq!(published.excerpt, "Rewritten opening line.");
    let stamped = published.published_at.unwrap();

    let again = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: PostFields {
                    is_published: true,
                    ..fields("Second Title")
                },
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(again.published_at, Some(stamped));
}

#[tokio::test]
async fn empty_excerpt_resets_a_custom_excerpt() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: PostFields {
                excerpt: Some("Hand written teaser".into()),
                ..fields("Teaser")
            },
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    assert_eq!(created.excerpt, "Hand written teaser");

    let kept = h
        .manager
        .update(&created.id, UpdatePost { fields: fields("Teaser"), ..UpdatePost::default() })
        .await
        .unwrap()
        .value;
    assert_eq!(kept.excerpt, "Hand written teaser");

    let reset = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: PostFields {
                    excerpt: Some(String::new()),
                    ..fields("Teaser")
                },
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(reset.excerpt, "Hello from the studio.");
}

#[tokio::test]
async fn delete_cascades_and_survives_blob_failure() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: fields("Gone"),
            image: Some(png("gone.png", 70)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let url = created.featured_image.clone().unwrap();

    h.blobs.fail_deletes.store(true, Ordering::SeqCst);
    let out = h.manager.delete(&created.id).await.unwrap();

    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.warnings[0].action, CleanupAction::DeleteCascade);
    assert_eq!(out.warnings[0].url, url);
    assert!(h.docs.get("blogPosts", &created.id).await.unwrap().is_none());

    let err = h.manager.delete(&created.id).await.unwrap_err();
    assert_eq!(AppError::kind_of(&err), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_removes_both_document_and_blob() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: fields("Cascade"),
            image: Some(png("c.png", 80)),
            author_image: Some(png("face.png", 90)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let featured = created.featured_image.clone().unwrap();
    let face = created.author.author_image.clone().unwrap();

    let out = h.manager.delete(&created.id).await.unwrap();
    assert!(out.warnings.is_empty());
    assert!(!exists(&h, &featured).await);
    assert!(!exists(&h, &face).await);
    assert!(h.docs.get("blogPosts", &created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn shared_blob_is_not_deleted_while_referenced() {
    let h = harness();
    let first = h
        .manager
        .create(CreatePost {
            fields: fields("Original"),
            image: Some(png("shared.png", 100)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let shared = first.featured_image.clone().unwrap();

    let second = h
        .manager
        .create(CreatePost {
            fields: PostFields {
                featured_image: Some(shared.clone()),
                ..fields("Copy")
            },
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;

    let out = h.manager.delete(&first.id).await.unwrap();
    assert_eq!(out.warnings[0].action, CleanupAction::SkippedInUse);
    assert!(exists(&h, &shared).await);

    let out = h.manager.delete(&second.id).await.unwrap();
    assert!(out.warnings.is_empty());
    assert!(!exists(&h, &shared).await);
}

#[tokio::test]
async fn author_image_follows_its_own_disposition() {
    let h = harness();
    let created = h
        .manager
        .create(CreatePost {
            fields: fields("Authors"),
            image: Some(png("cover.png", 110)),
            author_image: Some(png("face.png", 120)),
            ..CreatePost::default()
        })
        .await
        .unwrap()
        .value;
    let cover = created.featured_image.clone().unwrap();
    let face = created.author.author_image.clone().unwrap();

    let out = h
        .manager
        .update(
            &created.id,
            UpdatePost {
                fields: fields("Authors"),
                remove_author_image: true,
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(out.value.author.author_image.as_deref(), Some(""));
    assert_eq!(out.value.featured_image.as_deref(), Some(cover.as_str()));
    assert!(!exists(&h, &face).await);
    assert!(exists(&h, &cover).await);
}
