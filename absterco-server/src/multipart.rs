//! Post submission forms.
//!
//! The admin console submits posts as `multipart/form-data`:
//!
//! - `data`: the post fields as JSON text
//! - `image`, `authorImage`: optional image files
//! - `removeImage`, `removeAuthorImage`: optional `true` flags
//!
//! A plain `application/json` body with just the fields is accepted too.

use absterco_blob::ImageFile;
use absterco_content::{CreatePost, PostFields, UpdatePost};
use absterco_core::{AppError, AppResult};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PostForm {
    pub fields: Option<PostFields>,
    pub image: Option<ImageFile>,
    pub author_image: Option<ImageFile>,
    pub remove_image: bool,
    pub remove_author_image: bool,
}

impl PostForm {
    pub async fn parse(headers: &HeaderMap, body: Bytes) -> AppResult<Self> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            return Ok(Self {
                fields: Some(parse_fields(&body)?),
                ..Self::default()
            });
        }

        let boundary = multer::parse_boundary(content_type).map_err(|e| {
            AppError::bad_request("Expected a multipart/form-data or application/json body")
                .with_source(e.into())
                .into_anyhow()
        })?;

        let mut multipart = multer::Multipart::new(
            futures::stream::once(async move { Ok::<Bytes, multer::Error>(body) }),
            boundary,
        );

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|m| m.to_string());
            let data = field.bytes().await.map_err(multipart_error)?;

            match name.as_str() {
                "data" => form.fields = Some(parse_fields(&data)?),
                "image" => form.image = image_file(&name, filename, content_type, data)?,
                "authorImage" => form.author_image = image_file(&name, filename, content_type, data)?,
                "removeImage" => form.remove_image = flag(&data),
                "removeAuthorImage" => form.remove_author_image = flag(&data),
                other => debug!(field = other, "multipart.ignored_field"),
            }
        }
        Ok(form)
    }

    pub fn into_create(self) -> AppResult<CreatePost> {
        Ok(CreatePost {
            fields: self.fields.ok_or_else(missing_fields)?,
            image: self.image,
            author_image: self.author_image,
        })
    }

    pub fn into_update(self) -> AppResult<UpdatePost> {
        Ok(UpdatePost {
            fields: self.fields.ok_or_else(missing_fields)?,
            image: self.image,
            author_image: self.author_image,
            remove_image: self.remove_image,
            remove_author_image: self.remove_author_image,
        })
    }
}

fn parse_fields(raw: &[u8]) -> AppResult<PostFields> {
    serde_json::from_slice(raw).map_err(|e| {
        AppError::bad_request("Post data is not valid JSON")
            .with_errors(json!({ "data": [e.to_string()] }))
            .into_anyhow()
    })
}

/// Browsers send an empty part for an untouched file input.
fn image_file(
    field: &str,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
) -> AppResult<Option<ImageFile>> {
    if data.is_empty() {
        return Ok(None);
    }
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    if !content_type.starts_with("image/") {
        let mut errors = serde_json::Map::new();
        errors.insert(
            field.to_string(),
            json!([format!("unsupported content type {content_type}")]),
        );
        return Err(AppError::validation("Uploaded file must be an image")
            .with_errors(errors.into())
            .into_anyhow());
    }
    let filename = filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format!("{field}.img"));
    Ok(Some(ImageFile::new(filename, content_type, data)))
}

fn flag(raw: &[u8]) -> bool {
    matches!(
        std::str::from_utf8(raw).map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Ok("true" | "1" | "on" | "yes")
    )
}

fn missing_fields() -> anyhow::Error {
    AppError::bad_request("Missing `data` field with the post fields")
        .with_errors(json!({ "data": ["required"] }))
        .into_anyhow()
}

fn multipart_error(e: multer::Error) -> anyhow::Error {
    AppError::bad_request(format!("Failed to parse multipart data: {e}"))
        .with_source(e.into())
        .into_anyhow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn multipart_headers(boundary: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={boundary}")).unwrap(),
        );
        headers
    }

    const FIELDS: &str = r#"{"title":"Hello","content":"Body","categoryId":"branding","author":{"name":"Ana"}}"#;

    #[tokio::test]
    async fn parses_fields_files_and_flags() {
        let body = format!(
            "--XB\r\nContent-Disposition: form-data; name=\"data\"\r\n\r\n{FIELDS}\r\n\
             --XB\r\nContent-Disposition: form-data; name=\"image\"; filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
             --XB\r\nContent-Disposition: form-data; name=\"authorImage\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n\
             --XB\r\nContent-Disposition: form-data; name=\"removeAuthorImage\"\r\n\r\ntrue\r\n\
             --XB--\r\n"
        );
        let form = PostForm::parse(&multipart_headers("XB"), Bytes::from(body)).await.unwrap();

        assert_eq!(form.fields.as_ref().unwrap().title, "Hello");
        let image = form.image.as_ref().unwrap();
        assert_eq!(image.name, "cover.png");
        assert_eq!(image.content_type, "image/png");
        assert!(form.author_image.is_none());
        assert!(!form.remove_image);
        assert!(form.remove_author_image);

        let update = form.into_update().unwrap();
        assert!(update.remove_author_image);
    }

    #[tokio::test]
    async fn rejects_non_images_and_missing_data() {
        let body = "--XB\r\nContent-Disposition: form-data; name=\"image\"; filename=\"notes.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XB--\r\n";
        let err = PostForm::parse(&multipart_headers("XB"), Bytes::from(body)).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), absterco_core::ErrorKind::Validation);

        let form = PostForm::default();
        let err = form.into_create().unwrap_err();
        assert_eq!(AppError::kind_of(&err), absterco_core::ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn json_bodies_carry_fields_only() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let form = PostForm::parse(&headers, Bytes::from_static(FIELDS.as_bytes())).await.unwrap();
        assert_eq!(form.into_create().unwrap().fields.category_id, "branding");
    }
}
