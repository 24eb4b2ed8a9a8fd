//! Blog documents as stored in the `blogPosts` and `categories` collections.
//!
//! Author and category are embedded snapshots taken at write time. Renaming a
//! category later does not touch the posts that embed it.

use absterco_core::validation::not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Same absent / `""` / URL semantics as [`BlogPost::featured_image`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(default)]
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Category,
    pub author: Author,
    /// `None` is "never had an image" and is omitted from the document.
    /// `Some("")` is an explicit removal written by an update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub read_time: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Assigned by the document store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Featured image URL, treating `""` as no image.
    pub fn image_url(&self) -> Option<&str> {
        non_empty(self.featured_image.as_deref())
    }

    pub fn author_image_url(&self) -> Option<&str> {
        non_empty(self.author.author_image.as_deref())
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Editable fields of a post as submitted by the admin console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PostFields {
    #[validate(custom(function = "not_blank"))]
    pub title: String,

    #[validate(custom(function = "not_blank"))]
    pub content: String,

    #[serde(default)]
    pub excerpt: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub category_id: String,

    #[validate(nested)]
    pub author: Author,

    /// Absent leaves the stored image alone, `""` removes it, a URL sets it.
    #[serde(default)]
    pub featured_image: Option<String>,

    #[serde(default)]
    pub is_featured: bool,

    #[serde(default)]
    pub is_published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(featured_image: Option<&str>) -> BlogPost {
        BlogPost {
            id: "p1".into(),
            slug: "hello".into(),
            title: "Hello".into(),
            excerpt: "Hi".into(),
            content: "Hi".into(),
            category: Category {
                id: "design".into(),
                name: "Design".into(),
                slug: "design".into(),
                description: String::new(),
                color: "#000".into(),
                is_active: None,
                post_count: None,
            },
            author: Author {
                name: "Ana".into(),
                ..Author::default()
            },
            featured_image: featured_image.map(str::to_string),
            read_time: "1 min read".into(),
            is_featured: false,
            is_published: false,
            published_at: None,
            created_at: None,
            updated_at: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn absent_image_is_omitted_but_empty_is_kept() {
        let absent = serde_json::to_value(post(None)).unwrap();
        assert!(absent.get("featuredImage").is_none());
        assert!(absent["author"].get("authorImage").is_none());

        let removed = serde_json::to_value(post(Some(""))).unwrap();
        assert_eq!(removed["featuredImage"], json!(""));
        assert_eq!(post(Some("")).image_url(), None);
    }

    #[test]
    fn post_fields_distinguish_absent_from_empty_image() {
        let absent: PostFields = serde_json::from_value(json!({
            "title": "t", "content": "c", "categoryId": "x", "author": {"name": "a"}
        }))
        .unwrap();
        assert_eq!(absent.featured_image, None);

        let empty: PostFields = serde_json::from_value(json!({
            "title": "t", "content": "c", "categoryId": "x", "author": {"name": "a"},
            "featuredImage": ""
        }))
        .unwrap();
        assert_eq!(empty.featured_image.as_deref(), Some(""));
    }

    #[test]
    fn blank_author_name_fails_validation() {
        let fields = PostFields {
            title: "t".into(),
            content: "c".into(),
            category_id: "x".into(),
            author: Author::default(),
            ..PostFields::default()
        };
        let errs = fields.validate().unwrap_err();
        assert!(errs.errors().contains_key("author"));
    }
}
