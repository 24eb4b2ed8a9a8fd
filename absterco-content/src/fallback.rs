//! Bundled sample content served when the live store is empty or unreachable.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{Author, BlogPost, Category};
use crate::text::{derive_excerpt, generate_slug, read_time};

fn category(id: &str, name: &str, description: &str, color: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        slug: generate_slug(name),
        description: description.to_string(),
        color: color.to_string(),
        is_active: Some(true),
        post_count: None,
    }
}

pub fn sample_categories() -> Vec<Category> {
    vec![
        category(
            "branding",
            "Branding",
            "Identity systems, naming and the stories behind rebrands",
            "#7C3AED",
        ),
        category(
            "web-design",
            "Web Design",
            "Interfaces, design systems and front-end craft",
            "#2563EB",
        ),
        category(
            "development",
            "Development",
            "Engineering notes from client builds",
            "#059669",
        ),
        category(
            "strategy",
            "Strategy",
            "Positioning, research and growth for digital products",
            "#EA580C",
        ),
    ]
}

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn studio_author(name: &str, role: &str, bio: &str) -> Author {
    Author {
        name: name.to_string(),
        role: role.to_string(),
        avatar: format!("/images/team/{}.jpg", generate_slug(name)),
        bio: bio.to_string(),
        position: Some(role.to_string()),
        author_image: None,
    }
}

struct Sample {
    id: &'static str,
    title: &'static str,
    content: &'static str,
    category: &'static str,
    featured: bool,
    image: &'static str,
    published: DateTime<Utc>,
}

pub fn sample_posts() -> Vec<BlogPost> {
    let categories = sample_categories();
    let lead = studio_author(
        "Maya Okafor",
        "Creative Director",
        "Leads brand and product design at Absterco.",
    );
    let engineer = studio_author(
        "Daniel Reyes",
        "Lead Engineer",
        "Builds the platforms behind our clients' sites.",
    );

    let samples = [
        Sample {
            id: "sample-rebrand",
            title: "Why We Rebranded Absterco",
            content: "<p>After five years of client work our identity no longer matched the studio we had become.</p>\
                      <p>This is the story of the new mark, the palette and the voice behind them.</p>",
            category: "branding",
            featured: true,
            image: "https://images.unsplash.com/photo-1561070791-2526d30994b5",
            published: day(2024, 9, 12),
        },
        Sample {
            id: "sample-design-systems",
            title: "Design Systems That Survive Handoff",
            content: "<p>A design system is only useful if engineers keep using it after launch.</p>\
                      <p>We share the token structure and review habits that keep ours alive.</p>",
            category: "web-design",
            featured: false,
            image: "https://images.unsplash.com/photo-1559028012-481c04fa702d",
            published: day(2024, 8, 3),
        },
        Sample {
            id: "sample-performance",
            title: "Shipping Fast Marketing Sites",
            content: "<p>Core Web Vitals are a product feature. Here is how we budget images, fonts and scripts on every build.</p>",
            category: "development",
            featured: true,
            image: "https://images.unsplash.com/photo-1498050108023-c5249f4df085",
            published: day(2024, 7, 18),
        },
        Sample {
            id: "sample-positioning",
            title: "Positioning Before Pixels",
            content: "<p>Most redesigns fail long before the first mockup. We start every engagement with a positioning workshop.</p>",
            category: "strategy",
            featured: false,
            image: "https://images.unsplash.com/photo-1552664730-d307ca884978",
            published: day(2024, 6, 2),
        },
    ];

    samples
        .into_iter()
        .map(|s| {
            let category = categories
                .iter()
                .find(|c| c.id == s.category)
                .cloned()
                .unwrap_or_else(|| category(s.category, s.category, "", "#6B7280"));
            let author = if s.category == "development" {
                engineer.clone()
            } else {
                lead.clone()
            };

            BlogPost {
                id: s.id.to_string(),
                slug: generate_slug(s.title),
                title: s.title.to_string(),
                excerpt: derive_excerpt(s.content, None),
                content: s.content.to_string(),
                category,
                author,
                featured_image: Some(s.image.to_string()),
                read_time: read_time(s.content),
                is_featured: s.featured,
                is_published: true,
                published_at: Some(s.published),
                created_at: Some(s.published),
                updated_at: s.published,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_published_and_reference_known_categories() {
        let categories = sample_categories();
        let posts = sample_posts();

        assert!(!posts.is_empty());
        for post in &posts {
            assert!(post.is_published);
            assert!(post.published_at.is_some());
            assert!(categories.iter().any(|c| c.id == post.category.id));
            assert!(!post.excerpt.is_empty());
        }
    }
}
