//! Fields derived from a post's title and content: slug, excerpt and read time.

use std::collections::HashSet;

pub const EXCERPT_PLACEHOLDER: &str = "No excerpt available";
pub const EXCERPT_MAX_CHARS: usize = 150;
pub const WORDS_PER_MINUTE: usize = 200;

/// Lowercase ASCII slug. Characters other than alphanumerics, whitespace and
/// hyphens are dropped; whitespace and hyphen runs become a single `-`.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }

    slug
}

/// `base`, or `base-2`, `base-3`, ... whichever is not yet taken.
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    let base = if base.is_empty() { "post" } else { base };
    if !taken.contains(base) {
        return base.to_string();
    }

    let mut n = 2usize;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

pub fn word_count(content: &str) -> usize {
    strip_markup(content).split_whitespace().count()
}

/// `"{minutes} min read"` at 200 words per minute, never below one minute.
pub fn read_time(content: &str) -> String {
    let minutes = word_count(content).div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{minutes} min read")
}

/// A supplied non-blank excerpt wins. Otherwise the first non-empty plain-text
/// line of `content`, cut to 150 characters.
pub fn derive_excerpt(content: &str, supplied: Option<&str>) -> String {
    if let Some(s) = supplied.map(str::trim).filter(|s| !s.is_empty()) {
        return s.to_string();
    }

    let plain = strip_markup(content);
    let first_line = plain
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|l| !l.is_empty());

    match first_line {
        Some(line) if line.chars().count() > EXCERPT_MAX_CHARS => {
            let cut: String = line.chars().take(EXCERPT_MAX_CHARS).collect();
            format!("{}...", cut.trim_end())
        }
        Some(line) => line,
        None => EXCERPT_PLACEHOLDER.to_string(),
    }
}

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "pre",
];

/// Rich-text editor HTML to plain text. Block-level tags end a line.
pub fn strip_markup(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut tag: Option<String> = None;

    for c in content.chars() {
        if let Some(name) = tag.as_mut() {
            if c == '>' {
                if is_block_tag(name) {
                    out.push('\n');
                }
                tag = None;
            } else {
                name.push(c);
            }
        } else if c == '<' {
            tag = Some(String::new());
        } else {
            out.push(c);
        }
    }

    decode_entities(&out)
}

fn is_block_tag(raw: &str) -> bool {
    let name = raw
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_examples() {
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  Rebranding   -- in 2024 "), "rebranding-in-2024");
        assert_eq!(generate_slug("Don't panic"), "dont-panic");
        assert_eq!(generate_slug("Café crème"), "caf-crme");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn slug_is_idempotent() {
        let titles = [
            "Hello, World!",
            "  leading and trailing  ",
            "multiple---hyphens and   spaces",
            "UPPER lower 123",
            "-dash-start-and-end-",
            "tabs\tand\nnewlines",
            "emoji 🚀 launch",
            "",
        ];
        for t in titles {
            let once = generate_slug(t);
            assert_eq!(generate_slug(&once), once, "title: {t:?}");
        }
    }

    #[test]
    fn unique_slug_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_slug("hello", &taken), "hello");
        taken.insert("hello".to_string());
        taken.insert("hello-2".to_string());
        assert_eq!(unique_slug("hello", &taken), "hello-3");
        assert_eq!(unique_slug("", &taken), "post");
    }

    #[test]
    fn read_time_rounds_up_with_one_minute_floor() {
        assert_eq!(read_time(""), "1 min read");
        assert_eq!(read_time(&"word ".repeat(200)), "1 min read");
        assert_eq!(read_time(&"word ".repeat(201)), "2 min read");
        assert_eq!(read_time("<p>five words in a paragraph</p>"), "1 min read");
    }

    #[test]
    fn read_time_is_monotone_in_word_count() {
        let minutes = |s: &str| -> usize {
            read_time(s)
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap()
        };

        let mut previous = 0;
        for words in (0..2000).step_by(37) {
            let content = "lorem ".repeat(words);
            let m = minutes(&content);
            assert!(m >= previous, "{words} words gave {m} < {previous}");
            previous = m;
        }
    }

    #[test]
    fn excerpt_uses_first_plain_text_line() {
        let html = "<h2></h2>\n<p>First <strong>real</strong>&nbsp;line.</p><p>Second.</p>";
        assert_eq!(derive_excerpt(html, None), "First real line.");
        assert_eq!(derive_excerpt(html, Some("  custom  ")), "custom");
        assert_eq!(derive_excerpt(html, Some("   ")), "First real line.");
    }

    #[test]
    fn long_excerpt_is_cut_and_empty_content_gets_placeholder() {
        let long = "a".repeat(400);
        let excerpt = derive_excerpt(&long, None);
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 3);
        assert!(excerpt.ends_with("..."));

        assert_eq!(derive_excerpt("", None), EXCERPT_PLACEHOLDER);
        assert_eq!(derive_excerpt("<p> </p><br/>", None), EXCERPT_PLACEHOLDER);
    }
}
