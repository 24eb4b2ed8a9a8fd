// Set-Cookie rendering and Cookie header parsing.

use std::time::Duration;

use absterco_core::{AppError, AppResult};
use http::header::COOKIE;
use http::{HeaderMap, HeaderValue};

use crate::options::{CookieOptions, SameSite};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    /// `None` renders a browser-session cookie
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: &CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            http_only: true,
            secure: options.secure,
            same_site: options.same_site,
            path: options.path.clone(),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Expired cookie that makes the browser drop `name`.
    pub fn clear(name: impl Into<String>, options: &CookieOptions) -> Self {
        Self::new(name, "", options).with_max_age(Duration::ZERO)
    }

    pub fn is_clear(&self) -> bool {
        self.value.is_empty() && self.max_age == Some(Duration::ZERO)
    }

    pub fn to_header_string(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str("; SameSite=");
        out.push_str(self.same_site.as_str());
        out
    }

    pub fn to_header_value(&self) -> AppResult<HeaderValue> {
        HeaderValue::from_str(&self.to_header_string()).map_err(|e| {
            AppError::general(format!("Cookie '{}' is not a valid header value", self.name))
                .with_source(e.into())
                .into_anyhow()
        })
    }
}

/// Value of cookie `name` in a raw `Cookie` header.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}

/// Value of cookie `name` across every `Cookie` header of a request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| parse_cookie(h, name))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_attributes() {
        let options = CookieOptions::default();
        let cookie = SessionCookie::new("__session", "abc", &options).with_max_age(Duration::from_secs(60));
        assert_eq!(
            cookie.to_header_string(),
            "__session=abc; Path=/; Max-Age=60; HttpOnly; Secure; SameSite=Lax"
        );

        let cleared = SessionCookie::clear("__session", &options);
        assert!(cleared.is_clear());
        assert!(cleared.to_header_string().starts_with("__session=; Path=/; Max-Age=0"));
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; __session=tok"));
        headers.append(COOKIE, HeaderValue::from_static("absterco_bypass=1"));

        assert_eq!(read_cookie(&headers, "__session").as_deref(), Some("tok"));
        assert_eq!(read_cookie(&headers, "absterco_bypass").as_deref(), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
        assert_eq!(parse_cookie("a=1;b=2", "b"), Some("2"));
    }
}
