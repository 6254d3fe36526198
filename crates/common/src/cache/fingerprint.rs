//! Canonical request keys
//!
//! A fingerprint is `"<METHOD> <path>?<query>"` where the query is rebuilt
//! from a sorted map. Parameters passed separately and parameters embedded in
//! the path are merged, so `("/tasks?b=2", [("a", "1")])` and
//! `("/tasks", [("b", "2"), ("a", "1")])` produce the same key. Values of a
//! repeated key keep their original order.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// Cache key identifying a request by method, path and normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from its parts.
    pub fn new<I, K, V>(method: &str, path: &str, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (path, embedded) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(embedded) = embedded {
            for (k, v) in form_urlencoded::parse(embedded.as_bytes()) {
                params.entry(k.into_owned()).or_default().push(v.into_owned());
            }
        }
        for (k, v) in query {
            params.entry(k.as_ref().to_string()).or_default().push(v.as_ref().to_string());
        }

        let mut key = format!("{} {}", method.trim().to_ascii_uppercase(), normalize_path(path));
        if !params.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (k, values) in &params {
                for v in values {
                    serializer.append_pair(k, v);
                }
            }
            key.push('?');
            key.push_str(&serializer.finish());
        }

        Self(key)
    }

    /// Fingerprint of a request without query parameters
    pub fn of(method: &str, path: &str) -> Self {
        Self::new(method, path, std::iter::empty::<(&str, &str)>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
