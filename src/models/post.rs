use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a post: the trailing segment of its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PostId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Route segments a request was made for, e.g. `2024/hello-world`.
///
/// Empty segments are discarded, so `/a//b/` and `a/b` resolve to the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPath {
    segments: Vec<String>,
}

impl PostPath {
    /// Returns `None` when the path has no usable segment.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn post_id(&self) -> PostId {
        // parse() guarantees at least one segment
        PostId::new(self.segments[self.segments.len() - 1].clone())
    }

    /// Path as the analytics upstream records it: leading and trailing slash.
    pub fn analytics_path(&self) -> String {
        let mut path = String::from("/");
        for segment in &self.segments {
            path.push_str(segment);
            path.push('/');
        }
        path
    }
}
