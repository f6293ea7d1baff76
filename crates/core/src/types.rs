use serde::{Deserialize, Serialize};

/// `(url, depth)`, stored textually as `"url|depth"` within a per-domain
/// ordered list — spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self { url: url.into(), depth }
    }

    /// Serializes as `"url|depth"`.
    pub fn encode(&self) -> String {
        format!("{}|{}", self.url, self.depth)
    }

    /// Parses `"url|depth"`. Returns `None` on a malformed entry (no `|`, or
    /// a non-numeric depth) rather than panicking — frontier lists are
    /// populated from outside this process (manual injection, resume from a
    /// prior run) and must not be trusted blindly.
    pub fn decode(raw: &str) -> Option<Self> {
        let (url, depth_str) = raw.rsplit_once('|')?;
        let depth = depth_str.parse().ok()?;
        Some(Self { url: url.to_string(), depth })
    }
}

/// `domain:{domain}` hash fields, per spec.md §3/§6.
#[derive(Debug, Clone, Default)]
pub struct DomainMetadata {
    pub next_fetch_time: Option<i64>,
    pub robots_txt: Option<Vec<u8>>,
    pub robots_expires: Option<i64>,
    pub is_excluded: bool,
    pub is_seeded: bool,
}

/// `visited:{sha256(url)[:16]}` hash fields, per spec.md §3/§4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitedRecord {
    pub url: String,
    pub status_code: u16,
    pub fetched_at: i64,
    pub content_path: Option<String>,
    pub content_type: Option<String>,
}

/// The opaque record handed from a fetcher to the parse queue. Serialized
/// with `bincode` for the `fetch:queue` raw-bytes store flavor — see
/// SPEC_FULL.md §D.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJob {
    pub url: String,
    pub domain: String,
    pub depth: u32,
    pub html_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub crawled_timestamp: i64,
    pub status_code: u16,
}

impl ParseJob {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// One `(url, domain, id, depth)` tuple handed back by `get_next_url`. The
/// `id` field is always `-1` — retained only for ABI compatibility with an
/// earlier database-backed implementation (spec.md §9 open questions) and
/// must never be interpreted by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextUrl {
    pub url: String,
    pub domain: String,
    pub id: i64,
    pub depth: u32,
}
