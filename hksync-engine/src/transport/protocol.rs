//! Upload-service wire protocol: endpoint paths and 400-body parsing.

use serde::Deserialize;

/// Header carrying the bearer credential.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Path for POST/DELETE of one data set's records.
pub fn data_set_path(upload_id: &str) -> String {
    format!("/v1/data_sets/{upload_id}/data")
}

/// One entry of a 400 response's `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct RejectionEntry {
    #[serde(default)]
    pub source: Option<RejectionSource>,
}

/// `source.pointer` names a rejected record as `/<index>` into the POSTed
/// body array.
#[derive(Debug, Clone, Deserialize)]
pub struct RejectionSource {
    #[serde(default)]
    pub pointer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<RejectionEntry>,
}

/// Record indices named by a 400 body, sorted and deduplicated. Empty when
/// the body is unparseable or carries no per-record pointers.
///
/// A pointer may descend past the index (`/3/time`); only the leading
/// integer matters.
pub fn parse_rejected_indices(body: &str) -> Vec<usize> {
    let parsed: ErrorBody = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return Vec::new(),
    };
    let mut indices: Vec<usize> = parsed
        .errors
        .iter()
        .filter_map(|entry| entry.source.as_ref())
        .filter_map(|source| source.pointer.as_deref())
        .filter_map(|pointer| pointer.strip_prefix('/'))
        .filter_map(|raw| {
            let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<usize>().ok()
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
