//! Query-string parameter shapes for the HTTP boundary, grounded on the
//! teacher's `server/params.rs`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    pub project: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_matches_per_session")]
    pub matches_per_session: u32,
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub working_directory: String,
}

fn default_limit() -> u32 {
    20
}

fn default_matches_per_session() -> u32 {
    3
}
