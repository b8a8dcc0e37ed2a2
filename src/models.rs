use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level JSONL message (tagged enum via `type` field)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SessionMessage {
    #[serde(rename = "user")]
    User(MessageEnvelope),
    #[serde(rename = "assistant")]
    Assistant(MessageEnvelope),
    #[serde(rename = "summary")]
    Summary(SummaryEnvelope),
    #[serde(rename = "system")]
    System(SystemEnvelope),
    #[serde(rename = "file-history-snapshot")]
    FileHistorySnapshot(serde_json::Value),
    #[serde(rename = "progress")]
    Progress(serde_json::Value),
    #[serde(rename = "queue-operation")]
    QueueOperation(serde_json::Value),
}

impl SessionMessage {
    /// Types counted toward `message_count` per spec §3/§4.2: user, assistant, summary.
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            SessionMessage::User(_) | SessionMessage::Assistant(_) | SessionMessage::Summary(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Message envelope (shared between user + assistant)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageEnvelope {
    pub uuid: String,
    #[serde(rename = "parentUuid")]
    pub parent_uuid: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: String,
    pub cwd: Option<String>,
    #[serde(rename = "gitBranch")]
    pub git_branch: Option<String>,
    pub slug: Option<String>,
    pub message: MessageContent,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageContent {
    pub role: String,
    pub model: Option<String>,
    pub content: ContentValue,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(rename = "cost_usd", default)]
    pub cost_usd: Option<f64>,
}

/// Content can be either a plain string (user text) or an array of content blocks.
/// See DESIGN NOTES §9 "Dynamic dispatch on message content".
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[allow(dead_code)]
        tool_use_id: String,
        #[allow(dead_code)]
        content: serde_json::Value,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[allow(dead_code)]
        thinking: String,
    },
    /// Anything else (`image`, `redacted_thinking`, `web_search_tool_result`, ...)
    /// is ignored rather than failing the whole message (spec §4.2, §9 `Block::Other`).
    #[serde(other)]
    Other,
}

// ---------------------------------------------------------------------------
// System envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct SystemEnvelope {
    pub uuid: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: String,
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Summary envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct SummaryEnvelope {
    pub summary: String,
    #[serde(rename = "leafUuid")]
    pub leaf_uuid: Option<String>,
}
