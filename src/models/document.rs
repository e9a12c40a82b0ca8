//! Input records: parsed email documents and the information requests a
//! session analyzes them against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed email document awaiting analysis.
///
/// `id` is a stable identifier unique within a session. Ingestion supplies
/// it (message-id or equivalent); session creation rejects duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    #[serde(default)]
    pub cc_addresses: Vec<String>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// False when ingestion recovered only partial content.
    pub parsed_successfully: bool,
    #[serde(default)]
    pub parse_errors: Vec<String>,
}

impl Document {
    /// Render the document as the plain text block sent to the model.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("From: {}\n", self.from_address));
        out.push_str(&format!("To: {}\n", self.to_addresses.join(", ")));
        if !self.cc_addresses.is_empty() {
            out.push_str(&format!("Cc: {}\n", self.cc_addresses.join(", ")));
        }
        out.push_str(&format!("Date: {}\n", self.sent_at.to_rfc3339()));
        out.push_str(&format!("Subject: {}\n\n", self.subject));
        out.push_str(&self.body);
        out
    }
}

/// One information request from the underlying records request.
///
/// `index` is 1-based and contiguous within a session; analysis results
/// reference requests by this index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationRequest {
    pub index: usize,
    pub text: String,
}

impl InformationRequest {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}
