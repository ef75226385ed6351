use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Wire name used in provider payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Label used when formatting turns for the summarizer.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Therapist",
        }
    }
}

/// One stored turn in a user's conversation history.
///
/// Ids are per-user sequential integer strings assigned by the store's
/// counter transaction. Messages are never mutated; the history rotator
/// deletes them in batches when it trims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A condensed block of older conversation. FIFO-ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Priority of a stored fact, normalized to exactly four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Mid,
    Low,
}

impl Priority {
    /// Case-insensitive parse with the known synonym table applied
    /// ("medium" is what the model usually says instead of "Mid").
    pub fn parse(raw: &str) -> Option<Priority> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "mid" | "medium" => Some(Priority::Mid),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Mid => "Mid",
            Priority::Low => "Low",
        }
    }
}

/// A structured, atomic piece of information extracted about a user.
///
/// `timestamp` means "last meaningfully updated", not creation time:
/// merges keep the heir's original timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub category: String,
    pub content: String,
    pub priority: Priority,
    pub hot: f64,
    pub timestamp: DateTime<Utc>,
}

/// A validated fact ready to be persisted. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFact {
    pub category: String,
    pub content: String,
    pub priority: Priority,
    pub hot: f64,
    pub timestamp: DateTime<Utc>,
}

/// Raw fact payload as emitted by the analysis model, before validation.
///
/// The model sometimes hallucinates a `description` field instead of
/// `content`, so both are accepted and folded together in
/// [`FactDraft::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactDraft {
    pub category: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: String,
}

impl FactDraft {
    /// Apply boundary validation: normalize the priority, fold the legacy
    /// alias into `content`, and reject drafts that end up empty.
    pub fn validate(self) -> Result<NewFact, ValidationError> {
        let priority = Priority::parse(&self.priority)
            .ok_or_else(|| ValidationError::UnknownPriority(self.priority.clone()))?;

        let content = self
            .content
            .or(self.description)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ValidationError::EmptyContent)?;

        Ok(NewFact {
            category: self.category,
            content,
            priority,
            hot: 1.0,
            timestamp: Utc::now(),
        })
    }
}

/// Why a fact draft was rejected at the store boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown priority: {0:?}")]
    UnknownPriority(String),
    #[error("fact has no content (neither 'content' nor 'description' set)")]
    EmptyContent,
}

/// One merge instruction from the analysis model: 2-3 fact ids plus the
/// combined replacement content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorganisationAction {
    #[serde(default = "default_action")]
    pub action: String,
    pub ids: Vec<i64>,
    pub final_content: String,
    #[serde(default)]
    pub reason: String,
}

fn default_action() -> String {
    "merge".into()
}

/// Structured output of the companion analysis call: a context summary for
/// the main model, the fact ids it drew on, freshly extracted facts, and
/// an optional reorganisation (merge) plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextAnalysis {
    pub summary: String,
    #[serde(default)]
    pub references: Vec<i64>,
    #[serde(default)]
    pub factology: Option<Vec<FactDraft>>,
    #[serde(default)]
    pub reorganisation: Option<Vec<ReorganisationAction>>,
}
