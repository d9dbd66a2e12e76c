use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of a fact check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Rating {
    Reliable,
    Unreliable,
    Misleading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VerdictStatus {
    Pending,
    Reliable,
    Unreliable,
    Misleading,
}

impl VerdictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Pending => "Pending",
            VerdictStatus::Reliable => "Reliable",
            VerdictStatus::Unreliable => "Unreliable",
            VerdictStatus::Misleading => "Misleading",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(VerdictStatus::Pending),
            "Reliable" => Some(VerdictStatus::Reliable),
            "Unreliable" => Some(VerdictStatus::Unreliable),
            "Misleading" => Some(VerdictStatus::Misleading),
            _ => None,
        }
    }

    /// `None` for `Pending`, which carries no information.
    pub fn rating(self) -> Option<Rating> {
        match self {
            VerdictStatus::Pending => None,
            VerdictStatus::Reliable => Some(Rating::Reliable),
            VerdictStatus::Unreliable => Some(Rating::Unreliable),
            VerdictStatus::Misleading => Some(Rating::Misleading),
        }
    }
}

impl From<Rating> for VerdictStatus {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Reliable => VerdictStatus::Reliable,
            Rating::Unreliable => VerdictStatus::Unreliable,
            Rating::Misleading => VerdictStatus::Misleading,
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", VerdictStatus::from(*self))
    }
}

/// A corroborating report returned alongside a `Reliable` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub title: String,
    pub url: String,
    pub source: String, // outlet label, e.g. "Reuters"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub rating: Rating,
    pub explanation: String,
    pub reports: Vec<Report>,
}

impl Assessment {
    /// Reports are only kept for `Reliable` ratings.
    pub fn new(rating: Rating, explanation: impl Into<String>, reports: Vec<Report>) -> Self {
        let reports = if rating == Rating::Reliable {
            reports
        } else {
            Vec::new()
        };
        Self {
            rating,
            explanation: explanation.into(),
            reports,
        }
    }

    /// A resolved verdict must carry a non-empty explanation.
    pub fn validate(&self) -> Result<(), String> {
        if self.explanation.trim().is_empty() {
            return Err(format!("{} verdict requires an explanation", self.rating));
        }
        Ok(())
    }
}

/// Fact-check state embedded in an article.
///
/// On the wire this is the flat `{status, explanation, reports}` object; a
/// resolved verdict without an explanation is rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "VerdictRecord", into = "VerdictRecord")]
pub enum Verdict {
    #[default]
    Pending,
    Resolved(Assessment),
}

impl Verdict {
    pub fn status(&self) -> VerdictStatus {
        match self {
            Verdict::Pending => VerdictStatus::Pending,
            Verdict::Resolved(assessment) => assessment.rating.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Verdict::Resolved(_))
    }

    pub fn explanation(&self) -> &str {
        match self {
            Verdict::Pending => "",
            Verdict::Resolved(assessment) => &assessment.explanation,
        }
    }

    pub fn reports(&self) -> &[Report] {
        match self {
            Verdict::Pending => &[],
            Verdict::Resolved(assessment) => &assessment.reports,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VerdictRecord {
    pub status: VerdictStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<Report>,
}

impl From<Verdict> for VerdictRecord {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pending => VerdictRecord {
                status: VerdictStatus::Pending,
                explanation: String::new(),
                reports: Vec::new(),
            },
            Verdict::Resolved(assessment) => VerdictRecord {
                status: assessment.rating.into(),
                explanation: assessment.explanation,
                reports: assessment.reports,
            },
        }
    }
}

impl TryFrom<VerdictRecord> for Verdict {
    type Error = String;

    fn try_from(record: VerdictRecord) -> Result<Self, Self::Error> {
        let Some(rating) = record.status.rating() else {
            return Ok(Verdict::Pending);
        };
        let assessment = Assessment::new(rating, record.explanation, record.reports);
        assessment.validate()?;
        Ok(Verdict::Resolved(assessment))
    }
}

impl JsonSchema for Verdict {
    fn schema_name() -> String {
        "Verdict".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        VerdictRecord::json_schema(generator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub author: String,     // identity of the publishing user
    pub created_at: String, // RFC 3339, UTC
    #[serde(default)]
    pub verdict: Verdict,
}

/// Publish payload for a local article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewArticle {
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SourceType {
    Local,
    External,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Local => "Local",
            SourceType::External => "External",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Local" => Some(SourceType::Local),
            "External" => Some(SourceType::External),
            _ => None,
        }
    }
}

/// Reputation ledger entry for a local publisher or an external outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub reliable_count: u64,
    pub unreliable_count: u64,
    pub misleading_count: u64,
    pub reliability_score: u8,
    pub created_at: String,
}

impl Source {
    pub fn total(&self) -> u64 {
        self.reliable_count + self.unreliable_count + self.misleading_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceName {
    pub name: String,
}

/// One entry of the third-party listing upstream, before unification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<SourceName>,
}

/// Unified listing entry, local or external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub is_local: bool,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub source: SourceName,
    pub published_at: Option<String>,
    pub verdict: Verdict,
}
