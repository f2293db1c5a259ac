//! Request and result types for the prospecting steps.

use serde::{Deserialize, Serialize};

use crate::session::SenderProfile;

/// Tokens that make a query look like a link to scrape.
const URL_MARKERS: &[&str] = &["http://", "https://", "www."];

const TLD_MARKERS: &[&str] = &[
    ".com", ".net", ".org", ".io", ".co", ".com.tr", ".tr", ".de", ".uk",
];

/// How the extraction prompt treats the user's query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// The query points at a page (directory, list, map) to scrape and complete.
    Url,
    /// The query describes a market; companies are generated for it.
    Keyword,
}

impl QueryKind {
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        if URL_MARKERS.iter().any(|m| query.contains(m)) {
            return QueryKind::Url;
        }
        let has_tld = query.split_whitespace().any(|token| {
            let token = token.trim_end_matches(|c: char| !c.is_alphanumeric());
            TLD_MARKERS
                .iter()
                .any(|tld| token.ends_with(tld) || token.contains(&format!("{}/", tld)))
        });
        if has_tld {
            QueryKind::Url
        } else {
            QueryKind::Keyword
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Url => "url",
            QueryKind::Keyword => "keyword",
        }
    }
}

/// Input to the extraction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Free-text market description or URL.
    pub query: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub location: String,
    pub limit: usize,
    /// Company names already known, newest first; the model is asked to skip them.
    #[serde(default)]
    pub exclude_names: Vec<String>,
}

impl ExtractionRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            sector: String::new(),
            location: String::new(),
            limit,
            exclude_names: Vec::new(),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_exclude_names(mut self, names: Vec<String>) -> Self {
        self.exclude_names = names;
        self
    }

    pub fn kind(&self) -> QueryKind {
        QueryKind::classify(&self.query)
    }

    /// Whether `name` matches an excluded name, ignoring case and padding.
    pub fn is_excluded(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.exclude_names
            .iter()
            .any(|excluded| excluded.trim().to_lowercase() == name)
    }
}

/// One company returned by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLead {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ExtractedLead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: None,
            location: None,
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }
}

/// Input to the enrichment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub location: String,
    pub profile: SenderProfile,
}
