//! Reference metadata, local references and external candidates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Bibliographic metadata for one referenced work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    /// Work title
    #[serde(default)]
    pub title: String,

    /// Author names in citation order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Publication year
    #[serde(default)]
    pub year: Option<i32>,

    /// Journal or conference name
    #[serde(default)]
    pub venue: Option<String>,

    /// Abstract text (used for relevance judgement only)
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    /// Digital Object Identifier
    #[serde(default)]
    pub doi: Option<String>,

    /// Landing page URL
    #[serde(default)]
    pub url: Option<String>,
}

impl ReferenceMetadata {
    /// Create metadata with a title and authors.
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            title: title.into(),
            authors,
            ..Default::default()
        }
    }

    /// Set the year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the venue.
    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    /// Set the abstract.
    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// Set the DOI.
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    /// Set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Author list formatted for IEEE: up to three cleaned names, then "et al.".
    pub fn author_line(&self) -> String {
        let authors: Vec<String> = self
            .authors
            .iter()
            .map(|a| clean_author_name(a))
            .filter(|a| !a.is_empty())
            .collect();

        if authors.is_empty() {
            return "Unknown".to_string();
        }

        let mut line = authors.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if authors.len() > 3 {
            line.push_str(" et al.");
        }
        line
    }

    /// Format as an IEEE reference entry with the given number.
    pub fn to_ieee(&self, number: u32) -> String {
        let title = if self.title.trim().is_empty() {
            "Untitled"
        } else {
            self.title.trim()
        };

        let mut entry = format!("[{}] {}, \"{},\"", number, self.author_line(), title);
        if let Some(venue) = self.venue.as_deref().filter(|v| !v.trim().is_empty()) {
            entry.push(' ');
            entry.push_str(venue.trim());
            entry.push(',');
        }
        match self.year {
            Some(year) => entry.push_str(&format!(" {}.", year)),
            None => entry.push_str(" n.d."),
        }
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.trim().is_empty()) {
            entry.push_str(&format!(" doi: {}.", doi.trim()));
        } else if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            entry.push_str(&format!(" [Online]. Available: {}", url.trim()));
        }
        entry
    }

    /// Abstract truncated to `max_chars` characters, with an ellipsis when cut.
    pub fn abstract_snippet(&self, max_chars: usize) -> String {
        let text = self.abstract_text.trim();
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

fn author_noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:senior\s+|life\s+|student\s+)*member\s*,?\s*ieee|ieee\s+(?:senior\s+)?(?:member|fellow)|fellow\s*,?\s*ieee|life\s+(?:senior\s+)?member|student\s+member)\b",
        )
        .unwrap()
    })
}

/// Remove affiliation noise such as "Member, IEEE" from an author name.
fn clean_author_name(name: &str) -> String {
    let cleaned = author_noise_regex().replace_all(name, "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.replace(" ,", ",").replace(",,", ",");
    cleaned.trim_matches(|c: char| c == ',' || c.is_whitespace()).to_string()
}

/// Coarse content type of a reference, used to match it to sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Methods, algorithms, architectures
    Method,
    /// Benchmarks, datasets, evaluations
    Result,
    /// Surveys, reviews, prior work
    Background,
    /// Anything else
    #[default]
    Other,
}

impl ReferenceType {
    /// All tags in catalog order.
    pub const ALL: [ReferenceType; 4] = [
        ReferenceType::Method,
        ReferenceType::Result,
        ReferenceType::Background,
        ReferenceType::Other,
    ];

    /// Derive a tag from title and abstract keywords.
    pub fn classify(metadata: &ReferenceMetadata) -> Self {
        let text = format!("{} {}", metadata.title, metadata.abstract_text).to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has_any(&["method", "approach", "algorithm", "architecture", "framework"]) {
            ReferenceType::Method
        } else if has_any(&["benchmark", "dataset", "evaluation", "performance", "result"]) {
            ReferenceType::Result
        } else if has_any(&["survey", "review", "overview", "comprehensive"]) {
            ReferenceType::Background
        } else {
            ReferenceType::Other
        }
    }

    /// Upper-case label used in the candidate catalog.
    pub fn label(self) -> &'static str {
        match self {
            ReferenceType::Method => "METHOD",
            ReferenceType::Result => "RESULT",
            ReferenceType::Background => "BACKGROUND",
            ReferenceType::Other => "OTHER",
        }
    }
}

/// A reference from the local corpus, keyed by its original in-text number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalReference {
    /// Original in-text number
    pub number: u32,

    /// Reference metadata
    #[serde(flatten)]
    pub metadata: ReferenceMetadata,
}

/// Read-only map of local references by original number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalReferences(BTreeMap<u32, ReferenceMetadata>);

impl LocalReferences {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert metadata for a number.
    pub fn insert(&mut self, number: u32, metadata: ReferenceMetadata) {
        self.0.insert(number, metadata);
    }

    /// Look up metadata by original number.
    pub fn get(&self, number: u32) -> Option<&ReferenceMetadata> {
        self.0.get(&number)
    }

    /// Check whether a number is backed by a local reference.
    pub fn contains(&self, number: u32) -> bool {
        self.0.contains_key(&number)
    }

    /// All local numbers in ascending order.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    /// Number of local references.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no local references.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<LocalReference> for LocalReferences {
    fn from_iter<I: IntoIterator<Item = LocalReference>>(iter: I) -> Self {
        Self(iter.into_iter().map(|r| (r.number, r.metadata)).collect())
    }
}

impl FromIterator<(u32, ReferenceMetadata)> for LocalReferences {
    fn from_iter<I: IntoIterator<Item = (u32, ReferenceMetadata)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_selected() -> bool {
    true
}

/// An externally discovered reference eligible for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCandidate {
    /// Temporary in-text number used until renumbering
    pub placeholder: u32,

    /// Reference metadata
    pub metadata: ReferenceMetadata,

    /// Only selected candidates are eligible
    #[serde(default = "default_selected")]
    pub selected: bool,

    /// Coarse content type
    #[serde(default, rename = "type")]
    pub type_tag: ReferenceType,

    /// Upstream relevance score in 0.0..=1.0
    #[serde(default)]
    pub relevance: f32,
}

impl ExternalCandidate {
    /// Create a selected candidate.
    pub fn new(placeholder: u32, metadata: ReferenceMetadata, type_tag: ReferenceType) -> Self {
        Self {
            placeholder,
            metadata,
            selected: true,
            type_tag,
            relevance: 0.0,
        }
    }

    /// Create a selected candidate whose type is derived from its metadata.
    pub fn classified(placeholder: u32, metadata: ReferenceMetadata) -> Self {
        let type_tag = ReferenceType::classify(&metadata);
        Self::new(placeholder, metadata, type_tag)
    }

    /// Set the relevance score.
    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = relevance.clamp(0.0, 1.0);
        self
    }

    /// Set the selected flag.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// Where a citation number came from before renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Local corpus numbering
    Local,
    /// External candidate placeholder
    External,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::External => write!(f, "external"),
        }
    }
}

/// One entry of the final reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceListEntry {
    /// Final citation number
    pub number: u32,

    /// Reference metadata
    pub metadata: ReferenceMetadata,
}

impl ReferenceListEntry {
    /// Format as an IEEE reference line.
    pub fn to_ieee(&self) -> String {
        self.metadata.to_ieee(self.number)
    }
}
