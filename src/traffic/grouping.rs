//! Endpoint grouping, filtering and summary statistics

use super::*;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

static UUID_SEGMENT: OnceLock<Regex> = OnceLock::new();

pub(crate) fn uuid_segment() -> &'static Regex {
    UUID_SEGMENT.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("invalid uuid segment regex")
    })
}

/// Minimum length for an opaque alphanumeric segment to count as an id.
const OPAQUE_ID_MIN_LEN: usize = 16;

/// Kind of dynamic path segment recognised during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Literal,
    Numeric,
    Uuid,
    OpaqueId,
}

impl SegmentKind {
    pub fn of(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            SegmentKind::Numeric
        } else if uuid_segment().is_match(segment) {
            SegmentKind::Uuid
        } else if segment.len() >= OPAQUE_ID_MIN_LEN
            && segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            && segment.bytes().any(|b| b.is_ascii_digit())
        {
            SegmentKind::OpaqueId
        } else {
            SegmentKind::Literal
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, SegmentKind::Literal)
    }

    /// Placeholder used in normalized paths and path templates.
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            SegmentKind::Numeric | SegmentKind::OpaqueId => Some("{id}"),
            SegmentKind::Uuid => Some("{uuid}"),
            SegmentKind::Literal => None,
        }
    }
}

pub(crate) fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Collection-noun heuristic: a trailing `s` that is not `ss`.
///
/// Known to misgroup irregular plurals ("people") and words that merely end
/// in `s` ("status", "news").
fn looks_like_collection(segment: &str) -> bool {
    segment.chars().count() > 2
        && segment.ends_with('s')
        && !segment.ends_with("ss")
        && segment.chars().all(|c| c.is_alphabetic() || c == '-' || c == '_')
}

/// Normalize a request path into its endpoint base path.
///
/// Numeric and opaque id segments become `{id}`, canonical UUIDs become
/// `{uuid}`, and a trailing collection segment gets `/{id}` appended so that
/// `/users` and `/users/42` land in the same group. Pure and idempotent.
pub fn normalize_base_path(path: &str) -> String {
    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match SegmentKind::of(s).placeholder() {
            Some(placeholder) => placeholder.to_string(),
            None => s.to_string(),
        })
        .collect();

    if let Some(last) = segments.last() {
        if !is_placeholder(last) && looks_like_collection(last) {
            segments.push("{id}".to_string());
        }
    }

    format!("/{}", segments.join("/"))
}

/// Interactions bucketed by domain and normalized base path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointGroup {
    pub domain: String,
    pub base_path: String,
    pub interactions: Vec<ApiInteraction>,
    pub methods: BTreeSet<String>,
    pub content_types: BTreeSet<String>,
}

impl EndpointGroup {
    fn new(domain: &str, base_path: String) -> Self {
        Self {
            domain: domain.to_string(),
            base_path,
            interactions: Vec::new(),
            methods: BTreeSet::new(),
            content_types: BTreeSet::new(),
        }
    }

    /// Group key in `domain/base_path` form
    pub fn key(&self) -> String {
        format!("{}{}", self.domain, self.base_path)
    }
}

/// Bucket interactions by `(domain, normalized base path)`.
///
/// Groups come back sorted by key and interactions inside a group sorted by
/// `(timestamp, id)`, so the result does not depend on input order.
pub fn group_by_endpoint(interactions: &[ApiInteraction]) -> Vec<EndpointGroup> {
    let mut groups: BTreeMap<(String, String), EndpointGroup> = BTreeMap::new();

    for interaction in interactions {
        let base_path = normalize_base_path(&interaction.request.path);
        let domain = interaction.request.domain.clone();
        let group = groups
            .entry((domain.clone(), base_path.clone()))
            .or_insert_with(|| EndpointGroup::new(&domain, base_path));
        group.methods.insert(interaction.request.method.clone());
        for ct in interaction
            .request
            .content_type
            .iter()
            .chain(interaction.response.content_type.iter())
        {
            group.content_types.insert(ct.clone());
        }
        group.interactions.push(interaction.clone());
    }

    groups
        .into_values()
        .map(|mut group| {
            group.interactions.sort_by(|a, b| {
                a.request
                    .timestamp
                    .cmp(&b.request.timestamp)
                    .then_with(|| a.id.cmp(&b.id))
            });
            group
        })
        .collect()
}

/// Filter criteria; dimensions are ANDed, values within a dimension ORed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub domains: Option<Vec<String>>,
    pub methods: Option<Vec<String>>,
    pub status_codes: Option<Vec<u16>>,
    pub content_types: Option<Vec<String>>,
}

impl FilterCriteria {
    pub fn matches(&self, interaction: &ApiInteraction) -> bool {
        let domain_ok = self.domains.as_ref().map_or(true, |domains| {
            domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&interaction.request.domain))
        });
        let method_ok = self.methods.as_ref().map_or(true, |methods| {
            methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&interaction.request.method))
        });
        let status_ok = self
            .status_codes
            .as_ref()
            .map_or(true, |codes| codes.contains(&interaction.response.status));
        let content_ok = self.content_types.as_ref().map_or(true, |types| {
            let actual = interaction
                .response
                .content_type
                .as_deref()
                .unwrap_or("")
                .to_ascii_lowercase();
            types.iter().any(|t| actual.contains(&t.to_ascii_lowercase()))
        });
        domain_ok && method_ok && status_ok && content_ok
    }
}

pub fn filter(interactions: &[ApiInteraction], criteria: &FilterCriteria) -> Vec<ApiInteraction> {
    interactions
        .iter()
        .filter(|i| criteria.matches(i))
        .cloned()
        .collect()
}

/// Aggregate statistics over a set of interactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSummary {
    pub total_interactions: usize,
    pub unique_domains: usize,
    pub unique_endpoints: usize,
    pub methods: BTreeMap<String, usize>,
    pub status_codes: BTreeMap<u16, usize>,
    pub content_types: BTreeMap<String, usize>,
    pub avg_duration_ms: f64,
    pub total_bytes: u64,
}

pub fn summary_stats(interactions: &[ApiInteraction]) -> TrafficSummary {
    let mut summary = TrafficSummary {
        total_interactions: interactions.len(),
        ..Default::default()
    };
    let mut domains = BTreeSet::new();
    let mut endpoints = BTreeSet::new();
    let mut total_duration = 0.0;

    for i in interactions {
        domains.insert(i.request.domain.as_str());
        endpoints.insert((i.request.domain.as_str(), normalize_base_path(&i.request.path)));
        *summary.methods.entry(i.request.method.clone()).or_insert(0) += 1;
        *summary.status_codes.entry(i.response.status).or_insert(0) += 1;
        if let Some(ct) = &i.response.content_type {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            *summary.content_types.entry(essence).or_insert(0) += 1;
        }
        total_duration += i.duration_ms;
        summary.total_bytes += i.response.size;
    }

    summary.unique_domains = domains.len();
    summary.unique_endpoints = endpoints.len();
    if !interactions.is_empty() {
        summary.avg_duration_ms = total_duration / interactions.len() as f64;
    }
    summary
}
