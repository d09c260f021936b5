//! Candidate supply: find nearby restaurants and hand them to the engines as
//! a title-unique candidate list.
//!
//! [`CandidateSource`] is the seam. [`GeminiSearch`] asks the generative
//! search API for Maps-grounded results; [`StaticSource`] serves a fixed list
//! (offline mode, tests). An empty result is a normal outcome, not an error.

use async_trait::async_trait;
use core_model::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

mod error;
mod gemini;
mod parse;
mod static_source;

pub use error::SearchError;
pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiSearch, GeminiSettings};
pub use parse::{DEFAULT_DISTANCE, DEFAULT_SNIPPET, parse_response};
pub use static_source::StaticSource;

pub const MIN_RADIUS_METERS: u32 = 100;
pub const MAX_RADIUS_METERS: u32 = 3000;
pub const RADIUS_STEP_METERS: u32 = 100;
pub const DEFAULT_RADIUS_METERS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Cheap,
    #[default]
    Moderate,
    Expensive,
}

impl Budget {
    /// Human label, also used verbatim in the search prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Budget::Cheap => "Cheap Eats",
            Budget::Moderate => "Moderate",
            Budget::Expensive => "Fancy Treat",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Budget::Cheap => "cheap",
            Budget::Moderate => "moderate",
            Budget::Expensive => "expensive",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Budget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cheap" | "cheap eats" => Ok(Budget::Cheap),
            "moderate" => Ok(Budget::Moderate),
            "expensive" | "fancy" | "fancy treat" => Ok(Budget::Expensive),
            other => Err(format!(
                "unknown budget '{other}' (expected cheap, moderate or expensive)"
            )),
        }
    }
}

/// Clamp a walking radius into the supported range, snapped to 100 m steps.
pub fn clamp_radius(meters: u32) -> u32 {
    let clamped = meters.clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS);
    let snapped = (clamped + RADIUS_STEP_METERS / 2) / RADIUS_STEP_METERS * RADIUS_STEP_METERS;
    snapped.clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFilters {
    pub radius_meters: u32,
    pub budget: Budget,
}

impl SearchFilters {
    pub fn new(radius_meters: u32, budget: Budget) -> Self {
        Self {
            radius_meters: clamp_radius(radius_meters),
            budget,
        }
    }
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS_METERS, Budget::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Free-text answer from the search backend, if any.
    pub text: String,
    pub candidates: Vec<Candidate>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// Keep the first candidate for each title, preserving order.
pub fn dedupe_by_title(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.title.clone()))
        .collect()
}

/// Supplier of candidates for a selection.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Source identifier for logging.
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        coordinates: Coordinates,
        filters: &SearchFilters,
    ) -> Result<SearchResults, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::candidates_from_titles;

    #[test]
    fn radius_is_clamped_and_snapped() {
        assert_eq!(clamp_radius(0), 100);
        assert_eq!(clamp_radius(149), 100);
        assert_eq!(clamp_radius(150), 200);
        assert_eq!(clamp_radius(520), 500);
        assert_eq!(clamp_radius(2990), 3000);
        assert_eq!(clamp_radius(50_000), 3000);
        assert_eq!(SearchFilters::new(777, Budget::Cheap).radius_meters, 800);
    }

    #[test]
    fn budget_labels_and_parsing() {
        assert_eq!(Budget::Cheap.label(), "Cheap Eats");
        assert_eq!(Budget::Moderate.label(), "Moderate");
        assert_eq!(Budget::Expensive.label(), "Fancy Treat");
        assert_eq!("FANCY treat".parse::<Budget>(), Ok(Budget::Expensive));
        assert_eq!("cheap".parse::<Budget>(), Ok(Budget::Cheap));
        assert!("free".parse::<Budget>().is_err());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut list = candidates_from_titles(["A", "B"]);
        list.push(Candidate::new("A").with_uri("second"));
        let out = dedupe_by_title(list);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].uri, None);
    }
}
