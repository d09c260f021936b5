use crate::{CandidateSource, Coordinates, SearchError, SearchFilters, SearchResults, dedupe_by_title};
use async_trait::async_trait;
use core_model::{Candidate, candidates_from_titles};

/// Fixed candidate list, ignoring location and filters.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<Candidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: dedupe_by_title(candidates),
        }
    }

    /// Build from bare titles; blank titles are dropped.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cleaned: Vec<String> = titles
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self::new(candidates_from_titles(cleaned))
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(
        &self,
        _coordinates: Coordinates,
        _filters: &SearchFilters,
    ) -> Result<SearchResults, SearchError> {
        Ok(SearchResults {
            text: String::new(),
            candidates: self.candidates.clone(),
        })
    }
}
