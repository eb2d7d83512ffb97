//! Round-robin merge and first-seen deduplication of provider hits.
//!
//! Provider lists are interleaved rather than concatenated: the first hit
//! of every provider comes before the second hit of any provider, so no
//! single provider dominates the head of the candidate list. The first
//! occurrence of a normalised URL wins and keeps its provider's title.

use std::collections::HashSet;

use crate::types::{CandidateUrl, ProviderHit, SearchProvider};

use super::url_normalize::normalize_url;

/// Result of merging provider hit lists.
#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    /// Deduplicated candidates in merge order, at most `max_urls` long.
    pub candidates: Vec<CandidateUrl>,
    /// Hits dropped because their URL was not a fetchable http(s) URL.
    pub rejected: usize,
    /// Hits dropped because an earlier hit had the same normalised URL.
    pub duplicates: usize,
}

/// Interleave `lists` round-robin in the given (priority) order,
/// deduplicate by normalised URL, and keep at most `max_urls` candidates.
///
/// The output is deterministic for a given input regardless of which
/// provider answered first.
pub fn merge_round_robin(
    lists: &[(SearchProvider, Vec<ProviderHit>)],
    max_urls: usize,
) -> MergeOutput {
    let mut output = MergeOutput::default();
    let mut seen: HashSet<String> = HashSet::new();
    let longest = lists.iter().map(|(_, hits)| hits.len()).max().unwrap_or(0);

    'rounds: for position in 0..longest {
        for (provider, hits) in lists {
            if output.candidates.len() >= max_urls {
                break 'rounds;
            }
            let Some(hit) = hits.get(position) else {
                continue;
            };
            let Some(url) = normalize_url(&hit.url) else {
                tracing::debug!(provider = %provider, url = %hit.url, "skipping unfetchable URL");
                output.rejected += 1;
                continue;
            };
            if !seen.insert(url.clone()) {
                output.duplicates += 1;
                continue;
            }
            output.candidates.push(CandidateUrl {
                url,
                provider_title: hit.title.clone(),
                source_provider: *provider,
            });
        }
    }

    output
}
