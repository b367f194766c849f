//! Data ranks: named quality tiers a backend can serve for one source.

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

/// Rank id meaning "use the best rank the source has".
pub const BEST_AVAILABLE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    pub id: u32,
    pub name: String,
    /// Higher is better
    pub rank: i32,
    pub user_default: bool,
}

impl Rank {
    /// Parse one `rid:name:rank:default` line as returned by the `ranks` action.
    pub fn parse(line: &str) -> PlotResult<Self> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() != 4 {
            return Err(PlotError::UnexpectedResponse(format!("bad rank line: {}", line)));
        }
        let bad = || PlotError::UnexpectedResponse(format!("bad rank line: {}", line));
        Ok(Self {
            id: parts[0].parse().map_err(|_| bad())?,
            name: parts[1].to_string(),
            rank: parts[2].parse().map_err(|_| bad())?,
            user_default: matches!(parts[3], "1" | "t" | "true"),
        })
    }

    pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> PlotResult<Vec<Self>> {
        lines
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| !l.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolve a requested rank id against the set a source offers.
///
/// Id 0 picks the highest-weighted rank, preferring the lower id on ties.
/// Any other id must be present in `available`.
pub fn resolve_rank(requested: u32, available: &[Rank]) -> PlotResult<Rank> {
    if requested == BEST_AVAILABLE {
        return available
            .iter()
            .max_by(|a, b| a.rank.cmp(&b.rank).then(b.id.cmp(&a.id)))
            .cloned()
            .ok_or(PlotError::UnknownRank(requested));
    }
    available
        .iter()
        .find(|r| r.id == requested)
        .cloned()
        .ok_or(PlotError::UnknownRank(requested))
}
