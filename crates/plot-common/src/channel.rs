//! Instrument channels served by a data source.

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub cid: u32,
    /// Full channel code, e.g. `KIPU EHZ HV`
    pub code: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub height: Option<f64>,
}

impl Channel {
    /// Parse one `cid:code:name:lon:lat[:height]` line as returned by the
    /// `channels` action.
    pub fn parse(line: &str) -> PlotResult<Self> {
        let bad = || PlotError::UnexpectedResponse(format!("bad channel line: {}", line));
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() != 5 && parts.len() != 6 {
            return Err(bad());
        }
        let height = match parts.get(5) {
            Some(h) if !h.is_empty() => Some(h.parse().map_err(|_| bad())?),
            _ => None,
        };
        Ok(Self {
            cid: parts[0].parse().map_err(|_| bad())?,
            code: parts[1].to_string(),
            name: parts[2].to_string(),
            lon: parts[3].parse().map_err(|_| bad())?,
            lat: parts[4].parse().map_err(|_| bad())?,
            height,
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

    /// Station part of the code: its first word.
    pub fn station(&self) -> &str {
        self.code
            .split(|c: char| c.is_whitespace() || c == '$' || c == '_')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.code)
    }
}
