//! Panel requests and their parameter bags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

pub const MAX_PLOT_WIDTH: i64 = 6000;
pub const MAX_PLOT_HEIGHT: i64 = 6000;

pub const DEFAULT_X: i64 = 75;
pub const DEFAULT_Y: i64 = 19;
pub const DEFAULT_WIDTH: i64 = 610;
pub const DEFAULT_HEIGHT: i64 = 140;

/// Pixel placement of a panel's graph area within the composed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PanelGeometry {
    /// Validate raw values: `0 <= x, y` and `0 < width, height <= 6000`.
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> PlotResult<Self> {
        if x < 0 {
            return Err(PlotError::InvalidRequest("x"));
        }
        if y < 0 {
            return Err(PlotError::InvalidRequest("y"));
        }
        if width <= 0 || width > MAX_PLOT_WIDTH {
            return Err(PlotError::InvalidRequest("width"));
        }
        if height <= 0 || height > MAX_PLOT_HEIGHT {
            return Err(PlotError::InvalidRequest("height"));
        }
        Ok(Self {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}

impl Default for PanelGeometry {
    fn default() -> Self {
        Self {
            x: DEFAULT_X as u32,
            y: DEFAULT_Y as u32,
            width: DEFAULT_WIDTH as u32,
            height: DEFAULT_HEIGHT as u32,
        }
    }
}

/// Whether a request wants render-ready series or tabular rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Render,
    Export,
}

impl OutputMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "render" | "plot" | "png" | "json" => Some(OutputMode::Render),
            "export" | "csv" => Some(OutputMode::Export),
            _ => None,
        }
    }
}

/// Multi-valued string parameters of one panel.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamBag {
    entries: BTreeMap<String, Vec<String>>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// Builder-style insert, mostly for tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Number of values supplied for `key`.
    pub fn count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.count(key) > 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Single value for `key`; more than one value is an error.
    pub fn get(&self, key: &str) -> PlotResult<Option<&str>> {
        match self.entries.get(key).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([v]) => Ok(Some(v.as_str())),
            Some(_) => Err(PlotError::DuplicatedParameter(key.to_string())),
        }
    }

    pub fn require(&self, key: &str) -> PlotResult<&str> {
        self.get(key)?
            .ok_or_else(|| PlotError::MissingParameter(key.to_string()))
    }

    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> PlotResult<&'a str> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn get_f64(&self, key: &str) -> PlotResult<Option<f64>> {
        match self.get(key)? {
            None => Ok(None),
            Some(v) => match v.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(PlotError::invalid(key, format!("'{}' is not a number", v))),
            },
        }
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> PlotResult<f64> {
        Ok(self.get_f64(key)?.unwrap_or(default))
    }

    pub fn get_i64(&self, key: &str) -> PlotResult<Option<i64>> {
        match self.get(key)? {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| PlotError::invalid(key, format!("'{}' is not an integer", v))),
        }
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> PlotResult<i64> {
        Ok(self.get_i64(key)?.unwrap_or(default))
    }

    /// Booleans accept `t/true/1` and `f/false/0`, case-insensitive.
    pub fn get_bool_or(&self, key: &str, default: bool) -> PlotResult<bool> {
        match self.get(key)? {
            None => Ok(default),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" => Ok(true),
                "f" | "false" | "0" => Ok(false),
                _ => Err(PlotError::invalid(key, format!("'{}' is not a boolean", v))),
            },
        }
    }

    /// A `(min, max)` filter pair with defaults; `min > max` fails with
    /// `Illegal <name> filter.`
    pub fn range_f64(
        &self,
        min_key: &str,
        max_key: &str,
        name: &str,
        defaults: (f64, f64),
    ) -> PlotResult<(f64, f64)> {
        let min = self.get_f64_or(min_key, defaults.0)?;
        let max = self.get_f64_or(max_key, defaults.1)?;
        if min > max {
            return Err(PlotError::invalid(name, format!("Illegal {} filter.", name)));
        }
        Ok((min, max))
    }

    /// Flatten into `(key, value)` pairs in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = ParamBag::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

/// How a visualization kind treats one parameter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    /// Must appear exactly once
    Required,
    /// May appear at most once
    Optional,
    /// Must not appear
    Forbidden,
}

/// Per-kind parameter rules, checked before any typed parsing.
///
/// Keys not listed are ignored.
#[derive(Debug, Clone, Copy)]
pub struct ParamPolicy {
    rules: &'static [(&'static str, ParamRule)],
}

impl ParamPolicy {
    pub const fn new(rules: &'static [(&'static str, ParamRule)]) -> Self {
        Self { rules }
    }

    pub fn rule(&self, key: &str) -> Option<ParamRule> {
        self.rules.iter().find(|(k, _)| *k == key).map(|(_, r)| *r)
    }

    /// Check a bag against every rule, failing on the first violation.
    pub fn check(&self, bag: &ParamBag) -> PlotResult<()> {
        for (key, rule) in self.rules {
            let count = bag.count(key);
            match rule {
                ParamRule::Forbidden if count > 0 => {
                    return Err(PlotError::IllegalParameter(key.to_string()));
                }
                _ if count > 1 => {
                    return Err(PlotError::DuplicatedParameter(key.to_string()));
                }
                ParamRule::Required if count == 0 => {
                    return Err(PlotError::MissingParameter(key.to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One decomposed panel of a combined request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRequest {
    /// Position in the combined request
    pub index: usize,
    /// Logical data source name
    pub source: String,
    pub geometry: PanelGeometry,
    pub params: ParamBag,
    pub mode: OutputMode,
}
