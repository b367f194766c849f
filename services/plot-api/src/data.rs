//! Raw data proxy: forwards one text query to a source's backend.

use backend::{Action, DataSourceRegistry, QueryParams};
use plot_common::{ParamBag, ParamPolicy, ParamRule, PlotError, PlotResult};
use tracing::debug;

pub const METADATA_POLICY: ParamPolicy = ParamPolicy::new(&[
    ("byID", ParamRule::Optional),
    ("ch", ParamRule::Required),
    ("col", ParamRule::Optional),
    ("rk", ParamRule::Optional),
    ("st", ParamRule::Forbidden),
    ("et", ParamRule::Forbidden),
    ("tz", ParamRule::Forbidden),
    ("type", ParamRule::Forbidden),
]);

pub const SUPPDATA_POLICY: ParamPolicy = ParamPolicy::new(&[
    ("byID", ParamRule::Optional),
    ("ch", ParamRule::Optional),
    ("col", ParamRule::Optional),
    ("rk", ParamRule::Optional),
    ("st", ParamRule::Required),
    ("et", ParamRule::Optional),
    ("tz", ParamRule::Optional),
    ("type", ParamRule::Optional),
]);

/// Keys consumed by the proxy itself rather than forwarded.
const PROXY_KEYS: [&str; 2] = ["src", "da"];

/// A completed proxy query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawData {
    pub action: Action,
    pub lines: Vec<String>,
}

/// Forward `da` with the remaining arguments to the backend of `src`.
pub async fn fetch_raw(registry: &DataSourceRegistry, pairs: &[(String, String)]) -> PlotResult<RawData> {
    let bag: ParamBag = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let src = bag.get("src")?.ok_or(PlotError::InvalidRequest("src"))?;
    let action = Action::parse(bag.get("da")?.ok_or(PlotError::InvalidRequest("da"))?);
    let descriptor = registry
        .descriptor(src)
        .ok_or_else(|| PlotError::UnknownSource(src.to_string()))?;

    match action {
        Action::Metadata => METADATA_POLICY.check(&bag)?,
        Action::SuppData => SUPPDATA_POLICY.check(&bag)?,
        _ => {}
    }

    let mut query = QueryParams::new(&descriptor.remote_source, action.clone());
    for (key, value) in bag.pairs() {
        if !PROXY_KEYS.contains(&key) {
            query.set(key, value);
        }
    }

    let lines = {
        let conn = registry.acquire(&descriptor.backend).await?;
        let lines = conn.text_query(&query).await;
        lines
    }?;
    debug!(source = src, action = %action, lines = lines.len(), "Raw data query complete");

    let lines = if action == Action::SuppData {
        lines.iter().map(|l| escape_special(l)).collect()
    } else {
        lines
    };
    Ok(RawData { action, lines })
}

/// Escape markup-significant, control and non-ASCII characters as
/// numeric entities.
pub fn escape_special(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '<' | '&' | '>') || c < ' ' || c > '~' {
            out.push_str(&format!("&#{};", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    out
}
