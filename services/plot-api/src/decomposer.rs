//! Splitting a combined plot request into panels.
//!
//! Panel keys carry a numeric suffix: `st.0` is `st` of panel 0. The
//! top-level `n` gives the panel count and `o` the output mode.

use std::collections::BTreeMap;

use plot_common::panel::{DEFAULT_HEIGHT, DEFAULT_WIDTH, DEFAULT_X, DEFAULT_Y};
use plot_common::{OutputMode, PanelGeometry, PanelRequest, ParamBag, PlotError, PlotResult};
use tracing::debug;

/// Panel `src` naming the channel map overlay; the data source is then
/// given by `subsrc`.
pub const CHANNEL_MAP_SRC: &str = "channel_map";

/// Upper bound on `n` for one combined request.
pub const MAX_PANELS: i64 = 100;

/// A combined request split into ordered panels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedRequest {
    pub mode: OutputMode,
    pub panels: Vec<PanelRequest>,
}

/// Decompose raw query pairs. Fails on the first invalid panel.
pub fn decompose(pairs: &[(String, String)]) -> PlotResult<DecomposedRequest> {
    let mut top = ParamBag::new();
    let mut panel_bags: BTreeMap<usize, ParamBag> = BTreeMap::new();

    for (key, value) in pairs {
        match split_panel_key(key) {
            Some((name, index)) => panel_bags.entry(index).or_default().insert(name, value.as_str()),
            None => top.insert(key.as_str(), value.as_str()),
        }
    }

    let n = parse_int(&top, "n")?.ok_or(PlotError::InvalidRequest("n"))?;
    if !(0..=MAX_PANELS).contains(&n) {
        return Err(PlotError::InvalidRequest("n"));
    }
    let n = n as usize;

    let mut mode = parse_mode(&top, "o")?;
    let mut panels = Vec::with_capacity(n.min(panel_bags.len()));
    for index in 0..n {
        let params = panel_bags.remove(&index).unwrap_or_default();

        if let Some(panel_mode) = parse_mode(&params, "o")? {
            match mode {
                Some(m) if m != panel_mode => return Err(PlotError::MixedOutputModes),
                _ => mode = Some(panel_mode),
            }
        }

        let geometry = PanelGeometry::new(
            parse_int(&params, "x")?.unwrap_or(DEFAULT_X),
            parse_int(&params, "y")?.unwrap_or(DEFAULT_Y),
            parse_int(&params, "w")?.unwrap_or(DEFAULT_WIDTH),
            parse_int(&params, "h")?.unwrap_or(DEFAULT_HEIGHT),
        )?;

        let src = params
            .get("src")
            .map_err(|_| PlotError::InvalidRequest("src"))?
            .ok_or(PlotError::InvalidRequest("src"))?;
        let source = if src == CHANNEL_MAP_SRC {
            params
                .get("subsrc")
                .map_err(|_| PlotError::InvalidRequest("subsrc"))?
                .ok_or(PlotError::InvalidRequest("subsrc"))?
        } else {
            src
        }
        .to_string();

        panels.push(PanelRequest {
            index,
            source,
            geometry,
            params,
            mode: OutputMode::Render,
        });
    }

    if !panel_bags.is_empty() {
        debug!(
            ignored = ?panel_bags.keys().collect::<Vec<_>>(),
            "Ignoring panel keys beyond n"
        );
    }

    let mode = mode.unwrap_or_default();
    for panel in &mut panels {
        panel.mode = mode;
    }
    Ok(DecomposedRequest { mode, panels })
}

/// Whether a panel asked for the channel map overlay of its source.
pub fn is_channel_map(panel: &PanelRequest) -> bool {
    matches!(panel.params.get("src"), Ok(Some(CHANNEL_MAP_SRC)))
}

/// Split `name.i` into `(name, i)`; `None` for keys without a numeric suffix.
fn split_panel_key(key: &str) -> Option<(&str, usize)> {
    let (name, suffix) = key.rsplit_once('.')?;
    if name.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().map(|i| (name, i))
}

fn parse_int(bag: &ParamBag, key: &'static str) -> PlotResult<Option<i64>> {
    let illegal = || PlotError::InvalidRequest(geometry_name(key));
    match bag.get(key).map_err(|_| illegal())? {
        None => Ok(None),
        Some(v) => v.trim().parse::<i64>().map(Some).map_err(|_| illegal()),
    }
}

fn geometry_name(key: &'static str) -> &'static str {
    match key {
        "w" => "width",
        "h" => "height",
        other => other,
    }
}

fn parse_mode(bag: &ParamBag, key: &str) -> PlotResult<Option<OutputMode>> {
    match bag.get(key)? {
        None => Ok(None),
        Some(v) => OutputMode::parse(v)
            .map(Some)
            .ok_or_else(|| PlotError::invalid(key, format!("unknown output mode '{}'", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_two_panels_in_order() {
        let req = decompose(&pairs(&[
            ("n", "2"),
            ("src.1", "strikes"),
            ("src.0", "quakes"),
            ("st.0", "-1d"),
            ("w.1", "800"),
        ]))
        .unwrap();
        assert_eq!(req.panels.len(), 2);
        assert_eq!(req.panels[0].source, "quakes");
        assert_eq!(req.panels[0].params.get("st").unwrap(), Some("-1d"));
        assert_eq!(req.panels[1].source, "strikes");
        assert_eq!(req.panels[1].geometry.width, 800);
        assert_eq!(req.panels[1].geometry.height, 140);
        assert_eq!(req.mode, OutputMode::Render);
    }

    #[test]
    fn test_n_required_and_non_negative() {
        assert!(matches!(decompose(&pairs(&[])), Err(PlotError::InvalidRequest("n"))));
        assert!(matches!(decompose(&pairs(&[("n", "-1")])), Err(PlotError::InvalidRequest("n"))));
        assert!(matches!(decompose(&pairs(&[("n", "two")])), Err(PlotError::InvalidRequest("n"))));
        assert!(decompose(&pairs(&[("n", "0")])).unwrap().panels.is_empty());
    }

    #[test]
    fn test_n_upper_bound() {
        let err = decompose(&pairs(&[("n", "100000000000000")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("n")));
        let too_many = (MAX_PANELS + 1).to_string();
        assert!(matches!(
            decompose(&pairs(&[("n", too_many.as_str())])),
            Err(PlotError::InvalidRequest("n"))
        ));

        // At the cap, missing panels still fail on their own parameters.
        let at_cap = MAX_PANELS.to_string();
        let err = decompose(&pairs(&[("n", at_cap.as_str()), ("src.0", "q")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("src")));
    }

    #[test]
    fn test_bad_geometry_fails_fast() {
        let err = decompose(&pairs(&[("n", "1"), ("src.0", "q"), ("x.0", "-1")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("x")));

        let err = decompose(&pairs(&[("n", "1"), ("src.0", "q"), ("w.0", "wide")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("width")));

        let err = decompose(&pairs(&[("n", "1"), ("src.0", "q"), ("h.0", "6001")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("height")));
    }

    #[test]
    fn test_missing_src() {
        let err = decompose(&pairs(&[("n", "1")])).unwrap_err();
        assert_eq!(err.to_string(), "Illegal src value.");
    }

    #[test]
    fn test_channel_map_uses_subsrc() {
        let req = decompose(&pairs(&[("n", "1"), ("src.0", "channel_map"), ("subsrc.0", "rsam")])).unwrap();
        assert_eq!(req.panels[0].source, "rsam");
        assert!(is_channel_map(&req.panels[0]));

        let err = decompose(&pairs(&[("n", "1"), ("src.0", "channel_map")])).unwrap_err();
        assert!(matches!(err, PlotError::InvalidRequest("subsrc")));
    }

    #[test]
    fn test_output_modes() {
        let req = decompose(&pairs(&[("n", "1"), ("src.0", "q"), ("o", "csv")])).unwrap();
        assert_eq!(req.mode, OutputMode::Export);
        assert_eq!(req.panels[0].mode, OutputMode::Export);

        let err = decompose(&pairs(&[
            ("n", "2"),
            ("src.0", "q"),
            ("src.1", "q"),
            ("o.0", "csv"),
            ("o.1", "png"),
        ]))
        .unwrap_err();
        assert!(matches!(err, PlotError::MixedOutputModes));
    }

    #[test]
    fn test_split_panel_key() {
        assert_eq!(split_panel_key("st.0"), Some(("st", 0)));
        assert_eq!(split_panel_key("a.b.12"), Some(("a.b", 12)));
        assert_eq!(split_panel_key("n"), None);
        assert_eq!(split_panel_key("a.b"), None);
        assert_eq!(split_panel_key(".3"), None);
    }
}
