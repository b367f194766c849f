//! Backend query parameters.

use serde::Serialize;

/// Operation tag sent as the `action` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Ranks,
    Data,
    Channels,
    RatData,
    Metadata,
    SuppData,
    GenericMenu,
    /// Any other action, passed through verbatim by the raw data proxy
    Custom(String),
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s {
            "ranks" => Action::Ranks,
            "data" => Action::Data,
            "channels" => Action::Channels,
            "ratdata" => Action::RatData,
            "metadata" => Action::Metadata,
            "suppdata" => Action::SuppData,
            "genericMenu" => Action::GenericMenu,
            other => Action::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Ranks => "ranks",
            Action::Data => "data",
            Action::Channels => "channels",
            Action::RatData => "ratdata",
            Action::Metadata => "metadata",
            Action::SuppData => "suppdata",
            Action::GenericMenu => "genericMenu",
            Action::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered key/value parameters of one backend query.
///
/// Always starts with `source` and `action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(source: &str, action: Action) -> Self {
        Self {
            pairs: vec![
                ("source".to_string(), source.to_string()),
                ("action".to_string(), action.as_str().to_string()),
            ],
        }
    }

    /// Set a parameter, replacing an earlier value for the same key.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn source(&self) -> &str {
        self.get("source").unwrap_or_default()
    }

    pub fn action(&self) -> &str {
        self.get("action").unwrap_or_default()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_and_action_first() {
        let q = QueryParams::new("hypo_hvo", Action::Data).with("rk", 0).with("st", 1.5);
        assert_eq!(q.pairs()[0], ("source".to_string(), "hypo_hvo".to_string()));
        assert_eq!(q.pairs()[1], ("action".to_string(), "data".to_string()));
        assert_eq!(q.get("st"), Some("1.5"));
    }

    #[test]
    fn test_set_replaces() {
        let mut q = QueryParams::new("s", Action::Ranks);
        q.set("rk", 1);
        q.set("rk", 2);
        assert_eq!(q.get("rk"), Some("2"));
        assert_eq!(q.pairs().len(), 3);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::parse("ratdata"), Action::RatData);
        assert_eq!(Action::parse("genericMenu").as_str(), "genericMenu");
        assert_eq!(Action::parse("helicorder"), Action::Custom("helicorder".into()));
    }
}
