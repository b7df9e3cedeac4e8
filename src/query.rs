use std::collections::BTreeMap;

pub const QUERY: &str = "query";
pub const START: &str = "start";
pub const END: &str = "end";
pub const ACCOUNT_ID: &str = "AccountID";
pub const PROJECT_ID: &str = "ProjectID";

/// Parameters of the active log query.
///
/// Keys are not guaranteed to be present. The consumed keys are [`START`],
/// [`END`], [`ACCOUNT_ID`] and [`PROJECT_ID`]; everything else is carried
/// along untouched and sent with the export request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters(BTreeMap<String, String>);

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn query(&self) -> Option<&str> {
        self.get(QUERY)
    }

    pub fn start(&self) -> Option<&str> {
        self.get(START)
    }

    pub fn end(&self) -> Option<&str> {
        self.get(END)
    }

    pub fn account_id(&self) -> Option<&str> {
        self.get(ACCOUNT_ID)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.get(PROJECT_ID)
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parses a `KEY=VALUE` pair. The value may be empty and may contain `=`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{raw}'"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_read_known_keys() {
        let params: QueryParameters = [
            ("start", "2024-01-01T00:00:00Z"),
            ("AccountID", "1"),
            ("query", "error"),
        ]
        .into_iter()
        .collect();
        assert_eq!(params.start(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(params.end(), None);
        assert_eq!(params.account_id(), Some("1"));
        assert_eq!(params.project_id(), None);
        assert_eq!(params.query(), Some("error"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn iteration_is_key_ordered() {
        let mut params = QueryParameters::new();
        params.insert("start", "a");
        params.insert("ProjectID", "b");
        params.insert("limit", "c");
        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ProjectID", "limit", "start"]);
    }

    #[test]
    fn parse_param_splits_on_first_equals() {
        assert_eq!(
            parse_param("query=_msg:=\"x\"").unwrap(),
            ("query".to_string(), "_msg:=\"x\"".to_string())
        );
        assert_eq!(
            parse_param(" limit =").unwrap(),
            ("limit".to_string(), String::new())
        );
    }

    #[test]
    fn parse_param_rejects_malformed_pairs() {
        assert!(parse_param("novalue").unwrap_err().contains("KEY=VALUE"));
        assert!(parse_param("=1").unwrap_err().contains("missing key"));
    }
}
