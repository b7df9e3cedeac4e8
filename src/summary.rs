//! Display-only summary of the active query: the covered time period and the
//! tenant the logs belong to.
//!
//! The free functions are pure. [`QuerySummary`] wraps them with a cache keyed
//! on the two source fields of each string, so changing unrelated query
//! parameters never recomputes anything.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::query::QueryParameters;

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OFFSET_FORMAT: &str = "%:z";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rendered in place of a timestamp that could not be parsed.
pub const INVALID_DATE: &str = "Invalid Date";
/// Rendered in place of a missing tenant component.
pub const MISSING_FIELD: &str = "undefined";

/// Parses the timestamp forms a query may carry. Naive values are read as
/// wall-clock time in `tz`.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(tz));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
}

fn format_timestamp<Tz>(raw: &str, parsed: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match parsed {
        Some(parsed) => parsed.format(DATE_TIME_FORMAT).to_string(),
        None => {
            tracing::warn!(value = %raw, "unparseable_timestamp");
            INVALID_DATE.to_string()
        }
    }
}

/// `"{start} - {end} ({offset})"`.
///
/// Missing timestamps render as empty segments; the separator and the offset
/// are always present. The offset comes from `start`, or from the current
/// time in `tz` when `start` is missing or unparseable.
pub fn derive_period<Tz>(start: Option<&str>, end: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let start = start.filter(|value| !value.is_empty());
    let end = end.filter(|value| !value.is_empty());

    let parsed_start = start.and_then(|raw| parse_timestamp(raw, tz));
    let local_start = start
        .map(|raw| format_timestamp(raw, parsed_start.as_ref()))
        .unwrap_or_default();
    let local_end = end
        .map(|raw| format_timestamp(raw, parse_timestamp(raw, tz).as_ref()))
        .unwrap_or_default();
    let offset = parsed_start
        .unwrap_or_else(|| Utc::now().with_timezone(tz))
        .format(OFFSET_FORMAT)
        .to_string();

    format!("{local_start} - {local_end} ({offset})")
}

/// `"{AccountID}:{ProjectID}"`, with [`MISSING_FIELD`] for an absent part.
pub fn derive_tenant(account_id: Option<&str>, project_id: Option<&str>) -> String {
    format!(
        "{}:{}",
        account_id.unwrap_or(MISSING_FIELD),
        project_id.unwrap_or(MISSING_FIELD)
    )
}

/// Period in the local timezone, or `""` when there are no parameters.
pub fn period(params: Option<&QueryParameters>) -> String {
    params
        .map(|params| derive_period(params.start(), params.end(), &Local))
        .unwrap_or_default()
}

/// Tenant identifier, or `""` when there are no parameters.
pub fn tenant(params: Option<&QueryParameters>) -> String {
    params
        .map(|params| derive_tenant(params.account_id(), params.project_id()))
        .unwrap_or_default()
}

/// Single-entry cache that recomputes only when the key changes.
#[derive(Debug)]
pub struct Memo<K, V> {
    entry: Option<(K, V)>,
    computations: usize,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entry: None,
            computations: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
        if self
            .entry
            .as_ref()
            .is_some_and(|(cached, _)| *cached != key)
        {
            self.entry = None;
        }
        let computations = &mut self.computations;
        let (_, value) = self.entry.get_or_insert_with(|| {
            *computations += 1;
            let value = compute(&key);
            (key, value)
        });
        value
    }

    pub fn computations(&self) -> usize {
        self.computations
    }
}

// `None` stands for an absent parameter mapping.
type FieldPair = Option<(Option<String>, Option<String>)>;

fn field_pair(
    params: Option<&QueryParameters>,
    first: fn(&QueryParameters) -> Option<&str>,
    second: fn(&QueryParameters) -> Option<&str>,
) -> FieldPair {
    params.map(|params| {
        (
            first(params).map(str::to_owned),
            second(params).map(str::to_owned),
        )
    })
}

/// Memoized period and tenant strings for one query view.
#[derive(Debug)]
pub struct QuerySummary<Tz = Local> {
    tz: Tz,
    period: Memo<FieldPair, String>,
    tenant: Memo<FieldPair, String>,
}

impl QuerySummary<Local> {
    pub fn new() -> Self {
        Self::with_timezone(Local)
    }
}

impl Default for QuerySummary<Local> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz> QuerySummary<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    pub fn with_timezone(tz: Tz) -> Self {
        Self {
            tz,
            period: Memo::default(),
            tenant: Memo::default(),
        }
    }

    pub fn period(&mut self, params: Option<&QueryParameters>) -> &str {
        let key = field_pair(params, QueryParameters::start, QueryParameters::end);
        let tz = &self.tz;
        self.period.get_or_compute(key, |key| match key {
            Some((start, end)) => derive_period(start.as_deref(), end.as_deref(), tz),
            None => String::new(),
        })
    }

    pub fn tenant(&mut self, params: Option<&QueryParameters>) -> &str {
        let key = field_pair(
            params,
            QueryParameters::account_id,
            QueryParameters::project_id,
        );
        self.tenant.get_or_compute(key, |key| match key {
            Some((account_id, project_id)) => {
                derive_tenant(account_id.as_deref(), project_id.as_deref())
            }
            None => String::new(),
        })
    }
}
