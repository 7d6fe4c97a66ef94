use crate::cpi::table::Cell;
use crate::cpi::warn;
use crate::error::CpiError;
use anyhow::Result;
use serde::{Deserialize, Deserializer};
use std::thread;
use std::time::Duration;

/// One period-tagged entry as served by the remote source. Every field is
/// text; nothing is trusted until `parse_observation` accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawObservation {
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub period: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: String,
}

/// Strings pass through, numbers are rendered, anything else becomes empty
/// text so a single odd entry is rejected later instead of failing the batch.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(num)) => num.to_string(),
        _ => String::new(),
    })
}

impl RawObservation {
    pub fn new(year: impl Into<String>, period: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            period: period.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyObservation {
    pub year: i32,
    pub month: u32,
    pub cell: Cell,
}

/// An authoritative monthly series. One call is one attempt; retrying and
/// chunking belong to `fetch_range`.
pub trait SeriesSource {
    fn fetch(&self, series_id: &str, start_year: i32, end_year: i32) -> Result<Vec<RawObservation>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub chunk_years: u32,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            chunk_years: 20,
            max_attempts: 3,
            backoff: Duration::from_millis(1500),
        }
    }
}

/// Inclusive year chunks covering `[start_year, end_year]` in increasing order.
pub fn year_chunks(start_year: i32, end_year: i32, chunk_years: u32) -> Vec<(i32, i32)> {
    let span = i32::try_from(chunk_years.max(1)).unwrap_or(i32::MAX);
    let mut out = Vec::new();
    let mut year = start_year;
    while year <= end_year {
        let chunk_end = end_year.min(year.saturating_add(span - 1));
        out.push((year, chunk_end));
        if chunk_end == i32::MAX {
            break;
        }
        year = chunk_end + 1;
    }
    out
}

fn fetch_chunk_with_retry(
    source: &dyn SeriesSource,
    series_id: &str,
    start_year: i32,
    end_year: i32,
    policy: &RetryPolicy,
) -> Result<Vec<RawObservation>, CpiError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match source.fetch(series_id, start_year, end_year) {
            Ok(rows) => {
                log::debug!(
                    "fetched {} observations for {series_id} {start_year}-{end_year} (attempt {attempt})",
                    rows.len()
                );
                return Ok(rows);
            }
            Err(err) => {
                let retry = if attempt < attempts { "yes" } else { "no" };
                warn::emit(
                    "W001_FETCH_ATTEMPT",
                    "remote",
                    "fetch",
                    series_id,
                    &format!("{start_year}-{end_year}"),
                    retry,
                    &format!("attempt {attempt}/{attempts}"),
                    &format!("{err:#}"),
                );
                last_err = Some(err);
                if attempt < attempts {
                    thread::sleep(policy.backoff * attempt);
                }
            }
        }
    }

    Err(CpiError::RemoteFetch {
        start_year,
        end_year,
        attempts,
        message: last_err
            .map(|err| format!("{err:#}"))
            .unwrap_or_else(|| "no attempt was made".to_string()),
    })
}

/// Fetches `[start_year, end_year]` one chunk at a time. Any chunk that
/// exhausts its retries fails the whole range; partial results are discarded.
pub fn fetch_range(
    source: &dyn SeriesSource,
    series_id: &str,
    start_year: i32,
    end_year: i32,
    policy: &RetryPolicy,
) -> Result<Vec<RawObservation>, CpiError> {
    let mut all_rows = Vec::new();
    for (chunk_start, chunk_end) in year_chunks(start_year, end_year, policy.chunk_years) {
        let rows = fetch_chunk_with_retry(source, series_id, chunk_start, chunk_end, policy)?;
        all_rows.extend(rows);
    }
    Ok(all_rows)
}

/// `Ok(None)` for periods that are not monthly (annual averages, quarters).
pub fn parse_observation(raw: &RawObservation) -> Result<Option<MonthlyObservation>, CpiError> {
    let malformed = |reason: &str| CpiError::MalformedObservation {
        year: raw.year.clone(),
        period: raw.period.clone(),
        reason: reason.to_string(),
    };

    let Some(code) = raw.period.trim().strip_prefix('M') else {
        return Ok(None);
    };
    let month = code
        .parse::<u32>()
        .map_err(|_| malformed("period is not a month code"))?;
    if month == 13 {
        return Ok(None);
    }
    if !(1..=12).contains(&month) {
        return Err(malformed("month out of range"));
    }
    let year = raw
        .year
        .trim()
        .parse::<i32>()
        .map_err(|_| malformed("year is not an integer"))?;
    let cell = Cell::parse(&raw.value).ok_or_else(|| malformed("value is not numeric"))?;

    Ok(Some(MonthlyObservation { year, month, cell }))
}

/// Keeps monthly observations with numeric values. Placeholders are dropped
/// one by one without affecting the rest of the batch.
pub fn extract_monthly_points(rows: &[RawObservation]) -> Vec<MonthlyObservation> {
    rows.iter()
        .filter_map(|raw| match parse_observation(raw) {
            Ok(point) => point,
            Err(err) => {
                log::debug!("skipping observation: {err}");
                None
            }
        })
        .collect()
}
