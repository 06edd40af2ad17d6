use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Placeholder the server uses for a blank client or matter.
pub const UNSPECIFIED: &str = "(Unspecified)";

/// Last creation stamp handed out in this process (epoch millis).
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Next creation stamp: wall-clock millis, bumped so it always increases.
fn next_stamp() -> i64 {
  let now = Utc::now().timestamp_millis();
  let previous = LAST_STAMP
    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
      Some(now.max(last + 1))
    })
    .unwrap_or(now);
  now.max(previous + 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
  #[error("hours must be a number, got {0:?}")]
  InvalidHours(String),
  #[error("hours must be greater than zero")]
  NonPositiveHours,
}

/// Billable hours with two-decimal precision, stored as hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(u32);

impl Hours {
  /// Round to two decimals; zero or negative after rounding is rejected.
  pub fn from_f64(value: f64) -> Result<Self, EntryError> {
    if !value.is_finite() {
      return Err(EntryError::InvalidHours(value.to_string()));
    }
    let hundredths = (value * 100.0).round();
    if hundredths <= 0.0 {
      return Err(EntryError::NonPositiveHours);
    }
    if hundredths > f64::from(u32::MAX) {
      return Err(EntryError::InvalidHours(value.to_string()));
    }
    Ok(Self(hundredths as u32))
  }

  pub fn parse(input: &str) -> Result<Self, EntryError> {
    let value: f64 = input
      .trim()
      .parse()
      .map_err(|_| EntryError::InvalidHours(input.to_string()))?;
    Self::from_f64(value)
  }

  pub fn as_f64(self) -> f64 {
    f64::from(self.0) / 100.0
  }

  pub fn hundredths(self) -> u32 {
    self.0
  }
}

impl fmt::Display for Hours {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
  }
}

impl Serialize for Hours {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(self.as_f64())
  }
}

impl<'de> Deserialize<'de> for Hours {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Hours::from_f64(value).map_err(serde::de::Error::custom)
  }
}

/// Raw entry form fields, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryForm {
  pub client: String,
  pub matter: String,
  pub date_of_work: String,
  pub hours: String,
  pub timekeeper: String,
  pub desc: String,
}

impl EntryForm {
  pub fn is_empty(&self) -> bool {
    *self == EntryForm::default()
  }

  /// Fill blank fields from `other` (used to resume a saved draft).
  pub fn or_from(mut self, other: &EntryForm) -> Self {
    fn fill(field: &mut String, fallback: &str) {
      if field.trim().is_empty() {
        *field = fallback.to_string();
      }
    }
    fill(&mut self.client, &other.client);
    fill(&mut self.matter, &other.matter);
    fill(&mut self.date_of_work, &other.date_of_work);
    fill(&mut self.hours, &other.hours);
    fill(&mut self.timekeeper, &other.timekeeper);
    fill(&mut self.desc, &other.desc);
    self
  }
}

/// A time entry waiting to be accepted by the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
  pub id: String,
  pub client: String,
  pub matter: String,
  pub date_of_work: NaiveDate,
  pub hours: Hours,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timekeeper: Option<String>,
  pub created_at: DateTime<Utc>,
  /// In-flight marker during a drain; never persisted as true
  #[serde(default)]
  pub synced: bool,
}

impl PendingEntry {
  /// Validate a form into an entry.
  ///
  /// Blank client/matter become `(Unspecified)`, a blank or unparsable date
  /// becomes `today`, and a blank timekeeper falls back to
  /// `default_timekeeper`.
  pub fn from_form(
    form: &EntryForm,
    default_timekeeper: Option<&str>,
    today: NaiveDate,
  ) -> Result<Self, EntryError> {
    let hours = Hours::parse(&form.hours)?;
    let date_of_work = NaiveDate::parse_from_str(form.date_of_work.trim(), "%Y-%m-%d")
      .unwrap_or(today);
    let timekeeper = non_blank(&form.timekeeper)
      .or_else(|| default_timekeeper.and_then(non_blank));

    let mut entry = Self {
      id: String::new(),
      client: non_blank(&form.client).unwrap_or_else(|| UNSPECIFIED.to_string()),
      matter: non_blank(&form.matter).unwrap_or_else(|| UNSPECIFIED.to_string()),
      date_of_work,
      hours,
      description: form.desc.trim().to_string(),
      timekeeper,
      created_at: Utc::now(),
      synced: false,
    };
    entry.restamp();
    Ok(entry)
  }

  /// Assign a fresh creation stamp and the id derived from it.
  pub fn restamp(&mut self) {
    let stamp = next_stamp();
    self.created_at = DateTime::from_timestamp_millis(stamp).unwrap_or_else(Utc::now);
    self.id = format!("entry-{}", stamp);
  }
}

fn non_blank(s: &str) -> Option<String> {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn form(client: &str, hours: &str) -> EntryForm {
    EntryForm {
      client: client.to_string(),
      matter: "General".to_string(),
      date_of_work: "2024-03-01".to_string(),
      hours: hours.to_string(),
      timekeeper: String::new(),
      desc: format!("work for {}", client),
    }
  }

  pub(crate) fn entry(client: &str) -> PendingEntry {
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    PendingEntry::from_form(&form(client, "1.5"), None, today).unwrap()
  }

  #[test]
  fn test_hours_round_to_two_decimals() {
    assert_eq!(Hours::parse("1.234").unwrap().hundredths(), 123);
    assert_eq!(Hours::parse(" 0.005 ").unwrap().hundredths(), 1);
    assert_eq!(Hours::parse("2").unwrap().to_string(), "2.00");
  }

  #[test]
  fn test_hours_rejects_non_positive() {
    assert_eq!(Hours::parse("0"), Err(EntryError::NonPositiveHours));
    assert_eq!(Hours::parse("-1.5"), Err(EntryError::NonPositiveHours));
    assert_eq!(Hours::parse("0.004"), Err(EntryError::NonPositiveHours));
  }

  #[test]
  fn test_hours_rejects_garbage() {
    assert!(matches!(Hours::parse("abc"), Err(EntryError::InvalidHours(_))));
    assert!(matches!(Hours::parse(""), Err(EntryError::InvalidHours(_))));
    assert!(matches!(Hours::parse("NaN"), Err(EntryError::InvalidHours(_))));
  }

  #[test]
  fn test_from_form_defaults() {
    let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let form = EntryForm {
      hours: "0.25".to_string(),
      date_of_work: "not a date".to_string(),
      ..Default::default()
    };
    let entry = PendingEntry::from_form(&form, Some("  "), today).unwrap();
    assert_eq!(entry.client, UNSPECIFIED);
    assert_eq!(entry.matter, UNSPECIFIED);
    assert_eq!(entry.date_of_work, today);
    assert_eq!(entry.timekeeper, None);
    assert!(!entry.synced);
  }

  #[test]
  fn test_from_form_timekeeper_fallback() {
    let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let entry = PendingEntry::from_form(&form("Acme", "1"), Some("J. Doe"), today).unwrap();
    assert_eq!(entry.timekeeper.as_deref(), Some("J. Doe"));
    assert_eq!(entry.date_of_work, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
  }

  #[test]
  fn test_ids_unique_and_created_at_monotonic() {
    let first = entry("A");
    let second = entry("B");
    assert_ne!(first.id, second.id);
    assert!(second.created_at > first.created_at);
    assert_eq!(
      first.id,
      format!("entry-{}", first.created_at.timestamp_millis())
    );
  }

  #[test]
  fn test_serialized_field_names() {
    let json = serde_json::to_value(entry("Acme")).unwrap();
    assert!(json.get("dateOfWork").is_some());
    assert!(json.get("createdAt").is_some());
    assert_eq!(json["hours"], serde_json::json!(1.5));
    assert_eq!(json["synced"], serde_json::json!(false));
    assert!(json.get("timekeeper").is_none());
  }

  #[test]
  fn test_draft_fill() {
    let draft = form("Acme", "2");
    let partial = EntryForm {
      hours: "3".to_string(),
      ..Default::default()
    };
    let merged = partial.or_from(&draft);
    assert_eq!(merged.client, "Acme");
    assert_eq!(merged.hours, "3");
  }
}
