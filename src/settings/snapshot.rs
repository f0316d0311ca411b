//! Settings form state, its normalized snapshot, and the feed-membership
//! signature derived from it.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Upper bound accepted for prices and sizes.
pub const VALUE_CEILING: u32 = 99_999;

const DEFAULT_MIN_PRICE: u32 = 0;
const DEFAULT_MAX_PRICE: u32 = VALUE_CEILING;
const DEFAULT_MIN_SQM: u32 = 0;

/// Local precondition that blocks a save without surfacing an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a whole number: {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("minimum price {min} is higher than maximum price {max}")]
    InvertedPriceRange { min: u32, max: u32 },
}

/// Raw settings as edited by the user.
///
/// Numeric fields hold the text as typed; an empty field means "no bound".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    #[serde(deserialize_with = "text_or_number")]
    pub min_price: String,
    #[serde(deserialize_with = "text_or_number")]
    pub max_price: String,
    #[serde(deserialize_with = "text_or_number")]
    pub min_sqm: String,
    pub cities: Vec<String>,
    pub agencies: Vec<String>,
    pub notifications_enabled: bool,
}

/// Accept `min_price = 800` as well as `min_price = "800"` in config files.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(u64),
    }

    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Number(n) => n.to_string(),
    })
}

impl SettingsForm {
    /// Add a city to the filter set. Returns `false` if it was already present
    /// (case-insensitive).
    pub fn add_city(&mut self, city: &str) -> bool {
        add_unique(&mut self.cities, city)
    }

    pub fn remove_city(&mut self, city: &str) -> bool {
        remove_matching(&mut self.cities, city)
    }

    pub fn add_agency(&mut self, agency: &str) -> bool {
        add_unique(&mut self.agencies, agency)
    }

    pub fn remove_agency(&mut self, agency: &str) -> bool {
        remove_matching(&mut self.agencies, agency)
    }

    /// Normalize the form into the snapshot sent to the backend.
    ///
    /// Empty numeric fields take their defaults and values are clamped to
    /// [`VALUE_CEILING`]. Non-numeric input or an inverted price range is a
    /// [`ValidationError`].
    pub fn snapshot(&self) -> Result<SettingsSnapshot, ValidationError> {
        let min_price = parse_bound("min_price", &self.min_price, DEFAULT_MIN_PRICE)?;
        let max_price = parse_bound("max_price", &self.max_price, DEFAULT_MAX_PRICE)?;
        let min_sqm = parse_bound("min_sqm", &self.min_sqm, DEFAULT_MIN_SQM)?;

        if min_price > max_price {
            return Err(ValidationError::InvertedPriceRange {
                min: min_price,
                max: max_price,
            });
        }

        Ok(SettingsSnapshot {
            min_price,
            max_price,
            min_sqm,
            filter_cities: normalize_list(&self.cities, true),
            filter_agencies: normalize_list(&self.agencies, false),
            notifications_enabled: self.notifications_enabled,
        })
    }
}

fn add_unique(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        return false;
    }
    list.push(value.to_string());
    true
}

fn remove_matching(list: &mut Vec<String>, value: &str) -> bool {
    let before = list.len();
    list.retain(|v| !v.eq_ignore_ascii_case(value.trim()));
    list.len() != before
}

fn parse_bound(field: &'static str, raw: &str, default: u32) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotANumber {
            field,
            value: raw.to_string(),
        });
    }
    // All-digit strings only fail to parse on overflow.
    let value = trimmed.parse::<u64>().unwrap_or(u64::MAX);
    Ok(value.min(u64::from(VALUE_CEILING)) as u32)
}

fn normalize_list(values: &[String], lowercase: bool) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| if lowercase { v.to_lowercase() } else { v.to_string() })
        .collect()
}

/// Normalized settings, as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub min_price: u32,
    pub max_price: u32,
    pub min_sqm: u32,
    pub filter_cities: Vec<String>,
    pub filter_agencies: Vec<String>,
    pub notifications_enabled: bool,
}

impl SettingsSnapshot {
    /// Fingerprint of the fields that decide feed membership.
    ///
    /// Lists are compared as sets: ordering and repeats do not change the
    /// signature. `notifications_enabled` is deliberately excluded.
    pub fn signature(&self) -> Signature {
        let canonical = format!(
            "{}|{}|{}|{}|{}",
            self.min_price,
            self.max_price,
            self.min_sqm,
            canonical_set(&self.filter_cities),
            canonical_set(&self.filter_agencies),
        );
        Signature(format!("{:x}", Sha256::digest(canonical.as_bytes())))
    }
}

fn canonical_set(values: &[String]) -> String {
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(",")
}

/// Opaque equality token for a [`SettingsSnapshot`]. Never parsed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn form(min: &str, max: &str, cities: &[&str]) -> SettingsForm {
        SettingsForm {
            min_price: min.into(),
            max_price: max.into(),
            cities: cities.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_fields_take_defaults() {
        let snapshot = SettingsForm::default().snapshot().unwrap();
        assert_eq!(snapshot.min_price, 0);
        assert_eq!(snapshot.max_price, VALUE_CEILING);
        assert_eq!(snapshot.min_sqm, 0);
    }

    #[test]
    fn test_values_are_clamped() {
        let snapshot = form("", "1000000", &[]).snapshot().unwrap();
        assert_eq!(snapshot.max_price, VALUE_CEILING);

        let snapshot = form("", "99999999999999999999999", &[]).snapshot().unwrap();
        assert_eq!(snapshot.max_price, VALUE_CEILING);
    }

    #[test]
    fn test_non_numeric_is_blocked() {
        let err = form("12a", "", &[]).snapshot().unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotANumber {
                field: "min_price",
                value: "12a".into()
            }
        );
        assert!(form("-5", "", &[]).snapshot().is_err());
    }

    #[test]
    fn test_inverted_range_is_blocked() {
        let err = form("2000", "1000", &[]).snapshot().unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvertedPriceRange {
                min: 2000,
                max: 1000
            }
        );
        assert!(form("1000", "1000", &[]).snapshot().is_ok());
    }

    #[test]
    fn test_cities_lowercased() {
        let snapshot = form("", "", &["Utrecht", " Amsterdam "]).snapshot().unwrap();
        assert_eq!(snapshot.filter_cities, vec!["utrecht", "amsterdam"]);
    }

    #[test]
    fn test_signature_ignores_order_and_case() {
        let a = form("500", "1500", &["Utrecht", "amsterdam"]).snapshot().unwrap();
        let b = form("500", "1500", &["Amsterdam", "utrecht", "UTRECHT"]).snapshot().unwrap();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_tracks_membership_fields() {
        let base = form("500", "1500", &["utrecht"]);
        let mut city_changed = base.clone();
        city_changed.add_city("Delft");
        let mut notify_changed = base.clone();
        notify_changed.notifications_enabled = true;

        let sig = base.snapshot().unwrap().signature();
        assert_ne!(sig, city_changed.snapshot().unwrap().signature());
        assert_eq!(sig, notify_changed.snapshot().unwrap().signature());
    }

    #[test]
    fn test_empty_and_default_bounds_share_signature() {
        let typed = form("0", "99999", &[]).snapshot().unwrap();
        let empty = form("", "", &[]).snapshot().unwrap();
        assert_eq!(typed.signature(), empty.signature());
    }

    #[test]
    fn test_add_remove_city_case_insensitive() {
        let mut form = SettingsForm::default();
        assert!(form.add_city("Utrecht"));
        assert!(!form.add_city("utrecht"));
        assert!(form.remove_city("UTRECHT"));
        assert!(form.cities.is_empty());
    }

    #[test]
    fn test_form_deserializes_numbers_and_text() {
        let form: SettingsForm = toml::from_str(
            r#"
min_price = 800
max_price = "1500"
cities = ["utrecht"]
"#,
        )
        .unwrap();
        assert_eq!(form.min_price, "800");
        assert_eq!(form.max_price, "1500");
        assert_eq!(form.min_sqm, "");
    }

    proptest! {
        #[test]
        fn prop_signature_is_order_independent(
            cities in prop::collection::vec("[a-z]{1,6}", 0..6),
            agencies in prop::collection::vec("[a-z]{1,6}", 0..6),
            seed in any::<u64>(),
        ) {
            let mut shuffled_cities = cities.clone();
            let mut shuffled_agencies = agencies.clone();
            let len = shuffled_cities.len();
            if len > 1 {
                shuffled_cities.rotate_left((seed as usize) % len);
            }
            shuffled_agencies.reverse();

            let a = SettingsForm { cities, agencies, ..Default::default() };
            let b = SettingsForm {
                cities: shuffled_cities,
                agencies: shuffled_agencies,
                ..Default::default()
            };
            prop_assert_eq!(a.snapshot().unwrap().signature(), b.snapshot().unwrap().signature());
        }
    }
}
