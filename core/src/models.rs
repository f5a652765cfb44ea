use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NibbleError;

/// Reserved nutrition type holding a food's reference quantity in grams.
pub const MASS_TYPE: &str = "mass";

/// Upper bound the editing surface applies to a logged portion.
pub const MAX_GRAMS: f64 = 1000.0;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static ITEM_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w").expect("item name pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryKind {
    Food,
    Nutrient,
}

impl DictionaryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Nutrient => "nutrient",
        }
    }
}

impl fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DictionaryKind {
    type Err = NibbleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" | "foods" => Ok(Self::Food),
            "nutrient" | "nutrients" => Ok(Self::Nutrient),
            _ => Err(NibbleError::UnknownDictionaryKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub item: String,
    #[serde(rename = "type")]
    pub kind: DictionaryKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodLogEntry {
    pub food: String,
    pub grams: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionEntry {
    pub food: String,
    #[serde(rename = "type")]
    pub nutrient_type: String,
    pub value: f64,
}

// --- Edit batches ---
//
// Rows coming from an editing surface may be half filled in. The store keeps
// only the complete ones.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodLogRow {
    #[serde(default)]
    pub food: Option<String>,
    #[serde(default)]
    pub grams: Option<f64>,
}

impl FoodLogRow {
    #[must_use]
    pub fn new(food: &str, grams: f64) -> Self {
        Self {
            food: Some(food.to_string()),
            grams: Some(grams),
        }
    }

    /// The `(food, grams)` pair, or `None` when a field is missing.
    #[must_use]
    pub fn complete(&self) -> Option<(&str, f64)> {
        let food = non_blank(self.food.as_deref())?;
        let grams = self.grams.filter(|g| g.is_finite())?;
        Some((food, grams))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionRow {
    #[serde(rename = "type", default)]
    pub nutrient_type: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl NutritionRow {
    #[must_use]
    pub fn new(nutrient_type: &str, value: f64) -> Self {
        Self {
            nutrient_type: Some(nutrient_type.to_string()),
            value: Some(value),
        }
    }

    #[must_use]
    pub fn complete(&self) -> Option<(&str, f64)> {
        let nutrient_type = non_blank(self.nutrient_type.as_deref())?;
        let value = self.value.filter(|v| v.is_finite())?;
        Some((nutrient_type, value))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// --- Nutrient report ---

/// Why a logged entry has no computable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassIssue {
    /// The food's mass row is zero (or negative), so there is nothing to divide by.
    ZeroMass,
    /// The food has the nutrient but no mass row.
    MissingMass,
}

impl fmt::Display for MassIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroMass => f.write_str("mass reference is zero"),
            Self::MissingMass => f.write_str("no mass reference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientAmount {
    pub food: String,
    pub date: NaiveDate,
    pub grams: f64,
    /// `None` when the food's mass reference is unusable.
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<MassIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyNutrientTotal {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodNutrientTotal {
    pub food: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedFood {
    pub food: String,
    pub issue: MassIssue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientReport {
    pub nutrient: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entries: Vec<NutrientAmount>,
    pub by_date: Vec<DailyNutrientTotal>,
    pub by_food: Vec<FoodNutrientTotal>,
    pub flagged: Vec<FlaggedFood>,
}

impl NutrientReport {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.by_date.iter().map(|d| d.amount).sum()
    }
}

/// Names stored in the log or nutrition table that the dictionary does not know.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrphanReport {
    pub log_foods: Vec<String>,
    pub nutrition_foods: Vec<String>,
    pub nutrition_types: Vec<String>,
}

impl OrphanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log_foods.is_empty() && self.nutrition_foods.is_empty() && self.nutrition_types.is_empty()
    }
}

/// `grams / mass * value`, or the reason it cannot be computed.
pub fn nutrient_amount(grams: f64, mass: Option<f64>, value: f64) -> Result<f64, MassIssue> {
    match mass {
        None => Err(MassIssue::MissingMass),
        Some(m) if m.is_nan() || m <= 0.0 => Err(MassIssue::ZeroMass),
        Some(m) => Ok(grams / m * value),
    }
}

// --- Editing surface constraints ---

/// Trim a dictionary item name and check it contains a word character.
///
/// Blank names return `Ok(None)` so the row is dropped rather than rejected.
pub fn validate_item_name(name: &str) -> Result<Option<String>, NibbleError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !ITEM_NAME_PATTERN.is_match(trimmed) {
        return Err(NibbleError::InvalidItemName(trimmed.to_string()));
    }
    Ok(Some(trimmed.to_string()))
}

#[must_use]
pub fn clamp_grams(grams: f64) -> f64 {
    grams.clamp(0.0, MAX_GRAMS)
}

#[must_use]
pub fn clamp_value(value: f64) -> f64 {
    value.max(0.0)
}

pub fn parse_date(s: &str) -> Result<NaiveDate, NibbleError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| NibbleError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_kind_parse() {
        assert_eq!("food".parse::<DictionaryKind>().unwrap(), DictionaryKind::Food);
        assert_eq!(
            "Nutrients".parse::<DictionaryKind>().unwrap(),
            DictionaryKind::Nutrient
        );
        assert!("drink".parse::<DictionaryKind>().is_err());
        assert_eq!(DictionaryKind::Nutrient.to_string(), "nutrient");
    }

    #[test]
    fn test_food_log_row_complete() {
        assert_eq!(
            FoodLogRow::new("apple", 150.0).complete(),
            Some(("apple", 150.0))
        );
        let missing_grams = FoodLogRow {
            food: Some("apple".to_string()),
            grams: None,
        };
        assert!(missing_grams.complete().is_none());
        let blank_food = FoodLogRow {
            food: Some("   ".to_string()),
            grams: Some(10.0),
        };
        assert!(blank_food.complete().is_none());
        assert!(FoodLogRow::default().complete().is_none());
    }

    #[test]
    fn test_nutrition_row_deserializes_type_field() {
        let row: NutritionRow = serde_json::from_str(r#"{"type": "calories", "value": 52}"#).unwrap();
        assert_eq!(row.complete(), Some(("calories", 52.0)));

        let partial: NutritionRow = serde_json::from_str(r#"{"type": "calories"}"#).unwrap();
        assert!(partial.complete().is_none());
    }

    #[test]
    fn test_nutrient_amount() {
        let amount = nutrient_amount(150.0, Some(100.0), 52.0).unwrap();
        assert!((amount - 78.0).abs() < 1e-9);
        assert_eq!(
            nutrient_amount(200.0, Some(0.0), 10.0),
            Err(MassIssue::ZeroMass)
        );
        assert_eq!(nutrient_amount(200.0, None, 10.0), Err(MassIssue::MissingMass));
    }

    #[test]
    fn test_validate_item_name() {
        assert_eq!(
            validate_item_name("  apple ").unwrap(),
            Some("apple".to_string())
        );
        assert_eq!(validate_item_name("   ").unwrap(), None);
        assert!(matches!(
            validate_item_name("!!!"),
            Err(NibbleError::InvalidItemName(_))
        ));
        assert_eq!(
            validate_item_name("vitamin-c").unwrap(),
            Some("vitamin-c".to_string())
        );
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_grams(-5.0), 0.0);
        assert_eq!(clamp_grams(2500.0), MAX_GRAMS);
        assert_eq!(clamp_grams(150.0), 150.0);
        assert_eq!(clamp_value(-1.0), 0.0);
        assert_eq!(clamp_value(3.5), 3.5);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(matches!(
            parse_date("01/01/2024"),
            Err(NibbleError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_report_serializes_undefined_amount_as_null() {
        let entry = NutrientAmount {
            food: "water".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            grams: 200.0,
            amount: None,
            issue: Some(MassIssue::ZeroMass),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["amount"].is_null());
        assert_eq!(json["issue"], "zero_mass");
        assert_eq!(json["date"], "2024-01-01");
    }
}
