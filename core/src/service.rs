use std::path::Path;

use anyhow::Result;
use chrono::{Duration, NaiveDate};

use crate::db::Database;
use crate::error::NibbleError;
use crate::models::{
    DictionaryEntry, DictionaryKind, FoodLogEntry, FoodLogRow, MASS_TYPE, NutrientReport,
    NutritionEntry, NutritionRow, OrphanReport, clamp_grams, clamp_value, parse_date,
    validate_item_name,
};
use crate::users::{UserResolver, open_user_database, require_user};

/// Length of the report window when the caller gives no dates.
pub const DEFAULT_REPORT_DAYS: i64 = 30;

/// The editing surface over one user's store.
///
/// Each `submit_*` call is the commit of an edited table: it applies the
/// surface constraints (name pattern, grams and value clamps) and replaces
/// the whole scope in one step.
pub struct NibbleService {
    db: Database,
}

impl NibbleService {
    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Resolve `token` and open that user's store under `data_dir`.
    pub fn for_user(
        data_dir: &Path,
        resolver: &dyn UserResolver,
        token: Option<&str>,
    ) -> Result<Self> {
        let name = require_user(resolver, token)?;
        let db = open_user_database(data_dir, &name)?;
        Ok(Self { db })
    }

    // --- Dictionary ---

    pub fn list_items(&self, kind: &str) -> Result<Vec<String>> {
        let kind: DictionaryKind = kind.parse()?;
        self.db.list_items(kind)
    }

    pub fn list_dictionary(&self) -> Result<Vec<DictionaryEntry>> {
        self.db.list_dictionary()
    }

    pub fn submit_items(&self, kind: &str, items: &[String]) -> Result<Vec<String>> {
        let kind: DictionaryKind = kind.parse()?;
        let mut names = Vec::with_capacity(items.len());
        for item in items {
            if let Some(name) = validate_item_name(item)? {
                names.push(name);
            }
        }
        self.db.replace_items(kind, &names)?;
        self.db.list_items(kind)
    }

    // --- Food log ---

    pub fn get_log(&self, date: &str) -> Result<Vec<FoodLogEntry>> {
        let date = parse_date(date)?;
        self.db.get_entries(date)
    }

    pub fn submit_log(&self, date: &str, rows: &[FoodLogRow]) -> Result<Vec<FoodLogEntry>> {
        let date = parse_date(date)?;
        let rows: Vec<FoodLogRow> = rows
            .iter()
            .map(|row| FoodLogRow {
                food: row.food.as_ref().map(|f| f.trim().to_string()),
                grams: row.grams.map(clamp_grams),
            })
            .collect();
        self.db.replace_entries(date, &rows)?;
        self.db.get_entries(date)
    }

    // --- Nutrition ---

    pub fn get_nutrition(&self, food: &str) -> Result<Vec<NutritionEntry>> {
        self.db.get_for_food(food.trim())
    }

    pub fn list_nutrition(&self) -> Result<Vec<NutritionEntry>> {
        self.db.list_nutrition()
    }

    pub fn submit_nutrition(&self, food: &str, rows: &[NutritionRow]) -> Result<Vec<NutritionEntry>> {
        let food = validate_item_name(food)?
            .ok_or_else(|| NibbleError::InvalidItemName(food.to_string()))?;
        let rows: Vec<NutritionRow> = rows
            .iter()
            .map(|row| NutritionRow {
                nutrient_type: row.nutrient_type.as_ref().map(|t| t.trim().to_string()),
                value: row.value.map(clamp_value),
            })
            .collect();
        self.db.replace_for_food(&food, &rows)?;
        self.db.get_for_food(&food)
    }

    // --- Selection lists ---

    pub fn food_options(&self) -> Result<Vec<String>> {
        self.db.list_items(DictionaryKind::Food)
    }

    /// Nutrient names plus the reserved `mass` row type.
    pub fn nutrition_type_options(&self) -> Result<Vec<String>> {
        let mut options = self.db.list_items(DictionaryKind::Nutrient)?;
        if !options.iter().any(|o| o == MASS_TYPE) {
            options.push(MASS_TYPE.to_string());
        }
        Ok(options)
    }

    pub fn report_nutrient_options(&self) -> Result<Vec<String>> {
        let mut options = self.db.list_items(DictionaryKind::Nutrient)?;
        options.retain(|o| o != MASS_TYPE);
        Ok(options)
    }

    // --- Report ---

    /// Nutrient report over `[start, end]`.
    ///
    /// With neither bound the window is the last `DEFAULT_REPORT_DAYS` days up
    /// to `today`. A single bound is an `EmptyDateRange` error.
    pub fn nutrient_report(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        nutrient: &str,
        today: NaiveDate,
    ) -> Result<NutrientReport> {
        let (start, end) = match (start, end) {
            (None, None) => (today - Duration::days(DEFAULT_REPORT_DAYS), today),
            (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
            _ => return Err(NibbleError::EmptyDateRange.into()),
        };
        self.db.nutrient_report(start, end, nutrient.trim())
    }

    pub fn orphaned_references(&self) -> Result<OrphanReport> {
        self.db.find_orphans()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_nibble_error;
    use crate::users::UserMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_submit_items_validates_names() {
        let svc = NibbleService::new_in_memory().unwrap();
        let saved = svc
            .submit_items("food", &strings(&[" apple ", "", "bread"]))
            .unwrap();
        assert_eq!(saved, vec!["apple", "bread"]);

        let err = svc
            .submit_items("food", &strings(&["apple", "???"]))
            .unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::InvalidItemName(_))
        ));
        // rejected batch leaves the previous set in place
        assert_eq!(svc.list_items("food").unwrap(), vec!["apple", "bread"]);
    }

    #[test]
    fn test_unknown_dictionary_kind() {
        let svc = NibbleService::new_in_memory().unwrap();
        let err = svc.list_items("drinks").unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::UnknownDictionaryKind(_))
        ));
    }

    #[test]
    fn test_submit_log_clamps_grams() {
        let svc = NibbleService::new_in_memory().unwrap();
        let saved = svc
            .submit_log(
                "2024-01-01",
                &[
                    FoodLogRow::new("apple", 1500.0),
                    FoodLogRow::new(" bread ", -3.0),
                    FoodLogRow {
                        food: Some("cheese".to_string()),
                        grams: None,
                    },
                ],
            )
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].grams, 1000.0);
        assert_eq!(saved[1].food, "bread");
        assert_eq!(saved[1].grams, 0.0);
    }

    #[test]
    fn test_submit_log_rejects_bad_date() {
        let svc = NibbleService::new_in_memory().unwrap();
        let err = svc.submit_log("yesterday-ish", &[]).unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_submit_nutrition_clamps_values() {
        let svc = NibbleService::new_in_memory().unwrap();
        let saved = svc
            .submit_nutrition(
                "apple",
                &[
                    NutritionRow::new("mass", 100.0),
                    NutritionRow::new("fat", -1.0),
                ],
            )
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].value, 0.0);

        assert!(svc.submit_nutrition("  ", &[]).is_err());
    }

    #[test]
    fn test_option_lists() {
        let svc = NibbleService::new_in_memory().unwrap();
        svc.submit_items("food", &strings(&["apple"])).unwrap();
        svc.submit_items("nutrient", &strings(&["calories", "mass", "protein"]))
            .unwrap();

        assert_eq!(svc.food_options().unwrap(), vec!["apple"]);
        assert_eq!(
            svc.report_nutrient_options().unwrap(),
            vec!["calories", "protein"]
        );
        assert_eq!(
            svc.nutrition_type_options().unwrap(),
            vec!["calories", "mass", "protein"]
        );

        svc.submit_items("nutrient", &strings(&["fiber"])).unwrap();
        assert_eq!(svc.nutrition_type_options().unwrap(), vec!["fiber", "mass"]);
    }

    #[test]
    fn test_report_requires_both_bounds() {
        let svc = NibbleService::new_in_memory().unwrap();
        let err = svc
            .nutrient_report(Some("2024-01-01"), None, "calories", today())
            .unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::EmptyDateRange)
        ));
        let err = svc
            .nutrient_report(None, Some("2024-01-01"), "calories", today())
            .unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::EmptyDateRange)
        ));
    }

    #[test]
    fn test_report_default_window() {
        let svc = NibbleService::new_in_memory().unwrap();
        svc.submit_nutrition(
            "apple",
            &[
                NutritionRow::new("mass", 100.0),
                NutritionRow::new("calories", 52.0),
            ],
        )
        .unwrap();
        svc.submit_log("2024-01-01", &[FoodLogRow::new("apple", 100.0)])
            .unwrap();
        svc.submit_log("2023-12-01", &[FoodLogRow::new("apple", 100.0)])
            .unwrap();

        let report = svc.nutrient_report(None, None, "calories", today()).unwrap();
        assert_eq!(report.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(report.end, today());
        assert_eq!(report.entries.len(), 1);
        assert!((report.total() - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_for_user_rejects_unknown_token() {
        let dir = tempfile::tempdir().unwrap();
        let users = UserMap::from_pairs([("tok", "alice")]);

        let err = NibbleService::for_user(dir.path(), &users, Some("bad"))
            .err()
            .unwrap();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::InvalidUser)
        ));

        let svc = NibbleService::for_user(dir.path(), &users, Some("tok")).unwrap();
        svc.submit_items("food", &strings(&["apple"])).unwrap();
        let again = NibbleService::for_user(dir.path(), &users, Some("tok")).unwrap();
        assert_eq!(again.food_options().unwrap(), vec!["apple"]);
    }
}
