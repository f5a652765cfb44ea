use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, ToSql, params};
use tracing::debug;

use crate::error::NibbleError;
use crate::models::{
    DATE_FORMAT, DailyNutrientTotal, DictionaryEntry, DictionaryKind, FlaggedFood, FoodLogEntry, FoodLogRow,
    FoodNutrientTotal, MASS_TYPE, NutrientAmount, NutrientReport, NutritionEntry, NutritionRow,
    OrphanReport, nutrient_amount,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| NibbleError::storage(path, e))?;
        let db = Database { conn };
        // A file that is not a database opens fine and only fails here.
        db.create_tables()
            .map_err(|e| NibbleError::storage(path, e))?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create the three tables if they are missing. Safe to call repeatedly.
    pub fn init_schema(&self) -> Result<()> {
        self.create_tables()?;
        Ok(())
    }

    fn create_tables(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS food (
                food TEXT,
                grams REAL,
                date DATE
            );

            CREATE TABLE IF NOT EXISTS nutrition (
                food TEXT,
                type TEXT,
                value REAL
            );

            CREATE TABLE IF NOT EXISTS dictionary (
                item TEXT,
                type TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_food_date ON food(date);
            CREATE INDEX IF NOT EXISTS idx_nutrition_food ON nutrition(food);
            CREATE INDEX IF NOT EXISTS idx_dictionary_type ON dictionary(type);",
        )
    }

    // --- Row mapping helpers ---

    fn date_from_sql(idx: usize, text: &str) -> rusqlite::Result<NaiveDate> {
        NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    // Expects columns: 0: food, 1: grams, 2: date
    fn food_log_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodLogEntry> {
        let date: String = row.get(2)?;
        Ok(FoodLogEntry {
            food: row.get(0)?,
            grams: row.get(1)?,
            date: Self::date_from_sql(2, &date)?,
        })
    }

    // Expects columns: 0: food, 1: type, 2: value
    fn nutrition_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<NutritionEntry> {
        Ok(NutritionEntry {
            food: row.get(0)?,
            nutrient_type: row.get(1)?,
            value: row.get(2)?,
        })
    }

    fn query_strings(&self, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map(args, |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }

    // --- Dictionary ---

    pub fn list_items(&self, kind: DictionaryKind) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT item FROM dictionary
             WHERE type = ?1 AND item IS NOT NULL
             ORDER BY rowid",
            params![kind.as_str()],
        )
    }

    /// Every dictionary item, foods first, each kind in storage order.
    pub fn list_dictionary(&self) -> Result<Vec<DictionaryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT item, type FROM dictionary
             WHERE item IS NOT NULL AND type IN ('food', 'nutrient')
             ORDER BY type, rowid",
        )?;
        let entries = stmt
            .query_map([], |row| {
                let kind: String = row.get(1)?;
                Ok(DictionaryEntry {
                    item: row.get(0)?,
                    kind: kind.parse().map_err(|e: NibbleError| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Replace every item of `kind` with `items`.
    ///
    /// Blank items are dropped and duplicates keep their first position.
    /// Returns the number of items written.
    pub fn replace_items(&self, kind: DictionaryKind, items: &[String]) -> Result<usize> {
        let mut seen = HashSet::new();
        let kept: Vec<&str> = items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .filter(|item| seen.insert(*item))
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM dictionary WHERE type = ?1", params![kind.as_str()])?;
        {
            let mut stmt = tx.prepare("INSERT INTO dictionary (item, type) VALUES (?1, ?2)")?;
            for item in &kept {
                stmt.execute(params![item, kind.as_str()])?;
            }
        }
        tx.commit()?;

        debug!(
            kind = %kind,
            written = kept.len(),
            dropped = items.len() - kept.len(),
            "replaced dictionary items"
        );
        Ok(kept.len())
    }

    // --- Food log ---

    pub fn get_entries(&self, date: NaiveDate) -> Result<Vec<FoodLogEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT food, grams, date FROM food
             WHERE date = ?1 AND food IS NOT NULL AND grams IS NOT NULL
             ORDER BY rowid",
        )?;
        let entries = stmt
            .query_map(params![date_str], Self::food_log_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Replace the whole log for `date`. Incomplete rows are dropped first.
    pub fn replace_entries(&self, date: NaiveDate, rows: &[FoodLogRow]) -> Result<usize> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let kept: Vec<(&str, f64)> = rows.iter().filter_map(FoodLogRow::complete).collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM food WHERE date = ?1", params![date_str])?;
        {
            let mut stmt = tx.prepare("INSERT INTO food (food, grams, date) VALUES (?1, ?2, ?3)")?;
            for (food, grams) in &kept {
                stmt.execute(params![food, grams, date_str])?;
            }
        }
        tx.commit()?;

        debug!(
            date = %date_str,
            written = kept.len(),
            dropped = rows.len() - kept.len(),
            "replaced food log"
        );
        Ok(kept.len())
    }

    // --- Nutrition ---

    pub fn get_for_food(&self, food: &str) -> Result<Vec<NutritionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT food, type, value FROM nutrition
             WHERE food = ?1 AND type IS NOT NULL AND value IS NOT NULL
             ORDER BY rowid",
        )?;
        let entries = stmt
            .query_map(params![food], Self::nutrition_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn list_nutrition(&self) -> Result<Vec<NutritionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT food, type, value FROM nutrition
             WHERE food IS NOT NULL AND type IS NOT NULL AND value IS NOT NULL
             ORDER BY rowid",
        )?;
        let entries = stmt
            .query_map([], Self::nutrition_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Replace every nutrition row of `food`. Incomplete rows are dropped first.
    pub fn replace_for_food(&self, food: &str, rows: &[NutritionRow]) -> Result<usize> {
        let kept: Vec<(&str, f64)> = rows.iter().filter_map(NutritionRow::complete).collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM nutrition WHERE food = ?1", params![food])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO nutrition (food, type, value) VALUES (?1, ?2, ?3)")?;
            for (nutrient_type, value) in &kept {
                stmt.execute(params![food, nutrient_type, value])?;
            }
        }
        tx.commit()?;

        debug!(
            food,
            written = kept.len(),
            dropped = rows.len() - kept.len(),
            "replaced nutrition rows"
        );
        Ok(kept.len())
    }

    // --- Derived nutrient report ---

    /// Amount of `nutrient` eaten per log entry, per day and per food in
    /// `[start, end]`.
    ///
    /// Log rows whose date SQLite cannot read as a day are skipped.
    /// Foods without a row for `nutrient` contribute nothing. Foods whose mass
    /// reference is zero or missing show up with an undefined amount and are
    /// listed in `flagged`; they are left out of both sums.
    pub fn nutrient_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        nutrient: &str,
    ) -> Result<NutrientReport> {
        if nutrient.trim() == MASS_TYPE {
            return Err(NibbleError::MassNotANutrient.into());
        }
        if start > end {
            return Err(NibbleError::InvalidDateRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            }
            .into());
        }

        let mut stmt = self.conn.prepare(
            "SELECT f.food, date(f.date) AS day, f.grams, n.value,
                    (SELECT m.value FROM nutrition m
                     WHERE m.food = f.food AND m.type = ?4 AND m.value IS NOT NULL
                     ORDER BY m.rowid LIMIT 1) AS mass
             FROM food f
             JOIN nutrition n ON n.food = f.food AND n.type = ?3
             WHERE date(f.date) >= ?1 AND date(f.date) <= ?2
               AND f.grams IS NOT NULL AND n.value IS NOT NULL
             ORDER BY date(f.date), f.rowid, n.rowid",
        )?;
        let rows = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string(),
                    nutrient,
                    MASS_TYPE,
                ],
                |row| {
                    let date: String = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        Self::date_from_sql(1, &date)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut by_food: BTreeMap<String, f64> = BTreeMap::new();
        let mut flagged: Vec<FlaggedFood> = Vec::new();

        for (food, date, grams, value, mass) in rows {
            match nutrient_amount(grams, mass, value) {
                Ok(amount) => {
                    *by_date.entry(date).or_default() += amount;
                    *by_food.entry(food.clone()).or_default() += amount;
                    entries.push(NutrientAmount {
                        food,
                        date,
                        grams,
                        amount: Some(amount),
                        issue: None,
                    });
                }
                Err(issue) => {
                    if !flagged.iter().any(|f| f.food == food) {
                        flagged.push(FlaggedFood {
                            food: food.clone(),
                            issue,
                        });
                    }
                    entries.push(NutrientAmount {
                        food,
                        date,
                        grams,
                        amount: None,
                        issue: Some(issue),
                    });
                }
            }
        }

        if !flagged.is_empty() {
            debug!(nutrient, flagged = flagged.len(), "foods with unusable mass reference");
        }

        Ok(NutrientReport {
            nutrient: nutrient.to_string(),
            start,
            end,
            entries,
            by_date: by_date
                .into_iter()
                .map(|(date, amount)| DailyNutrientTotal { date, amount })
                .collect(),
            by_food: by_food
                .into_iter()
                .map(|(food, amount)| FoodNutrientTotal { food, amount })
                .collect(),
            flagged,
        })
    }

    // --- Advisory references ---

    pub fn find_orphans(&self) -> Result<OrphanReport> {
        let log_foods = self.query_strings(
            "SELECT DISTINCT food FROM food
             WHERE food IS NOT NULL
               AND food NOT IN (SELECT item FROM dictionary WHERE type = 'food' AND item IS NOT NULL)
             ORDER BY food",
            params![],
        )?;
        let nutrition_foods = self.query_strings(
            "SELECT DISTINCT food FROM nutrition
             WHERE food IS NOT NULL
               AND food NOT IN (SELECT item FROM dictionary WHERE type = 'food' AND item IS NOT NULL)
             ORDER BY food",
            params![],
        )?;
        let nutrition_types = self.query_strings(
            "SELECT DISTINCT type FROM nutrition
             WHERE type IS NOT NULL AND type != ?1
               AND type NOT IN (SELECT item FROM dictionary WHERE type = 'nutrient' AND item IS NOT NULL)
             ORDER BY type",
            params![MASS_TYPE],
        )?;
        Ok(OrphanReport {
            log_foods,
            nutrition_foods,
            nutrition_types,
        })
    }
}
