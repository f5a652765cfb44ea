use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nibble_core::models::{MASS_TYPE, NutritionEntry};
use nibble_core::service::NibbleService;

use super::helpers::{format_amount, parse_nutrition_pair};

fn print_nutrition_table(entries: &[NutritionEntry], with_food: bool) {
    #[derive(Tabled)]
    struct FoodNutritionRow {
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Type")]
        nutrient_type: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    #[derive(Tabled)]
    struct NutritionRow {
        #[tabled(rename = "Type")]
        nutrient_type: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let table = if with_food {
        let rows: Vec<FoodNutritionRow> = entries
            .iter()
            .map(|e| FoodNutritionRow {
                food: e.food.clone(),
                nutrient_type: e.nutrient_type.clone(),
                value: format_amount(e.value),
            })
            .collect();
        Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
            .to_string()
    } else {
        let rows: Vec<NutritionRow> = entries
            .iter()
            .map(|e| NutritionRow {
                nutrient_type: e.nutrient_type.clone(),
                value: format_amount(e.value),
            })
            .collect();
        Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string()
    };
    println!("{table}");
}

pub(crate) fn cmd_nutrition_show(svc: &NibbleService, food: &str, json: bool) -> Result<()> {
    let entries = svc.get_nutrition(food)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No nutrition information for '{food}'");
        return Ok(());
    }

    println!("=== {food} ===");
    print_nutrition_table(&entries, false);
    if !entries.iter().any(|e| e.nutrient_type == MASS_TYPE) {
        eprintln!("Note: no 'mass' row, so '{food}' is left out of nutrient reports");
    }
    Ok(())
}

pub(crate) fn cmd_nutrition_list(svc: &NibbleService, json: bool) -> Result<()> {
    let entries = svc.list_nutrition()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("Nutrition table is empty");
        return Ok(());
    }

    print_nutrition_table(&entries, true);
    Ok(())
}

/// Replace all rows of `food` with `pairs` (`type=value`).
pub(crate) fn cmd_nutrition_set(
    svc: &NibbleService,
    food: &str,
    pairs: &[String],
    json: bool,
) -> Result<()> {
    let rows = pairs
        .iter()
        .map(|p| parse_nutrition_pair(p))
        .collect::<Result<Vec<_>>>()?;

    let allowed = svc.nutrition_type_options()?;
    for row in &rows {
        if let Some(t) = row.nutrient_type.as_deref() {
            if !allowed.iter().any(|a| a == t.trim()) {
                eprintln!("Note: '{}' is not in the nutrient dictionary", t.trim());
            }
        }
    }

    let entries = svc.submit_nutrition(food, &rows)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        let count = entries.len();
        println!("Saved {count} nutrition rows for {food}");
        if !entries.is_empty() {
            print_nutrition_table(&entries, false);
        }
    }
    Ok(())
}
