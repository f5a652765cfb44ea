use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nibble_core::models::FoodLogEntry;
use nibble_core::service::NibbleService;

use super::helpers::{date_arg, format_amount, parse_log_pair};

fn print_log_table(entries: &[FoodLogEntry]) {
    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Grams")]
        grams: String,
    }

    let rows: Vec<LogRow> = entries
        .iter()
        .map(|e| LogRow {
            food: e.food.clone(),
            grams: format_amount(e.grams),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_log_show(svc: &NibbleService, date: Option<&str>, json: bool) -> Result<()> {
    let date = date_arg(date)?;
    let entries = svc.get_log(&date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries for {date}");
        return Ok(());
    }

    println!("=== {date} ===");
    print_log_table(&entries);
    Ok(())
}

/// Replace the log for a date with `pairs` (`food=grams`).
pub(crate) fn cmd_log_set(
    svc: &NibbleService,
    date: Option<&str>,
    pairs: &[String],
    json: bool,
) -> Result<()> {
    let date = date_arg(date)?;
    let rows = pairs
        .iter()
        .map(|p| parse_log_pair(p))
        .collect::<Result<Vec<_>>>()?;

    let known = svc.food_options()?;
    for row in &rows {
        if let Some(food) = row.food.as_deref() {
            if !known.iter().any(|k| k == food.trim()) {
                eprintln!("Note: '{}' is not in the food dictionary", food.trim());
            }
        }
    }

    let entries = svc.submit_log(&date, &rows)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("Cleared log for {date}");
    } else {
        let count = entries.len();
        println!("Saved {count} entries for {date}");
        print_log_table(&entries);
    }
    Ok(())
}
