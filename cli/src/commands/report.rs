use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nibble_core::models::NutrientReport;
use nibble_core::service::NibbleService;

use super::helpers::{date_arg, format_amount};

pub(crate) fn cmd_report(
    svc: &NibbleService,
    from: Option<&str>,
    to: Option<&str>,
    nutrient: &str,
    json: bool,
) -> Result<()> {
    let from = from.map(|d| date_arg(Some(d))).transpose()?;
    let to = to.map(|d| date_arg(Some(d))).transpose()?;
    let today = Local::now().date_naive();
    let report = svc.nutrient_report(from.as_deref(), to.as_deref(), nutrient, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &NutrientReport) {
    #[derive(Tabled)]
    struct DailyRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Share")]
        share: String,
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Grams")]
        grams: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let nutrient = &report.nutrient;
    let start = report.start;
    let end = report.end;
    println!("=== {nutrient}: {start} to {end} ===\n");

    if report.entries.is_empty() {
        println!("No logged food with '{nutrient}' in this range");
        return;
    }

    println!("Daily {nutrient}");
    let daily: Vec<DailyRow> = report
        .by_date
        .iter()
        .map(|d| DailyRow {
            date: d.date.to_string(),
            amount: format_amount(d.amount),
        })
        .collect();
    let table = Table::new(&daily)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}\n");

    let total = report.total();
    println!("{nutrient} from food");
    let by_food: Vec<FoodRow> = report
        .by_food
        .iter()
        .map(|f| FoodRow {
            food: f.food.clone(),
            amount: format_amount(f.amount),
            share: if total > 0.0 {
                format!("{:.0}%", f.amount / total * 100.0)
            } else {
                "-".to_string()
            },
        })
        .collect();
    let table = Table::new(&by_food)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}\n");

    println!("Entries");
    let entries: Vec<EntryRow> = report
        .entries
        .iter()
        .map(|e| EntryRow {
            date: e.date.to_string(),
            food: e.food.clone(),
            grams: format_amount(e.grams),
            amount: e.amount.map_or_else(|| "undefined".to_string(), format_amount),
        })
        .collect();
    let table = Table::new(&entries)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total = format_amount(total);
    println!("\n  TOTAL: {total}");

    for flagged in &report.flagged {
        let food = &flagged.food;
        let issue = flagged.issue;
        eprintln!("Warning: '{food}' left out of totals ({issue})");
    }
}
