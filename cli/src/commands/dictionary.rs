use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use nibble_core::service::NibbleService;

pub(crate) fn cmd_dict_list(svc: &NibbleService, kind: Option<&str>, json: bool) -> Result<()> {
    let Some(kind) = kind else {
        return print_dictionary(svc, json);
    };
    let items = svc.list_items(kind)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        eprintln!("No {kind} items yet");
        return Ok(());
    }

    for item in &items {
        println!("{item}");
    }
    Ok(())
}

fn print_dictionary(svc: &NibbleService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DictionaryRow {
        #[tabled(rename = "Item")]
        item: String,
        #[tabled(rename = "Type")]
        kind: String,
    }

    let entries = svc.list_dictionary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("Dictionary is empty");
        return Ok(());
    }

    let rows: Vec<DictionaryRow> = entries
        .into_iter()
        .map(|e| DictionaryRow {
            item: e.item,
            kind: e.kind.to_string(),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

/// Replace every item of `kind` with `items`.
pub(crate) fn cmd_dict_set(
    svc: &NibbleService,
    kind: &str,
    items: &[String],
    json: bool,
) -> Result<()> {
    let saved = svc.submit_items(kind, items)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        let count = saved.len();
        println!("Saved {count} {kind} items");
    }
    Ok(())
}

pub(crate) fn cmd_dict_check(svc: &NibbleService, json: bool) -> Result<()> {
    let orphans = svc.orphaned_references()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&orphans)?);
        return Ok(());
    }

    if orphans.is_empty() {
        println!("Every logged food and nutrition type is in the dictionary");
        return Ok(());
    }

    let sections = [
        ("Logged foods missing from dictionary", &orphans.log_foods),
        ("Nutrition foods missing from dictionary", &orphans.nutrition_foods),
        ("Nutrition types missing from dictionary", &orphans.nutrition_types),
    ];
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        println!("{title}:");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}
