use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use nibble_core::models::{DATE_FORMAT, FoodLogRow, NutritionRow};

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Like `parse_date`, rendered back as `YYYY-MM-DD` for the service layer.
pub(crate) fn date_arg(date_str: Option<&str>) -> Result<String> {
    Ok(parse_date(date_str)?.format(DATE_FORMAT).to_string())
}

/// Split `name=number`, splitting on the last `=` so names may contain one.
fn split_pair<'a>(s: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    let Some((name, number)) = s.rsplit_once('=') else {
        bail!("Invalid {what} '{s}'. Use name=number");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid {what} '{s}': name is empty");
    }
    Ok((name, number.trim()))
}

/// Parse `apple=150` or `apple=150g` into a log row.
pub(crate) fn parse_log_pair(s: &str) -> Result<FoodLogRow> {
    let (food, grams) = split_pair(s, "log entry")?;
    let grams: f64 = grams
        .trim_end_matches('g')
        .trim()
        .parse()
        .with_context(|| format!("Invalid grams in '{s}'. Use a number like '150' or '150g'"))?;
    Ok(FoodLogRow::new(food, grams))
}

/// Parse `calories=52` into a nutrition row.
pub(crate) fn parse_nutrition_pair(s: &str) -> Result<NutritionRow> {
    let (nutrient_type, value) = split_pair(s, "nutrition row")?;
    let value: f64 = value
        .parse()
        .with_context(|| format!("Invalid value in '{s}'"))?;
    Ok(NutritionRow::new(nutrient_type, value))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// Trim trailing zeros: `150` rather than `150.0`, `2.5` stays `2.5`.
pub(crate) fn format_amount(v: f64) -> String {
    let v = no_neg_zero(v);
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        let s = format!("{v:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today")).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday")).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow")).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_date_arg_iso() {
        assert_eq!(date_arg(Some("2024-01-15")).unwrap(), "2024-01-15");
        assert!(date_arg(Some("nope")).is_err());
    }

    #[test]
    fn test_parse_log_pair() {
        assert_eq!(
            parse_log_pair("apple=150").unwrap(),
            FoodLogRow::new("apple", 150.0)
        );
        assert_eq!(
            parse_log_pair("peanut butter = 30g").unwrap(),
            FoodLogRow::new("peanut butter", 30.0)
        );
        assert_eq!(
            parse_log_pair("a=b=2").unwrap(),
            FoodLogRow::new("a=b", 2.0)
        );
    }

    #[test]
    fn test_parse_log_pair_invalid() {
        assert!(parse_log_pair("apple").is_err());
        assert!(parse_log_pair("=150").is_err());
        assert!(parse_log_pair("apple=lots").is_err());
    }

    #[test]
    fn test_parse_nutrition_pair() {
        assert_eq!(
            parse_nutrition_pair("calories=52").unwrap(),
            NutritionRow::new("calories", 52.0)
        );
        assert!(parse_nutrition_pair("calories=").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(150.0), "150");
        assert_eq!(format_amount(2.5), "2.5");
        assert_eq!(format_amount(78.004), "78");
        assert_eq!(format_amount(-0.0), "0");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }
}
