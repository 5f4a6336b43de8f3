// src/providers/csv_table.rs
//! Date-indexed CSV downloads (FRED graph export, CBOE ratio files).
//!
//! Quirks handled here: disclaimer lines before the header row, a UTF-8 BOM,
//! `.`/empty/`NA` for missing values, `m/d/Y` as well as ISO dates, and
//! trailing footer lines that carry no date.

use chrono::NaiveDate;

use super::ProviderError;
use crate::series::{Column, Table};

const DATE_HEADERS: [&str; 3] = ["date", "observation_date", "trade_date"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

pub fn parse_table(text: &str) -> Result<Table, ProviderError> {
    if text.trim().is_empty() {
        return Ok(Table::default());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut table = Table::default();
    let mut in_body = false;
    for record in reader.records() {
        let record = record.map_err(|e| ProviderError::Malformed(format!("csv: {e}")))?;
        if !in_body {
            if record.get(0).is_some_and(is_date_header) {
                table.columns = record.iter().skip(1).map(|n| Column::new(n, Vec::new())).collect();
                in_body = true;
            }
            continue;
        }
        let Some(date) = record.get(0).and_then(parse_date) else {
            continue;
        };
        table.dates.push(date);
        for (i, col) in table.columns.iter_mut().enumerate() {
            col.values.push(record.get(i + 1).and_then(parse_value));
        }
    }

    if !in_body {
        return Err(ProviderError::Malformed("no date header row".into()));
    }
    Ok(table)
}

fn is_date_header(cell: &str) -> bool {
    let cell = cell.trim_start_matches('\u{feff}').trim();
    DATE_HEADERS.iter().any(|h| cell.eq_ignore_ascii_case(h))
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(cell, f).ok())
}

fn parse_value(cell: &str) -> Option<f64> {
    match cell {
        "" | "." | "NA" | "N/A" => None,
        s => s.replace(',', "").parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fred_graph_export() {
        let text = "observation_date,BAMLH0A0HYM2\n2024-08-13,3.12\n2024-08-14,.\n2024-08-15,3.05\n";
        let t = parse_table(text).unwrap();
        assert_eq!(t.dates.len(), 3);
        assert_eq!(t.columns.len(), 1);
        assert_eq!(t.columns[0].name, "BAMLH0A0HYM2");
        assert_eq!(t.columns[0].values, vec![Some(3.12), None, Some(3.05)]);
    }

    #[test]
    fn cboe_preamble_and_us_dates() {
        let text = "\
Data provided for informational purposes only,,,,
Products: Total Exchange Volume,,,,
DATE,CALLS,PUTS,TOTAL,P/C Ratio
11/1/2006,\"1,000\",900,1900,0.90
11/2/2006,1200,1020,2220,0.85
";
        let t = parse_table(text).unwrap();
        assert_eq!(t.dates, vec![
            NaiveDate::from_ymd_opt(2006, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2006, 11, 2).unwrap(),
        ]);
        let ratio = t.column("P/C Ratio").unwrap();
        assert_eq!(ratio.values, vec![Some(0.90), Some(0.85)]);
        assert_eq!(t.column("CALLS").unwrap().values[0], Some(1000.0));
    }

    #[test]
    fn bom_header_is_recognised() {
        let t = parse_table("\u{feff}DATE,VALUE\n2024-01-02,1.5\n").unwrap();
        assert_eq!(t.dates.len(), 1);
    }

    #[test]
    fn blank_body_is_empty_not_error() {
        assert_eq!(parse_table("  \n").unwrap(), Table::default());
    }

    #[test]
    fn missing_header_is_malformed() {
        assert!(matches!(parse_table("<html>rate limited</html>"), Err(ProviderError::Malformed(_))));
    }
}
