//! Input readers: product catalog, customer roster, holidays, quarter
//! targets, and runtime configuration.
//!
//! Catalogs arrive as CSV with headered columns; targets and configuration
//! as JSON. Every shape problem is fatal before generation begins — the
//! engine only ever sees well-formed records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::NaiveDate;
use daftar_core::{Classification, Customer, Lot, QuarterTarget};
use daftar_engine::EngineConfig;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// A malformed or unreadable input.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Filesystem problem.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// CSV structure problem.
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    /// JSON structure problem.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// A row that parsed but does not make sense.
    #[error("{file} row {row}: {message}")]
    Shape {
        /// Which input file.
        file: String,
        /// 1-based data row number.
        row: usize,
        /// What was wrong.
        message: String,
    },
}

impl LoadError {
    fn shape(file: &str, row: usize, message: impl Into<String>) -> Self {
        Self::Shape {
            file: file.to_string(),
            row,
            message: message.into(),
        }
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    headers: &csv::StringRecord,
    name: &str,
    file: &str,
    row: usize,
) -> Result<&'a str, LoadError> {
    let idx = headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| LoadError::shape(file, row, format!("missing column {name}")))?;
    Ok(record.get(idx).unwrap_or("").trim())
}

fn optional_field<'a>(
    record: &'a csv::StringRecord,
    headers: &csv::StringRecord,
    name: &str,
) -> Option<&'a str> {
    let idx = headers.iter().position(|h| h.trim() == name)?;
    let value = record.get(idx)?.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_date(value: &str, file: &str, row: usize) -> Result<NaiveDate, LoadError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| LoadError::shape(file, row, format!("unparseable date {value:?}")))
}

fn parse_money(value: &str, file: &str, row: usize) -> Result<Decimal, LoadError> {
    Decimal::from_str(value)
        .map_err(|_| LoadError::shape(file, row, format!("unparseable amount {value:?}")))
}

/// Read the product catalog.
///
/// Columns: `customs_declaration_no`, `item_description`, `shipment_class`,
/// `import_date`, `qty_imported`, `unit_cost_ex_vat`, `unit_price_ex_vat`,
/// optional `margin_pct` (used to derive a price when the price column is
/// empty). Classification accepts the canonical tags or the Arabic labels.
pub fn read_products(path: &Path) -> Result<Vec<Lot>, LoadError> {
    let file = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut lots = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let declaration = field(&record, &headers, "customs_declaration_no", &file, row)?;
        let item = field(&record, &headers, "item_description", &file, row)?;
        if declaration.is_empty() || item.is_empty() {
            return Err(LoadError::shape(&file, row, "empty lot identity"));
        }
        let class_raw = field(&record, &headers, "shipment_class", &file, row)?;
        let classification = Classification::from_str(class_raw)
            .map_err(|e| LoadError::shape(&file, row, e))?;
        let import_date = parse_date(
            field(&record, &headers, "import_date", &file, row)?,
            &file,
            row,
        )?;
        let qty: u32 = field(&record, &headers, "qty_imported", &file, row)?
            .parse()
            .map_err(|_| LoadError::shape(&file, row, "unparseable qty_imported"))?;
        if qty == 0 {
            return Err(LoadError::shape(&file, row, "qty_imported is zero"));
        }
        let cost = parse_money(
            field(&record, &headers, "unit_cost_ex_vat", &file, row)?,
            &file,
            row,
        )?;

        // Price comes from the catalog; a missing price falls back to
        // cost x (1 + margin_pct / 100).
        let price = match optional_field(&record, &headers, "unit_price_ex_vat") {
            Some(raw) => parse_money(raw, &file, row)?,
            None => {
                let margin = match optional_field(&record, &headers, "margin_pct") {
                    Some(raw) => parse_money(raw, &file, row)?,
                    None => Decimal::from(15),
                };
                daftar_core::money::round2(cost * (Decimal::ONE + margin / Decimal::from(100)))
            }
        };

        lots.push(Lot::new(
            declaration,
            item,
            classification,
            import_date,
            qty,
            cost,
            price,
        ));
    }
    tracing::info!(file = %file, lots = lots.len(), "products loaded");
    Ok(lots)
}

/// Read the B2B customer roster.
///
/// Columns: `client_name`, `vat_number`, `address_line`, `amount_inc_vat`,
/// `purchase_date`. VAT numbers stay text so leading zeros survive.
pub fn read_customers(path: &Path) -> Result<Vec<Customer>, LoadError> {
    let file = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut customers = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let name = field(&record, &headers, "client_name", &file, row)?;
        if name.is_empty() {
            return Err(LoadError::shape(&file, row, "empty client_name"));
        }
        let amount = parse_money(
            field(&record, &headers, "amount_inc_vat", &file, row)?,
            &file,
            row,
        )?;
        if amount <= Decimal::ZERO {
            return Err(LoadError::shape(&file, row, "non-positive amount_inc_vat"));
        }
        customers.push(Customer {
            name: name.to_string(),
            vat_number: field(&record, &headers, "vat_number", &file, row)?.to_string(),
            address: field(&record, &headers, "address_line", &file, row)?.to_string(),
            purchase_amount_inc_vat: amount,
            purchase_date: parse_date(
                field(&record, &headers, "purchase_date", &file, row)?,
                &file,
                row,
            )?,
        });
    }
    tracing::info!(file = %file, customers = customers.len(), "customers loaded");
    Ok(customers)
}

/// Read the holiday calendar. Columns: `holiday_date`, `name`.
pub fn read_holidays(path: &Path) -> Result<Vec<NaiveDate>, LoadError> {
    let file = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut holidays = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        holidays.push(parse_date(
            field(&record, &headers, "holiday_date", &file, row)?,
            &file,
            row,
        )?);
    }
    tracing::info!(file = %file, holidays = holidays.len(), "holidays loaded");
    Ok(holidays)
}

/// Read quarter targets from a JSON array of [`QuarterTarget`] objects.
pub fn read_targets(path: &Path) -> Result<Vec<QuarterTarget>, LoadError> {
    let content = std::fs::read_to_string(path)?;
    let targets: Vec<QuarterTarget> = serde_json::from_str(&content)?;
    tracing::info!(file = %path.display(), quarters = targets.len(), "targets loaded");
    Ok(targets)
}

/// Read engine configuration from JSON; missing fields take their defaults.
pub fn read_config(path: &Path) -> Result<EngineConfig, LoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn products_round_trip() {
        let csv = "\
customs_declaration_no,item_description,shipment_class,import_date,qty_imported,unit_cost_ex_vat,unit_price_ex_vat,margin_pct
10233004466,Instant coffee 200g,NONEXC_INSPECTION,2024-01-10,500,8.00,10.00,
10233004467,Energy drink 24pk,محل الفحص سلع انتقائية,15/01/2024,200,20.00,30.00,
";
        let file = write_file(csv);
        let lots = read_products(file.path()).unwrap();
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].lot_id, "10233004466:Instant coffee 200g");
        assert_eq!(lots[0].unit_price_ex_vat, dec!(10.00));
        assert_eq!(lots[1].classification, Classification::ExcInspection);
        assert_eq!(
            lots[1].import_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn missing_price_derives_from_margin() {
        let csv = "\
customs_declaration_no,item_description,shipment_class,import_date,qty_imported,unit_cost_ex_vat,unit_price_ex_vat,margin_pct
D1,Tea,NONEXC_OUTSIDE,2024-01-10,100,10.00,,20
";
        let file = write_file(csv);
        let lots = read_products(file.path()).unwrap();
        assert_eq!(lots[0].unit_price_ex_vat, dec!(12.00));
    }

    #[test]
    fn bad_classification_is_fatal() {
        let csv = "\
customs_declaration_no,item_description,shipment_class,import_date,qty_imported,unit_cost_ex_vat,unit_price_ex_vat
D1,Tea,MYSTERY,2024-01-10,100,10.00,12.00
";
        let file = write_file(csv);
        assert!(matches!(
            read_products(file.path()),
            Err(LoadError::Shape { row: 1, .. })
        ));
    }

    #[test]
    fn customers_keep_leading_zeros() {
        let csv = "\
client_name,vat_number,address_line,amount_inc_vat,purchase_date
Al Noor Trading,0301234567800003,Riyadh,23000.00,2024-03-12
";
        let file = write_file(csv);
        let customers = read_customers(file.path()).unwrap();
        assert_eq!(customers[0].vat_number, "0301234567800003");
        assert_eq!(customers[0].purchase_amount_inc_vat, dec!(23000.00));
    }

    #[test]
    fn holidays_parse() {
        let csv = "\
holiday_date,name
2024-06-16,Eid al-Adha
2024-02-22,Founding Day
";
        let file = write_file(csv);
        let holidays = read_holidays(file.path()).unwrap();
        assert_eq!(holidays.len(), 2);
        assert_eq!(holidays[0], NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
    }

    #[test]
    fn targets_parse_from_json() {
        let json = r#"[{
            "label": "Q1-2024",
            "period_start": "2024-01-01",
            "period_end": "2024-03-31",
            "sales_ex_vat": "916376.73",
            "vat_amount": "137456.51",
            "sales_inc_vat": "1053833.24",
            "strict": true
        }]"#;
        let file = write_file(json);
        let targets = read_targets(file.path()).unwrap();
        assert_eq!(targets[0].label, "Q1-2024");
        assert_eq!(targets[0].sales_inc_vat, dec!(1053833.24));
        assert!(targets[0].strict);
    }

    #[test]
    fn config_overrides_merge_with_defaults() {
        let file = write_file(r#"{"random_seed": 1234}"#);
        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg.random_seed, 1234);
        assert_eq!(cfg.vat_rate, dec!(0.15));
    }
}
