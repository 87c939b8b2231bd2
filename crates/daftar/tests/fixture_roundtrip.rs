//! Full pipeline over file fixtures: load CSV/JSON inputs, run the engine,
//! write reports, validate the ledger.

use daftar::report;
use daftar_engine::{Engine, QuarterStatus};
use daftar_validate::{has_critical, validate, ValidationInput};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const PRODUCTS_CSV: &str = "\
customs_declaration_no,item_description,shipment_class,import_date,qty_imported,unit_cost_ex_vat,unit_price_ex_vat,margin_pct
10233004466,Rice 5kg,NONEXC_INSPECTION,2023-12-01,500000,8.00,10.00,
10233004467,Tea 100g,NONEXC_OUTSIDE,2023-12-01,500000,0.50,1.00,
10233004468,Matches,NONEXC_OUTSIDE,2023-12-01,500000,0.05,0.05,
10233004469,Energy drink 24pk,EXC_INSPECTION,2023-12-01,100000,20.00,30.00,
";

const CUSTOMERS_CSV: &str = "\
client_name,vat_number,address_line,amount_inc_vat,purchase_date
Al Noor Trading,0301234567800003,Riyadh,23000.00,2024-03-12
";

const HOLIDAYS_CSV: &str = "\
holiday_date,name
2024-02-22,Founding Day
";

const TARGETS_JSON: &str = r#"[{
    "label": "Q1-2024",
    "period_start": "2024-01-01",
    "period_end": "2024-03-31",
    "sales_ex_vat": "120000.00",
    "vat_amount": "18000.00",
    "sales_inc_vat": "138000.00",
    "strict": true
}]"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn fixtures_generate_validate_and_report() {
    let dir = TempDir::new().unwrap();
    let products = write(dir.path(), "products.csv", PRODUCTS_CSV);
    let customers = write(dir.path(), "customers.csv", CUSTOMERS_CSV);
    let holidays = write(dir.path(), "holidays.csv", HOLIDAYS_CSV);
    let targets = write(dir.path(), "targets.json", TARGETS_JSON);

    let lots = daftar_loader::read_products(&products).unwrap();
    let roster = daftar_loader::read_customers(&customers).unwrap();
    let holiday_dates = daftar_loader::read_holidays(&holidays).unwrap();
    let quarter_targets = daftar_loader::read_targets(&targets).unwrap();

    let cfg = daftar_engine::EngineConfig::default();
    let mut engine = Engine::new(
        cfg.clone(),
        lots,
        roster,
        holiday_dates.clone(),
        quarter_targets.clone(),
    )
    .unwrap();
    let ledger = engine.run();

    // Strict quarter aligned, holiday respected
    assert_eq!(ledger.summary.quarters[0].status, QuarterStatus::Aligned);
    assert!(ledger
        .invoices
        .iter()
        .all(|i| i.date() != holiday_dates[0]));

    // Validator battery reports no critical findings
    let holiday_set: HashSet<chrono::NaiveDate> = holiday_dates.into_iter().collect();
    let findings = validate(&ValidationInput {
        invoices: &ledger.invoices,
        store: engine.store(),
        targets: &quarter_targets,
        holidays: &holiday_set,
        vat_rate: cfg.vat_rate,
        strict_tolerance: cfg.alignment_strict_tolerance,
        loose_band: cfg.alignment_loose_tolerance,
    });
    assert!(!has_critical(&findings), "critical findings: {findings:?}");

    // Reports land on disk with the expected shapes
    let out = dir.path().join("reports");
    fs::create_dir_all(&out).unwrap();
    report::write_all(&out, &ledger, &cfg).unwrap();

    let headers = fs::read_to_string(out.join("invoice_headers.csv")).unwrap();
    assert!(headers.starts_with("invoice_number,invoice_datetime,invoice_type"));
    // One data row per invoice
    assert_eq!(headers.lines().count(), ledger.invoices.len() + 1);
    // Simplified invoices carry a QR payload, tax invoices do not
    for (invoice, row) in ledger.invoices.iter().zip(headers.lines().skip(1)) {
        let qr = row.split(',').nth(8).unwrap_or("");
        match invoice.kind {
            daftar_core::InvoiceKind::Simplified => assert!(!qr.is_empty()),
            daftar_core::InvoiceKind::Tax => assert!(qr.is_empty()),
        }
    }

    let lines = fs::read_to_string(out.join("invoice_lines.csv")).unwrap();
    let line_rows = lines.lines().count() - 1;
    let expected: usize = ledger.invoices.iter().map(|i| i.lines.len()).sum();
    assert_eq!(line_rows, expected);

    let summary = fs::read_to_string(out.join("quarterly_summary.csv")).unwrap();
    assert!(summary.contains("Q1-2024"));
    assert!(summary.contains("Aligned"));

    let excise = fs::read_to_string(out.join("excise_invoices.csv")).unwrap();
    assert!(excise.starts_with("invoice_number,"));
}
