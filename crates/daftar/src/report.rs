//! CSV report writers: invoice headers, invoice lines, quarterly summary,
//! and the excise-invoice listing.

use anyhow::{Context, Result};
use daftar_core::tlv::qr_payload;
use daftar_core::{Classification, Invoice, InvoiceKind};
use daftar_engine::{EngineConfig, Ledger};
use std::path::Path;

/// Write all four report files into `dir`.
pub fn write_all(dir: &Path, ledger: &Ledger, cfg: &EngineConfig) -> Result<()> {
    write_headers(&dir.join("invoice_headers.csv"), ledger, cfg)?;
    write_lines(&dir.join("invoice_lines.csv"), ledger)?;
    write_quarterly_summary(&dir.join("quarterly_summary.csv"), ledger)?;
    write_excise_listing(&dir.join("excise_invoices.csv"), ledger)?;
    Ok(())
}

fn number(invoice: &Invoice) -> String {
    invoice.number.clone().unwrap_or_default()
}

fn timestamp(invoice: &Invoice) -> String {
    invoice.issued_at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_headers(path: &Path, ledger: &Ledger, cfg: &EngineConfig) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "invoice_number",
        "invoice_datetime",
        "invoice_type",
        "client_name",
        "client_vat_number",
        "total_ex_vat",
        "vat_amount",
        "total_inc_vat",
        "qr_payload",
        "excise",
    ])?;
    for invoice in &ledger.invoices {
        let qr = match invoice.kind {
            InvoiceKind::Simplified => qr_payload(
                &cfg.seller,
                invoice.issued_at,
                invoice.vat_amount,
                invoice.total,
            ),
            InvoiceKind::Tax => String::new(),
        };
        writer.write_record([
            number(invoice),
            timestamp(invoice),
            invoice.kind.to_string(),
            invoice.buyer.name().to_string(),
            invoice.buyer.vat_number().unwrap_or("").to_string(),
            invoice.subtotal.to_string(),
            invoice.vat_amount.to_string(),
            invoice.total.to_string(),
            qr,
            u8::from(invoice.has_excise_line()).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_lines(path: &Path, ledger: &Ledger) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "invoice_number",
        "line_no",
        "lot_id",
        "item_description",
        "classification",
        "quantity",
        "unit_price_ex_vat",
        "line_subtotal",
    ])?;
    for invoice in &ledger.invoices {
        for (line_no, line) in invoice.lines.iter().enumerate() {
            writer.write_record([
                number(invoice),
                (line_no + 1).to_string(),
                line.lot_id.clone(),
                line.item_description.clone(),
                line.classification.to_string(),
                line.quantity.to_string(),
                line.unit_price_ex_vat.to_string(),
                line.line_subtotal.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_quarterly_summary(path: &Path, ledger: &Ledger) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "quarter",
        "strict",
        "status",
        "invoices",
        "tax_invoices",
        "simplified_invoices",
        "line_items",
        "target_inc_vat",
        "actual_inc_vat",
        "variance",
        "coverage_ratio",
        "deferred_purchases",
        "balancing_invoice_used",
    ])?;
    for quarter in &ledger.summary.quarters {
        writer.write_record([
            quarter.label.clone(),
            u8::from(quarter.strict).to_string(),
            format!("{:?}", quarter.status),
            quarter.invoices.to_string(),
            quarter.tax_invoices.to_string(),
            quarter.simplified_invoices.to_string(),
            quarter.line_items.to_string(),
            quarter.target_inc_vat.to_string(),
            quarter.actual_inc_vat.to_string(),
            quarter.variance.to_string(),
            quarter.coverage_ratio.to_string(),
            quarter.deferred_purchases.to_string(),
            u8::from(quarter.balancing_invoice_used).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_excise_listing(path: &Path, ledger: &Ledger) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "invoice_number",
        "invoice_datetime",
        "lot_id",
        "item_description",
        "quantity",
        "total_inc_vat",
    ])?;
    for invoice in &ledger.invoices {
        for line in &invoice.lines {
            if line.classification != Classification::ExcInspection {
                continue;
            }
            writer.write_record([
                number(invoice),
                timestamp(invoice),
                line.lot_id.clone(),
                line.item_description.clone(),
                line.quantity.to_string(),
                invoice.total.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
