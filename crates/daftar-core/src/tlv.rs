//! TLV/Base64 QR payload for simplified invoices.
//!
//! The payload is the concatenation of five tag-length-value fields
//! (1: seller name, 2: seller VAT number, 3: ISO timestamp, 4: VAT amount,
//! 5: total inc VAT), Base64-encoded. Values are UTF-8; lengths are byte
//! lengths, capped at 255 per field.

use crate::party::Seller;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Append one TLV field, truncating the value at 255 bytes on a char
/// boundary.
fn push_field(buf: &mut Vec<u8>, tag: u8, value: &str) {
    let mut bytes = value.as_bytes();
    if bytes.len() > 255 {
        let mut cut = 255;
        while cut > 0 && !value.is_char_boundary(cut) {
            cut -= 1;
        }
        bytes = &bytes[..cut];
    }
    buf.push(tag);
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
}

/// Build the Base64 TLV payload for a simplified invoice.
#[must_use]
pub fn qr_payload(
    seller: &Seller,
    issued_at: NaiveDateTime,
    vat_amount: Decimal,
    total_inc_vat: Decimal,
) -> String {
    let mut buf = Vec::new();
    push_field(&mut buf, 1, &seller.name);
    push_field(&mut buf, 2, &seller.vat_number);
    push_field(&mut buf, 3, &issued_at.format("%Y-%m-%dT%H:%M:%S").to_string());
    push_field(&mut buf, 4, &vat_amount.to_string());
    push_field(&mut buf, 5, &total_inc_vat.to_string());
    BASE64.encode(buf)
}
