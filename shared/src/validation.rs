//! Validation utilities for the Retail POS platform
//!
//! Includes Thailand-specific validations for phone numbers printed on
//! receipts and delivery slips.

use rust_decimal::Decimal;

// ============================================================================
// Inventory and Pricing Validations
// ============================================================================

/// Largest quantity a single order or stock-in line may carry
pub const MAX_LINE_QUANTITY: i32 = 1_000_000;

/// Validate a money amount that may be zero (prices, fees, discounts)
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a money amount that must be strictly positive
pub fn validate_positive_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than 0");
    }
    Ok(())
}

/// Sum of `price * quantity` over the given lines, `None` when the total
/// does not fit a `Decimal`
pub fn line_total<'a, I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (&'a Decimal, i32)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, (price, quantity)| {
            price.checked_mul(Decimal::from(quantity))?.checked_add(acc)
        })
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate branch/category/product code format (2-20 uppercase alphanumeric, `-` allowed)
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Code must be at least 2 characters");
    }
    if code.len() > 20 {
        return Err("Code must be at most 20 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate barcode (EAN-8, UPC-A, EAN-13 or GTIN-14 digits)
pub fn validate_barcode(barcode: &str) -> Result<(), &'static str> {
    if !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err("Barcode must contain digits only");
    }
    match barcode.len() {
        8 | 12 | 13 | 14 => Ok(()),
        _ => Err("Barcode must be 8, 12, 13 or 14 digits"),
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

// ============================================================================
// Thailand-Specific Validations
// ============================================================================

/// Validate Thai phone number format
/// Accepts: 0812345678, 081-234-5678, 021234567, +66812345678
pub fn validate_thai_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // Mobile: 10 digits starting with 0
    if digits.len() == 10 && digits.starts_with('0') {
        return Ok(());
    }
    // Bangkok landline: 9 digits starting with 02
    if digits.len() == 9 && digits.starts_with("02") {
        return Ok(());
    }
    // International format with country code: 11 digits starting with 66
    if digits.len() == 11 && digits.starts_with("66") {
        return Ok(());
    }

    Err("Invalid Thai phone number format")
}
