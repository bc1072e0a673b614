//! Balance and stock arithmetic.
//!
//! Everything here is pure so the store can run it while holding its write
//! lock: a deposit is priced, the ledger credited and the stock increased in
//! one step, or nothing changes at all.

use crate::{BankError, DepositEntry, PricedEntry, Result, WasteType};

const GRAMS_PER_KG: f64 = 1000.0;

pub const INVALID_ENTRY: &str = "Invalid deposit entry.";

/// Converts a submitted weight to whole grams. Weights that round to zero
/// grams are rejected along with non-finite and non-positive ones.
pub fn kg_to_grams(amount_kg: f64) -> Option<u64> {
    if !amount_kg.is_finite() || amount_kg <= 0.0 {
        return None;
    }
    let grams = (amount_kg * GRAMS_PER_KG).round();
    if grams < 1.0 || grams > u64::MAX as f64 {
        return None;
    }
    Some(grams as u64)
}

pub fn grams_to_kg(grams: u64) -> f64 {
    grams as f64 / GRAMS_PER_KG
}

/// Value of `amount_kg` of waste at `price_per_kg`, rounded to the nearest rupiah.
pub fn subtotal(price_per_kg: i64, amount_kg: f64) -> Result<i64> {
    let value = (price_per_kg as f64 * amount_kg).round();
    if !value.is_finite() || value > i64::MAX as f64 {
        return Err(BankError::validation(INVALID_ENTRY));
    }
    Ok(value as i64)
}

/// Prices every entry against the catalog, in submission order.
///
/// The first malformed entry fails with a validation error, the first
/// unknown waste type with not-found. Returns the priced lines, the weight of
/// each line in grams and the deposit total.
pub fn price_entries<'a, F>(
    entries: &[DepositEntry],
    lookup: F,
) -> Result<(Vec<PricedEntry>, Vec<u64>, i64)>
where
    F: Fn(&str) -> Option<&'a WasteType>,
{
    if entries.is_empty() {
        return Err(BankError::validation(
            "Name, date, and at least one deposit entry are required.",
        ));
    }

    let mut priced = Vec::with_capacity(entries.len());
    let mut grams = Vec::with_capacity(entries.len());
    let mut total: i64 = 0;

    for entry in entries {
        let id = entry.waste_type_id.trim();
        if id.is_empty() {
            return Err(BankError::validation(INVALID_ENTRY));
        }
        let weight = kg_to_grams(entry.amount).ok_or_else(|| BankError::validation(INVALID_ENTRY))?;

        let waste_type = lookup(id)
            .ok_or_else(|| BankError::not_found(format!("Waste type with ID {id} not found.")))?;

        let value = subtotal(waste_type.price_per_kg, entry.amount)?;
        total = credit(total, value)?;

        grams.push(weight);
        priced.push(PricedEntry {
            waste_type_id: waste_type.id.clone(),
            waste_type_name: waste_type.name.clone(),
            amount: entry.amount,
            price_per_kg: waste_type.price_per_kg,
            subtotal: value,
        });
    }

    Ok((priced, grams, total))
}

pub fn credit(balance: i64, amount: i64) -> Result<i64> {
    balance
        .checked_add(amount)
        .ok_or_else(|| BankError::Storage("balance overflow".into()))
}

pub fn debit(balance: i64, amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(BankError::validation("Withdrawal amount must be a positive number."));
    }
    if amount > balance {
        return Err(BankError::InsufficientBalance {
            available: balance,
            requested: amount,
        });
    }
    Ok(balance - amount)
}

pub fn remove_stock(available_grams: u64, requested_grams: u64) -> Result<u64> {
    available_grams
        .checked_sub(requested_grams)
        .ok_or(BankError::InsufficientStock {
            available_grams,
            requested_grams,
        })
}
