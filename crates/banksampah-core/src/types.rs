use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document identifier. Generated ids are 32 lowercase hex chars.
pub type DocId = String;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn new_id() -> DocId {
    Uuid::new_v4().simple().to_string()
}

/// Staff account allowed to operate the bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Refresh-token session. `refresh_jti` is the only refresh token id that
/// may be exchanged; anything older is treated as reuse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: DocId,
    pub user_id: DocId,
    pub refresh_jti: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRotation {
    Rotated,
    /// The presented jti is stale; the session has been revoked.
    Reused,
    Inactive,
}

/// Nasabah.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: DocId,
    pub name: String,
    pub phone_number: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.email.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WasteType {
    pub id: DocId,
    pub name: String,
    /// Rupiah per kilogram.
    pub price_per_kg: i64,
}

#[derive(Debug, Clone, Default)]
pub struct WasteTypePatch {
    pub name: Option<String>,
    pub price_per_kg: Option<i64>,
}

/// One weighed line of a deposit as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepositEntry {
    pub waste_type_id: DocId,
    /// Kilograms.
    pub amount: f64,
}

/// A deposit line after pricing against the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricedEntry {
    pub waste_type_id: DocId,
    pub waste_type_name: String,
    pub amount: f64,
    pub price_per_kg: i64,
    pub subtotal: i64,
}

#[derive(Debug, Clone)]
pub struct DepositDraft {
    pub name: String,
    pub date: NaiveDate,
    pub entries: Vec<DepositEntry>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepositTransaction {
    pub id: DocId,
    pub name: String,
    pub date: NaiveDate,
    pub deposits: Vec<PricedEntry>,
    pub total_balance: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub transaction: DepositTransaction,
    /// Balance of the depositor's account after this deposit.
    pub balance: i64,
    /// True when an idempotency key matched an earlier deposit.
    pub replayed: bool,
}

/// Ledger account, one per depositor name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAccount {
    pub name: String,
    pub total_balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalDraft {
    pub name: String,
    pub date: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: DocId,
    pub name: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LedgerEntry {
    Deposit(DepositTransaction),
    Withdrawal(Withdrawal),
}

impl LedgerEntry {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEntry::Deposit(tx) => tx.created_at,
            LedgerEntry::Withdrawal(w) => w.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub name: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &DepositTransaction) -> bool {
        if let Some(name) = &self.name {
            if !contains_ignore_case(&tx.name, name) {
                return false;
            }
        }
        if self.from.is_some_and(|from| tx.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.date > to) {
            return false;
        }
        true
    }
}

/// On-hand quantity of one waste type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub waste_type_id: DocId,
    pub name: String,
    pub quantity_kg: f64,
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
