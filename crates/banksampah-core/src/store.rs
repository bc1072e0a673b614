use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    BalanceAccount, Customer, CustomerPatch, DepositDraft, DepositOutcome, DepositTransaction,
    LedgerEntry, NewCustomer, NewUser, Result, Session, SessionRotation, StockLevel,
    TransactionFilter, User, WasteType, WasteTypePatch, Withdrawal, WithdrawalDraft,
};

/// Document store behind the HTTP layer.
///
/// Operations that touch more than one document (deposits, withdrawals,
/// stock removal, session rotation) must be atomic: either every document
/// changes or none does.
#[async_trait]
pub trait BankStore: Send + Sync {
    // Users and sessions
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn get_user(&self, id: &str) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn insert_session(&self, session: Session) -> Result<()>;
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;
    /// Swaps the session's refresh jti from `presented_jti` to `next_jti`.
    async fn rotate_session(
        &self,
        id: &str,
        presented_jti: &str,
        next_jti: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRotation>;
    async fn revoke_session(&self, id: &str) -> Result<bool>;

    // Customers
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer>;
    async fn list_customers(&self) -> Result<Vec<Customer>>;
    async fn get_customer(&self, id: &str) -> Result<Option<Customer>>;
    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>>;
    async fn search_customers(&self, query: &str) -> Result<Vec<Customer>>;
    async fn update_customer(&self, id: &str, patch: CustomerPatch) -> Result<Option<Customer>>;
    async fn delete_customer(&self, id: &str) -> Result<bool>;

    // Waste catalog
    async fn insert_waste_type(&self, name: String, price_per_kg: i64) -> Result<WasteType>;
    async fn list_waste_types(&self) -> Result<Vec<WasteType>>;
    async fn get_waste_type(&self, id: &str) -> Result<Option<WasteType>>;
    async fn search_waste_types(&self, query: &str) -> Result<Vec<WasteType>>;
    async fn update_waste_type(&self, id: &str, patch: WasteTypePatch) -> Result<Option<WasteType>>;
    async fn delete_waste_type(&self, id: &str) -> Result<bool>;

    // Deposits and withdrawals
    async fn record_deposit(&self, draft: DepositDraft) -> Result<DepositOutcome>;
    async fn list_deposits(&self, filter: &TransactionFilter) -> Result<Vec<DepositTransaction>>;
    async fn get_deposit(&self, id: &str) -> Result<Option<DepositTransaction>>;
    async fn record_withdrawal(&self, draft: WithdrawalDraft) -> Result<Withdrawal>;
    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>>;

    // Ledger and stock
    async fn list_balances(&self) -> Result<Vec<BalanceAccount>>;
    async fn get_balance(&self, name: &str) -> Result<Option<BalanceAccount>>;
    async fn ledger_history(&self, name: &str) -> Result<Vec<LedgerEntry>>;
    async fn list_stock(&self) -> Result<Vec<StockLevel>>;
    async fn remove_stock(&self, waste_type_id: &str, amount_kg: f64) -> Result<StockLevel>;
}
