use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    contains_ignore_case, ledger, new_id, BalanceAccount, BankError, BankStore, Customer,
    CustomerPatch, DepositDraft, DepositOutcome, DepositTransaction, DocId, LedgerEntry,
    NewCustomer, NewUser, Result, Session, SessionRotation, StockLevel, TransactionFilter, User,
    WasteType, WasteTypePatch, Withdrawal, WithdrawalDraft,
};

pub const DUPLICATE_PHONE: &str = "A customer with this phone number already exists.";

/// How long a deposit's `Idempotency-Key` is remembered.
pub const IDEMPOTENCY_KEY_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub transaction_id: DocId,
    pub created_at: DateTime<Utc>,
}

/// Every collection the bank keeps. This is also the snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BankData {
    pub users: BTreeMap<DocId, User>,
    pub sessions: BTreeMap<DocId, Session>,
    pub customers: BTreeMap<DocId, Customer>,
    pub waste_types: BTreeMap<DocId, WasteType>,
    pub transactions: Vec<DepositTransaction>,
    pub withdrawals: Vec<Withdrawal>,
    pub balances: BTreeMap<String, BalanceAccount>,
    pub stock_grams: BTreeMap<DocId, u64>,
    pub idempotency_keys: BTreeMap<String, IdempotencyRecord>,
}

impl BankData {
    fn phone_taken(&self, phone: &str, except: Option<&str>) -> bool {
        self.customers
            .values()
            .any(|c| c.phone_number == phone && Some(c.id.as_str()) != except)
    }

    fn waste_name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.waste_types
            .values()
            .any(|w| w.name.eq_ignore_ascii_case(name) && Some(w.id.as_str()) != except)
    }

    fn stock_level(&self, waste_type: &WasteType) -> StockLevel {
        let grams = self.stock_grams.get(&waste_type.id).copied().unwrap_or(0);
        StockLevel {
            waste_type_id: waste_type.id.clone(),
            name: waste_type.name.clone(),
            quantity_kg: ledger::grams_to_kg(grams),
        }
    }

    fn balance_of(&self, name: &str) -> i64 {
        self.balances.get(name).map_or(0, |acc| acc.total_balance)
    }

    fn idempotency_cutoff() -> DateTime<Utc> {
        Utc::now() - chrono::Duration::hours(IDEMPOTENCY_KEY_TTL_HOURS)
    }

    fn replay(&self, key: &str) -> Option<DepositOutcome> {
        let record = self
            .idempotency_keys
            .get(key)
            .filter(|r| r.created_at > Self::idempotency_cutoff())?;
        let transaction = self
            .transactions
            .iter()
            .find(|tx| tx.id == record.transaction_id)?
            .clone();
        let balance = self.balance_of(&transaction.name);
        Some(DepositOutcome {
            transaction,
            balance,
            replayed: true,
        })
    }

    fn apply_deposit(&mut self, draft: DepositDraft) -> Result<DepositOutcome> {
        if let Some(outcome) = draft.idempotency_key.as_deref().and_then(|k| self.replay(k)) {
            return Ok(outcome);
        }

        let (priced, grams, total) =
            ledger::price_entries(&draft.entries, |id| self.waste_types.get(id))?;

        // Compute every new value before touching any collection.
        let balance = ledger::credit(self.balance_of(&draft.name), total)?;
        let mut stock_updates: BTreeMap<DocId, u64> = BTreeMap::new();
        for (line, weight) in priced.iter().zip(&grams) {
            let current = stock_updates
                .get(&line.waste_type_id)
                .or_else(|| self.stock_grams.get(&line.waste_type_id))
                .copied()
                .unwrap_or(0);
            let next = current
                .checked_add(*weight)
                .ok_or_else(|| BankError::Storage("stock overflow".into()))?;
            stock_updates.insert(line.waste_type_id.clone(), next);
        }

        let now = Utc::now();
        let transaction = DepositTransaction {
            id: new_id(),
            name: draft.name.clone(),
            date: draft.date,
            deposits: priced,
            total_balance: total,
            created_at: now,
        };

        self.stock_grams.extend(stock_updates);
        self.balances.insert(
            draft.name.clone(),
            BalanceAccount {
                name: draft.name,
                total_balance: balance,
                updated_at: now,
            },
        );
        let cutoff = Self::idempotency_cutoff();
        self.idempotency_keys.retain(|_, r| r.created_at > cutoff);
        if let Some(key) = draft.idempotency_key {
            self.idempotency_keys.insert(
                key,
                IdempotencyRecord {
                    transaction_id: transaction.id.clone(),
                    created_at: now,
                },
            );
        }
        self.transactions.push(transaction.clone());

        Ok(DepositOutcome {
            transaction,
            balance,
            replayed: false,
        })
    }

    fn apply_withdrawal(&mut self, draft: WithdrawalDraft) -> Result<Withdrawal> {
        let account = self
            .balances
            .get_mut(&draft.name)
            .ok_or_else(|| BankError::not_found(format!("No balance found for {}.", draft.name)))?;

        let balance_after = ledger::debit(account.total_balance, draft.amount)?;
        let now = Utc::now();
        account.total_balance = balance_after;
        account.updated_at = now;

        let withdrawal = Withdrawal {
            id: new_id(),
            name: draft.name,
            date: draft.date,
            amount: draft.amount,
            balance_after,
            created_at: now,
        };
        self.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }
}

/// In-process [`BankStore`].
///
/// A single write lock serializes every mutation. When a snapshot path is
/// configured, mutations run against a copy that replaces the live data only
/// after the snapshot has been written, so memory and disk never disagree.
pub struct MemoryStore {
    data: RwLock<BankData>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BankData::default()),
            snapshot_path: None,
        }
    }

    /// Opens a snapshot-backed store, loading the snapshot when it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let data: BankData = serde_json::from_slice(&bytes)?;
                info!(
                    path = %path.display(),
                    customers = data.customers.len(),
                    transactions = data.transactions.len(),
                    "Loaded bank snapshot"
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No snapshot found, starting empty");
                BankData::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            data: RwLock::new(data),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    async fn read<T>(&self, f: impl FnOnce(&BankData) -> T) -> T {
        let guard = self.data.read().await;
        f(&*guard)
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut BankData) -> Result<T>) -> Result<T> {
        self.mutate_tracked(|data| f(data).map(|out| (out, true))).await
    }

    /// Like `mutate`, but `f` also reports whether it changed anything.
    /// Unchanged data is not written to the snapshot.
    async fn mutate_tracked<T>(
        &self,
        f: impl FnOnce(&mut BankData) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut guard = self.data.write().await;
        match &self.snapshot_path {
            None => f(&mut *guard).map(|(out, _)| out),
            Some(path) => {
                let mut next = guard.clone();
                let (out, changed) = f(&mut next)?;
                if changed {
                    write_snapshot(path, &next).await?;
                    *guard = next;
                }
                Ok(out)
            }
        }
    }
}

async fn write_snapshot(path: &Path, data: &BankData) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
    Ok(())
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl BankStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        self.mutate(|data| {
            if data.users.values().any(|u| u.username == user.username) {
                return Err(BankError::conflict("Username already taken."));
            }
            let user = User {
                id: new_id(),
                email: user.email,
                username: user.username,
                password_hash: user.password_hash,
                created_at: Utc::now(),
            };
            data.users.insert(user.id.clone(), user.clone());
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read(|data| data.users.get(id).cloned()).await)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .read(|data| data.users.values().find(|u| u.username == username).cloned())
            .await)
    }

    async fn insert_session(&self, session: Session) -> Result<()> {
        self.mutate(|data| {
            let now = Utc::now();
            data.sessions.retain(|_, s| !s.revoked && s.expires_at > now);
            data.sessions.insert(session.id.clone(), session);
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.read(|data| data.sessions.get(id).cloned()).await)
    }

    async fn rotate_session(
        &self,
        id: &str,
        presented_jti: &str,
        next_jti: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRotation> {
        self.mutate_tracked(|data| {
            let Some(session) = data.sessions.get_mut(id) else {
                return Ok((SessionRotation::Inactive, false));
            };
            if session.revoked || session.expires_at <= Utc::now() {
                return Ok((SessionRotation::Inactive, false));
            }
            if session.refresh_jti != presented_jti {
                session.revoked = true;
                return Ok((SessionRotation::Reused, true));
            }
            session.refresh_jti = next_jti;
            session.expires_at = expires_at;
            Ok((SessionRotation::Rotated, true))
        })
        .await
    }

    async fn revoke_session(&self, id: &str) -> Result<bool> {
        self.mutate_tracked(|data| {
            let revoked = match data.sessions.get_mut(id) {
                Some(session) if !session.revoked => {
                    session.revoked = true;
                    true
                }
                _ => false,
            };
            Ok((revoked, revoked))
        })
        .await
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer> {
        self.mutate(|data| {
            if data.phone_taken(&customer.phone_number, None) {
                return Err(BankError::validation(DUPLICATE_PHONE));
            }
            let customer = Customer {
                id: new_id(),
                name: customer.name,
                phone_number: customer.phone_number,
                address: customer.address,
                email: customer.email,
                created_at: Utc::now(),
            };
            data.customers.insert(customer.id.clone(), customer.clone());
            Ok(customer)
        })
        .await
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let customers: Vec<Customer> =
            self.read(|data| data.customers.values().cloned().collect()).await;
        Ok(sorted_by(customers, |c: &Customer| c.created_at))
    }

    async fn get_customer(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self.read(|data| data.customers.get(id).cloned()).await)
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        let matches: Vec<Customer> = self
            .read(|data| {
                data.customers
                    .values()
                    .filter(|c| c.name.trim().eq_ignore_ascii_case(name.trim()))
                    .cloned()
                    .collect()
            })
            .await;
        Ok(sorted_by(matches, |c: &Customer| c.created_at).into_iter().next())
    }

    async fn search_customers(&self, query: &str) -> Result<Vec<Customer>> {
        let found: Vec<Customer> = self
            .read(|data| {
                data.customers
                    .values()
                    .filter(|c| {
                        contains_ignore_case(&c.name, query) || c.phone_number.contains(query)
                    })
                    .cloned()
                    .collect()
            })
            .await;
        Ok(sorted_by(found, |c: &Customer| c.created_at))
    }

    async fn update_customer(&self, id: &str, patch: CustomerPatch) -> Result<Option<Customer>> {
        self.mutate_tracked(|data| {
            if let Some(phone) = &patch.phone_number {
                if data.customers.contains_key(id) && data.phone_taken(phone, Some(id)) {
                    return Err(BankError::validation(DUPLICATE_PHONE));
                }
            }
            let Some(customer) = data.customers.get_mut(id) else {
                return Ok((None, false));
            };
            if let Some(name) = patch.name {
                customer.name = name;
            }
            if let Some(phone) = patch.phone_number {
                customer.phone_number = phone;
            }
            if let Some(address) = patch.address {
                customer.address = address;
            }
            if let Some(email) = patch.email {
                customer.email = Some(email);
            }
            Ok((Some(customer.clone()), true))
        })
        .await
    }

    async fn delete_customer(&self, id: &str) -> Result<bool> {
        self.mutate_tracked(|data| {
            let removed = data.customers.remove(id).is_some();
            Ok((removed, removed))
        })
        .await
    }

    async fn insert_waste_type(&self, name: String, price_per_kg: i64) -> Result<WasteType> {
        self.mutate(|data| {
            if price_per_kg <= 0 {
                return Err(BankError::validation("Price per kg must be a positive number."));
            }
            if data.waste_name_taken(&name, None) {
                return Err(BankError::conflict("A waste type with this name already exists."));
            }
            let waste_type = WasteType {
                id: new_id(),
                name,
                price_per_kg,
            };
            data.stock_grams.insert(waste_type.id.clone(), 0);
            data.waste_types.insert(waste_type.id.clone(), waste_type.clone());
            Ok(waste_type)
        })
        .await
    }

    async fn list_waste_types(&self) -> Result<Vec<WasteType>> {
        let items: Vec<WasteType> =
            self.read(|data| data.waste_types.values().cloned().collect()).await;
        Ok(sorted_by(items, |w: &WasteType| w.name.to_lowercase()))
    }

    async fn get_waste_type(&self, id: &str) -> Result<Option<WasteType>> {
        Ok(self.read(|data| data.waste_types.get(id).cloned()).await)
    }

    async fn search_waste_types(&self, query: &str) -> Result<Vec<WasteType>> {
        let items: Vec<WasteType> = self
            .read(|data| {
                data.waste_types
                    .values()
                    .filter(|w| contains_ignore_case(&w.name, query))
                    .cloned()
                    .collect()
            })
            .await;
        Ok(sorted_by(items, |w: &WasteType| w.name.to_lowercase()))
    }

    async fn update_waste_type(&self, id: &str, patch: WasteTypePatch) -> Result<Option<WasteType>> {
        self.mutate_tracked(|data| {
            if patch.price_per_kg.is_some_and(|p| p <= 0) {
                return Err(BankError::validation("Price per kg must be a positive number."));
            }
            if let Some(name) = &patch.name {
                if data.waste_types.contains_key(id) && data.waste_name_taken(name, Some(id)) {
                    return Err(BankError::conflict("A waste type with this name already exists."));
                }
            }
            let Some(waste_type) = data.waste_types.get_mut(id) else {
                return Ok((None, false));
            };
            if let Some(name) = patch.name {
                waste_type.name = name;
            }
            if let Some(price) = patch.price_per_kg {
                waste_type.price_per_kg = price;
            }
            Ok((Some(waste_type.clone()), true))
        })
        .await
    }

    async fn delete_waste_type(&self, id: &str) -> Result<bool> {
        self.mutate_tracked(|data| {
            if !data.waste_types.contains_key(id) {
                return Ok((false, false));
            }
            if data.stock_grams.get(id).copied().unwrap_or(0) > 0 {
                return Err(BankError::conflict("Waste type still has stock on hand."));
            }
            data.waste_types.remove(id);
            data.stock_grams.remove(id);
            Ok((true, true))
        })
        .await
    }

    async fn record_deposit(&self, draft: DepositDraft) -> Result<DepositOutcome> {
        self.mutate_tracked(|data| {
            let outcome = data.apply_deposit(draft)?;
            let changed = !outcome.replayed;
            Ok((outcome, changed))
        })
        .await
    }

    async fn list_deposits(&self, filter: &TransactionFilter) -> Result<Vec<DepositTransaction>> {
        Ok(self
            .read(|data| {
                data.transactions
                    .iter()
                    .filter(|tx| filter.matches(tx))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn get_deposit(&self, id: &str) -> Result<Option<DepositTransaction>> {
        Ok(self
            .read(|data| data.transactions.iter().find(|tx| tx.id == id).cloned())
            .await)
    }

    async fn record_withdrawal(&self, draft: WithdrawalDraft) -> Result<Withdrawal> {
        self.mutate(|data| data.apply_withdrawal(draft)).await
    }

    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        Ok(self.read(|data| data.withdrawals.clone()).await)
    }

    async fn list_balances(&self) -> Result<Vec<BalanceAccount>> {
        Ok(self.read(|data| data.balances.values().cloned().collect()).await)
    }

    async fn get_balance(&self, name: &str) -> Result<Option<BalanceAccount>> {
        Ok(self.read(|data| data.balances.get(name).cloned()).await)
    }

    async fn ledger_history(&self, name: &str) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self
            .read(|data| {
                let deposits = data
                    .transactions
                    .iter()
                    .filter(|tx| tx.name == name)
                    .cloned()
                    .map(LedgerEntry::Deposit);
                let withdrawals = data
                    .withdrawals
                    .iter()
                    .filter(|w| w.name == name)
                    .cloned()
                    .map(LedgerEntry::Withdrawal);
                deposits.chain(withdrawals).collect()
            })
            .await;
        Ok(sorted_by(entries, LedgerEntry::created_at))
    }

    async fn list_stock(&self) -> Result<Vec<StockLevel>> {
        let levels: Vec<StockLevel> = self
            .read(|data| {
                data.waste_types
                    .values()
                    .map(|w| data.stock_level(w))
                    .collect()
            })
            .await;
        Ok(sorted_by(levels, |s: &StockLevel| s.name.to_lowercase()))
    }

    async fn remove_stock(&self, waste_type_id: &str, amount_kg: f64) -> Result<StockLevel> {
        self.mutate(|data| {
            let waste_type = data.waste_types.get(waste_type_id).cloned().ok_or_else(|| {
                BankError::not_found(format!("Waste type with ID {waste_type_id} not found."))
            })?;
            let requested = ledger::kg_to_grams(amount_kg)
                .ok_or_else(|| BankError::validation("Invalid stock amount."))?;
            let available = data.stock_grams.get(waste_type_id).copied().unwrap_or(0);
            let remaining = ledger::remove_stock(available, requested)?;
            data.stock_grams.insert(waste_type_id.to_string(), remaining);
            Ok(data.stock_level(&waste_type))
        })
        .await
    }
}
