//! Email receipts for deposits and withdrawals.
//!
//! Receipts are best effort. The HTTP layer spawns delivery after the
//! transaction is committed and only logs failures.

use std::{fmt::Write as _, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use crate::{BankError, DepositTransaction, MailConfig, Result, Withdrawal, DATE_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptLine {
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub to: String,
    pub customer_name: String,
    pub kind: ReceiptKind,
    pub reference_id: String,
    pub date: NaiveDate,
    pub lines: Vec<ReceiptLine>,
    pub total: i64,
    pub balance: i64,
}

impl Receipt {
    pub fn for_deposit(to: String, tx: &DepositTransaction, balance: i64) -> Self {
        let lines = tx
            .deposits
            .iter()
            .map(|line| ReceiptLine {
                description: format!(
                    "{} {} kg x Rp {}",
                    line.waste_type_name,
                    line.amount,
                    format_rupiah(line.price_per_kg)
                ),
                amount: line.subtotal,
            })
            .collect();

        Self {
            to,
            customer_name: tx.name.clone(),
            kind: ReceiptKind::Deposit,
            reference_id: tx.id.clone(),
            date: tx.date,
            lines,
            total: tx.total_balance,
            balance,
        }
    }

    pub fn for_withdrawal(to: String, withdrawal: &Withdrawal) -> Self {
        Self {
            to,
            customer_name: withdrawal.name.clone(),
            kind: ReceiptKind::Withdrawal,
            reference_id: withdrawal.id.clone(),
            date: withdrawal.date,
            lines: vec![ReceiptLine {
                description: "Penarikan saldo".to_string(),
                amount: withdrawal.amount,
            }],
            total: withdrawal.amount,
            balance: withdrawal.balance_after,
        }
    }

    pub fn subject(&self) -> String {
        match self.kind {
            ReceiptKind::Deposit => format!("Bukti setoran sampah {}", self.reference_id),
            ReceiptKind::Withdrawal => format!("Bukti penarikan saldo {}", self.reference_id),
        }
    }

    pub fn render_text(&self) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "Halo {},", self.customer_name);
        let _ = writeln!(body);
        let _ = writeln!(body, "{}", self.subject());
        let _ = writeln!(body, "Tanggal: {}", self.date.format(DATE_FORMAT));
        let _ = writeln!(body);
        for line in &self.lines {
            let _ = writeln!(body, "- {}: Rp {}", line.description, format_rupiah(line.amount));
        }
        let _ = writeln!(body);
        let _ = writeln!(body, "Total: Rp {}", format_rupiah(self.total));
        let _ = writeln!(body, "Saldo akhir: Rp {}", format_rupiah(self.balance));
        body
    }
}

/// Formats with `.` thousands separators, e.g. `1.250.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[async_trait]
pub trait ReceiptSender: Send + Sync {
    async fn send(&self, receipt: &Receipt) -> Result<()>;
}

/// Writes receipts to the log instead of mailing them.
#[derive(Debug, Default)]
pub struct LogReceiptSender;

#[async_trait]
impl ReceiptSender for LogReceiptSender {
    async fn send(&self, receipt: &Receipt) -> Result<()> {
        info!(
            to = %receipt.to,
            kind = ?receipt.kind,
            reference_id = %receipt.reference_id,
            total = receipt.total,
            "Receipt not mailed (mail disabled)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// Posts receipts to an HTTP mail relay.
pub struct HttpReceiptSender {
    client: Client,
    relay_url: String,
    sender: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpReceiptSender {
    pub fn new(
        relay_url: String,
        sender: String,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            relay_url,
            sender,
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let relay_url = config
            .relay_url
            .clone()
            .ok_or_else(|| BankError::Notification("mail.relay_url not set".into()))?;
        let sender = config
            .sender
            .clone()
            .ok_or_else(|| BankError::Notification("mail.sender not set".into()))?;
        Ok(Self::new(
            relay_url,
            sender,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }
}

#[async_trait]
impl ReceiptSender for HttpReceiptSender {
    async fn send(&self, receipt: &Receipt) -> Result<()> {
        let message = RelayMessage {
            from: &self.sender,
            to: &receipt.to,
            subject: receipt.subject(),
            text: receipt.render_text(),
        };

        let mut request = self.client.post(&self.relay_url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                BankError::Notification(format!(
                    "mail relay did not respond within {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| BankError::Notification(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BankError::Notification(format!(
                "mail relay responded with {status}"
            )));
        }

        debug!(to = %receipt.to, reference_id = %receipt.reference_id, "Receipt delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PricedEntry;
    use chrono::Utc;

    fn deposit() -> DepositTransaction {
        DepositTransaction {
            id: "tx-1".into(),
            name: "Siti".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            deposits: vec![PricedEntry {
                waste_type_id: "w1".into(),
                waste_type_name: "Plastik".into(),
                amount: 2.5,
                price_per_kg: 3000,
                subtotal: 7500,
            }],
            total_balance: 7500,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rupiah_grouping() {
        assert_eq!(format_rupiah(0), "0");
        assert_eq!(format_rupiah(999), "999");
        assert_eq!(format_rupiah(1000), "1.000");
        assert_eq!(format_rupiah(1_250_000), "1.250.000");
        assert_eq!(format_rupiah(-45_500), "-45.500");
    }

    #[test]
    fn deposit_receipt_renders_lines_and_totals() {
        let receipt = Receipt::for_deposit("siti@example.com".into(), &deposit(), 12_500);
        assert_eq!(receipt.kind, ReceiptKind::Deposit);
        assert_eq!(receipt.subject(), "Bukti setoran sampah tx-1");

        let text = receipt.render_text();
        assert!(text.contains("Halo Siti,"));
        assert!(text.contains("Plastik 2.5 kg x Rp 3.000: Rp 7.500"));
        assert!(text.contains("Total: Rp 7.500"));
        assert!(text.contains("Saldo akhir: Rp 12.500"));
        assert!(text.contains("Tanggal: 2024-05-01"));
    }

    #[test]
    fn withdrawal_receipt() {
        let withdrawal = Withdrawal {
            id: "wd-1".into(),
            name: "Budi".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            amount: 20_000,
            balance_after: 5_000,
            created_at: Utc::now(),
        };
        let receipt = Receipt::for_withdrawal("budi@example.com".into(), &withdrawal);
        assert_eq!(receipt.total, 20_000);
        assert!(receipt.render_text().contains("Saldo akhir: Rp 5.000"));
    }

    #[test]
    fn log_sender_always_succeeds() {
        let receipt = Receipt::for_deposit("a@b.c".into(), &deposit(), 7500);
        tokio_test::block_on(LogReceiptSender.send(&receipt)).unwrap();
    }

    #[test]
    fn http_sender_requires_relay_config() {
        assert!(HttpReceiptSender::from_config(&MailConfig::default()).is_err());
        let config = MailConfig {
            enabled: true,
            relay_url: Some("http://localhost:8025/send".into()),
            sender: Some("bank@example.com".into()),
            api_key: None,
            timeout_secs: 5,
        };
        assert!(HttpReceiptSender::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn unresponsive_relay_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let sender = HttpReceiptSender::new(
            format!("http://{addr}/send"),
            "bank@example.com".into(),
            None,
            Duration::from_millis(200),
        );
        let receipt = Receipt::for_deposit("a@b.c".into(), &deposit(), 7500);

        let err = tokio::time::timeout(Duration::from_secs(5), sender.send(&receipt))
            .await
            .expect("send should give up on its own")
            .unwrap_err();
        assert!(matches!(err, BankError::Notification(ref m) if m.contains("did not respond")));
    }
}
