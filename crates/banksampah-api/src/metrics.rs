use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("banksampah_http_requests_total", "HTTP requests by method and status"),
        &["method", "status"]
    )
    .unwrap();

    pub static ref DEPOSITS_TOTAL: IntCounter = IntCounter::new(
        "banksampah_deposits_total",
        "Deposit transactions recorded"
    )
    .unwrap();

    pub static ref DEPOSIT_VALUE_RUPIAH: Histogram = Histogram::with_opts(
        HistogramOpts::new("banksampah_deposit_value_rupiah", "Total value of each deposit")
            .buckets(vec![
                1_000.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0, 100_000.0, 250_000.0, 500_000.0,
                1_000_000.0,
            ])
    )
    .unwrap();

    pub static ref WITHDRAWALS_TOTAL: IntCounter = IntCounter::new(
        "banksampah_withdrawals_total",
        "Withdrawals recorded"
    )
    .unwrap();

    pub static ref LOGIN_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "banksampah_login_failures_total",
        "Rejected or throttled login attempts"
    )
    .unwrap();

    pub static ref RECEIPT_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "banksampah_receipt_failures_total",
        "Receipts that could not be delivered"
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Registers every collector once per process.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .unwrap();
        REGISTRY.register(Box::new(DEPOSITS_TOTAL.clone())).unwrap();
        REGISTRY
            .register(Box::new(DEPOSIT_VALUE_RUPIAH.clone()))
            .unwrap();
        REGISTRY.register(Box::new(WITHDRAWALS_TOTAL.clone())).unwrap();
        REGISTRY
            .register(Box::new(LOGIN_FAILURES_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(RECEIPT_FAILURES_TOTAL.clone()))
            .unwrap();
    });
}

pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_is_harmless() {
        register_metrics();
        register_metrics();
        DEPOSITS_TOTAL.inc();
        let text = render().unwrap();
        assert!(text.contains("banksampah_deposits_total"));
    }
}
