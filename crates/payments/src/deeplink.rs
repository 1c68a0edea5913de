//! Payment-return deep link.
//!
//! The provider redirects to an app-registered URL scheme carrying a success
//! flag, the transaction reference, and the amount. This is a best-effort
//! fast path into the same recovery logic the lifecycle monitor drives; the
//! saga must not depend on it ever being delivered.

use pitstop_core::{DomainError, DomainResult};

use crate::gateway::TransactionRef;

/// Parsed payment-return redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReturn {
    pub success: bool,
    pub transaction_ref: TransactionRef,
    pub amount: u64,
}

impl PaymentReturn {
    /// Parse a redirect URL of the form
    /// `pitstop://payment-return?success=1&transactionRef=...&amount=...`.
    ///
    /// The success flag is advisory only; the saga always re-verifies against
    /// the gateway before acting on it.
    pub fn parse(url: &str) -> DomainResult<Self> {
        let query = url
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or_else(|| DomainError::validation("payment return url has no query"))?;

        let mut success = None;
        let mut transaction_ref = None;
        let mut amount = None;

        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "success" => success = Some(value == "1" || value == "true"),
                "transactionRef" => {
                    if !value.is_empty() {
                        transaction_ref = Some(TransactionRef::new(value));
                    }
                }
                "amount" => {
                    amount = Some(value.parse::<u64>().map_err(|_| {
                        DomainError::validation(format!("invalid amount in payment return: {value}"))
                    })?);
                }
                _ => {}
            }
        }

        Ok(Self {
            success: success
                .ok_or_else(|| DomainError::validation("payment return missing success flag"))?,
            transaction_ref: transaction_ref
                .ok_or_else(|| DomainError::validation("payment return missing transactionRef"))?,
            amount: amount
                .ok_or_else(|| DomainError::validation("payment return missing amount"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_return() {
        let ret = PaymentReturn::parse(
            "pitstop://payment-return?success=1&transactionRef=TXN-42&amount=200000",
        )
        .unwrap();
        assert!(ret.success);
        assert_eq!(ret.transaction_ref, TransactionRef::new("TXN-42"));
        assert_eq!(ret.amount, 200_000);
    }

    #[test]
    fn parses_failure_flag() {
        let ret = PaymentReturn::parse(
            "pitstop://payment-return?success=0&transactionRef=TXN-42&amount=200000",
        )
        .unwrap();
        assert!(!ret.success);
    }

    #[test]
    fn rejects_missing_transaction_ref() {
        let err =
            PaymentReturn::parse("pitstop://payment-return?success=1&amount=200000").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_unparseable_amount() {
        let err = PaymentReturn::parse(
            "pitstop://payment-return?success=1&transactionRef=TXN-42&amount=lots",
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn ignores_unknown_parameters() {
        let ret = PaymentReturn::parse(
            "pitstop://payment-return?success=1&transactionRef=T&amount=1&locale=vi",
        )
        .unwrap();
        assert_eq!(ret.amount, 1);
    }
}
