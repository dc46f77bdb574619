//! Commands for the Account context.

use ledger_core::command::Command;
use ledger_core::error::DomainError;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Longest accepted account identifier.
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Most decimal places accepted on a monetary amount.
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// Command to open a new account.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: String,
    /// The opening balance.
    pub initial_balance: Decimal,
}

impl CreateAccount {
    /// Checks the command's shape before any state is loaded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a malformed account ID or an
    /// amount with too many decimal places.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_account_id(&self.account_id)?;
        validate_scale("initial_balance", self.initial_balance)
    }
}

impl Command for CreateAccount {
    fn command_type(&self) -> &'static str {
        "account.create_account"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to withdraw money from an account.
#[derive(Debug, Clone)]
pub struct WithdrawMoney {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: String,
    /// The amount to withdraw.
    pub amount: Decimal,
}

impl WithdrawMoney {
    /// Checks the command's shape before any state is loaded. The sign of
    /// `amount` is left to the withdrawal rule itself.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a malformed account ID or an
    /// amount with too many decimal places.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_account_id(&self.account_id)?;
        validate_scale("amount", self.amount)
    }
}

impl Command for WithdrawMoney {
    fn command_type(&self) -> &'static str {
        "account.withdraw_money"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

fn validate_account_id(account_id: &str) -> Result<(), DomainError> {
    if account_id.is_empty() {
        return Err(DomainError::Validation(
            "account_id must not be empty".to_owned(),
        ));
    }
    if account_id.len() > MAX_ACCOUNT_ID_LEN {
        return Err(DomainError::Validation(format!(
            "account_id must be at most {MAX_ACCOUNT_ID_LEN} characters"
        )));
    }
    if let Some(bad) = account_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(DomainError::Validation(format!(
            "account_id contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

fn validate_scale(field: &str, amount: Decimal) -> Result<(), DomainError> {
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(DomainError::Validation(format!(
            "{field} must have at most {MAX_AMOUNT_SCALE} decimal places, got {amount}"
        )));
    }
    Ok(())
}
