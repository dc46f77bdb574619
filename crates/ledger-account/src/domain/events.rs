//! Domain events for the Account context.

use ledger_core::error::DomainError;
use ledger_core::event::{DomainEvent, EventMetadata};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Emitted once, when an account comes into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    /// The account identifier.
    pub account_id: String,
    /// Opening balance; replay sets the balance to this value.
    pub initial_balance: Decimal,
}

/// Emitted when a withdrawal is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyWithdrawn {
    /// The account identifier.
    pub account_id: String,
    /// The amount taken out.
    pub amount: Decimal,
    /// Balance after the withdrawal. Replay uses this value verbatim.
    pub new_balance: Decimal,
}

/// Emitted when a withdrawal is refused for lack of funds. Audit only; it
/// does not change the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientFunds {
    /// The account identifier.
    pub account_id: String,
    /// The amount the caller asked for.
    pub requested_amount: Decimal,
    /// Balance at the time of the refusal.
    pub current_balance: Decimal,
}

/// Event type identifier for [`AccountCreated`].
pub const ACCOUNT_CREATED_EVENT_TYPE: &str = "AccountCreated";

/// Event type identifier for [`MoneyWithdrawn`].
pub const MONEY_WITHDRAWN_EVENT_TYPE: &str = "MoneyWithdrawn";

/// Event type identifier for [`InsufficientFunds`].
pub const INSUFFICIENT_FUNDS_EVENT_TYPE: &str = "InsufficientFunds";

/// Event payload variants for the Account context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEventKind {
    /// The account has been opened.
    AccountCreated(AccountCreated),
    /// Money has been withdrawn.
    MoneyWithdrawn(MoneyWithdrawn),
    /// A withdrawal has been refused.
    InsufficientFunds(InsufficientFunds),
}

impl AccountEventKind {
    /// Returns the event type tag for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AccountCreated(_) => ACCOUNT_CREATED_EVENT_TYPE,
            Self::MoneyWithdrawn(_) => MONEY_WITHDRAWN_EVENT_TYPE,
            Self::InsufficientFunds(_) => INSUFFICIENT_FUNDS_EVENT_TYPE,
        }
    }

    /// Checks the payload's field invariants before it is written to the log.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first field that is out
    /// of range.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::AccountCreated(payload) => {
                non_negative("initial_balance", payload.initial_balance)
            }
            Self::MoneyWithdrawn(payload) => {
                positive("amount", payload.amount)?;
                non_negative("new_balance", payload.new_balance)
            }
            Self::InsufficientFunds(payload) => {
                positive("requested_amount", payload.requested_amount)?;
                non_negative("current_balance", payload.current_balance)
            }
        }
    }
}

fn positive(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "{field} must be greater than zero, got {value}"
        )))
    }
}

fn non_negative(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        Err(DomainError::Validation(format!(
            "{field} must not be negative, got {value}"
        )))
    } else {
        Ok(())
    }
}

/// Domain event envelope for the Account context.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AccountEventKind,
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // The payload is the variant's struct; the tag travels in `event_type`.
        let payload = match &self.kind {
            AccountEventKind::AccountCreated(payload) => serde_json::to_value(payload),
            AccountEventKind::MoneyWithdrawn(payload) => serde_json::to_value(payload),
            AccountEventKind::InsufficientFunds(payload) => serde_json::to_value(payload),
        };
        // Serialization of derived Serialize types to Value is infallible.
        payload.expect("account event payload serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
