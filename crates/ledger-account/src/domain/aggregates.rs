//! Aggregate roots for the Account context.

use ledger_core::aggregate::AggregateRoot;
use ledger_core::clock::Clock;
use ledger_core::error::DomainError;
use ledger_core::event::EventMetadata;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::events::{
    AccountCreated, AccountEvent, AccountEventKind, InsufficientFunds, MoneyWithdrawn,
};

/// Lifecycle of an account. There is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// No `AccountCreated` event has been applied.
    Nonexistent,
    /// The account has been opened.
    Active,
}

/// The aggregate root for a bank account.
///
/// State is never stored; it is derived by folding the account's events in
/// order, starting from [`Account::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Aggregate identifier.
    pub id: String,
    /// Current version (event count, uncommitted events included).
    pub(crate) version: i64,
    balance: Decimal,
    status: AccountStatus,
    /// Events produced by a command but not yet appended to the log.
    uncommitted_events: Vec<AccountEvent>,
}

impl Account {
    /// Creates the zero-value state: balance 0, version 0, not yet opened.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            balance: Decimal::ZERO,
            status: AccountStatus::Nonexistent,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the current balance.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> AccountStatus {
        self.status
    }

    /// Opens a new account, producing an `AccountCreated` event.
    ///
    /// The returned account has the event applied (version 1) and holds it as
    /// its only uncommitted event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if `initial_balance` is negative.
    pub fn open(
        id: impl Into<String>,
        initial_balance: Decimal,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(Self, AccountEvent), DomainError> {
        if initial_balance < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(initial_balance));
        }
        let account = Self::new(id);
        let kind = AccountEventKind::AccountCreated(AccountCreated {
            account_id: account.id.clone(),
            initial_balance,
        });
        Ok(account.record(kind, correlation_id, clock))
    }

    /// Decides a withdrawal of `amount` against the current balance.
    ///
    /// `self` is left untouched. The returned account has the produced event
    /// applied and appended to its uncommitted events. A withdrawal of exactly
    /// the balance is granted. Refusal for lack of funds is not an error: the
    /// produced event is `InsufficientFunds` and the balance is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the account has not been
    /// opened, and `DomainError::InvalidAmount` if `amount` is zero or
    /// negative. No event is produced in either case.
    pub fn withdraw(
        &self,
        amount: Decimal,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(Self, AccountEvent), DomainError> {
        if self.status != AccountStatus::Active {
            return Err(DomainError::AggregateNotFound(self.id.clone()));
        }
        if amount <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(amount));
        }

        let kind = if self.balance >= amount {
            AccountEventKind::MoneyWithdrawn(MoneyWithdrawn {
                account_id: self.id.clone(),
                amount,
                new_balance: self.balance - amount,
            })
        } else {
            AccountEventKind::InsufficientFunds(InsufficientFunds {
                account_id: self.id.clone(),
                requested_amount: amount,
                current_balance: self.balance,
            })
        };

        Ok(self.clone().record(kind, correlation_id, clock))
    }

    /// Wraps `kind` in an envelope at the next version, applies it, and keeps
    /// it as uncommitted.
    fn record(
        mut self,
        kind: AccountEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> (Self, AccountEvent) {
        // TODO: event_id uses Uuid::new_v4(), so two decisions from the same
        // state never produce identical events. Inject an ID source alongside
        // the clock if byte-identical re-decisions are ever needed.
        let event = AccountEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id.clone(),
                version: self.version + 1,
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };

        self.apply(&event);
        self.uncommitted_events.push(event.clone());
        (self, event)
    }
}

impl AggregateRoot for Account {
    type Event = AccountEvent;

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            AccountEventKind::AccountCreated(payload) => {
                self.balance = payload.initial_balance;
                self.status = AccountStatus::Active;
            }
            AccountEventKind::MoneyWithdrawn(payload) => {
                if self.balance.checked_sub(payload.amount) != Some(payload.new_balance) {
                    warn!(
                        account_id = %self.id,
                        version = event.metadata.version,
                        balance = %self.balance,
                        amount = %payload.amount,
                        recorded_new_balance = %payload.new_balance,
                        "withdrawal event disagrees with running balance; \
                         using recorded new_balance"
                    );
                }
                self.balance = payload.new_balance;
            }
            AccountEventKind::InsufficientFunds(_) => {}
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
