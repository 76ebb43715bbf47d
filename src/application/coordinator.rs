use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::domain::{Amount, TransactionRecord, TransactionType, validate_amount, validate_id};
use crate::storage::{BalanceStore, Repository, Scope, TransactionLedger};

use super::EngineError;

/// Progress of one unit of work. Reaching anything other than `Committed`
/// means the scope was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    StorePending,
    StoreApplied,
    LedgerPending,
    Committed,
    RolledBack,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeState::Open => "open",
            ScopeState::StorePending => "store_pending",
            ScopeState::StoreApplied => "store_applied",
            ScopeState::LedgerPending => "ledger_pending",
            ScopeState::Committed => "committed",
            ScopeState::RolledBack => "rolled_back",
        };
        write!(f, "{}", name)
    }
}

/// The only component allowed to pair a balance change with its audit record.
///
/// Each credit, debit or bulk credit runs in its own [`Scope`]: the balance store
/// mutation first, then the ledger append, then commit. Any failure on the way,
/// including the scope deadline passing, rolls the whole scope back.
///
/// `B` and `L` default to [`Repository`], which implements both contracts; they
/// are separate so a test double can stand in for either side.
pub struct LedgerCoordinator<B = Repository, L = Repository> {
    repo: Repository,
    store: B,
    ledger: L,
    scope_timeout: Duration,
}

impl LedgerCoordinator {
    /// Create a coordinator backed entirely by the given repository.
    pub fn new(repo: Repository, config: &EngineConfig) -> Self {
        Self {
            store: repo.clone(),
            ledger: repo.clone(),
            repo,
            scope_timeout: config.scope_timeout,
        }
    }

    /// Initialize a new database and build a coordinator on it.
    pub async fn init(config: &EngineConfig) -> Result<Self, EngineError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo, config))
    }
}

impl<B: BalanceStore, L: TransactionLedger> LedgerCoordinator<B, L> {
    /// Build a coordinator from explicit components.
    /// `repo` only opens scopes; all reads and writes go through `store` and `ledger`.
    pub fn with_components(repo: Repository, store: B, ledger: L, scope_timeout: Duration) -> Self {
        Self {
            repo,
            store,
            ledger,
            scope_timeout,
        }
    }

    /// The repository scopes are opened on, for provisioning and inspection.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn scope_timeout(&self) -> Duration {
        self.scope_timeout
    }

    // ========================
    // Operations
    // ========================

    /// Add `amount` to a user's balance, recorded under `transaction_id`.
    #[instrument(skip(self))]
    pub async fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        transaction_id: &str,
    ) -> Result<(), EngineError> {
        validate_id("user_id", user_id)?;
        validate_id("transaction_id", transaction_id)?;
        validate_amount(amount)?;

        let record = TransactionRecord::credit(transaction_id, user_id, amount);
        self.execute(&record).await
    }

    /// Subtract `amount` from a user's balance, recorded under `transaction_id`.
    /// Fails with `InsufficientFunds` before anything is written to the ledger
    /// if the balance would go below zero.
    #[instrument(skip(self))]
    pub async fn debit(
        &self,
        user_id: &str,
        amount: Amount,
        transaction_id: &str,
    ) -> Result<(), EngineError> {
        validate_id("user_id", user_id)?;
        validate_id("transaction_id", transaction_id)?;
        validate_amount(amount)?;

        let record = TransactionRecord::debit(transaction_id, user_id, amount);
        self.execute(&record).await
    }

    /// Add `amount` to every balance as one unit, with a single ledger record
    /// that has no user.
    #[instrument(skip(self))]
    pub async fn bulk_credit(&self, amount: Amount, transaction_id: &str) -> Result<(), EngineError> {
        validate_id("transaction_id", transaction_id)?;
        validate_amount(amount)?;

        let record = TransactionRecord::bulk_credit(transaction_id, amount);
        self.execute(&record).await
    }

    /// Read a user's current balance. No scope, no ledger.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: &str) -> Result<Amount, EngineError> {
        validate_id("user_id", user_id)?;
        let user = self.store.get(user_id).await?;
        Ok(user.balance)
    }

    // ========================
    // Scope handling
    // ========================

    async fn execute(&self, record: &TransactionRecord) -> Result<(), EngineError> {
        // One deadline covers connection acquisition, both steps and the pre-commit check.
        let deadline = Instant::now() + self.scope_timeout;
        let mut scope = timeout_at(deadline, self.repo.begin_scope(deadline))
            .await
            .map_err(|_| EngineError::Timeout(self.scope_timeout))??;

        let mut state = ScopeState::Open;
        let outcome = timeout_at(deadline, self.apply(&mut scope, record, &mut state))
            .await
            .unwrap_or(Err(EngineError::Timeout(self.scope_timeout)));

        if let Err(err) = outcome {
            self.abort(scope, state, &err).await;
            return Err(err);
        }

        // The deadline is checked right before commit. The commit itself is not
        // cancelled: a COMMIT dropped mid-flight may still land.
        if scope.is_expired() {
            let err = EngineError::Timeout(self.scope_timeout);
            self.abort(scope, state, &err).await;
            return Err(err);
        }

        scope.commit().await?;
        state = ScopeState::Committed;
        info!(
            transaction_id = %record.transaction_id,
            transaction_type = %record.transaction_type,
            amount = record.amount,
            %state,
            "transaction committed"
        );
        Ok(())
    }

    async fn apply(
        &self,
        scope: &mut Scope,
        record: &TransactionRecord,
        state: &mut ScopeState,
    ) -> Result<(), EngineError> {
        *state = ScopeState::StorePending;
        match record.transaction_type {
            TransactionType::Credit | TransactionType::Debit => {
                let user_id = record.user_id.as_deref().unwrap_or_default();
                self.store
                    .apply_delta(scope, user_id, record.signed_amount())
                    .await?;
            }
            TransactionType::BulkCredit => {
                let credited = self.store.apply_bulk_delta(scope, record.amount).await?;
                debug!(credited, "bulk credit applied to all balances");
            }
        }
        *state = ScopeState::StoreApplied;

        // A duplicate id surfaces here, after the balance already moved in this scope.
        *state = ScopeState::LedgerPending;
        self.ledger.append(scope, record).await?;
        Ok(())
    }

    async fn abort(&self, scope: Scope, failed_at: ScopeState, err: &EngineError) {
        if let Err(rollback_err) = scope.rollback().await {
            warn!(error = %rollback_err, "explicit rollback failed");
        }
        warn!(
            kind = %err.kind(),
            failed_at = %failed_at,
            state = %ScopeState::RolledBack,
            error = %err,
            "transaction rolled back"
        );
    }
}
