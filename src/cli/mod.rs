use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{EngineError, LedgerCoordinator};
use crate::config::{DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, EngineConfig};
use crate::domain::{Amount, TransactionRecord};

/// Balance Ledger - per-user balances with an idempotent audit trail
#[derive(Parser)]
#[command(name = "balance-ledger")]
#[command(about = "Credit, debit and audit per-user balances backed by SQLite")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "balance-ledger.db")]
    pub database: String,

    /// Deadline for each credit/debit/credit-all, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Maximum number of pooled database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// How long a writer waits for the SQLite write lock, in milliseconds
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT.as_millis() as u64)]
    pub busy_timeout_ms: u64,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Provision a user balance row
    Open {
        /// User ID (must be unique)
        user_id: String,

        /// Starting balance
        #[arg(short, long, default_value_t = 0)]
        balance: Amount,
    },

    /// Add to a user's balance
    Credit {
        user_id: String,

        /// Amount to add (positive integer)
        #[arg(allow_negative_numbers = true)]
        amount: Amount,

        /// Idempotency token; a fresh UUID is generated when omitted
        #[arg(short, long)]
        transaction_id: Option<String>,
    },

    /// Subtract from a user's balance
    Debit {
        user_id: String,

        /// Amount to subtract (positive integer)
        #[arg(allow_negative_numbers = true)]
        amount: Amount,

        /// Idempotency token; a fresh UUID is generated when omitted
        #[arg(short, long)]
        transaction_id: Option<String>,
    },

    /// Add the same amount to every user's balance
    #[command(name = "credit-all")]
    CreditAll {
        /// Amount to add to each balance (positive integer)
        #[arg(allow_negative_numbers = true)]
        amount: Amount,

        /// Idempotency token; a fresh UUID is generated when omitted
        #[arg(short, long)]
        transaction_id: Option<String>,
    },

    /// Show balance for a user or all users
    Balance {
        /// User ID (omit for all users)
        user_id: Option<String>,
    },

    /// List recorded transactions, newest first
    History {
        /// Only show credits and debits of this user
        #[arg(long)]
        user: Option<String>,

        /// Maximum number of records to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(&self.database)
            .with_scope_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Init => {
                LedgerCoordinator::init(&config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Open { user_id, balance } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                let user = coordinator
                    .repository()
                    .create_user(&user_id, balance)
                    .await?;
                println!("Opened balance: {} ({})", user.user_id, user.balance);
            }

            Commands::Credit {
                user_id,
                amount,
                transaction_id,
            } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                let transaction_id = transaction_id.unwrap_or_else(new_transaction_id);
                coordinator
                    .credit(&user_id, amount, &transaction_id)
                    .await
                    .map_err(engine_error)?;
                let balance = coordinator.get_balance(&user_id).await.map_err(engine_error)?;
                println!(
                    "Credited {} to {} ({}), balance: {}",
                    amount, user_id, transaction_id, balance
                );
            }

            Commands::Debit {
                user_id,
                amount,
                transaction_id,
            } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                let transaction_id = transaction_id.unwrap_or_else(new_transaction_id);
                coordinator
                    .debit(&user_id, amount, &transaction_id)
                    .await
                    .map_err(engine_error)?;
                let balance = coordinator.get_balance(&user_id).await.map_err(engine_error)?;
                println!(
                    "Debited {} from {} ({}), balance: {}",
                    amount, user_id, transaction_id, balance
                );
            }

            Commands::CreditAll {
                amount,
                transaction_id,
            } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                let transaction_id = transaction_id.unwrap_or_else(new_transaction_id);
                coordinator
                    .bulk_credit(amount, &transaction_id)
                    .await
                    .map_err(engine_error)?;
                println!("Credited {} to every balance ({})", amount, transaction_id);
            }

            Commands::Balance { user_id } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                run_balance_command(&coordinator, user_id).await?;
            }

            Commands::History { user, limit, json } => {
                let coordinator = LedgerCoordinator::connect(&config).await?;
                let records = coordinator
                    .repository()
                    .list_transactions(user.as_deref(), limit)
                    .await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                } else {
                    print_history(&records);
                }
            }
        }

        Ok(())
    }
}

async fn run_balance_command(coordinator: &LedgerCoordinator, user_id: Option<String>) -> Result<()> {
    match user_id {
        Some(user_id) => {
            let balance = coordinator.get_balance(&user_id).await.map_err(engine_error)?;
            println!("{}: {}", user_id, balance);
        }
        None => {
            let balances = coordinator.repository().list_balances().await?;
            if balances.is_empty() {
                println!("No balances found.");
            } else {
                println!("{:<36} {:>14} UPDATED", "USER", "BALANCE");
                println!("{}", "-".repeat(72));
                for entry in balances {
                    println!(
                        "{:<36} {:>14} {}",
                        truncate(&entry.user_id, 36),
                        entry.balance,
                        entry.updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_history(records: &[TransactionRecord]) {
    if records.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!(
        "{:<20} {:<12} {:>12} {:<24} TRANSACTION",
        "DATE", "TYPE", "AMOUNT", "USER"
    );
    println!("{}", "-".repeat(100));
    for record in records {
        println!(
            "{:<20} {:<12} {:>12} {:<24} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.transaction_type,
            record.signed_amount(),
            truncate(record.user_id.as_deref().unwrap_or("(all)"), 24),
            record.transaction_id
        );
    }
}

fn new_transaction_id() -> String {
    Uuid::new_v4().to_string()
}

/// Keep the stable error kind visible in CLI output.
fn engine_error(err: EngineError) -> anyhow::Error {
    anyhow::anyhow!("{} [{}]", err, err.kind())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
