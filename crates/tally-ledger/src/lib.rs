//! # tally-ledger: Accounting Services for Tally POS
//!
//! The layer a checkout, purchasing screen or report UI talks to. Every
//! service is compiled against the `LedgerStore` port only; `Ledger` wires
//! them to the SQLite adapter.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Data Flow                                 │
//! │                                                                         │
//! │  Sale / Purchase / Voucher / Payroll / Till close                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  tally-ledger (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │ PostingEngine │   │  TillManager  │   │StatementEngine│    │   │
//! │  │   └───────┬───────┘   └───────┬───────┘   └───────┬───────┘    │   │
//! │  │           └──────────┬────────┘                   │            │   │
//! │  │                      ▼                            │            │   │
//! │  │              ┌───────────────┐                    │            │   │
//! │  │              │ ChartResolver │ (lazy get-or-create)            │   │
//! │  │              └───────┬───────┘                    │            │   │
//! │  └──────────────────────┼────────────────────────────┼────────────┘   │
//! │                         ▼                            ▼                 │
//! │              Arc<dyn LedgerStore>  ──►  tally-db (SQLite)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_ledger::{Ledger, LedgerConfig};
//! use tally_core::LedgerContext;
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = Ledger::open(&config).await?;
//!
//! let ctx = LedgerContext::new("cashier1").with_outlet("OUT1");
//! ledger.tills().open(&ctx, "OUT1", "C1").await?;
//! ledger.posting().post_sale(&ctx, &sale).await?;
//! let report = ledger.tills().close(&ctx, "OUT1", "C1", None).await?;
//! println!("{}", report);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod chart;
pub mod config;
pub mod posting;
pub mod statement;
pub mod till;

// =============================================================================
// Re-exports
// =============================================================================

pub use chart::ChartResolver;
pub use config::{ConfigError, ConfigResult, LedgerConfig};
pub use posting::PostingEngine;
pub use statement::StatementEngine;
pub use till::TillManager;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_core::{LedgerError, LedgerResult, LedgerStore};
use tally_db::Database;

use crate::config::LoggingSettings;

// =============================================================================
// Ledger Facade
// =============================================================================

/// All services over one store.
#[derive(Clone)]
pub struct Ledger {
    database: Database,
    chart: ChartResolver,
    posting: PostingEngine,
    statements: StatementEngine,
    tills: TillManager,
}

impl Ledger {
    /// Opens (and migrates) the configured database.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        let db_config = config.db_config();
        if let Some(parent) = db_config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LedgerError::Storage(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let database = Database::new(db_config).await?;
        info!("Ledger ready");
        Ok(Self::from_database(database, config))
    }

    /// Wires services onto an existing handle.
    pub fn from_database(database: Database, config: &LedgerConfig) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(database.ledger_store());
        let chart = ChartResolver::new(store.clone());

        Ledger {
            posting: PostingEngine::new(store.clone(), chart.clone(), &config.posting),
            statements: StatementEngine::new(store.clone(), chart.clone()),
            tills: TillManager::new(store, chart.clone(), &config.till),
            chart,
            database,
        }
    }

    pub fn chart(&self) -> &ChartResolver {
        &self.chart
    }

    pub fn posting(&self) -> &PostingEngine {
        &self.posting
    }

    pub fn statements(&self) -> &StatementEngine {
        &self.statements
    }

    pub fn tills(&self) -> &TillManager {
        &self.tills
    }

    /// Raw repositories, for collaborator data (sales, stock movements).
    pub fn database(&self) -> &Database {
        &self.database
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over `settings.filter`. A second call is a no-op.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - everything at debug
/// - `RUST_LOG=tally_ledger=trace` - trace for the services only
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
