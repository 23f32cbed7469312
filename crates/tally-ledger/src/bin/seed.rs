//! # Demo Shift Generator
//!
//! Runs one complete till shift against a database so the books have
//! something to show.
//!
//! ## Usage
//! ```bash
//! # Use the configured database (ledger.toml / TALLY_DB_PATH)
//! cargo run -p tally-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p tally-ledger --bin seed -- --db ./data/tally_dev.db
//!
//! # Open the till with a 100.00 float and declare 2.00 short
//! cargo run -p tally-ledger --bin seed -- --float 10000 --short 200
//! ```
//!
//! ## What Gets Posted
//! - Three counter sales (one partly on account) with COGS
//! - One amendment of a sale (posts only the delta)
//! - One cash refund
//! - One supplier purchase, part paid
//! - The till close, followed by the Z-report and the outlet cash book

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use uuid::Uuid;

use tally_core::document::{Purchase, Sale, SaleStatus, StockMovement};
use tally_core::{LedgerContext, LedgerError, Money, RefType, TillSession};
use tally_ledger::config::LedgerConfig;
use tally_ledger::{init_logging, Ledger};

const OUTLET: &str = "MAIN";
const COUNTER: &str = "C1";

/// (product, quantity, unit cost in cents)
type Line = (&'static str, i64, i64);

/// (total, tax, cash, card, customer, lines)
const SALES: &[(i64, i64, i64, i64, Option<&str>, &[Line])] = &[
    (2_750, 250, 2_750, 0, None, &[("BEV-COLA", 5, 180), ("SNK-CHIPS", 2, 240)]),
    (5_500, 500, 2_000, 3_500, None, &[("DRY-MILK", 4, 310), ("DRY-BUTTER", 2, 420)]),
    (8_800, 800, 3_000, 0, Some("CUST-0001"), &[("FRZ-PIZZA", 4, 900)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut float_cents: i64 = 10_000;
    let mut short_cents: i64 = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--float" | "-f" => {
                if i + 1 < args.len() {
                    float_cents = args[i + 1].parse().unwrap_or(10_000);
                    i += 1;
                }
            }
            "--short" | "-s" => {
                if i + 1 < args.len() {
                    short_cents = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Demo Shift Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: configured path)");
                println!("  -f, --float <CENTS>  Opening float (default: 10000)");
                println!("  -s, --short <CENTS>  Cash missing at close (default: 0)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load_or_default(None);
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }
    init_logging(&config.logging);

    println!("Tally Demo Shift Generator");
    println!("==========================");
    println!("Database: {}", config.database_path().display());
    println!();

    let ledger = Ledger::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let ctx = LedgerContext::new("demo-cashier")
        .with_outlet(OUTLET)
        .with_counter(COUNTER);

    let session = match ledger
        .tills()
        .open_with_float(&ctx, OUTLET, COUNTER, Money::from_cents(float_cents))
        .await
    {
        Ok(session) => session,
        Err(e @ LedgerError::DuplicateTillOpen { .. }) => {
            println!("⚠ {}", e);
            println!("  Close it first or delete the database file to regenerate.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("✓ Till opened (session {})", session.id);

    let tag = Uuid::new_v4().simple().to_string()[..8].to_string();
    let started = Utc::now();

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------
    println!();
    println!("Posting sales...");

    let mut last_sale = None;
    for (n, (total, tax, cash, card, customer, lines)) in SALES.iter().enumerate() {
        let sale = demo_sale(
            format!("S-{}-{}", tag, n + 1),
            &session,
            *total,
            *tax,
            *cash,
            *card,
            false,
            customer.map(str::to_string),
        );

        for (product, qty, cost) in lines.iter() {
            ledger
                .database()
                .stock_movements()
                .insert(&movement(RefType::Sale, &sale.id, product, -qty, *cost))
                .await?;
        }
        ledger.database().sales().insert(&sale).await?;
        let tx = ledger.posting().post_sale(&ctx, &sale).await?;
        println!("  {} total {} → {}", sale.id, sale.total, tx);
        last_sale = Some(sale);
    }

    // -------------------------------------------------------------------------
    // Amendment: one more item on the first sale, paid in cash
    // -------------------------------------------------------------------------
    if let Some(previous) = ledger.database().sales().get(&format!("S-{}-1", tag)).await? {
        let amended = Sale {
            id: format!("S-{}-1-R1", tag),
            total: previous.total + Money::from_cents(550),
            tax_total: previous.tax_total + Money::from_cents(50),
            cash_amount: Money::from_cents(550),
            card_amount: Money::zero(),
            revised_to_sale_id: None,
            created_at: Utc::now(),
            ..previous.clone()
        };
        ledger
            .database()
            .stock_movements()
            .insert(&movement(RefType::SaleRev, &amended.id, "BEV-COLA", -1, 180))
            .await?;
        ledger.database().sales().record_revision(&previous.id, &amended).await?;
        if let Some(tx) = ledger.posting().post_sale_revision(&ctx, &previous, &amended).await? {
            println!("  {} amended to {} → {}", previous.id, amended.total, tx);
        }
    }

    // -------------------------------------------------------------------------
    // Refund
    // -------------------------------------------------------------------------
    if let Some(original) = last_sale {
        let refund = demo_sale(
            format!("R-{}-1", tag),
            &session,
            -2_200,
            -200,
            -2_200,
            0,
            true,
            original.customer_id.clone(),
        );
        ledger
            .database()
            .stock_movements()
            .insert(&movement(RefType::SaleReturn, &refund.id, "FRZ-PIZZA", 1, 900))
            .await?;
        ledger.database().sales().insert(&refund).await?;
        let tx = ledger.posting().post_sale_return(&ctx, &refund).await?;
        println!("  {} refund {} → {}", refund.id, refund.total, tx);
    }

    // -------------------------------------------------------------------------
    // Purchase
    // -------------------------------------------------------------------------
    let purchase = Purchase {
        id: format!("PO-{}-1", tag),
        outlet_id: Some(OUTLET.to_string()),
        supplier_id: Some("SUP-ACME".to_string()),
        grand_total: Money::from_cents(12_000),
        tax: Money::from_cents(1_000),
        cash_paid: Money::from_cents(5_000),
    };
    let tx = ledger.posting().post_purchase(&ctx, &purchase).await?;
    println!("  {} total {} → {}", purchase.id, purchase.grand_total, tx);

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------
    let preview = ledger.tills().preview_close_here(&ctx).await?;
    let declared = preview.expected_cash - Money::from_cents(short_cents);
    println!();
    println!("Expected in drawer: {}", preview.expected_cash);
    println!("Declared:           {}", declared);

    let report = ledger.tills().close_here(&ctx, Some(declared)).await?;
    println!();
    println!("{}", report);

    // -------------------------------------------------------------------------
    // Books
    // -------------------------------------------------------------------------
    let book = ledger
        .statements()
        .cash_book(Some(OUTLET), started - Duration::minutes(1), Utc::now() + Duration::minutes(1), true)
        .await?;
    println!("Cash book {} ({})", book.statement.account_code, book.statement.account_name);
    println!("  Opening {:>12}", book.statement.opening.to_string());
    for row in &book.statement.rows {
        println!(
            "  {:<16} {:>10} {:>10} {:>12}  {}",
            row.source,
            row.debit.to_string(),
            row.credit.to_string(),
            row.running.to_string(),
            row.memo
        );
    }
    println!("  Closing {:>12}", book.statement.closing.to_string());

    if let Some(customer) = SALES.iter().find_map(|s| s.4) {
        let balance = ledger.statements().party_balance(customer, None).await?;
        println!();
        println!("Receivable from {}: {}", customer, balance.balance);
    }

    let trial = ledger.statements().trial_balance(None).await?;
    println!();
    println!(
        "Trial balance: {} accounts, debit {} credit {} ({})",
        trial.rows.len(),
        trial.total_debit,
        trial.total_credit,
        if trial.is_balanced() { "balanced" } else { "NOT BALANCED" }
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo_sale(
    id: String,
    session: &TillSession,
    total: i64,
    tax: i64,
    cash: i64,
    card: i64,
    is_return: bool,
    customer_id: Option<String>,
) -> Sale {
    Sale {
        id,
        outlet_id: session.outlet_id.clone(),
        counter_id: session.counter_id.clone(),
        customer_id,
        total: Money::from_cents(total),
        tax_total: Money::from_cents(tax),
        cash_amount: Money::from_cents(cash),
        card_amount: Money::from_cents(card),
        is_return,
        status: SaleStatus::Final,
        voided_at: None,
        revised_to_sale_id: None,
        till_session_id: Some(session.id.clone()),
        created_at: Utc::now(),
    }
}

fn movement(ref_type: RefType, ref_id: &str, product: &str, quantity: i64, unit_cost: i64) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product.to_string(),
        ref_type,
        ref_id: ref_id.to_string(),
        quantity,
        unit_cost: Money::from_cents(unit_cost),
    }
}
