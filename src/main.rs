use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use okoa::application::engine::AdvanceEngine;
use okoa::application::monitor::BalanceMonitor;
use okoa::domain::config::AdvanceConfig;
use okoa::domain::employee::Employee;
use okoa::domain::ports::{
    AdvanceStoreRef, EmployeeDirectoryRef, NotificationSenderRef, PaymentNetworkRef,
    PaymentStoreRef,
};
use okoa::infrastructure::in_memory::{
    InMemoryAdvanceStore, InMemoryDirectory, InMemoryPaymentStore, OfflineNetwork,
    RecordingNotifier,
};
use okoa::interfaces::callback::parse_callback;
use okoa::interfaces::csv::event_reader::EventReader;
use okoa::interfaces::csv::report_writer::ReportWriter;
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Report {
    /// Final state of every advance.
    Advances,
    /// Final state of every payment transaction.
    Payments,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input lifecycle events CSV file
    input: PathBuf,

    /// Employee roster JSON file
    #[arg(long)]
    employees: PathBuf,

    /// Settlement callbacks file, one JSON payload per line, applied
    /// after the events
    #[arg(long)]
    callbacks: Option<PathBuf>,

    /// Advance configuration JSON file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Date the batch runs as, for accrual math (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Which report to write to stdout
    #[arg(long, value_enum, default_value = "advances")]
    report: Report,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            serde_json::from_reader(file).into_diagnostic()?
        }
        None => AdvanceConfig::default(),
    };
    let as_of = cli.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let roster: Vec<Employee> = {
        let file = File::open(&cli.employees).into_diagnostic()?;
        serde_json::from_reader(file).into_diagnostic()?
    };
    let directory: EmployeeDirectoryRef = Arc::new(InMemoryDirectory::new(roster));
    let notifier: NotificationSenderRef = Arc::new(RecordingNotifier::new());
    let network: PaymentNetworkRef = Arc::new(OfflineNetwork::new(dec!(1_000_000)));
    let monitor_notifier = Arc::clone(&notifier);
    let monitor_network = Arc::clone(&network);

    #[cfg(feature = "storage-rocksdb")]
    let engine = if let Some(db_path) = &cli.db_path {
        let store = okoa::infrastructure::rocksdb::RocksDbStore::open(db_path).into_diagnostic()?;
        let advances: AdvanceStoreRef = Arc::new(store.clone());
        let payments: PaymentStoreRef = Arc::new(store);
        AdvanceEngine::new(advances, payments, directory, notifier, network)
    } else {
        in_memory_engine(directory, notifier, network)
    };
    #[cfg(not(feature = "storage-rocksdb"))]
    let engine = in_memory_engine(directory, notifier, network);

    // Apply lifecycle events in order
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = engine.process_event(event, &config, as_of).await {
                    eprintln!("Error processing event: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading event: {}", e);
            }
        }
    }

    // Then feed the settlement callbacks through the gateway
    if let Some(path) = &cli.callbacks {
        let file = File::open(path).into_diagnostic()?;
        for line in BufReader::new(file).lines() {
            let line = line.into_diagnostic()?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line)
                .map_err(okoa::error::AdvanceError::from)
                .and_then(|payload| parse_callback(&payload))
            {
                Ok(notice) => {
                    if let Err(e) = engine.handle_callback(notice, &config).await {
                        eprintln!("Error processing callback: {}", e);
                    }
                }
                Err(e) => {
                    eprintln!("Error reading callback: {}", e);
                    if let Err(e) = engine
                        .record_callback_anomaly(&e.to_string(), Some(line))
                        .await
                    {
                        eprintln!("Error recording callback anomaly: {}", e);
                    }
                }
            }
        }
    }

    // One-shot balance poll at the end of the batch run.
    if let Some(threshold) = config.balance_alert_threshold {
        let monitor = BalanceMonitor::new(
            monitor_network,
            monitor_notifier,
            threshold,
            config.ops_email.clone(),
            std::time::Duration::from_secs(300),
        );
        if let Err(e) = monitor.check_once().await {
            eprintln!("Error polling account balance: {}", e);
        }
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Advances => {
            let advances = engine.advances_report().await.into_diagnostic()?;
            writer.write_advances(advances).into_diagnostic()?;
        }
        Report::Payments => {
            let payments = engine.payments_report().await.into_diagnostic()?;
            writer.write_payments(payments).into_diagnostic()?;
        }
    }

    Ok(())
}

fn in_memory_engine(
    directory: EmployeeDirectoryRef,
    notifier: NotificationSenderRef,
    network: PaymentNetworkRef,
) -> AdvanceEngine {
    let advances: AdvanceStoreRef = Arc::new(InMemoryAdvanceStore::new());
    let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());
    AdvanceEngine::new(advances, payments, directory, notifier, network)
}
