//! `sim-records`: load a card image and print the resolved records.
//!
//! The image is a JSON description of the card's elementary files (see
//! `sim_transport::CardImage`). One load cycle runs against a simulated card
//! and the snapshot is printed as JSON on stdout; logs go to stderr and are
//! controlled with `RUST_LOG`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use sim_records::{
    CardRecordSnapshot, CardRecordsService, DisplayRule, EngineDiagnostics, RegistrationContext,
    ServiceConfig,
};
use sim_resolver::NameAlgorithm;
use sim_transport::CardImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum AlgorithmArg {
    /// First `EF_PNN` record.
    List,
    /// `EF_OPL` entry matching the registration, then its `EF_PNN` record.
    OperatorList,
}

impl From<AlgorithmArg> for NameAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::List => NameAlgorithm::NameList,
            AlgorithmArg::OperatorList => NameAlgorithm::OperatorList,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sim-records", author, version, about)]
struct Args {
    /// Card image (JSON with hex-encoded file contents).
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Network name algorithm. Overrides SIM_RECORDS_NAME_ALGORITHM.
    #[arg(long, value_enum)]
    name_algorithm: Option<AlgorithmArg>,

    /// Registered operator (MCC+MNC) reported before loading.
    #[arg(long, value_name = "MCCMNC")]
    registered_operator: Option<String>,

    /// Location area of the registration, decimal or 0x-prefixed hex.
    #[arg(long, value_name = "LAC", value_parser = parse_location_area, requires = "registered_operator")]
    location_area: Option<u16>,

    /// Read the CPHS customer service profile.
    #[arg(long)]
    load_csp: bool,

    /// Carrier override JSON file. Overrides SIM_RECORDS_CARRIER_OVERRIDES.
    #[arg(long, value_name = "PATH")]
    carrier_overrides: Option<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Give up if loading has not finished after this many milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    timeout_ms: u64,
}

#[derive(Serialize)]
struct Report {
    snapshot: CardRecordSnapshot,
    display: DisplayRule,
    diagnostics: EngineDiagnostics,
}

fn parse_location_area(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid location area {value:?}: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ServiceConfig::from_env().context("invalid SIM_RECORDS_* environment")?;
    if let Some(algorithm) = args.name_algorithm {
        config.engine.name_algorithm = algorithm.into();
    }
    if args.load_csp {
        config.engine.load_csp = true;
    }
    if let Some(path) = &args.carrier_overrides {
        config = config.with_carrier_overrides_file(path)?;
    }

    let image = CardImage::load(&args.image)
        .with_context(|| format!("failed to load card image {}", args.image.display()))?;
    let card = image.to_card().context("card image has invalid contents")?;

    let handle = CardRecordsService::spawn(config.engine, Arc::new(card));
    let registration = args
        .registered_operator
        .as_ref()
        .map(|operator| RegistrationContext::new(operator.clone(), args.location_area.unwrap_or(0)));
    if registration.is_some() {
        handle.registration_changed(registration);
    }
    handle.radio_ready();

    let snapshot = tokio::time::timeout(Duration::from_millis(args.timeout_ms), handle.wait_loaded())
        .await
        .map_err(|_| anyhow!("records not loaded after {} ms", args.timeout_ms))??;
    let report = Report {
        display: snapshot.display_rule(args.registered_operator.as_deref()),
        diagnostics: handle.diagnostics(),
        snapshot,
    };
    handle.shutdown().await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
