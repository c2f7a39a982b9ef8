//! register_delivery - manual fresh registration
//!
//! Creates a delivery row for a reader code with no prior lookup. This is
//! the deliberate entry point for packages the scanner never matched; the
//! scan workflow's "not found" branch never lands here on its own.

use anyhow::Result;
use clap::Parser;
use std::str::FromStr;

use portaria_scan::config::PortariaConfig;
use portaria_scan::{Block, DeliveryForm, DeliveryStoreClient, DeliveryWorkflow};

#[derive(Parser)]
#[command(name = "register_delivery", about = "Register a new delivery by hand")]
struct Args {
    /// Reader code printed on the package label.
    #[arg(long)]
    code: String,

    /// Building block: A or B.
    #[arg(long)]
    block: String,

    /// Floor, 1 through 18.
    #[arg(long)]
    floor: u8,

    /// Apartment slot on the floor, 1 through 6.
    #[arg(long)]
    slot: u8,

    /// Delivery store base URL; defaults to the configured endpoint.
    #[arg(long)]
    api_url: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = PortariaConfig::load()?;

    let block = Block::from_str(&args.block)?;
    let form = DeliveryForm::new(block, args.floor, args.slot)?;
    let client = DeliveryStoreClient::new(args.api_url.as_deref().unwrap_or(&cfg.api_url));

    let mut workflow = DeliveryWorkflow::new(client, cfg.apartment_id);
    let created = workflow.register(&args.code, &form)?;

    let id = created
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<pending>".to_string());
    println!(
        "registered delivery id={} code={} block={} unit={}",
        id, created.reader_code, created.block, created.number
    );
    Ok(())
}
