//! portariad - concierge scan daemon
//!
//! This daemon:
//! 1. Binds the configured lobby camera and opens a scan session
//! 2. Waits for a decoded code plus its captured still
//! 3. Reconciles the code against the delivery store
//! 4. Reports the outcome (or commits it with --auto-confirm) and loops

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portaria_scan::config::PortariaConfig;
use portaria_scan::{
    Camera, DeliveryStoreClient, DeliveryWorkflow, Disposition, LobbyCamera, ScanSession,
    StubDecoder,
};

#[derive(Parser)]
#[command(name = "portariad", about = "Condominium scan-to-delivery daemon")]
struct Args {
    /// Handle a single scan, then exit.
    #[arg(long)]
    once: bool,

    /// Mark matched deliveries delivered without operator confirmation.
    #[arg(long)]
    auto_confirm: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = PortariaConfig::load()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let source = LobbyCamera::from_url(&cfg.camera.url, cfg.camera.target_fps)?;
    let camera = Camera::new(source);
    let client = DeliveryStoreClient::new(&cfg.api_url);

    log::info!(
        "portariad running: camera={} store={} apartment_id={}",
        cfg.camera.url,
        client.base_url(),
        cfg.apartment_id
    );

    while running.load(Ordering::SeqCst) {
        let mut session =
            ScanSession::open(&camera, Box::new(StubDecoder::new()), cfg.session_config())?;

        let mut scanned = None;
        while running.load(Ordering::SeqCst) {
            if let Some(scan) = session.wait_for_scan(Duration::from_millis(500)) {
                scanned = Some(scan);
                break;
            }
            if !session.is_open() {
                break;
            }
        }
        session.close();

        let Some(scan) = scanned else {
            break;
        };

        let mut workflow = DeliveryWorkflow::new(client.clone(), cfg.apartment_id);
        match workflow.resolve(scan) {
            Ok(Disposition::Found) => {
                if let Some(form) = workflow.form() {
                    log::info!(
                        "matched delivery: block {} floor {} apt {}",
                        form.block,
                        form.floor,
                        form.slot
                    );
                }
                if args.auto_confirm {
                    match workflow.confirm() {
                        Ok(updated) => log::info!(
                            "delivery committed: id={:?} unit={}",
                            updated.id,
                            updated.number
                        ),
                        Err(err) => {
                            log::error!("commit failed: {:#}", err);
                            workflow.abandon();
                        }
                    }
                } else {
                    log::info!("confirmation pending at the desk; row left untouched");
                    workflow.abandon();
                }
            }
            Ok(Disposition::NotFound) => {
                log::warn!("no delivery for scanned code; handle manually at the desk");
                workflow.abandon();
            }
            Err(err) => {
                log::error!("reconciliation failed: {:#}", err);
                workflow.abandon();
            }
        }

        if args.once {
            break;
        }
    }

    log::info!("portariad stopped");
    Ok(())
}
