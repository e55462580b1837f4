//! CLI subcommands: the batch jobs and operator override edits.

use chrono::Utc;
use clap::Args;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use fleetbridge_core::envelope::{read_snapshot, PayloadFile};
use fleetbridge_core::{JobOutcome, RunStatusStore};
use fleetbridge_resolver::{
    partition, CustomerRecord, DeviceRecord, ExceptionStore, ManualFlagStore, TargetEquipment,
};
use fleetbridge_sync::{
    build_payloads, CreateEquipment, DeviceCounters, DeviceSupplies, DispatchOutcome, Dispatcher,
    EquipmentIndex, HttpTargetGateway, SyncPayloadItem, TokenManager, UpdateEquipment,
};

use crate::config::AppConfig;
use crate::error::CliResult;

/// Job names used for locks and the status store.
const JOB_CLASSIFY: &str = "classify";
const JOB_BUILD_PAYLOADS: &str = "build-payloads";
const JOB_APPLY_CREATES: &str = "apply-creates";
const JOB_APPLY_UPDATES: &str = "apply-updates";

fn status_store(config: &AppConfig) -> RunStatusStore {
    RunStatusStore::new(config.paths.status_file())
}

fn load_customers(config: &AppConfig) -> CliResult<Vec<CustomerRecord>> {
    Ok(read_snapshot(&config.paths.customers_snapshot())?)
}

/// Classify the device population into the automatic and manual views and
/// refresh the orphan report.
pub fn classify(config: &AppConfig) -> CliResult<()> {
    let devices: Vec<DeviceRecord> = read_snapshot(&config.paths.devices_snapshot())?;
    let customers = load_customers(config)?;
    let equipment: Vec<TargetEquipment> = read_snapshot(&config.paths.equipment_snapshot())?;
    let exceptions = ExceptionStore::new(config.paths.exceptions_file()).load()?;
    let manual_flags = ManualFlagStore::new(config.paths.manual_flags_file()).load()?;

    let view = partition(&devices, &customers, &exceptions, &manual_flags);

    PayloadFile::new(view.automatic.clone()).write(&config.paths.automatic_view())?;
    PayloadFile::new(view.manual.clone()).write(&config.paths.manual_view())?;

    // Equipment known to the Target but absent from the Source inventory.
    let source_serials: Vec<&str> = devices
        .iter()
        .map(|d| d.serial_number.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let orphans = EquipmentIndex::build(&equipment).orphans(&source_serials);
    PayloadFile::new(orphans.clone()).write(&config.paths.orphans_file())?;

    let detail = format!(
        "automatic={} manual={} orphans={} missing_document={}",
        view.automatic.len(),
        view.manual.len(),
        orphans.len(),
        view.skipped_missing_document
    );
    info!(job = JOB_CLASSIFY, %detail, "classification written");
    status_store(config).record(JOB_CLASSIFY, JobOutcome::ok(&detail))?;
    Ok(())
}

/// Build the create/update payload files from the current snapshots.
pub fn build(config: &AppConfig) -> CliResult<()> {
    let devices: Vec<DeviceRecord> = read_snapshot(&config.paths.devices_snapshot())?;
    let customers = load_customers(config)?;
    let equipment: Vec<TargetEquipment> = read_snapshot(&config.paths.equipment_snapshot())?;
    let exceptions = ExceptionStore::new(config.paths.exceptions_file()).load()?;

    // Counter/supply snapshots are enrichment; a missing file only means
    // fewer specification rows.
    let counters = index_counters(read_snapshot(&config.paths.counters_snapshot()).unwrap_or_else(
        |error| {
            warn!(%error, "counters snapshot unavailable");
            Vec::new()
        },
    ));
    let supplies = index_supplies(read_snapshot(&config.paths.supplies_snapshot()).unwrap_or_else(
        |error| {
            warn!(%error, "supplies snapshot unavailable");
            Vec::new()
        },
    ));

    let index = EquipmentIndex::build(&equipment);
    let bundle = build_payloads(
        &devices,
        &counters,
        &supplies,
        &index,
        &customers,
        &exceptions,
        &config.categories,
        Utc::now(),
    );

    PayloadFile::new(bundle.creations.clone()).write(&config.paths.create_payload())?;
    PayloadFile::new(bundle.updates.clone()).write(&config.paths.update_payload())?;

    let detail = format!(
        "creations={} updates={} unresolved={}",
        bundle.creations.len(),
        bundle.updates.len(),
        bundle.unresolved
    );
    info!(job = JOB_BUILD_PAYLOADS, %detail, "payload files written");
    status_store(config).record(JOB_BUILD_PAYLOADS, JobOutcome::ok(&detail))?;
    Ok(())
}

fn index_counters(blocks: Vec<DeviceCounters>) -> HashMap<Uuid, DeviceCounters> {
    blocks
        .into_iter()
        .filter_map(|b| b.device_id().map(|id| (id, b)))
        .collect()
}

fn index_supplies(blocks: Vec<DeviceSupplies>) -> HashMap<Uuid, DeviceSupplies> {
    blocks
        .into_iter()
        .filter_map(|b| b.device_id().map(|id| (id, b)))
        .collect()
}

/// Which payload files `apply` replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ApplyTarget {
    Creates,
    Updates,
    All,
}

/// Arguments for `apply`.
#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Payload set to replay.
    #[arg(long, value_enum, default_value = "all")]
    pub target: ApplyTarget,
}

/// Replay the generated payload files against the Target API.
pub async fn apply(config: &AppConfig, args: &ApplyArgs) -> CliResult<()> {
    let gateway = Arc::new(HttpTargetGateway::new(
        &config.target.base_url,
        &config.target.api_key,
        &config.target.api_token,
    )?);
    let tokens = TokenManager::new(gateway.clone(), config.paths.token_cache());
    let dispatcher = Dispatcher::new(gateway, tokens, config.dispatch.policy());

    if matches!(args.target, ApplyTarget::Creates | ApplyTarget::All) {
        let file: PayloadFile<CreateEquipment> = PayloadFile::read(&config.paths.create_payload())?;
        let items: Vec<SyncPayloadItem> =
            file.data.into_iter().map(SyncPayloadItem::Create).collect();
        run_job(config, &dispatcher, JOB_APPLY_CREATES, &items).await?;
    }

    if matches!(args.target, ApplyTarget::Updates | ApplyTarget::All) {
        let file: PayloadFile<UpdateEquipment> = PayloadFile::read(&config.paths.update_payload())?;
        let items: Vec<SyncPayloadItem> =
            file.data.into_iter().map(SyncPayloadItem::Update).collect();
        run_job(config, &dispatcher, JOB_APPLY_UPDATES, &items).await?;
    }

    Ok(())
}

async fn run_job(
    config: &AppConfig,
    dispatcher: &Dispatcher<HttpTargetGateway>,
    job: &str,
    items: &[SyncPayloadItem],
) -> CliResult<()> {
    match dispatcher.run(job, &config.paths.lock_dir(), items).await? {
        DispatchOutcome::LockHeld => {
            // Contention is a no-op, logged by the lock itself.
        }
        DispatchOutcome::Completed(summary) => {
            let detail = format!(
                "total={} succeeded={} failed={}{}",
                summary.total,
                summary.succeeded,
                summary.failed,
                if summary.aborted { " aborted" } else { "" }
            );
            let outcome = if summary.aborted {
                JobOutcome::failed(&detail)
            } else {
                JobOutcome::ok(&detail)
            };
            status_store(config).record(job, outcome)?;
        }
    }
    Ok(())
}

/// Arguments for `exception`.
#[derive(Debug, Args)]
pub struct ExceptionArgs {
    /// Document the rule applies to.
    #[arg(long)]
    pub document: String,
    /// Department the rule applies to.
    #[arg(long)]
    pub department: String,
    /// Target customer id the pair is pinned to.
    #[arg(long)]
    pub customer_id: i64,
}

/// Add or update an exception rule.
pub fn exception(config: &AppConfig, args: &ExceptionArgs) -> CliResult<()> {
    let customers = load_customers(config)?;
    let rule = ExceptionStore::new(config.paths.exceptions_file()).upsert(
        &args.document,
        &args.department,
        args.customer_id,
        &customers,
    )?;
    println!(
        "exception saved: {} / {} -> {} ({})",
        rule.document, rule.department_match, rule.target_customer_id,
        if rule.target_customer_description.is_empty() {
            "unknown customer"
        } else {
            rule.target_customer_description.as_str()
        }
    );
    Ok(())
}

/// Arguments for `manual`.
#[derive(Debug, Args)]
pub struct ManualArgs {
    /// Document to flag.
    #[arg(long)]
    pub document: String,
    /// Remove the flag instead of setting it.
    #[arg(long)]
    pub clear: bool,
}

/// Flag or unflag a document for manual review.
pub fn manual(config: &AppConfig, args: &ManualArgs) -> CliResult<()> {
    let set = ManualFlagStore::new(config.paths.manual_flags_file())
        .set(&args.document, !args.clear)?;
    println!(
        "{} manual flag for {} ({} document(s) flagged)",
        if args.clear { "cleared" } else { "set" },
        args.document,
        set.len()
    );
    Ok(())
}

/// Print last-run outcomes and payload file metadata.
pub fn status(config: &AppConfig) -> CliResult<()> {
    let store = status_store(config);
    let all = store.all()?;
    if all.is_empty() {
        println!("no recorded runs");
    }
    for (job, outcome) in &all {
        println!(
            "{job}: {} at {} ({})",
            if outcome.ok { "ok" } else { "FAILED" },
            outcome.finished_at.format("%Y-%m-%d %H:%M:%S"),
            outcome.detail
        );
    }

    for (label, path) in [
        ("create payload", config.paths.create_payload()),
        ("update payload", config.paths.update_payload()),
    ] {
        match PayloadFile::<serde_json::Value>::read(&path) {
            Ok(file) => println!(
                "{label}: {} item(s), generated {}",
                file.meta.count,
                file.meta.generated_at.format("%Y-%m-%d %H:%M:%S")
            ),
            Err(_) => println!("{label}: not generated yet"),
        }
    }
    Ok(())
}
