use crate::infra::{in_memory_service, in_memory_service_with_clock, parse_timestamp, LeadService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use lead_desk::config::{ConfigError, LeadWorkflowConfig, MAX_LEASE_TTL_SECS};
use lead_desk::error::AppError;
use lead_desk::workflows::leads::{
    AgentId, Clock, ContactDetails, DispositionRequest, ImportOutcome, ImportRequest, Lead,
    LeadStatus, LeadWorkflowError, ManualClock, ManualLeadRequest, NextLead, PlanDetails,
    QueueOptions, SaleId,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_CSV: &str = "\
First Name,Last Name,Phone,Email,Plan Name,Total Plan Cost,Monthly Payment,Term
Olivia,Park,(512) 555-0410,olivia.park@example.com,Gold Vehicle Service,\"$2,199.00\",$91.63,24
Ethan,Moore,512-555-0411,ethan.moore@example.com,Silver Vehicle Service,\"$1,299.00\",$54.13,24
Zoe,Adams,555-0412,zoe.adams@example.com,Gold Vehicle Service,\"$2,199.00\",$91.63,24
Liam,Chen,512-555-0413,,Platinum Vehicle Service,\"$3,499.00\",$145.79,24
Olivia,Park,512.555.0410,Olivia.Park@example.com,Gold Vehicle Service,\"$2,199.00\",$91.63,24
";

#[derive(Args, Debug)]
pub(crate) struct ImportCheckArgs {
    /// CSV export to validate
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Identity recorded as the importer
    #[arg(long, default_value = "cli")]
    pub(crate) imported_by: String,
    /// Agent the imported leads would be assigned to
    #[arg(long)]
    pub(crate) assign_to: Option<String>,
    /// Maximum number of data rows accepted
    #[arg(long)]
    pub(crate) max_rows: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Starting wall-clock time for the simulated shift (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Lease TTL in minutes for the simulated desk
    #[arg(long, default_value_t = 15)]
    pub(crate) lease_ttl_minutes: i64,
    /// Optional CSV export to import instead of the built-in sample
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

/// Run the import pipeline against a throwaway store and print what would be committed.
pub(crate) fn run_import_check(args: ImportCheckArgs) -> Result<(), AppError> {
    let ImportCheckArgs {
        csv,
        imported_by,
        assign_to,
        max_rows,
    } = args;

    let mut config = LeadWorkflowConfig::default();
    if let Some(max_rows) = max_rows {
        config.import_max_rows = max_rows;
    }

    let service = in_memory_service(config);
    let request = ImportRequest {
        filename: file_label(&csv),
        imported_by: AgentId::new(imported_by),
        assign_to: assign_to.map(AgentId::new),
    };

    let reader = BufReader::new(File::open(&csv)?);
    let outcome = service.import_csv(reader, &request)?;
    render_import(&outcome);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        lease_ttl_minutes,
        csv,
    } = args;

    let clock = Arc::new(ManualClock::new(start.unwrap_or_else(Utc::now)));
    let max_minutes = MAX_LEASE_TTL_SECS / 60;
    let ttl = Duration::try_minutes(lease_ttl_minutes.max(1))
        .filter(|ttl| ttl.num_minutes() as u64 <= max_minutes)
        .ok_or(ConfigError::OutOfRange {
            variable: "--lease-ttl-minutes",
            max: max_minutes,
        })?;
    let service = in_memory_service_with_clock(
        LeadWorkflowConfig {
            lease_ttl: ttl,
            ..LeadWorkflowConfig::default()
        },
        clock.clone(),
    );

    let rosa = AgentId::new("agent-rosa");
    let li = AgentId::new("agent-li");

    println!("Lead desk demo (lease TTL {} min)", ttl.num_minutes());
    println!("\nManual entry");
    let mut created = Vec::new();
    let roster = [
        ("Ava", "512-555-0301"),
        ("Noah", "512-555-0302"),
        ("Mia", "512-555-0303"),
    ];
    for (first_name, phone) in roster {
        let lead = service.create_lead(demo_lead(first_name, phone, &rosa))?;
        println!("- {} {} -> {}", lead.id, lead.contact.full_name(), rosa);
        created.push(lead);
        clock.advance(Duration::minutes(1));
    }

    println!("\nLease contention");
    let contested = created[2].id;
    service.checkout_lead(contested, &rosa)?;
    println!("- {rosa} checked out {contested}");
    service.assign_leads(&[contested], &li)?;
    println!("- admin reassigned {contested} to {li}");
    match service.checkout_lead(contested, &li) {
        Err(err @ LeadWorkflowError::AlreadyLeased { .. }) => println!("- {li}: {err}"),
        Ok(_) => println!("- {li} unexpectedly acquired {contested}"),
        Err(other) => return Err(other.into()),
    }
    clock.advance(ttl);
    let reclaimed = service.checkout_lead(contested, &li)?;
    println!(
        "- {} minutes later {li} reclaimed {} without an explicit release",
        ttl.num_minutes(),
        reclaimed.id
    );

    println!("\nWorking {rosa}'s queue");
    let fresh_only = QueueOptions {
        include_callbacks: false,
        prioritize_callbacks: true,
    };
    let first = next_for(&service, &rosa, QueueOptions::default())?;
    let callback_at = clock.now() + Duration::hours(1);
    let first = service.dispose_lead(
        first.id,
        &rosa,
        DispositionRequest {
            status: LeadStatus::Callback,
            notes: Some("wants to talk after work".to_string()),
            callback_at: Some(callback_at),
        },
    )?;
    println!(
        "- {} -> {} at {}",
        first.id,
        first.current_status,
        callback_at.format("%H:%M")
    );

    let second = next_for(&service, &rosa, fresh_only)?;
    let second = service.dispose_lead(
        second.id,
        &rosa,
        DispositionRequest {
            status: LeadStatus::SaleMade,
            notes: Some("signed Gold plan".to_string()),
            callback_at: None,
        },
    )?;
    let link = service.record_conversion(second.id, SaleId("sale-1001".to_string()), &rosa)?;
    println!(
        "- {} -> {} (linked to {})",
        second.id, second.current_status, link.sale_id.0
    );

    match service.next_lead(&rosa, fresh_only)? {
        NextLead::Leased(lead) => println!("- unexpected extra lead {}", lead.id),
        NextLead::NoLeadsAvailable => println!("- queue empty until the callback is due"),
    }

    clock.advance(Duration::hours(1));
    let due = next_for(&service, &rosa, QueueOptions::default())?;
    println!("- one hour later the callback {} is served first", due.id);
    service.release_lead(due.id, &rosa)?;

    println!("\nBatch import");
    let request = ImportRequest {
        filename: csv
            .as_ref()
            .map(|path| file_label(path))
            .unwrap_or_else(|| "demo-sample.csv".to_string()),
        imported_by: AgentId::new("admin-demo"),
        assign_to: Some(li.clone()),
    };
    let outcome = match csv {
        Some(path) => service.import_csv(BufReader::new(File::open(&path)?), &request)?,
        None => service.import_csv(SAMPLE_CSV.as_bytes(), &request)?,
    };
    render_import(&outcome);

    println!("\nAgent stats");
    for agent in [&rosa, &li] {
        let stats = service.lead_stats(agent)?;
        println!(
            "- {}: {} leads | {} available | {} checked out | {} callbacks pending ({} due)",
            stats.agent_id,
            stats.total,
            stats.available,
            stats.checked_out,
            stats.pending_callbacks,
            stats.due_callbacks
        );
        let counts: Vec<String> = stats
            .counts_by_status
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(status, count)| format!("{status}={count}"))
            .collect();
        println!("  {}", counts.join(", "));
    }

    Ok(())
}

fn next_for(
    service: &LeadService,
    agent: &AgentId,
    options: QueueOptions,
) -> Result<Lead, AppError> {
    match service.next_lead(agent, options)? {
        NextLead::Leased(lead) => {
            println!(
                "- next lead for {agent}: {} {}",
                lead.id,
                lead.contact.full_name()
            );
            Ok(lead)
        }
        NextLead::NoLeadsAvailable => Err(LeadWorkflowError::ValidationFailed(format!(
            "no leads available for {agent}"
        ))
        .into()),
    }
}

fn demo_lead(first_name: &str, phone: &str, agent: &AgentId) -> ManualLeadRequest {
    ManualLeadRequest {
        contact: ContactDetails {
            first_name: first_name.to_string(),
            last_name: "Demo".to_string(),
            phone: phone.to_string(),
            email: format!("{}@example.com", first_name.to_ascii_lowercase()),
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            ..ContactDetails::default()
        },
        plan: PlanDetails {
            plan_name: Some("Gold Vehicle Service".to_string()),
            total_plan_cost_cents: 219_900,
            monthly_payment_cents: Some(9_163),
            term_months: Some(24),
        },
        assigned_agent_id: Some(agent.clone()),
    }
}

fn render_import(outcome: &ImportOutcome) {
    println!(
        "- {}: {} rows | {} imported | {} failed",
        outcome.batch_id, outcome.total_rows, outcome.successful_rows, outcome.failed_rows
    );
    for failure in &outcome.failures {
        println!("  row {}: {}", failure.row, failure.reason);
    }
    if let Some(location) = &outcome.error_report_location {
        println!("  error report: {location}");
    }
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
