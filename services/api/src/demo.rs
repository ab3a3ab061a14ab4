use crate::infra::{build_allocation_service, parse_date, AllocationApi, Catalog};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::PathBuf;
use talent_ai::config::AppConfig;
use talent_ai::error::AppError;
use talent_ai::workflows::allocation::{
    AllocationFlow, AnalystId, CandidateId, JobId, JobPrioritization, RankingOutcome,
    RoutingOutcome, UserId,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Job to allocate
    #[arg(long, default_value_t = 1)]
    pub(crate) job: u64,
    /// Candidate applications routed after the decision
    #[arg(long, default_value_t = 8)]
    pub(crate) candidates: u64,
    /// Per-analyst candidate ceiling for the attached analysts
    #[arg(long)]
    pub(crate) max_candidates: Option<u32>,
    /// Swap the last suggested analyst for this one (records a manual override)
    #[arg(long)]
    pub(crate) override_with: Option<u64>,
    /// Override reason code used with --override-with
    #[arg(long, default_value = "balanceamento_carga")]
    pub(crate) reason: String,
    /// Remove the first chosen analyst at the end and redistribute their candidates
    #[arg(long)]
    pub(crate) remove_first: bool,
    /// Annotate top analysts with generated one-line summaries
    #[arg(long)]
    pub(crate) narrate: bool,
    /// JSON catalog with `jobs` and `analysts`; defaults to the built-in sample
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct PriorityReportArgs {
    /// Reference date for deadline and time-open factors (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Restrict the report to these job ids (repeatable)
    #[arg(long = "job")]
    pub(crate) jobs: Vec<u64>,
    /// JSON catalog with `jobs` and `analysts`; defaults to the built-in sample
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) fn run_priority_report(args: PriorityReportArgs) -> Result<(), AppError> {
    let PriorityReportArgs {
        today,
        jobs,
        catalog,
    } = args;

    let config = AppConfig::load()?;
    let service = build_allocation_service(
        &config.allocation,
        Catalog::load(catalog.as_deref())?,
        false,
    )?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let job_ids: Vec<JobId> = jobs.into_iter().map(JobId).collect();

    let report = service.prioritize_jobs(&job_ids, today)?;
    render_priorities(&report);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        job,
        candidates,
        max_candidates,
        override_with,
        reason,
        remove_first,
        narrate,
        catalog,
    } = args;

    let config = AppConfig::load()?;
    let service = build_allocation_service(
        &config.allocation,
        Catalog::load(catalog.as_deref())?,
        narrate,
    )?;
    let job_id = JobId(job);
    let operator = UserId("demo.operator".to_string());

    println!("Allocation demo for job {job_id}");
    let outcome = service.rank(job_id).await?;
    render_ranking(&outcome);

    let mut flow = AllocationFlow::new(job_id, operator.clone());
    flow.present(outcome)?;
    let request = match override_with {
        Some(analyst) => {
            flow.begin_manual_selection()?;
            if let Some(last) = flow.selection().last().copied() {
                flow.toggle(last)?;
            }
            flow.toggle(AnalystId(analyst))?;
            flow.review()?;
            flow.confirm(
                Some(format!("operator preferred analyst {analyst}")),
                Some(reason),
            )?
        }
        None => {
            flow.accept_suggestion()?;
            flow.confirm(None, None)?
        }
    };

    let decision = service.record_decision(request)?;
    flow.recorded(decision.clone())?;
    println!(
        "\nDecision #{} recorded as {} | chosen {}",
        decision.id,
        decision.decision_type.label(),
        join_ids(&decision.chosen)
    );
    if let Some(code) = decision.override_reason {
        println!("- override reason: {}", code.code());
    }

    let applied = service.apply_decision(job_id, decision.id, max_candidates)?;
    println!("- {} analyst(s) attached to the job", applied.attached.len());

    println!("\nRouting {candidates} candidate application(s)");
    for candidate in 1..=candidates {
        match service.distribution().route(job_id, CandidateId(candidate))? {
            RoutingOutcome::Assigned { event } => {
                println!("  - candidate {candidate} -> analyst {}", event.analyst_id)
            }
            RoutingOutcome::Queued { reason, .. } => {
                println!("  - candidate {candidate} queued ({reason})")
            }
        }
    }
    render_distribution(&service, job_id)?;

    if remove_first {
        if let Some(first) = decision.chosen.first().copied() {
            println!("\nRemoving analyst {first} with redistribution");
            match service.distribution().remove_analyst(
                job_id,
                first,
                true,
                &operator,
                Some("demo removal"),
            ) {
                Ok(report) => {
                    for event in &report.redistributed {
                        println!(
                            "  - candidate {} moved to analyst {}",
                            event.candidate_id, event.analyst_id
                        );
                    }
                    render_distribution(&service, job_id)?;
                }
                Err(err) => println!("  - removal rejected: {err}"),
            }
        }
    }

    Ok(())
}

fn join_ids(ids: &[AnalystId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_ranking(outcome: &RankingOutcome) {
    match outcome.config_version {
        Some(version) => println!("Ranking (distribution config v{version})"),
        None => println!("Ranking (built-in defaults)"),
    }
    for (position, score) in outcome.scores.iter().enumerate() {
        println!(
            "{:>2}. {:<14} total {:>3} | spec {:>2} client {:>2} load {:>2} approval {:>2} speed {:>2} | {} ({}/{})",
            position + 1,
            score.analyst_name,
            score.total,
            score.specialization,
            score.client_fit,
            score.load,
            score.approval_rate,
            score.speed,
            score.band.label(),
            score.current_load,
            score.capacity,
        );
        println!("    {}", score.justification);
        if let Some(summary) = &score.ai_summary {
            println!("    AI: {summary}");
        }
    }
    println!("Suggested: {}", join_ids(&outcome.suggested));
    if outcome.degraded {
        println!("(AI summaries unavailable for this ranking)");
    }
}

fn render_distribution(service: &AllocationApi, job_id: JobId) -> Result<(), AppError> {
    let distribution = service.distribution();
    println!("\nDistribution for job {job_id}");
    for assignment in distribution.list_assignments(job_id)? {
        let ceiling = assignment
            .max_candidates
            .map(|max| max.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  - #{} analyst {} | {} candidate(s) of {} | {:.2}% | {}",
            assignment.alternation_order,
            assignment.analyst_id,
            assignment.assigned_count,
            ceiling,
            assignment.distribution_percentage,
            if assignment.active { "active" } else { "paused" },
        );
    }
    let queue = distribution.queue(job_id)?;
    if !queue.is_empty() {
        println!("  - {} candidate(s) waiting for capacity", queue.len());
    }
    Ok(())
}

fn render_priorities(report: &JobPrioritization) {
    println!("Job priorities as of {}", report.today);
    for (position, job) in report.jobs.iter().enumerate() {
        println!(
            "{:>2}. [{:>6.2}] job {} {} ({}{})",
            position + 1,
            job.score,
            job.job_id,
            job.title,
            job.urgency_label,
            if job.vip_bonus_applied { ", VIP" } else { "" },
        );
        println!("    {}", job.justification);
    }
}
