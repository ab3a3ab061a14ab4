use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use crate::workflows::allocation::domain::{JobId, JobSnapshot, UrgencyTier};
use crate::workflows::allocation::weighting::PrioritizationConfig;

const DEADLINE_HORIZON_DAYS: f64 = 60.0;
const TIME_OPEN_HORIZON_DAYS: f64 = 90.0;
const COMPLEX_STACK_SIZE: f64 = 8.0;

/// Urgency score for one open job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPriority {
    pub job_id: JobId,
    pub title: String,
    pub score: f64,
    pub weighted_base: f64,
    pub urgency: UrgencyTier,
    pub urgency_label: &'static str,
    pub vip_bonus_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    pub justification: String,
}

fn deadline_factor(deadline: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match deadline {
        None => 0.0,
        Some(deadline) => {
            let days = (deadline - today).num_days();
            if days <= 0 {
                1.0
            } else {
                (1.0 - days as f64 / DEADLINE_HORIZON_DAYS).max(0.0)
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn score_job(job: &JobSnapshot, config: &PrioritizationConfig, today: NaiveDate) -> JobPriority {
    let weights = &config.weights;
    let days_open = (today - job.opened_on).num_days().max(0) as f64;

    let factors = [
        (
            weights.deadline_urgency,
            deadline_factor(job.deadline, today),
            "deadline urgency",
        ),
        (
            weights.billing_value,
            (f64::from(job.billing_value) / f64::from(config.billing_reference.max(1))).min(1.0),
            "billing value",
        ),
        (
            weights.time_open,
            (days_open / TIME_OPEN_HORIZON_DAYS).min(1.0),
            "time open",
        ),
        (
            weights.stack_complexity,
            (job.required_stack.len() as f64 / COMPLEX_STACK_SIZE).min(1.0),
            "stack complexity",
        ),
    ];

    let weighted_base: f64 = factors
        .iter()
        .map(|(weight, factor, _)| f64::from(*weight) * factor)
        .sum();
    let dominant = factors
        .iter()
        .map(|(weight, factor, label)| (f64::from(*weight) * factor, *label))
        .filter(|(contribution, _)| *contribution > 0.0)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let multiplier = f64::from(config.multipliers.for_tier(job.urgency));
    let vip_bonus_applied = job.client_vip && config.vip_bonus > 0;
    let bonus = if vip_bonus_applied {
        f64::from(config.vip_bonus)
    } else {
        0.0
    };
    let score = weighted_base * multiplier + bonus;

    let mut justification = match dominant {
        Some((_, label)) => format!("driven by {label}"),
        None => "no urgency signals".to_string(),
    };
    justification.push_str(&format!(
        "; {} tier x{:.2}",
        job.urgency.label(),
        multiplier
    ));
    if vip_bonus_applied {
        justification.push_str(&format!("; VIP client +{}", config.vip_bonus));
    }

    JobPriority {
        job_id: job.id,
        title: job.title.clone(),
        score: round2(score),
        weighted_base: round2(weighted_base),
        urgency: job.urgency,
        urgency_label: job.urgency.label(),
        vip_bonus_applied,
        deadline: job.deadline,
        justification,
    }
}

/// Order jobs by urgency, most urgent first. Ties fall back to the earlier deadline, then job id.
pub fn prioritize(
    jobs: &[JobSnapshot],
    config: &PrioritizationConfig,
    today: NaiveDate,
) -> Vec<JobPriority> {
    let mut ranked: Vec<JobPriority> = jobs
        .iter()
        .map(|job| score_job(job, config, today))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| match (a.deadline, b.deadline) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::allocation::domain::ClientId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn job(id: u64, deadline: Option<NaiveDate>, urgency: UrgencyTier) -> JobSnapshot {
        JobSnapshot {
            id: JobId(id),
            title: format!("Job {id}"),
            client_id: ClientId(1),
            client_vip: false,
            required_stack: vec!["rust".to_string(), "postgres".to_string()],
            opened_on: date(2025, 1, 1),
            deadline,
            billing_value: 10_000,
            urgency,
        }
    }

    #[test]
    fn overdue_jobs_outrank_distant_deadlines() {
        let today = date(2025, 2, 1);
        let jobs = vec![
            job(1, Some(date(2025, 5, 1)), UrgencyTier::Medium),
            job(2, Some(date(2025, 1, 20)), UrgencyTier::Medium),
        ];

        let ranked = prioritize(&jobs, &PrioritizationConfig::default(), today);

        assert_eq!(ranked[0].job_id, JobId(2));
        assert!(ranked[0].justification.contains("deadline urgency"));
    }

    #[test]
    fn vip_bonus_and_tier_multiplier_apply() {
        let today = date(2025, 2, 1);
        let mut vip = job(1, None, UrgencyTier::Critical);
        vip.client_vip = true;
        let plain = job(2, None, UrgencyTier::Critical);

        let config = PrioritizationConfig::default();
        let ranked = prioritize(&[plain, vip], &config, today);

        assert_eq!(ranked[0].job_id, JobId(1));
        assert!(ranked[0].vip_bonus_applied);
        let gap = ranked[0].score - ranked[1].score;
        assert!((gap - f64::from(config.vip_bonus)).abs() < 0.02);
    }

    #[test]
    fn ties_break_on_deadline_then_id() {
        let today = date(2025, 2, 1);
        let mut config = PrioritizationConfig::default();
        config.weights.deadline_urgency = 0;
        config.weights.billing_value = 50;
        config.weights.time_open = 50;
        config.weights.stack_complexity = 0;

        let jobs = vec![
            job(9, None, UrgencyTier::Medium),
            job(4, Some(date(2025, 6, 1)), UrgencyTier::Medium),
            job(3, None, UrgencyTier::Medium),
        ];
        let ranked = prioritize(&jobs, &config, today);

        let order: Vec<u64> = ranked.iter().map(|entry| entry.job_id.0).collect();
        assert_eq!(order, vec![4, 3, 9]);
    }
}
