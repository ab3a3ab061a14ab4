use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::workflows::allocation::domain::{AnalystProfile, AnalystScore, JobSnapshot};
use crate::workflows::allocation::weighting::DistributionConfig;

pub(crate) const SPECIALIZATION_CAP: u8 = 30;
pub(crate) const CLIENT_FIT_CAP: u8 = 25;
pub(crate) const LOAD_CAP: u8 = 20;
pub(crate) const APPROVAL_CAP: u8 = 15;
pub(crate) const SPEED_CAP: u8 = 10;

/// Successful placements with a client beyond which client fit stops growing.
const CLIENT_SATURATION: u32 = 5;
/// Half of the approval cap, rounded, for analysts without submissions.
pub(crate) const NEUTRAL_APPROVAL_POINTS: u8 = 8;
pub(crate) const NEUTRAL_SPEED_POINTS: u8 = 5;
/// Response time at which the speed score halves.
const RESPONSE_REFERENCE_HOURS: f64 = 24.0;

/// Normalised inputs in [0, 1] behind each sub-score.
pub(crate) struct ScoreSignals {
    pub matched_stack: usize,
    pub required_stack: usize,
    pub engagements: u32,
    pub current_load: u32,
    pub capacity: u32,
    pub specialization: f64,
    pub client_fit: f64,
    pub availability: f64,
    pub approval: Option<f64>,
    pub speed: Option<f64>,
}

fn normalise_tag(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub(crate) fn stack_overlap(job: &JobSnapshot, analyst: &AnalystProfile) -> (usize, usize) {
    let required: BTreeSet<String> = job
        .required_stack
        .iter()
        .map(|tag| normalise_tag(tag))
        .filter(|tag| !tag.is_empty())
        .collect();
    let known: BTreeSet<String> = analyst
        .specialization_tags
        .iter()
        .map(|tag| normalise_tag(tag))
        .collect();

    (required.intersection(&known).count(), required.len())
}

pub(crate) fn specialization_factor(matched: usize, required: usize) -> f64 {
    if required == 0 {
        return 0.5;
    }
    matched as f64 / required as f64
}

pub(crate) fn client_factor(engagements: u32) -> f64 {
    f64::from(engagements.min(CLIENT_SATURATION)) / f64::from(CLIENT_SATURATION)
}

pub(crate) fn availability_factor(current_load: u32, capacity: u32) -> f64 {
    if capacity == 0 || current_load >= capacity {
        return 0.0;
    }
    1.0 - f64::from(current_load) / f64::from(capacity)
}

pub(crate) fn approval_factor(approved: u32, total: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(f64::from(approved.min(total)) / f64::from(total))
}

pub(crate) fn speed_factor(mean_response_hours: Option<f64>) -> Option<f64> {
    mean_response_hours
        .filter(|hours| hours.is_finite() && *hours >= 0.0)
        .map(|hours| RESPONSE_REFERENCE_HOURS / (RESPONSE_REFERENCE_HOURS + hours))
}

pub(crate) fn points(factor: f64, cap: u8) -> u8 {
    let scaled = (factor.clamp(0.0, 1.0) * f64::from(cap)).round();
    (scaled as u8).min(cap)
}

pub(crate) fn signals(
    job: &JobSnapshot,
    analyst: &AnalystProfile,
    config: &DistributionConfig,
) -> ScoreSignals {
    let (matched_stack, required_stack) = stack_overlap(job, analyst);
    let engagements = analyst.successful_engagements_with(job.client_id);
    let capacity = config.capacity_for(analyst);

    ScoreSignals {
        matched_stack,
        required_stack,
        engagements,
        current_load: analyst.active_candidates,
        capacity,
        specialization: specialization_factor(matched_stack, required_stack),
        client_fit: client_factor(engagements),
        availability: availability_factor(analyst.active_candidates, capacity),
        approval: approval_factor(analyst.approved_submissions, analyst.total_submissions),
        speed: speed_factor(analyst.mean_response_hours),
    }
}

pub(crate) fn score_analyst(
    job: &JobSnapshot,
    analyst: &AnalystProfile,
    config: &DistributionConfig,
) -> AnalystScore {
    let signals = signals(job, analyst, config);

    let specialization = points(signals.specialization, SPECIALIZATION_CAP);
    let client_fit = points(signals.client_fit, CLIENT_FIT_CAP);
    let load = points(signals.availability, LOAD_CAP);
    let approval_rate = signals
        .approval
        .map(|ratio| points(ratio, APPROVAL_CAP))
        .unwrap_or(NEUTRAL_APPROVAL_POINTS);
    let speed = signals
        .speed
        .map(|ratio| points(ratio, SPEED_CAP))
        .unwrap_or(NEUTRAL_SPEED_POINTS);
    let total = specialization + client_fit + load + approval_rate + speed;

    let contributions = contributions(&signals, config);
    let weighted: f64 = contributions.iter().map(|(weight, _)| weight).sum();

    AnalystScore {
        analyst_id: analyst.id,
        analyst_name: analyst.name.clone(),
        specialization,
        client_fit,
        load,
        approval_rate,
        speed,
        total,
        weighted_fit: weighted.round().clamp(0.0, 100.0) as u8,
        band: config.band_for(total),
        current_load: signals.current_load,
        capacity: signals.capacity,
        justification: justification(&signals, contributions),
        ai_summary: None,
    }
}

/// Configured weight times normalised factor, paired with the phrase describing it.
fn contributions(signals: &ScoreSignals, config: &DistributionConfig) -> Vec<(f64, String)> {
    let weights = &config.weights;

    let stack = if signals.required_stack == 0 {
        "no required stack listed".to_string()
    } else {
        format!(
            "stack fit ({}/{} required technologies)",
            signals.matched_stack, signals.required_stack
        )
    };
    let client = if signals.engagements == 0 {
        "no prior placements with this client".to_string()
    } else {
        format!(
            "client history ({} successful placements)",
            signals.engagements
        )
    };
    let availability = format!(
        "availability ({}/{} candidates)",
        signals.current_load, signals.capacity
    );
    let success = match signals.approval {
        Some(ratio) => format!("approval rate {:.0}%", ratio * 100.0),
        None => "no submission history yet".to_string(),
    };

    vec![
        (f64::from(weights.stack_fit) * signals.specialization, stack),
        (f64::from(weights.client_fit) * signals.client_fit, client),
        (
            f64::from(weights.availability) * signals.availability,
            availability,
        ),
        (
            f64::from(weights.success_rate) * signals.approval.unwrap_or(0.5),
            success,
        ),
    ]
}

fn justification(signals: &ScoreSignals, mut contributions: Vec<(f64, String)>) -> String {
    contributions.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let drivers: Vec<String> = contributions
        .into_iter()
        .filter(|(weight, _)| *weight > 0.0)
        .take(2)
        .map(|(_, phrase)| phrase)
        .collect();

    let mut text = if drivers.is_empty() {
        "No strong factors for this job".to_string()
    } else {
        format!("Strongest factors: {}", drivers.join(", "))
    };

    if signals.capacity > 0 && signals.current_load >= signals.capacity {
        text.push_str(&format!(
            "; at capacity ({}/{})",
            signals.current_load, signals.capacity
        ));
    }

    text
}
