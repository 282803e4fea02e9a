use shared::protocol::{ProcessStep, ScoreResult, StepEvent};

/// Share of the overall score taken by completion, in tenths; timing takes
/// the rest.
const COMPLETION_WEIGHT_TENTHS: f64 = 7.0;
const TIME_WEIGHT_TENTHS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdherenceScore {
    pub completion_rate: f64,
    pub time_adherence: f64,
    pub overall_adherence: f64,
}

/// Blends completion and timing into 0..=100 figures, each rounded to a
/// whole number. Events beyond `total_steps` do not count, and a plan with
/// no steps scores zero completion instead of dividing by zero.
pub fn score(
    step_events: &[StepEvent],
    total_steps: usize,
    target_total_seconds: f64,
    actual_total_seconds: f64,
) -> AdherenceScore {
    let completed = step_events.len().min(total_steps);
    let completion = if total_steps == 0 {
        0.0
    } else {
        100.0 * completed as f64 / total_steps as f64
    };

    let time = if target_total_seconds > 0.0 {
        let deviation = (actual_total_seconds - target_total_seconds).abs();
        (100.0 - 100.0 * deviation / target_total_seconds).max(0.0)
    } else {
        100.0
    };

    let overall_tenths = COMPLETION_WEIGHT_TENTHS * completion + TIME_WEIGHT_TENTHS * time;
    AdherenceScore {
        completion_rate: completion.round(),
        time_adherence: time.round(),
        overall_adherence: (overall_tenths / 10.0).round(),
    }
}

/// Full result record for a run the detection service could not score.
pub fn local_result(
    step_events: &[StepEvent],
    steps: &[ProcessStep],
    actual_total_seconds: f64,
) -> ScoreResult {
    let total_steps = steps.len();
    let target_total_seconds: f64 = steps.iter().map(|step| step.target_duration_seconds).sum();
    let figures = score(
        step_events,
        total_steps,
        target_total_seconds,
        actual_total_seconds,
    );

    ScoreResult {
        overall_adherence: figures.overall_adherence,
        completion_rate: figures.completion_rate,
        time_adherence: figures.time_adherence,
        completed_steps: step_events.len().min(total_steps),
        total_steps,
        total_time_seconds: actual_total_seconds,
        target_total_seconds,
        step_details: step_events.to_vec(),
        message: step_events
            .is_empty()
            .then(|| "No steps completed".to_string()),
    }
}

#[cfg(test)]
#[path = "tests/scoring_tests.rs"]
mod tests;
