use reflex_grid::scheduler::{Round, RoundResult};

/// `(round_number, reaction_ms)` for every round the player won
pub fn reaction_points(rounds: &[Round]) -> Vec<(f64, f64)> {
    rounds
        .iter()
        .filter_map(|r| match (r.result, r.reaction_time_ms) {
            (Some(RoundResult::Success), Some(ms)) => Some((r.round_number as f64, ms as f64)),
            _ => None,
        })
        .collect()
}

/// Timed-out rounds, pinned at the reaction limit
pub fn miss_points(rounds: &[Round], reaction_limit_ms: u64) -> Vec<(f64, f64)> {
    rounds
        .iter()
        .filter(|r| r.result == Some(RoundResult::Timeout))
        .map(|r| (r.round_number as f64, reaction_limit_ms as f64))
        .collect()
}

/// X (last round) and Y (slowest plotted time) bounds for the results chart
pub fn compute_chart_params(points: &[(f64, f64)], reaction_limit_ms: u64) -> (f64, f64) {
    let last_round = points.iter().map(|p| p.0).fold(1.0, f64::max);
    let slowest = points
        .iter()
        .map(|p| p.1)
        .fold(reaction_limit_ms as f64, f64::max);

    (last_round, slowest.round())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
