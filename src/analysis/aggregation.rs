use crate::models::aggregate::{
    BarDatum, DistributionSlice, RadialDatum, StackedDatum, TeamShare, TeamTotals,
};
use crate::models::goal::Goal;

/// Rounds halves upwards, so 12.5 → 13 and -12.5 → -12.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn raw_percent(goal: &Goal) -> f64 {
    if goal.target > 0.0 {
        goal.current / goal.target * 100.0
    } else {
        0.0
    }
}

/// Completion percent of a single goal (0–100, rounded)
pub fn per_goal_percent(goal: &Goal) -> i64 {
    if goal.target > 0.0 {
        round_half_up(raw_percent(goal)).clamp(0, 100)
    } else {
        0
    }
}

/// Sums over the whole list; `pct` is kept unrounded.
pub fn team_totals(goals: &[Goal]) -> TeamTotals {
    let target_sum: f64 = goals.iter().map(|g| g.target).sum();
    let current_sum: f64 = goals.iter().map(|g| g.current).sum();
    let pct = if target_sum > 0.0 {
        (current_sum / target_sum * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    TeamTotals {
        target_sum,
        current_sum,
        pct,
    }
}

/// Goals that have made any progress, as part-of-whole entries.
pub fn team_share(goals: &[Goal]) -> Vec<TeamShare> {
    goals
        .iter()
        .filter(|g| g.current > 0.0)
        .map(|g| TeamShare {
            team: g.team.clone(),
            current: g.current,
        })
        .collect()
}

pub fn bar_data(goals: &[Goal]) -> Vec<BarDatum> {
    goals
        .iter()
        .map(|g| BarDatum {
            name: if g.team.is_empty() {
                g.title.clone()
            } else {
                g.team.clone()
            },
            target: g.target,
            current: g.current,
            // Over-achievement stays visible on the bar label.
            percent: round_half_up(raw_percent(g)),
        })
        .collect()
}

pub fn radial_data(goals: &[Goal]) -> Vec<RadialDatum> {
    goals
        .iter()
        .map(|g| RadialDatum {
            name: g.team.clone(),
            percent: per_goal_percent(g),
        })
        .collect()
}

pub fn stacked_data(goals: &[Goal]) -> Vec<StackedDatum> {
    goals
        .iter()
        .map(|g| StackedDatum {
            name: g.team.clone(),
            current: g.current,
            remaining: (g.target - g.current).max(0.0),
        })
        .collect()
}

pub fn overall_distribution(totals: &TeamTotals) -> Vec<DistributionSlice> {
    vec![
        DistributionSlice {
            name: "current".to_string(),
            value: totals.current_sum,
        },
        DistributionSlice {
            name: "remaining".to_string(),
            value: (totals.target_sum - totals.current_sum).max(0.0),
        },
    ]
}

/// "current / target (pct%)" with one decimal on the percentage.
pub fn format_totals(totals: &TeamTotals) -> String {
    format!(
        "{} / {} ({:.1}%)",
        totals.current_sum, totals.target_sum, totals.pct
    )
}

/// Management view ordering: most recently created first.
pub fn sort_newest_first(goals: &mut [Goal]) {
    goals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Dashboard ordering: team name ascending, case-insensitive.
pub fn sort_by_team(goals: &mut [Goal]) {
    goals.sort_by(|a, b| {
        a.team
            .to_lowercase()
            .cmp(&b.team.to_lowercase())
            .then_with(|| a.team.cmp(&b.team))
            .then_with(|| a.id.cmp(&b.id))
    });
}
