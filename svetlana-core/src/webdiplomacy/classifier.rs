use chrono::{DateTime, Duration, Utc};

use svetlana_common::models::{GamePhase, GameSnapshot};

/// Whole hours left at which we start listing who isn't ready.
pub const CRITICAL_WINDOW_HOURS: i64 = 2;

/// Classifies `snapshot` against the current wall clock.
pub fn classify(snapshot: &GameSnapshot) -> GamePhase {
    classify_at(snapshot, Utc::now())
}

/// Maps a snapshot to exactly one phase. First matching rule wins:
///
/// 1. pregame
/// 2. a winner
/// 3. a draw
/// 4. no deadline in the future (a new round is starting)
/// 5. the countdown: whole days if at least one day is left, the critical
///    window if at most two whole hours are left, a plain countdown otherwise
pub fn classify_at(snapshot: &GameSnapshot, now: DateTime<Utc>) -> GamePhase {
    if snapshot.is_pregame {
        return GamePhase::Pregame;
    }
    if let Some(winner) = &snapshot.winner {
        return GamePhase::Won(winner.clone());
    }
    if !snapshot.drawn_with.is_empty() {
        return GamePhase::Drawn(snapshot.drawn_with.clone());
    }

    let remaining = match snapshot.deadline {
        Some(deadline) if deadline > now => deadline - now,
        _ => return GamePhase::RoundTransition,
    };

    if remaining >= Duration::days(1) {
        let days = u32::try_from(remaining.num_days()).unwrap_or(u32::MAX);
        GamePhase::CountdownDays(days)
    } else if remaining.num_hours() <= CRITICAL_WINDOW_HOURS {
        GamePhase::CountdownHoursCritical(snapshot.not_ready.clone())
    } else {
        GamePhase::CountdownNormal
    }
}
