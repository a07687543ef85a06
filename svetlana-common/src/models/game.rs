use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything we could read off one WebDiplomacy board at poll time.
///
/// Name lists keep the order in which the board lists them. They are expected
/// to be disjoint but nothing downstream relies on that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameSnapshot {
    /// `None` when the board shows no running countdown.
    pub deadline: Option<DateTime<Utc>>,
    pub defeated: Vec<String>,
    pub drawn_with: Vec<String>,
    pub not_ready: Vec<String>,
    pub ready: Vec<String>,
    pub winner: Option<String>,
    pub is_pregame: bool,
    /// Relative link to the board's map image, only used for display.
    pub resource_link: Option<String>,
}

/// The lifecycle stage of a game as seen from its latest snapshot.
///
/// Stored as JSON in the follow registry, so renaming a variant or its tag
/// is a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "data", rename_all = "snake_case")]
pub enum GamePhase {
    Pregame,
    /// Whole days left on the clock.
    CountdownDays(u32),
    /// At most two whole hours left. Carries whoever hasn't readied up yet.
    CountdownHoursCritical(Vec<String>),
    CountdownNormal,
    Drawn(Vec<String>),
    Won(String),
    /// Deadline passed (or vanished) and nobody won or drew.
    RoundTransition,
}

impl GamePhase {
    pub fn kind(&self) -> &'static str {
        match self {
            GamePhase::Pregame => "pregame",
            GamePhase::CountdownDays(_) => "countdown_days",
            GamePhase::CountdownHoursCritical(_) => "countdown_hours_critical",
            GamePhase::CountdownNormal => "countdown_normal",
            GamePhase::Drawn(_) => "drawn",
            GamePhase::Won(_) => "won",
            GamePhase::RoundTransition => "round_transition",
        }
    }
}
