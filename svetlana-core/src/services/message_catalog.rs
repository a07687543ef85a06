use svetlana_common::models::GamePhase;

/// Chat text announcing `phase`, or `None` for phases we track silently.
pub fn render(phase: &GamePhase) -> Option<String> {
    match phase {
        GamePhase::Pregame => None,
        GamePhase::CountdownDays(n) => Some(format!("The game starts in {} days!", n)),
        GamePhase::CountdownHoursCritical(not_ready) if not_ready.is_empty() => {
            Some("Two hours left, everybody's ready!".to_string())
        }
        GamePhase::CountdownHoursCritical(not_ready) => Some(format!(
            "Two hours left! These countries aren't ready: {}",
            not_ready.join(", ")
        )),
        GamePhase::CountdownNormal => None,
        GamePhase::Drawn(names) => Some(format!("The game was a draw between {}!", names.join(", "))),
        GamePhase::Won(name) => Some(format!("{} has won!", name)),
        GamePhase::RoundTransition => Some("Starting new round! Good luck :)".to_string()),
    }
}
