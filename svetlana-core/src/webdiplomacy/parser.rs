//! Turns a WebDiplomacy board page into a [`GameSnapshot`].
//!
//! Extraction is line by line: each trimmed line is checked against every
//! field pattern and lines that match nothing are skipped. List fields keep
//! document order, single-valued fields keep their first match.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use svetlana_common::models::GameSnapshot;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Defeated,
    Drawn,
    Ready,
    NotReady,
    Won,
    Deadline,
    Pregame,
    MapLink,
}

static PATTERNS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    [
        (Field::Defeated, r#"memberCountryName.*memberStatusDefeated">(.*?)<"#),
        (Field::Drawn, r#"memberCountryName.*memberStatusDrawn">(.*?)<"#),
        (Field::Ready, r#"memberCountryName.*tick.*rStatusPlaying">(.*?)<"#),
        (Field::NotReady, r#"memberCountryName.*alert.*StatusPlaying">(.*?)<"#),
        (Field::Won, r#"memberCountryName.*memberStatusWon">(.*?)<"#),
        (Field::Deadline, r#"gameTimeRemaining.*unixtime="([0-9]+)""#),
        (Field::Pregame, r#"(memberPreGameList)">"#),
        (Field::MapLink, r#"id="mapImage"[^>]*src="([^"]+)""#),
    ]
    .into_iter()
    .map(|(field, pattern)| (field, Regex::new(pattern).expect("board pattern compiles")))
    .collect()
});

/// Parses a board page.
///
/// Fails only when the input is not a board at all (blank, or not a single
/// recognised line) or when it carries a deadline we cannot represent.
pub fn parse(document: &str) -> Result<GameSnapshot, Error> {
    if document.trim().is_empty() {
        return Err(Error::Parse("empty board document".into()));
    }

    let mut snapshot = GameSnapshot::default();
    let mut matched_lines = 0usize;

    for line in document.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut matched = false;
        for (field, regex) in PATTERNS.iter() {
            let Some(caps) = regex.captures(line) else {
                continue;
            };
            matched = true;
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            apply(&mut snapshot, *field, value)?;
        }
        if matched {
            matched_lines += 1;
        }
    }

    if matched_lines == 0 {
        return Err(Error::Parse("document does not look like a game board".into()));
    }

    debug!("Parsed board: {:?}", snapshot);
    Ok(snapshot)
}

fn apply(snapshot: &mut GameSnapshot, field: Field, value: &str) -> Result<(), Error> {
    match field {
        Field::Defeated => snapshot.defeated.push(value.to_string()),
        Field::Drawn => snapshot.drawn_with.push(value.to_string()),
        Field::Ready => snapshot.ready.push(value.to_string()),
        Field::NotReady => snapshot.not_ready.push(value.to_string()),
        Field::Won => {
            if snapshot.winner.is_none() {
                snapshot.winner = Some(value.to_string());
            }
        }
        Field::Deadline => {
            if snapshot.deadline.is_none() {
                snapshot.deadline = Some(parse_unixtime(value)?);
            }
        }
        Field::Pregame => snapshot.is_pregame = true,
        Field::MapLink => {
            if snapshot.resource_link.is_none() {
                snapshot.resource_link = Some(value.to_string());
            }
        }
    }
    Ok(())
}

fn parse_unixtime(value: &str) -> Result<DateTime<Utc>, Error> {
    let secs: i64 = value
        .parse()
        .map_err(|e| Error::Parse(format!("bad deadline timestamp {value:?}: {e}")))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Parse(format!("deadline timestamp {secs} out of range")))
}
