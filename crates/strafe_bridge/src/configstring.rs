//! Serverinfo configstring parsing and gamestate transition handling.

use std::collections::HashMap;
use tracing::warn;

/// Configstring index carrying the serverinfo key/value blob.
pub const CS_SERVERINFO: u16 = 0;

/// Serverinfo key holding the current gamestate.
pub const GAMESTATE_KEY: &str = "g_gameState";

/// Parses a `\key\value\key\value` blob into a map.
///
/// A blob with an unpaired key is malformed; it is logged and treated as
/// empty rather than guessed at.
pub fn parse_variables(blob: &str) -> HashMap<String, String> {
    let parts: Vec<&str> = blob
        .split('\\')
        .skip_while(|p| p.is_empty())
        .collect();
    if parts.len() % 2 != 0 {
        warn!(blob, "uneven number of keys and values in variable blob");
        return HashMap::new();
    }
    parts
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect()
}

/// What a gamestate change at index 0 means for the event layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamestateTransition {
    /// The pre-game countdown started.
    Countdown,
    /// A known transition with no event of its own.
    Silent,
    /// A pair we have no rule for. Logged by the caller.
    Unknown,
}

/// Classifies a gamestate change. Only called when `old != new`.
pub fn classify_transition(old: &str, new: &str) -> GamestateTransition {
    match (old, new) {
        ("PRE_GAME", "COUNT_DOWN") => GamestateTransition::Countdown,
        ("PRE_GAME", "IN_PROGRESS")
        | ("COUNT_DOWN", "IN_PROGRESS")
        | ("IN_PROGRESS", "PRE_GAME")
        | ("COUNT_DOWN", "PRE_GAME") => GamestateTransition::Silent,
        _ => GamestateTransition::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variables_reads_leading_backslash_blobs() {
        let vars = parse_variables("\\g_gameState\\PRE_GAME\\mapname\\overkill");
        assert_eq!(vars.get(GAMESTATE_KEY).map(String::as_str), Some("PRE_GAME"));
        assert_eq!(vars.get("mapname").map(String::as_str), Some("overkill"));
    }

    #[test]
    fn malformed_blob_parses_as_empty() {
        assert!(parse_variables("\\g_gameState\\PRE_GAME\\dangling").is_empty());
        assert!(parse_variables("").is_empty());
    }

    #[test]
    fn countdown_is_the_only_eventful_transition() {
        assert_eq!(
            classify_transition("PRE_GAME", "COUNT_DOWN"),
            GamestateTransition::Countdown
        );
        for (old, new) in [
            ("PRE_GAME", "IN_PROGRESS"),
            ("COUNT_DOWN", "IN_PROGRESS"),
            ("IN_PROGRESS", "PRE_GAME"),
            ("COUNT_DOWN", "PRE_GAME"),
        ] {
            assert_eq!(classify_transition(old, new), GamestateTransition::Silent);
        }
        assert_eq!(
            classify_transition("IN_PROGRESS", "COUNT_DOWN"),
            GamestateTransition::Unknown
        );
    }
}
