// Recognizes zone and level changes in client log lines.

const ZONE_MARKER: &str = "You have entered ";
const LEVEL_MARKER: &str = "is now level ";

/// A state change carried by one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Zone(String),
    Level(u32),
}

/// Classify a single complete log line.
///
/// Zone lines win over level lines; anything else yields `None`. A level line
/// whose number does not parse is logged and ignored.
pub fn classify(line: &str) -> Option<LineEvent> {
    if let Some(rest) = after_marker(line, ZONE_MARKER) {
        let zone = rest.trim();
        let zone = zone.strip_suffix('.').unwrap_or(zone);
        return Some(LineEvent::Zone(zone.to_string()));
    }

    let rest = after_marker(line, LEVEL_MARKER)?;
    let raw = rest.trim();
    match raw.parse::<u32>() {
        Ok(level) => Some(LineEvent::Level(level)),
        Err(e) => {
            tracing::warn!("Ignoring level line with unparsable level '{raw}': {e}");
            None
        }
    }
}

/// Text between the first occurrence of `marker` and the next one (or end of line).
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let (_, rest) = line.split_once(marker)?;
    Some(rest.split(marker).next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_line() {
        let line = "2024/03/01 20:14:05 1234567 cff945b9 [INFO Client 4242] : You have entered The Coast.\r\n";
        assert_eq!(classify(line), Some(LineEvent::Zone("The Coast".into())));
    }

    #[test]
    fn test_zone_keeps_inner_periods() {
        assert_eq!(
            classify("You have entered Lioneye's Watch.\n"),
            Some(LineEvent::Zone("Lioneye's Watch".into()))
        );
        assert_eq!(
            classify("You have entered St. Elsewhere.\n"),
            Some(LineEvent::Zone("St. Elsewhere".into()))
        );
    }

    #[test]
    fn test_level_line() {
        let line = "2024/03/01 20:20:11 [INFO Client 4242] : : Witchy (Witch) is now level 12\n";
        assert_eq!(classify(line), Some(LineEvent::Level(12)));
    }

    #[test]
    fn test_bad_level_is_ignored() {
        assert_eq!(classify(": Witchy (Witch) is now level twelve\n"), None);
        assert_eq!(classify(": Witchy (Witch) is now level -3\n"), None);
    }

    #[test]
    fn test_unrelated_line() {
        assert_eq!(classify("[DEBUG Client 4242] Connecting to instance server\n"), None);
        assert_eq!(classify("\n"), None);
    }

    #[test]
    fn test_zone_marker_takes_precedence() {
        assert_eq!(
            classify("You have entered The Ledge. Someone is now level 7\n"),
            Some(LineEvent::Zone("The Ledge. Someone is now level 7".into()))
        );
    }

    #[test]
    fn test_repeated_marker_uses_first_segment() {
        assert_eq!(
            classify("You have entered A. You have entered B.\n"),
            Some(LineEvent::Zone("A".into()))
        );
    }
}
