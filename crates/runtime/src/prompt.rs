use chrono::{DateTime, Utc};

/// System lines prepended to every model call, in order: configured
/// instructions, session system messages, the current UTC date, and the
/// callable tool names.
pub fn system_lines(
    instructions: &[String],
    session_messages: &[String],
    tool_names: &[String],
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(instructions.len() + session_messages.len() + 2);
    lines.extend(instructions.iter().filter(|l| !l.trim().is_empty()).cloned());
    lines.extend(session_messages.iter().filter(|l| !l.trim().is_empty()).cloned());
    lines.push(format!("Current date (UTC): {}", now.format("%Y-%m-%d")));
    if tool_names.is_empty() {
        lines.push("No tools are available in this conversation.".into());
    } else {
        lines.push(format!("Available tools: {}", tool_names.join(", ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lines_are_ordered() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let lines = system_lines(
            &["You are a booking assistant.".into(), "  ".into()],
            &["The customer prefers French.".into()],
            &["booking-change".into(), "booking-lookup".into()],
            now,
        );
        assert_eq!(
            lines,
            vec![
                "You are a booking assistant.",
                "The customer prefers French.",
                "Current date (UTC): 2026-03-14",
                "Available tools: booking-change, booking-lookup",
            ]
        );
    }

    #[test]
    fn no_tools_line() {
        let lines = system_lines(&[], &[], &[], Utc::now());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("No tools"));
    }
}
