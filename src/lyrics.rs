//! LRC parsing for remote lyric payloads plus the position-to-line lookup
//! the now-playing pane uses for synced highlighting.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub timestamp_ms: Option<u32>,
    pub text: String,
}

/// Parses raw LRC text. Metadata tags are skipped, lines carrying several
/// timestamps are expanded into one entry per timestamp, and the result is
/// sorted by time with untimed lines last.
pub fn parse_lrc(input: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for raw_line in input.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() || is_metadata_line(line) {
            continue;
        }

        let (timestamps, text) = parse_line_timestamps(line);
        if timestamps.is_empty() {
            lines.push(LyricLine {
                timestamp_ms: None,
                text: text.to_string(),
            });
            continue;
        }
        for timestamp_ms in timestamps {
            lines.push(LyricLine {
                timestamp_ms: Some(timestamp_ms),
                text: text.to_string(),
            });
        }
    }

    lines.sort_by_key(|line| line.timestamp_ms.unwrap_or(u32::MAX));
    lines
}

/// Index of the lyric line active at `position_ms`: the last line whose
/// timestamp is at or before the position. None before the first line.
pub fn active_line(lines: &[LyricLine], position_ms: u32) -> Option<usize> {
    let mut active = None;
    for (idx, line) in lines.iter().enumerate() {
        match line.timestamp_ms {
            Some(timestamp) if timestamp <= position_ms => active = Some(idx),
            Some(_) => break,
            None => break,
        }
    }
    active
}

fn is_metadata_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("[ar:")
        || lower.starts_with("[ti:")
        || lower.starts_with("[al:")
        || lower.starts_with("[by:")
        || lower.starts_with("[offset:")
        || lower.starts_with("[length:")
}

fn parse_line_timestamps(input: &str) -> (Vec<u32>, &str) {
    let mut remaining = input;
    let mut out = Vec::new();

    while remaining.starts_with('[') {
        let Some(closing_idx) = remaining.find(']') else {
            break;
        };
        let token = &remaining[..=closing_idx];
        let Some(ms) = parse_timestamp(token) else {
            break;
        };
        out.push(ms);
        remaining = &remaining[closing_idx + 1..];
    }

    (out, remaining.trim_start())
}

fn parse_timestamp(token: &str) -> Option<u32> {
    if !(token.starts_with('[') && token.ends_with(']')) {
        return None;
    }
    let content = &token[1..token.len().saturating_sub(1)];
    let mut parts = content.split(':');
    let minutes = parts.next()?.parse::<u32>().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let mut seconds_parts = seconds_part.split('.');
    let seconds = seconds_parts.next()?.parse::<u32>().ok()?;
    let fraction_raw = seconds_parts.next().unwrap_or("0");
    if seconds_parts.next().is_some() {
        return None;
    }

    let fraction_2 = if fraction_raw.is_empty() {
        0
    } else if fraction_raw.len() == 1 {
        fraction_raw.parse::<u32>().ok()?.saturating_mul(10)
    } else {
        fraction_raw
            .chars()
            .take(2)
            .collect::<String>()
            .parse::<u32>()
            .ok()?
    };

    Some(
        minutes
            .saturating_mul(60_000)
            .saturating_add(seconds.saturating_mul(1000))
            .saturating_add(fraction_2.saturating_mul(10)),
    )
}
