use std::time::Duration;

use crate::models::CommandSpec;

/// Characters per display row.
pub const LINE_WIDTH: usize = 20;

pub const COMMANDS_HEADER: &str = "COMMANDS v1";

/// Clip `line` to the display width, counting characters rather than bytes.
pub fn truncate(line: &str) -> String {
    line.chars().take(LINE_WIDTH).collect()
}

fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

// An empty row would read as the frame terminator on the display side.
fn content_line(line: &str) -> String {
    let line = truncate(&strip_newlines(line));
    if line.is_empty() {
        " ".to_string()
    } else {
        line
    }
}

/// Serialise display lines into one frame: rows separated by `\n`, followed by
/// a blank terminator row. An empty list still produces the terminator.
pub fn encode<S: AsRef<str>>(lines: &[S]) -> Vec<u8> {
    let mut payload = lines
        .iter()
        .map(|line| content_line(line.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");
    payload.push_str("\n\n");
    payload.into_bytes()
}

pub fn meta_line(interval: Duration) -> String {
    format!("META interval={:.3}", interval.as_secs_f64())
}

/// Lines of the catalog reply, header first, in declaration order.
pub fn commands_lines(commands: &[CommandSpec]) -> Vec<String> {
    let mut lines = Vec::with_capacity(commands.len() + 1);
    lines.push(COMMANDS_HEADER.to_string());
    for command in commands {
        lines.push(format!(
            "{} {}",
            strip_newlines(&command.id),
            strip_newlines(&command.label)
        ));
    }
    lines
}

pub fn commands_frame(commands: &[CommandSpec]) -> Vec<u8> {
    encode(&commands_lines(commands))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(payload: Vec<u8>) -> String {
        String::from_utf8(payload).unwrap()
    }

    #[test]
    fn test_encode_empty_is_terminator_only() {
        let lines: [&str; 0] = [];
        assert_eq!(as_text(encode(&lines)), "\n\n");
    }

    #[test]
    fn test_encode_joins_and_terminates() {
        let text = as_text(encode(&["CPU 12%", "GPU 3%"]));
        assert_eq!(text, "CPU 12%\nGPU 3%\n\n");
    }

    #[test]
    fn test_encode_truncates_long_lines() {
        let text = as_text(encode(&["abcdefghijklmnopqrstuvwxyz", "short"]));
        assert_eq!(text, "abcdefghijklmnopqrst\nshort\n\n");
    }

    #[test]
    fn test_encode_counts_characters_not_bytes() {
        let line = "°".repeat(25);
        let text = as_text(encode(&[line.as_str()]));
        let first = text.lines().next().unwrap();
        assert_eq!(first.chars().count(), LINE_WIDTH);
    }

    #[test]
    fn test_encode_never_emits_early_terminator() {
        let inputs: Vec<Vec<&str>> = vec![
            vec![""],
            vec!["a", ""],
            vec!["multi\nline", "tail\r\n"],
            vec!["x"; 12],
            vec!["a very long line that keeps going and going"],
        ];
        for lines in inputs {
            let text = as_text(encode(&lines));
            assert!(text.ends_with("\n\n"));
            assert!(!text.ends_with("\n\n\n"), "extra newline for {:?}", lines);
            let body = &text[..text.len() - 2];
            let rows: Vec<&str> = body.split('\n').collect();
            assert_eq!(rows.len(), lines.len());
            assert!(rows.iter().all(|row| !row.is_empty()));
            assert!(rows.iter().all(|row| row.chars().count() <= LINE_WIDTH));
        }
    }

    #[test]
    fn test_meta_line_has_three_decimals() {
        assert_eq!(meta_line(Duration::from_secs(5)), "META interval=5.000");
        assert_eq!(meta_line(Duration::from_millis(2500)), "META interval=2.500");
    }

    #[test]
    fn test_commands_frame_single_entry() {
        let commands = vec![CommandSpec::new("1", "Shutdown")];
        assert_eq!(as_text(commands_frame(&commands)), "COMMANDS v1\n1 Shutdown\n\n");
    }

    #[test]
    fn test_commands_frame_strips_newlines_and_truncates() {
        let commands = vec![
            CommandSpec::new("1", "Shutdown"),
            CommandSpec::new("2", "This label is definitely longer than twenty chars"),
            CommandSpec::new("3\n", "Re\nboot"),
        ];
        let text = as_text(commands_frame(&commands));
        let rows: Vec<&str> = text.trim_end_matches('\n').split('\n').collect();
        assert_eq!(rows[0], COMMANDS_HEADER);
        assert_eq!(rows[1], "1 Shutdown");
        assert_eq!(rows[2], "2 This label is defi");
        assert_eq!(rows[3], "3 Reboot");
        assert!(rows.iter().all(|row| row.chars().count() <= LINE_WIDTH));
    }
}
