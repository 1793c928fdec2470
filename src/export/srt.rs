use super::{SubtitleEntry, SubtitleFormatter};
use std::fmt::{self, Write};
use std::time::Duration;

/// `HH:MM:SS<sep>mmm`, the cue clock shared by SRT (`,`) and WebVTT (`.`).
pub(crate) struct CueTime {
    pub at: Duration,
    pub millis_sep: char,
}

impl fmt::Display for CueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.at.as_secs();
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:03}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.millis_sep,
            self.at.subsec_millis()
        )
    }
}

pub struct SrtFormatter;

impl SubtitleFormatter for SrtFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        let mut out = String::new();
        for (n, entry) in entries.iter().enumerate() {
            if n > 0 {
                out.push('\n');
            }
            // Writing into a String cannot fail.
            let _ = writeln!(
                out,
                "{}\n{} --> {}\n{}",
                entry.index,
                CueTime { at: entry.start, millis_sep: ',' },
                CueTime { at: entry.end, millis_sep: ',' },
                entry.text.trim_end()
            );
        }
        out
    }

    fn extension(&self) -> &'static str {
        "srt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, start_ms: u64, end_ms: u64, text: &str) -> SubtitleEntry {
        SubtitleEntry {
            index,
            start: Duration::from_millis(start_ms),
            end: Duration::from_millis(end_ms),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_cue_time() {
        let t = CueTime {
            at: Duration::from_secs(3661) + Duration::from_millis(123),
            millis_sep: ',',
        };
        assert_eq!(t.to_string(), "01:01:01,123");
        let zero = CueTime { at: Duration::ZERO, millis_sep: '.' };
        assert_eq!(zero.to_string(), "00:00:00.000");
    }

    #[test]
    fn test_srt_cues_are_blank_line_separated() {
        let entries = vec![
            entry(1, 1500, 4000, "Привет, мир!"),
            entry(2, 4500, 7000, "Это проверка.\n"),
        ];

        assert_eq!(
            SrtFormatter.format(&entries),
            "1\n00:00:01,500 --> 00:00:04,000\nПривет, мир!\n\n\
             2\n00:00:04,500 --> 00:00:07,000\nЭто проверка.\n"
        );
    }

    #[test]
    fn test_no_entries_is_empty_file() {
        assert_eq!(SrtFormatter.format(&[]), "");
    }
}
