use super::srt::CueTime;
use super::{SubtitleEntry, SubtitleFormatter};
use std::fmt::Write;

pub struct VttFormatter;

impl SubtitleFormatter for VttFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        let mut out = String::from("WEBVTT\n");
        for entry in entries {
            // The cue text may not contain the timing arrow.
            let text = entry.text.trim_end().replace("-->", "->");
            let _ = write!(
                out,
                "\n{}\n{} --> {}\n{}\n",
                entry.index,
                CueTime { at: entry.start, millis_sep: '.' },
                CueTime { at: entry.end, millis_sep: '.' },
                text
            );
        }
        out
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }
}
