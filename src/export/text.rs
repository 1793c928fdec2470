use crate::segment::Segment;

/// All source texts joined into one paragraph.
pub fn format_transcript(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.source_text().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Side-by-side listing of every segment with its translation.
pub fn format_translation(segments: &[Segment]) -> String {
    let mut output = String::new();
    for segment in segments {
        output.push_str(&format!(
            "[{:.2}s - {:.2}s]\nOriginal: {}\nTranslation: {}\n\n",
            segment.start(),
            segment.end(),
            segment.source_text(),
            segment.translated_text
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<Segment> {
        let mut first = Segment::new(0, 0.0, 1.5, "Привет.").unwrap();
        first.translated_text = "Hello.".to_string();
        let blank = Segment::new(1, 1.5, 2.0, "  ").unwrap();
        let mut last = Segment::new(2, 2.0, 3.25, "Пока.").unwrap();
        last.translated_text = "Bye.".to_string();
        vec![first, blank, last]
    }

    #[test]
    fn test_transcript_skips_blank_segments() {
        assert_eq!(format_transcript(&segments()), "Привет. Пока.");
    }

    #[test]
    fn test_translation_listing() {
        let text = format_translation(&segments());
        assert!(text.starts_with("[0.00s - 1.50s]\nOriginal: Привет.\nTranslation: Hello.\n\n"));
        assert!(text.ends_with("[2.00s - 3.25s]\nOriginal: Пока.\nTranslation: Bye.\n\n"));
    }
}
