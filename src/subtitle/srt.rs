// SRT subtitle format
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::time::format_duration;
use super::SubtitleTrack;
use crate::error::Result;

/// Serialize a track as SRT text.
///
/// Each cue is its index, a `start --> end` line, the text and a blank line.
/// An empty track serializes to an empty string.
pub fn render_srt(track: &SubtitleTrack) -> Result<String> {
    let mut output = String::new();

    for cue in track.cues() {
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_duration(cue.start)?,
            format_duration(cue.end)?,
            cue.text
        ));
    }

    Ok(output)
}

/// Write SRT text to `path` atomically.
///
/// The content goes to a temporary file next to the destination and is
/// renamed into place only once fully written.
pub fn write_srt(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::assemble;
    use crate::transcribe::TranscriptSegment;
    use std::time::Duration;

    #[test]
    fn test_srt_format() {
        let track = assemble(vec![
            TranscriptSegment {
                start: Duration::from_millis(1500),
                end: Duration::from_millis(4000),
                text: "Hello, world!".to_string(),
            },
            TranscriptSegment {
                start: Duration::from_millis(4500),
                end: Duration::from_millis(7000),
                text: "This is a test.".to_string(),
            },
        ])
        .unwrap();

        let output = render_srt(&track).unwrap();

        assert_eq!(
            output,
            "1\n00:00:01,500 --> 00:00:04,000\nHello, world!\n\n\
             2\n00:00:04,500 --> 00:00:07,000\nThis is a test.\n\n"
        );
    }

    #[test]
    fn test_empty_track_is_empty_string() {
        assert_eq!(render_srt(&SubtitleTrack::empty()).unwrap(), "");
    }

    #[test]
    fn test_multiline_text_kept() {
        let track = assemble(vec![TranscriptSegment {
            start: Duration::ZERO,
            end: Duration::from_secs(5),
            text: "line one\nline two".to_string(),
        }])
        .unwrap();

        let output = render_srt(&track).unwrap();
        assert!(output.contains("line one\nline two\n\n"));
    }

    #[test]
    fn test_write_srt_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.srt");
        std::fs::write(&path, "old").unwrap();

        write_srt(&path, "1\n00:00:00,000 --> 00:00:01,000\nhi\n\n").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("1\n"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
