use super::time::to_millis;
use super::{SubtitleCue, SubtitleTrack};
use crate::error::{AudiosubError, Result};
use crate::transcribe::TranscriptSegment;

/// Number ordered transcript segments into a subtitle track.
///
/// Segments keep their arrival order and receive indices `1..=N`. A segment
/// that starts before its predecessor is reported rather than reordered, as
/// is one with blank text or a span that is empty once written to the
/// millisecond.
pub fn assemble(segments: Vec<TranscriptSegment>) -> Result<SubtitleTrack> {
    let mut cues: Vec<SubtitleCue> = Vec::with_capacity(segments.len());

    for (position, segment) in segments.into_iter().enumerate() {
        if to_millis(segment.start) >= to_millis(segment.end) {
            return Err(AudiosubError::AssemblyInvariant(format!(
                "segment {} has empty span {:?}..{:?}",
                position, segment.start, segment.end
            )));
        }

        if segment.text.trim().is_empty() {
            return Err(AudiosubError::AssemblyInvariant(format!(
                "segment {} at {:?} has no text",
                position, segment.start
            )));
        }

        if let Some(last) = cues.last() {
            if segment.start < last.start {
                return Err(AudiosubError::AssemblyInvariant(format!(
                    "segment {} starts at {:?}, before the previous segment at {:?}",
                    position, segment.start, last.start
                )));
            }
        }

        cues.push(SubtitleCue {
            index: cues.len() + 1,
            start: segment.start,
            end: segment.end,
            text: segment.text,
        });
    }

    Ok(SubtitleTrack { cues })
}
