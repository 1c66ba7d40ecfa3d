use crate::model::Speaker;
use serde::Serialize;

/// One display line: a maximal run of fragments from the same speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// The transcript built up while a live session runs.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment, extending the last line when the speaker has not
    /// changed.
    pub fn push(&mut self, speaker: Speaker, fragment: &str) {
        match self.lines.last_mut() {
            Some(last) if last.speaker == speaker => last.text.push_str(fragment),
            _ => self.lines.push(TranscriptLine {
                speaker,
                text: fragment.to_string(),
            }),
        }
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Folds a fragment sequence into display lines.
pub fn coalesce<'a, I>(fragments: I) -> Vec<TranscriptLine>
where
    I: IntoIterator<Item = (Speaker, &'a str)>,
{
    let mut transcript = Transcript::new();
    for (speaker, text) in fragments {
        transcript.push(speaker, text);
    }
    transcript.lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_of_one_speaker_become_one_line() {
        let lines = coalesce([
            (Speaker::Model, "Tell me "),
            (Speaker::Model, "about "),
            (Speaker::Model, "yourself."),
            (Speaker::User, "Sure, "),
            (Speaker::User, "I build APIs."),
            (Speaker::Model, "Great."),
        ]);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "Tell me about yourself.");
        assert_eq!(lines[1].speaker, Speaker::User);
        assert_eq!(lines[1].text, "Sure, I build APIs.");
        assert_eq!(lines[2].speaker, Speaker::Model);
    }

    #[test]
    fn clear_empties_the_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::User, "hello");
        assert_eq!(transcript.len(), 1);
        transcript.clear();
        assert!(transcript.is_empty());
    }
}
