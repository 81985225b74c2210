use crate::error::IngestError;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Bullet, arrow and dash glyphs that PDF producers emit for list markers.
const DECORATIVE_GLYPHS: &str = "[•‣›▶➤➢➔➜✦✶✱★☆⚫⚪▪▫●◦–—−]";

/// Cleans raw extracted text. `normalize` is idempotent.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    glyphs: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            glyphs: Regex::new(DECORATIVE_GLYPHS)?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let canonical = raw.nfkc().collect::<String>();
        let substituted = self.glyphs.replace_all(&canonical, " - ");
        let printable = substituted
            .chars()
            .map(|ch| if is_printable(ch) { ch } else { ' ' })
            .collect::<String>();
        normalize_whitespace(&printable)
    }
}

fn is_printable(ch: char) -> bool {
    matches!(u32::from(ch), 0x20..=0xD7FF | 0xE000..=0xFFFD)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
