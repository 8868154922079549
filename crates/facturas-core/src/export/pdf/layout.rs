//! Monospace line wrapping and pagination for rendered XML pages.

use crate::models::config::PdfConfig;

/// Advance width of every Courier glyph, in em.
const COURIER_ADVANCE: f32 = 0.6;

/// A line of text placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    /// Baseline y coordinate in points from the page bottom.
    pub y: f32,
    pub text: String,
}

/// Page geometry used to lay out text.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font_size: f32,
    pub line_gap: f32,
}

impl PageLayout {
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            width: config.page_width,
            height: config.page_height,
            margin: config.margin,
            font_size: config.font_size,
            line_gap: config.line_gap,
        }
    }

    /// Characters that fit between the left and right margins.
    pub fn chars_per_line(&self) -> usize {
        let usable = self.width - 2.0 * self.margin;
        let glyph = self.font_size * COURIER_ADVANCE;
        ((usable / glyph).floor() as usize).max(1)
    }

    /// Distance between consecutive baselines.
    pub fn line_height(&self) -> f32 {
        self.font_size + self.line_gap
    }

    /// Split a line into chunks that fit the page width.
    ///
    /// Breaks fall on character boundaries, not words. An empty line yields
    /// no chunks.
    pub fn wrap_line(&self, line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        chars
            .chunks(self.chars_per_line())
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    /// Lay out `text` top-down across as many pages as needed.
    ///
    /// A new page starts once the cursor falls below the bottom margin. The
    /// result always has at least one page.
    pub fn paginate(&self, text: &str) -> Vec<Vec<PlacedLine>> {
        let top = self.height - self.margin;
        let mut pages = vec![Vec::new()];
        let mut y = top;

        for raw in text.lines() {
            for chunk in self.wrap_line(raw) {
                if y < self.margin {
                    pages.push(Vec::new());
                    y = top;
                }
                if let Some(page) = pages.last_mut() {
                    page.push(PlacedLine { y, text: chunk });
                }
                y -= self.line_height();
            }
        }

        pages
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::from_config(&PdfConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_letter_geometry() {
        let layout = PageLayout::default();
        assert_eq!(layout.chars_per_line(), 73);
        assert_eq!(layout.line_height(), 14.0);
    }

    #[test]
    fn test_wrap_is_character_based() {
        let layout = PageLayout::default();
        let line = "x".repeat(73 * 2 + 5);

        let chunks = layout.wrap_line(&line);
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![73, 73, 5]
        );

        let words = "palabra ".repeat(20);
        let chunks = layout.wrap_line(&words);
        assert_eq!(chunks[0].chars().count(), 73);
        assert!(chunks[0].ends_with(" p"));
    }

    #[test]
    fn test_wrap_counts_characters_not_bytes() {
        let layout = PageLayout::default();
        let line = "ñ".repeat(73);
        assert_eq!(layout.wrap_line(&line).len(), 1);
        assert!(layout.wrap_line("").is_empty());
    }

    #[test]
    fn test_paginate_fills_51_lines_per_page() {
        let layout = PageLayout::default();

        let text = vec!["line"; 51].join("\n");
        let pages = layout.paginate(&text);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].first().unwrap().y, 752.0);
        assert_eq!(pages[0].last().unwrap().y, 52.0);

        let text = vec!["line"; 52].join("\n");
        let pages = layout.paginate(&text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].len(), 1);
        assert_eq!(pages[1][0].y, 752.0);
    }

    #[test]
    fn test_paginate_empty_text_still_one_page() {
        let pages = PageLayout::default().paginate("");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_paginate_handles_crlf() {
        let pages = PageLayout::default().paginate("a\r\nb\r\n");
        let texts: Vec<&str> = pages[0].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
