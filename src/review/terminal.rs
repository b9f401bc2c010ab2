//! Full-screen terminal review with two tabs: the render and the critique.
//!
//! Keys: `Tab`/arrows switch tabs, `p`/`Enter` publishes, `q`/`Esc` cancels.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use image::RgbImage;
use std::io::{Stdout, Write, stdout};
use tracing::warn;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::preview::{half_block_rows, load_preview, terminal_bounds};
use super::{ReviewDecision, ReviewItem, ReviewResult, ReviewSurface};
use crate::publish::PublishedRecords;

/// Rows taken by the tab bar (2) and the footer (2)
const RESERVED_ROWS: u16 = 4;

const KEY_HELP: &str = "[Tab] switch view   [p/Enter] publish to Shotgrid   [q/Esc] cancel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Render,
    Critique,
}

impl Tab {
    fn toggle(self) -> Self {
        match self {
            Tab::Render => Tab::Critique,
            Tab::Critique => Tab::Render,
        }
    }
}

pub struct TerminalReview {
    out: Stdout,
    tab: Tab,
}

impl Default for TerminalReview {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReview {
    pub fn new() -> Self {
        Self {
            out: stdout(),
            tab: Tab::Render,
        }
    }

    fn run(&mut self, item: &ReviewItem<'_>) -> ReviewResult<ReviewDecision> {
        let mut preview = self.preview(item)?;
        self.draw(item, preview.as_ref())?;

        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
                        self.tab = self.tab.toggle();
                        self.draw(item, preview.as_ref())?;
                    }
                    KeyCode::Enter | KeyCode::Char('p') => return Ok(ReviewDecision::Publish),
                    KeyCode::Esc | KeyCode::Char('q') => return Ok(ReviewDecision::Cancel),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(ReviewDecision::Cancel);
                    }
                    _ => {}
                },
                Event::Resize(_, _) => {
                    preview = self.preview(item)?;
                    self.draw(item, preview.as_ref())?;
                }
                _ => {}
            }
        }
    }

    /// Formats the image crate cannot decode are reviewed from the critique alone
    fn preview(&self, item: &ReviewItem<'_>) -> ReviewResult<Option<RgbImage>> {
        let (cols, rows) = terminal::size()?;
        match load_preview(item.artifact, terminal_bounds(cols, rows, RESERVED_ROWS)) {
            Ok(img) => Ok(Some(img)),
            Err(err) => {
                warn!(error = %err, "render preview unavailable");
                Ok(None)
            }
        }
    }

    fn draw(&mut self, item: &ReviewItem<'_>, preview: Option<&RgbImage>) -> ReviewResult<()> {
        let (cols, rows) = terminal::size()?;
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;

        for (tab, title) in [(Tab::Render, " Render View "), (Tab::Critique, " Critique ")] {
            if tab == self.tab {
                queue!(
                    self.out,
                    SetAttribute(Attribute::Reverse),
                    Print(title),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.out, Print(title))?;
            }
            queue!(self.out, Print(" "))?;
        }

        match self.tab {
            Tab::Render => self.draw_render(item, preview)?,
            Tab::Critique => self.draw_critique(item, cols, rows)?,
        }

        let footer = format!(
            "{}  {}x{}  ->  {}",
            item.artifact.file_name(),
            item.artifact.width,
            item.artifact.height,
            item.target
        );
        queue!(
            self.out,
            MoveTo(0, rows.saturating_sub(2)),
            Print(truncate(&footer, cols as usize)),
            MoveTo(0, rows.saturating_sub(1)),
            SetForegroundColor(Color::DarkGrey),
            Print(truncate(KEY_HELP, cols as usize)),
            ResetColor
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn draw_render(
        &mut self,
        item: &ReviewItem<'_>,
        preview: Option<&RgbImage>,
    ) -> ReviewResult<()> {
        let Some(img) = preview else {
            queue!(
                self.out,
                MoveTo(0, 2),
                Print(format!("No preview for {}", item.artifact.path.display()))
            )?;
            return Ok(());
        };

        for (row, cells) in half_block_rows(img).iter().enumerate() {
            queue!(self.out, MoveTo(0, 2 + row as u16))?;
            for (top, bottom) in cells {
                queue!(
                    self.out,
                    SetForegroundColor(rgb(*top)),
                    SetBackgroundColor(rgb(*bottom)),
                    Print('\u{2580}')
                )?;
            }
            queue!(self.out, ResetColor)?;
        }
        Ok(())
    }

    fn draw_critique(&mut self, item: &ReviewItem<'_>, cols: u16, rows: u16) -> ReviewResult<()> {
        let width = (cols as usize).saturating_sub(4).max(10);
        let mut lines = wrap(item.critique, width);
        if !item.description.is_empty() {
            lines.push(String::new());
            lines.push(format!("Description: {}", item.description));
        }

        let visible = rows.saturating_sub(RESERVED_ROWS + 1) as usize;
        for (i, line) in lines.iter().take(visible).enumerate() {
            queue!(self.out, MoveTo(2, 3 + i as u16), Print(line))?;
        }
        Ok(())
    }
}

impl ReviewSurface for TerminalReview {
    fn present(&mut self, item: &ReviewItem<'_>) -> ReviewResult<ReviewDecision> {
        terminal::enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen, Hide)?;

        let decision = self.run(item);

        // Restore the terminal even when drawing failed
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        decision
    }

    fn dismiss(&mut self, records: &PublishedRecords) -> ReviewResult<()> {
        writeln!(
            std::io::stderr(),
            "Published to Shotgrid: version {} (note {})",
            records.version_id, records.note_id
        )?;
        Ok(())
    }
}

fn rgb(c: [u8; 3]) -> Color {
    Color::Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
    }
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Longest prefix that fits in `width` terminal columns
fn truncate(text: &str, width: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|&c| {
            used += char_width(c);
            used <= width
        })
        .collect()
}

/// Greedy word wrap by display width; paragraphs are kept, overlong words
/// are split
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while word.width() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let head = truncate(&word, width);
                // A glyph wider than the whole line still has to go somewhere
                let head = if head.is_empty() {
                    word.chars().take(1).collect()
                } else {
                    head
                };
                word = word.split_off(head.len());
                lines.push(head);
            }
            if !line.is_empty() && line.width() + 1 + word.width() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }

    lines
}
