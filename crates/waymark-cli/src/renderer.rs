//! Terminal rendering of the core's Markdown output.
//!
//! Rich mode styles inline Markdown with termimad and colours diff lines
//! inside fenced blocks; plain mode prints the Markdown unchanged.

use std::io::Write;

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

const BLUE: &str = "\x1b[34m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Writes `markdown` to stdout.
    pub fn render(&self, markdown: &str) -> Result<()> {
        if !self.rich_enabled {
            print!("{markdown}");
            std::io::stdout().flush()?;
            return Ok(());
        }

        let mut in_fence = false;
        for line in markdown.lines() {
            if line.starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                match diff_line_color(line) {
                    Some(color) => println!("{color}{line}{RESET}"),
                    None => println!("{line}"),
                }
            } else if line.starts_with('#') {
                println!("{BLUE}{line}{RESET}");
            } else {
                self.skin.print_inline(line);
                println!();
            }
        }
        std::io::stdout().flush()?;
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

fn diff_line_color(line: &str) -> Option<&'static str> {
    if line.starts_with("@@") {
        Some(CYAN)
    } else if line.starts_with('+') {
        Some(GREEN)
    } else if line.starts_with('-') {
        Some(RED)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_line_colors() {
        assert_eq!(diff_line_color("+added"), Some(GREEN));
        assert_eq!(diff_line_color("-removed"), Some(RED));
        assert_eq!(diff_line_color("@@ -1,2 +1,2 @@"), Some(CYAN));
        assert_eq!(diff_line_color(" context"), None);
    }

    #[test]
    fn test_default_is_rich() {
        assert!(TerminalRenderer::default().rich_enabled);
        assert!(!TerminalRenderer::new(false).rich_enabled);
    }
}
