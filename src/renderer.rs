//! Streaming display for in-progress model replies.
//!
//! Fragments are written as they arrive. In an interactive terminal a
//! trailing cursor marker follows the partial text; it is erased before each
//! new fragment and on completion, so the final text ends clean.

use std::io::Write;

/// Marker shown after the partial answer while the model is still replying.
pub const CURSOR_MARKER: &str = "▌";

/// Backspace over the marker's column and blank it.
const ERASE_MARKER: &str = "\u{8} \u{8}";

/// Writes streamed text fragments to `out`, managing the cursor marker and
/// the trailing newline.
pub struct StreamRenderer<W: Write> {
    out: W,
    show_cursor: bool,
    /// A marker is currently displayed and must be erased before more output.
    marker_shown: bool,
    wrote_text: bool,
}

impl<W: Write> StreamRenderer<W> {
    pub fn new(out: W, show_cursor: bool) -> Self {
        Self {
            out,
            show_cursor,
            marker_shown: false,
            wrote_text: false,
        }
    }

    /// Writes a literal prefix (e.g. the reply label) ahead of the text.
    pub fn prefix(&mut self, prefix: &str) -> std::io::Result<()> {
        self.erase_marker()?;
        write!(self.out, "{}", prefix)?;
        self.out.flush()
    }

    /// Writes one text fragment, re-drawing the marker after it.
    pub fn delta(&mut self, text: &str) -> std::io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.erase_marker()?;
        write!(self.out, "{}", text)?;
        if self.show_cursor {
            write!(self.out, "{}", CURSOR_MARKER)?;
            self.marker_shown = true;
        }
        self.wrote_text = true;
        self.out.flush()
    }

    /// Erases the marker and terminates the line if any text was written.
    ///
    /// Also the cleanup path when a stream fails mid-reply: the partial text
    /// stays visible, the marker does not.
    pub fn finish(&mut self) -> std::io::Result<()> {
        self.erase_marker()?;
        if self.wrote_text {
            writeln!(self.out)?;
            self.wrote_text = false;
        }
        self.out.flush()
    }

    fn erase_marker(&mut self) -> std::io::Result<()> {
        if self.marker_shown {
            write!(self.out, "{}", ERASE_MARKER)?;
            self.marker_shown = false;
        }
        Ok(())
    }
}
