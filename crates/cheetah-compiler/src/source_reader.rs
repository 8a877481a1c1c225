//! A char-cursor over the source text with precomputed line tables.
//!
//! Ported from `Cheetah/SourceReader.py`. Positions are byte offsets into
//! the source string; callers never construct a position that splits a
//! UTF-8 codepoint because every advance moves by whole `char`s.

use crate::error::{CompileError, Result};
use crate::span::Span;

/// End-of-line byte (start) for each line, including a sentinel at EOF.
#[derive(Debug)]
pub struct SourceReader<'src> {
    src: &'src str,
    filename: Option<String>,
    pos: u32,
    break_point: u32,
    bols: Vec<u32>,
    eols: Vec<u32>,
}

impl<'src> SourceReader<'src> {
    pub fn new(src: &'src str, filename: Option<String>) -> Self {
        let len = src.len() as u32;
        let mut eols = Vec::new();
        let mut bols = Vec::new();
        let mut pos = 0usize;
        loop {
            let eol = find_eol_z(src, pos);
            eols.push(eol as u32);
            bols.push(find_bol(src, eol));
            let advance_to = find_eol_end(src, pos);
            if advance_to >= src.len() {
                break;
            }
            pos = advance_to;
        }
        if eols.is_empty() {
            eols.push(0);
            bols.push(0);
        }
        Self {
            src,
            filename,
            pos: 0,
            break_point: len,
            bols,
            eols,
        }
    }

    pub fn src(&self) -> &'src str {
        self.src
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn len(&self) -> u32 {
        self.break_point
    }

    pub fn is_empty(&self) -> bool {
        self.break_point == 0
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn set_pos(&mut self, pos: u32) -> Result<()> {
        self.check_pos(pos)?;
        self.pos = pos;
        Ok(())
    }

    pub fn valid_pos(&self, pos: u32) -> bool {
        pos <= self.break_point
    }

    pub fn check_pos(&self, pos: u32) -> Result<()> {
        if !self.valid_pos(pos) {
            return Err(CompileError::Invariant {
                detail: format!(
                    "pos ({pos}) is invalid: beyond the stream's end ({})",
                    self.break_point
                ),
            });
        }
        Ok(())
    }

    pub fn break_point(&self) -> u32 {
        self.break_point
    }

    pub fn set_break_point(&mut self, pos: u32) -> Result<()> {
        if pos > self.src.len() as u32 {
            return Err(CompileError::Invariant {
                detail: format!(
                    "new breakpoint ({pos}) is invalid: beyond the end of the source ({})",
                    self.src.len()
                ),
            });
        }
        self.break_point = pos;
        Ok(())
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.break_point
    }

    /// Peeks the char at `pos + offset` without consuming it.
    pub fn peek_at(&self, offset: i64) -> Result<char> {
        let pos = (self.pos as i64 + offset) as u32;
        self.check_pos(pos)?;
        self.src[pos as usize..]
            .chars()
            .next()
            .ok_or_else(|| CompileError::Invariant {
                detail: "peek past end of source".into(),
            })
    }

    pub fn peek(&self) -> Result<char> {
        self.peek_at(0)
    }

    /// Consumes and returns the current char, advancing by its UTF-8 width.
    pub fn getc(&mut self) -> Result<char> {
        let c = self.peek()?;
        let width = c.len_utf8() as u32;
        if self.valid_pos(self.pos + width) {
            self.pos += width;
        }
        Ok(c)
    }

    pub fn advance(&mut self, offset: u32) -> Result<()> {
        self.check_pos(self.pos + offset)?;
        self.pos += offset;
        Ok(())
    }

    pub fn rev(&mut self, offset: u32) -> Result<()> {
        let new_pos = self.pos.checked_sub(offset).ok_or_else(|| CompileError::Invariant {
            detail: "rev before start of source".into(),
        })?;
        self.check_pos(new_pos)?;
        self.pos = new_pos;
        Ok(())
    }

    /// Reads from `start` (default: current pos) up to `to`, moving the
    /// cursor to `to`.
    pub fn read_to(&mut self, to: u32, start: Option<u32>) -> Result<&'src str> {
        self.check_pos(to)?;
        let start = start.unwrap_or(self.pos);
        self.pos = to;
        Ok(&self.src[start as usize..to as usize])
    }

    /// Reads to the end of the current line, consuming the line terminator
    /// by default.
    pub fn read_to_eol(&mut self, start: Option<u32>, gobble: bool) -> Result<&'src str> {
        let (eol_start, eol_end) = find_eol_z_match(self.src, self.pos as usize);
        let to = if gobble { eol_end } else { eol_start };
        self.read_to(to as u32, start)
    }

    pub fn find(&self, needle: &str, pos: Option<u32>) -> Option<u32> {
        let pos = pos.unwrap_or(self.pos) as usize;
        self.src[pos..].find(needle).map(|i| (i + pos) as u32)
    }

    pub fn startswith(&self, needle: &str, pos: Option<u32>) -> bool {
        self.find(needle, pos) == Some(pos.unwrap_or(self.pos))
    }

    pub fn find_bol(&self, pos: Option<u32>) -> u32 {
        let pos = pos.unwrap_or(self.pos) as usize;
        find_bol(self.src, pos) as u32
    }

    pub fn find_eol(&self, gobble: bool) -> u32 {
        let (start, end) = find_eol_z_match(self.src, self.pos as usize);
        if gobble { end as u32 } else { start as u32 }
    }

    /// True if everything between the start of the line and `pos` is
    /// whitespace (so a directive there may safely gobble its newline).
    pub fn is_line_clear_to_pos(&self, pos: Option<u32>) -> Result<bool> {
        let pos = pos.unwrap_or(self.pos);
        self.check_pos(pos)?;
        let bol = self.find_bol(None);
        if bol == pos {
            return Ok(true);
        }
        Ok(self.src[bol as usize..pos as usize].chars().all(char::is_whitespace))
    }

    pub fn match_whitespace(&self, ws_chars: &str) -> bool {
        !self.at_end() && self.peek().map(|c| ws_chars.contains(c)).unwrap_or(false)
    }

    /// Consumes a run of whitespace characters (capped at `max` bytes if
    /// given) and returns the consumed slice.
    pub fn get_whitespace(&mut self, max: Option<u32>, ws_chars: &str) -> &'src str {
        if !self.match_whitespace(ws_chars) {
            return &self.src[self.pos as usize..self.pos as usize];
        }
        let start = self.pos;
        let mut limit = self.break_point;
        if let Some(max) = max {
            limit = limit.min(self.pos + max);
        }
        while self.pos < limit {
            let _ = self.advance(self.peek().map(|c| c.len_utf8() as u32).unwrap_or(1));
            if !self.match_whitespace(ws_chars) {
                break;
            }
        }
        &self.src[start as usize..self.pos as usize]
    }

    pub fn line_num(&self, pos: u32) -> usize {
        for i in 0..self.bols.len() {
            if pos >= self.bols[i] && pos <= self.eols[i] {
                return i;
            }
        }
        self.bols.len().saturating_sub(1)
    }

    /// 1-based (row, col) for `pos`.
    pub fn row_col(&self, pos: u32) -> (u32, u32) {
        let line = self.line_num(pos);
        let bol = self.bols[line];
        (line as u32 + 1, pos - bol + 1)
    }

    pub fn span_to_here(&self, start: u32) -> Span {
        Span::new(start, self.pos)
    }

    pub fn lines(&self) -> Vec<&'src str> {
        self.src.lines().collect()
    }
}

fn find_bol(src: &str, pos: usize) -> usize {
    let upto = &src[..pos.min(src.len())];
    let nl = upto.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let cr = upto.rfind('\r').map(|i| i + 1).unwrap_or(0);
    nl.max(cr)
}

/// Mirrors Python's `EOLZre = re.compile(r'(?:\r\n|\r|\n|\Z)')`: finds the
/// next line terminator (or end of string) starting at `pos`, returning
/// its (start, end-after-terminator) offsets.
fn find_eol_z_match(src: &str, pos: usize) -> (usize, usize) {
    let bytes = src.as_bytes();
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    return (i, i + 2);
                }
                return (i, i + 1);
            }
            b'\n' => return (i, i + 1),
            _ => i += 1,
        }
    }
    (bytes.len(), bytes.len())
}

fn find_eol_z(src: &str, pos: usize) -> usize {
    find_eol_z_match(src, pos).0
}

fn find_eol_end(src: &str, pos: usize) -> usize {
    find_eol_z_match(src, pos).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_and_getc_advance_by_char_width() {
        let mut r = SourceReader::new("héllo", None);
        assert_eq!(r.peek().unwrap(), 'h');
        assert_eq!(r.getc().unwrap(), 'h');
        assert_eq!(r.getc().unwrap(), 'é');
        assert_eq!(r.pos(), 3);
    }

    #[test]
    fn row_col_tracks_multiple_lines() {
        let r = SourceReader::new("abc\ndef\nghi", None);
        assert_eq!(r.row_col(0), (1, 1));
        assert_eq!(r.row_col(4), (2, 1));
        assert_eq!(r.row_col(8), (3, 1));
    }

    #[test]
    fn is_line_clear_to_pos_detects_leading_whitespace_only() {
        let mut r = SourceReader::new("   #if x\nfoo", None);
        r.set_pos(3).unwrap();
        assert!(r.is_line_clear_to_pos(None).unwrap());
        r.set_pos(5).unwrap();
        assert!(!r.is_line_clear_to_pos(None).unwrap());
    }

    #[test]
    fn read_to_eol_gobbles_terminator_by_default() {
        let mut r = SourceReader::new("abc\ndef", None);
        let line = r.read_to_eol(None, true).unwrap();
        assert_eq!(line, "abc\n");
        assert_eq!(r.pos(), 4);
    }

    #[test]
    fn find_and_startswith() {
        let r = SourceReader::new("#if $x#end if", None);
        assert_eq!(r.find("#end", None), Some(6));
        assert!(r.startswith("#if", None));
    }

    #[test]
    fn get_whitespace_stops_at_nonspace() {
        let mut r = SourceReader::new("   x", None);
        let ws = r.get_whitespace(None, " \t\x0c");
        assert_eq!(ws, "   ");
        assert_eq!(r.pos(), 3);
    }
}
