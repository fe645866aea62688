// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Streaming field scanner for JSON message text.
//!
//! Walks a JSON document once and reports every scalar field as a `(name, value)` pair
//! in document order, at any nesting depth, without building a tree. Objects are
//! descended into, as are objects nested inside arrays. Scalar values are reported as
//! text: strings unescaped, numbers exactly as written, `true`/`false`/`null` literally.
//!
//! The callback returns [`ControlFlow::Break`] to stop the scan early, which is how the
//! dispatcher stops once every matcher has decided.

use std::{borrow::Cow, ops::ControlFlow};

use memchr::memchr2;
use thiserror::Error;

/// Maximum nesting of objects and arrays.
pub const MAX_DEPTH: usize = 128;

/// Error type for malformed message text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },
    #[error("Invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    #[error("Invalid number at offset {offset}")]
    InvalidNumber { offset: usize },
    #[error("Nesting exceeds depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },
    #[error("Trailing characters at offset {offset}")]
    TrailingCharacters { offset: usize },
}

type ScanResult = Result<ControlFlow<()>, ScanError>;

/// Scans `text` and calls `on_field` for every scalar field.
///
/// Text which does not start with an object or array (after whitespace) is not
/// structured and yields no fields.
///
/// # Errors
///
/// Returns a [`ScanError`] if the text is malformed. Fields reported before the error
/// was detected stay reported.
pub fn scan_fields<F>(text: &str, mut on_field: F) -> ScanResult
where
    F: FnMut(&str, &str) -> ControlFlow<()>,
{
    let mut scanner = Scanner::new(text);
    scanner.skip_whitespace();

    let flow = match scanner.peek() {
        Some(b'{' | b'[') => scanner.scan_container(0, &mut on_field)?,
        _ => return Ok(ControlFlow::Continue(())),
    };

    if flow.is_break() {
        return Ok(flow);
    }

    scanner.skip_whitespace();
    if scanner.pos < scanner.bytes.len() {
        return Err(ScanError::TrailingCharacters {
            offset: scanner.pos,
        });
    }
    Ok(flow)
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> ScanError {
        match self.text[self.pos..].chars().next() {
            Some(character) => ScanError::UnexpectedCharacter {
                character,
                offset: self.pos,
            },
            None => ScanError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ScanError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn scan_container<F>(&mut self, depth: usize, on_field: &mut F) -> ScanResult
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        if depth >= MAX_DEPTH {
            return Err(ScanError::DepthLimitExceeded { limit: MAX_DEPTH });
        }

        match self.peek() {
            Some(b'{') => self.scan_object(depth + 1, on_field),
            Some(b'[') => self.scan_array(depth + 1, on_field),
            _ => Err(self.unexpected()),
        }
    }

    fn scan_object<F>(&mut self, depth: usize, on_field: &mut F) -> ScanResult
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        self.expect(b'{')?;
        self.skip_whitespace();

        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(ControlFlow::Continue(()));
        }

        loop {
            self.skip_whitespace();
            let name = self.parse_string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();

            let flow = match self.peek() {
                Some(b'{' | b'[') => self.scan_container(depth, on_field)?,
                Some(b'"') => {
                    let value = self.parse_string()?;
                    on_field(&name, &value)
                }
                Some(_) => {
                    let value = self.parse_literal()?;
                    on_field(&name, value)
                }
                None => return Err(ScanError::UnexpectedEnd),
            };
            if flow.is_break() {
                return Ok(flow);
            }

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(ControlFlow::Continue(()));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn scan_array<F>(&mut self, depth: usize, on_field: &mut F) -> ScanResult
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        self.expect(b'[')?;
        self.skip_whitespace();

        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(ControlFlow::Continue(()));
        }

        loop {
            self.skip_whitespace();

            // Scalar elements carry no field name and are skipped
            match self.peek() {
                Some(b'{' | b'[') => {
                    let flow = self.scan_container(depth, on_field)?;
                    if flow.is_break() {
                        return Ok(flow);
                    }
                }
                Some(b'"') => {
                    self.parse_string()?;
                }
                Some(_) => {
                    self.parse_literal()?;
                }
                None => return Err(ScanError::UnexpectedEnd),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(ControlFlow::Continue(()));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    /// Parses a string starting at the opening quote, borrowing when it has no escapes.
    fn parse_string(&mut self) -> Result<Cow<'a, str>, ScanError> {
        self.expect(b'"')?;
        let start = self.pos;
        let mut owned: Option<String> = None;
        let mut chunk_start = start;

        loop {
            let Some(offset) = memchr2(b'"', b'\\', &self.bytes[self.pos..]) else {
                return Err(ScanError::UnexpectedEnd);
            };
            self.pos += offset;

            if self.bytes[self.pos] == b'"' {
                let end = self.pos;
                self.pos += 1;
                return Ok(match owned {
                    Some(mut s) => {
                        s.push_str(&self.text[chunk_start..end]);
                        Cow::Owned(s)
                    }
                    None => Cow::Borrowed(&self.text[start..end]),
                });
            }

            let s = owned.get_or_insert_with(String::new);
            s.push_str(&self.text[chunk_start..self.pos]);
            let ch = self.parse_escape()?;
            s.push(ch);
            chunk_start = self.pos;
        }
    }

    /// Parses one escape sequence starting at the backslash.
    fn parse_escape(&mut self) -> Result<char, ScanError> {
        let offset = self.pos;
        let Some(&kind) = self.bytes.get(self.pos + 1) else {
            return Err(ScanError::UnexpectedEnd);
        };
        self.pos += 2;

        let ch = match kind {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{0008}',
            b'f' => '\u{000C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let high = self.parse_hex4(offset)?;
                if (0xD800..0xDC00).contains(&high) {
                    if self.bytes.get(self.pos..self.pos + 2) != Some(b"\\u") {
                        return Err(ScanError::InvalidEscape { offset });
                    }
                    self.pos += 2;
                    let low = self.parse_hex4(offset)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(ScanError::InvalidEscape { offset });
                    }
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    char::from_u32(code).ok_or(ScanError::InvalidEscape { offset })?
                } else {
                    char::from_u32(high).ok_or(ScanError::InvalidEscape { offset })?
                }
            }
            _ => return Err(ScanError::InvalidEscape { offset }),
        };
        Ok(ch)
    }

    fn parse_hex4(&mut self, escape_offset: usize) -> Result<u32, ScanError> {
        if self.pos + 4 > self.bytes.len() {
            return Err(ScanError::UnexpectedEnd);
        }
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or(ScanError::InvalidEscape {
                offset: escape_offset,
            })?;
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| ScanError::InvalidEscape {
                offset: escape_offset,
            })?;
        // `from_str_radix` accepts a leading sign which JSON does not
        if digits.starts_with('+') {
            return Err(ScanError::InvalidEscape {
                offset: escape_offset,
            });
        }
        self.pos += 4;
        Ok(value)
    }

    /// Parses a number or `true`/`false`/`null`, returning its source text.
    fn parse_literal(&mut self) -> Result<&'a str, ScanError> {
        let rest = &self.bytes[self.pos..];
        for literal in [&b"true"[..], &b"false"[..], &b"null"[..]] {
            if rest.starts_with(literal) {
                let start = self.pos;
                self.pos += literal.len();
                return Ok(&self.text[start..self.pos]);
            }
        }

        match self.peek() {
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_number(&mut self) -> Result<&'a str, ScanError> {
        let start = self.pos;
        let invalid = ScanError::InvalidNumber { offset: start };

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        if self.skip_digits() == 0 {
            return Err(invalid);
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.skip_digits() == 0 {
                return Err(invalid);
            }
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if self.skip_digits() == 0 {
                return Err(invalid);
            }
        }
        Ok(&self.text[start..self.pos])
    }

    fn skip_digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.pos - start
    }
}
