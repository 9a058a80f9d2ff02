//! The brace scanner: a tiny state machine, not a C parser.
//!
//! It recognises line breaks, `{`, `}`, line comments, block comments,
//! character literals (with `\` escapes) and string literals (with `\`
//! escapes), and ignores braces inside any of those. Raw strings and
//! trigraphs are out of scope.

use ahash::AHashMap;

/// The nesting structure of one source file.
#[derive(Debug, Default)]
pub struct Nesting {
    /// `matching[i] = (open_line, close_line)` per brace pair; a pair left
    /// unclosed at EOF keeps `close_line = 0`.
    pub matching: Vec<(u32, u32)>,
    /// Innermost enclosing pair (index into `matching`) at the start of each
    /// line; lines outside all braces are absent.
    pub innermost: AHashMap<u32, usize>,
}

#[derive(Default)]
struct Flags {
    line_comment: bool,
    block_comment: bool,
    in_char: bool,
    in_string: bool,
}

pub fn scan(src: &str) -> Nesting {
    let mut nesting = Nesting::default();
    let mut stack: Vec<usize> = Vec::new();
    let mut flags = Flags::default();
    let mut cur_line: u32 = 1;

    let mut chars = src.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\n' {
            cur_line += 1;
        }

        if flags.line_comment {
            if ch != '\n' {
                continue;
            }
            flags.line_comment = false;
        }

        if flags.block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                flags.block_comment = false;
                chars.next();
            }
            continue;
        }

        if !flags.in_char && !flags.in_string && ch == '/' {
            match chars.peek() {
                Some('/') => {
                    flags.line_comment = true;
                    chars.next();
                    continue;
                }
                Some('*') => {
                    flags.block_comment = true;
                    chars.next();
                    continue;
                }
                _ => (),
            }
        }

        if ch == '\\' && (flags.in_char || flags.in_string) {
            // The escaped character, whatever it is, cannot close the
            // literal.
            if let Some(&next) = chars.peek() {
                if next == '\n' {
                    cur_line += 1;
                }
                chars.next();
            }
            continue;
        }

        if ch == '\'' && !flags.in_string {
            flags.in_char = !flags.in_char;
        }
        if ch == '"' && !flags.in_char {
            flags.in_string = !flags.in_string;
        }
        if flags.in_char || flags.in_string {
            continue;
        }

        match ch {
            '\n' => {
                if let Some(&innermost) = stack.last() {
                    nesting.innermost.entry(cur_line).or_insert(innermost);
                }
            }
            '{' => {
                stack.push(nesting.matching.len());
                nesting.matching.push((cur_line, 0));
            }
            '}' => match stack.pop() {
                Some(idx) => nesting.matching[idx].1 = cur_line,
                // Tolerated: unbalanced input never panics.
                None => log::warn!("unbalanced '}}' at line {}", cur_line),
            },
            _ => (),
        }
    }

    nesting
}
