use crate::marker::Location;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Double character tokens
    LAngleLAngle, // '<<'
    RAngleRAngle, // '>>'

    // Single character tokens
    Plus,    // '+'
    Minus,   // '-'
    Star,    // '*'
    Slash,   // '/'
    Percent, // '%'
    Amp,     // '&'
    Pipe,    // '|'
    Caret,   // '^'
    Tilde,   // '~'
    Dollar,  // '$'
    Colon,   // ':'
    Comma,   // ','
    LParen,  // '('
    RParen,  // ')'

    // Literals
    Ident(String),  // name
    Dotted(String), // .name (directive or local label)
    Number(i64),    // 42, 0x2A, 0b101, 0o52
    Char(char),     // 'A'
    Str(String),    // "path"

    Comment(String), // ; text
    Error(String),
}

/// Tokens of one source line.
pub struct LineLexer<'a> {
    line: &'a str,
    iter: Peekable<CharIndices<'a>>,
    line_idx: usize,
    line_offset: usize,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &'a str, line_idx: usize, line_offset: usize) -> Self {
        Self {
            line,
            iter: line.char_indices().peekable(),
            line_idx,
            line_offset,
        }
    }

    pub fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<Token> {
        // 0. Skip whitespaces
        while self.iter.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

        // 1. End of line
        let (start, c) = self.iter.next()?;

        // 2. Comment
        if c == ';' {
            let comment = self.line[start + 1..].to_string();
            while self.iter.next().is_some() {}
            return self.token(TokenKind::Comment(comment), start, self.line.len());
        }

        // 3. Double character token
        if let Some(&(_, c2)) = self.iter.peek() {
            if let Some(kind) = double_char_token(c, c2) {
                self.iter.next();
                return self.token(kind, start, start + 2);
            }
        }

        // 4. Single character token
        if let Some(kind) = single_char_token(c) {
            return self.token(kind, start, start + 1);
        }

        // 5. String literal
        if c == '"' {
            let mut text = String::new();
            while let Some((idx, ch)) = self.iter.next() {
                match ch {
                    '"' => return self.token(TokenKind::Str(text), start, idx + 1),
                    '\\' => match self.iter.next() {
                        Some((_, esc)) => text.push(unescape(esc)),
                        None => break,
                    },
                    _ => text.push(ch),
                }
            }
            let kind = TokenKind::Error("unterminated string".to_string());
            return self.token(kind, start, self.line.len());
        }

        // 6. Character literal
        if c == '\'' {
            let value = match self.iter.next() {
                Some((_, '\\')) => self.iter.next().map(|(_, esc)| unescape(esc)),
                Some((_, ch)) => Some(ch),
                None => None,
            };
            let end = self.iter.next_if(|(_, ch)| *ch == '\'');
            return match (value, end) {
                (Some(ch), Some((idx, _))) => self.token(TokenKind::Char(ch), start, idx + 1),
                _ => {
                    let end = self.position();
                    self.token(TokenKind::Error("bad character literal".into()), start, end)
                }
            };
        }

        // 7. Identifier, directive or local label
        if c.is_ascii_alphabetic() || c == '_' || c == '.' {
            let end = self.take_while(start + 1, |ch| ch.is_ascii_alphanumeric() || ch == '_');
            let lexeme = &self.line[start..end];
            let kind = match c {
                '.' => TokenKind::Dotted(lexeme.to_string()),
                _ => TokenKind::Ident(lexeme.to_string()),
            };
            return self.token(kind, start, end);
        }

        // 8. Number literal
        if c.is_ascii_digit() {
            let end = self.take_while(start + 1, |ch| ch.is_ascii_alphanumeric() || ch == '_');
            let lexeme = self.line[start..end].replace('_', "");
            let kind = match parse_with_prefix(&lexeme) {
                Some(value) => TokenKind::Number(value),
                None => TokenKind::Error(format!("invalid number `{}`", lexeme)),
            };
            return self.token(kind, start, end);
        }

        // 9. Error
        self.token(TokenKind::Error(c.to_string()), start, start + c.len_utf8())
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, mut end: usize, cond: F) -> usize {
        while let Some((idx, ch)) = self.iter.next_if(|(_, ch)| cond(*ch)) {
            end = idx + ch.len_utf8();
        }
        end
    }

    fn position(&mut self) -> usize {
        self.iter.peek().map(|(idx, _)| *idx).unwrap_or(self.line.len())
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Option<Token> {
        Some(Token {
            kind,
            pos: Location::new(
                self.line_offset + start,
                self.line_idx,
                self.line[..start].chars().count(),
                end - start,
            ),
        })
    }
}

fn double_char_token(c1: char, c2: char) -> Option<TokenKind> {
    match (c1, c2) {
        ('<', '<') => Some(TokenKind::LAngleLAngle),
        ('>', '>') => Some(TokenKind::RAngleRAngle),
        _ => None,
    }
}

fn single_char_token(c: char) -> Option<TokenKind> {
    match c {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '&' => Some(TokenKind::Amp),
        '|' => Some(TokenKind::Pipe),
        '^' => Some(TokenKind::Caret),
        '~' => Some(TokenKind::Tilde),
        '$' => Some(TokenKind::Dollar),
        ':' => Some(TokenKind::Colon),
        ',' => Some(TokenKind::Comma),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        _ => None,
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        '0' => '\0',
        other => other,
    }
}

pub fn parse_with_prefix(s: &str) -> Option<i64> {
    if s.len() < 2 {
        return s.parse::<i64>().ok();
    }
    let (prefix, num) = s.split_at(2);
    let radix = match prefix {
        "0b" | "0B" => 2,
        "0o" | "0O" => 8,
        "0x" | "0X" => 16,
        _ => return s.parse::<i64>().ok(),
    };
    i64::from_str_radix(num, radix).ok()
}

/// Lines of `text` with their index and byte offset.
pub fn lines(text: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    text.split_inclusive('\n')
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line.trim_end_matches(['\n', '\r'])))
        })
        .enumerate()
        .map(|(idx, (offset, line))| (idx, offset, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        LineLexer::new(line, 0, 0)
            .parse()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn instruction_line() {
        assert_eq!(
            kinds("loop: add t0, 0x10 ; bump"),
            vec![
                TokenKind::Ident("loop".into()),
                TokenKind::Colon,
                TokenKind::Ident("add".into()),
                TokenKind::Ident("t0".into()),
                TokenKind::Comma,
                TokenKind::Number(16),
                TokenKind::Comment(" bump".into()),
            ]
        );
    }

    #[test]
    fn directives_and_strings() {
        assert_eq!(
            kinds(".include \"lib/io.rk\""),
            vec![
                TokenKind::Dotted(".include".into()),
                TokenKind::Str("lib/io.rk".into()),
            ]
        );
        assert_eq!(
            kinds(".word 'A', 1 << 3"),
            vec![
                TokenKind::Dotted(".word".into()),
                TokenKind::Char('A'),
                TokenKind::Comma,
                TokenKind::Number(1),
                TokenKind::LAngleLAngle,
                TokenKind::Number(3),
            ]
        );
    }

    #[test]
    fn comment_swallows_directives() {
        assert_eq!(
            kinds("; .include \"x\""),
            vec![TokenKind::Comment(" .include \"x\"".into())]
        );
    }

    #[test]
    fn prefixes() {
        assert_eq!(parse_with_prefix("0b101"), Some(5));
        assert_eq!(parse_with_prefix("0o17"), Some(15));
        assert_eq!(parse_with_prefix("0xFF"), Some(255));
        assert_eq!(parse_with_prefix("42"), Some(42));
        assert_eq!(parse_with_prefix("0xZZ"), None);
    }

    #[test]
    fn positions() {
        let tokens = LineLexer::new("  mov a0, 1", 3, 100).parse();
        assert_eq!(tokens[0].pos, Location::new(102, 3, 2, 3));
        assert_eq!(tokens[1].pos.column, 6);
    }

    #[test]
    fn line_offsets() {
        let v: Vec<_> = lines("a\r\nbc\nd").collect();
        assert_eq!(v, vec![(0, 0, "a"), (1, 3, "bc"), (2, 6, "d")]);
    }
}
