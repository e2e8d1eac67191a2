use crate::{
    lexer::{self, LineLexer, TokenKind},
    marker::Location,
};

/// Include and origin directives found in a source without parsing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub includes: Vec<(String, Location)>,
    pub origin: Option<u16>,
}

/// Token-level scan. String literals and comments never yield directives;
/// only the first numeric `.org` counts.
pub fn scan(text: &str) -> Directives {
    let mut found = Directives::default();
    for (idx, offset, line) in lexer::lines(text) {
        let tokens = LineLexer::new(line, idx, offset).parse();
        let mut iter = tokens.iter().peekable();
        while let Some(token) = iter.next() {
            let TokenKind::Dotted(name) = &token.kind else {
                continue;
            };
            match (name.to_ascii_lowercase().as_str(), iter.peek().map(|t| &t.kind)) {
                (".include", Some(TokenKind::Str(path))) => {
                    found.includes.push((path.clone(), token.pos));
                    iter.next();
                }
                (".org", Some(TokenKind::Number(value))) if found.origin.is_none() => {
                    found.origin = u16::try_from(*value).ok();
                    iter.next();
                }
                _ => {}
            }
        }
    }
    found
}
