use crate::{
    ast::{Ast, Operand, Stmt},
    expr::{BinOp, Expr, UnaryOp},
    lexer::{self, LineLexer, Token, TokenKind},
    marker::{Location, Marker},
    options::{CompilerOption, Options},
};
use arch::{
    op::{OpKind, Shape},
    reg::Reg,
};
use indexmap::IndexMap;
use std::iter::Peekable;

macro_rules! expect {
    ($parser:expr, $kind:pat) => {
        $parser.expect_tobe(|token| matches!(&token.kind, $kind))
    };
}

macro_rules! optional {
    ($parser:expr, $kind:pat) => {
        $parser.consume_if(|token| matches!(&token.kind, $kind))
    };
}

const MAX_MACRO_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub enum ParseError {
    UnexpectedEol(Location),
    UnexpectedToken(Token),
    Invalid(String, Location),
}

impl ParseError {
    fn into_marker(self) -> Marker {
        match self {
            ParseError::UnexpectedEol(pos) => Marker::error("Unexpected end of line").at(pos),
            ParseError::UnexpectedToken(token) => {
                Marker::error(format!("Unexpected {}", describe(&token.kind))).at(token.pos)
            }
            ParseError::Invalid(msg, pos) => Marker::error(msg).at(pos),
        }
    }
}

/// Parse a whole source text into nodes, collecting syntax errors as markers.
pub fn parse(text: &str, options: &Options) -> (Ast, Vec<Marker>) {
    let mut parser = Parser::new(options);
    for (idx, offset, line) in lexer::lines(text) {
        parser.line(line, idx, offset, 0);
    }
    parser.finish()
}

struct Parser<'a> {
    options: &'a Options,
    ast: Ast,
    markers: Vec<Marker>,
    macros: IndexMap<String, Vec<String>>,
    pending_macro: Option<(String, Location, Vec<String>)>,
}

impl<'a> Parser<'a> {
    fn new(options: &'a Options) -> Self {
        Self {
            options,
            ast: Ast::default(),
            markers: Vec::new(),
            macros: IndexMap::new(),
            pending_macro: None,
        }
    }

    fn finish(mut self) -> (Ast, Vec<Marker>) {
        if let Some((name, pos, _)) = self.pending_macro.take() {
            let msg = format!("Macro `{}` is missing `.endm`", name);
            self.markers.push(Marker::error(msg).at(pos));
        }
        (self.ast, self.markers)
    }

    fn line(&mut self, line: &str, idx: usize, offset: usize, depth: usize) {
        if self.pending_macro.is_some() {
            let head = line.trim_start();
            if head.get(..5).is_some_and(|h| h.eq_ignore_ascii_case(".endm")) {
                if let Some((name, pos, body)) = self.pending_macro.take() {
                    self.ast.push(Stmt::Macro(name.clone(), body.clone()), pos);
                    self.macros.insert(name, body);
                }
            } else if let Some((_, _, body)) = &mut self.pending_macro {
                body.push(line.to_string());
            }
            return;
        }

        let tokens = LineLexer::new(line, idx, offset).parse();
        let end = Location::new(offset + line.len(), idx, line.chars().count(), 0);
        let mut p = LineParser::new(tokens, end);
        if let Err(err) = self.statement(&mut p, depth) {
            self.markers.push(err.into_marker());
        }
    }

    fn statement(&mut self, p: &mut LineParser, depth: usize) -> Result<(), ParseError> {
        // 0. Lexical errors poison the whole line
        if let Some(token) = p.lexical_error() {
            return Err(ParseError::UnexpectedToken(token));
        }

        // 1. Label
        if p.is_label() {
            if let Some(token) = p.next() {
                if let TokenKind::Ident(name) | TokenKind::Dotted(name) = token.kind {
                    if name.starts_with('.') && !self.options.has(CompilerOption::LocalLabelsSupported) {
                        let msg = format!("Local label `{}` requires local label support", name);
                        return Err(ParseError::Invalid(msg, token.pos));
                    }
                    self.ast.push(Stmt::Label(name), token.pos);
                }
            }
            expect!(p, TokenKind::Colon)?;
        }

        // 2. Statement
        let Some(head) = p.next() else {
            return Ok(());
        };
        match head.kind {
            TokenKind::Dotted(directive) => self.directive(&directive, head.pos, p)?,
            TokenKind::Ident(mnemonic) => match OpKind::parse(&mnemonic) {
                Ok(op) => {
                    let stmt = instruction(op, p)?;
                    self.ast.push(stmt, head.pos);
                }
                Err(_) if self.macros.contains_key(&mnemonic) => {
                    self.expand(&mnemonic, head.pos, depth)?;
                }
                Err(_) => {
                    let msg = format!("Unknown instruction `{}`", mnemonic);
                    return Err(ParseError::Invalid(msg, head.pos));
                }
            },
            _ => return Err(ParseError::UnexpectedToken(head)),
        }

        // 3. Nothing may follow
        match p.next() {
            None => Ok(()),
            Some(token) if self.options.has(CompilerOption::RelaxedParsing) => {
                let msg = format!("Ignoring trailing {}", describe(&token.kind));
                self.markers.push(Marker::warning(msg).at(token.pos));
                Ok(())
            }
            Some(token) => Err(ParseError::UnexpectedToken(token)),
        }
    }

    fn directive(
        &mut self,
        directive: &str,
        pos: Location,
        p: &mut LineParser,
    ) -> Result<(), ParseError> {
        let stmt = match directive.to_ascii_lowercase().as_str() {
            ".org" => Stmt::Org(p.parse_expr()?),
            ".equ" => {
                let name = p.expect_ident()?;
                optional!(p, TokenKind::Comma);
                Stmt::Equ(name, p.parse_expr()?)
            }
            ".include" => match p.next() {
                Some(Token {
                    kind: TokenKind::Str(path),
                    ..
                }) => Stmt::Include(path),
                Some(token) => return Err(ParseError::UnexpectedToken(token)),
                None => return Err(ParseError::UnexpectedEol(p.end)),
            },
            ".word" => {
                let mut exprs = vec![p.parse_expr()?];
                while optional!(p, TokenKind::Comma).is_some() {
                    exprs.push(p.parse_expr()?);
                }
                Stmt::Word(exprs)
            }
            ".macro" => {
                let name = p.expect_ident()?;
                if OpKind::parse(&name).is_ok() {
                    let msg = format!("Macro `{}` shadows an instruction", name);
                    return Err(ParseError::Invalid(msg, pos));
                }
                self.pending_macro = Some((name, pos, Vec::new()));
                return Ok(());
            }
            ".endm" => {
                return Err(ParseError::Invalid("`.endm` without `.macro`".into(), pos));
            }
            _ if self.options.has(CompilerOption::RelaxedParsing) => {
                let msg = format!("Ignoring unknown directive `{}`", directive);
                self.markers.push(Marker::warning(msg).at(pos));
                while p.next().is_some() {}
                return Ok(());
            }
            _ => {
                let msg = format!("Unknown directive `{}`", directive);
                return Err(ParseError::Invalid(msg, pos));
            }
        };
        self.ast.push(stmt, pos);
        Ok(())
    }

    fn expand(&mut self, name: &str, pos: Location, depth: usize) -> Result<(), ParseError> {
        if depth >= MAX_MACRO_DEPTH {
            let msg = format!("Macro `{}` expands too deeply", name);
            return Err(ParseError::Invalid(msg, pos));
        }
        let body = self.macros.get(name).cloned().unwrap_or_default();
        let offset = pos.offset - pos.column;
        for line in &body {
            self.line(line, pos.line, offset, depth + 1);
        }
        Ok(())
    }
}

fn instruction(op: OpKind, p: &mut LineParser) -> Result<Stmt, ParseError> {
    Ok(match op.shape() {
        Shape::None => Stmt::Inst(op, Reg::ZERO, None),
        Shape::B => Stmt::Inst(op, Reg::ZERO, Some(p.parse_operand()?)),
        Shape::RegB => {
            let token = p.next().ok_or(ParseError::UnexpectedEol(p.end))?;
            let a = match &token.kind {
                TokenKind::Ident(name) => Reg::parse(name)
                    .map_err(|_| ParseError::Invalid(format!("Expected register, found `{}`", name), token.pos))?,
                _ => return Err(ParseError::UnexpectedToken(token)),
            };
            expect!(p, TokenKind::Comma)?;
            Stmt::Inst(op, a, Some(p.parse_operand()?))
        }
    })
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(s) | TokenKind::Dotted(s) => format!("`{}`", s),
        TokenKind::Number(n) => format!("number `{}`", n),
        TokenKind::Char(c) => format!("character `{:?}`", c),
        TokenKind::Str(s) => format!("string \"{}\"", s),
        TokenKind::Comment(_) => "comment".to_string(),
        TokenKind::Error(s) => format!("`{}`", s),
        other => format!("`{:?}`", other),
    }
}

// ------------------------------------------------------------------------
// Line parser
// ------------------------------------------------------------------------

struct LineParser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
    end: Location,
}

impl LineParser {
    fn new(tokens: Vec<Token>, end: Location) -> Self {
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Comment(_)))
            .collect();
        Self {
            tokens: tokens.into_iter().peekable(),
            end,
        }
    }

    fn next(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn lexical_error(&self) -> Option<Token> {
        self.tokens
            .clone()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
    }

    fn is_label(&self) -> bool {
        let mut ahead = self.tokens.clone();
        matches!(
            (ahead.next().map(|t| t.kind), ahead.next().map(|t| t.kind)),
            (
                Some(TokenKind::Ident(_) | TokenKind::Dotted(_)),
                Some(TokenKind::Colon)
            )
        )
    }

    /// Consume if next token is match with condition
    fn consume_if<F: Fn(&Token) -> bool>(&mut self, cond: F) -> Option<Token> {
        self.tokens.next_if(|token| cond(token))
    }

    /// Next token must be match with condition
    fn expect_tobe<F: Fn(&Token) -> bool>(&mut self, cond: F) -> Result<Token, ParseError> {
        match self.tokens.next() {
            Some(token) if cond(&token) => Ok(token),
            Some(token) => Err(ParseError::UnexpectedToken(token)),
            None => Err(ParseError::UnexpectedEol(self.end)),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match expect!(self, TokenKind::Ident(_))?.kind {
            TokenKind::Ident(name) => Ok(name),
            _ => Err(ParseError::UnexpectedEol(self.end)),
        }
    }

    /// Register or expression
    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let mut ahead = self.tokens.clone();
        if let (Some(TokenKind::Ident(name)), None) =
            (ahead.next().map(|t| t.kind), ahead.next())
        {
            if let Ok(reg) = Reg::parse(&name) {
                self.tokens.next();
                return Ok(Operand::Reg(reg));
            }
        }
        Ok(Operand::Expr(self.parse_expr()?))
    }

    /// Expression
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    /// `<expr> | <expr> | ...`
    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_xor()?;
        while optional!(self, TokenKind::Pipe).is_some() {
            let rhs = self.parse_xor()?;
            lhs = Expr::binary(lhs, BinOp::Or, rhs);
        }
        Ok(lhs)
    }

    /// `<expr> ^ <expr> ^ ...`
    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while optional!(self, TokenKind::Caret).is_some() {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(lhs, BinOp::Xor, rhs);
        }
        Ok(lhs)
    }

    /// `<expr> & <expr> & ...`
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_shift()?;
        while optional!(self, TokenKind::Amp).is_some() {
            let rhs = self.parse_shift()?;
            lhs = Expr::binary(lhs, BinOp::And, rhs);
        }
        Ok(lhs)
    }

    /// `<expr> << <expr>` | `<expr> >> <expr>`
    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = if optional!(self, TokenKind::LAngleLAngle).is_some() {
                BinOp::Shl
            } else if optional!(self, TokenKind::RAngleRAngle).is_some() {
                BinOp::Shr
            } else {
                break;
            };
            let rhs = self.parse_add()?;
            lhs = Expr::binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    /// `<expr> + <expr>` | `<expr> - <expr>`
    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if optional!(self, TokenKind::Plus).is_some() {
                BinOp::Add
            } else if optional!(self, TokenKind::Minus).is_some() {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_mul()?;
            lhs = Expr::binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    /// `<expr> * <expr>` | `<expr> / <expr>` | `<expr> % <expr>`
    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if optional!(self, TokenKind::Star).is_some() {
                BinOp::Mul
            } else if optional!(self, TokenKind::Slash).is_some() {
                BinOp::Div
            } else if optional!(self, TokenKind::Percent).is_some() {
                BinOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    /// `- <expr>` | `~ <expr>` | `+ <expr>`
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if optional!(self, TokenKind::Minus).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(expr)));
        }
        if optional!(self, TokenKind::Tilde).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(expr)));
        }
        if optional!(self, TokenKind::Plus).is_some() {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    /// Literal, symbol, `$` or parenthesized expression
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.tokens.next().ok_or(ParseError::UnexpectedEol(self.end))?;
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Char(c) => Ok(Expr::Number(c as i64)),
            TokenKind::Ident(name) => match Reg::parse(&name) {
                Ok(_) => {
                    let msg = format!("Register `{}` cannot be used in an expression", name);
                    Err(ParseError::Invalid(msg, token.pos))
                }
                Err(_) => Ok(Expr::Ident(name)),
            },
            TokenKind::Dotted(name) => Ok(Expr::Ident(name)),
            TokenKind::Dollar => Ok(Expr::Current),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                expect!(self, TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(ParseError::UnexpectedToken(token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(text: &str, options: &Options) -> Vec<Stmt> {
        let (ast, markers) = parse(text, options);
        assert!(markers.is_empty(), "{:?}", markers);
        ast.nodes.into_iter().map(|n| n.stmt).collect()
    }

    #[test]
    fn labels_and_instructions() {
        let got = stmts("start: mov a0, 3\n  jmp start ; loop\n  hlt", &Options::new());
        assert_eq!(
            got,
            vec![
                Stmt::Label("start".into()),
                Stmt::Inst(OpKind::Mov, Reg::A0, Some(Operand::Expr(Expr::Number(3)))),
                Stmt::Inst(OpKind::Jmp, Reg::ZERO, Some(Operand::Expr(Expr::ident("start")))),
                Stmt::Inst(OpKind::Hlt, Reg::ZERO, None),
            ]
        );
    }

    #[test]
    fn register_operand() {
        let got = stmts("ld t0, sp", &Options::new());
        assert_eq!(got, vec![Stmt::Inst(OpKind::Ld, Reg::T0, Some(Operand::Reg(Reg::SP)))]);
    }

    #[test]
    fn precedence() {
        let got = stmts(".equ X 1 + 2 * 3 << 1", &Options::new());
        let expected = Expr::binary(
            Expr::binary(
                Expr::Number(1),
                BinOp::Add,
                Expr::binary(Expr::Number(2), BinOp::Mul, Expr::Number(3)),
            ),
            BinOp::Shl,
            Expr::Number(1),
        );
        assert_eq!(got, vec![Stmt::Equ("X".into(), expected)]);
    }

    #[test]
    fn directives() {
        let got = stmts(
            ".org 0x100\n.include \"io.rk\"\n.word 1, -2, $",
            &Options::new(),
        );
        assert_eq!(
            got,
            vec![
                Stmt::Org(Expr::Number(0x100)),
                Stmt::Include("io.rk".into()),
                Stmt::Word(vec![
                    Expr::Number(1),
                    Expr::Unary(UnaryOp::Neg, Box::new(Expr::Number(2))),
                    Expr::Current,
                ]),
            ]
        );
    }

    #[test]
    fn local_labels_need_option() {
        let (_, markers) = parse(".loop: nop", &Options::new());
        assert_eq!(markers.len(), 1);

        let options = Options::new().with(CompilerOption::LocalLabelsSupported);
        let got = stmts("main:\n.loop: jmp .loop", &options);
        assert_eq!(got[1], Stmt::Label(".loop".into()));
    }

    #[test]
    fn macros_expand_in_place() {
        let text = ".macro PUSH0\n  sub sp, 1\n  st zero, sp\n.endm\nPUSH0\nPUSH0";
        let got = stmts(text, &Options::new());
        assert!(matches!(got[0], Stmt::Macro(ref name, ref body) if name == "PUSH0" && body.len() == 2));
        assert_eq!(got.len(), 5);
        assert_eq!(got[1], got[3]);
    }

    #[test]
    fn errors_are_markers() {
        let (ast, markers) = parse("bogus t0\nmov t0\n.word 1 2\nnop", &Options::new());
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].location.map(|l| l.line), Some(0));
        assert_eq!(markers[1].location.map(|l| l.line), Some(1));
        assert_eq!(ast.nodes.len(), 2);
    }

    #[test]
    fn relaxed_parsing_downgrades_to_warnings() {
        let options = Options::new().with(CompilerOption::RelaxedParsing);
        let (ast, markers) = parse(".section text\nnop nop", &options);
        assert_eq!(markers.len(), 2);
        assert!(markers.iter().all(|m| !m.is_error()));
        assert_eq!(ast.nodes.len(), 1);
    }
}
