// patter-lang - Lexer for Patter source text
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for Patter source code.
//!
//! Converts source text into a stream of [`Symbol`]s. Newlines are
//! significant and appear in the stream; comments and whitespace do not.
//! String interpolation (`"{expr}"`) is expanded here, at the end of string
//! lexing, into a parenthesized concatenation so that the parser never
//! needs a string-aware mode.

use std::fmt;

use crate::symbol::{Literal, Symbol, SymbolKind};

/// Lexer error with position information.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lex error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// One piece of a string literal: literal text, or an interpolated
/// expression to splice in.
enum StringSegment {
    Text(String),
    Expr(String),
}

/// The lexer converts source text into symbols.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    /// True until a non-whitespace character is seen on the current line;
    /// block comment markers are only recognized at the start of a line.
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source text.
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// Lex the entire source into a symbol list.
    ///
    /// The list always ends with a `NewLine` symbol (when non-empty), and
    /// consecutive newlines are collapsed, so the parser can treat
    /// "statement then end of line" uniformly.
    pub fn tokenize(mut self) -> Result<Vec<Symbol>, LexError> {
        let mut symbols = self.scan()?;
        if let Some(last) = symbols.last()
            && last.kind != SymbolKind::NewLine
        {
            let (line, column) = (self.line, self.column);
            symbols.push(Symbol::new(SymbolKind::NewLine, line, column));
        }
        Ok(symbols)
    }

    // ========================================================================
    // Scanner
    // ========================================================================

    fn scan(&mut self) -> Result<Vec<Symbol>, LexError> {
        let mut symbols: Vec<Symbol> = Vec::new();

        while let Some(c) = self.peek() {
            let line = self.line;
            let column = self.column;

            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    push_newline(&mut symbols, line, column);
                }
                '\\' => {
                    // A trailing backslash escapes the line break.
                    self.advance();
                    self.skip_inline_whitespace();
                    if self.peek() == Some('\n') {
                        self.advance();
                    } else {
                        return Err(self.error("expected end of line after '\\'"));
                    }
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '-' if self.at_line_start && self.peek_ahead(1) == Some('-')
                    && self.peek_ahead(2) == Some('-') =>
                {
                    self.skip_block_comment()?;
                    push_newline(&mut symbols, line, column);
                }
                '"' => {
                    self.read_string(&mut symbols)?;
                }
                '0'..='9' => {
                    symbols.push(self.read_number()?);
                }
                _ if c.is_alphabetic() => {
                    symbols.push(self.read_word());
                }
                _ => {
                    symbols.push(self.read_operator()?);
                }
            }
        }

        // Strip any leading newline left by blank lines at the top.
        while symbols.first().map(|s| s.kind) == Some(SymbolKind::NewLine) {
            symbols.remove(0);
        }
        Ok(symbols)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
                self.at_line_start = true;
            } else {
                self.column += 1;
                if ch != ' ' && ch != '\t' && ch != '\r' {
                    self.at_line_start = false;
                }
            }
        }
        c
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Skip a `---` block comment. The opening marker has been peeked but
    /// not consumed; the comment runs to the next line that begins with
    /// `---`, whose remainder is also discarded.
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_line = self.line;
        // Opening marker and the rest of its line.
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        message: format!(
                            "unterminated block comment starting at line {}",
                            start_line
                        ),
                        line: self.line,
                        column: self.column,
                    });
                }
                Some('\n') => {
                    self.advance();
                    self.skip_inline_whitespace();
                    if self.peek() == Some('-')
                        && self.peek_ahead(1) == Some('-')
                        && self.peek_ahead(2) == Some('-')
                    {
                        // Closing marker; discard its line.
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                        self.advance();
                        return Ok(());
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    // ========================================================================
    // Strings and interpolation
    // ========================================================================

    fn read_string(&mut self, symbols: &mut Vec<Symbol>) -> Result<(), LexError> {
        let line = self.line;
        let column = self.column;
        self.advance(); // consume opening quote

        let mut segments: Vec<StringSegment> = Vec::new();
        let mut text = String::new();

        loop {
            match self.advance() {
                Some('"') => break,
                Some('\n') | None => return Err(self.error("unterminated string")),
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('{') => text.push('{'),
                    Some('}') => text.push('}'),
                    Some(c) => {
                        return Err(self.error(format!("unknown escape sequence: \\{}", c)));
                    }
                    None => return Err(self.error("unterminated string escape")),
                },
                Some('{') => {
                    segments.push(StringSegment::Text(std::mem::take(&mut text)));
                    let expr = self.read_interpolation_expr()?;
                    segments.push(StringSegment::Expr(expr));
                }
                Some('}') => {
                    return Err(self.error("'}' outside interpolation; escape it as \\}"));
                }
                Some(c) => text.push(c),
            }
        }
        segments.push(StringSegment::Text(text));

        self.expand_string(segments, symbols, line, column)
    }

    fn read_interpolation_expr(&mut self) -> Result<String, LexError> {
        let mut expr = String::new();
        let mut depth = 1usize;
        loop {
            match self.advance() {
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    expr.push('}');
                }
                Some('{') => {
                    depth += 1;
                    expr.push('{');
                }
                Some('"') => {
                    return Err(self.error("string literals are not allowed in interpolation"));
                }
                Some('\n') | None => return Err(self.error("unterminated interpolation")),
                Some(c) => expr.push(c),
            }
        }
        if expr.trim().is_empty() {
            return Err(self.error("empty interpolation"));
        }
        Ok(expr)
    }

    /// Expand a lexed string into symbols. A plain string becomes a single
    /// `StringValue`; a string with interpolations becomes a parenthesized
    /// concatenation of its parts, each expression spliced in parentheses.
    fn expand_string(
        &self,
        segments: Vec<StringSegment>,
        symbols: &mut Vec<Symbol>,
        line: u32,
        column: u32,
    ) -> Result<(), LexError> {
        let has_expr = segments
            .iter()
            .any(|s| matches!(s, StringSegment::Expr(_)));
        if !has_expr {
            let mut text = String::new();
            for segment in segments {
                if let StringSegment::Text(t) = segment {
                    text.push_str(&t);
                }
            }
            symbols.push(Symbol::with_text(SymbolKind::StringValue, text, line, column));
            return Ok(());
        }

        // Drop empty text parts, but keep a leading empty string when the
        // first part is an expression so the concatenation starts from a
        // string and the result is always a string.
        let mut parts: Vec<StringSegment> = Vec::new();
        for segment in segments {
            match segment {
                StringSegment::Text(t) if t.is_empty() => {}
                other => parts.push(other),
            }
        }
        if matches!(parts.first(), Some(StringSegment::Expr(_)) | None) {
            parts.insert(0, StringSegment::Text(String::new()));
        }

        symbols.push(Symbol::new(SymbolKind::ParenOpen, line, column));
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                symbols.push(Symbol::new(SymbolKind::Plus, line, column));
            }
            match part {
                StringSegment::Text(t) => {
                    symbols.push(Symbol::with_text(SymbolKind::StringValue, t, line, column));
                }
                StringSegment::Expr(expr) => {
                    let inner = Lexer::new(&expr).scan().map_err(|e| LexError {
                        message: format!("in interpolation: {}", e.message),
                        line,
                        column,
                    })?;
                    symbols.push(Symbol::new(SymbolKind::ParenOpen, line, column));
                    for mut symbol in inner {
                        if symbol.kind == SymbolKind::NewLine {
                            continue;
                        }
                        symbol.line = line;
                        symbol.column = column;
                        symbols.push(symbol);
                    }
                    symbols.push(Symbol::new(SymbolKind::ParenClose, line, column));
                }
            }
        }
        symbols.push(Symbol::new(SymbolKind::ParenClose, line, column));
        Ok(())
    }

    // ========================================================================
    // Numbers, words, operators
    // ========================================================================

    fn read_number(&mut self) -> Result<Symbol, LexError> {
        let line = self.line;
        let column = self.column;
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_number = false;
        if self.peek() == Some('.')
            && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_number = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut offset = 1;
            if matches!(self.peek_ahead(1), Some('+') | Some('-')) {
                offset = 2;
            }
            if self.peek_ahead(offset).is_some_and(|c| c.is_ascii_digit()) {
                is_number = true;
                for _ in 0..offset {
                    text.push(self.advance().unwrap_or_default());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_number {
            let n: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid number: {}", text)))?;
            Ok(Symbol::with_literal(
                SymbolKind::NumberValue,
                Literal::Number(n),
                line,
                column,
            ))
        } else {
            let n: i64 = text
                .parse()
                .map_err(|_| self.error(format!("integer literal out of range: {}", text)))?;
            Ok(Symbol::with_literal(
                SymbolKind::IntegerValue,
                Literal::Integer(n),
                line,
                column,
            ))
        }
    }

    fn read_word(&mut self) -> Symbol {
        let line = self.line;
        let column = self.column;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphabetic() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let lowered = text.to_lowercase();
        match lowered.as_str() {
            // Literal values carry no text, so multi-word name collection
            // never swallows them.
            "true" | "false" => Symbol::with_literal(
                SymbolKind::BooleanValue,
                Literal::Boolean(lowered == "true"),
                line,
                column,
            ),
            _ => match SymbolKind::keyword(&lowered) {
                Some(kind) => Symbol::with_text(kind, text, line, column),
                None => Symbol::with_text(SymbolKind::NameValue, text, line, column),
            },
        }
    }

    fn read_operator(&mut self) -> Result<Symbol, LexError> {
        let line = self.line;
        let column = self.column;
        let c = match self.advance() {
            Some(c) => c,
            None => return Err(self.error("unexpected end of input")),
        };
        let kind = match c {
            '+' => SymbolKind::Plus,
            '-' => SymbolKind::Minus,
            '*' => SymbolKind::Asterisk,
            '/' => SymbolKind::ForwardSlash,
            '%' => SymbolKind::Percent,
            '=' => SymbolKind::Equals,
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    SymbolKind::NotEquals
                } else {
                    return Err(self.error("expected '=' after '!'"));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    SymbolKind::LessThanEquals
                } else {
                    SymbolKind::LessThan
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    SymbolKind::GreaterThanEquals
                } else {
                    SymbolKind::GreaterThan
                }
            }
            '(' => SymbolKind::ParenOpen,
            ')' => SymbolKind::ParenClose,
            '[' => SymbolKind::SquareOpen,
            ']' => SymbolKind::SquareClose,
            '{' => SymbolKind::CurlyOpen,
            '}' => SymbolKind::CurlyClose,
            ',' => SymbolKind::Comma,
            _ => return Err(self.error(format!("unexpected character: '{}'", c))),
        };
        Ok(Symbol::new(kind, line, column))
    }
}

/// Append a NewLine symbol unless the stream already ends with one.
fn push_newline(symbols: &mut Vec<Symbol>, line: u32, column: u32) {
    if symbols.last().map(|s| s.kind) != Some(SymbolKind::NewLine) {
        symbols.push(Symbol::new(SymbolKind::NewLine, line, column));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<SymbolKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.kind)
            .collect()
    }

    fn lex(source: &str) -> Vec<Symbol> {
        Lexer::new(source).tokenize().unwrap()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("set x to 5"),
            vec![
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(kinds("SET x TO 5")[0], SymbolKind::Set);
        assert_eq!(kinds("Loop While true")[0], SymbolKind::Loop);
    }

    #[test]
    fn test_name_case_preserved() {
        let symbols = lex("set MyName to 1");
        assert_eq!(symbols[1].text, "MyName");
    }

    #[test]
    fn test_newlines_collapse() {
        assert_eq!(
            kinds("set x to 1\n\n\nset y to 2"),
            vec![
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(
            kinds("set x to 1 + \\\n2"),
            vec![
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::Plus,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(
            kinds("set x to 1 # the rest is ignored * / +"),
            vec![
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_block_comment() {
        let source = "set x to 1\n---\nall of this\nis ignored\n---\nset y to 2";
        let k = kinds(source);
        assert_eq!(
            k,
            vec![
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
                SymbolKind::Set,
                SymbolKind::NameValue,
                SymbolKind::To,
                SymbolKind::IntegerValue,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(Lexer::new("---\nnever closed").tokenize().is_err());
    }

    #[test]
    fn test_integers_and_numbers() {
        let symbols = lex("42 3.5 1e3 2.5e-2");
        assert_eq!(symbols[0].literal, Literal::Integer(42));
        assert_eq!(symbols[1].literal, Literal::Number(3.5));
        assert_eq!(symbols[2].literal, Literal::Number(1e3));
        assert_eq!(symbols[3].literal, Literal::Number(2.5e-2));
    }

    #[test]
    fn test_booleans() {
        let symbols = lex("true False");
        assert_eq!(symbols[0].literal, Literal::Boolean(true));
        assert_eq!(symbols[1].literal, Literal::Boolean(false));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+ - * / % = != < <= > >= ( ) [ ] { } ,"),
            vec![
                SymbolKind::Plus,
                SymbolKind::Minus,
                SymbolKind::Asterisk,
                SymbolKind::ForwardSlash,
                SymbolKind::Percent,
                SymbolKind::Equals,
                SymbolKind::NotEquals,
                SymbolKind::LessThan,
                SymbolKind::LessThanEquals,
                SymbolKind::GreaterThan,
                SymbolKind::GreaterThanEquals,
                SymbolKind::ParenOpen,
                SymbolKind::ParenClose,
                SymbolKind::SquareOpen,
                SymbolKind::SquareClose,
                SymbolKind::CurlyOpen,
                SymbolKind::CurlyClose,
                SymbolKind::Comma,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_string_literal() {
        let symbols = lex(r#""hello world""#);
        assert_eq!(symbols[0].kind, SymbolKind::StringValue);
        assert_eq!(symbols[0].text, "hello world");
    }

    #[test]
    fn test_string_escapes() {
        let symbols = lex(r#""a\nb\t\"c\" \{x\}""#);
        assert_eq!(symbols[0].text, "a\nb\t\"c\" {x}");
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("\"oops").tokenize().is_err());
        assert!(Lexer::new("\"oops\nnext line\"").tokenize().is_err());
    }

    #[test]
    fn test_interpolation_expands_to_concat() {
        // "a{x}b" -> ( "a" + ( x ) + "b" )
        assert_eq!(
            kinds(r#""a{x}b""#),
            vec![
                SymbolKind::ParenOpen,
                SymbolKind::StringValue,
                SymbolKind::Plus,
                SymbolKind::ParenOpen,
                SymbolKind::NameValue,
                SymbolKind::ParenClose,
                SymbolKind::Plus,
                SymbolKind::StringValue,
                SymbolKind::ParenClose,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_interpolation_only_expr_stays_string() {
        // "{x}" -> ( "" + ( x ) )
        assert_eq!(
            kinds(r#""{x}""#),
            vec![
                SymbolKind::ParenOpen,
                SymbolKind::StringValue,
                SymbolKind::Plus,
                SymbolKind::ParenOpen,
                SymbolKind::NameValue,
                SymbolKind::ParenClose,
                SymbolKind::ParenClose,
                SymbolKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_interpolation_with_expression() {
        // "{a + 1}" splices the full expression tokens.
        let k = kinds(r#""{a + 1}""#);
        assert!(k.contains(&SymbolKind::Plus));
        assert!(k.contains(&SymbolKind::IntegerValue));
    }

    #[test]
    fn test_empty_interpolation_fails() {
        assert!(Lexer::new(r#""a{}b""#).tokenize().is_err());
    }

    #[test]
    fn test_position_tracking() {
        let symbols = lex("set x to 5\nset y to 6");
        assert_eq!((symbols[0].line, symbols[0].column), (1, 1));
        assert_eq!((symbols[1].line, symbols[1].column), (1, 5));
        let second_set = &symbols[5];
        assert_eq!((second_set.line, second_set.column), (2, 1));
    }

    #[test]
    fn test_bad_characters() {
        assert!(Lexer::new("set x to 5 @").tokenize().is_err());
        assert!(Lexer::new("x ! y").tokenize().is_err());
    }

    #[test]
    fn test_empty_source() {
        assert!(lex("").is_empty());
        assert!(lex("   \n  # comment only\n").is_empty());
    }

    #[test]
    fn test_multi_word_names_not_merged() {
        let symbols = lex("set high score to 10");
        assert_eq!(symbols[1].text, "high");
        assert_eq!(symbols[2].text, "score");
    }
}
