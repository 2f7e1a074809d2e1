use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '\n' => {
                    self.insert_semicolon(self.offset);
                    self.bump();
                }
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => self.lex_number(),
                '"' => self.lex_string(),
                '`' => self.lex_raw_string(),
                '\'' => self.lex_rune(),
                _ => self.lex_symbol(),
            }
        }
        self.insert_semicolon(self.offset);
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn insert_semicolon(&mut self, at: usize) {
        let needed = self
            .tokens
            .last()
            .is_some_and(|token| token.kind.ends_statement());
        if needed {
            self.push_token(TokenKind::Semi, at, at);
        }
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_line_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        let mut saw_newline = false;
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                if saw_newline {
                    self.insert_semicolon(start);
                }
                return;
            }
            if ch == '\n' {
                saw_newline = true;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        let kind =
            TokenKind::keyword(slice).unwrap_or_else(|| TokenKind::Identifier(slice.to_string()));
        self.push_token(kind, start, end);
    }

    fn eat_digits(&mut self, radix: u32) {
        while let Some(ch) = self.current {
            if ch == '_' || ch.is_digit(radix) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let mut is_float = false;
        let mut radix = 10;

        if self.current == Some('0') {
            match self.peek() {
                Some('x') | Some('X') => radix = 16,
                Some('b') | Some('B') => radix = 2,
                Some('o') | Some('O') => radix = 8,
                _ => {}
            }
            if radix != 10 {
                self.bump();
                self.bump();
            }
        }
        self.eat_digits(radix);

        if self.current == Some('.') && (radix == 10 || radix == 16) {
            is_float = true;
            self.bump();
            self.eat_digits(radix);
        }

        let exponent = if radix == 16 {
            matches!(self.current, Some('p') | Some('P'))
        } else {
            radix == 10 && matches!(self.current, Some('e') | Some('E'))
        };
        if exponent {
            is_float = true;
            self.bump();
            if matches!(self.current, Some('+') | Some('-')) {
                self.bump();
            }
            let digits_start = self.offset;
            self.eat_digits(10);
            if self.offset == digits_start {
                self.error(start, self.offset, "Exponent has no digits");
            }
        }

        let kind = if self.current == Some('i') {
            self.bump();
            TokenKind::Imag(self.src[start..self.offset].to_string())
        } else if is_float {
            TokenKind::Float(self.src[start..self.offset].to_string())
        } else {
            TokenKind::Int(self.src[start..self.offset].to_string())
        };
        self.push_token(kind, start, self.offset);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let content_start = self.offset;
        while let Some(ch) = self.current {
            match ch {
                '"' => {
                    let value = self.src[content_start..self.offset].to_string();
                    self.bump();
                    self.push_token(TokenKind::String(value), start, self.offset);
                    return;
                }
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => break,
                _ => {
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    fn lex_raw_string(&mut self) {
        let start = self.offset;
        self.bump();
        let content_start = self.offset;
        while let Some(ch) = self.current {
            if ch == '`' {
                let value = self.src[content_start..self.offset].to_string();
                self.bump();
                self.push_token(TokenKind::String(value), start, self.offset);
                return;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated raw string literal");
    }

    fn lex_rune(&mut self) {
        let start = self.offset;
        self.bump();
        let content_start = self.offset;
        while let Some(ch) = self.current {
            match ch {
                '\'' => {
                    let value = self.src[content_start..self.offset].to_string();
                    self.bump();
                    if value.is_empty() {
                        self.error(start, self.offset, "Empty rune literal");
                    }
                    self.push_token(TokenKind::Rune(value), start, self.offset);
                    return;
                }
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => break,
                _ => {
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated rune literal");
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let rest = &self.src[start..];
        const SYMBOLS: &[(&str, TokenKind)] = &[
            ("<<=", TokenKind::ShlEq),
            (">>=", TokenKind::ShrEq),
            ("&^=", TokenKind::AndNotEq),
            ("...", TokenKind::Ellipsis),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("<-", TokenKind::Arrow),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::BangEq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
            (":=", TokenKind::Define),
            ("+=", TokenKind::PlusEq),
            ("-=", TokenKind::MinusEq),
            ("*=", TokenKind::StarEq),
            ("/=", TokenKind::SlashEq),
            ("%=", TokenKind::PercentEq),
            ("&=", TokenKind::AmpEq),
            ("|=", TokenKind::PipeEq),
            ("^=", TokenKind::CaretEq),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("&^", TokenKind::AndNot),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("&", TokenKind::Amp),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("<", TokenKind::Lt),
            (">", TokenKind::Gt),
            ("=", TokenKind::Eq),
            ("!", TokenKind::Bang),
            ("~", TokenKind::Tilde),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            (",", TokenKind::Comma),
            (".", TokenKind::Dot),
            (";", TokenKind::Semi),
            (":", TokenKind::Colon),
        ];

        for (text, kind) in SYMBOLS {
            if rest.starts_with(text) {
                for _ in 0..text.len() {
                    self.bump();
                }
                self.push_token(kind.clone(), start, self.offset);
                return;
            }
        }

        let ch = self.current.unwrap_or('\0');
        self.bump();
        self.error(start, self.offset, format!("Unexpected character `{ch}`"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn inserts_semicolons_at_line_ends() {
        let tokens = kinds("x := 3\nx++\nreturn\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Define,
                TokenKind::Int("3".into()),
                TokenKind::Semi,
                TokenKind::Identifier("x".into()),
                TokenKind::Inc,
                TokenKind::Semi,
                TokenKind::Return,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator_or_open_brace() {
        let tokens = kinds("f(a,\n b) {\n}");
        assert!(!tokens[..4].contains(&TokenKind::Semi));
        assert_eq!(tokens[tokens.len() - 2], TokenKind::Semi);
    }

    #[test]
    fn block_comment_with_newline_terminates_statement() {
        let tokens = kinds("a /* one\n two */ b");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Semi,
                TokenKind::Identifier("b".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_numbers_strings_and_runes() {
        let tokens = kinds(r#"0x1F 1.5e3 .5 2i 1_000 "a\"b" `raw` '\n'"#);
        assert_eq!(tokens[0], TokenKind::Int("0x1F".into()));
        assert_eq!(tokens[1], TokenKind::Float("1.5e3".into()));
        assert_eq!(tokens[2], TokenKind::Float(".5".into()));
        assert_eq!(tokens[3], TokenKind::Imag("2i".into()));
        assert_eq!(tokens[4], TokenKind::Int("1_000".into()));
        assert_eq!(tokens[5], TokenKind::String("a\\\"b".into()));
        assert_eq!(tokens[6], TokenKind::String("raw".into()));
        assert_eq!(tokens[7], TokenKind::Rune("\\n".into()));
    }

    #[test]
    fn longest_operator_wins() {
        let tokens = kinds("a &^= b <- c ... :=");
        assert!(tokens.contains(&TokenKind::AndNotEq));
        assert!(tokens.contains(&TokenKind::Arrow));
        assert!(tokens.contains(&TokenKind::Ellipsis));
        assert!(tokens.contains(&TokenKind::Define));
    }

    #[test]
    fn reports_unterminated_string() {
        let errors = lex("x := \"abc\n").expect_err("should fail");
        assert_eq!(errors[0].message, "Unterminated string literal");
    }
}
