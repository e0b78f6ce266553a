use crate::diagnostics::{Diagnostic, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    For,
    In,
    While,
    Using,
    Import,
    Return,
    Break,
    Continue,
    Block,
    Pub,
    And,
    Or,
    Not,
    None,
    True,
    False,
    Inf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,
    Keyword(Keyword),
    FuncSign,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Pipe,
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eol,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// For `Str` tokens this is the raw text between the quotes with escape
    /// sequences still unprocessed; decoding happens during lowering.
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some((idx, ch)) = self.peeked.take() {
            Some((idx, ch))
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn match_next(&mut self, expected: char) -> bool {
        if let Some((idx, ch)) = self.peek() {
            if ch == expected {
                self.peeked = None;
                self.current = idx + ch.len_utf8();
                return true;
            }
        }
        false
    }

    fn collect_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some((_, ch)) = self.peek() {
            if predicate(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_blanks_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some((_, ' ')) | Some((_, '\t')) => {
                    self.bump();
                }
                Some((_, '#')) => {
                    self.bump();
                    while let Some((_, ch)) = self.peek() {
                        if ch == '\n' || ch == '\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        self.collect_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            span: SourceSpan { start, end },
        }
    }

    // Permissive scan: the exact digit set per base is validated when the
    // literal is parsed into a number during lowering.
    fn number_literal(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        loop {
            match self.peek() {
                Some((_, ch)) if ch.is_ascii_alphanumeric() || ch == '_' => {
                    self.bump();
                }
                Some((idx, '.')) if !seen_dot => {
                    // A dot only continues the number when a digit follows,
                    // otherwise it starts a selector.
                    let rest = &self.source[idx + 1..];
                    if rest.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
                        seen_dot = true;
                        self.bump();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        let end = self.current;
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((idx, ch)) = self.bump() {
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::Str,
                        lexeme: value,
                        span: SourceSpan {
                            start,
                            end: idx + 1,
                        },
                    });
                }
                '\\' => {
                    value.push('\\');
                    if let Some((_, esc)) = self.bump() {
                        value.push(esc);
                    } else {
                        break;
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::lexical("unterminated string literal").with_span(SourceSpan {
            start,
            end: self.current,
        }))
    }

    fn eol(&mut self, start: usize) -> Token {
        self.collect_while(|ch| ch == '\n' || ch == '\r');
        Token {
            kind: TokenKind::Eol,
            lexeme: String::new(),
            span: SourceSpan {
                start,
                end: self.current,
            },
        }
    }

    fn simple_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks_and_comments();
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        span: SourceSpan {
                            start: self.current,
                            end: self.current,
                        },
                    });
                    break;
                }
            };

            let token = match ch {
                'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start),
                '"' => self.string_literal(start)?,
                '\n' | '\r' => self.eol(start),
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '[' => self.simple_token(start, TokenKind::LBracket),
                ']' => self.simple_token(start, TokenKind::RBracket),
                '{' => self.simple_token(start, TokenKind::LBrace),
                '}' => self.simple_token(start, TokenKind::RBrace),
                '|' => self.simple_token(start, TokenKind::Pipe),
                '.' => self.simple_token(start, TokenKind::Dot),
                ',' => self.simple_token(start, TokenKind::Comma),
                ':' => self.simple_token(start, TokenKind::Colon),
                '+' => self.simple_token(start, TokenKind::Plus),
                '-' => self.simple_token(start, TokenKind::Minus),
                '*' => self.simple_token(start, TokenKind::Star),
                '/' => self.simple_token(start, TokenKind::Slash),
                '%' => self.simple_token(start, TokenKind::Percent),
                '=' => {
                    if self.match_next('>') {
                        self.simple_token(start, TokenKind::FuncSign)
                    } else if self.match_next('=') {
                        self.simple_token(start, TokenKind::EqualEqual)
                    } else {
                        self.simple_token(start, TokenKind::Assign)
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::BangEqual)
                    } else {
                        return Err(Diagnostic::lexical("expected `=` after `!`").with_span(
                            SourceSpan {
                                start,
                                end: self.current,
                            },
                        ));
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual)
                    } else {
                        self.simple_token(start, TokenKind::Less)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual)
                    } else {
                        self.simple_token(start, TokenKind::Greater)
                    }
                }
                other => {
                    return Err(
                        Diagnostic::lexical(format!("unexpected character `{other}`")).with_span(
                            SourceSpan {
                                start,
                                end: self.current,
                            },
                        ),
                    );
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "if" => Kw::If,
        "else" => Kw::Else,
        "for" => Kw::For,
        "in" => Kw::In,
        "while" => Kw::While,
        "using" => Kw::Using,
        "import" => Kw::Import,
        "return" => Kw::Return,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "block" => Kw::Block,
        "pub" => Kw::Pub,
        "and" => Kw::And,
        "or" => Kw::Or,
        "not" => Kw::Not,
        "none" => Kw::None,
        "true" => Kw::True,
        "false" => Kw::False,
        "inf" => Kw::Inf,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
