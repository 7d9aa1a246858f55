//! Tokenizer

use super::ast::Pos;
use super::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // keywords
    Var,
    Fn,
    Return,
    If,
    Else,
    While,
    True,
    False,
    Null,
    New,
    Using,
    Throw,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    Eof,
}

impl TokenKind {
    /// Human-readable form for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(n) => n.to_string(),
            TokenKind::Float(n) => n.to_string(),
            TokenKind::Str(_) => "string literal".into(),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Eof => "end of input".into(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Var => "var",
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::New => "new",
            TokenKind::Using => "using",
            TokenKind::Throw => "throw",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Dot => ".",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "var" => TokenKind::Var,
        "fn" => TokenKind::Fn,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "new" => TokenKind::New,
        "using" => TokenKind::Using,
        "throw" => TokenKind::Throw,
        _ => return None,
    };
    Some(kind)
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    /// Skip whitespace and comments. Fails on an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            let start = self.pos();
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    Some('*') if self.peek() == Some('/') => {
                                        self.bump();
                                        break;
                                    }
                                    Some(_) => {}
                                    None => {
                                        return Err(Diagnostic::new(start, "End-of-file found, '*/' expected"));
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, first: char, pos: Pos) -> Result<TokenKind, Diagnostic> {
        let mut text = String::from(first);
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
                if c != '_' {
                    text.push(c);
                }
            } else if c == '.' && !is_float {
                // `1.foo` is not a float; require a digit after the dot
                let mut ahead = self.chars.clone();
                ahead.next();
                if !matches!(ahead.peek(), Some(d) if d.is_ascii_digit()) {
                    break;
                }
                is_float = true;
                self.bump();
                text.push('.');
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| Diagnostic::new(pos, format!("Invalid real literal '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| Diagnostic::new(pos, "Integral constant is too large"))
        }
    }

    fn string(&mut self, pos: Pos) -> Result<TokenKind, Diagnostic> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(TokenKind::Str(s)),
                Some('\\') => {
                    let esc_pos = self.pos();
                    match self.bump() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('0') => s.push('\0'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some(other) => {
                            return Err(Diagnostic::new(esc_pos, format!("Unrecognized escape sequence '\\{}'", other)));
                        }
                        None => return Err(Diagnostic::new(pos, "Newline in constant")),
                    }
                }
                Some('\n') | None => return Err(Diagnostic::new(pos, "Newline in constant")),
                Some(c) => s.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.skip_trivia()?;
        let pos = self.pos();
        let Some(c) = self.bump() else {
            return Ok(Token { kind: TokenKind::Eof, pos });
        };
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => if self.eat('=') { TokenKind::EqEq } else { TokenKind::Assign },
            '!' => if self.eat('=') { TokenKind::NotEq } else { TokenKind::Bang },
            '<' => if self.eat('=') { TokenKind::Le } else { TokenKind::Lt },
            '>' => if self.eat('=') { TokenKind::Ge } else { TokenKind::Gt },
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            '"' => self.string(pos)?,
            c if c.is_ascii_digit() => self.number(c, pos)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                keyword(&word).unwrap_or(TokenKind::Ident(word))
            }
            other => return Err(Diagnostic::new(pos, format!("Unexpected character '{}'", other))),
        };
        Ok(Token { kind, pos })
    }
}

/// Tokenize source text. The returned vector always ends with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_statement() {
        assert_eq!(kinds("var x = 42;"), vec![
            TokenKind::Var,
            TokenKind::Ident("x".into()),
            TokenKind::Assign,
            TokenKind::Int(42),
            TokenKind::Semi,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(kinds("a <= b && !c || d != e"), vec![
            TokenKind::Ident("a".into()),
            TokenKind::Le,
            TokenKind::Ident("b".into()),
            TokenKind::AndAnd,
            TokenKind::Bang,
            TokenKind::Ident("c".into()),
            TokenKind::OrOr,
            TokenKind::Ident("d".into()),
            TokenKind::NotEq,
            TokenKind::Ident("e".into()),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("1_000 2.5 3.x"), vec![
            TokenKind::Int(1000),
            TokenKind::Float(2.5),
            TokenKind::Int(3),
            TokenKind::Dot,
            TokenKind::Ident("x".into()),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_tokenize_string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#), vec![TokenKind::Str("a\"b\n".into()), TokenKind::Eof]);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(kinds("// hi\n1 /* two\nlines */ 2"), vec![
            TokenKind::Int(1),
            TokenKind::Int(2),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[0].pos, Pos::new(1, 1));
        assert_eq!(tokens[1].pos, Pos::new(2, 3));
    }

    #[test]
    fn test_errors() {
        let err = tokenize("\"open").unwrap_err();
        assert_eq!(err.to_string(), "(1,1): Newline in constant");
        let err = tokenize("x @ y").unwrap_err();
        assert_eq!(err.to_string(), "(1,3): Unexpected character '@'");
        let err = tokenize("99999999999999999999").unwrap_err();
        assert_eq!(err.message, "Integral constant is too large");
    }
}
