//! Path expression lexer.
//!
//! Tokenizes path expression source into tokens. Names follow the attribute
//! naming rules (`-` is a name character), so subtraction needs surrounding
//! whitespace: `a - b` subtracts, `a-b` is one name.

use std::fmt;

use crate::error::CompileError;
use crate::value::format_number;

/// Path expression token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Structure
    Dot,    // .
    Dollar, // $ (the focus value)
    Comma,  // ,
    Semi,   // ;

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Operators
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Eq,      // =
    NotEq,   // !=
    Lt,      // <
    LtEq,    // <=
    Gt,      // >
    GtEq,    // >=
    And,     // and
    Or,      // or

    // Literals
    Number(f64),
    Str(String),
    True,
    False,
    Null,

    // Names
    Name(String),
    Variable(String), // $name

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Dot => f.write_str("."),
            Token::Dollar => f.write_str("$"),
            Token::Comma => f.write_str(","),
            Token::Semi => f.write_str(";"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::LeftBracket => f.write_str("["),
            Token::RightBracket => f.write_str("]"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Eq => f.write_str("="),
            Token::NotEq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::LtEq => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::GtEq => f.write_str(">="),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Number(n) => f.write_str(&format_number(*n)),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Null => f.write_str("null"),
            Token::Name(n) => f.write_str(n),
            Token::Variable(v) => write!(f, "${}", v),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Path expression lexer.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer.
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    /// Get the remaining input.
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Peek at the character at offset.
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Advance by n bytes.
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace();

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        match c {
            '.' => {
                if self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    // Number starting with .
                    return Ok(self.read_number());
                }
                self.advance(1);
                Ok(Token::Dot)
            }
            '$' => {
                self.advance(1);
                if self.peek().map(is_name_start_char).unwrap_or(false) {
                    let name = self.read_name_chars();
                    Ok(Token::Variable(name))
                } else {
                    Ok(Token::Dollar)
                }
            }
            ',' => {
                self.advance(1);
                Ok(Token::Comma)
            }
            ';' => {
                self.advance(1);
                Ok(Token::Semi)
            }
            '(' => {
                self.advance(1);
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance(1);
                Ok(Token::RightParen)
            }
            '[' => {
                self.advance(1);
                Ok(Token::LeftBracket)
            }
            ']' => {
                self.advance(1);
                Ok(Token::RightBracket)
            }
            '+' => {
                self.advance(1);
                Ok(Token::Plus)
            }
            '-' => {
                self.advance(1);
                Ok(Token::Minus)
            }
            '*' => {
                self.advance(1);
                Ok(Token::Star)
            }
            '/' => {
                self.advance(1);
                Ok(Token::Slash)
            }
            '%' => {
                self.advance(1);
                Ok(Token::Percent)
            }
            '=' => {
                self.advance(1);
                // tolerate == as well
                if self.peek() == Some('=') {
                    self.advance(1);
                }
                Ok(Token::Eq)
            }
            '!' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::NotEq)
                } else {
                    Err(CompileError::Syntax {
                        token: "!".to_string(),
                    })
                }
            }
            '<' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::LtEq)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::GtEq)
                } else {
                    Ok(Token::Gt)
                }
            }
            '"' | '\'' => self.read_string(),
            '0'..='9' => Ok(self.read_number()),
            _ if is_name_start_char(c) => Ok(self.read_name_or_keyword()),
            _ => Err(CompileError::Syntax {
                token: c.to_string(),
            }),
        }
    }

    /// Read a number literal.
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.advance(1);
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance(1);
                } else {
                    break;
                }
            }
        }

        let value = self.input[start..self.pos].parse().unwrap_or(f64::NAN);
        Token::Number(value)
    }

    /// Read a quoted string literal with backslash escapes.
    fn read_string(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q) => q,
            None => return Ok(Token::Eof),
        };
        self.advance(1);

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    let token: String = self.input[start..].chars().take(16).collect();
                    return Err(CompileError::UnterminatedString { token });
                }
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(Token::Str(value));
                }
                Some('\\') => {
                    self.advance(1);
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(c) => value.push(c),
                        None => continue,
                    }
                    if let Some(c) = self.peek() {
                        self.advance(c.len_utf8());
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance(c.len_utf8());
                }
            }
        }
    }

    /// Read a name or keyword.
    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_name_chars();
        match name.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Name(name),
        }
    }

    fn read_name_chars(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if matches!(token, Token::Eof) {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(lexer: &mut Lexer) -> Token {
        lexer.next_token().unwrap()
    }

    #[test]
    fn field_chain() {
        let mut lexer = Lexer::new("$.children.name");
        assert_eq!(next(&mut lexer), Token::Dollar);
        assert_eq!(next(&mut lexer), Token::Dot);
        assert_eq!(next(&mut lexer), Token::Name("children".to_string()));
        assert_eq!(next(&mut lexer), Token::Dot);
        assert_eq!(next(&mut lexer), Token::Name("name".to_string()));
        assert_eq!(next(&mut lexer), Token::Eof);
    }

    #[test]
    fn dollar_name_is_variable() {
        let mut lexer = Lexer::new("$n + 1");
        assert_eq!(next(&mut lexer), Token::Variable("n".to_string()));
        assert_eq!(next(&mut lexer), Token::Plus);
        assert_eq!(next(&mut lexer), Token::Number(1.0));
    }

    #[test]
    fn names_may_contain_dashes() {
        let mut lexer = Lexer::new("data-id - 1");
        assert_eq!(next(&mut lexer), Token::Name("data-id".to_string()));
        assert_eq!(next(&mut lexer), Token::Minus);
        assert_eq!(next(&mut lexer), Token::Number(1.0));
    }

    #[test]
    fn filter_tokens() {
        let mut lexer = Lexer::new("[name=\"b\"]");
        assert_eq!(next(&mut lexer), Token::LeftBracket);
        assert_eq!(next(&mut lexer), Token::Name("name".to_string()));
        assert_eq!(next(&mut lexer), Token::Eq);
        assert_eq!(next(&mut lexer), Token::Str("b".to_string()));
        assert_eq!(next(&mut lexer), Token::RightBracket);
    }

    #[test]
    fn string_escapes() {
        let mut lexer = Lexer::new(r#""a\"b\n""#);
        assert_eq!(next(&mut lexer), Token::Str("a\"b\n".to_string()));
    }

    #[test]
    fn unterminated_string_is_incomplete() {
        let mut lexer = Lexer::new("\"oops");
        let err = lexer.next_token().unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn keywords() {
        let mut lexer = Lexer::new("true and false or null");
        assert_eq!(next(&mut lexer), Token::True);
        assert_eq!(next(&mut lexer), Token::And);
        assert_eq!(next(&mut lexer), Token::False);
        assert_eq!(next(&mut lexer), Token::Or);
        assert_eq!(next(&mut lexer), Token::Null);
    }

    #[test]
    fn fractional_numbers() {
        let mut lexer = Lexer::new("3.25 .5");
        assert_eq!(next(&mut lexer), Token::Number(3.25));
        assert_eq!(next(&mut lexer), Token::Number(0.5));
    }
}
