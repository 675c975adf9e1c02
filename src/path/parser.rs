//! Path expression parser.
//!
//! Recursive descent parser producing the expression AST. Precedence from
//! loosest to tightest: `;` sequence, `,` array, `or`, `and`, equality,
//! relational, additive, multiplicative, unary minus, postfix steps.

use crate::error::CompileError;

use super::lexer::{Lexer, Token};

/// Path expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The focus value: the query target at the top level, the item under
    /// test inside a filter.
    Focus,
    /// Literal number.
    Number(f64),
    /// Literal string.
    Str(String),
    /// Literal boolean.
    Bool(bool),
    /// Literal null.
    Null,
    /// Variable reference (`$name`).
    Variable(String),
    /// Binding call (`$name(args)`).
    Call(String, Vec<Expr>),
    /// Property step (`base.field`).
    Field(Box<Expr>, String),
    /// Method-call step (`base.$name(args)`): calls the binding with the
    /// base value prepended to the arguments.
    Method(Box<Expr>, String, Vec<Expr>),
    /// Index access with a literal integer (`base[2]`, `base[-1]`).
    Index(Box<Expr>, i64),
    /// Predicate filter (`base[pred]`).
    Filter(Box<Expr>, Box<Expr>),
    /// Descendant-or-self collection of the base; produced for a filter with
    /// no base so `[name="b"]` searches the whole subtree.
    Descend(Box<Expr>),
    /// Array construction (`a, b, c`).
    Array(Vec<Expr>),
    /// Statement sequence (`a; b; c`): value is the last non-null result.
    Sequence(Vec<Expr>),
    /// Binary operation.
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// Unary negation.
    Neg(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Parse a path expression.
pub fn parse(input: &str) -> Result<Expr, CompileError> {
    let mut parser = Parser::new(input)?;
    parser.parse()
}

/// Path expression parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev: String,
}

impl<'a> Parser<'a> {
    /// Create a new parser.
    pub fn new(input: &'a str) -> Result<Self, CompileError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            prev: String::new(),
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Expr, CompileError> {
        let expr = self.parse_sequence()?;
        if self.current != Token::Eof {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    /// Advance to the next token.
    fn advance(&mut self) -> Result<(), CompileError> {
        self.prev = self.current.to_string();
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    /// Consume an expected token.
    fn expect(&mut self, token: Token) -> Result<(), CompileError> {
        if self.current == token {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> CompileError {
        if self.current == Token::Eof {
            CompileError::UnexpectedEnd {
                token: self.prev.clone(),
            }
        } else {
            CompileError::Syntax {
                token: self.current.to_string(),
            }
        }
    }

    /// Parse a `;`-separated sequence.
    fn parse_sequence(&mut self) -> Result<Expr, CompileError> {
        let mut items = vec![self.parse_array()?];
        while self.current == Token::Semi {
            self.advance()?;
            // tolerate a trailing separator
            if matches!(
                self.current,
                Token::Eof | Token::RightParen | Token::RightBracket
            ) {
                break;
            }
            items.push(self.parse_array()?);
        }
        if items.len() == 1 {
            Ok(items.swap_remove(0))
        } else {
            Ok(Expr::Sequence(items))
        }
    }

    /// Parse a `,`-separated array.
    fn parse_array(&mut self) -> Result<Expr, CompileError> {
        let mut items = vec![self.parse_or()?];
        while self.current == Token::Comma {
            self.advance()?;
            items.push(self.parse_or()?);
        }
        if items.len() == 1 {
            Ok(items.swap_remove(0))
        } else {
            Ok(Expr::Array(items))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_equality()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.current == Token::Minus {
            self.advance()?;
            let operand = self.parse_unary()?;
            // fold literal negation so -1 stays a literal index
            if let Expr::Number(n) = operand {
                return Ok(Expr::Number(-n));
            }
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_postfix()
    }

    /// Parse a primary followed by any number of postfix steps.
    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    match self.current.clone() {
                        Token::Name(name) => {
                            self.advance()?;
                            expr = Expr::Field(Box::new(expr), name);
                        }
                        Token::Variable(name) => {
                            self.advance()?;
                            let args = self.parse_args()?;
                            expr = Expr::Method(Box::new(expr), name, args);
                        }
                        _ => return Err(self.unexpected()),
                    }
                }
                Token::LeftBracket => {
                    self.advance()?;
                    let inner = self.parse_sequence()?;
                    self.expect(Token::RightBracket)?;
                    expr = bracket_expr(expr, inner);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.current.clone() {
            Token::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.advance()?;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance()?;
                Ok(Expr::Bool(false))
            }
            Token::Null => {
                self.advance()?;
                Ok(Expr::Null)
            }
            Token::Dollar => {
                self.advance()?;
                Ok(Expr::Focus)
            }
            Token::Variable(name) => {
                self.advance()?;
                if self.current == Token::LeftParen {
                    let args = self.parse_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            // bare name: a field step from the focus
            Token::Name(name) => {
                self.advance()?;
                Ok(Expr::Field(Box::new(Expr::Focus), name))
            }
            // leading dot: an anchored field step from the focus
            Token::Dot => {
                self.advance()?;
                match self.current.clone() {
                    Token::Name(name) => {
                        self.advance()?;
                        Ok(Expr::Field(Box::new(Expr::Focus), name))
                    }
                    Token::Variable(name) => {
                        self.advance()?;
                        let args = self.parse_args()?;
                        Ok(Expr::Method(Box::new(Expr::Focus), name, args))
                    }
                    _ => Err(self.unexpected()),
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let inner = self.parse_sequence()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            // leading filter: searches the focus subtree
            Token::LeftBracket => {
                self.advance()?;
                let inner = self.parse_sequence()?;
                self.expect(Token::RightBracket)?;
                Ok(bracket_expr(Expr::Descend(Box::new(Expr::Focus)), inner))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse a parenthesized argument list.
    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        if self.current != Token::RightParen {
            loop {
                args.push(self.parse_or()?);
                if self.current == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;
        Ok(args)
    }
}

/// A bracketed postfix becomes an index when its content is an integer
/// literal, a filter otherwise.
fn bracket_expr(base: Expr, inner: Expr) -> Expr {
    if let Expr::Number(n) = inner {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            return Expr::Index(Box::new(base), n as i64);
        }
    }
    Expr::Filter(Box::new(base), Box::new(inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_steps_from_focus() {
        let expr = parse("name").unwrap();
        assert_eq!(expr, Expr::Field(Box::new(Expr::Focus), "name".into()));
    }

    #[test]
    fn leading_filter_descends() {
        let expr = parse("[name=\"b\"]").unwrap();
        match expr {
            Expr::Filter(base, pred) => {
                assert_eq!(*base, Expr::Descend(Box::new(Expr::Focus)));
                assert!(matches!(*pred, Expr::Binary(..)));
            }
            other => panic!("unexpected ast: {:?}", other),
        }
    }

    #[test]
    fn integer_bracket_is_index() {
        let expr = parse("$.children[0]").unwrap();
        assert!(matches!(expr, Expr::Index(_, 0)));
        let expr = parse("$.children[-1]").unwrap();
        assert!(matches!(expr, Expr::Index(_, -1)));
    }

    #[test]
    fn non_integer_bracket_is_filter() {
        let expr = parse("$.children[x > 1]").unwrap();
        assert!(matches!(expr, Expr::Filter(..)));
    }

    #[test]
    fn precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary(left, BinaryOp::Add, right) => {
                assert_eq!(*left, Expr::Number(1.0));
                assert!(matches!(*right, Expr::Binary(_, BinaryOp::Mul, _)));
            }
            other => panic!("unexpected ast: {:?}", other),
        }
    }

    #[test]
    fn comparison_binds_tighter_than_and() {
        let expr = parse("a = 1 and b = 2").unwrap();
        assert!(matches!(expr, Expr::Binary(_, BinaryOp::And, _)));
    }

    #[test]
    fn top_level_comma_builds_array() {
        let expr = parse("1, 2, 3").unwrap();
        match expr {
            Expr::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected ast: {:?}", other),
        }
    }

    #[test]
    fn semicolon_sequences() {
        let expr = parse("1; 2").unwrap();
        assert!(matches!(expr, Expr::Sequence(ref items) if items.len() == 2));
    }

    #[test]
    fn method_call_step() {
        let expr = parse("$.children.$slice(0, 2)").unwrap();
        match expr {
            Expr::Method(base, name, args) => {
                assert!(matches!(*base, Expr::Field(..)));
                assert_eq!(name, "slice");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected ast: {:?}", other),
        }
    }

    #[test]
    fn call_arguments_allow_anchored_steps() {
        let expr = parse("$slice(.children, 1)").unwrap();
        match expr {
            Expr::Call(name, args) => {
                assert_eq!(name, "slice");
                assert_eq!(args[0], Expr::Field(Box::new(Expr::Focus), "children".into()));
            }
            other => panic!("unexpected ast: {:?}", other),
        }
    }

    #[test]
    fn negative_literal_folds() {
        assert_eq!(parse("-2").unwrap(), Expr::Number(-2.0));
        assert!(matches!(parse("-x").unwrap(), Expr::Neg(_)));
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse("1 2").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn unterminated_group_is_incomplete() {
        let err = parse("(1 + 2").unwrap_err();
        assert!(err.is_incomplete());
    }
}
