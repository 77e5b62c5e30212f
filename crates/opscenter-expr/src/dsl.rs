// crates/opscenter-expr/src/dsl.rs
// ============================================================================
// Module: Filter Expression Parser
// Description: Lexer and type-checking recursive-descent parser.
// Purpose: Turn filter expression source into a typed expression tree bound
//          to a record schema.
// Dependencies: crate::{error, expr, functions, schema, value}, smallvec
// ============================================================================

//! ## Overview
//!
//! The grammar is a small subset of the expr-lang syntax used by update
//! filters. Every identifier is resolved against a [`Schema`] and every
//! operator is type-checked while parsing, so a compiled expression can only
//! fail at evaluation time on bad record data or helper input.
//! Expression input is untrusted; size and nesting are bounded.
//!
//! ### Grammar (informal)
//! - **Literals**: `'stable'`, `"x86_64"`, `42`, `-1`, `true`, `false`, `['a', 'b']`
//! - **Fields**: any identifier declared by the schema (`Channels`, `Size`)
//! - **Comparison**: `==`, `!=`, `<`, `<=`, `>`, `>=` (no chaining)
//! - **Membership**: `'stable' in Channels`, `'edge' not in Channels`
//! - **String operators**: `contains`, `startsWith`, `endsWith`
//! - **Connectives**: `&&` / `and`, `||` / `or`, `!` / `not`
//! - **Helpers**: `AppliesToArchitecture("x86_64")`, `len(x)`, `lower(x)`, `upper(x)`
//!
//! Unary `!`/`not` binds tighter than comparisons: write `!(a == b)` or
//! `a != b`, not `!a == b`.
//!
//! ### Example
//!
//! ```
//! use opscenter_expr::Schema;
//! use opscenter_expr::ValueType;
//! use opscenter_expr::compile;
//!
//! let schema = Schema::builder("Update")
//!     .field("Channels", ValueType::StringList)
//!     .build()
//!     .unwrap();
//! let compiled = compile("'stable' in Channels", &schema).unwrap();
//! assert_eq!(compiled.source(), "'stable' in Channels");
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use smallvec::SmallVec;

use crate::error::CompileError;
use crate::expr::CompareOp;
use crate::expr::Expr;
use crate::expr::Literal;
use crate::functions;
use crate::schema::Schema;
use crate::value::ValueType;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed expression size in bytes.
pub const MAX_EXPRESSION_BYTES: usize = 64 * 1024;
/// Maximum supported nesting depth.
pub const MAX_EXPRESSION_NESTING: usize = 32;

/// Reserved words that cannot be used as field names.
const KEYWORDS: &[&str] =
    &["and", "or", "not", "in", "contains", "startsWith", "endsWith", "true", "false"];

/// Returns true when `word` is a reserved keyword.
pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parses and type-checks `input` against `schema`, returning the root node.
///
/// # Errors
///
/// Returns [`CompileError`] for empty or oversized input, syntax errors,
/// unknown identifiers or helpers, type errors, and non-boolean expressions.
pub(crate) fn parse_expression(input: &str, schema: &Schema) -> Result<Expr, CompileError> {
    if input.len() > MAX_EXPRESSION_BYTES {
        return Err(CompileError::InputTooLarge {
            max_bytes: MAX_EXPRESSION_BYTES,
            actual_bytes: input.len(),
        });
    }
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser::new(tokens, schema);
    let root = parser.parse_or()?;
    parser.expect_eof()?;
    if root.ty != ValueType::Bool {
        return Err(CompileError::NotBoolean {
            found: root.ty,
        });
    }
    Ok(root.expr)
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Identifier.
    Ident(&'a str),
    /// Integer literal text, including an optional leading `-`.
    Int(&'a str),
    /// Unescaped string literal.
    Str(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `&&` or `and`
    And,
    /// `||` or `or`
    Or,
    /// `!`
    Not,
    /// `not`; also starts the `not in` operator.
    NotWord,
    /// `in`
    In,
    /// `contains`
    Contains,
    /// `startsWith`
    StartsWith,
    /// `endsWith`
    EndsWith,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// End of input.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Byte-oriented lexer.
struct Lexer<'a> {
    /// Source being tokenized.
    input: &'a str,
    /// Current byte offset.
    offset: usize,
    /// Tokens produced so far.
    tokens: Vec<SpannedToken<'a>>,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenizes the whole input.
    fn lex(mut self) -> Result<Vec<SpannedToken<'a>>, CompileError> {
        let bytes = self.input.as_bytes();
        while let Some(&ch) = bytes.get(self.offset) {
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => self.offset += 1,
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'[' => self.single(Token::LBracket),
                b']' => self.single(Token::RBracket),
                b',' => self.single(Token::Comma),
                b'!' => {
                    if self.peek() == Some(b'=') {
                        self.double(Token::Ne);
                    } else {
                        self.single(Token::Not);
                    }
                }
                b'=' => {
                    if self.peek() == Some(b'=') {
                        self.double(Token::Eq);
                    } else {
                        return Err(self.unexpected("`==`", "="));
                    }
                }
                b'<' => {
                    if self.peek() == Some(b'=') {
                        self.double(Token::Le);
                    } else {
                        self.single(Token::Lt);
                    }
                }
                b'>' => {
                    if self.peek() == Some(b'=') {
                        self.double(Token::Ge);
                    } else {
                        self.single(Token::Gt);
                    }
                }
                b'&' => {
                    if self.peek() == Some(b'&') {
                        self.double(Token::And);
                    } else {
                        return Err(self.unexpected("`&&`", "&"));
                    }
                }
                b'|' => {
                    if self.peek() == Some(b'|') {
                        self.double(Token::Or);
                    } else {
                        return Err(self.unexpected("`||`", "|"));
                    }
                }
                b'\'' | b'"' => self.lex_string(ch)?,
                b'-' if self.peek().is_some_and(|next| next.is_ascii_digit()) => {
                    let start = self.offset;
                    self.offset += 1;
                    self.consume_while(|b| b.is_ascii_digit());
                    self.push(Token::Int(&self.input[start .. self.offset]), start);
                }
                b'0' ..= b'9' => {
                    let start = self.offset;
                    self.consume_while(|b| b.is_ascii_digit());
                    self.push(Token::Int(&self.input[start .. self.offset]), start);
                }
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' => {
                    let start = self.offset;
                    self.consume_while(|b| b.is_ascii_alphanumeric() || b == b'_');
                    let word = &self.input[start .. self.offset];
                    self.push(keyword_or_ident(word), start);
                }
                _ => {
                    let found = self.input[self.offset ..].chars().next().unwrap_or_default();
                    return Err(self.unexpected("operand or operator", &found.to_string()));
                }
            }
        }

        if self.tokens.is_empty() {
            return Err(CompileError::EmptyInput);
        }
        let end = self.offset;
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }

    /// Lexes a quoted string literal starting at the current offset.
    fn lex_string(&mut self, quote: u8) -> Result<(), CompileError> {
        let start = self.offset;
        let body_start = start + 1;
        let mut value = String::new();
        let mut chars = self.input[body_start ..].char_indices();
        while let Some((index, ch)) = chars.next() {
            if ch == char::from(quote) {
                self.offset = body_start + index + 1;
                self.push(Token::Str(value), start);
                return Ok(());
            }
            if ch == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                value.push(match escaped {
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    'n' => '\n',
                    't' => '\t',
                    other => {
                        return Err(CompileError::InvalidEscape {
                            sequence: other,
                            position: body_start + index,
                        });
                    }
                });
            } else {
                value.push(ch);
            }
        }
        Err(CompileError::UnterminatedString {
            position: start,
        })
    }

    /// Pushes a one-byte token and advances.
    fn single(&mut self, token: Token<'a>) {
        self.push(token, self.offset);
        self.offset += 1;
    }

    /// Pushes a two-byte token and advances.
    fn double(&mut self, token: Token<'a>) {
        self.push(token, self.offset);
        self.offset += 2;
    }

    /// Appends a token at `position`.
    fn push(&mut self, token: Token<'a>, position: usize) {
        self.tokens.push(SpannedToken {
            token,
            position,
        });
    }

    /// Returns the byte after the current one.
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.offset + 1).copied()
    }

    /// Advances while `condition` holds for the current byte.
    fn consume_while(&mut self, condition: impl Fn(u8) -> bool) {
        while let Some(&b) = self.input.as_bytes().get(self.offset) {
            if !condition(b) {
                break;
            }
            self.offset += 1;
        }
    }

    /// Builds an unexpected-token error at the current offset.
    fn unexpected(&self, expected: &'static str, found: &str) -> CompileError {
        CompileError::UnexpectedToken {
            expected,
            found: found.to_string(),
            position: self.offset,
        }
    }
}

/// Maps a word to a keyword token or an identifier.
fn keyword_or_ident(word: &str) -> Token<'_> {
    match word {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::NotWord,
        "in" => Token::In,
        "contains" => Token::Contains,
        "startsWith" => Token::StartsWith,
        "endsWith" => Token::EndsWith,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(word),
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Expression node with its static type and source position.
struct Typed {
    /// Expression node.
    expr: Expr,
    /// Static type.
    ty: ValueType,
    /// Byte offset where the node starts.
    position: usize,
}

/// Recursive-descent parser that type-checks as it builds.
struct Parser<'input, 'schema> {
    /// Token stream.
    tokens: Vec<SpannedToken<'input>>,
    /// Current token index.
    index: usize,
    /// Schema identifiers resolve against.
    schema: &'schema Schema,
    /// Current nesting depth.
    nesting: usize,
}

impl<'input, 'schema> Parser<'input, 'schema> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'input>>, schema: &'schema Schema) -> Self {
        Self {
            tokens,
            index: 0,
            schema,
            nesting: 0,
        }
    }

    /// Parses `a || b || ...`.
    fn parse_or(&mut self) -> Result<Typed, CompileError> {
        let first = self.parse_and()?;
        if self.current().token != Token::Or {
            return Ok(first);
        }
        let position = first.position;
        let mut parts: SmallVec<[Box<Expr>; 4]> = SmallVec::new();
        parts.push(Box::new(require_bool(first, "||")?));
        while self.matches(&Token::Or) {
            let next = self.parse_and()?;
            parts.push(Box::new(require_bool(next, "||")?));
        }
        Ok(Typed {
            expr: Expr::Or(parts),
            ty: ValueType::Bool,
            position,
        })
    }

    /// Parses `a && b && ...`.
    fn parse_and(&mut self) -> Result<Typed, CompileError> {
        let first = self.parse_comparison()?;
        if self.current().token != Token::And {
            return Ok(first);
        }
        let position = first.position;
        let mut parts: SmallVec<[Box<Expr>; 4]> = SmallVec::new();
        parts.push(Box::new(require_bool(first, "&&")?));
        while self.matches(&Token::And) {
            let next = self.parse_comparison()?;
            parts.push(Box::new(require_bool(next, "&&")?));
        }
        Ok(Typed {
            expr: Expr::And(parts),
            ty: ValueType::Bool,
            position,
        })
    }

    /// Parses an optional single comparison between two unary operands.
    fn parse_comparison(&mut self) -> Result<Typed, CompileError> {
        let lhs = self.parse_unary()?;
        let Some(op) = self.comparison_operator() else {
            return Ok(lhs);
        };
        let op_position = self.current().position;
        self.advance();
        if op == CompareOp::NotIn {
            // `not` was consumed above; this consumes `in`.
            self.advance();
        }
        let rhs = self.parse_unary()?;
        check_comparison(op, lhs.ty, rhs.ty, op_position)?;
        Ok(Typed {
            expr: Expr::Compare {
                op,
                lhs: Box::new(lhs.expr),
                rhs: Box::new(rhs.expr),
            },
            ty: ValueType::Bool,
            position: lhs.position,
        })
    }

    /// Returns the comparison operator at the cursor without consuming it.
    fn comparison_operator(&self) -> Option<CompareOp> {
        Some(match self.current().token {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::In => CompareOp::In,
            Token::Contains => CompareOp::Contains,
            Token::StartsWith => CompareOp::StartsWith,
            Token::EndsWith => CompareOp::EndsWith,
            Token::NotWord if self.peek_token() == Some(&Token::In) => CompareOp::NotIn,
            _ => return None,
        })
    }

    /// Parses `!x` / `not x` or a primary expression.
    fn parse_unary(&mut self) -> Result<Typed, CompileError> {
        if matches!(self.current().token, Token::Not | Token::NotWord) {
            let position = self.current().position;
            self.advance();
            return self.with_nesting(position, |parser| {
                let operand = parser.parse_unary()?;
                let expr = require_bool(operand, "!")?;
                Ok(Typed {
                    expr: Expr::Not(Box::new(expr)),
                    ty: ValueType::Bool,
                    position,
                })
            });
        }
        self.parse_primary()
    }

    /// Parses literals, fields, calls, lists, and parenthesized expressions.
    fn parse_primary(&mut self) -> Result<Typed, CompileError> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Ident(name) => {
                self.advance();
                if self.matches(&Token::LParen) {
                    self.with_nesting(position, |parser| parser.parse_call(name, position))
                } else {
                    self.resolve_field(name, position)
                }
            }
            Token::Int(raw) => {
                self.advance();
                let value: i64 = raw.parse().map_err(|_| CompileError::InvalidNumber {
                    raw: raw.to_string(),
                    position,
                })?;
                Ok(literal(Literal::Int(value), ValueType::Int, position))
            }
            Token::Str(value) => {
                self.advance();
                Ok(literal(Literal::Str(value.into_boxed_str()), ValueType::String, position))
            }
            Token::True | Token::False => {
                self.advance();
                Ok(literal(Literal::Bool(token == Token::True), ValueType::Bool, position))
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let inner = parser.parse_or()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(Typed {
                        position,
                        ..inner
                    })
                })
            }
            Token::LBracket => {
                self.advance();
                self.with_nesting(position, |parser| parser.parse_list(position))
            }
            _ => Err(CompileError::UnexpectedToken {
                expected: "operand",
                found: self.describe_current(),
                position,
            }),
        }
    }

    /// Parses helper call arguments after `name(`.
    fn parse_call(&mut self, name: &str, position: usize) -> Result<Typed, CompileError> {
        let mut args: Vec<Expr> = Vec::new();
        let mut types: SmallVec<[ValueType; 2]> = SmallVec::new();
        if !self.matches(&Token::RParen) {
            loop {
                let arg = self.parse_or()?;
                types.push(arg.ty);
                args.push(arg.expr);
                if self.matches(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "`,` or `)` after argument")?;
                break;
            }
        }
        let (function, ty) = functions::resolve(name, &types, self.schema, position)?;
        Ok(Typed {
            expr: Expr::Call {
                function,
                args,
            },
            ty,
            position,
        })
    }

    /// Parses list literal elements after `[`.
    fn parse_list(&mut self, position: usize) -> Result<Typed, CompileError> {
        let mut items = Vec::new();
        let mut element: Option<ValueType> = None;
        if !self.matches(&Token::RBracket) {
            loop {
                let item = self.parse_or()?;
                if !item.ty.is_list_element() {
                    return Err(CompileError::TypeMismatch {
                        message: format!("list elements must be string or int, found {}", item.ty),
                        position: item.position,
                    });
                }
                match element {
                    Some(existing) if existing != item.ty => {
                        return Err(CompileError::TypeMismatch {
                            message: format!(
                                "list mixes {existing} and {} elements",
                                item.ty
                            ),
                            position: item.position,
                        });
                    }
                    _ => element = Some(item.ty),
                }
                items.push(item.expr);
                if self.matches(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RBracket, "`,` or `]` in list")?;
                break;
            }
        }
        let ty = element.and_then(ValueType::list_of).unwrap_or(ValueType::EmptyList);
        Ok(Typed {
            expr: Expr::List(items),
            ty,
            position,
        })
    }

    /// Resolves a field identifier against the schema.
    fn resolve_field(&self, name: &str, position: usize) -> Result<Typed, CompileError> {
        let ty = self.schema.field_type(name).ok_or_else(|| CompileError::UnknownIdentifier {
            name: name.to_string(),
            record: self.schema.name().to_string(),
            position,
        })?;
        Ok(Typed {
            expr: Expr::Field {
                name: name.into(),
                ty,
            },
            ty,
            position,
        })
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPRESSION_NESTING {
            return Err(CompileError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_NESTING,
                actual_depth: next_depth,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), CompileError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(CompileError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser reached end of input.
    fn expect_eof(&self) -> Result<(), CompileError> {
        if self.current().token == Token::Eof {
            Ok(())
        } else {
            Err(CompileError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the current token when it equals `token`.
    fn matches(&mut self, token: &Token<'_>) -> bool {
        if &self.current().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'input> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    /// Returns the token after the current one.
    fn peek_token(&self) -> Option<&Token<'input>> {
        self.tokens.get(self.index + 1).map(|spanned| &spanned.token)
    }

    /// Advances to the next token, stopping at end of input.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    /// Formats the current token for diagnostics.
    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Ident(name) | Token::Int(name) => (*name).to_string(),
            Token::Str(value) => format!("'{value}'"),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::Not => "!".to_string(),
            Token::NotWord => "not".to_string(),
            Token::In => "in".to_string(),
            Token::Contains => "contains".to_string(),
            Token::StartsWith => "startsWith".to_string(),
            Token::EndsWith => "endsWith".to_string(),
            Token::Eq => "==".to_string(),
            Token::Ne => "!=".to_string(),
            Token::Lt => "<".to_string(),
            Token::Le => "<=".to_string(),
            Token::Gt => ">".to_string(),
            Token::Ge => ">=".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Type Rules
// ============================================================================

/// Builds a literal node.
const fn literal(value: Literal, ty: ValueType, position: usize) -> Typed {
    Typed {
        expr: Expr::Literal(value),
        ty,
        position,
    }
}

/// Unwraps a boolean operand of a connective.
fn require_bool(operand: Typed, operator: &str) -> Result<Expr, CompileError> {
    if operand.ty == ValueType::Bool {
        Ok(operand.expr)
    } else {
        Err(CompileError::TypeMismatch {
            message: format!("operand of `{operator}` must be bool, found {}", operand.ty),
            position: operand.position,
        })
    }
}

/// Checks operand types of a comparison.
fn check_comparison(
    op: CompareOp,
    lhs: ValueType,
    rhs: ValueType,
    position: usize,
) -> Result<(), CompileError> {
    let ok = match op {
        CompareOp::Eq | CompareOp::Ne => lhs.is_compatible(rhs),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            lhs == rhs && matches!(lhs, ValueType::Int | ValueType::String)
        }
        CompareOp::In | CompareOp::NotIn => {
            lhs.is_list_element() && (rhs == ValueType::EmptyList || rhs.element() == Some(lhs))
        }
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            lhs == ValueType::String && rhs == ValueType::String
        }
    };
    if ok {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            message: format!("operator `{}` cannot be applied to {lhs} and {rhs}", op.symbol()),
            position,
        })
    }
}
