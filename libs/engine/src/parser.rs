//! LaTeX math parser - converts token tapes to expression trees
//!
//! Recursive descent parser with one method per precedence tier.
//! Precedence (lowest to highest):
//! 1. biconditional (\Leftrightarrow)
//! 2. implication (\Rightarrow, right-associative)
//! 3. or (\lor)
//! 4. xor (\oplus)
//! 5. and (\land)
//! 6. not (\lnot, prefix)
//! 7. comparisons (a run at one level folds into a chain)
//! 8. additive (+, -)
//! 9. multiplicative (*, /, \cdot, \times, implicit)
//! 10. unary minus
//! 11. power (^, right-associative)
//! 12. postfix (!, ^T)
//! 13. primary (literal, identifier, command form, group, environment)
//!
//! The parser carries an explicit recursion-depth counter compared against a
//! configurable ceiling, so adversarial nesting fails with a structured
//! error instead of exhausting the call stack.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::functions;
use crate::lexer::{Lexer, LexerOptions};
use crate::token::{Token, TokenType};

/// Default nesting-depth ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 500;

/// Configuration for the parser.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Nesting-depth ceiling for subexpression descent.
    pub max_depth: usize,
    /// Fold adjacent primaries into multiplication (`2x`, `x(y+1)`).
    pub implicit_multiplication: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            implicit_multiplication: true,
        }
    }
}

/// Parser for LaTeX math expressions
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    options: ParserOptions,
    /// Set while parsing an integral body: `d<var>` stops operand runs.
    differential_stop: bool,
}

/// Parse a source string with default options.
pub fn parse_source(input: &str) -> Result<Expr> {
    let tokens = Lexer::tokenize(input)?;
    Parser::new(tokens, ParserOptions::default()).parse()
}

/// Parse a source string with explicit options and optional extensions.
pub fn parse_source_with(
    input: &str,
    options: ParserOptions,
    extensions: Option<&ExtensionRegistry>,
) -> Result<Expr> {
    let lexer_options = LexerOptions {
        single_letter_identifiers: options.implicit_multiplication,
        ..Default::default()
    };
    let tokens = Lexer::tokenize_with(input, lexer_options, extensions)?;
    Parser::new(tokens, options).parse()
}

impl Parser {
    pub fn new(tokens: Vec<Token>, options: ParserOptions) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            options,
            differential_stop: false,
        }
    }

    // ------------------------------------------------------------------
    // Token tape helpers
    // ------------------------------------------------------------------

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("token tape ends with EOF"))
    }

    fn current_type(&self) -> &TokenType {
        &self.current().token_type
    }

    fn current_is(&self, token_type: TokenType) -> bool {
        *self.current_type() == token_type
    }

    fn current_is_one_of(&self, types: &[TokenType]) -> bool {
        types.contains(self.current_type())
    }

    fn peek_type(&self, offset: usize) -> Option<&TokenType> {
        self.tokens.get(self.position + offset).map(|t| &t.token_type)
    }

    fn peek_value(&self, offset: usize) -> Option<&str> {
        self.tokens
            .get(self.position + offset)
            .map(|t| t.value.as_str())
    }

    fn here(&self) -> usize {
        self.current().position
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<Token> {
        if self.current_is(token_type) {
            Ok(self.advance())
        } else if self.current_is(TokenType::Eof) {
            Err(Error::parse_with_suggestion(
                format!("expected {} but reached end of input", what),
                self.here(),
                what,
            ))
        } else {
            Err(Error::parse(
                format!("expected {}, found '{}'", what, self.current().value),
                self.here(),
            ))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(Error::parse(
                format!("nesting depth exceeds maximum of {}", self.options.max_depth),
                self.here(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Parse one top-level statement and require the tape to be consumed.
    pub fn parse(&mut self) -> Result<Expr> {
        if self.current_is(TokenType::Eof) {
            return Err(Error::parse("empty expression", 0));
        }
        let expr = self.parse_statement()?;
        if !self.current_is(TokenType::Eof) {
            return Err(Error::parse(
                format!("unexpected '{}' after expression", self.current().value),
                self.here(),
            ));
        }
        Ok(expr)
    }

    /// Error-recovery mode: collect multiple sub-errors by synchronizing at
    /// statement boundaries (top-level separators and environment ends).
    pub fn parse_with_recovery(&mut self) -> (Option<Expr>, Vec<Error>) {
        let mut errors = Vec::new();
        let mut first = None;
        while !self.current_is(TokenType::Eof) {
            self.depth = 0;
            match self.parse_statement() {
                Ok(expr) => {
                    if first.is_none() {
                        first = Some(expr);
                    }
                    if self.current_is(TokenType::Comma) {
                        self.advance();
                    } else if !self.current_is(TokenType::Eof) {
                        errors.push(Error::parse(
                            format!("unexpected '{}' after expression", self.current().value),
                            self.here(),
                        ));
                        self.synchronize();
                    }
                }
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }
        (first, errors)
    }

    fn synchronize(&mut self) {
        while !self.current_is(TokenType::Eof) {
            let token_type = self.advance().token_type;
            if matches!(token_type, TokenType::Comma | TokenType::EndEnv) {
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Top-level forms
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Expr> {
        // let NAME = EXPR
        if self.current_is(TokenType::Text) && self.current().value == "let" {
            return self.parse_let();
        }

        // NAME(p1, ..., pn) = EXPR
        if let Some(definition) = self.try_parse_function_definition()? {
            return Ok(definition);
        }

        let expr = self.parse_expression()?;

        // EXPR , CONDITION  |  EXPR { CONDITION }
        if self.current_is(TokenType::Comma) && !self.peek_is_eof_after_comma() {
            let save = self.position;
            self.advance();
            let condition = self.parse_expression()?;
            if Self::is_condition(&condition) {
                return Ok(Expr::Conditional {
                    value: Box::new(expr),
                    condition: Box::new(condition),
                });
            }
            self.position = save;
        } else if self.current_is(TokenType::OpenBrace) {
            let brace_pos = self.here();
            self.advance();
            let condition = self.parse_expression()?;
            self.expect(TokenType::CloseBrace, "closing '}'")?;
            if !Self::is_condition(&condition) {
                return Err(Error::parse(
                    "expected a condition after expression",
                    brace_pos,
                ));
            }
            return Ok(Expr::Conditional {
                value: Box::new(expr),
                condition: Box::new(condition),
            });
        }

        Ok(expr)
    }

    fn peek_is_eof_after_comma(&self) -> bool {
        matches!(self.peek_type(1), Some(TokenType::Eof) | None)
    }

    fn is_condition(expr: &Expr) -> bool {
        matches!(
            expr,
            Expr::Comparison { .. } | Expr::ChainedComparison { .. } | Expr::LogicOp { .. }
        )
    }

    fn parse_let(&mut self) -> Result<Expr> {
        self.advance(); // Skip 'let'
        let name = self
            .expect(TokenType::Identifier, "a variable name after 'let'")?
            .value;
        // Commas around '=' are permitted
        while self.current_is(TokenType::Comma) {
            self.advance();
        }
        self.expect(TokenType::Equal, "'=' in let binding")?;
        while self.current_is(TokenType::Comma) {
            self.advance();
        }
        let value = self.parse_expression()?;
        Ok(Expr::Assignment {
            name,
            value: Box::new(value),
        })
    }

    /// Lookahead for `NAME(p1, ..., pn) = EXPR`; all parameters must be bare
    /// identifiers.
    fn try_parse_function_definition(&mut self) -> Result<Option<Expr>> {
        if !self.current_is(TokenType::Identifier)
            || !matches!(self.peek_type(1), Some(TokenType::OpenParen))
        {
            return Ok(None);
        }
        // Scan ahead: identifiers separated by commas, ')', then '='
        let mut offset = 2;
        loop {
            match self.peek_type(offset) {
                Some(TokenType::Identifier) => {
                    offset += 1;
                    match self.peek_type(offset) {
                        Some(TokenType::Comma) => offset += 1,
                        Some(TokenType::CloseParen) => {
                            offset += 1;
                            break;
                        }
                        _ => return Ok(None),
                    }
                }
                Some(TokenType::CloseParen) if offset == 2 => {
                    offset += 1;
                    break;
                }
                _ => return Ok(None),
            }
        }
        if !matches!(self.peek_type(offset), Some(TokenType::Equal)) {
            return Ok(None);
        }

        let name = self.advance().value;
        self.advance(); // (
        let mut params = Vec::new();
        while !self.current_is(TokenType::CloseParen) {
            params.push(self.expect(TokenType::Identifier, "a parameter name")?.value);
            if self.current_is(TokenType::Comma) {
                self.advance();
            }
        }
        self.advance(); // )
        self.advance(); // =
        let body = self.parse_expression()?;
        Ok(Some(Expr::FunctionDefinition {
            name,
            params,
            body: Box::new(body),
        }))
    }

    // ------------------------------------------------------------------
    // Precedence ladder
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.parse_iff()?;
        self.leave();
        Ok(expr)
    }

    fn parse_iff(&mut self) -> Result<Expr> {
        let mut left = self.parse_implies()?;
        while self.current_is(TokenType::Iff) {
            self.advance();
            let right = self.parse_implies()?;
            left = Expr::LogicOp {
                op: LogicOperator::Iff,
                operands: vec![left, right],
            };
        }
        Ok(left)
    }

    /// Implication is right-associative.
    fn parse_implies(&mut self) -> Result<Expr> {
        let left = self.parse_or()?;
        if self.current_is(TokenType::Implies) {
            self.advance();
            let right = self.parse_implies()?;
            return Ok(Expr::LogicOp {
                op: LogicOperator::Implies,
                operands: vec![left, right],
            });
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_xor()?;
        while self.current_is(TokenType::Or) {
            self.advance();
            let right = self.parse_xor()?;
            left = Expr::LogicOp {
                op: LogicOperator::Or,
                operands: vec![left, right],
            };
        }
        Ok(left)
    }

    /// `\oplus` binds tighter than `\lor`.
    fn parse_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.current_is(TokenType::Xor) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::LogicOp {
                op: LogicOperator::Xor,
                operands: vec![left, right],
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.current_is(TokenType::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::LogicOp {
                op: LogicOperator::And,
                operands: vec![left, right],
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.current_is(TokenType::Not) {
            self.enter()?;
            self.advance();
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::LogicOp {
                op: LogicOperator::Not,
                operands: vec![operand],
            });
        }
        self.parse_comparison()
    }

    /// A run of comparisons at the same level folds into one chain.
    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_additive()?;
        let mut operands = vec![first];
        let mut operators = Vec::new();
        loop {
            let op = match self.current_type() {
                TokenType::LessThan => ComparisonOperator::LessThan,
                TokenType::LessThanOrEqual => ComparisonOperator::LessThanOrEqual,
                TokenType::GreaterThan => ComparisonOperator::GreaterThan,
                TokenType::GreaterThanOrEqual => ComparisonOperator::GreaterThanOrEqual,
                TokenType::Equal => ComparisonOperator::Equal,
                TokenType::NotEqual => ComparisonOperator::NotEqual,
                TokenType::In => {
                    return Err(Error::parse(
                        "set membership (\\in) is not supported in expressions",
                        self.here(),
                    ))
                }
                _ => break,
            };
            self.advance();
            operators.push(op);
            operands.push(self.parse_additive()?);
        }
        match operators.len() {
            0 => Ok(operands.pop().expect("at least one operand")),
            1 => {
                let right = operands.pop().expect("two operands");
                let left = operands.pop().expect("two operands");
                Ok(Expr::Comparison {
                    op: operators[0],
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => Ok(Expr::ChainedComparison {
                operands,
                operators,
            }),
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_type() {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_type() {
                TokenType::Star | TokenType::Cdot => Some(BinaryOperator::Multiply),
                TokenType::Slash | TokenType::Div => Some(BinaryOperator::Divide),
                TokenType::Times => Some(BinaryOperator::Cross),
                _ => None,
            };
            if let Some(op) = op {
                self.advance();
                let right = self.parse_unary()?;
                left = Expr::binary(op, left, right);
                continue;
            }
            // Implicit multiplication: two adjacent primaries fold. Inside
            // an integral body the trailing differential ends the run.
            if self.options.implicit_multiplication
                && self.starts_primary()
                && !(self.differential_stop && self.at_differential())
            {
                let right = self.parse_unary()?;
                left = Expr::multiply(left, right);
                continue;
            }
            break;
        }
        Ok(left)
    }

    /// Whether the current token can begin a primary that implicit
    /// multiplication may absorb. Braces and bars are excluded: braces
    /// introduce top-level conditions, bars are closers as often as openers.
    fn starts_primary(&self) -> bool {
        matches!(
            self.current_type(),
            TokenType::Number
                | TokenType::Identifier
                | TokenType::Command
                | TokenType::OpenParen
                | TokenType::OpenBracket
                | TokenType::BeginEnv
        )
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.current_is(TokenType::Minus) {
            self.enter()?;
            self.advance();
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Expr::negate(operand));
        }
        self.parse_power()
    }

    /// Power is right-associative; `^T` is the transpose postfix.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if !self.current_is(TokenType::Caret) {
            return Ok(base);
        }
        // A one-sided limit marker (`0^+` / `0^-` before a closing brace)
        // belongs to the limit parser, not to us.
        if matches!(self.peek_type(1), Some(TokenType::Plus) | Some(TokenType::Minus))
            && matches!(self.peek_type(2), Some(TokenType::CloseBrace))
        {
            return Ok(base);
        }
        self.advance();

        // ^T and ^{T}
        if self.current_is(TokenType::Identifier) && self.current().value == "T" {
            self.advance();
            return Ok(Expr::call("transpose", base));
        }
        if self.current_is(TokenType::OpenBrace)
            && self.peek_value(1) == Some("T")
            && matches!(self.peek_type(2), Some(TokenType::CloseBrace))
        {
            self.advance();
            self.advance();
            self.advance();
            return Ok(Expr::call("transpose", base));
        }

        self.enter()?;
        let exponent = self.parse_unary()?;
        self.leave();
        Ok(Expr::power(base, exponent))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.current_is(TokenType::Bang) {
            self.advance();
            expr = Expr::call("factorial", expr);
        }
        Ok(expr)
    }

    // ------------------------------------------------------------------
    // Primaries
    // ------------------------------------------------------------------

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current_type().clone() {
            TokenType::Number => {
                let token = self.advance();
                let value: f64 = token.value.parse().map_err(|_| {
                    Error::parse(
                        format!("malformed number '{}'", token.value),
                        token.position,
                    )
                })?;
                Ok(Expr::Number(value))
            }
            TokenType::Identifier => self.parse_identifier(),
            TokenType::Command => self.parse_command(),
            TokenType::OpenParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseParen, "closing ')'")?;
                Ok(inner)
            }
            TokenType::OpenBracket => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseBracket, "closing ']'")?;
                Ok(inner)
            }
            TokenType::OpenBrace => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseBrace, "closing '}'")?;
                Ok(inner)
            }
            TokenType::Pipe => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::Pipe, "closing '|'")?;
                Ok(Expr::AbsoluteValue(Box::new(inner)))
            }
            TokenType::DoublePipe => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::DoublePipe, "closing '‖'")?;
                Ok(Expr::call("norm", inner))
            }
            TokenType::BeginEnv => self.parse_environment(),
            TokenType::Eof => Err(Error::parse("unexpected end of input", self.here())),
            _ => Err(Error::parse(
                format!("unexpected '{}'", self.current().value),
                self.here(),
            )),
        }
    }

    /// Identifier with optional subscript folding: `x_1`, `x_{10}`,
    /// `\alpha_k` are flat variable names. A parenthesized comma-separated
    /// argument list turns the identifier into a function call.
    fn parse_identifier(&mut self) -> Result<Expr> {
        let token = self.advance();
        let mut name = token.value;

        if self.current_is(TokenType::Underscore) {
            self.advance();
            let subscript = self.parse_subscript_text()?;
            name = format!("{}_{}", name, subscript);
        }

        // `f(a, b)`: only a comma-separated list commits to a call; a single
        // parenthesized expression stays implicit multiplication, and the
        // evaluator applies it when the identifier resolves to a function.
        if self.current_is(TokenType::OpenParen) && self.paren_group_has_top_level_comma() {
            self.advance();
            let mut args = Vec::new();
            loop {
                args.push(self.parse_expression()?);
                if self.current_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenType::CloseParen, "closing ')'")?;
            return Ok(Expr::FunctionCall {
                name,
                args,
                base: None,
                index: None,
            });
        }

        Ok(Expr::Variable(name))
    }

    fn paren_group_has_top_level_comma(&self) -> bool {
        let mut nesting = 0usize;
        let mut offset = 0usize;
        loop {
            match self.peek_type(offset) {
                Some(TokenType::OpenParen)
                | Some(TokenType::OpenBracket)
                | Some(TokenType::OpenBrace) => nesting += 1,
                Some(TokenType::CloseParen)
                | Some(TokenType::CloseBracket)
                | Some(TokenType::CloseBrace) => {
                    if nesting <= 1 {
                        return false;
                    }
                    nesting -= 1;
                }
                Some(TokenType::Comma) if nesting == 1 => return true,
                Some(TokenType::Eof) | None => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn parse_subscript_text(&mut self) -> Result<String> {
        if self.current_is(TokenType::OpenBrace) {
            self.advance();
            let mut text = String::new();
            while !self.current_is(TokenType::CloseBrace) {
                match self.current_type() {
                    TokenType::Number | TokenType::Identifier | TokenType::Text => {
                        text.push_str(&self.advance().value);
                    }
                    _ => {
                        return Err(Error::parse(
                            "subscripts may only contain letters and digits",
                            self.here(),
                        ))
                    }
                }
            }
            self.advance();
            Ok(text)
        } else if self.current_is_one_of(&[TokenType::Number, TokenType::Identifier]) {
            Ok(self.advance().value)
        } else {
            Err(Error::parse("expected a subscript", self.here()))
        }
    }

    // ------------------------------------------------------------------
    // Command forms
    // ------------------------------------------------------------------

    fn parse_command(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.value.as_str() {
            "frac" => self.parse_frac(),
            "sqrt" => self.parse_sqrt(),
            "binom" => self.parse_binom(),
            "sum" => self.parse_big_operator(true),
            "prod" => self.parse_big_operator(false),
            "int" | "oint" => self.parse_integral(token.value == "oint"),
            "iint" => self.parse_multi_integral(2),
            "iiint" => self.parse_multi_integral(3),
            "lim" => self.parse_limit(),
            "vec" => self.parse_vector(false),
            "hat" => self.parse_vector(true),
            "nabla" => {
                self.advance();
                let body = self.parse_unary()?;
                Ok(Expr::Gradient(Box::new(body)))
            }
            "partial" => Err(Error::parse(
                "\\partial is only valid inside a derivative \\frac{\\partial}{\\partial x}",
                token.position,
            )),
            "log" => self.parse_log(),
            name if functions::lookup(name).is_some() => self.parse_function_call(),
            name => {
                let suggestion = nearest_command(name);
                match suggestion {
                    Some(candidate) => Err(Error::parse_with_suggestion(
                        format!("unknown command \\{}", name),
                        token.position,
                        format!("\\{}", candidate),
                    )),
                    None => Err(Error::parse(
                        format!("unknown command \\{}", name),
                        token.position,
                    )),
                }
            }
        }
    }

    /// `\frac{A}{B}`, the braceless two-token form, and the derivative
    /// templates `\frac{d^k}{dx^k}` / `\frac{\partial^k}{\partial x^k}`.
    fn parse_frac(&mut self) -> Result<Expr> {
        let frac_pos = self.here();
        self.advance(); // Skip \frac

        if let Some(derivative) = self.try_parse_derivative()? {
            return Ok(derivative);
        }

        let numerator = self.parse_frac_operand(frac_pos)?;
        let denominator = self.parse_frac_operand(frac_pos)?;
        Ok(Expr::divide(numerator, denominator))
    }

    /// One fraction operand: a braced group, a single digit, or a single
    /// letter. A longer bare number is ambiguous and rejected.
    fn parse_frac_operand(&mut self, frac_pos: usize) -> Result<Expr> {
        match self.current_type() {
            TokenType::OpenBrace => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseBrace, "closing '}'")?;
                Ok(inner)
            }
            TokenType::Number => {
                let value = self.current().value.clone();
                if value.len() == 1 {
                    self.advance();
                    Ok(Expr::Number(value.parse().expect("single digit")))
                } else if value.len() == 2 && value.bytes().all(|b| b.is_ascii_digit()) {
                    // `\frac12`: split the two-digit literal in place
                    let first = Expr::Number(f64::from(value.as_bytes()[0] - b'0'));
                    let token = &mut self.tokens[self.position];
                    token.value = value[1..].to_string();
                    token.position += 1;
                    Ok(first)
                } else {
                    Err(Error::parse_with_suggestion(
                        "ambiguous braceless fraction",
                        frac_pos,
                        "use braces",
                    ))
                }
            }
            TokenType::Identifier => {
                let token = self.advance();
                Ok(Expr::Variable(token.value))
            }
            _ => Err(Error::parse_with_suggestion(
                "expected a fraction operand",
                self.here(),
                "use braces",
            )),
        }
    }

    /// Backtracking probe for the Leibniz derivative templates.
    fn try_parse_derivative(&mut self) -> Result<Option<Expr>> {
        let save = self.position;
        match self.parse_derivative_template() {
            Ok(expr) => Ok(Some(expr)),
            Err(_) => {
                self.position = save;
                Ok(None)
            }
        }
    }

    fn parse_derivative_template(&mut self) -> Result<Expr> {
        let start = self.here();
        self.expect(TokenType::OpenBrace, "'{'")?;
        let partial = match self.current_type() {
            TokenType::Identifier if self.current().value == "d" => false,
            TokenType::Command if self.current().value == "partial" => true,
            _ => return Err(Error::parse("not a derivative", start)),
        };
        self.advance();
        let order = if self.current_is(TokenType::Caret) {
            self.advance();
            self.parse_derivative_order()?
        } else {
            1
        };
        self.expect(TokenType::CloseBrace, "'}'")?;

        self.expect(TokenType::OpenBrace, "'{'")?;
        let marker_matches = match self.current_type() {
            TokenType::Identifier if self.current().value == "d" => !partial,
            TokenType::Command if self.current().value == "partial" => partial,
            _ => false,
        };
        if !marker_matches {
            return Err(Error::parse("mismatched derivative marker", self.here()));
        }
        self.advance();
        let variable = self
            .expect(TokenType::Identifier, "a differentiation variable")?
            .value;
        if self.current_is(TokenType::Caret) {
            self.advance();
            let denominator_order = self.parse_derivative_order()?;
            if denominator_order != order {
                return Err(Error::parse(
                    format!(
                        "derivative orders disagree: d^{} over dx^{}",
                        order, denominator_order
                    ),
                    self.here(),
                ));
            }
        } else if order != 1 {
            return Err(Error::parse(
                format!("derivative orders disagree: d^{} over dx", order),
                self.here(),
            ));
        }
        self.expect(TokenType::CloseBrace, "'}'")?;

        // Body: braced group or parenthesized group
        let body = match self.current_type() {
            TokenType::OpenBrace => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseBrace, "closing '}'")?;
                inner
            }
            TokenType::OpenParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::CloseParen, "closing ')'")?;
                inner
            }
            _ => self.parse_multiplicative()?,
        };

        Ok(if partial {
            Expr::PartialDerivative {
                variable,
                order,
                body: Box::new(body),
            }
        } else {
            Expr::Derivative {
                variable,
                order,
                body: Box::new(body),
            }
        })
    }

    fn parse_derivative_order(&mut self) -> Result<u32> {
        let braced = self.current_is(TokenType::OpenBrace);
        if braced {
            self.advance();
        }
        let token = self.expect(TokenType::Number, "a derivative order")?;
        let order: u32 = token
            .value
            .parse()
            .map_err(|_| Error::parse("derivative order must be a positive integer", token.position))?;
        if braced {
            self.expect(TokenType::CloseBrace, "closing '}'")?;
        }
        if order == 0 {
            return Err(Error::parse(
                "derivative order must be at least 1",
                token.position,
            ));
        }
        Ok(order)
    }

    fn parse_sqrt(&mut self) -> Result<Expr> {
        self.advance(); // Skip \sqrt
        let index = if self.current_is(TokenType::OpenBracket) {
            self.advance();
            let index = self.parse_expression()?;
            self.expect(TokenType::CloseBracket, "closing ']'")?;
            Some(Box::new(index))
        } else {
            None
        };
        let arg = self.parse_function_argument()?;
        Ok(Expr::FunctionCall {
            name: "sqrt".into(),
            args: vec![arg],
            base: None,
            index,
        })
    }

    fn parse_binom(&mut self) -> Result<Expr> {
        self.advance(); // Skip \binom
        self.expect(TokenType::OpenBrace, "'{' after \\binom")?;
        let n = self.parse_expression()?;
        self.expect(TokenType::CloseBrace, "closing '}'")?;
        self.expect(TokenType::OpenBrace, "'{' for the second \\binom argument")?;
        let k = self.parse_expression()?;
        self.expect(TokenType::CloseBrace, "closing '}'")?;
        Ok(Expr::Binom {
            n: Box::new(n),
            k: Box::new(k),
        })
    }

    fn parse_log(&mut self) -> Result<Expr> {
        self.advance(); // Skip \log
        let base = if self.current_is(TokenType::Underscore) {
            self.advance();
            Some(Box::new(self.parse_bound()?))
        } else {
            None
        };
        let arg = self.parse_function_argument()?;
        Ok(Expr::FunctionCall {
            name: "log".into(),
            args: vec![arg],
            base,
            index: None,
        })
    }

    /// A catalogue function: parenthesized argument list, braced argument,
    /// or a bare operand.
    fn parse_function_call(&mut self) -> Result<Expr> {
        let token = self.advance();
        let metadata = functions::lookup(&token.value).expect("caller checked the catalogue");
        let name = metadata.name.to_string();

        let args = if self.current_is(TokenType::OpenParen) {
            self.advance();
            let mut args = Vec::new();
            loop {
                args.push(self.parse_expression()?);
                if self.current_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenType::CloseParen, "closing ')'")?;
            args
        } else {
            vec![self.parse_function_argument()?]
        };

        if args.len() < metadata.min_args || args.len() > metadata.max_args {
            return Err(Error::parse(
                format!(
                    "{} expects {} argument{}, got {}",
                    name,
                    if metadata.min_args == metadata.max_args {
                        metadata.min_args.to_string()
                    } else {
                        format!("{}..{}", metadata.min_args, metadata.max_args)
                    },
                    if metadata.max_args == 1 { "" } else { "s" },
                    args.len()
                ),
                token.position,
            ));
        }

        Ok(Expr::FunctionCall {
            name,
            args,
            base: None,
            index: None,
        })
    }

    /// Argument of a bare function application: the next primary (with unary
    /// sign and power).
    fn parse_function_argument(&mut self) -> Result<Expr> {
        self.parse_unary()
    }

    fn parse_big_operator(&mut self, is_sum: bool) -> Result<Expr> {
        let token = self.advance(); // Skip \sum or \prod
        self.expect(TokenType::Underscore, "'_' with bounds")
            .map_err(|_| {
                Error::parse(
                    format!(
                        "\\{} requires bounds: \\{}_{{i=1}}^{{n}}",
                        token.value, token.value
                    ),
                    token.position,
                )
            })?;
        self.expect(TokenType::OpenBrace, "'{'")?;
        let index = self
            .expect(TokenType::Identifier, "an index variable")?
            .value;
        self.expect(TokenType::Equal, "'=' in bounds")?;
        let lower = self.parse_expression()?;
        self.expect(TokenType::CloseBrace, "closing '}'")?;
        self.expect(TokenType::Caret, "'^' with an upper bound")?;
        let upper = self.parse_bound()?;
        let body = self.parse_multiplicative()?;
        Ok(if is_sum {
            Expr::Sum {
                index,
                lower: Box::new(lower),
                upper: Box::new(upper),
                body: Box::new(body),
            }
        } else {
            Expr::Product {
                index,
                lower: Box::new(lower),
                upper: Box::new(upper),
                body: Box::new(body),
            }
        })
    }

    /// A bound after `_` or `^`: a braced expression or a single operand.
    fn parse_bound(&mut self) -> Result<Expr> {
        if self.current_is(TokenType::OpenBrace) {
            self.advance();
            let inner = self.parse_expression()?;
            self.expect(TokenType::CloseBrace, "closing '}'")?;
            Ok(inner)
        } else {
            self.parse_unary()
        }
    }

    fn parse_integral(&mut self, closed: bool) -> Result<Expr> {
        self.advance(); // Skip \int or \oint
        let mut lower = None;
        let mut upper = None;
        if self.current_is(TokenType::Underscore) {
            self.advance();
            lower = Some(Box::new(self.parse_bound()?));
        }
        if self.current_is(TokenType::Caret) {
            self.advance();
            upper = Some(Box::new(self.parse_bound()?));
        }

        let body = if self.at_differential() {
            Expr::Number(1.0)
        } else {
            let saved = self.differential_stop;
            self.differential_stop = true;
            let body = self.parse_additive();
            self.differential_stop = saved;
            body?
        };
        let variable = self.consume_differential()?;

        Ok(Expr::Integral {
            variable,
            lower,
            upper,
            body: Box::new(body),
            closed,
        })
    }

    fn parse_multi_integral(&mut self, order: u8) -> Result<Expr> {
        self.advance(); // Skip \iint or \iiint
        let mut lower = None;
        let mut upper = None;
        if self.current_is(TokenType::Underscore) {
            self.advance();
            lower = Some(Box::new(self.parse_bound()?));
        }
        if self.current_is(TokenType::Caret) {
            self.advance();
            upper = Some(Box::new(self.parse_bound()?));
        }

        let body = if self.at_differential() {
            Expr::Number(1.0)
        } else {
            let saved = self.differential_stop;
            self.differential_stop = true;
            let body = self.parse_additive();
            self.differential_stop = saved;
            body?
        };
        let mut variables = Vec::new();
        for _ in 0..order {
            variables.push(self.consume_differential()?);
        }

        Ok(Expr::MultiIntegral {
            order,
            variables,
            lower,
            upper,
            body: Box::new(body),
        })
    }

    /// Whether the tape is at a `dx`-style differential. Both the
    /// single-letter form (`d` then `x`) and the fused form (`dx` when
    /// multi-letter identifiers are enabled) count.
    fn at_differential(&self) -> bool {
        if !self.current_is(TokenType::Identifier) {
            return false;
        }
        let value = self.current().value.as_str();
        if (value == "d" || value == "mathrm:d")
            && matches!(self.peek_type(1), Some(TokenType::Identifier))
        {
            return true;
        }
        value.len() >= 2 && value.starts_with('d') && value != "det"
    }

    fn consume_differential(&mut self) -> Result<String> {
        if !self.at_differential() {
            return Err(Error::parse(
                "expected a differential such as 'dx' to close the integral",
                self.here(),
            ));
        }
        let token = self.advance();
        let value = token.value;
        if value == "d" || value == "mathrm:d" {
            Ok(self.advance().value)
        } else {
            Ok(value[1..].to_string())
        }
    }

    fn parse_limit(&mut self) -> Result<Expr> {
        self.advance(); // Skip \lim
        self.expect(TokenType::Underscore, "'_' after \\lim")?;
        self.expect(TokenType::OpenBrace, "'{'")?;
        let variable = self
            .expect(TokenType::Identifier, "a limit variable")?
            .value;
        let arrow = self.expect(TokenType::Text, "'\\to'")?;
        if arrow.value != "to" {
            return Err(Error::parse("expected '\\to' in limit", arrow.position));
        }
        let target = self.parse_expression()?;
        let side = if self.current_is(TokenType::Caret) {
            self.advance();
            match self.current_type() {
                TokenType::Plus => {
                    self.advance();
                    LimitSide::Right
                }
                TokenType::Minus => {
                    self.advance();
                    LimitSide::Left
                }
                _ => {
                    return Err(Error::parse(
                        "expected '+' or '-' for a one-sided limit",
                        self.here(),
                    ))
                }
            }
        } else {
            LimitSide::Both
        };
        self.expect(TokenType::CloseBrace, "closing '}'")?;
        let body = self.parse_multiplicative()?;
        Ok(Expr::Limit {
            variable,
            target: Box::new(target),
            body: Box::new(body),
            side,
        })
    }

    fn parse_vector(&mut self, unit: bool) -> Result<Expr> {
        self.advance(); // Skip \vec or \hat
        self.expect(TokenType::OpenBrace, "'{'")?;
        let mut components = Vec::new();
        loop {
            components.push(self.parse_expression()?);
            if self.current_is(TokenType::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenType::CloseBrace, "closing '}'")?;
        Ok(Expr::Vector { components, unit })
    }

    // ------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------

    fn parse_environment(&mut self) -> Result<Expr> {
        let begin = self.advance();
        let name = begin.value.clone();
        let bracket = match name.as_str() {
            "matrix" => Some(MatrixBracket::Plain),
            "pmatrix" => Some(MatrixBracket::Paren),
            "bmatrix" => Some(MatrixBracket::Square),
            "Bmatrix" => Some(MatrixBracket::Brace),
            "vmatrix" => Some(MatrixBracket::Pipe),
            "Vmatrix" => Some(MatrixBracket::DoublePipe),
            "align" => Some(MatrixBracket::Align),
            "cases" => None,
            _ => {
                return Err(Error::parse(
                    format!("unknown environment '{}'", name),
                    begin.position,
                ))
            }
        };

        let rows = self.parse_environment_rows(&name, begin.position)?;
        match bracket {
            Some(bracket) => self.build_matrix(rows, bracket, begin.position),
            None => self.build_piecewise(rows, begin.position),
        }
    }

    fn parse_environment_rows(
        &mut self,
        name: &str,
        start: usize,
    ) -> Result<Vec<Vec<EnvironmentCell>>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.current_type() {
                TokenType::EndEnv => {
                    let end = self.advance();
                    if end.value != name {
                        return Err(Error::parse(
                            format!(
                                "environment mismatch: \\begin{{{}}} closed by \\end{{{}}}",
                                name, end.value
                            ),
                            end.position,
                        ));
                    }
                    if !row.is_empty() {
                        rows.push(row);
                    }
                    if rows.is_empty() {
                        return Err(Error::parse(
                            format!("environment '{}' is empty", name),
                            start,
                        ));
                    }
                    return Ok(rows);
                }
                TokenType::Eof => {
                    return Err(Error::parse_with_suggestion(
                        format!("\\begin{{{}}} without matching \\end", name),
                        start,
                        format!("\\end{{{}}}", name),
                    ))
                }
                TokenType::RowBreak => {
                    self.advance();
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                TokenType::Ampersand => {
                    self.advance();
                }
                TokenType::Text if self.current().value == "otherwise" => {
                    let token = self.advance();
                    row.push(EnvironmentCell::Otherwise(token.position));
                }
                _ => {
                    let expr = self.parse_expression()?;
                    row.push(EnvironmentCell::Expr(expr));
                }
            }
        }
    }

    fn build_matrix(
        &self,
        rows: Vec<Vec<EnvironmentCell>>,
        bracket: MatrixBracket,
        start: usize,
    ) -> Result<Expr> {
        let width = rows[0].len();
        let mut cells = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != width {
                return Err(Error::parse(
                    format!(
                        "matrix rows must have equal width: expected {}, got {}",
                        width,
                        row.len()
                    ),
                    start,
                ));
            }
            let mut out = Vec::with_capacity(width);
            for cell in row {
                match cell {
                    EnvironmentCell::Expr(expr) => out.push(expr),
                    EnvironmentCell::Otherwise(pos) => {
                        return Err(Error::parse(
                            "'otherwise' is only valid in a cases environment",
                            pos,
                        ))
                    }
                }
            }
            cells.push(out);
        }
        Ok(Expr::Matrix {
            rows: cells,
            bracket,
        })
    }

    fn build_piecewise(&self, rows: Vec<Vec<EnvironmentCell>>, start: usize) -> Result<Expr> {
        let row_count = rows.len();
        let mut cases = Vec::with_capacity(row_count);
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != 2 {
                return Err(Error::parse(
                    "each cases row needs a value and a condition separated by '&'",
                    start,
                ));
            }
            let mut iter = row.into_iter();
            let value = match iter.next().expect("two cells") {
                EnvironmentCell::Expr(expr) => expr,
                EnvironmentCell::Otherwise(pos) => {
                    return Err(Error::parse("'otherwise' cannot be a case value", pos))
                }
            };
            let condition = match iter.next().expect("two cells") {
                EnvironmentCell::Expr(expr) => Some(expr),
                EnvironmentCell::Otherwise(pos) => {
                    if row_index + 1 != row_count {
                        return Err(Error::parse(
                            "'otherwise' must be the last case",
                            pos,
                        ));
                    }
                    None
                }
            };
            cases.push(PiecewiseCase { value, condition });
        }
        Ok(Expr::Piecewise { cases })
    }
}

enum EnvironmentCell {
    Expr(Expr),
    Otherwise(usize),
}

/// Nearest known command within an edit distance of 2. Ties break toward
/// the shorter, then lexicographically smaller candidate, so suggestions
/// are deterministic.
fn nearest_command(name: &str) -> Option<&'static str> {
    let mut best: Option<(usize, usize, &'static str)> = None;
    for candidate in functions::known_command_names() {
        if let Some(distance) = edit_distance(name, candidate, 2) {
            let key = (distance, candidate.len(), candidate);
            if best.map(|b| key < b).unwrap_or(true) {
                best = Some(key);
            }
        }
    }
    best.map(|(_, _, candidate)| candidate)
}

/// Bounded Levenshtein distance; `None` when it exceeds `cap`.
fn edit_distance(a: &str, b: &str, cap: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > cap {
        return None;
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    let distance = previous[b.len()];
    (distance <= cap).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        parse_source(input).unwrap()
    }

    #[test]
    fn precedence_of_arithmetic() {
        assert_eq!(
            parse("2 + 3 * 4"),
            Expr::add(
                Expr::Number(2.0),
                Expr::multiply(Expr::Number(3.0), Expr::Number(4.0))
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            parse("2^3^2"),
            Expr::power(
                Expr::Number(2.0),
                Expr::power(Expr::Number(3.0), Expr::Number(2.0))
            )
        );
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        assert_eq!(
            parse("-x^2"),
            Expr::negate(Expr::power(Expr::variable("x"), Expr::Number(2.0)))
        );
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(
            parse("2x"),
            Expr::multiply(Expr::Number(2.0), Expr::variable("x"))
        );
        assert_eq!(
            parse("x(y + 1)"),
            Expr::multiply(
                Expr::variable("x"),
                Expr::add(Expr::variable("y"), Expr::Number(1.0))
            )
        );
    }

    #[test]
    fn frac_forms() {
        let expected = Expr::divide(Expr::Number(1.0), Expr::Number(2.0));
        assert_eq!(parse("\\frac{1}{2}"), expected);
        assert_eq!(parse("\\frac12"), expected);
        assert_eq!(parse("\\frac 1 2"), expected);
    }

    #[test]
    fn frac_three_digits_is_ambiguous() {
        let err = parse_source("\\frac123").unwrap_err();
        assert_eq!(err.suggestion(), Some("use braces"));
    }

    #[test]
    fn sqrt_with_index() {
        match parse("\\sqrt[3]{x}") {
            Expr::FunctionCall { name, index, .. } => {
                assert_eq!(name, "sqrt");
                assert_eq!(index, Some(Box::new(Expr::Number(3.0))));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn log_with_base() {
        match parse("\\log_{2} 8") {
            Expr::FunctionCall { name, base, .. } => {
                assert_eq!(name, "log");
                assert_eq!(base, Some(Box::new(Expr::Number(2.0))));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn chained_comparison() {
        match parse("1 < x < 3") {
            Expr::ChainedComparison {
                operands,
                operators,
            } => {
                assert_eq!(operands.len(), 3);
                assert_eq!(
                    operators,
                    vec![
                        ComparisonOperator::LessThan,
                        ComparisonOperator::LessThan
                    ]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn sum_with_bounds() {
        match parse("\\sum_{i=1}^{5} i") {
            Expr::Sum {
                index,
                lower,
                upper,
                body,
            } => {
                assert_eq!(index, "i");
                assert_eq!(*lower, Expr::Number(1.0));
                assert_eq!(*upper, Expr::Number(5.0));
                assert_eq!(*body, Expr::variable("i"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn definite_integral() {
        match parse("\\int_0^1 x^2 dx") {
            Expr::Integral {
                variable,
                lower,
                upper,
                closed,
                ..
            } => {
                assert_eq!(variable, "x");
                assert_eq!(lower, Some(Box::new(Expr::Number(0.0))));
                assert_eq!(upper, Some(Box::new(Expr::Number(1.0))));
                assert!(!closed);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn indefinite_integral_of_one() {
        match parse("\\int dx") {
            Expr::Integral {
                lower, upper, body, ..
            } => {
                assert!(lower.is_none() && upper.is_none());
                assert_eq!(*body, Expr::Number(1.0));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn one_sided_limit() {
        match parse("\\lim_{x \\to 0^+} \\frac{1}{x}") {
            Expr::Limit { side, .. } => assert_eq!(side, LimitSide::Right),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn derivative_template() {
        match parse("\\frac{d^2}{dx^2}{x^3}") {
            Expr::Derivative {
                variable, order, ..
            } => {
                assert_eq!(variable, "x");
                assert_eq!(order, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn partial_derivative_template() {
        match parse("\\frac{\\partial}{\\partial x}(x y)") {
            Expr::PartialDerivative {
                variable, order, ..
            } => {
                assert_eq!(variable, "x");
                assert_eq!(order, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn plain_frac_with_d_numerator_is_division() {
        // `\frac{d}{2}` is d/2, not a derivative
        assert_eq!(
            parse("\\frac{d}{2}"),
            Expr::divide(Expr::variable("d"), Expr::Number(2.0))
        );
    }

    #[test]
    fn matrix_environment() {
        match parse("\\begin{pmatrix} 1 & 2 \\\\ 3 & 4 \\end{pmatrix}") {
            Expr::Matrix { rows, bracket } => {
                assert_eq!(bracket, MatrixBracket::Paren);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn ragged_matrix_fails() {
        assert!(parse_source("\\begin{matrix} 1 & 2 \\\\ 3 \\end{matrix}").is_err());
    }

    #[test]
    fn mismatched_environment_fails() {
        assert!(parse_source("\\begin{matrix} 1 \\end{pmatrix}").is_err());
    }

    #[test]
    fn cases_environment() {
        let src = "\\begin{cases} x & x > 0 \\\\ -x & \\text{otherwise} \\end{cases}";
        match parse(src) {
            Expr::Piecewise { cases } => {
                assert_eq!(cases.len(), 2);
                assert!(cases[0].condition.is_some());
                assert!(cases[1].condition.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn nested_absolute_value() {
        match parse("||x||") {
            Expr::AbsoluteValue(inner) => {
                assert!(matches!(*inner, Expr::AbsoluteValue(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn let_assignment() {
        match parse("let x = 5") {
            Expr::Assignment { name, value } => {
                assert_eq!(name, "x");
                assert_eq!(*value, Expr::Number(5.0));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn function_definition() {
        match parse("f(x, y) = x + y") {
            Expr::FunctionDefinition { name, params, .. } => {
                assert_eq!(name, "f");
                assert_eq!(params, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn conditional_with_comma() {
        match parse("x^2, x > 0") {
            Expr::Conditional { condition, .. } => {
                assert!(matches!(*condition, Expr::Comparison { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unknown_command_suggests_nearest() {
        let err = parse_source("\\sni x").unwrap_err();
        assert_eq!(err.suggestion(), Some("\\sin"));
    }

    #[test]
    fn depth_ceiling_fails_cleanly() {
        let depth = 600;
        let source = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse_source(&source).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.message().contains("depth"));
    }

    #[test]
    fn subscripted_variable_is_flat() {
        assert_eq!(parse("x_1"), Expr::variable("x_1"));
        assert_eq!(parse("x_{10}"), Expr::variable("x_10"));
    }

    #[test]
    fn transpose_postfix() {
        match parse("A^T") {
            Expr::FunctionCall { name, .. } => assert_eq!(name, "transpose"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn factorial_postfix() {
        match parse("5!") {
            Expr::FunctionCall { name, args, .. } => {
                assert_eq!(name, "factorial");
                assert_eq!(args[0], Expr::Number(5.0));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn recovery_collects_multiple_errors() {
        let tokens = Lexer::tokenize("\\frob x, \\nicate y").unwrap();
        let mut parser = Parser::new(tokens, ParserOptions::default());
        let (expr, errors) = parser.parse_with_recovery();
        assert!(expr.is_none());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn logic_precedence() {
        // xor binds tighter than or
        match parse("a \\lor b \\oplus c") {
            Expr::LogicOp { op, operands } => {
                assert_eq!(op, LogicOperator::Or);
                assert!(matches!(
                    &operands[1],
                    Expr::LogicOp {
                        op: LogicOperator::Xor,
                        ..
                    }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn multi_argument_function() {
        match parse("\\max(1, 2, 3)") {
            Expr::FunctionCall { name, args, .. } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn user_call_with_commas_parses_as_call() {
        match parse("f(1, 2)") {
            Expr::FunctionCall { name, args, .. } => {
                assert_eq!(name, "f");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn double_integral() {
        match parse("\\iint_0^1 x y dx dy") {
            Expr::MultiIntegral {
                order, variables, ..
            } => {
                assert_eq!(order, 2);
                assert_eq!(variables, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn vector_and_unit_vector() {
        match parse("\\vec{1, 2, 3}") {
            Expr::Vector { components, unit } => {
                assert_eq!(components.len(), 3);
                assert!(!unit);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match parse("\\hat{1, 0}") {
            Expr::Vector { unit, .. } => assert!(unit),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
