//! LaTeX math lexer - tokenizes input strings
//!
//! Converts LaTeX math source into a stream of tokens with byte positions.
//! Tokenization is context-free: brace matching and `|` disambiguation are
//! the parser's job. Spacing commands and delimiter-size directives are
//! dropped here.

use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::functions;
use crate::token::{Token, TokenType};

/// Default maximum accepted input length in bytes (1 MiB).
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 1024 * 1024;

/// Spacing commands that are dropped entirely.
const SPACING_COMMANDS: &[&str] = &["quad", "qquad"];

/// Delimiter-size directives: dropped, the following raw delimiter is kept.
const SIZE_DIRECTIVES: &[&str] = &["left", "right", "big", "Big", "bigg", "Bigg"];

/// Font qualifiers producing flat `prefix:name` identifiers.
const FONT_COMMANDS: &[&str] = &[
    "mathbf",
    "mathrm",
    "mathit",
    "mathcal",
    "mathbb",
    "boldsymbol",
];

/// Multi-letter words recognized as textual markers rather than identifier
/// runs.
const TEXT_KEYWORDS: &[&str] = &["let", "otherwise", "to"];

/// Greek letters and letter-like commands that map to flat identifiers.
const LETTER_COMMANDS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "varpi", "rho", "varrho",
    "sigma", "varsigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega", "Gamma",
    "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi", "Omega", "ell",
    "hbar", "imath", "jmath",
];

/// Whether `name` is a Greek letter or letter-like command that tokenizes to
/// a flat identifier of the same name.
pub fn is_letter_command(name: &str) -> bool {
    LETTER_COMMANDS.contains(&name)
}

/// Configuration for the lexer.
#[derive(Debug, Clone)]
pub struct LexerOptions {
    /// Maximum accepted input length in bytes.
    pub max_input_length: usize,
    /// When `true` (implicit multiplication mode), a run of bare letters
    /// tokenizes as individual single-letter identifiers. When `false`,
    /// the whole run becomes one identifier, letting multi-letter variable
    /// names exist.
    pub single_letter_identifiers: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            single_letter_identifiers: true,
        }
    }
}

/// The LaTeX math lexer
pub struct Lexer<'a> {
    chars: Vec<char>,
    /// Char index into `chars`
    position: usize,
    /// Byte offset into the original source
    byte_position: usize,
    options: LexerOptions,
    extensions: Option<&'a ExtensionRegistry>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str) -> Self {
        Self::with_options(input, LexerOptions::default(), None)
    }

    pub fn with_options(
        input: &str,
        options: LexerOptions,
        extensions: Option<&'a ExtensionRegistry>,
    ) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
            byte_position: 0,
            options,
            extensions,
        }
    }

    /// Tokenize the whole input into a tape ending with an EOF token.
    pub fn tokenize(input: &str) -> Result<Vec<Token>> {
        Self::new(input).run(input.len())
    }

    /// Tokenize with explicit options and an optional extension registry.
    pub fn tokenize_with(
        input: &str,
        options: LexerOptions,
        extensions: Option<&ExtensionRegistry>,
    ) -> Result<Vec<Token>> {
        Lexer::with_options(input, options, extensions).run(input.len())
    }

    fn run(mut self, input_len: usize) -> Result<Vec<Token>> {
        if input_len > self.options.max_input_length {
            return Err(Error::tokenization(
                format!(
                    "input length {} exceeds maximum {}",
                    input_len, self.options.max_input_length
                ),
                0,
            ));
        }
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Some(token) => {
                    let is_eof = token.token_type == TokenType::Eof;
                    tokens.push(token);
                    if is_eof {
                        break;
                    }
                }
                // Dropped lexeme (spacing, size directive)
                None => continue,
            }
        }
        Ok(tokens)
    }

    fn current_char(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.byte_position += c.len_utf8();
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read a contiguous run of ASCII letters without consuming it.
    fn peek_letter_run(&self) -> String {
        let mut run = String::new();
        let mut pos = self.position;
        while let Some(&c) = self.chars.get(pos) {
            if c.is_ascii_alphabetic() {
                run.push(c);
                pos += 1;
            } else {
                break;
            }
        }
        run
    }

    fn read_letter_run(&mut self) -> String {
        let run = self.peek_letter_run();
        for _ in 0..run.len() {
            self.advance();
        }
        run
    }

    /// Read a numeric literal: digits, optional fraction, optional exponent.
    /// The exponent marker is only consumed when a digit (after an optional
    /// sign) follows, so `2e` stays `2` followed by the identifier `e`.
    fn read_number(&mut self, start: usize) -> Result<Token> {
        let begin = self.position;
        while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') {
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(Error::tokenization("malformed numeric literal", start));
            }
            self.advance();
            while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let mut ahead = self.position + 1;
            if matches!(self.chars.get(ahead), Some('+') | Some('-')) {
                ahead += 1;
            }
            if matches!(self.chars.get(ahead), Some(c) if c.is_ascii_digit()) {
                // Consume marker, optional sign, digits
                while self.position < ahead {
                    self.advance();
                }
                while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let value: String = self.chars[begin..self.position].iter().collect();
        Ok(Token::new(TokenType::Number, value, start))
    }

    /// Read the `{NAME}` group of `\begin`/`\end`/`\text`/font commands.
    fn read_braced_word(&mut self, start: usize, what: &str) -> Result<String> {
        self.skip_whitespace();
        if self.current_char() != Some('{') {
            return Err(Error::tokenization(
                format!("expected '{{' after \\{}", what),
                start,
            ));
        }
        self.advance();
        let mut word = String::new();
        loop {
            match self.current_char() {
                Some('}') => {
                    self.advance();
                    return Ok(word);
                }
                Some(c) => {
                    word.push(c);
                    self.advance();
                }
                None => {
                    return Err(Error::tokenization(
                        format!("unterminated {} name", what),
                        start,
                    ))
                }
            }
        }
    }

    /// Handle a backslash command. Returns `None` for dropped lexemes.
    fn read_command(&mut self, start: usize) -> Result<Option<Token>> {
        self.advance(); // Skip backslash
        let c = match self.current_char() {
            Some(c) => c,
            None => return Err(Error::tokenization("lone backslash at end of input", start)),
        };

        // Single-character commands
        if !c.is_ascii_alphabetic() {
            return match c {
                // Thin/medium/thick/negative spaces and escaped space
                ',' | ';' | ':' | '!' | ' ' => {
                    self.advance();
                    Ok(None)
                }
                '\\' => {
                    self.advance();
                    Ok(Some(Token::new(TokenType::RowBreak, "\\\\", start)))
                }
                '|' => {
                    self.advance();
                    Ok(Some(Token::new(TokenType::DoublePipe, "\\|", start)))
                }
                _ => Err(Error::tokenization(
                    format!("lone backslash before '{}'", c),
                    start,
                )),
            };
        }

        let name = self.read_letter_run();

        if SPACING_COMMANDS.contains(&name.as_str()) {
            return Ok(None);
        }
        if SIZE_DIRECTIVES.contains(&name.as_str()) {
            // `\left.` and `\right.` use '.' as a null delimiter; drop it too.
            if self.current_char() == Some('.') {
                self.advance();
            }
            return Ok(None);
        }

        let token = match name.as_str() {
            "begin" => {
                let env = self.read_braced_word(start, "environment")?;
                Token::new(TokenType::BeginEnv, env, start)
            }
            "end" => {
                let env = self.read_braced_word(start, "environment")?;
                Token::new(TokenType::EndEnv, env, start)
            }
            "text" => {
                let content = self.read_braced_word(start, "text")?;
                Token::new(TokenType::Text, content.trim().to_string(), start)
            }
            "times" => Token::new(TokenType::Times, name, start),
            "cdot" => Token::new(TokenType::Cdot, name, start),
            "div" => Token::new(TokenType::Div, name, start),
            "leq" | "le" => Token::new(TokenType::LessThanOrEqual, name, start),
            "geq" | "ge" => Token::new(TokenType::GreaterThanOrEqual, name, start),
            "neq" | "ne" => Token::new(TokenType::NotEqual, name, start),
            "in" => Token::new(TokenType::In, name, start),
            "land" | "wedge" => Token::new(TokenType::And, name, start),
            "lor" | "vee" => Token::new(TokenType::Or, name, start),
            "oplus" => Token::new(TokenType::Xor, name, start),
            "Rightarrow" | "implies" => Token::new(TokenType::Implies, name, start),
            "Leftrightarrow" | "iff" => Token::new(TokenType::Iff, name, start),
            "lnot" | "neg" => Token::new(TokenType::Not, name, start),
            "to" | "rightarrow" => Token::new(TokenType::Text, "to", start),
            "infty" => Token::new(TokenType::Identifier, "infinity", start),
            _ if LETTER_COMMANDS.contains(&name.as_str()) => {
                Token::new(TokenType::Identifier, name, start)
            }
            _ if FONT_COMMANDS.contains(&name.as_str()) => {
                let inner = self.read_braced_word(start, "font")?;
                Token::new(TokenType::Identifier, format!("{}:{}", name, inner), start)
            }
            _ => {
                // Structural commands and the function catalogue pass through
                // as Command tokens; unknown names first get a chance at the
                // extension registry, then pass through verbatim for the
                // parser to reject with a suggestion.
                if !functions::is_known_command(&name) {
                    if let Some(token) = self
                        .extensions
                        .and_then(|ext| ext.tokenize_command(&name, start))
                    {
                        return Ok(Some(token));
                    }
                }
                Token::new(TokenType::Command, name, start)
            }
        };
        Ok(Some(token))
    }

    /// Get the next token. `Ok(None)` means a dropped lexeme.
    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let start = self.byte_position;
        let c = match self.current_char() {
            Some(c) => c,
            None => return Ok(Some(Token::eof(start))),
        };

        // Single character tokens
        let simple = |this: &mut Self, token_type: TokenType, value: &str| {
            this.advance();
            Ok(Some(Token::new(token_type, value, start)))
        };

        match c {
            '\\' => self.read_command(start),
            '+' => simple(self, TokenType::Plus, "+"),
            '-' | '\u{2212}' => simple(self, TokenType::Minus, "-"),
            '*' => simple(self, TokenType::Star, "*"),
            '\u{00d7}' => simple(self, TokenType::Times, "×"),
            '\u{22c5}' | '\u{00b7}' => simple(self, TokenType::Cdot, "·"),
            '/' => simple(self, TokenType::Slash, "/"),
            '\u{00f7}' => simple(self, TokenType::Div, "÷"),
            '^' => simple(self, TokenType::Caret, "^"),
            '!' => simple(self, TokenType::Bang, "!"),
            '=' => simple(self, TokenType::Equal, "="),
            '<' => simple(self, TokenType::LessThan, "<"),
            '>' => simple(self, TokenType::GreaterThan, ">"),
            '\u{2264}' => simple(self, TokenType::LessThanOrEqual, "≤"),
            '\u{2265}' => simple(self, TokenType::GreaterThanOrEqual, "≥"),
            '\u{2260}' => simple(self, TokenType::NotEqual, "≠"),
            '\u{2208}' => simple(self, TokenType::In, "∈"),
            '\u{2227}' => simple(self, TokenType::And, "∧"),
            '\u{2228}' => simple(self, TokenType::Or, "∨"),
            '\u{2295}' => simple(self, TokenType::Xor, "⊕"),
            '\u{21d2}' => simple(self, TokenType::Implies, "⇒"),
            '\u{21d4}' => simple(self, TokenType::Iff, "⇔"),
            '\u{00ac}' => simple(self, TokenType::Not, "¬"),
            '\u{2192}' => simple(self, TokenType::Text, "to"),
            '\u{221e}' => simple(self, TokenType::Identifier, "infinity"),
            '\u{03c0}' => simple(self, TokenType::Identifier, "pi"),
            '(' => simple(self, TokenType::OpenParen, "("),
            ')' => simple(self, TokenType::CloseParen, ")"),
            '[' => simple(self, TokenType::OpenBracket, "["),
            ']' => simple(self, TokenType::CloseBracket, "]"),
            '{' => simple(self, TokenType::OpenBrace, "{"),
            '}' => simple(self, TokenType::CloseBrace, "}"),
            '|' => simple(self, TokenType::Pipe, "|"),
            '\u{2016}' => simple(self, TokenType::DoublePipe, "‖"),
            ',' => simple(self, TokenType::Comma, ","),
            '&' => simple(self, TokenType::Ampersand, "&"),
            '_' => simple(self, TokenType::Underscore, "_"),
            _ if c.is_ascii_digit() => self.read_number(start).map(Some),
            _ if c.is_ascii_alphabetic() => {
                let run = self.peek_letter_run();
                if TEXT_KEYWORDS.contains(&run.as_str()) {
                    self.read_letter_run();
                    return Ok(Some(Token::new(TokenType::Text, run, start)));
                }
                if self.options.single_letter_identifiers {
                    self.advance();
                    Ok(Some(Token::new(
                        TokenType::Identifier,
                        c.to_string(),
                        start,
                    )))
                } else {
                    let name = self.read_letter_run();
                    Ok(Some(Token::new(TokenType::Identifier, name, start)))
                }
            }
            _ => Err(Error::tokenization(
                format!("unexpected character '{}'", c),
                start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::tokenize(input).unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenType> {
        tokenize(input)
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn numbers() {
        let tokens = tokenize("12 3.5 2e3 1.5E-2");
        assert_eq!(tokens[0].value, "12");
        assert_eq!(tokens[1].value, "3.5");
        assert_eq!(tokens[2].value, "2e3");
        assert_eq!(tokens[3].value, "1.5E-2");
        assert_eq!(tokens[4].token_type, TokenType::Eof);
    }

    #[test]
    fn exponent_marker_needs_digits() {
        let tokens = tokenize("2e");
        assert_eq!(tokens[0].token_type, TokenType::Number);
        assert_eq!(tokens[0].value, "2");
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].value, "e");
    }

    #[test]
    fn single_letter_identifiers() {
        let tokens = tokenize("xy");
        assert_eq!(tokens[0].value, "x");
        assert_eq!(tokens[1].value, "y");
    }

    #[test]
    fn multi_letter_identifiers_when_disabled() {
        let options = LexerOptions {
            single_letter_identifiers: false,
            ..Default::default()
        };
        let tokens = Lexer::tokenize_with("speed", options, None).unwrap();
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, "speed");
    }

    #[test]
    fn greek_commands_are_identifiers() {
        let tokens = tokenize("\\alpha \\Psi \\pi");
        assert_eq!(tokens[0].value, "alpha");
        assert_eq!(tokens[1].value, "Psi");
        assert_eq!(tokens[2].value, "pi");
        assert!(tokens[..3]
            .iter()
            .all(|t| t.token_type == TokenType::Identifier));
    }

    #[test]
    fn font_qualified_identifier() {
        let tokens = tokenize("\\mathbf{X}");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, "mathbf:X");
    }

    #[test]
    fn spacing_and_size_directives_dropped() {
        let tokens = tokenize("\\left( x \\, + \\quad y \\right)");
        let kinds: Vec<_> = tokens.iter().map(|t| t.token_type.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::OpenParen,
                TokenType::Identifier,
                TokenType::Plus,
                TokenType::Identifier,
                TokenType::CloseParen,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn environments() {
        let tokens = tokenize("\\begin{matrix} 1 & 2 \\\\ 3 & 4 \\end{matrix}");
        assert_eq!(tokens[0].token_type, TokenType::BeginEnv);
        assert_eq!(tokens[0].value, "matrix");
        assert_eq!(tokens[4].token_type, TokenType::RowBreak);
        let last = &tokens[tokens.len() - 2];
        assert_eq!(last.token_type, TokenType::EndEnv);
        assert_eq!(last.value, "matrix");
    }

    #[test]
    fn unterminated_environment_name() {
        let err = Lexer::tokenize("\\begin{matrix").unwrap_err();
        assert!(matches!(err, Error::Tokenization { .. }));
    }

    #[test]
    fn unicode_operators() {
        assert_eq!(
            kinds("a × b ÷ c ≤ d"),
            vec![
                TokenType::Identifier,
                TokenType::Times,
                TokenType::Identifier,
                TokenType::Div,
                TokenType::Identifier,
                TokenType::LessThanOrEqual,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_text_tokens() {
        let tokens = tokenize("let x = 5");
        assert_eq!(tokens[0].token_type, TokenType::Text);
        assert_eq!(tokens[0].value, "let");
        assert_eq!(tokens[1].value, "x");
    }

    #[test]
    fn text_command() {
        let tokens = tokenize("\\text{otherwise}");
        assert_eq!(tokens[0].token_type, TokenType::Text);
        assert_eq!(tokens[0].value, "otherwise");
    }

    #[test]
    fn byte_positions_survive_unicode() {
        let tokens = tokenize("π + x");
        assert_eq!(tokens[0].position, 0);
        // π is two bytes
        assert_eq!(tokens[1].position, 3);
        assert_eq!(tokens[2].position, 5);
    }

    #[test]
    fn lone_backslash_fails() {
        assert!(Lexer::tokenize("x + \\").is_err());
        assert!(Lexer::tokenize("\\#").is_err());
    }

    #[test]
    fn input_length_cap() {
        let options = LexerOptions {
            max_input_length: 8,
            ..Default::default()
        };
        let err = Lexer::tokenize_with("123456789", options, None).unwrap_err();
        assert!(matches!(err, Error::Tokenization { .. }));
    }

    #[test]
    fn unknown_command_passes_through() {
        let tokens = tokenize("\\frobnicate");
        assert_eq!(tokens[0].token_type, TokenType::Command);
        assert_eq!(tokens[0].value, "frobnicate");
    }
}
