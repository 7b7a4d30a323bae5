//! Single-pass scanner.
//!
//! One left-to-right pass over the source buffer. The scanner keeps a
//! one-token context flag to disambiguate regex literals from division
//! (slash-context rule) and a brace-depth stack to re-enter template
//! literal mode at the matching `}` of each `${` substitution.

use memchr::memchr2;
use smallvec::SmallVec;
use tsi_common::diagnostics::{Diagnostic, diagnostic_codes};
use tsi_common::numeric::{parse_bigint_literal_value, parse_numeric_literal_value};
use tsi_common::span::Span;

use crate::token::{Token, TokenKind, TokenValue, keyword_kind};

/// Single-pass tokenizer.
///
/// Errors produce a synthetic `Error` token and a diagnostic; the scan
/// always terminates with an `EndOfFile` token.
pub struct Scanner<'a> {
    file_name: String,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    strict: bool,
    /// Pending `${` substitutions: one brace-depth counter per open template.
    template_stack: SmallVec<[u32; 4]>,
    /// Kind of the previous significant token, for the slash-context rule.
    prev_kind: Option<TokenKind>,
    newline_before: bool,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Scanner<'a> {
    pub fn new(file_name: impl Into<String>, source: &'a str) -> Self {
        Scanner {
            file_name: file_name.into(),
            source,
            bytes: source.as_bytes(),
            pos: 0,
            strict: false,
            template_stack: SmallVec::new(),
            prev_kind: None,
            newline_before: false,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Enable strict-mode lexing (legacy octal escapes become errors).
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Scan the whole buffer, returning the token sequence (terminated by
    /// `EndOfFile`) and any diagnostics.
    pub fn scan(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while self.pos < self.bytes.len() {
            self.skip_trivia();
            if self.pos >= self.bytes.len() {
                break;
            }
            self.scan_token();
        }
        let end = self.pos as u32;
        self.push_simple(TokenKind::EndOfFile, Span::at(end));
        (self.tokens, self.diagnostics)
    }

    // =========================================================================
    // Trivia
    // =========================================================================

    fn skip_trivia(&mut self) {
        loop {
            match self.bytes.get(self.pos) {
                Some(b' ' | b'\t' | b'\x0c' | b'\x0b') => self.pos += 1,
                Some(b'\n') => {
                    self.newline_before = true;
                    self.pos += 1;
                }
                Some(b'\r') => {
                    self.newline_before = true;
                    self.pos += 1;
                    if self.bytes.get(self.pos) == Some(&b'\n') {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    // Line comment: jump to the next line break.
                    let rest = &self.bytes[self.pos..];
                    match memchr2(b'\n', b'\r', rest) {
                        Some(off) => self.pos += off,
                        None => self.pos = self.bytes.len(),
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut closed = false;
                    while self.pos < self.bytes.len() {
                        if self.bytes[self.pos] == b'*'
                            && self.bytes.get(self.pos + 1) == Some(&b'/')
                        {
                            self.pos += 2;
                            closed = true;
                            break;
                        }
                        if matches!(self.bytes[self.pos], b'\n' | b'\r') {
                            self.newline_before = true;
                        }
                        self.pos += 1;
                    }
                    if !closed {
                        self.error_at(
                            Span::new(start as u32, self.pos as u32),
                            "Unterminated comment.".to_string(),
                            diagnostic_codes::UNTERMINATED_COMMENT,
                        );
                    }
                }
                _ => break,
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn scan_token(&mut self) {
        let start = self.pos;
        let b = self.bytes[self.pos];

        match b {
            b'0'..=b'9' => self.scan_number(start),
            b'"' | b'\'' => self.scan_string(start, b),
            b'`' => {
                self.pos += 1;
                self.scan_template_fragment(start, true);
            }
            b'}' if self.template_stack.last() == Some(&0) => {
                // Matching `}` of a `${` substitution: re-enter template mode.
                self.pos += 1;
                self.scan_template_fragment(start, false);
            }
            b'#' => self.scan_private_identifier(start),
            b'/' if self.regex_allowed() => self.scan_regex(start),
            _ if is_identifier_start(self.char_at(self.pos)) => self.scan_identifier(start),
            _ => self.scan_punctuator(start),
        }
    }

    fn char_at(&self, pos: usize) -> char {
        self.source[pos..].chars().next().unwrap_or('\0')
    }

    // =========================================================================
    // Identifiers and keywords
    // =========================================================================

    fn scan_identifier(&mut self, start: usize) {
        while self.pos < self.bytes.len() && is_identifier_part(self.char_at(self.pos)) {
            self.pos += self.char_at(self.pos).len_utf8();
        }
        let text = &self.source[start..self.pos];
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.push_token(kind, start, TokenValue::None, text.to_string());
    }

    fn scan_private_identifier(&mut self, start: usize) {
        self.pos += 1;
        if self.pos >= self.bytes.len() || !is_identifier_start(self.char_at(self.pos)) {
            self.error_token(start, "Unexpected character '#'.".to_string());
            return;
        }
        while self.pos < self.bytes.len() && is_identifier_part(self.char_at(self.pos)) {
            self.pos += self.char_at(self.pos).len_utf8();
        }
        let text = self.source[start..self.pos].to_string();
        self.push_token(TokenKind::PrivateIdentifier, start, TokenValue::None, text);
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    fn scan_number(&mut self, start: usize) {
        let radix = if self.bytes[self.pos] == b'0' {
            match self.bytes.get(self.pos + 1) {
                Some(b'x' | b'X') => 16,
                Some(b'o' | b'O') => 8,
                Some(b'b' | b'B') => 2,
                _ => 10,
            }
        } else {
            10
        };

        if radix != 10 {
            self.pos += 2;
            while self.pos < self.bytes.len()
                && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
            {
                self.pos += 1;
            }
        } else {
            while self.pos < self.bytes.len()
                && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'_')
            {
                self.pos += 1;
            }
            if self.bytes.get(self.pos) == Some(&b'.') {
                self.pos += 1;
                while self.pos < self.bytes.len()
                    && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'_')
                {
                    self.pos += 1;
                }
            }
            if matches!(self.bytes.get(self.pos), Some(b'e' | b'E')) {
                let mut ahead = self.pos + 1;
                if matches!(self.bytes.get(ahead), Some(b'+' | b'-')) {
                    ahead += 1;
                }
                if matches!(self.bytes.get(ahead), Some(b'0'..=b'9')) {
                    self.pos = ahead;
                    while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                        self.pos += 1;
                    }
                }
            }
        }

        // BigInt suffix
        if self.bytes.get(self.pos) == Some(&b'n') {
            let digits = &self.source[start..self.pos];
            self.pos += 1;
            let text = self.source[start..self.pos].to_string();
            match parse_bigint_literal_value(digits) {
                Some(value) => {
                    self.push_token(TokenKind::BigIntLiteral, start, TokenValue::BigInt(value), text);
                }
                None => self.invalid_number(start),
            }
            return;
        }

        let text = &self.source[start..self.pos];
        match parse_numeric_literal_value(text) {
            Some(value) => {
                self.push_token(
                    TokenKind::NumericLiteral,
                    start,
                    TokenValue::Number(value),
                    text.to_string(),
                );
            }
            None => self.invalid_number(start),
        }
    }

    fn invalid_number(&mut self, start: usize) {
        let span = Span::new(start as u32, self.pos as u32);
        self.error_at(
            span,
            format!("Invalid numeric literal '{}'.", span.slice(self.source)),
            diagnostic_codes::INVALID_NUMERIC_LITERAL,
        );
        let text = self.source[start..self.pos].to_string();
        self.push_token(TokenKind::Error, start, TokenValue::None, text);
    }

    // =========================================================================
    // Strings
    // =========================================================================

    fn scan_string(&mut self, start: usize, quote: u8) {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.bytes.get(self.pos) {
                None | Some(b'\n' | b'\r') => {
                    self.error_at(
                        Span::new(start as u32, self.pos as u32),
                        "Unterminated string literal.".to_string(),
                        diagnostic_codes::UNTERMINATED_STRING_LITERAL,
                    );
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(TokenKind::Error, start, TokenValue::None, text);
                    return;
                }
                Some(&b) if b == quote => {
                    self.pos += 1;
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(TokenKind::StringLiteral, start, TokenValue::String(value), text);
                    return;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.scan_escape(&mut value);
                }
                Some(_) => {
                    let ch = self.char_at(self.pos);
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    /// Decode one escape sequence after the backslash has been consumed.
    /// Shared between string and template scanning.
    fn scan_escape(&mut self, out: &mut String) {
        let esc_start = self.pos - 1;
        let Some(&b) = self.bytes.get(self.pos) else {
            return;
        };
        self.pos += 1;
        match b {
            b'n' => out.push('\n'),
            b't' => out.push('\t'),
            b'r' => out.push('\r'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'v' => out.push('\u{b}'),
            b'0'..=b'7' => {
                // Legacy octal escape; \0 not followed by a digit is NUL.
                let mut code = u32::from(b - b'0');
                let mut len = 1;
                while len < 3
                    && matches!(self.bytes.get(self.pos), Some(b'0'..=b'7'))
                    && code * 8 + u32::from(self.bytes[self.pos] - b'0') <= 0xFF
                {
                    code = code * 8 + u32::from(self.bytes[self.pos] - b'0');
                    self.pos += 1;
                    len += 1;
                }
                let is_plain_nul = b == b'0' && len == 1;
                if self.strict && !is_plain_nul {
                    self.error_at(
                        Span::new(esc_start as u32, self.pos as u32),
                        "Octal escape sequences are not allowed in strict mode.".to_string(),
                        diagnostic_codes::OCTAL_ESCAPE_IN_STRICT_MODE,
                    );
                }
                if let Some(ch) = char::from_u32(code) {
                    out.push(ch);
                }
            }
            b'x' => {
                let hex = self.take_hex_digits(2);
                match hex.and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => self.invalid_escape(esc_start),
                }
            }
            b'u' => {
                if self.bytes.get(self.pos) == Some(&b'{') {
                    self.pos += 1;
                    let digit_start = self.pos;
                    while matches!(self.bytes.get(self.pos), Some(c) if c.is_ascii_hexdigit()) {
                        self.pos += 1;
                    }
                    let digits = &self.source[digit_start..self.pos];
                    let ok = self.bytes.get(self.pos) == Some(&b'}');
                    if ok {
                        self.pos += 1;
                    }
                    match (ok, u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)) {
                        (true, Some(ch)) => out.push(ch),
                        _ => self.invalid_escape(esc_start),
                    }
                } else {
                    let hex = self.take_hex_digits(4);
                    match hex.and_then(char::from_u32) {
                        Some(ch) => out.push(ch),
                        None => self.invalid_escape(esc_start),
                    }
                }
            }
            b'\n' => {
                // Line continuation contributes nothing.
            }
            b'\r' => {
                if self.bytes.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            _ => {
                // Identity escape: \' \" \\ \/ and anything else.
                self.pos -= 1;
                let ch = self.char_at(self.pos);
                out.push(ch);
                self.pos += ch.len_utf8();
            }
        }
    }

    fn take_hex_digits(&mut self, count: usize) -> Option<u32> {
        let start = self.pos;
        for _ in 0..count {
            if !matches!(self.bytes.get(self.pos), Some(c) if c.is_ascii_hexdigit()) {
                return None;
            }
            self.pos += 1;
        }
        u32::from_str_radix(&self.source[start..self.pos], 16).ok()
    }

    fn invalid_escape(&mut self, esc_start: usize) {
        self.error_at(
            Span::new(esc_start as u32, self.pos as u32),
            "Invalid escape sequence.".to_string(),
            diagnostic_codes::INVALID_ESCAPE_SEQUENCE,
        );
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Scan a template fragment starting after the opening `` ` `` (for
    /// heads) or after the `}` that closed a substitution (for
    /// middles/tails). Emits one of the four template token kinds.
    fn scan_template_fragment(&mut self, start: usize, is_head: bool) {
        let mut cooked = String::new();
        let raw_start = self.pos;
        loop {
            match self.bytes.get(self.pos) {
                None => {
                    self.error_at(
                        Span::new(start as u32, self.pos as u32),
                        "Unterminated template literal.".to_string(),
                        diagnostic_codes::UNTERMINATED_TEMPLATE_LITERAL,
                    );
                    if !is_head {
                        self.template_stack.pop();
                    }
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(TokenKind::Error, start, TokenValue::None, text);
                    return;
                }
                Some(b'`') => {
                    let raw = self.source[raw_start..self.pos].to_string();
                    self.pos += 1;
                    let kind = if is_head {
                        TokenKind::NoSubstitutionTemplate
                    } else {
                        self.template_stack.pop();
                        TokenKind::TemplateTail
                    };
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(kind, start, TokenValue::Template { cooked, raw }, text);
                    return;
                }
                Some(b'$') if self.bytes.get(self.pos + 1) == Some(&b'{') => {
                    let raw = self.source[raw_start..self.pos].to_string();
                    self.pos += 2;
                    let kind = if is_head {
                        self.template_stack.push(0);
                        TokenKind::TemplateHead
                    } else {
                        // Still inside the same template; depth resets to 0.
                        TokenKind::TemplateMiddle
                    };
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(kind, start, TokenValue::Template { cooked, raw }, text);
                    return;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.scan_escape(&mut cooked);
                }
                Some(_) => {
                    let ch = self.char_at(self.pos);
                    cooked.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    // =========================================================================
    // Regex
    // =========================================================================

    /// Slash-context rule: `/` starts a regex only after tokens that cannot
    /// end an expression.
    fn regex_allowed(&self) -> bool {
        match self.prev_kind {
            None => true,
            Some(kind) => !matches!(
                kind,
                TokenKind::Identifier
                    | TokenKind::PrivateIdentifier
                    | TokenKind::NumericLiteral
                    | TokenKind::BigIntLiteral
                    | TokenKind::StringLiteral
                    | TokenKind::RegexLiteral
                    | TokenKind::NoSubstitutionTemplate
                    | TokenKind::TemplateTail
                    | TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::RightBrace
                    | TokenKind::This
                    | TokenKind::Super
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Null
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
            ) && !kind.is_identifier_like(),
        }
    }

    fn scan_regex(&mut self, start: usize) {
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.bytes.get(self.pos) {
                None | Some(b'\n' | b'\r') => {
                    self.error_at(
                        Span::new(start as u32, self.pos as u32),
                        "Unterminated regular expression literal.".to_string(),
                        diagnostic_codes::UNTERMINATED_REGEX_LITERAL,
                    );
                    let text = self.source[start..self.pos].to_string();
                    self.push_token(TokenKind::Error, start, TokenValue::None, text);
                    return;
                }
                Some(b'\\') => {
                    self.pos += 2;
                }
                Some(b'[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some(b'/') if !in_class => {
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        let pattern = self.source[start + 1..self.pos].to_string();
        self.pos += 1;
        let flags_start = self.pos;
        while self.pos < self.bytes.len() && is_identifier_part(self.char_at(self.pos)) {
            self.pos += 1;
        }
        let flags = self.source[flags_start..self.pos].to_string();
        let text = self.source[start..self.pos].to_string();
        self.push_token(
            TokenKind::RegexLiteral,
            start,
            TokenValue::Regex { pattern, flags },
            text,
        );
    }

    // =========================================================================
    // Punctuators
    // =========================================================================

    fn scan_punctuator(&mut self, start: usize) {
        use TokenKind::*;
        let b = self.bytes[self.pos];
        // Longest match first within each leading byte.
        let (kind, len): (TokenKind, usize) = match b {
            b'(' => (LeftParen, 1),
            b')' => (RightParen, 1),
            b'{' => {
                if let Some(depth) = self.template_stack.last_mut() {
                    *depth += 1;
                }
                (LeftBrace, 1)
            }
            b'}' => {
                if let Some(depth) = self.template_stack.last_mut() {
                    // depth == 0 is handled in scan_token (template re-entry)
                    *depth = depth.saturating_sub(1);
                }
                (RightBrace, 1)
            }
            b'[' => (LeftBracket, 1),
            b']' => (RightBracket, 1),
            b';' => (Semicolon, 1),
            b',' => (Comma, 1),
            b'@' => (At, 1),
            b'~' => (Tilde, 1),
            b':' => (Colon, 1),
            b'.' => {
                if self.peek_bytes(b"...") {
                    (DotDotDot, 3)
                } else {
                    (Dot, 1)
                }
            }
            b'?' => {
                if self.peek_bytes(b"??=") {
                    (QuestionQuestionEquals, 3)
                } else if self.peek_bytes(b"??") {
                    (QuestionQuestion, 2)
                } else if self.peek_bytes(b"?.") && !matches!(self.bytes.get(self.pos + 2), Some(b'0'..=b'9'))
                {
                    // `x?.3:y` keeps `?.` out of the ternary
                    (QuestionDot, 2)
                } else {
                    (Question, 1)
                }
            }
            b'=' => {
                if self.peek_bytes(b"===") {
                    (EqualsEqualsEquals, 3)
                } else if self.peek_bytes(b"==") {
                    (EqualsEquals, 2)
                } else if self.peek_bytes(b"=>") {
                    (Arrow, 2)
                } else {
                    (Equals, 1)
                }
            }
            b'!' => {
                if self.peek_bytes(b"!==") {
                    (ExclamationEqualsEquals, 3)
                } else if self.peek_bytes(b"!=") {
                    (ExclamationEquals, 2)
                } else {
                    (Exclamation, 1)
                }
            }
            b'+' => {
                if self.peek_bytes(b"++") {
                    (PlusPlus, 2)
                } else if self.peek_bytes(b"+=") {
                    (PlusEquals, 2)
                } else {
                    (Plus, 1)
                }
            }
            b'-' => {
                if self.peek_bytes(b"--") {
                    (MinusMinus, 2)
                } else if self.peek_bytes(b"-=") {
                    (MinusEquals, 2)
                } else {
                    (Minus, 1)
                }
            }
            b'*' => {
                if self.peek_bytes(b"**=") {
                    (StarStarEquals, 3)
                } else if self.peek_bytes(b"**") {
                    (StarStar, 2)
                } else if self.peek_bytes(b"*=") {
                    (StarEquals, 2)
                } else {
                    (Star, 1)
                }
            }
            b'/' => {
                if self.peek_bytes(b"/=") {
                    (SlashEquals, 2)
                } else {
                    (Slash, 1)
                }
            }
            b'%' => {
                if self.peek_bytes(b"%=") {
                    (PercentEquals, 2)
                } else {
                    (Percent, 1)
                }
            }
            b'<' => {
                if self.peek_bytes(b"<<=") {
                    (LessThanLessThanEquals, 3)
                } else if self.peek_bytes(b"<<") {
                    (LessThanLessThan, 2)
                } else if self.peek_bytes(b"<=") {
                    (LessThanEquals, 2)
                } else {
                    (LessThan, 1)
                }
            }
            b'>' => {
                if self.peek_bytes(b">>>=") {
                    (GreaterThanGreaterThanGreaterThanEquals, 4)
                } else if self.peek_bytes(b">>>") {
                    (GreaterThanGreaterThanGreaterThan, 3)
                } else if self.peek_bytes(b">>=") {
                    (GreaterThanGreaterThanEquals, 3)
                } else if self.peek_bytes(b">>") {
                    (GreaterThanGreaterThan, 2)
                } else if self.peek_bytes(b">=") {
                    (GreaterThanEquals, 2)
                } else {
                    (GreaterThan, 1)
                }
            }
            b'&' => {
                if self.peek_bytes(b"&&=") {
                    (AmpersandAmpersandEquals, 3)
                } else if self.peek_bytes(b"&&") {
                    (AmpersandAmpersand, 2)
                } else {
                    (Ampersand, 1)
                }
            }
            b'|' => {
                if self.peek_bytes(b"||=") {
                    (BarBarEquals, 3)
                } else if self.peek_bytes(b"||") {
                    (BarBar, 2)
                } else {
                    (Bar, 1)
                }
            }
            b'^' => (Caret, 1),
            _ => {
                let ch = self.char_at(self.pos);
                self.pos += ch.len_utf8();
                self.error_at(
                    Span::new(start as u32, self.pos as u32),
                    format!("Unexpected character '{ch}'."),
                    diagnostic_codes::UNEXPECTED_CHARACTER,
                );
                let text = self.source[start..self.pos].to_string();
                self.push_token(TokenKind::Error, start, TokenValue::None, text);
                return;
            }
        };
        self.pos += len;
        self.push_simple(kind, Span::new(start as u32, self.pos as u32));
    }

    fn peek_bytes(&self, expected: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(expected)
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn push_token(&mut self, kind: TokenKind, start: usize, value: TokenValue, text: String) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
            value,
            text,
            newline_before: self.newline_before,
        });
        self.newline_before = false;
        self.prev_kind = Some(kind);
    }

    fn push_simple(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token {
            kind,
            span,
            value: TokenValue::None,
            text: String::new(),
            newline_before: self.newline_before,
        });
        self.newline_before = false;
        self.prev_kind = Some(kind);
    }

    fn error_token(&mut self, start: usize, message: String) {
        self.pos += 1;
        self.error_at(
            Span::new(start as u32, self.pos as u32),
            message,
            diagnostic_codes::UNEXPECTED_CHARACTER,
        );
        let text = self.source[start..self.pos].to_string();
        self.push_token(TokenKind::Error, start, TokenValue::None, text);
    }

    fn error_at(&mut self, span: Span, message: String, code: u32) {
        self.diagnostics.push(Diagnostic::error(
            self.file_name.clone(),
            span.start,
            span.len(),
            message,
            code,
        ));
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_identifier_part(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Scanner::new("test.ts", source).scan();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tokens.iter().map(|t| t.kind).collect()
    }

    fn scan_ok(source: &str) -> Vec<Token> {
        let (tokens, diags) = Scanner::new("test.ts", source).scan();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tokens
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(
            kinds("const answer = value;"),
            vec![Const, Identifier, Equals, Identifier, Semicolon, EndOfFile]
        );
    }

    #[test]
    fn scans_compound_punctuators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a ??= b ?. c ** d >>> e"),
            vec![
                Identifier,
                QuestionQuestionEquals,
                Identifier,
                QuestionDot,
                Identifier,
                StarStar,
                Identifier,
                GreaterThanGreaterThanGreaterThan,
                Identifier,
                EndOfFile
            ]
        );
    }

    #[test]
    fn scans_numeric_forms() {
        let tokens = scan_ok("1_000 0xFF 0o17 0b101 3.14 1e3 42n");
        assert_eq!(tokens[0].number_value(), Some(1000.0));
        assert_eq!(tokens[1].number_value(), Some(255.0));
        assert_eq!(tokens[2].number_value(), Some(15.0));
        assert_eq!(tokens[3].number_value(), Some(5.0));
        assert_eq!(tokens[4].number_value(), Some(3.14));
        assert_eq!(tokens[5].number_value(), Some(1000.0));
        assert_eq!(tokens[6].kind, TokenKind::BigIntLiteral);
        assert_eq!(tokens[6].value, TokenValue::BigInt(BigInt::from(42)));
    }

    #[test]
    fn decodes_string_escapes() {
        let tokens = scan_ok(r#""a\nb\x41B\u{1F600}""#);
        assert_eq!(tokens[0].string_value(), Some("a\nbAB\u{1F600}"));
    }

    #[test]
    fn line_continuation_is_dropped() {
        let tokens = scan_ok("\"a\\\nb\"");
        assert_eq!(tokens[0].string_value(), Some("ab"));
    }

    #[test]
    fn template_fragments_interleave() {
        use TokenKind::*;
        assert_eq!(
            kinds("`a${x}b${y}c`"),
            vec![
                TemplateHead,
                Identifier,
                TemplateMiddle,
                Identifier,
                TemplateTail,
                EndOfFile
            ]
        );
        assert_eq!(kinds("`plain`"), vec![NoSubstitutionTemplate, EndOfFile]);
    }

    #[test]
    fn template_substitution_may_contain_braces() {
        use TokenKind::*;
        // The object literal's braces must not terminate the substitution.
        assert_eq!(
            kinds("`v${ {a: 1} }w`"),
            vec![
                TemplateHead,
                LeftBrace,
                Identifier,
                Colon,
                NumericLiteral,
                RightBrace,
                TemplateTail,
                EndOfFile
            ]
        );
    }

    #[test]
    fn slash_context_rule() {
        // After an identifier, `/` is division.
        let tokens = scan_ok("a / b");
        assert_eq!(tokens[1].kind, TokenKind::Slash);

        // After `=` or `(`, `/` starts a regex.
        let tokens = scan_ok("x = /ab+c/gi");
        assert_eq!(tokens[2].kind, TokenKind::RegexLiteral);
        assert_eq!(
            tokens[2].value,
            TokenValue::Regex {
                pattern: "ab+c".to_string(),
                flags: "gi".to_string()
            }
        );

        // Slash inside a character class does not terminate the regex.
        let tokens = scan_ok("x = /[/]/");
        assert_eq!(tokens[2].kind, TokenKind::RegexLiteral);
    }

    #[test]
    fn newline_before_flag_for_asi() {
        let tokens = scan_ok("a\nb");
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn recovers_from_bad_characters() {
        let (tokens, diags) = Scanner::new("test.ts", "let \u{00a7} x = 1;").scan();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, diagnostic_codes::UNEXPECTED_CHARACTER);
        // Scanning continued past the error token.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Semicolon));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Error));
    }

    #[test]
    fn unterminated_string_reports_and_continues() {
        let (tokens, diags) = Scanner::new("test.ts", "\"abc\nlet x = 1;").scan();
        assert_eq!(diags[0].code, diagnostic_codes::UNTERMINATED_STRING_LITERAL);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Let));
    }

    #[test]
    fn strict_mode_rejects_octal_escapes() {
        let (_, diags) = Scanner::new("test.ts", r#""\7""#).with_strict(true).scan();
        assert_eq!(diags[0].code, diagnostic_codes::OCTAL_ESCAPE_IN_STRICT_MODE);
        let (_, diags) = Scanner::new("test.ts", r#""\0""#).with_strict(true).scan();
        assert!(diags.is_empty());
    }

    #[test]
    fn private_identifiers() {
        let tokens = scan_ok("this.#count");
        assert_eq!(tokens[2].kind, TokenKind::PrivateIdentifier);
        assert_eq!(tokens[2].text, "#count");
    }
}
