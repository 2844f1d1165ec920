//! Keyfile tokenizer.
//!
//! Turns a forward-only byte source into typed tokens. Two lexical states are
//! tracked: at the start of a line `$` introduces a comment line and `*` a
//! keyword; anywhere else both are ordinary word characters.
//!
//! - Comment lines (`$...`) are discarded together with their newline
//! - Keyword introducer `*` (line start only)
//! - Runs of blanks (space, tab, form feed, vertical tab, carriage return);
//!   a carriage return directly before `\n` is part of the line break
//! - Numbers (`-12`, `2.5`, `-3.2E-01`), shape only; values are parsed later
//! - Commas, newlines
//! - Words: any other run of non-blank characters

use std::io::BufRead;

use crate::error::Result;

/// A token in a keyfile.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Run of blanks.
    Whitespace(String),
    /// Line terminator.
    Newline,
    /// Comment text after `$` (only produced with [`Lexer::keep_comments`]).
    Comment(String),
    /// Comma `,`.
    Comma,
    /// Keyword introducer `*` at the start of a line.
    Asterisk,
    /// Run of non-blank characters that is not a number.
    Word(String),
    /// Numeric literal, verbatim.
    Number(String),
    /// End of the source.
    EndOfStream,
}

impl Token {
    /// Literal text of the token as it appeared in the source.
    pub fn text(&self) -> &str {
        match self {
            Token::Whitespace(s) | Token::Comment(s) | Token::Word(s) | Token::Number(s) => s,
            Token::Newline => "\n",
            Token::Comma => ",",
            Token::Asterisk => "*",
            Token::EndOfStream => "",
        }
    }

    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Whitespace(_) => "whitespace".into(),
            Token::Newline => "end of line".into(),
            Token::Comment(_) => "comment".into(),
            Token::Comma => "','".into(),
            Token::Asterisk => "'*'".into(),
            Token::Word(s) => format!("word '{s}'"),
            Token::Number(s) => format!("number '{s}'"),
            Token::EndOfStream => "end of file".into(),
        }
    }

    /// Whether the token may separate two fields of a record.
    pub fn is_separator(&self) -> bool {
        matches!(self, Token::Whitespace(_) | Token::Comma)
    }
}

/// A token with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Line number (1-indexed).
    pub line: usize,
}

/// Lexical state of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    /// Nothing but a newline has been consumed on the current line.
    LineStart,
    /// Somewhere inside a line.
    MidLine,
    /// End of stream has been reported.
    Finished,
}

/// Kind of token that begins at the next character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStart {
    /// `$` at line start: a whole comment line.
    Comment,
    /// `*` at line start.
    Asterisk,
    /// `\n`.
    Newline,
    /// Blank run.
    Whitespace,
    /// Digit or `-`.
    Number,
    /// `,`.
    Comma,
    /// Anything else.
    Word,
    /// No more input.
    EndOfStream,
}

fn is_blank(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\x0b' | b'\x0c' | b'\r')
}

/// Decide which token starts at `ch` in `state`, and the state that follows it.
///
/// This is the whole lexical state machine; [`Lexer`] only carries out the
/// consumption the returned [`TokenStart`] names.
pub fn transition(state: LexState, ch: Option<u8>) -> (TokenStart, LexState) {
    let Some(ch) = ch else {
        return (TokenStart::EndOfStream, LexState::Finished);
    };
    match (state, ch) {
        (LexState::Finished, _) => (TokenStart::EndOfStream, LexState::Finished),
        (LexState::LineStart, b'$') => (TokenStart::Comment, LexState::LineStart),
        (LexState::LineStart, b'*') => (TokenStart::Asterisk, LexState::MidLine),
        (_, b'\n') => (TokenStart::Newline, LexState::LineStart),
        (_, c) if is_blank(c) => (TokenStart::Whitespace, LexState::MidLine),
        (_, c) if c.is_ascii_digit() || c == b'-' => (TokenStart::Number, LexState::MidLine),
        (_, b',') => (TokenStart::Comma, LexState::MidLine),
        _ => (TokenStart::Word, LexState::MidLine),
    }
}

/// Streaming tokenizer over a buffered byte source.
pub struct Lexer<R> {
    reader: R,
    state: LexState,
    line: usize,
    column: usize,
    keep_comments: bool,
    fused: bool,
}

impl<'a> Lexer<&'a [u8]> {
    /// Create a lexer over an in-memory buffer.
    pub fn from_bytes(input: &'a [u8]) -> Self {
        Self::new(input)
    }
}

impl<R: BufRead> Lexer<R> {
    /// Create a new lexer reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: LexState::LineStart,
            line: 1,
            column: 0,
            keep_comments: false,
            fused: false,
        }
    }

    /// Emit [`Token::Comment`] for comment lines instead of discarding them.
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Current line number (1-indexed).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Number of lines consumed so far, counting a final line without a
    /// terminating newline.
    pub fn lines_read(&self) -> usize {
        self.line - 1 + usize::from(self.column > 0)
    }

    /// Current lexical state.
    pub fn state(&self) -> LexState {
        self.state
    }

    /// Tokenize the remaining input, up to and including [`Token::EndOfStream`].
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.token == Token::EndOfStream;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token.
    ///
    /// Once the source is exhausted every call returns [`Token::EndOfStream`].
    pub fn next_token(&mut self) -> Result<SpannedToken> {
        loop {
            let ch = self.peek()?;
            let (start, next) = transition(self.state, ch);
            let line = self.line;

            let token = match start {
                TokenStart::Comment => {
                    self.advance();
                    let mut text = Vec::new();
                    self.take_while(&mut text, |c| c != b'\n')?;
                    if text.last() == Some(&b'\r') {
                        text.pop();
                    }
                    self.state = next;
                    if self.keep_comments {
                        return Ok(SpannedToken {
                            token: Token::Comment(into_text(text)),
                            line,
                        });
                    }
                    if self.peek()? == Some(b'\n') {
                        self.advance();
                        self.new_line();
                    }
                    continue;
                }
                TokenStart::Asterisk => {
                    self.advance();
                    Token::Asterisk
                }
                TokenStart::Newline => {
                    self.advance();
                    self.new_line();
                    Token::Newline
                }
                TokenStart::Whitespace => {
                    let mut text = Vec::new();
                    self.take_while(&mut text, is_blank)?;
                    if text.last() == Some(&b'\r') && self.peek()? == Some(b'\n') {
                        text.pop();
                        if text.is_empty() {
                            continue;
                        }
                    }
                    Token::Whitespace(into_text(text))
                }
                TokenStart::Number => self.read_number()?,
                TokenStart::Comma => {
                    self.advance();
                    Token::Comma
                }
                TokenStart::Word => {
                    let mut text = Vec::new();
                    self.take_while(&mut text, |c| !is_blank(c) && c != b'\n')?;
                    Token::Word(into_text(text))
                }
                TokenStart::EndOfStream => Token::EndOfStream,
            };

            self.state = next;
            return Ok(SpannedToken { token, line });
        }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn advance(&mut self) {
        self.reader.consume(1);
        self.column += 1;
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.column = 0;
    }

    fn take_while(&mut self, text: &mut Vec<u8>, keep: impl Fn(u8) -> bool) -> Result<()> {
        while let Some(ch) = self.peek()? {
            if !keep(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }
        Ok(())
    }

    fn take_one_of(&mut self, text: &mut Vec<u8>, set: &[u8]) -> Result<bool> {
        match self.peek()? {
            Some(ch) if set.contains(&ch) => {
                text.push(ch);
                self.advance();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let mut text = Vec::new();

        // Sign
        self.take_one_of(&mut text, b"-")?;

        // Integer part
        self.take_while(&mut text, |c| c.is_ascii_digit())?;

        // Decimal part
        if self.take_one_of(&mut text, b".")? {
            self.take_while(&mut text, |c| c.is_ascii_digit())?;
        }

        // Exponent part
        if self.take_one_of(&mut text, b"eE")? {
            self.take_one_of(&mut text, b"+-")?;
            self.take_while(&mut text, |c| c.is_ascii_digit())?;
        }

        Ok(Token::Number(into_text(text)))
    }
}

/// Token bytes as text; invalid UTF-8 sequences become U+FFFD.
fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

impl<R: BufRead> Iterator for Lexer<R> {
    type Item = Result<SpannedToken>;

    /// Yields [`Token::EndOfStream`] once, then `None`.
    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let result = self.next_token();
        self.fused = match &result {
            Ok(tok) => tok.token == Token::EndOfStream,
            Err(_) => true,
        };
        Some(result)
    }
}
