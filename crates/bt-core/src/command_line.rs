//! Compiler command line tokenizer.
//!
//! Splits a raw command line into quote-aware tokens the way the native
//! compilers read their own arguments, then classifies every token after the
//! executable into switches and positional values.
//!
//! # Scanning rules
//!
//! - `\"` is a literal quote; `\` followed by anything else is kept verbatim
//!   together with that character
//! - `"` toggles quoting and is dropped
//! - whitespace splits tokens outside quotes, except inside the leading
//!   executable path, which ends once the text seen so far ends with the
//!   family's executable stem and a dot (`csc.`, `vbc.`, `fsc.`)

use std::mem;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language::CompilerLanguage;

/// The command line carried no recognizable compiler executable.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("no `{}.` executable marker found in {language} command line", .language.executable_stem())]
pub struct UnparsableCommandLine {
    pub language: CompilerLanguage,
}

/// One classified compiler argument.
///
/// Switches carry a name and an optional value; positional arguments carry
/// only a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerArgument {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl CompilerArgument {
    pub fn switch(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.map(String::from),
        }
    }

    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: Some(value.into()),
        }
    }

    pub const fn is_positional(&self) -> bool {
        self.name.is_none()
    }

    /// Whether this is a switch named `name` (ASCII case-insensitive).
    pub fn is_switch(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Splits `command_line` into tokens. The first token is the executable.
pub fn tokenize(
    command_line: &str,
    language: CompilerLanguage,
) -> Result<Vec<String>, UnparsableCommandLine> {
    let marker = format!("{}.", language.executable_stem());
    let tokens = match language {
        CompilerLanguage::FSharp => LineStrategy.tokenize(command_line, &marker),
        CompilerLanguage::CSharp | CompilerLanguage::VisualBasic => {
            WhitespaceStrategy.tokenize(command_line, &marker)
        }
    };
    tokens.ok_or(UnparsableCommandLine { language })
}

/// Classifies every token after the executable.
pub fn classify(tokens: &[String], language: CompilerLanguage) -> Vec<CompilerArgument> {
    tokens
        .iter()
        .skip(1)
        .map(|token| classify_token(token, language))
        .collect()
}

fn classify_token(token: &str, language: CompilerLanguage) -> CompilerArgument {
    let prefix = language.switch_prefix();
    if let Some(body) = token.strip_prefix(prefix) {
        // F# long options use a doubled prefix (`--define:DEBUG`)
        let body = match language {
            CompilerLanguage::FSharp => body.strip_prefix(prefix).unwrap_or(body),
            CompilerLanguage::CSharp | CompilerLanguage::VisualBasic => body,
        };
        let (name, value) = match body.split_once(':') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        // `/home/me/a.cs` is an absolute path, not a switch
        let is_path = prefix == '/' && name.contains('/');
        if !name.is_empty() && !is_path {
            return CompilerArgument::switch(name, value);
        }
    }
    CompilerArgument::positional(token)
}

/// Re-emits tokens in a form that tokenizes back to the same tokens.
///
/// C# and VB tokens are joined with single spaces; F# tokens are joined one
/// per line, the layout the F# compiler task reports.
pub fn join(tokens: &[String], language: CompilerLanguage) -> String {
    let separator = match language {
        CompilerLanguage::FSharp => "\n",
        CompilerLanguage::CSharp | CompilerLanguage::VisualBasic => " ",
    };
    tokens
        .iter()
        .map(|token| quote(token))
        .collect::<Vec<_>>()
        .join(separator)
}

fn quote(token: &str) -> String {
    let escaped = token.replace('"', "\\\"");
    if !token.chars().any(is_separator) {
        return escaped;
    }
    // an odd trailing backslash would escape the closing quote
    let trailing = escaped.len() - escaped.trim_end_matches('\\').len();
    if trailing % 2 == 1 {
        format!("\"{}\"\\", &escaped[..escaped.len() - 1])
    } else {
        format!("\"{escaped}\"")
    }
}

const fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r')
}

/// A way of feeding raw text through the shared [`Scanner`].
trait TokenizeStrategy {
    fn tokenize(&self, command_line: &str, marker: &str) -> Option<Vec<String>>;
}

/// Scans the whole command line in one pass (C#, VB).
struct WhitespaceStrategy;

impl TokenizeStrategy for WhitespaceStrategy {
    fn tokenize(&self, command_line: &str, marker: &str) -> Option<Vec<String>> {
        let mut scanner = Scanner::new(marker);
        scanner.scan(command_line.trim_start());
        scanner.finish()
    }
}

/// Pre-splits on line breaks and scans each line (F#).
struct LineStrategy;

impl TokenizeStrategy for LineStrategy {
    fn tokenize(&self, command_line: &str, marker: &str) -> Option<Vec<String>> {
        let mut scanner = Scanner::new(marker);
        for line in command_line.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if scanner.in_executable && !scanner.current.is_empty() {
                scanner.push(' ');
            }
            scanner.scan(line);
            if !scanner.in_executable {
                scanner.end_line();
            }
        }
        scanner.finish()
    }
}

/// The quote/escape primitive shared by both strategies.
struct Scanner<'m> {
    marker: &'m str,
    current: String,
    tokens: Vec<String>,
    in_quote: bool,
    in_executable: bool,
}

impl<'m> Scanner<'m> {
    const fn new(marker: &'m str) -> Self {
        Self {
            marker,
            current: String::new(),
            tokens: Vec::new(),
            in_quote: false,
            in_executable: true,
        }
    }

    fn scan(&mut self, text: &str) {
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('"') => self.push('"'),
                    Some(next) => {
                        self.push('\\');
                        self.push(next);
                    }
                    None => self.push('\\'),
                },
                '"' => self.in_quote = !self.in_quote,
                c if is_separator(c) && !self.in_quote && !self.in_executable => self.flush(),
                c => self.push(c),
            }
        }
    }

    fn push(&mut self, c: char) {
        self.current.push(c);
        if self.in_executable && ends_with_ignore_case(&self.current, self.marker) {
            self.in_executable = false;
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.tokens.push(mem::take(&mut self.current));
        }
    }

    fn end_line(&mut self) {
        self.flush();
        self.in_quote = false;
    }

    fn finish(mut self) -> Option<Vec<String>> {
        if self.in_executable {
            return None;
        }
        self.flush();
        Some(self.tokens)
    }
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len()
        && text.is_char_boundary(text.len() - suffix.len())
        && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
