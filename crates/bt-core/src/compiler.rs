//! Compiler commands and selection of the authoritative invocation.

use serde::{Deserialize, Serialize};

use crate::command_line::{self, CompilerArgument, UnparsableCommandLine};
use crate::language::CompilerLanguage;

/// Target inside which the real compiler invocation runs.
pub const CORE_COMPILE_TARGET: &str = "CoreCompile";

/// A parsed compiler command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerCommand {
    pub language: CompilerLanguage,
    /// Executable location, possibly prefixed by a host such as `dotnet exec`.
    pub executable: String,
    /// Every token, executable first.
    pub tokens: Vec<String>,
    /// Classified arguments after the executable.
    pub arguments: Vec<CompilerArgument>,
}

impl CompilerCommand {
    pub fn parse(
        command_line: &str,
        language: CompilerLanguage,
    ) -> Result<Self, UnparsableCommandLine> {
        let tokens = command_line::tokenize(command_line, language)?;
        let arguments = command_line::classify(&tokens, language);
        Ok(Self {
            language,
            executable: tokens.first().cloned().unwrap_or_default(),
            tokens,
            arguments,
        })
    }

    /// Canonical command line that parses back to the same arguments.
    pub fn to_command_line(&self) -> String {
        command_line::join(&self.tokens, self.language)
    }

    /// Positional arguments in order.
    pub fn positionals(&self) -> impl Iterator<Item = &str> {
        self.arguments
            .iter()
            .filter(|arg| arg.is_positional())
            .filter_map(|arg| arg.value.as_deref())
    }

    /// Values of every switch named in `names`, in command line order.
    pub fn switch_values<'a>(&'a self, names: &'a [&str]) -> impl Iterator<Item = &'a str> {
        self.arguments
            .iter()
            .filter(|arg| names.iter().any(|name| arg.is_switch(name)))
            .filter_map(|arg| arg.value.as_deref())
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.switch_values(self.language.reference_switches())
    }

    pub fn analyzer_references(&self) -> impl Iterator<Item = &str> {
        self.switch_values(self.language.analyzer_switches())
    }
}

/// A captured compiler invocation and the outcome of parsing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInvocation {
    pub language: CompilerLanguage,
    pub command_line: String,
    /// Whether the emitting project was inside `CoreCompile` at the time.
    pub in_core_compile: bool,
    pub parsed: Result<CompilerCommand, UnparsableCommandLine>,
}

/// Decides which of several compiler invocations for one result is authoritative.
///
/// The first invocation is kept until one arrives from inside `CoreCompile`;
/// that one replaces it and is never replaced itself. Design-time builds can
/// issue a preflight call before the real compile, which this filters out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSelector {
    selected: Option<CompilerInvocation>,
}

impl CompilerSelector {
    /// Offers an invocation. Returns `true` if it became the selected one.
    pub fn offer(
        &mut self,
        command_line: &str,
        language: CompilerLanguage,
        in_core_compile: bool,
    ) -> bool {
        if command_line.trim().is_empty() {
            return false;
        }

        let replace = match &self.selected {
            None => true,
            Some(kept) => in_core_compile && !kept.in_core_compile,
        };
        if !replace {
            tracing::trace!(%language, in_core_compile, "keeping previously selected compiler invocation");
            return false;
        }

        let parsed = CompilerCommand::parse(command_line, language);
        if let Err(e) = &parsed {
            tracing::warn!(error = %e, "unparsable compiler command line");
        }
        self.selected = Some(CompilerInvocation {
            language,
            command_line: command_line.to_string(),
            in_core_compile,
            parsed,
        });
        true
    }

    pub const fn selected(&self) -> Option<&CompilerInvocation> {
        self.selected.as_ref()
    }

    /// The selected command, if it parsed.
    pub fn command(&self) -> Option<&CompilerCommand> {
        self.selected.as_ref().and_then(|inv| inv.parsed.as_ref().ok())
    }

    /// The parse failure of the selected command, if any.
    pub fn error(&self) -> Option<&UnparsableCommandLine> {
        self.selected.as_ref().and_then(|inv| inv.parsed.as_ref().err())
    }
}
