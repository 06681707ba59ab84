//! Compiler families and the task names that invoke them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A compiler family whose command lines can be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerLanguage {
    CSharp,
    VisualBasic,
    FSharp,
}

impl CompilerLanguage {
    pub const ALL: [Self; 3] = [Self::CSharp, Self::VisualBasic, Self::FSharp];

    /// Name of the build task that runs this compiler.
    #[must_use]
    pub const fn task_name(self) -> &'static str {
        match self {
            Self::CSharp => "Csc",
            Self::VisualBasic => "Vbc",
            Self::FSharp => "Fsc",
        }
    }

    /// Lowercase executable stem that marks the end of the executable path.
    #[must_use]
    pub const fn executable_stem(self) -> &'static str {
        match self {
            Self::CSharp => "csc",
            Self::VisualBasic => "vbc",
            Self::FSharp => "fsc",
        }
    }

    #[must_use]
    pub const fn switch_prefix(self) -> char {
        match self {
            Self::CSharp | Self::VisualBasic => '/',
            Self::FSharp => '-',
        }
    }

    /// Switch names whose values are metadata references.
    #[must_use]
    pub const fn reference_switches(self) -> &'static [&'static str] {
        match self {
            Self::CSharp | Self::VisualBasic => &["reference", "r"],
            Self::FSharp => &["r", "reference"],
        }
    }

    /// Switch names whose values are analyzer assemblies.
    #[must_use]
    pub const fn analyzer_switches(self) -> &'static [&'static str] {
        &["analyzer", "a"]
    }

    /// Looks up the language for a task name, ignoring case.
    pub fn from_task_name(task_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.task_name().eq_ignore_ascii_case(task_name))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CSharp => "csharp",
            Self::VisualBasic => "visualbasic",
            Self::FSharp => "fsharp",
        }
    }
}

impl fmt::Display for CompilerLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilerLanguage {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csharp" | "cs" | "c#" | "csc" => Ok(Self::CSharp),
            "visualbasic" | "vb" | "vbc" => Ok(Self::VisualBasic),
            "fsharp" | "fs" | "f#" | "fsc" => Ok(Self::FSharp),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

impl Serialize for CompilerLanguage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CompilerLanguage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown language names.
#[derive(Debug, Clone)]
pub struct UnknownLanguage(String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown compiler language: {}", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}
