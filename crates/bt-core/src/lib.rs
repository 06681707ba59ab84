//! Core domain logic for buildtrace.
//!
//! This crate turns a stream of build events into structured per-project,
//! per-target-framework results:
//! - Event correlation: tracking nested project and target builds
//! - Compiler selection: picking the authoritative compiler invocation
//! - Command lines: tokenizing and classifying `csc`, `vbc` and `fsc` arguments

pub mod command_line;
pub mod compiler;
pub mod event;
pub mod language;
pub mod processor;
pub mod result;
pub mod results;
pub mod source;
pub mod target_framework;
pub mod types;

pub use command_line::{CompilerArgument, UnparsableCommandLine};
pub use compiler::{CompilerCommand, CompilerInvocation, CompilerSelector};
pub use event::{BuildEvent, BuildEventContext, BuildEventKind, ItemGroup, TaskItem};
pub use language::{CompilerLanguage, UnknownLanguage};
pub use processor::{EventProcessor, ProcessorOptions, SessionOutcome, StructuralViolation};
pub use result::{AnalyzerResult, PropertyMap, ResultKey};
pub use results::AnalyzerResults;
pub use source::{AttachedProcessor, EventBus, EventSource, Handler, HandlerId};
pub use types::{BuildStatus, ProjectPath, ValidationError};
