//! Event correlation state machine.
//!
//! Turns a nested build event stream into per-(project, target framework)
//! [`AnalyzerResult`]s.
//!
//! # Algorithm Summary
//!
//! 1. The first `ProjectStarted` fixes the set of tracked projects: a solution
//!    contributes its `ProjectReference` items, any other project tracks itself
//! 2. Every `ProjectStarted` pushes a result stack slot, every `ProjectFinished`
//!    pops one; only tracked projects with a resolvable framework get a result
//! 3. Targets are stacked per project so compiler invocations can be attributed
//!    to `CoreCompile`
//! 4. Compiler command lines go to the selector of the result on top of the stack

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::CORE_COMPILE_TARGET;
use crate::event::{BuildEvent, BuildEventKind, ItemGroup, TaskItem};
use crate::language::CompilerLanguage;
use crate::result::{AnalyzerResult, PROJECT_REFERENCE_ITEM, ResultKey};
use crate::results::AnalyzerResults;
use crate::target_framework;
use crate::types::{BuildStatus, ProjectPath, resolve_path};

/// Target a solution runs to build its projects.
pub const BUILD_TARGET: &str = "Build";
/// Output metadata naming the project a solution build output came from.
pub const SOURCE_PROJECT_METADATA: &str = "MSBuildSourceProjectFile";

/// Tunables for the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Extensions that mark a project file as a solution.
    pub solution_extensions: Vec<String>,

    /// Target whose compiler invocations are authoritative.
    pub core_compile_target: String,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            solution_extensions: vec!["sln".to_string(), "slnx".to_string(), "slnf".to_string()],
            core_compile_target: CORE_COMPILE_TARGET.to_string(),
        }
    }
}

/// The event stream broke its own nesting rules.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum StructuralViolation {
    #[error("target `{target}` finished in {project} with no target running")]
    EmptyTargetStack { project: String, target: String },

    #[error("target `{finished}` finished in {project} while `{running}` was running")]
    TargetMismatch {
        project: String,
        running: String,
        finished: String,
    },

    #[error("project {project} finished with no project running")]
    EmptyResultStack { project: String },
}

/// One entry per running project build.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StackSlot {
    Tracked(ResultKey),
    Untracked,
}

/// Properties and items of one evaluation.
#[derive(Debug, Clone, Default)]
struct Evaluation {
    properties: BTreeMap<String, String>,
    items: BTreeMap<String, ItemGroup>,
}

/// What a finished session produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    /// Results grouped by project.
    pub projects: BTreeMap<ProjectPath, AnalyzerResults>,

    /// Success reported by `BuildFinished`, unknown if it never arrived.
    pub overall_success: BuildStatus,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// The violation that stopped processing, if any.
    pub violation: Option<StructuralViolation>,
}

/// Consumes build events for one session.
#[derive(Debug, Clone)]
pub struct EventProcessor {
    options: ProcessorOptions,
    /// `None` until the first `ProjectStarted` in replay mode.
    tracked: Option<HashSet<ProjectPath>>,
    /// Solution root waiting for its `ProjectStarted`.
    pending_solution: Option<ProjectPath>,
    result_stack: Vec<StackSlot>,
    target_stacks: HashMap<String, Vec<String>>,
    frameworks: HashMap<ProjectPath, String>,
    evaluations: HashMap<i32, Evaluation>,
    results: BTreeMap<ResultKey, AnalyzerResult>,
    build_success: BuildStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    violation: Option<StructuralViolation>,
}

impl EventProcessor {
    /// A processor that learns what to track from the first project it sees.
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            options,
            tracked: None,
            pending_solution: None,
            result_stack: Vec::new(),
            target_stacks: HashMap::new(),
            frameworks: HashMap::new(),
            evaluations: HashMap::new(),
            results: BTreeMap::new(),
            build_success: BuildStatus::Unknown,
            started_at: None,
            finished_at: None,
            violation: None,
        }
    }

    /// A processor that only tracks `root`.
    ///
    /// A solution root is never a result itself: its `ProjectReference` items
    /// become the tracked set once it starts.
    pub fn with_root(root: ProjectPath, options: ProcessorOptions) -> Self {
        let mut processor = Self::new(options);
        if root.has_extension(&processor.options.solution_extensions) {
            processor.pending_solution = Some(root);
        } else {
            processor.tracked = Some(HashSet::from([root]));
        }
        processor
    }

    pub const fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Applies one event.
    ///
    /// Once a [`StructuralViolation`] has been returned every later event is
    /// ignored; results captured before it stay available.
    pub fn process(&mut self, event: &BuildEvent) -> Result<(), StructuralViolation> {
        if self.violation.is_some() {
            tracing::trace!("session aborted, ignoring event");
            return Ok(());
        }

        let outcome = self.dispatch(event);
        if let Err(violation) = &outcome {
            tracing::warn!(error = %violation, "structural violation, ignoring rest of session");
            self.violation = Some(violation.clone());
        }
        outcome
    }

    fn dispatch(&mut self, event: &BuildEvent) -> Result<(), StructuralViolation> {
        match &event.kind {
            BuildEventKind::BuildStarted => {
                self.started_at = event.timestamp;
                tracing::debug!("build started");
            }
            BuildEventKind::BuildFinished { success } => {
                self.build_success = BuildStatus::from_success(*success);
                self.finished_at = event.timestamp;
                tracing::debug!(success, "build finished");
            }
            BuildEventKind::EvaluationFinished {
                project_path,
                properties,
                items,
            } => match event.context.evaluation() {
                Some(id) => {
                    tracing::trace!(evaluation_id = id, project = %project_path, "evaluation stored");
                    self.evaluations.insert(
                        id,
                        Evaluation {
                            properties: properties.clone(),
                            items: items.clone(),
                        },
                    );
                }
                None => tracing::trace!(project = %project_path, "evaluation without id ignored"),
            },
            BuildEventKind::ProjectStarted {
                project_path,
                properties,
                items,
            } => self.project_started(event, project_path, properties, items),
            BuildEventKind::ProjectFinished {
                project_path,
                success,
            } => self.project_finished(project_path, *success)?,
            BuildEventKind::TargetStarted {
                project_path,
                target_name,
            } => {
                self.target_stacks
                    .entry(stack_key(project_path))
                    .or_default()
                    .push(target_name.clone());
            }
            BuildEventKind::TargetFinished {
                project_path,
                target_name,
                outputs,
            } => self.target_finished(project_path, target_name, outputs)?,
            BuildEventKind::TaskCommandLine {
                project_path,
                task_name,
                command_line,
            } => self.task_command_line(project_path, task_name, command_line),
            BuildEventKind::Error { message } => {
                tracing::warn!(%message, "build error");
                if let Some(result) = self.current_result_mut() {
                    result.push_error(message.clone());
                }
            }
        }
        Ok(())
    }

    fn project_started(
        &mut self,
        event: &BuildEvent,
        raw_path: &str,
        properties: &BTreeMap<String, String>,
        items: &BTreeMap<String, ItemGroup>,
    ) {
        let slot = self.track_project(event, raw_path, properties, items);
        tracing::debug!(project = raw_path, tracked = matches!(slot, StackSlot::Tracked(_)), "project started");
        self.result_stack.push(slot);
    }

    fn track_project(
        &mut self,
        event: &BuildEvent,
        raw_path: &str,
        properties: &BTreeMap<String, String>,
        items: &BTreeMap<String, ItemGroup>,
    ) -> StackSlot {
        let path = match ProjectPath::new(raw_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::trace!(error = %e, "project without usable path");
                return StackSlot::Untracked;
            }
        };

        if self.tracked.is_none() {
            if self.pending_solution.as_ref().is_some_and(|root| *root != path) {
                tracing::trace!(project = %path, "waiting for solution root");
                return StackSlot::Untracked;
            }
            if path.has_extension(&self.options.solution_extensions) {
                let projects = solution_projects(&path, items);
                tracing::debug!(solution = %path, projects = projects.len(), "tracking solution projects");
                self.tracked = Some(projects);
                self.pending_solution = None;
                return StackSlot::Untracked;
            }
        }
        let tracked = self
            .tracked
            .get_or_insert_with(|| HashSet::from([path.clone()]));
        if !tracked.contains(&path) {
            tracing::trace!(project = %path, "project not tracked");
            return StackSlot::Untracked;
        }

        // A project started without properties reuses its evaluation
        let evaluation = if properties.is_empty() {
            event
                .context
                .evaluation()
                .and_then(|id| self.evaluations.get(&id))
                .cloned()
        } else {
            None
        };
        let (properties, items) = evaluation
            .as_ref()
            .map_or((properties, items), |e| (&e.properties, &e.items));

        let resolved = target_framework::resolve(|name| lookup(properties, name));
        let multi_targeting = lookup(properties, target_framework::TARGET_FRAMEWORKS)
            .is_some_and(|value| !value.trim().is_empty());
        let target_framework = match resolved {
            Some(tfm) => {
                self.frameworks.insert(path.clone(), tfm.clone());
                tfm
            }
            // Outer multi-targeting build: only its inner builds produce results
            None if multi_targeting => {
                tracing::trace!(project = %path, "outer multi-targeting build");
                return StackSlot::Untracked;
            }
            None => match self.frameworks.get(&path) {
                Some(cached) => cached.clone(),
                // Properties without any framework information: a legacy single-target project
                None if !properties.is_empty() => String::new(),
                None => {
                    tracing::trace!(project = %path, "target framework unresolved");
                    return StackSlot::Untracked;
                }
            },
        };

        let key = ResultKey::new(path, target_framework);
        self.results
            .entry(key.clone())
            .or_insert_with(|| AnalyzerResult::new(key.clone()))
            .merge_evaluation(properties, items);
        StackSlot::Tracked(key)
    }

    fn project_finished(&mut self, project_path: &str, success: bool) -> Result<(), StructuralViolation> {
        let slot = self
            .result_stack
            .pop()
            .ok_or_else(|| StructuralViolation::EmptyResultStack {
                project: project_path.to_string(),
            })?;
        if let StackSlot::Tracked(key) = slot {
            if let Some(result) = self.results.get_mut(&key) {
                result.set_succeeded(BuildStatus::from_success(success));
            }
            tracing::debug!(result = %key, success, "result finished");
        }
        Ok(())
    }

    fn target_finished(
        &mut self,
        project_path: &str,
        target_name: &str,
        outputs: &[TaskItem],
    ) -> Result<(), StructuralViolation> {
        let stack = self.target_stacks.entry(stack_key(project_path)).or_default();
        match stack.last().cloned() {
            None => {
                return Err(StructuralViolation::EmptyTargetStack {
                    project: project_path.to_string(),
                    target: target_name.to_string(),
                });
            }
            Some(running) if !running.eq_ignore_ascii_case(target_name) => {
                return Err(StructuralViolation::TargetMismatch {
                    project: project_path.to_string(),
                    running,
                    finished: target_name.to_string(),
                });
            }
            Some(_) => {
                stack.pop();
            }
        }

        if target_name.eq_ignore_ascii_case(BUILD_TARGET) {
            if let Ok(solution) = ProjectPath::new(project_path) {
                if solution.has_extension(&self.options.solution_extensions) {
                    self.cache_solution_outputs(&solution, outputs);
                }
            }
        }
        Ok(())
    }

    /// Solution build outputs name the framework of each project ahead of
    /// that project's own `ProjectStarted`.
    fn cache_solution_outputs(&mut self, solution: &ProjectPath, outputs: &[TaskItem]) {
        for output in outputs {
            let (Some(identifier), Some(version)) = (
                output.metadata_value(target_framework::TARGET_FRAMEWORK_IDENTIFIER),
                output.metadata_value(target_framework::TARGET_FRAMEWORK_VERSION),
            ) else {
                continue;
            };
            let Some(tfm) = target_framework::from_identifier_and_version(identifier, version)
            else {
                continue;
            };
            let source = output
                .metadata_value(SOURCE_PROJECT_METADATA)
                .unwrap_or(&output.item_spec);
            let resolved = resolve_path(solution.directory(), source);
            if let Ok(project) = ProjectPath::new(resolved.to_string_lossy()) {
                tracing::trace!(project = %project, %tfm, "framework cached from solution output");
                self.frameworks.insert(project, tfm);
            }
        }
    }

    fn task_command_line(&mut self, project_path: &str, task_name: &str, command_line: &str) {
        let Some(language) = CompilerLanguage::from_task_name(task_name) else {
            return;
        };
        let in_core_compile = self
            .target_stacks
            .get(&stack_key(project_path))
            .is_some_and(|stack| {
                stack
                    .iter()
                    .any(|target| target.eq_ignore_ascii_case(&self.options.core_compile_target))
            });

        let Some(result) = self.current_result_mut() else {
            tracing::trace!(task = task_name, "compiler invocation outside tracked project");
            return;
        };
        if result.offer_command_line(command_line, language, in_core_compile) {
            tracing::debug!(result = %result.key(), %language, in_core_compile, "compiler invocation selected");
        }
    }

    fn current_result_mut(&mut self) -> Option<&mut AnalyzerResult> {
        match self.result_stack.last()? {
            StackSlot::Tracked(key) => self.results.get_mut(key),
            StackSlot::Untracked => None,
        }
    }

    /// Snapshot of every result captured so far.
    pub fn results(&self) -> Vec<AnalyzerResult> {
        self.results.values().cloned().collect()
    }

    /// Snapshot of the results for one project.
    pub fn results_for(&self, project: &ProjectPath) -> AnalyzerResults {
        let mut results = AnalyzerResults::new();
        results.merge(
            self.results
                .values()
                .filter(|result| result.project_path() == project)
                .cloned(),
            self.build_success,
        );
        results
    }

    /// Projects currently tracked, sorted.
    pub fn tracked_projects(&self) -> Vec<ProjectPath> {
        let mut projects: Vec<_> = self
            .tracked
            .iter()
            .flatten()
            .cloned()
            .collect();
        projects.sort();
        projects
    }

    pub const fn violation(&self) -> Option<&StructuralViolation> {
        self.violation.as_ref()
    }

    pub const fn build_success(&self) -> BuildStatus {
        self.build_success
    }

    /// Consumes the processor into its session outcome.
    pub fn finish(self) -> SessionOutcome {
        if !self.result_stack.is_empty() {
            tracing::debug!(open = self.result_stack.len(), "session ended with projects still running");
        }

        let mut grouped: BTreeMap<ProjectPath, Vec<AnalyzerResult>> = BTreeMap::new();
        for (key, result) in self.results {
            grouped.entry(key.project_path).or_default().push(result);
        }
        let projects = grouped
            .into_iter()
            .map(|(path, batch)| {
                let mut results = AnalyzerResults::new();
                results.merge(batch, self.build_success);
                (path, results)
            })
            .collect();

        SessionOutcome {
            projects,
            overall_success: self.build_success,
            started_at: self.started_at,
            finished_at: self.finished_at,
            violation: self.violation,
        }
    }
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

/// `ProjectReference` items of a solution, resolved against its directory.
fn solution_projects(
    solution: &ProjectPath,
    items: &BTreeMap<String, ItemGroup>,
) -> HashSet<ProjectPath> {
    items
        .iter()
        .filter(|(item_type, _)| item_type.eq_ignore_ascii_case(PROJECT_REFERENCE_ITEM))
        .flat_map(|(_, group)| group)
        .filter_map(|item| {
            let resolved = resolve_path(solution.directory(), &item.item_spec);
            ProjectPath::new(resolved.to_string_lossy()).ok()
        })
        .collect()
}

fn stack_key(project_path: &str) -> String {
    ProjectPath::new(project_path).map_or_else(|_| project_path.to_string(), String::from)
}

fn lookup<'a>(properties: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    properties
        .get(name)
        .or_else(|| {
            properties
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BuildEventContext;

    const APP: &str = "/src/app/app.csproj";
    const LIB: &str = "/src/lib/lib.csproj";
    const SLN: &str = "/src/all.sln";
    const CSC: &str = "csc.exe /noconfig /reference:/ref/System.dll Program.cs";
    const PREFLIGHT: &str = "csc.exe /nologo preflight.cs";

    fn path(raw: &str) -> ProjectPath {
        ProjectPath::new(raw).unwrap()
    }

    fn started(project: &str, tfm: &str) -> BuildEvent {
        BuildEvent::project_started(project, &[("TargetFramework", tfm)], BTreeMap::new())
    }

    fn run(processor: &mut EventProcessor, events: &[BuildEvent]) {
        for event in events {
            processor.process(event).unwrap();
        }
    }

    fn compile(project: &str, command_line: &str) -> Vec<BuildEvent> {
        vec![
            BuildEvent::target_started(project, "CoreCompile"),
            BuildEvent::task_command_line(project, "Csc", command_line),
            BuildEvent::target_finished(project, "CoreCompile", Vec::new()),
        ]
    }

    #[test]
    fn single_project_produces_result_per_framework() {
        let mut processor = EventProcessor::default();
        let mut events = vec![BuildEvent::build_started(), started(APP, "net8.0")];
        events.extend(compile(APP, CSC));
        events.push(BuildEvent::project_finished(APP, true));
        events.push(started(APP, "net48"));
        events.push(BuildEvent::project_finished(APP, false));
        events.push(BuildEvent::build_finished(false));
        run(&mut processor, &events);

        let outcome = processor.finish();
        let results = &outcome.projects[&path(APP)];
        assert_eq!(
            results.target_frameworks().collect::<Vec<_>>(),
            vec!["net48", "net8.0"]
        );
        let net8 = results.get("net8.0").unwrap();
        assert_eq!(net8.succeeded(), BuildStatus::Succeeded);
        assert_eq!(net8.references(), vec!["/ref/System.dll"]);
        assert_eq!(results.get("net48").unwrap().succeeded(), BuildStatus::Failed);
        assert_eq!(outcome.overall_success, BuildStatus::Failed);
        assert_eq!(results.overall_success(), BuildStatus::Failed);
        assert!(outcome.violation.is_none());
    }

    #[test]
    fn core_compile_invocation_wins_over_preflight_in_either_order() {
        for preflight_first in [true, false] {
            let mut processor = EventProcessor::default();
            let preflight = BuildEvent::task_command_line(APP, "Csc", PREFLIGHT);
            let mut events = vec![started(APP, "net8.0")];
            if preflight_first {
                events.push(preflight.clone());
            }
            events.extend(compile(APP, CSC));
            if !preflight_first {
                events.push(preflight);
            }
            events.push(BuildEvent::project_finished(APP, true));
            run(&mut processor, &events);

            let results = processor.results();
            assert_eq!(results[0].command_line(), Some(CSC), "preflight_first={preflight_first}");
        }
    }

    #[test]
    fn unknown_tasks_and_untracked_projects_do_not_select() {
        let mut processor = EventProcessor::with_root(path(APP), ProcessorOptions::default());
        run(
            &mut processor,
            &[
                started(APP, "net8.0"),
                BuildEvent::task_command_line(APP, "Exec", "csc.exe other.cs"),
                started(LIB, "net8.0"),
                BuildEvent::task_command_line(LIB, "Csc", "csc.exe lib.cs"),
                BuildEvent::project_finished(LIB, true),
                BuildEvent::project_finished(APP, true),
            ],
        );

        let results = processor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].project_path(), &path(APP));
        assert_eq!(results[0].command_line(), None);
    }

    #[test]
    fn mismatched_target_finish_is_structural_violation() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                started(APP, "net8.0"),
                BuildEvent::target_started(APP, "CoreCompile"),
            ],
        );

        let err = processor
            .process(&BuildEvent::target_finished(APP, "Build", Vec::new()))
            .unwrap_err();
        assert_eq!(
            err,
            StructuralViolation::TargetMismatch {
                project: APP.to_string(),
                running: "CoreCompile".to_string(),
                finished: "Build".to_string(),
            }
        );
        assert_eq!(processor.violation(), Some(&err));
    }

    #[test]
    fn violation_stops_processing_but_keeps_results() {
        let mut processor = EventProcessor::default();
        run(&mut processor, &[started(APP, "net8.0")]);
        assert!(matches!(
            processor.process(&BuildEvent::target_finished(APP, "Build", Vec::new())),
            Err(StructuralViolation::EmptyTargetStack { .. })
        ));

        processor
            .process(&BuildEvent::project_finished(APP, true))
            .unwrap();
        processor.process(&BuildEvent::build_finished(true)).unwrap();

        assert_eq!(processor.results().len(), 1);
        assert_eq!(processor.results()[0].succeeded(), BuildStatus::Unknown);
        assert_eq!(processor.build_success(), BuildStatus::Unknown);
    }

    #[test]
    fn unbalanced_project_finish_is_structural_violation() {
        let mut processor = EventProcessor::default();
        assert_eq!(
            processor.process(&BuildEvent::project_finished(APP, true)),
            Err(StructuralViolation::EmptyResultStack {
                project: APP.to_string()
            })
        );
    }

    #[test]
    fn solution_root_tracks_referenced_projects_only() {
        let mut processor = EventProcessor::default();
        let solution_items = BTreeMap::from([(
            PROJECT_REFERENCE_ITEM.to_string(),
            vec![TaskItem::new("app/app.csproj")],
        )]);
        run(
            &mut processor,
            &[
                BuildEvent::project_started(SLN, &[], solution_items),
                started(APP, "net8.0"),
                started(LIB, "net8.0"),
                BuildEvent::project_finished(LIB, true),
                BuildEvent::project_finished(APP, true),
                BuildEvent::project_finished(SLN, true),
            ],
        );

        assert_eq!(processor.tracked_projects(), vec![path(APP)]);
        let results = processor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].project_path(), &path(APP));
        assert_eq!(results[0].succeeded(), BuildStatus::Succeeded);
    }

    #[test]
    fn explicit_solution_root_harvests_its_references() {
        let mut processor = EventProcessor::with_root(path(SLN), ProcessorOptions::default());
        let solution_items = BTreeMap::from([(
            PROJECT_REFERENCE_ITEM.to_string(),
            vec![TaskItem::new("app/app.csproj")],
        )]);
        run(
            &mut processor,
            &[
                // builds before the solution starts are incidental
                started(LIB, "net8.0"),
                BuildEvent::project_finished(LIB, true),
                BuildEvent::project_started(SLN, &[], solution_items),
                started(APP, "net8.0"),
                BuildEvent::project_finished(APP, true),
                BuildEvent::project_finished(SLN, true),
            ],
        );

        assert_eq!(processor.tracked_projects(), vec![path(APP)]);
        let results = processor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key(), &ResultKey::new(path(APP), "net8.0"));
    }

    #[test]
    fn outer_multi_targeting_build_is_not_a_result() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                BuildEvent::project_started(
                    APP,
                    &[("TargetFrameworks", "net8.0;net48"), ("OutputType", "Exe")],
                    BTreeMap::new(),
                ),
                BuildEvent::task_command_line(APP, "Csc", PREFLIGHT),
                started(APP, "net8.0"),
                BuildEvent::project_finished(APP, true),
                started(APP, "net48"),
                BuildEvent::project_finished(APP, true),
                BuildEvent::project_finished(APP, true),
                // a second outer pass does not fall back to the cached framework
                BuildEvent::project_started(APP, &[("TargetFrameworks", "net8.0;net48")], BTreeMap::new()),
                BuildEvent::project_finished(APP, true),
            ],
        );

        let results = processor.results_for(&path(APP));
        assert_eq!(
            results.target_frameworks().collect::<Vec<_>>(),
            vec!["net48", "net8.0"]
        );
        assert!(results.iter().all(|result| result.property("OutputType").is_none()));
        assert!(results.iter().all(|result| result.command_line().is_none()));
    }

    #[cfg(not(windows))]
    #[test]
    fn windows_paths_keep_their_drive_on_any_host() {
        let mut processor = EventProcessor::default();
        let mut events = vec![started(r"C:\src\app\app.csproj", "net8.0")];
        events.extend(compile(
            r"C:\src\app\app.csproj",
            r"C:\sdk\csc.exe C:\src\app\obj\Gen.cs Program.cs",
        ));
        events.push(BuildEvent::project_finished(r"C:\src\app\app.csproj", true));
        run(&mut processor, &events);

        let results = processor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].project_path().as_str(), "C:/src/app/app.csproj");
        assert_eq!(
            results[0].source_files(),
            vec![
                std::path::PathBuf::from("C:/src/app/obj/Gen.cs"),
                std::path::PathBuf::from("C:/src/app/Program.cs"),
            ]
        );
        assert!(results[0].compiler_invocation().is_some_and(|i| i.in_core_compile));
    }

    #[test]
    fn solution_build_outputs_cache_project_frameworks() {
        let mut processor = EventProcessor::default();
        let solution_items = BTreeMap::from([(
            PROJECT_REFERENCE_ITEM.to_string(),
            vec![TaskItem::new("app/app.csproj")],
        )]);
        let output = TaskItem::new("/src/app/bin/app.dll")
            .with_metadata("TargetFrameworkIdentifier", ".NETCoreApp")
            .with_metadata("TargetFrameworkVersion", "v8.0")
            .with_metadata(SOURCE_PROJECT_METADATA, "app/app.csproj");
        run(
            &mut processor,
            &[
                BuildEvent::project_started(SLN, &[], solution_items),
                BuildEvent::target_started(SLN, "Build"),
                BuildEvent::target_finished(SLN, "Build", vec![output]),
                BuildEvent::project_started(APP, &[("Configuration", "Debug")], BTreeMap::new()),
                BuildEvent::project_finished(APP, true),
                // later instance with no properties at all reuses the cache
                BuildEvent::project_started(APP, &[], BTreeMap::new()),
                BuildEvent::project_finished(APP, true),
                BuildEvent::project_finished(SLN, true),
            ],
        );

        let results = processor.results_for(&path(APP));
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.get("net8.0").unwrap().property("configuration"),
            Some("Debug")
        );
    }

    #[test]
    fn project_without_properties_or_cache_is_untracked() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                BuildEvent::project_started(APP, &[], BTreeMap::new()),
                BuildEvent::task_command_line(APP, "Csc", CSC),
                BuildEvent::project_finished(APP, true),
            ],
        );
        assert!(processor.results().is_empty());
    }

    #[test]
    fn legacy_project_without_framework_gets_empty_key() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                BuildEvent::project_started(APP, &[("OutputType", "Exe")], BTreeMap::new()),
                BuildEvent::project_finished(APP, true),
            ],
        );
        let results = processor.results_for(&path(APP));
        assert_eq!(results.target_frameworks().collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn evaluation_supplies_properties_for_bare_project_started() {
        let mut processor = EventProcessor::default();
        let context = BuildEventContext {
            evaluation_id: 3,
            ..BuildEventContext::default()
        };
        let evaluation = BuildEvent::new(BuildEventKind::EvaluationFinished {
            project_path: APP.to_string(),
            properties: BTreeMap::from([
                ("TargetFrameworkIdentifier".to_string(), ".NETStandard".to_string()),
                ("TargetFrameworkVersion".to_string(), "v2.0".to_string()),
            ]),
            items: BTreeMap::from([("Compile".to_string(), vec![TaskItem::new("a.cs")])]),
        })
        .with_context(context);
        run(
            &mut processor,
            &[
                evaluation,
                BuildEvent::project_started(APP, &[], BTreeMap::new()).with_context(context),
                BuildEvent::project_finished(APP, true),
            ],
        );

        let results = processor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key().target_framework, "netstandard2.0");
        assert_eq!(results[0].items_of("Compile").len(), 1);
    }

    #[test]
    fn errors_attach_to_current_tracked_result() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                BuildEvent::error("before any project"),
                started(APP, "net8.0"),
                BuildEvent::error("CS1002: ; expected"),
                BuildEvent::project_finished(APP, false),
            ],
        );
        assert_eq!(processor.results()[0].errors(), &["CS1002: ; expected".to_string()]);
    }

    #[test]
    fn session_timestamps_are_recorded() {
        let start = "2026-01-05T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = "2026-01-05T10:00:42Z".parse::<DateTime<Utc>>().unwrap();
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                BuildEvent::build_started().with_timestamp(start),
                BuildEvent::build_finished(true).with_timestamp(end),
            ],
        );
        let outcome = processor.finish();
        assert_eq!(outcome.started_at, Some(start));
        assert_eq!(outcome.finished_at, Some(end));
        assert_eq!(outcome.overall_success, BuildStatus::Succeeded);
        assert!(outcome.projects.is_empty());
    }

    #[test]
    fn target_names_match_case_insensitively() {
        let mut processor = EventProcessor::default();
        run(
            &mut processor,
            &[
                started(APP, "net8.0"),
                BuildEvent::target_started(APP, "coreCompile"),
                BuildEvent::task_command_line(APP, "csc", CSC),
                BuildEvent::target_finished(APP, "CoreCompile", Vec::new()),
                BuildEvent::project_finished(APP, true),
            ],
        );
        let invocation = processor.results()[0].compiler_invocation().cloned().unwrap();
        assert!(invocation.in_core_compile);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ProcessorOptions =
            serde_json::from_str(r#"{"core_compile_target":"Compile"}"#).unwrap();
        assert_eq!(options.core_compile_target, "Compile");
        assert_eq!(options.solution_extensions, vec!["sln", "slnx", "slnf"]);
    }
}
