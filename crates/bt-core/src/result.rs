//! Per-(project, target framework) analysis results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::command_line::{CompilerArgument, UnparsableCommandLine};
use crate::compiler::{CompilerCommand, CompilerInvocation, CompilerSelector};
use crate::event::{ItemGroup, TaskItem};
use crate::language::CompilerLanguage;
use crate::target_framework;
use crate::types::{BuildStatus, ProjectPath};

/// Item type naming referenced projects.
pub const PROJECT_REFERENCE_ITEM: &str = "ProjectReference";
/// Item type naming referenced packages.
pub const PACKAGE_REFERENCE_ITEM: &str = "PackageReference";
/// Property carrying the project's declared GUID.
pub const PROJECT_GUID_PROPERTY: &str = "ProjectGuid";

/// Identity of an [`AnalyzerResult`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResultKey {
    pub project_path: ProjectPath,
    /// Short moniker, `""` when the build did not name one.
    pub target_framework: String,
}

impl ResultKey {
    pub fn new(project_path: ProjectPath, target_framework: impl Into<String>) -> Self {
        Self {
            project_path,
            target_framework: target_framework.into(),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target_framework.is_empty() {
            write!(f, "{}", self.project_path)
        } else {
            write!(f, "{} ({})", self.project_path, self.target_framework)
        }
    }
}

/// Build properties with case-insensitive names. The last write wins,
/// including the spelling of the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: BTreeMap<String, (String, String)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Properties as `(name, value)`, ordered by lowercase name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for PropertyMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl Serialize for PropertyMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Everything learned about one build of one project for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzerResult {
    key: ResultKey,
    properties: PropertyMap,
    items: BTreeMap<String, ItemGroup>,
    succeeded: BuildStatus,
    compiler: CompilerSelector,
    errors: Vec<String>,
}

impl AnalyzerResult {
    pub fn new(key: ResultKey) -> Self {
        Self {
            key,
            properties: PropertyMap::new(),
            items: BTreeMap::new(),
            succeeded: BuildStatus::Unknown,
            compiler: CompilerSelector::default(),
            errors: Vec::new(),
        }
    }

    pub const fn key(&self) -> &ResultKey {
        &self.key
    }

    pub const fn project_path(&self) -> &ProjectPath {
        &self.key.project_path
    }

    pub const fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Case-insensitive property lookup.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    pub const fn items(&self) -> &BTreeMap<String, ItemGroup> {
        &self.items
    }

    /// Items of one type (ASCII case-insensitive); empty when the type never
    /// appeared.
    pub fn items_of(&self, item_type: &str) -> &[TaskItem] {
        self.items
            .get(item_type)
            .or_else(|| {
                self.items
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(item_type))
                    .map(|(_, group)| group)
            })
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub const fn succeeded(&self) -> BuildStatus {
        self.succeeded
    }

    /// Error messages raised while this result was being built.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The declared `ProjectGuid`, or a stable name-based UUID of the path.
    pub fn project_guid(&self) -> Uuid {
        self.property(PROJECT_GUID_PROPERTY)
            .and_then(|guid| Uuid::parse_str(guid.trim()).ok())
            .unwrap_or_else(|| {
                Uuid::new_v5(&Uuid::NAMESPACE_URL, self.project_path().as_str().as_bytes())
            })
    }

    /// The short target framework moniker reconciled from the properties.
    pub fn target_framework(&self) -> Option<String> {
        target_framework::resolve(|name| self.property(name))
    }

    pub const fn compiler_invocation(&self) -> Option<&CompilerInvocation> {
        self.compiler.selected()
    }

    pub fn compiler_command(&self) -> Option<&CompilerCommand> {
        self.compiler.command()
    }

    /// The raw text of the selected compiler invocation.
    pub fn command_line(&self) -> Option<&str> {
        self.compiler
            .selected()
            .map(|invocation| invocation.command_line.as_str())
    }

    pub fn compiler_error(&self) -> Option<&UnparsableCommandLine> {
        self.compiler.error()
    }

    pub fn compiler_arguments(&self) -> &[CompilerArgument] {
        self.compiler_command()
            .map(|command| command.arguments.as_slice())
            .unwrap_or_default()
    }

    /// Positional compiler arguments resolved against the project directory.
    pub fn source_files(&self) -> Vec<PathBuf> {
        self.compiler_command()
            .map(|command| {
                command
                    .positionals()
                    .map(|source| self.project_path().resolve(source))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn references(&self) -> Vec<String> {
        self.compiler_command()
            .map(|command| command.references().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn analyzer_references(&self) -> Vec<String> {
        self.compiler_command()
            .map(|command| command.analyzer_references().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Referenced project files, distinct and resolved against the project directory.
    pub fn project_references(&self) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        for item in self.items_of(PROJECT_REFERENCE_ITEM) {
            let path = self.project_path().resolve(&item.item_spec);
            if !seen.contains(&path) {
                seen.push(path);
            }
        }
        seen
    }

    /// Package references by name; a later item with the same name replaces
    /// an earlier one.
    pub fn package_references(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.items_of(PACKAGE_REFERENCE_ITEM)
            .iter()
            .map(|item| (item.item_spec.clone(), item.metadata.clone()))
            .collect()
    }

    /// Merges evaluated properties and items. Every item type present
    /// replaces the previous list of that type.
    pub(crate) fn merge_evaluation(
        &mut self,
        properties: &BTreeMap<String, String>,
        items: &BTreeMap<String, ItemGroup>,
    ) {
        self.properties.extend(
            properties
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        for (item_type, group) in items {
            self.items.retain(|name, _| !name.eq_ignore_ascii_case(item_type));
            self.items.insert(item_type.clone(), group.clone());
        }
    }

    pub(crate) fn offer_command_line(
        &mut self,
        command_line: &str,
        language: CompilerLanguage,
        in_core_compile: bool,
    ) -> bool {
        self.compiler.offer(command_line, language, in_core_compile)
    }

    pub(crate) const fn set_succeeded(&mut self, succeeded: BuildStatus) {
        self.succeeded = succeeded;
    }

    pub(crate) fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
