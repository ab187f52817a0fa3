//! Line-oriented parser for Visual Studio `.sln` files.
//!
//! A solution file is a flat list of lines with four nested block kinds:
//!
//! ```text
//! Project("{type}") = "name", "path", "{id}"
//!     ProjectSection(ProjectDependencies) = postProject
//!         {id} = {id}
//!     EndProjectSection
//! EndProject
//! Global
//!     GlobalSection(SolutionConfigurationPlatforms) = preSolution
//!         Debug|x64 = Debug|x64
//!     EndGlobalSection
//! EndGlobal
//! ```
//!
//! [`SolutionParser`] keeps the open blocks on an explicit stack.  Each line
//! is whitespace-normalized and dispatched on the innermost open block.
//! Running out of input with blocks still open is not an error: parsing
//! stops and [`SolutionParser::finish`] reports the unterminated block.

use chumsky::prelude::*;

use crate::error::{Error, Result};
use crate::project::{Project, unbraced};
use crate::solution::{LoadWarning, ProjectConfigurationMapping, Solution};

const FORMAT_VERSION_PREFIX: &str = "Microsoft Visual Studio Solution File, Format Version";
const VS_VERSION_PREFIX: &str = "VisualStudioVersion";
const MIN_VS_VERSION_PREFIX: &str = "MinimumVisualStudioVersion";

// ═══════════════════════════════════════════════════════════════════════════════
//  Block stack
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of block a line can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Project,
    ProjectSection,
    Global,
    GlobalSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Project,
    ProjectSection(ProjectSectionKind),
    Global,
    GlobalSection(GlobalSectionKind),
}

impl Block {
    fn kind(self) -> BlockKind {
        match self {
            Self::Project => BlockKind::Project,
            Self::ProjectSection(_) => BlockKind::ProjectSection,
            Self::Global => BlockKind::Global,
            Self::GlobalSection(_) => BlockKind::GlobalSection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectSectionKind {
    Dependencies,
    Other,
}

impl ProjectSectionKind {
    fn of(header: &str) -> Self {
        if header.starts_with("ProjectSection(ProjectDependencies)") {
            Self::Dependencies
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalSectionKind {
    SolutionConfigurations,
    ProjectConfigurations,
    Other,
}

impl GlobalSectionKind {
    fn of(header: &str) -> Self {
        if header.starts_with("GlobalSection(SolutionConfigurationPlatforms)") {
            Self::SolutionConfigurations
        } else if header.starts_with("GlobalSection(ProjectConfigurationPlatforms)") {
            Self::ProjectConfigurations
        } else {
            Self::Other
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parser
// ═══════════════════════════════════════════════════════════════════════════════

/// Feeds `.sln` lines into a [`Solution`].
#[derive(Debug)]
pub struct SolutionParser<'s> {
    solution: &'s mut Solution,
    /// Open blocks with the line number that opened each.
    stack: Vec<(Block, usize)>,
    lines_seen: usize,
}

impl<'s> SolutionParser<'s> {
    pub fn new(solution: &'s mut Solution) -> Self {
        Self { solution, stack: Vec::new(), lines_seen: 0 }
    }

    /// Feed the next raw line.  The first line of a file is the header (or
    /// a lone BOM) and is always skipped.
    pub fn feed(&mut self, raw: &str) -> Result<()> {
        self.lines_seen += 1;
        let line_number = self.lines_seen;
        if line_number == 1 {
            return Ok(());
        }

        let line = simplified(raw);
        if line.is_empty() {
            return Ok(());
        }

        match self.stack.last().map(|(block, _)| *block) {
            None => self.top_level(line_number, &line)?,
            Some(Block::Project) => {
                if line == "EndProject" {
                    self.stack.pop();
                } else if line.starts_with("ProjectSection") {
                    let kind = ProjectSectionKind::of(&line);
                    self.stack.push((Block::ProjectSection(kind), line_number));
                }
            }
            Some(Block::ProjectSection(kind)) => {
                if line == "EndProjectSection" {
                    self.stack.pop();
                } else if kind == ProjectSectionKind::Dependencies {
                    self.dependency(line_number, &line)?;
                }
            }
            Some(Block::Global) => {
                if line == "EndGlobal" {
                    self.stack.pop();
                } else if line.starts_with("GlobalSection(") {
                    let kind = GlobalSectionKind::of(&line);
                    if kind == GlobalSectionKind::Other {
                        tracing::trace!(section = %line, "skipping global section");
                    }
                    self.stack.push((Block::GlobalSection(kind), line_number));
                }
            }
            Some(Block::GlobalSection(kind)) => {
                if line == "EndGlobalSection" {
                    self.stack.pop();
                } else {
                    match kind {
                        GlobalSectionKind::SolutionConfigurations => {
                            let (name, _) = split_assignment(line_number, &line)?;
                            self.solution.configurations.push(name.to_string());
                        }
                        GlobalSectionKind::ProjectConfigurations => {
                            let mapping = parse_configuration_mapping(line_number, &line)?;
                            self.solution.project_configuration_mappings.push(mapping);
                        }
                        GlobalSectionKind::Other => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// End of input.  Returns a warning for the outermost block still open,
    /// if any.
    pub fn finish(self) -> Option<LoadWarning> {
        let &(block, opened_at) = self.stack.first()?;
        tracing::warn!(block = ?block.kind(), opened_at, "solution file ended inside a block");
        Some(LoadWarning::UnterminatedBlock { block: block.kind(), opened_at })
    }

    fn top_level(&mut self, line_number: usize, line: &str) -> Result<()> {
        if let Some(version) = line.strip_prefix(FORMAT_VERSION_PREFIX) {
            self.solution.version = version.trim_start().to_string();
        } else if line.starts_with("Project(") {
            let project = parse_project_header(line_number, line)?;
            self.solution.projects.push(project);
            self.stack.push((Block::Project, line_number));
        } else if line.starts_with("Global") {
            self.stack.push((Block::Global, line_number));
        } else if line.starts_with(MIN_VS_VERSION_PREFIX) {
            if let Some(value) = version_value(line_number, line) {
                self.solution.minimum_visual_studio_version = Some(value);
            }
        } else if line.starts_with(VS_VERSION_PREFIX) {
            if let Some(value) = version_value(line_number, line) {
                self.solution.visual_studio_version = Some(value);
            }
        }
        Ok(())
    }

    fn dependency(&mut self, line_number: usize, line: &str) -> Result<()> {
        let (id, _) = split_assignment(line_number, line)?;
        // Only reachable with a Project block below us on the stack.
        if let Some(project) = self.solution.projects.last_mut() {
            project.dependencies.push(unbraced(id).to_string());
        }
        Ok(())
    }
}

/// Value of a top-level `VisualStudioVersion = …` line.  Without `=` the
/// line is ignored like any other unrecognized top-level line.
fn version_value(line_number: usize, line: &str) -> Option<String> {
    match split_assignment(line_number, line) {
        Ok((_, value)) => Some(value.to_string()),
        Err(_) => {
            tracing::trace!(line_number, line, "ignoring version line without value");
            None
        }
    }
}

/// Parse the text of a whole `.sln` file into `solution`.
///
/// Any unterminated block is recorded in `solution.warnings`.
pub fn parse_solution(text: &str, solution: &mut Solution) -> Result<()> {
    let mut parser = SolutionParser::new(solution);
    for line in text.lines() {
        parser.feed(line)?;
    }
    if let Some(warning) = parser.finish() {
        solution.warnings.push(warning);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Line grammars
// ═══════════════════════════════════════════════════════════════════════════════

/// Collapse whitespace runs to one space and trim both ends.
fn simplified(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `key = value` → `(key, value)`, both trimmed.
fn split_assignment<'l>(line_number: usize, line: &'l str) -> Result<(&'l str, &'l str)> {
    line.split_once('=')
        .map(|(key, value)| (key.trim_end(), value.trim_start()))
        .ok_or_else(|| Error::malformed(line_number, line, "expected `key = value`"))
}

/// `Project("{type}") = "name", "path", "{id}"`
fn project_header<'a>()
-> impl Parser<'a, &'a str, (&'a str, &'a str, &'a str, &'a str), extra::Err<Simple<'a, char>>> {
    let quoted = just('"')
        .ignore_then(none_of('"').repeated().to_slice())
        .then_ignore(just('"'));
    let comma = just(',').padded();

    just("Project(")
        .ignore_then(quoted.clone())
        .then_ignore(just(')'))
        .then_ignore(just('=').padded())
        .then(quoted.clone())
        .then_ignore(comma.clone())
        .then(quoted.clone())
        .then_ignore(comma)
        .then(quoted)
        .map(|(((type_id, name), path), id)| (type_id, name, path, id))
}

fn parse_project_header(line_number: usize, line: &str) -> Result<Project> {
    let (type_id, name, path, id) = project_header()
        .parse(line)
        .into_result()
        .map_err(|errs| {
            let messages: Vec<String> = errs.iter().map(|e| format!("{e}")).collect();
            Error::malformed(line_number, line, messages.join("; "))
        })?;

    Ok(Project {
        id: unbraced(id.trim()).to_string(),
        type_id: unbraced(type_id.trim()).to_string(),
        name: name.to_string(),
        filepath: path.trim().to_string(),
        ..Default::default()
    })
}

/// `{id}.Debug|x64.ActiveCfg = Debug|x64`
fn parse_configuration_mapping(line_number: usize, line: &str) -> Result<ProjectConfigurationMapping> {
    let (key, value) = split_assignment(line_number, line)?;
    let malformed = || Error::malformed(line_number, line, "expected `{id}.configuration.property`");

    let (id, rest) = key
        .strip_prefix('{')
        .and_then(|k| k.split_once("}."))
        .ok_or_else(malformed)?;

    // The property may itself contain dots (`Build.0`), so split at the
    // first dot after the platform separator.
    let search_from = rest.find('|').unwrap_or(0);
    let dot = rest[search_from..]
        .find('.')
        .map(|i| search_from + i)
        .ok_or_else(malformed)?;

    Ok(ProjectConfigurationMapping {
        project_id: id.to_string(),
        solution_configuration: rest[..dot].to_string(),
        property: rest[dot + 1..].to_string(),
        value: value.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
