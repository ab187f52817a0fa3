use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

use crate::error::{Error, Result};
use crate::project::{Project, ProjectParser, load_project_with};
use crate::sln::{BlockKind, parse_solution};
use crate::variables::Variables;

// ═══════════════════════════════════════════════════════════════════════════════
//  Type definitions
// ═══════════════════════════════════════════════════════════════════════════════

/// A loaded `.sln` file and the projects it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    /// File stem of the `.sln`.
    pub name: String,
    pub filepath: PathBuf,
    /// Text after `Format Version`, e.g. `"12.00"`.
    pub version: String,
    pub visual_studio_version: Option<String>,
    pub minimum_visual_studio_version: Option<String>,
    /// `SolutionConfigurationPlatforms` entries, e.g. `"Debug|x64"`.
    pub configurations: Vec<String>,
    /// Projects in declaration order.
    pub projects: Vec<Project>,
    pub project_configuration_mappings: Vec<ProjectConfigurationMapping>,
    /// Problems that did not stop the load.
    pub warnings: Vec<LoadWarning>,
}

/// One `ProjectConfigurationPlatforms` line:
/// `{project_id}.{solution_configuration}.{property} = {value}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfigurationMapping {
    pub project_id: String,
    pub solution_configuration: String,
    /// `ActiveCfg`, `Build.0`, `Deploy.0`, …
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// The project file was missing, unreadable or not well-formed XML.
    /// The project keeps only what the `.sln` declared.
    ProjectParseFailure {
        project_id: String,
        path: PathBuf,
        message: String,
    },
    /// The `.sln` ended while the block opened at `opened_at` was still open.
    UnterminatedBlock { block: BlockKind, opened_at: usize },
}

impl Solution {
    /// Load a `.sln` file and every project it lists.
    ///
    /// Shorthand for `SolutionLoader::new().load(path)`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        SolutionLoader::new().load(path)
    }

    /// Parse `.sln` text without touching the filesystem.  Projects keep
    /// only their solution-file fields.
    pub fn parse(text: &str) -> Result<Self> {
        let mut solution = Self::default();
        parse_solution(text, &mut solution)?;
        Ok(solution)
    }

    /// Directory containing the `.sln` file.
    pub fn directory(&self) -> &Path {
        self.filepath.parent().unwrap_or(Path::new(""))
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// The projects `project` depends on, in declaration order of its
    /// dependency list.  Ids with no matching project are skipped.
    pub fn dependencies_of<'a>(&'a self, project: &'a Project) -> impl Iterator<Item = &'a Project> + 'a {
        project.dependencies.iter().filter_map(|id| self.project(id))
    }

    /// Absolute-ish path of a project file: the solution directory joined
    /// with the project's relative path.  Both `\` and `/` separate
    /// components.
    pub fn project_path(&self, project: &Project) -> PathBuf {
        resolve_relative(self.directory(), &project.filepath)
    }
}

/// Join a `.sln` project path onto `base`.  A path with a leading
/// separator or a drive prefix (`C:\\`) keeps its own root instead.
fn resolve_relative(base: &Path, relative: &str) -> PathBuf {
    let (root, rest) = match absolute_root(relative) {
        Some((root, rest)) => (root, rest),
        None => (base.to_path_buf(), relative),
    };
    rest.split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .fold(root, |path, part| path.join(part))
}

fn absolute_root(path: &str) -> Option<(PathBuf, &str)> {
    let is_separator = |c: char| c == '\\' || c == '/';

    if path.starts_with(is_separator) {
        return Some((PathBuf::from(MAIN_SEPARATOR_STR), &path[1..]));
    }

    let mut chars = path.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(drive), Some(':'), next) if drive.is_ascii_alphabetic() && next.is_none_or(is_separator) => {
            Some((PathBuf::from(format!("{drive}:{MAIN_SEPARATOR_STR}")), &path[2..]))
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  SolutionLoader – loading with custom variables
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for loading a [`Solution`] with extra `$(Var)` entries or with
/// variable expansion of project settings turned on.
///
/// # Example
/// ```no_run
/// use vcxproj_rs::SolutionLoader;
///
/// let solution = SolutionLoader::new()
///     .variable("VcpkgRoot", r"C:\vcpkg")
///     .expand_variables(true)
///     .load("Game.sln")
///     .unwrap();
/// for project in &solution.projects {
///     println!("{} {:?}", project.name, project.compile_list);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SolutionLoader {
    variables: Variables,
    expand_variables: bool,
    read_env: bool,
}

impl Default for SolutionLoader {
    fn default() -> Self {
        Self {
            variables: Variables::new(),
            expand_variables: false,
            read_env: true,
        }
    }
}

impl SolutionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a single variable.  `SolutionDir` is always overwritten with the
    /// solution directory at load time.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Merge a whole table.  Later calls override earlier values.
    pub fn variables(mut self, vars: Variables) -> Self {
        self.variables.extend(vars);
        self
    }

    /// Resolve `$(Var)` tokens in project settings while parsing.  Off by
    /// default: values are stored as written.
    pub fn expand_variables(mut self, expand: bool) -> Self {
        self.expand_variables = expand;
        self
    }

    /// Let expansion fall back to the process environment.  On by default.
    pub fn read_env(mut self, read_env: bool) -> Self {
        self.read_env = read_env;
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Solution> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        tracing::info!(path = %path.display(), "loading solution");

        let mut solution = Solution::parse(&text)?;
        solution.filepath = path.to_path_buf();
        solution.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let solution_dir = solution.directory().to_path_buf();
        let mut variables = self.variables.clone();
        variables.insert("SolutionDir".to_string(), solution_dir.to_string_lossy().into_owned());

        let parser = ProjectParser::new(&variables)
            .expand(self.expand_variables)
            .read_env(self.read_env);

        let mut failures = Vec::new();
        for project in solution.projects.iter_mut() {
            if project.is_solution_folder() {
                continue;
            }
            let project_path = resolve_relative(&solution_dir, &project.filepath);
            if let Err(err) = load_project_with(project, &project_path, parser) {
                tracing::warn!(
                    project = %project.name,
                    path = %project_path.display(),
                    error = %err,
                    "project file could not be parsed"
                );
                failures.push(LoadWarning::ProjectParseFailure {
                    project_id: project.id.clone(),
                    path: project_path,
                    message: err.to_string(),
                });
            }
        }
        solution.warnings.extend(failures);

        tracing::info!(
            solution = %solution.name,
            projects = solution.projects.len(),
            warnings = solution.warnings.len(),
            "solution loaded"
        );
        Ok(solution)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
