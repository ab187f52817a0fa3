use std::path::Path;

use crate::condition;
use crate::error::{Error, Result};
use crate::variables::{self, Variables};

// ═══════════════════════════════════════════════════════════════════════════════
//  Type definitions
// ═══════════════════════════════════════════════════════════════════════════════

/// Project-type GUID Visual Studio uses for solution folders.
pub const SOLUTION_FOLDER_TYPE_ID: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

// ─── Project ─────────────────────────────────────────────────────────────────

/// One project of a solution.
///
/// `id`, `type_id`, `name`, `filepath` and `dependencies` come from the
/// `.sln` file.  Everything else is filled in from the `.vcxproj` file and
/// stays empty when that file could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    /// Project GUID, braces stripped.
    pub id: String,
    /// Project-type GUID from `Project("{…}")`, braces stripped.
    pub type_id: String,
    pub name: String,
    /// Path relative to the solution directory, exactly as written in the `.sln`.
    pub filepath: String,
    /// Ids of projects this one depends on.  May name projects declared later.
    pub dependencies: Vec<String>,
    pub project_configurations: Vec<ProjectConfiguration>,
    pub compile_list: Vec<String>,
    pub include_list: Vec<String>,
    pub item_definition_groups: Vec<ItemDefinitionGroup>,
    /// `<ProjectReference Include="…">` paths.
    pub project_references: Vec<String>,
    pub globals: ProjectGlobals,
}

impl Project {
    pub fn is_solution_folder(&self) -> bool {
        self.type_id.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE_ID)
    }

    /// The item definition groups whose `Condition` holds for `config`, in
    /// document order.
    pub fn item_definition_groups_for<'a>(
        &'a self,
        config: &'a ProjectConfiguration,
    ) -> impl Iterator<Item = &'a ItemDefinitionGroup> + 'a {
        self.item_definition_groups
            .iter()
            .filter(move |group| condition::holds_for(&group.condition, config))
    }
}

// ─── ProjectConfiguration ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    Win32,
    X64,
    #[default]
    Unknown,
}

impl Platform {
    /// Map `<Platform>` text.  Only the exact spellings `Win32` and `x64`
    /// are recognised.
    pub fn from_text(text: &str) -> Self {
        match text {
            "Win32" => Self::Win32,
            "x64" => Self::X64,
            _ => Self::Unknown,
        }
    }
}

/// A `<ProjectConfiguration>` item, e.g. `Include="Debug|x64"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfiguration {
    pub name: String,
    pub configuration: String,
    /// `<Platform>` text as written.
    pub platform_str: String,
    pub platform: Platform,
}

// ─── ItemDefinitionGroup ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CppStandard {
    Cpp14,
    Cpp17,
    Cpp20,
    #[default]
    CppLatest,
}

impl CppStandard {
    /// Map `<LanguageStandard>` text.  Returns `None` for anything other
    /// than the four `stdcpp*` spellings.
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "stdcpp14" => Some(Self::Cpp14),
            "stdcpp17" => Some(Self::Cpp17),
            "stdcpp20" => Some(Self::Cpp20),
            "stdcpplatest" => Some(Self::CppLatest),
            _ => None,
        }
    }
}

/// Compiler settings from one `<ItemDefinitionGroup>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDefinitionGroup {
    /// `Condition` attribute, empty when absent.
    pub condition: String,
    pub preprocessor_definitions: String,
    /// Every `<AdditionalIncludeDirectories>` in the group, concatenated.
    pub additional_include_directories: String,
    pub cppstd: CppStandard,
}

// ─── Globals ─────────────────────────────────────────────────────────────────

/// `<PropertyGroup Label="Globals">` values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectGlobals {
    /// Braces stripped.
    pub project_guid: Option<String>,
    pub root_namespace: Option<String>,
    pub keyword: Option<String>,
    pub windows_target_platform_version: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parsing – roxmltree → Project
// ═══════════════════════════════════════════════════════════════════════════════

/// Walks a `.vcxproj` element tree into a [`Project`].
///
/// Unknown elements are skipped, as are elements missing the attribute or
/// text a field needs.  Values are stored as written unless
/// [`expand`](Self::expand) is enabled, in which case `$(Name)` tokens are
/// resolved through [`variables::evaluate`] wherever possible.
#[derive(Debug, Clone, Copy)]
pub struct ProjectParser<'v> {
    variables: &'v Variables,
    expand: bool,
    read_env: bool,
}

impl<'v> ProjectParser<'v> {
    pub fn new(variables: &'v Variables) -> Self {
        Self { variables, expand: false, read_env: true }
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn read_env(mut self, read_env: bool) -> Self {
        self.read_env = read_env;
        self
    }

    fn value(&self, raw: &str) -> String {
        if self.expand {
            variables::evaluate_or_raw(raw, self.variables, self.read_env)
        } else {
            raw.to_string()
        }
    }

    /// Fill `project` from the children of `root` (the `<Project>` element).
    pub fn parse(&self, root: roxmltree::Node, project: &mut Project) {
        for child in elements(root) {
            match ProjectElement::of(&child) {
                ProjectElement::ConfigurationItems => {
                    project
                        .project_configurations
                        .extend(elements(child).filter_map(parse_project_configuration));
                }
                ProjectElement::Items => self.parse_items(child, project),
                ProjectElement::ItemDefinitions => {
                    let group = self.parse_item_definition_group(child);
                    project.item_definition_groups.push(group);
                }
                ProjectElement::Globals => parse_globals(child, &mut project.globals),
                ProjectElement::Other => {}
            }
        }
    }

    fn parse_items(&self, node: roxmltree::Node, project: &mut Project) {
        for item in elements(node) {
            let list = match item.tag_name().name() {
                "ClCompile" => &mut project.compile_list,
                "ClInclude" => &mut project.include_list,
                "ProjectReference" => &mut project.project_references,
                _ => continue,
            };
            if let Some(include) = item.attribute("Include") {
                list.push(self.value(include));
            }
        }
    }

    fn parse_item_definition_group(&self, node: roxmltree::Node) -> ItemDefinitionGroup {
        let mut group = ItemDefinitionGroup {
            condition: node.attribute("Condition").unwrap_or("").to_string(),
            ..Default::default()
        };

        for cl_compile in elements(node).filter(|n| n.tag_name().name() == "ClCompile") {
            for setting in elements(cl_compile) {
                let Some(text) = setting.text() else {
                    continue;
                };
                match setting.tag_name().name() {
                    "PreprocessorDefinitions" => {
                        group.preprocessor_definitions = self.value(text);
                    }
                    "AdditionalIncludeDirectories" => {
                        group.additional_include_directories.push_str(&self.value(text));
                    }
                    "LanguageStandard" => {
                        if let Some(std) = CppStandard::from_text(text) {
                            group.cppstd = std;
                        }
                    }
                    _ => {}
                }
            }
        }

        group
    }
}

/// Top-level `.vcxproj` elements the parser acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectElement {
    /// `<ItemGroup Label="ProjectConfigurations">`
    ConfigurationItems,
    /// Any other `<ItemGroup>`
    Items,
    ItemDefinitions,
    /// `<PropertyGroup Label="Globals">`
    Globals,
    Other,
}

impl ProjectElement {
    fn of(node: &roxmltree::Node) -> Self {
        let label = node.attribute("Label");
        match node.tag_name().name() {
            "ItemGroup" if label == Some("ProjectConfigurations") => Self::ConfigurationItems,
            "ItemGroup" => Self::Items,
            "ItemDefinitionGroup" => Self::ItemDefinitions,
            "PropertyGroup" if label == Some("Globals") => Self::Globals,
            _ => Self::Other,
        }
    }
}

/// `None` for non-`ProjectConfiguration` children and for entries whose
/// platform is not one we know.
fn parse_project_configuration(node: roxmltree::Node) -> Option<ProjectConfiguration> {
    if node.tag_name().name() != "ProjectConfiguration" {
        return None;
    }

    let mut config = ProjectConfiguration {
        name: node.attribute("Include").unwrap_or("").to_string(),
        ..Default::default()
    };

    for child in elements(node) {
        let Some(text) = child.text() else {
            continue;
        };
        match child.tag_name().name() {
            "Configuration" => config.configuration = text.to_string(),
            "Platform" => {
                config.platform_str = text.to_string();
                config.platform = Platform::from_text(text);
            }
            _ => {}
        }
    }

    (config.platform != Platform::Unknown).then_some(config)
}

fn parse_globals(node: roxmltree::Node, globals: &mut ProjectGlobals) {
    for child in elements(node) {
        let Some(text) = child.text() else {
            continue;
        };
        let s = || Some(text.to_string());
        match child.tag_name().name() {
            "ProjectGuid" => globals.project_guid = Some(unbraced(text).to_string()),
            "RootNamespace" => globals.root_namespace = s(),
            "Keyword" => globals.keyword = s(),
            "WindowsTargetPlatformVersion" => globals.windows_target_platform_version = s(),
            _ => {}
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn elements<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Strip one pair of surrounding braces, if present.
pub(crate) fn unbraced(s: &str) -> &str {
    s.strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(s)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Loading from disk
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse the `.vcxproj` at `path` into `project`.
///
/// The file is read and parsed in full before `project` is touched, so on
/// error `project` is left exactly as it was.
pub fn load_project(project: &mut Project, path: impl AsRef<Path>, variables: &Variables) -> Result<()> {
    load_project_with(project, path, ProjectParser::new(variables))
}

pub(crate) fn load_project_with(
    project: &mut Project,
    path: impl AsRef<Path>,
    parser: ProjectParser,
) -> Result<()> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let doc = roxmltree::Document::parse(&source)?;

    tracing::debug!(project = %project.name, path = %path.display(), "parsing project file");
    parser.parse(doc.root_element(), project);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(xml: &str) -> Project {
        parse_with(xml, &Variables::new(), false)
    }

    fn parse_with(xml: &str, vars: &Variables, expand: bool) -> Project {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut project = Project::default();
        ProjectParser::new(vars)
            .expand(expand)
            .read_env(false)
            .parse(doc.root_element(), &mut project);
        project
    }

    const CONFIGURATIONS: &str = r#"
<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup Label="ProjectConfigurations">
    <ProjectConfiguration Include="Debug|Win32">
      <Configuration>Debug</Configuration>
      <Platform>Win32</Platform>
    </ProjectConfiguration>
    <ProjectConfiguration Include="Debug|x64">
      <Configuration>Debug</Configuration>
      <Platform>x64</Platform>
    </ProjectConfiguration>
    <ProjectConfiguration Include="Debug|ARM64">
      <Configuration>Debug</Configuration>
      <Platform>ARM64</Platform>
    </ProjectConfiguration>
    <ProjectConfiguration Include="Release|X64">
      <Configuration>Release</Configuration>
      <Platform>X64</Platform>
    </ProjectConfiguration>
    <Other Include="ignored" />
  </ItemGroup>
</Project>"#;

    #[test]
    fn platforms_are_normalized_and_unknown_dropped() {
        let project = parse_str(CONFIGURATIONS);
        let configs = &project.project_configurations;
        assert_eq!(configs.len(), 2);

        assert_eq!(configs[0].name, "Debug|Win32");
        assert_eq!(configs[0].configuration, "Debug");
        assert_eq!(configs[0].platform_str, "Win32");
        assert_eq!(configs[0].platform, Platform::Win32);

        assert_eq!(configs[1].name, "Debug|x64");
        assert_eq!(configs[1].platform, Platform::X64);
    }

    #[test]
    fn configuration_without_platform_is_dropped() {
        let project = parse_str(
            r#"<Project><ItemGroup Label="ProjectConfigurations">
                 <ProjectConfiguration Include="Debug|x64"><Configuration>Debug</Configuration><Platform/></ProjectConfiguration>
               </ItemGroup></Project>"#,
        );
        assert!(project.project_configurations.is_empty());
    }

    #[test]
    fn compile_and_include_lists_keep_document_order() {
        let project = parse_str(
            r#"<Project>
                 <ItemGroup>
                   <ClCompile Include="src\main.cpp" />
                   <ClInclude Include="include\app.h" />
                   <ClCompile Include="src\util.cpp"><ObjectFileName>x</ObjectFileName></ClCompile>
                   <ClCompile />
                   <None Include="README.md" />
                 </ItemGroup>
                 <ItemGroup>
                   <ClInclude Include="include\util.h" />
                   <ProjectReference Include="..\Core\Core.vcxproj" />
                 </ItemGroup>
               </Project>"#,
        );
        assert_eq!(project.compile_list, vec!["src\\main.cpp", "src\\util.cpp"]);
        assert_eq!(project.include_list, vec!["include\\app.h", "include\\util.h"]);
        assert_eq!(project.project_references, vec!["..\\Core\\Core.vcxproj"]);
    }

    #[test]
    fn language_standard_only_group() {
        let project = parse_str(
            "<Project><ItemDefinitionGroup><ClCompile><LanguageStandard>stdcpp20</LanguageStandard></ClCompile></ItemDefinitionGroup></Project>",
        );
        assert_eq!(project.item_definition_groups.len(), 1);
        let group = &project.item_definition_groups[0];
        assert_eq!(group.cppstd, CppStandard::Cpp20);
        assert_eq!(group.condition, "");
        assert_eq!(group.preprocessor_definitions, "");
        assert_eq!(group.additional_include_directories, "");
    }

    #[test]
    fn item_definition_group_settings() {
        let project = parse_str(
            r#"<Project>
                 <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|x64'">
                   <ClCompile>
                     <PreprocessorDefinitions>FIRST</PreprocessorDefinitions>
                     <AdditionalIncludeDirectories>a;</AdditionalIncludeDirectories>
                     <PreprocessorDefinitions>_DEBUG;%(PreprocessorDefinitions)</PreprocessorDefinitions>
                     <AdditionalIncludeDirectories>b;</AdditionalIncludeDirectories>
                     <AdditionalIncludeDirectories></AdditionalIncludeDirectories>
                     <LanguageStandard>stdcpp17</LanguageStandard>
                     <LanguageStandard>stdcpp_future</LanguageStandard>
                   </ClCompile>
                   <Link><SubSystem>Console</SubSystem></Link>
                 </ItemDefinitionGroup>
                 <ItemDefinitionGroup />
               </Project>"#,
        );
        assert_eq!(project.item_definition_groups.len(), 2);

        let group = &project.item_definition_groups[0];
        assert_eq!(group.condition, "'$(Configuration)|$(Platform)'=='Debug|x64'");
        assert_eq!(group.preprocessor_definitions, "_DEBUG;%(PreprocessorDefinitions)");
        assert_eq!(group.additional_include_directories, "a;b;");
        assert_eq!(group.cppstd, CppStandard::Cpp17);

        assert_eq!(project.item_definition_groups[1], ItemDefinitionGroup::default());
    }

    #[test]
    fn unrecognized_language_standard_keeps_default() {
        let project = parse_str(
            "<Project><ItemDefinitionGroup><ClCompile><LanguageStandard>Default</LanguageStandard></ClCompile></ItemDefinitionGroup></Project>",
        );
        assert_eq!(project.item_definition_groups[0].cppstd, CppStandard::CppLatest);
    }

    #[test]
    fn globals_are_read() {
        let project = parse_str(
            r#"<Project>
                 <PropertyGroup Label="Globals">
                   <ProjectGuid>{11111111-1111-1111-1111-111111111111}</ProjectGuid>
                   <RootNamespace>App</RootNamespace>
                   <Keyword>Win32Proj</Keyword>
                   <WindowsTargetPlatformVersion>10.0</WindowsTargetPlatformVersion>
                 </PropertyGroup>
                 <PropertyGroup><ProjectGuid>{ignored}</ProjectGuid></PropertyGroup>
               </Project>"#,
        );
        assert_eq!(
            project.globals.project_guid.as_deref(),
            Some("11111111-1111-1111-1111-111111111111")
        );
        assert_eq!(project.globals.root_namespace.as_deref(), Some("App"));
        assert_eq!(project.globals.keyword.as_deref(), Some("Win32Proj"));
        assert_eq!(project.globals.windows_target_platform_version.as_deref(), Some("10.0"));
    }

    #[test]
    fn unknown_elements_are_ignored() {
        let project = parse_str(
            r#"<Project><Import Project="$(VCTargetsPath)\Microsoft.Cpp.props" /><ImportGroup Label="ExtensionSettings" /><!-- c --></Project>"#,
        );
        assert_eq!(project, Project::default());
    }

    #[test]
    fn values_stay_raw_by_default() {
        let mut vars = Variables::new();
        vars.insert("SolutionDir".into(), "/sln".into());
        let xml = "<Project><ItemDefinitionGroup><ClCompile><AdditionalIncludeDirectories>$(SolutionDir)/inc</AdditionalIncludeDirectories></ClCompile></ItemDefinitionGroup></Project>";

        let raw = parse_with(xml, &vars, false);
        assert_eq!(raw.item_definition_groups[0].additional_include_directories, "$(SolutionDir)/inc");

        let expanded = parse_with(xml, &vars, true);
        assert_eq!(expanded.item_definition_groups[0].additional_include_directories, "/sln/inc");
    }

    #[test]
    fn expansion_failure_keeps_raw_value() {
        let xml = "<Project><ItemGroup><ClCompile Include=\"$(Nope)\\a.cpp\" /></ItemGroup></Project>";
        let project = parse_with(xml, &Variables::new(), true);
        assert_eq!(project.compile_list, vec!["$(Nope)\\a.cpp"]);
    }

    #[test]
    fn item_definition_groups_for_configuration() {
        let project = parse_str(
            r#"<Project>
                 <ItemGroup Label="ProjectConfigurations">
                   <ProjectConfiguration Include="Debug|x64"><Configuration>Debug</Configuration><Platform>x64</Platform></ProjectConfiguration>
                   <ProjectConfiguration Include="Release|x64"><Configuration>Release</Configuration><Platform>x64</Platform></ProjectConfiguration>
                 </ItemGroup>
                 <ItemDefinitionGroup><ClCompile><PreprocessorDefinitions>ALL</PreprocessorDefinitions></ClCompile></ItemDefinitionGroup>
                 <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|x64'"><ClCompile><PreprocessorDefinitions>DBG</PreprocessorDefinitions></ClCompile></ItemDefinitionGroup>
                 <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Release|x64'"><ClCompile><PreprocessorDefinitions>REL</PreprocessorDefinitions></ClCompile></ItemDefinitionGroup>
               </Project>"#,
        );
        let debug = &project.project_configurations[0];
        let defs: Vec<&str> = project
            .item_definition_groups_for(debug)
            .map(|g| g.preprocessor_definitions.as_str())
            .collect();
        assert_eq!(defs, vec!["ALL", "DBG"]);
    }

    #[test]
    fn load_project_failure_leaves_project_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("Broken.vcxproj");
        std::fs::write(&broken, "<Project><ItemGroup>").unwrap();

        let mut project = Project { name: "Broken".into(), ..Default::default() };
        let before = project.clone();

        let err = load_project(&mut project, &broken, &Variables::new()).unwrap_err();
        assert!(matches!(err, Error::Xml(_)));
        assert_eq!(project, before);

        let err = load_project(&mut project, dir.path().join("Missing.vcxproj"), &Variables::new())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(project, before);
    }

    #[test]
    fn solution_folder_type() {
        let folder = Project { type_id: SOLUTION_FOLDER_TYPE_ID.to_lowercase(), ..Default::default() };
        assert!(folder.is_solution_folder());
        assert!(!Project::default().is_solution_folder());
    }

    #[test]
    fn unbraced_strips_one_pair() {
        assert_eq!(unbraced("{abc}"), "abc");
        assert_eq!(unbraced("abc"), "abc");
        assert_eq!(unbraced("{abc"), "{abc");
    }
}
