pub mod condition;
pub mod error;
pub mod project;
pub mod sln;
pub mod solution;
pub mod variables;

pub use error::{Error, EvalError, Result};
pub use project::{CppStandard, ItemDefinitionGroup, Platform, Project, ProjectConfiguration, load_project};
pub use solution::{LoadWarning, Solution, SolutionLoader};
pub use variables::{Variables, evaluate};
