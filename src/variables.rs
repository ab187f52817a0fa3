//! `$(Name)` substitution for MSBuild-style strings.
//!
//! Values in `.vcxproj` files reference variables such as `$(SolutionDir)`
//! or `$(Platform)`.  [`evaluate`] resolves them against a [`Variables`]
//! table, optionally falling back to the process environment.

use std::collections::HashMap;
use std::ffi::OsString;

use crate::error::EvalError;

/// Variable table used for `$(Name)` lookups.  Names match exactly.
pub type Variables = HashMap<String, String>;

/// Upper bound on substitutions performed by a single [`evaluate`] call.
/// A value that refers to itself would otherwise expand forever.
pub const SUBSTITUTION_LIMIT: usize = 1024;

/// Resolve every `$(Name)` token in `input`.
///
/// Tokens are looked up in `variables` first.  When a name is missing and
/// `read_env` is set, the process environment is consulted.  Scanning
/// resumes at the start of each substituted value, so a value that itself
/// contains `$(…)` is resolved in turn.
///
/// On failure the returned [`EvalError`] carries the string as substituted
/// up to the failing token.
///
/// # Example
/// ```
/// use vcxproj_rs::variables::{evaluate, Variables};
///
/// let mut vars = Variables::new();
/// vars.insert("SolutionDir".into(), "C:/src".into());
/// assert_eq!(
///     evaluate("$(SolutionDir)/include", &vars, false).unwrap(),
///     "C:/src/include"
/// );
/// ```
pub fn evaluate(input: &str, variables: &Variables, read_env: bool) -> Result<String, EvalError> {
    let mut s = input.to_string();
    let mut start = 0;
    let mut substitutions = 0;

    while let Some(offset) = s[start..].find("$(") {
        let open = start + offset;
        let Some(close) = s[open..].find(')').map(|i| open + i) else {
            return Err(EvalError::Unterminated { partial: s, position: open });
        };

        let name = s[open + 2..close].to_string();
        let value = match variables.get(&name) {
            Some(value) => value.clone(),
            None if read_env => match env_lookup(&name) {
                Some(Ok(value)) => value,
                Some(Err(raw)) => {
                    tracing::debug!(name = %name, value = ?raw, "environment value is not unicode");
                    return Err(EvalError::NotUnicode { name, partial: s });
                }
                None => return Err(EvalError::Unresolved { name, partial: s }),
            },
            None => return Err(EvalError::Unresolved { name, partial: s }),
        };

        substitutions += 1;
        if substitutions > SUBSTITUTION_LIMIT {
            return Err(EvalError::TooManySubstitutions {
                partial: s,
                limit: SUBSTITUTION_LIMIT,
            });
        }

        s.replace_range(open..=close, &value);
        start = open;
    }

    Ok(s)
}

/// Like [`evaluate`], but hands back `input` unchanged when resolution fails.
pub fn evaluate_or_raw(input: &str, variables: &Variables, read_env: bool) -> String {
    match evaluate(input, variables, read_env) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::debug!(value = input, error = %err, "keeping unresolved value");
            input.to_string()
        }
    }
}

/// `Some(Err(raw))` when the variable is set but its value is not Unicode.
fn env_lookup(name: &str) -> Option<Result<String, OsString>> {
    // std::env rejects these names outright.
    if name.is_empty() || name.contains(['=', '\0']) {
        return None;
    }
    std::env::var_os(name).map(OsString::into_string)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
