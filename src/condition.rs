//! MSBuild `Condition` attributes on `.vcxproj` elements.
//!
//! Visual C++ projects gate their `<ItemDefinitionGroup>`s and
//! `<PropertyGroup>`s on the active configuration, for example:
//!
//! - `'$(Configuration)|$(Platform)'=='Debug|x64'`
//! - `'$(Configuration)'=='Release' and '$(Platform)'!='Win32'`
//! - `Exists('$(VCTargetsPath)\Microsoft.Cpp.props')`
//!
//! Evaluation is literal: `$(Name)` references are substituted from a
//! variable table (unknown names become the empty string) and the operands
//! are compared as strings, ignoring ASCII case.  Grammar written with
//! [`chumsky`].
//!
//! ```text
//! condition  = all ('or' all)*
//! all        = negated ('and' negated)*
//! negated    = '!'* (compare | exists | '(' condition ')')
//! compare    = operand ('==' | '!=') operand
//! exists     = 'Exists' '(' operand ')'
//! operand    = "'" chars "'"
//! ```

use chumsky::prelude::*;

use crate::error::{Error, Result};
use crate::project::ProjectConfiguration;
use crate::variables::Variables;

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// String comparison, ASCII case-insensitive.
    Compare {
        lhs: Vec<Fragment>,
        equal: bool,
        rhs: Vec<Fragment>,
    },
    /// Holds unconditionally; the filesystem is never consulted.
    Exists(Vec<Fragment>),
    Not(Box<Condition>),
    /// Two or more conditions joined by `and`.
    All(Vec<Condition>),
    /// Two or more conditions joined by `or`.
    Any(Vec<Condition>),
}

/// Piece of a quoted operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Var(String),
}

fn fragments(raw: &str) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("$(") {
        let Some(len) = rest[open + 2..].find(')') else {
            break;
        };
        if open > 0 {
            out.push(Fragment::Text(rest[..open].to_string()));
        }
        out.push(Fragment::Var(rest[open + 2..open + 2 + len].to_string()));
        rest = &rest[open + 3 + len..];
    }

    if !rest.is_empty() {
        out.push(Fragment::Text(rest.to_string()));
    }
    out
}

/// Collapse a one-element `and`/`or` list to its only member.
fn joined(parts: Vec<Condition>, join: fn(Vec<Condition>) -> Condition) -> Condition {
    match <[Condition; 1]>::try_from(parts) {
        Ok([single]) => single,
        Err(parts) => join(parts),
    }
}

fn grammar<'a>() -> impl Parser<'a, &'a str, Condition, extra::Err<Simple<'a, char>>> {
    let operand = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(fragments)
        .padded();

    let word = any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .to_slice()
        .padded();
    let keyword = move |kw: &'static str| {
        word.clone()
            .filter(move |w: &&str| w.eq_ignore_ascii_case(kw))
            .ignored()
    };

    recursive(|condition| {
        let compare = operand
            .clone()
            .then(choice((just("==").to(true), just("!=").to(false))).padded())
            .then(operand.clone())
            .map(|((lhs, equal), rhs)| Condition::Compare { lhs, equal, rhs });

        let exists = keyword("exists")
            .ignore_then(operand.clone().delimited_by(just('('), just(')').padded()))
            .map(Condition::Exists);

        let nested = condition.delimited_by(just('(').padded(), just(')').padded());

        let negated = just('!')
            .padded()
            .repeated()
            .foldr(choice((compare, exists, nested)), |_, inner| {
                Condition::Not(Box::new(inner))
            });

        let all = negated
            .separated_by(keyword("and"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|parts| joined(parts, Condition::All));

        all.separated_by(keyword("or"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|parts| joined(parts, Condition::Any))
    })
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self> {
        grammar().parse(input).into_result().map_err(|errs| Error::Condition {
            condition: input.to_string(),
            message: errs
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })
    }

    pub fn evaluate(&self, vars: &Variables) -> bool {
        match self {
            Self::Compare { lhs, equal, rhs } => {
                expand(lhs, vars).eq_ignore_ascii_case(&expand(rhs, vars)) == *equal
            }
            Self::Exists(_) => true,
            Self::Not(inner) => !inner.evaluate(vars),
            Self::All(parts) => parts.iter().all(|c| c.evaluate(vars)),
            Self::Any(parts) => parts.iter().any(|c| c.evaluate(vars)),
        }
    }
}

fn expand(parts: &[Fragment], vars: &Variables) -> String {
    parts
        .iter()
        .map(|part| match part {
            Fragment::Text(s) => s.as_str(),
            Fragment::Var(name) => vars.get(name).map(String::as_str).unwrap_or(""),
        })
        .collect()
}

/// Does `condition` hold for `config`?
///
/// `$(Configuration)` and `$(Platform)` are bound from the configuration
/// entry and compared without regard to ASCII case.  An empty condition
/// always holds; one that fails to parse never does.  Since `Exists` is
/// always true, `!Exists(...)` never holds.
pub fn holds_for(condition: &str, config: &ProjectConfiguration) -> bool {
    if condition.trim().is_empty() {
        return true;
    }

    match Condition::parse(condition) {
        Ok(expr) => {
            let mut vars = Variables::new();
            vars.insert("Configuration".to_string(), config.configuration.clone());
            vars.insert("Platform".to_string(), config.platform_str.clone());
            expr.evaluate(&vars)
        }
        Err(err) => {
            tracing::debug!(%err, "condition ignored");
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
