//! `$name` / `${name}` expansion inside string leaves.
//!
//! `$$` is a literal dollar. The loader defines `_` as the database root, so
//! documents can refer to sibling files with `"$_/dir1/file3.json"`.

use crate::node::{Branch, Node};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Variable table used for substitution.
pub type Vars = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstError {
    #[error("undefined variable '{name}' in '{text}'")]
    Undefined { name: String, text: String },
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})")
            .expect("placeholder pattern is valid")
    })
}

/// Expand placeholders in `text`.
///
/// With `ignore_missing`, unknown variables are left as written.
pub fn substitute(text: &str, vars: &Vars, ignore_missing: bool) -> Result<String, SubstError> {
    if !text.contains('$') {
        return Ok(text.to_string());
    }
    let mut missing: Option<String> = None;
    let expanded = placeholder().replace_all(text, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            return "$".to_string();
        }
        let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });
    match missing {
        Some(name) if !ignore_missing => Err(SubstError::Undefined {
            name,
            text: text.to_string(),
        }),
        _ => Ok(expanded.into_owned()),
    }
}

fn subst_value(value: &mut Value, vars: &Vars, ignore_missing: bool) -> Result<(), SubstError> {
    match value {
        Value::String(text) => {
            let expanded = substitute(text, vars, ignore_missing)?;
            if expanded != *text {
                *text = expanded;
            }
        }
        Value::Array(items) => {
            for item in items {
                subst_value(item, vars, ignore_missing)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                subst_value(item, vars, ignore_missing)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

impl Node {
    /// Expand placeholders in every string below this node.
    pub fn subst_vars(&mut self, vars: &Vars, ignore_missing: bool) -> Result<(), SubstError> {
        match self {
            Node::Leaf(value) => subst_value(value, vars, ignore_missing),
            Node::Branch(branch) => branch.subst_vars(vars, ignore_missing),
        }
    }
}

impl Branch {
    /// Expand placeholders in every string below this Branch.
    pub fn subst_vars(&mut self, vars: &Vars, ignore_missing: bool) -> Result<(), SubstError> {
        self.values_mut()
            .try_for_each(|child| child.subst_vars(vars, ignore_missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Vars {
        Vars::from([("_".to_string(), "/db".to_string()), ("det".to_string(), "V01".to_string())])
    }

    #[test]
    fn expands_both_placeholder_forms() {
        assert_eq!(substitute("$_/dir1/file3.json", &vars(), false).unwrap(), "/db/dir1/file3.json");
        assert_eq!(substitute("${det}A", &vars(), false).unwrap(), "V01A");
        assert_eq!(substitute("cost: $$5", &vars(), false).unwrap(), "cost: $5");
        assert_eq!(substitute("plain", &vars(), false).unwrap(), "plain");
    }

    #[test]
    fn missing_variables() {
        assert_eq!(
            substitute("$HOME/x", &vars(), false),
            Err(SubstError::Undefined {
                name: "HOME".into(),
                text: "$HOME/x".into()
            })
        );
        assert_eq!(substitute("$HOME/x", &vars(), true).unwrap(), "$HOME/x");
    }

    #[test]
    fn recurses_through_branches_and_sequences() {
        let mut node = Node::from_value(json!({
            "path": "$_/a",
            "nested": {"list": ["$det", {"inner": "${_}"}], "n": 3}
        }));
        node.subst_vars(&vars(), false).unwrap();
        assert_eq!(
            node.to_value(),
            json!({"path": "/db/a", "nested": {"list": ["V01", {"inner": "/db"}], "n": 3}})
        );
    }
}
