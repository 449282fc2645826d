//! The boundary to the decision procedure that tells which branches are feasible.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::vm::PathCondition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decision procedure failed: {0}")]
pub struct DecisionError(pub String);

pub trait DecisionOracle {
    /// Whether the path condition is satisfiable together with the assumption that `class`
    /// was initialized before the execution started.
    fn is_sat_initialized(&mut self, path_condition: &PathCondition, class: &str)
                          -> Result<bool, DecisionError>;

    /// Picks the branch the current state follows: `true` for "already initialized".
    ///
    /// The two assumptions are treated as mutually exclusive, so the "already initialized"
    /// branch is taken whenever it is satisfiable. Oracles backing a driver that explores both
    /// branches can override this.
    fn decide_initialized(&mut self, path_condition: &PathCondition, class: &str)
                          -> Result<bool, DecisionError> {
        self.is_sat_initialized(path_condition, class)
    }
}

/// Gives the same answer for every class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOracle(pub bool);

impl DecisionOracle for FixedOracle {
    fn is_sat_initialized(&mut self, _: &PathCondition, _: &str) -> Result<bool, DecisionError> {
        Ok(self.0)
    }
}

/// Answers from a per-class script and records every query it receives.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    answers: HashMap<String, bool>,
    failing: HashSet<String>,
    default: bool,
    queries: Vec<String>,
}

impl ScriptedOracle {
    /// An oracle answering `default` for classes without a scripted answer.
    pub fn new(default: bool) -> Self {
        ScriptedOracle { default, ..ScriptedOracle::default() }
    }

    pub fn answer(mut self, class: &str, initialized: bool) -> Self {
        self.answers.insert(class.to_owned(), initialized);
        self
    }

    /// Makes every query about `class` fail.
    pub fn fail_on(mut self, class: &str) -> Self {
        self.failing.insert(class.to_owned());
        self
    }

    /// The classes asked about, in order.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

impl DecisionOracle for ScriptedOracle {
    fn is_sat_initialized(&mut self, _: &PathCondition, class: &str)
                          -> Result<bool, DecisionError> {
        self.queries.push(class.to_owned());
        if self.failing.contains(class) {
            return Err(DecisionError(format!("no answer for {}", class)));
        }
        Ok(self.answers.get(class).cloned().unwrap_or(self.default))
    }
}

/// Answers from the assumptions already in the path condition, and `default` for classes the
/// path condition says nothing about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathConditionOracle {
    pub default: bool,
}

impl DecisionOracle for PathConditionOracle {
    fn is_sat_initialized(&mut self, path_condition: &PathCondition, class: &str)
                          -> Result<bool, DecisionError> {
        Ok(path_condition.assumes_initialized(class).unwrap_or(self.default))
    }
}
