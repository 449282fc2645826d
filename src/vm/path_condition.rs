use std::collections::HashMap;
use std::fmt;

use crate::vm::value::HeapPosition;

/// One assumption made while exploring the current branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// The class was initialized before the symbolic execution started.
    AssumeClassInitialized(String),
    /// The class is initialized during the symbolic execution.
    AssumeClassNotInitialized(String),
    /// The symbolic reference with this id is `null`.
    AssumeNull(u64),
    /// The symbolic reference with this id points to an object already in the heap.
    AssumeAliases { id: u64, position: HeapPosition },
    /// The symbolic reference with this id points to a fresh object of class `class`.
    AssumeExpands { id: u64, position: HeapPosition, class: String },
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Clause::AssumeClassInitialized(ref class) => write!(f, "pre_init({})", class),
            Clause::AssumeClassNotInitialized(ref class) => write!(f, "!pre_init({})", class),
            Clause::AssumeNull(id) => write!(f, "{{R{}}} == null", id),
            Clause::AssumeAliases { id, position } => write!(f, "{{R{}}} == {}", id, position),
            Clause::AssumeExpands { id, position, ref class } =>
                write!(f, "{{R{}}} == {} fresh {}", id, position, class),
        }
    }
}

/// What a resolved symbolic reference is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Null,
    Position(HeapPosition),
}

/// The assumptions of the current branch, in the order they were made, plus an index of the
/// symbolic references they resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathCondition {
    clauses: Vec<Clause>,
    resolutions: HashMap<u64, Resolution>,
}

impl PathCondition {
    pub fn new() -> Self {
        PathCondition::default()
    }

    pub fn push(&mut self, clause: Clause) {
        match clause {
            Clause::AssumeNull(id) => {
                self.resolutions.insert(id, Resolution::Null);
            },
            Clause::AssumeAliases { id, position } | Clause::AssumeExpands { id, position, .. } => {
                self.resolutions.insert(id, Resolution::Position(position));
            },
            Clause::AssumeClassInitialized(_) | Clause::AssumeClassNotInitialized(_) => (),
        }
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn resolution(&self, id: u64) -> Option<Resolution> {
        self.resolutions.get(&id).cloned()
    }

    /// `Some(true)` if the branch assumes `class` initialized before the execution started,
    /// `Some(false)` if it assumes the opposite, `None` if it assumes neither.
    pub fn assumes_initialized(&self, class: &str) -> Option<bool> {
        self.clauses.iter().rev().filter_map(|clause| match *clause {
            Clause::AssumeClassInitialized(ref name) if name == class => Some(true),
            Clause::AssumeClassNotInitialized(ref name) if name == class => Some(false),
            _ => None,
        }).next()
    }
}
