use crate::term::Term;
use std::fmt;
use std::rc::Rc;

/// The tag identifying which judgment a term asserts; the rule catalog is
/// keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JudgmentKind(Rc<str>);

impl JudgmentKind {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JudgmentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A proposition instance: a term tagged with its judgment kind. Equality
/// is by term; the kind is derivable from the term's head in a well-formed
/// system and does not participate.
#[derive(Debug, Clone, Eq)]
pub struct Judgment {
    term: Rc<Term>,
    kind: JudgmentKind,
}

impl Judgment {
    pub fn new(term: Rc<Term>, kind: JudgmentKind) -> Self {
        Self { term, kind }
    }

    pub fn term(&self) -> &Rc<Term> {
        &self.term
    }

    pub fn kind(&self) -> &JudgmentKind {
        &self.kind
    }
}

impl PartialEq for Judgment {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.term)
    }
}
