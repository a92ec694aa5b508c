use super::judgment::{Judgment, JudgmentKind};
use crate::term::{Atom, Constant, Substitution, Term};
use std::rc::Rc;

/// One premise of an inference rule: the judgment kind it requires and the
/// pattern its instance must match. Metavariables are ordinary free
/// variables shared between the premises and the conclusion.
#[derive(Debug, Clone)]
pub struct Premise {
    pub kind: JudgmentKind,
    pub pattern: Rc<Term>,
}

impl Premise {
    pub fn new(kind: JudgmentKind, pattern: Rc<Term>) -> Self {
        Self { kind, pattern }
    }
}

/// An inference rule as declared in the catalog: a display name, the LF
/// constant standing for the rule, its premises, and its conclusion
/// pattern.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    name: String,
    constant: Constant,
    premises: Vec<Premise>,
    conclusion: Rc<Term>,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        constant: Constant,
        premises: Vec<Premise>,
        conclusion: Rc<Term>,
    ) -> Self {
        Self { name: name.into(), constant, premises, conclusion }
    }

    /// An axiom: a rule without premises.
    pub fn axiom(name: impl Into<String>, constant: Constant, conclusion: Rc<Term>) -> Self {
        Self::new(name, constant, Vec::new(), conclusion)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constant(&self) -> &Constant {
        &self.constant
    }

    pub fn premises(&self) -> &[Premise] {
        &self.premises
    }

    pub fn conclusion(&self) -> &Rc<Term> {
        &self.conclusion
    }

    /// The rule's application term `constant(premises..., conclusion)` with
    /// every metavariable consistently renamed to a fresh copy, so that one
    /// rule can be tried against many goals without capture.
    pub(crate) fn fresh_app_term(&self) -> Rc<Term> {
        let mut args: Vec<Rc<Term>> =
            self.premises.iter().map(|p| p.pattern.clone()).collect();
        args.push(self.conclusion.clone());
        let app = Term::app(Atom::Const(self.constant.clone()), args);

        let mut freshen = Substitution::new();
        app.fresh_substitution(&mut freshen);
        app.substitute(&freshen)
    }
}

/// External source of inference rules. Implementations return rules in
/// declaration order; the prover tries them in exactly that order.
pub trait RuleCatalog {
    fn rules_for(&self, kind: &JudgmentKind) -> &[RuleSpec];
}

/// A successfully instantiated rule: the unifier that matched its
/// conclusion against a goal, the resulting precondition judgments, and the
/// catalog rule's display name.
#[derive(Debug, Clone)]
pub struct RuleInstance {
    pub(super) name: String,
    pub(super) substitution: Substitution,
    pub(super) preconditions: Vec<Judgment>,
}

impl RuleInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    pub fn preconditions(&self) -> &[Judgment] {
        &self.preconditions
    }

    pub fn has_preconditions(&self) -> bool {
        !self.preconditions.is_empty()
    }
}
