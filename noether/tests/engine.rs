//! End-to-end tests driving the three engine layers through the public API
//! only: unification, parse-table construction and GLR parsing, and proof
//! search with pretty-printed output.

use indexmap::IndexSet;
use noether::grammar::{
    parse, Grammar, LrDriver, ParseError, ParseNode, ParseTable, Production, Symbol,
};
use noether::prover::{
    Config, FormElement, Judgment, JudgmentKind, Premise, Proof, Prover, RuleCatalog, RuleSpec,
    SurfaceSyntax,
};
use noether::term::{Atom, Constant, FreeVar, Substitution, Term};
use std::rc::Rc;

fn nat() -> Rc<Term> {
    Term::constant("nat", Term::kind())
}

fn z() -> Constant {
    Constant::new("z", nat())
}

fn s() -> Constant {
    Constant::new("s", Term::abs("x", nat(), nat()))
}

fn numeral(n: usize) -> Rc<Term> {
    let mut term = Rc::new(Term::Const(z()));
    for _ in 0..n {
        term = Term::app(Atom::Const(s()), vec![term]);
    }
    term
}

#[test]
fn unification_produces_a_usable_unifier() {
    let x = FreeVar::new("X", nat());
    let lhs = Term::app(Atom::Const(s()), vec![x.to_term()]);
    let rhs = numeral(3);

    let sub = lhs.unify(&rhs).expect("s(X) unifies with 3");
    assert_eq!(sub.get_substituted(&x).unwrap(), numeral(2));
    assert_eq!(lhs.substitute(&sub), rhs.substitute(&sub));
}

#[test]
fn unification_failure_is_recoverable() {
    let lhs = numeral(1);
    let rhs = numeral(2);
    assert!(lhs.unify(&rhs).is_err());

    // A failed unification leaves no residue; fresh attempts still work.
    let x = FreeVar::new("X", nat());
    assert!(x.to_term().unify(&numeral(2)).is_ok());
}

#[test]
fn substitutions_compose_outside_in() {
    let x = FreeVar::new("X", nat());
    let y = FreeVar::new("Y", nat());

    let mut sub = Substitution::single(x.clone(), Term::app(Atom::Const(s()), vec![y.to_term()]))
        .unwrap();
    let tail = Substitution::single(y.clone(), numeral(0)).unwrap();
    sub.compose(&tail);

    assert_eq!(x.to_term().substitute(&sub), numeral(1));
}

#[test]
fn grammar_layer_builds_and_parses() {
    let e = Symbol::nonterminal("E");
    let grammar = Grammar::new(
        e.clone(),
        vec![
            Production::new(
                e.clone(),
                vec![Symbol::terminal("("), e.clone(), Symbol::terminal(")")],
            ),
            Production::new(e, vec![Symbol::terminal("id")]),
        ],
    );
    let table = ParseTable::build(&grammar);
    assert!(!table.has_conflict());

    let input = vec![
        Symbol::terminal("("),
        Symbol::terminal("("),
        Symbol::terminal("id"),
        Symbol::terminal(")"),
        Symbol::terminal(")"),
    ];
    let mut driver = LrDriver::new(&grammar, &table, &input);
    let tree = driver.parse().expect("balanced parens parse");
    let ParseNode::Rule { production: 0, .. } = tree else {
        panic!("expected outer parenthesis production at the root");
    };

    let glr = parse(&grammar, &table, &input).expect("GLR agrees with LR here");
    assert_eq!(glr, tree);

    assert!(matches!(
        parse(&grammar, &table, &[Symbol::terminal("(")]),
        Err(ParseError::NotParseable)
    ));
}

struct EvenCatalog {
    kind: JudgmentKind,
    rules: Vec<RuleSpec>,
}

impl EvenCatalog {
    fn new() -> Self {
        let kind = JudgmentKind::new("even");
        let even = Constant::new("even", Term::abs("x", nat(), Term::kind()));
        let even_of = |n: Rc<Term>| Term::app(Atom::Const(even.clone()), vec![n]);

        let n = FreeVar::new("N", nat());
        let zero = RuleSpec::axiom(
            "Zero",
            Constant::new("even-z", Term::unknown()),
            even_of(Rc::new(Term::Const(z()))),
        );
        let succ = RuleSpec::new(
            "Succ",
            Constant::new("even-ss", Term::unknown()),
            vec![Premise::new(kind.clone(), even_of(n.to_term()))],
            even_of(Term::app(
                Atom::Const(s()),
                vec![Term::app(Atom::Const(s()), vec![n.to_term()])],
            )),
        );
        Self { kind, rules: vec![zero, succ] }
    }

    fn goal(&self, n: usize) -> Judgment {
        let even = Constant::new("even", Term::abs("x", nat(), Term::kind()));
        Judgment::new(
            Term::app(Atom::Const(even), vec![numeral(n)]),
            self.kind.clone(),
        )
    }
}

impl RuleCatalog for EvenCatalog {
    fn rules_for(&self, kind: &JudgmentKind) -> &[RuleSpec] {
        if *kind == self.kind {
            &self.rules
        } else {
            &[]
        }
    }
}

struct EvenSyntax {
    judgment: Vec<FormElement>,
    z: Vec<FormElement>,
    s: Vec<FormElement>,
}

impl EvenSyntax {
    fn new() -> Self {
        Self {
            judgment: vec![FormElement::Hole, FormElement::literal("even")],
            z: vec![FormElement::literal("z")],
            s: vec![FormElement::literal("s"), FormElement::Hole],
        }
    }
}

impl SurfaceSyntax for EvenSyntax {
    fn judgment_form(&self, kind: &JudgmentKind) -> Option<&[FormElement]> {
        (kind.name() == "even").then_some(self.judgment.as_slice())
    }

    fn constructor_form(&self, constant: &str) -> Option<&[FormElement]> {
        match constant {
            "z" => Some(&self.z),
            "s" => Some(&self.s),
            _ => None,
        }
    }
}

#[test]
fn prover_layer_finds_and_renders_proofs() {
    let catalog = EvenCatalog::new();
    let prover = Prover::new(Config { max_depth: 10 });

    let mut proof = Proof::new(catalog.goal(6));
    assert!(prover.prove(&mut proof, &catalog));
    assert!(proof.is_complete());

    let rendered = proof.render(&EvenSyntax::new());
    assert_eq!(rendered.matches("by rule Succ").count(), 3);
    assert_eq!(rendered.matches("by rule Zero").count(), 1);

    let mut unprovable = Proof::new(catalog.goal(3));
    assert!(!prover.prove(&mut unprovable, &catalog));
}

#[test]
fn protected_variables_block_instantiation() {
    let catalog = EvenCatalog::new();
    let m = FreeVar::new("M", nat());
    let even = Constant::new("even", Term::abs("x", nat(), Term::kind()));
    let goal = Judgment::new(
        Term::app(Atom::Const(even), vec![m.to_term()]),
        JudgmentKind::new("even"),
    );

    let input_vars: IndexSet<FreeVar> = [m].into_iter().collect();
    let mut proof = Proof::with_input_vars(goal, input_vars);
    let prover = Prover::new(Config::default());
    assert!(!prover.prove(&mut proof, &catalog));
}
