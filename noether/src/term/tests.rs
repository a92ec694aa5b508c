use super::repr::{Atom, Constant, FreeVar, Term};
use super::unify::UnificationError;
use std::rc::Rc;

fn v(name: &str, ty: &Rc<Term>) -> FreeVar {
    FreeVar::new(name, ty.clone())
}

fn b(index: i64) -> Rc<Term> {
    Term::bound(index)
}

fn capp(c: &Constant, args: &[&Rc<Term>]) -> Rc<Term> {
    Term::app(Atom::Const(c.clone()), args.iter().map(|t| (*t).clone()).collect())
}

fn vapp(var: &FreeVar, args: &[&Rc<Term>]) -> Rc<Term> {
    Term::app(Atom::Var(var.clone()), args.iter().map(|t| (*t).clone()).collect())
}

fn abs(ty: &Rc<Term>, body: Rc<Term>) -> Rc<Term> {
    Term::abs("x", ty.clone(), body)
}

struct Vocab {
    a: Rc<Term>,
    a1: Constant,
    a2: Constant,
    t: Rc<Term>,
    top: Constant,
    arrow: Constant,
    subt: Constant,
    trans_rule: Constant,
}

fn vocab() -> Vocab {
    let a = Term::constant("a", Term::kind());
    let a1 = Constant::new("a1", a.clone());
    let a2 = Constant::new("a2", abs(&a, a.clone()));

    let t = Term::constant("t", Term::kind());
    let top = Constant::new("Top", t.clone());
    let arrow = Constant::new("->", abs(&t, abs(&t, t.clone())));
    let subt = Constant::new("subt", abs(&t, abs(&t, Term::kind())));

    // A subtyping-transitivity rule family:
    // subt(T1,T2) -> subt(T2,T3) -> subt(T1,T3).
    let t1 = v("T1", &t).to_term();
    let t2 = v("T2", &t).to_term();
    let t3 = v("T3", &t).to_term();
    let family = Term::constant("SA-TransTYPE", Term::kind());
    let trans_rule = Constant::new(
        "SA-TransTERM",
        abs(
            &capp(&subt, &[&t1, &t2]),
            abs(
                &capp(&subt, &[&t2, &t3]),
                abs(&capp(&subt, &[&t1, &t3]), family),
            ),
        ),
    );

    Vocab { a, a1, a2, t, top, arrow, subt, trans_rule }
}

fn assert_unifies(t1: &Rc<Term>, t2: &Rc<Term>, expected: &[(&FreeVar, &Rc<Term>)]) {
    let sub = t1
        .unify(t2)
        .unwrap_or_else(|e| panic!("unifying {t1} with {t2} failed unexpectedly: {e}"));
    for (var, term) in expected {
        let got = sub
            .get_substituted(var)
            .unwrap_or_else(|| panic!("{var} unbound in {sub}"));
        assert_eq!(&got, *term, "wrong binding for {var} in {sub}");
    }
    assert_eq!(
        t1.substitute(&sub),
        t2.substitute(&sub),
        "substitution {sub} does not unify {t1} and {t2}"
    );
}

#[test]
fn types_of_applied_constants() {
    let vo = vocab();
    assert_eq!(*Term::Const(vo.a1.clone()).ty(&mut Vec::new()), *vo.a);

    let a2_ty = Term::Const(vo.a2.clone()).ty(&mut Vec::new());
    assert_eq!(a2_ty, abs(&vo.a, vo.a.clone()));

    // The eta-long form has the same type as the bare constant.
    let a2_eta_long = Rc::new(Term::Abs {
        param: "x".to_owned(),
        param_ty: vo.a.clone(),
        body: capp(&vo.a2, &[&b(1)]),
    });
    assert_eq!(a2_eta_long.ty(&mut Vec::new()), abs(&vo.a, vo.a.clone()));
}

#[test]
fn abs_constructor_eta_reduces() {
    let vo = vocab();
    let f = FreeVar::new("F", abs(&vo.a, vo.a.clone()));

    // \x. F x collapses to F.
    let reduced = Term::abs("x", vo.a.clone(), vapp(&f, &[&b(1)]));
    assert_eq!(*reduced, Term::Var(f.clone()));

    // \x. a2 x does not: the head is a constant.
    let kept = Term::abs("x", vo.a.clone(), capp(&vo.a2, &[&b(1)]));
    assert!(matches!(&*kept, Term::Abs { .. }));
}

#[test]
fn eta_equivalence_checks() {
    let vo = vocab();
    let ty2 = abs(&vo.t, abs(&vo.t, vo.t.clone()));
    let f = FreeVar::new("F", ty2.clone());

    let in_order = Rc::new(Term::Abs {
        param: "x".to_owned(),
        param_ty: vo.t.clone(),
        body: Rc::new(Term::Abs {
            param: "y".to_owned(),
            param_ty: vo.t.clone(),
            body: vapp(&f, &[&b(2), &b(1)]),
        }),
    });
    assert_eq!(in_order.eta_equiv_free_var(), Some(f.clone()));

    let permuted = Rc::new(Term::Abs {
        param: "x".to_owned(),
        param_ty: vo.t.clone(),
        body: Rc::new(Term::Abs {
            param: "y".to_owned(),
            param_ty: vo.t.clone(),
            body: vapp(&f, &[&b(1), &b(2)]),
        }),
    });
    assert_eq!(permuted.eta_equiv_free_var(), None);

    // The permuted form is still recognized by the weaker check.
    let src = FreeVar::new("G", ty2);
    let mut rev = super::Substitution::new();
    assert_eq!(
        permuted.eta_permuted_equiv_free_var(&src, &mut rev),
        Some(f)
    );
}

#[test]
fn application_flattens() {
    let vo = vocab();
    let two = Constant::new("two", abs(&vo.a, abs(&vo.a, vo.a.clone())));
    let partial = capp(&two, &[&Term::Const(vo.a1.clone()).rc()]);
    let full = partial.apply(&[Term::Const(vo.a1.clone()).rc()], 0);
    match &*full {
        Term::App { args, .. } => assert_eq!(args.len(), 2),
        other => panic!("expected flattened application, got {other}"),
    }
}

#[test]
fn unify_var_to_constant() {
    let vo = vocab();
    let a_var = v("A", &vo.a);
    let a1 = Term::Const(vo.a1.clone()).rc();
    assert_unifies(&a_var.to_term(), &a1, &[(&a_var, &a1)]);
}

#[test]
fn unify_var_to_structure() {
    let vo = vocab();
    let a_var = v("A", &vo.a);
    let a1 = Term::Const(vo.a1.clone()).rc();
    let structure = capp(&vo.a2, &[&a1]);
    assert_unifies(&a_var.to_term(), &structure, &[(&a_var, &structure)]);
}

#[test]
fn unify_match_structure() {
    let vo = vocab();
    let a_var = v("A", &vo.a);
    let a1 = Term::Const(vo.a1.clone()).rc();
    let lhs = capp(&vo.a2, &[&a_var.to_term()]);
    let rhs = capp(&vo.a2, &[&a1]);
    assert_unifies(&lhs, &rhs, &[(&a_var, &a1)]);
}

#[test]
fn unify_rejects_non_pattern_function_match() {
    // (A a1) ~ (a2 a1) has a unifier, but it lies outside the pattern
    // fragment, so unification reports failure rather than guessing.
    let vo = vocab();
    let a_var = v("A", &abs(&vo.a, vo.a.clone()));
    let a1 = Term::Const(vo.a1.clone()).rc();
    let lhs = vapp(&a_var, &[&a1]);
    let rhs = capp(&vo.a2, &[&a1]);
    assert!(lhs.unify(&rhs).is_err());

    // The unifier the algorithm refuses to guess does exist:
    let by_hand = super::Substitution::single(
        a_var.clone(),
        abs(&vo.a, capp(&vo.a2, &[&b(1)])),
    )
    .unwrap();
    assert_eq!(lhs.substitute(&by_hand), rhs.substitute(&by_hand));
}

#[test]
fn unify_clashing_constants_fails() {
    let vo = vocab();
    let a1 = Term::Const(vo.a1.clone()).rc();
    let top = Term::Const(vo.top.clone()).rc();
    assert!(matches!(
        a1.unify(&top),
        Err(UnificationError::Clash(..) | UnificationError::IncompatibleTypes(..))
    ));
}

#[test]
fn unify_occurs_check_fires() {
    let vo = vocab();
    let a_var = v("A", &vo.a);
    let cyclic = capp(&vo.a2, &[&a_var.to_term()]);
    assert!(matches!(
        a_var.to_term().unify(&cyclic),
        Err(UnificationError::OccursCheck { .. })
    ));
}

/// Subtyping transitivity with three flexible binary variables under four
/// binders, solved by projection and imitation.
#[test]
fn unify_transitivity_regression() {
    let vo = vocab();
    let t = &vo.t;
    let top = Term::Const(vo.top.clone()).rc();
    let ty2 = abs(t, abs(t, t.clone()));

    let v434 = v("T434", &ty2);
    let v435 = v("T435", &ty2);
    let v436 = v("T436", &ty2);

    // \x. \d: subt(x, Top). \y. \d: subt(y, x -> x). <body>
    let premise = |body: Rc<Term>| {
        abs(
            t,
            abs(
                &capp(&vo.subt, &[&b(1), &top]),
                abs(
                    t,
                    abs(
                        &capp(&vo.subt, &[&b(1), &capp(&vo.arrow, &[&b(3), &b(3)])]),
                        body,
                    ),
                ),
            ),
        )
    };

    let lhs = capp(
        &vo.trans_rule,
        &[
            &premise(capp(&vo.subt, &[&b(2), &capp(&vo.arrow, &[&b(4), &b(4)])])),
            &premise(capp(
                &vo.subt,
                &[
                    &capp(&vo.arrow, &[&b(4), &b(4)]),
                    &capp(&vo.arrow, &[&b(4), &top]),
                ],
            )),
            &premise(capp(&vo.subt, &[&b(2), &capp(&vo.arrow, &[&b(4), &top])])),
        ],
    );

    let flex = |f: &FreeVar| vapp(f, &[&b(4), &b(2)]);
    let rhs = capp(
        &vo.trans_rule,
        &[
            &premise(capp(&vo.subt, &[&flex(&v434), &flex(&v435)])),
            &premise(capp(&vo.subt, &[&flex(&v435), &flex(&v436)])),
            &premise(capp(&vo.subt, &[&flex(&v434), &flex(&v436)])),
        ],
    );

    let expected_434 = abs(t, abs(t, b(1)));
    let expected_435 = abs(t, abs(t, capp(&vo.arrow, &[&b(2), &b(2)])));
    let expected_436 = abs(t, abs(t, capp(&vo.arrow, &[&b(2), &top])));

    assert_unifies(
        &lhs,
        &rhs,
        &[
            (&v434, &expected_434),
            (&v435, &expected_435),
            (&v436, &expected_436),
        ],
    );
}

#[test]
fn unify_round_trip_on_shared_vocabulary() {
    let vo = vocab();
    let x = v("X", &vo.a);
    let y = v("Y", &vo.a);
    let a1 = Term::Const(vo.a1.clone()).rc();

    let cases: Vec<(Rc<Term>, Rc<Term>)> = vec![
        (capp(&vo.a2, &[&x.to_term()]), capp(&vo.a2, &[&y.to_term()])),
        (
            capp(&vo.a2, &[&capp(&vo.a2, &[&x.to_term()])]),
            capp(&vo.a2, &[&capp(&vo.a2, &[&a1])]),
        ),
        (x.to_term(), y.to_term()),
    ];

    for (lhs, rhs) in cases {
        let sub = lhs
            .unify(&rhs)
            .unwrap_or_else(|e| panic!("{lhs} ~ {rhs} failed: {e}"));
        assert_eq!(
            lhs.substitute(&sub),
            rhs.substitute(&sub),
            "round trip failed for {lhs} ~ {rhs}"
        );
    }
}

#[test]
fn freshening_renames_all_free_variables() {
    let vo = vocab();
    let x = v("X", &vo.a);
    let term = capp(&vo.a2, &[&x.to_term()]);
    let mut sub = super::Substitution::new();
    term.fresh_substitution(&mut sub);

    let renamed = term.substitute(&sub);
    assert_ne!(renamed, term);
    let renamed_vars = renamed.free_vars();
    assert_eq!(renamed_vars.len(), 1);
    let fresh = renamed_vars.first().unwrap();
    assert_eq!(fresh.name(), "X");
    assert_ne!(fresh.stamp(), 0);
}
