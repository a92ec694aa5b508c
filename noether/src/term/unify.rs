//! Pattern unification over the term language.
//!
//! The algorithm works off an explicit worklist of term pairs. Pairs whose
//! flexible side falls outside the pattern fragment (a free-variable head
//! applied to something other than bound variables) are deferred to the back
//! of the queue, so that by the time they are examined the easy pairs have
//! already constrained the substitution.

use super::repr::{all_arg_types, arg_types, wrap_with_lambdas, Atom, FreeVar, Term};
use super::Substitution;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnificationError {
    #[error("cannot unify '{0}' with '{1}'")]
    Clash(Rc<Term>, Rc<Term>),

    #[error("cannot unify terms whose types do not match: '{0}' and '{1}'")]
    IncompatibleTypes(Rc<Term>, Rc<Term>),

    #[error("extended occurs check failed: '{var}' is free in '{term}'")]
    OccursCheck { var: FreeVar, term: Rc<Term> },

    #[error("unification not implemented for non-pattern case: '{0}' and '{1}'")]
    Incomplete(Rc<Term>, Rc<Term>),

    #[error("illegal variable binding in result: '{term}' for '{var}'")]
    EscapedBoundVar { var: FreeVar, term: Rc<Term> },
}

type Pair = (Rc<Term>, Rc<Term>);

/// Order classes for pair construction: free variables drive unification
/// before flexible applications, which drive before everything else.
fn order(t: &Term) -> u8 {
    match t {
        Term::Var(_) => 0,
        Term::App { head: Atom::Var(_), .. } => 1,
        _ => 2,
    }
}

/// Builds a pair with the driving term first.
fn make_pair(t1: Rc<Term>, t2: Rc<Term>) -> Pair {
    if order(&t1) < order(&t2) {
        (t1, t2)
    } else {
        (t2, t1)
    }
}

fn is_non_pattern_flex_app(t: &Term) -> bool {
    match t {
        Term::App { head: Atom::Var(_), args } => {
            args.iter().any(|a| !matches!(&**a, Term::Bound(_)))
        }
        _ => false,
    }
}

/// Whether this pair must wait until the pattern pairs have been solved.
fn defers(first: &Term, second: &Term) -> bool {
    match first {
        Term::App { .. } => is_non_pattern_flex_app(first),
        Term::Var(_) => is_non_pattern_flex_app(second),
        _ => false,
    }
}

#[derive(Default)]
struct Worklist {
    ready: VecDeque<Pair>,
    deferred: VecDeque<Pair>,
}

impl Worklist {
    fn push(&mut self, pair: Pair) {
        if defers(&pair.0, &pair.1) {
            self.deferred.push_back(pair);
        } else {
            self.ready.push_back(pair);
        }
    }

    fn pop(&mut self) -> Option<Pair> {
        self.ready.pop_front().or_else(|| self.deferred.pop_front())
    }
}

impl Term {
    /// Computes the most general substitution making this term and `other`
    /// syntactically equal, within the pattern fragment the engine supports.
    ///
    /// Failure is an ordinary, recoverable outcome: a [`Clash`] when rigid
    /// structure differs, an [`OccursCheck`] when a variable would contain
    /// itself, an [`Incomplete`] when the problem falls outside the supported
    /// fragment, and an [`EscapedBoundVar`] when the solution would leak a
    /// bound variable out of its scope.
    ///
    /// [`Clash`]: UnificationError::Clash
    /// [`OccursCheck`]: UnificationError::OccursCheck
    /// [`Incomplete`]: UnificationError::Incomplete
    /// [`EscapedBoundVar`]: UnificationError::EscapedBoundVar
    pub fn unify(&self, other: &Rc<Term>) -> Result<Substitution, UnificationError> {
        let mut current = Substitution::new();
        let mut worklist = Worklist::default();
        worklist.push(make_pair(self.rc(), other.clone()));
        solve(&mut current, &mut worklist)?;

        // A free variable of the inputs must not end up bound to a term with
        // free "bound" variables; that would leak a binder out of its scope.
        let mut vars = self.free_vars();
        vars.extend(other.free_vars());
        for var in vars {
            if let Some(term) = current.get_substituted(&var) {
                if term.has_bound_var_above(0) {
                    log::trace!("could not eliminate bound variables from {term} for {var}");
                    return Err(UnificationError::EscapedBoundVar { var, term });
                }
            }
        }
        Ok(current)
    }
}

fn solve(current: &mut Substitution, worklist: &mut Worklist) -> Result<(), UnificationError> {
    while let Some((first, second)) = worklist.pop() {
        let first_ty = first.ty(&mut Vec::new());
        let second_ty = second.ty(&mut Vec::new());
        if !Term::types_compatible(&first_ty, &second_ty) {
            log::trace!("types {first_ty} and {second_ty} do not match for {first} ~ {second}");
            return Err(UnificationError::IncompatibleTypes(first, second));
        }
        log::trace!("subtask: unify {first} with {second} under {current}");
        unify_pair(&first, &second, current, worklist)?;
    }
    Ok(())
}

fn unify_pair(
    first: &Rc<Term>,
    second: &Rc<Term>,
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    match &**first {
        Term::Var(f) => unify_flex(f, first, second, current, worklist),

        Term::App { head, args } => match head {
            Atom::Const(_) => {
                let Term::App { head: other_head, args: other_args } = &**second else {
                    return Err(UnificationError::Clash(first.clone(), second.clone()));
                };
                if other_args.len() != args.len() {
                    return Err(UnificationError::Clash(first.clone(), second.clone()));
                }
                worklist.push(make_pair(head.to_term(), other_head.to_term()));
                for (a, b) in args.iter().zip(other_args) {
                    worklist.push(make_pair(a.clone(), b.clone()));
                }
                Ok(())
            }
            Atom::Var(f) => {
                if let Some(t) = current.get_substituted(f) {
                    worklist.push(make_pair(t.apply(args, 0), second.clone()));
                    Ok(())
                } else {
                    unify_flex_app(second, f, args, current, worklist)
                }
            }
        },

        Term::Const(_) | Term::Bound(_) => {
            if first == second {
                Ok(())
            } else {
                Err(UnificationError::Clash(first.clone(), second.clone()))
            }
        }

        Term::Abs { param_ty, body, .. } => {
            let Term::Abs { param_ty: other_ty, body: other_body, .. } = &**second else {
                // An eta-normalization pass could rescue some of these.
                return Err(UnificationError::Incomplete(first.clone(), second.clone()));
            };
            let my_var = first.eta_equiv_free_var();
            let other_var = second.eta_equiv_free_var();
            if my_var.is_some() || other_var.is_some() {
                let a = my_var.map_or_else(|| first.clone(), |v| v.to_term());
                let b = other_var.map_or_else(|| second.clone(), |v| v.to_term());
                worklist.push(make_pair(a, b));
            } else {
                worklist.push(make_pair(body.clone(), other_body.clone()));
                worklist.push(make_pair(param_ty.clone(), other_ty.clone()));
            }
            Ok(())
        }
    }
}

/// The driving term is an unapplied free variable.
fn unify_flex(
    f: &FreeVar,
    first: &Rc<Term>,
    second: &Rc<Term>,
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    if let Some(t) = current.get_substituted(f) {
        worklist.push(make_pair(t, second.clone()));
        return Ok(());
    }
    if first == second {
        return Ok(());
    }
    if second.is_pattern_app() {
        // second = (g x1..xn) with g flexible: solve g = \x1..xn. f instead
        // of binding f to a term with escaping bound variables.
        let Term::App { head: Atom::Var(g), args: other_args } = &**second else {
            unreachable!("is_pattern_app guarantees a flexible application");
        };
        if current.get_substituted(g).is_some() {
            worklist.push(make_pair(first.clone(), second.substitute(current)));
            return Ok(());
        }
        let var_match =
            wrap_with_lambdas(first.clone(), &arg_types(g.ty(), other_args.len()));
        return current.add(g.clone(), var_match);
    }
    current.add(f.clone(), second.clone())
}

/// The driving term is `f(args)` with `f` unbound; dispatch on the other
/// side's shape.
fn unify_flex_app(
    other: &Rc<Term>,
    f: &FreeVar,
    args: &[Rc<Term>],
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    match &**other {
        Term::Const(_) => {
            // C = (f x1..xn): set f = \x1..xn. C, capturing nothing.
            let error_app = Term::app(Atom::Var(f.clone()), args.to_vec());
            if args.iter().any(|a| !matches!(&**a, Term::Bound(_))) {
                return Err(UnificationError::Incomplete(error_app, other.clone()));
            }
            let wrapped = wrap_with_lambdas(other.clone(), &all_arg_types(f.ty()));
            current.add(f.clone(), wrapped)
        }

        Term::Bound(_) => {
            // y = (f x1..xn): f projects onto the position of y among its
            // arguments, counted from the right.
            let error_app = Term::app(Atom::Var(f.clone()), args.to_vec());
            if args.iter().any(|a| !matches!(&**a, Term::Bound(_))) {
                return Err(UnificationError::Incomplete(error_app, other.clone()));
            }
            let position = (1..=args.len())
                .find(|i| *other == args[args.len() - i])
                .ok_or_else(|| UnificationError::Clash(error_app, other.clone()))?;
            let wrapped =
                wrap_with_lambdas(Term::bound(position as i64), &all_arg_types(f.ty()));
            current.add(f.clone(), wrapped)
        }

        Term::Abs { body, .. } => {
            // Push the flexible application under the binder.
            let mut new_args: Vec<Rc<Term>> =
                args.iter().map(|t| t.incr_free_debruijn(1)).collect();
            new_args.push(Term::bound(1));
            let new_app = Term::app(Atom::Var(f.clone()), new_args);
            worklist.push(make_pair(new_app, body.clone()));
            Ok(())
        }

        Term::Var(_) => unreachable!("flex-flex with a bare variable is ordered the other way"),

        Term::App { head: Atom::Const(c), args: own_args } => {
            flex_rigid_app(other, c.clone(), own_args, f, args, current, worklist)
        }

        Term::App { head: Atom::Var(g), args: own_args } => {
            flex_flex_app(other, g.clone(), own_args, f, args, current, worklist)
        }
    }
}

/// `C(e1..en) = f(u1..um)` with `C` rigid: imitate. Each argument of `C`
/// becomes a fresh helper variable; inside `f`'s solution the helpers are
/// applied to `f`'s own binders, while the constraints pairing them with
/// `C`'s arguments use `f`'s original argument list.
fn flex_rigid_app(
    other: &Rc<Term>,
    constant: super::repr::Constant,
    own_args: &[Rc<Term>],
    f: &FreeVar,
    args: &[Rc<Term>],
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    let error_app = Term::app(Atom::Var(f.clone()), args.to_vec());
    if other.free_vars().contains(f) {
        // Recursion through the rigid head.
        return Err(UnificationError::Clash(error_app, other.clone()));
    }

    // Under the binders wrapped around f's solution, the helper takes the
    // binder variables positionally: argument i refers to binder m - i.
    let positional: Vec<Rc<Term>> = (0..args.len())
        .map(|i| Term::bound((args.len() - i) as i64))
        .collect();

    let f_arg_types = arg_types(f.ty(), args.len());
    let mut partial_ty = constant.ty();
    let mut new_args = Vec::with_capacity(own_args.len());
    for own in own_args {
        let (param_ty, rest) = split_arrow(&partial_ty);
        partial_ty = rest;
        let helper = FreeVar::fresh("H", wrap_with_lambdas(param_ty, &f_arg_types));
        new_args.push(Term::app(Atom::Var(helper.clone()), positional.clone()));
        let helper_app = Term::app(Atom::Var(helper), args.to_vec());
        worklist.push(make_pair(helper_app, own.clone()));
    }

    let var_match =
        wrap_with_lambdas(Term::app(Atom::Const(constant), new_args), &f_arg_types);
    current.add(f.clone(), var_match)
}

/// `g(e1..en) = f(u1..um)` with both heads flexible.
fn flex_flex_app(
    other: &Rc<Term>,
    g: FreeVar,
    own_args: &[Rc<Term>],
    f: &FreeVar,
    args: &[Rc<Term>],
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    if let Some(t) = current.get_substituted(&g) {
        let f_app = Term::app(Atom::Var(f.clone()), args.to_vec());
        worklist.push(make_pair(t.apply(own_args, 0), f_app));
        return Ok(());
    }

    if g == *f {
        // Same head on both sides: unify the spines argument by argument.
        assert_eq!(
            args.len(),
            own_args.len(),
            "internal invariant: arguments to a variable must have equal length"
        );
        for (a, b) in args.iter().zip(own_args) {
            worklist.push(make_pair(a.clone(), b.clone()));
        }
        return Ok(());
    }

    let error_app = Term::app(Atom::Var(f.clone()), args.to_vec());

    if !error_app.is_pattern_app() {
        return try_eta_long_case(&error_app, other, current, worklist);
    }
    if !other.is_pattern_app() {
        return try_eta_long_case(other, &error_app, current, worklist);
    }

    // Both sides are patterns with distinct heads (flex-flex): project both
    // onto a fresh variable over their common arguments.
    let mut common_args: Vec<Rc<Term>> = own_args.to_vec();
    let mut common_types = arg_types(g.ty(), own_args.len());
    let mut residual_ty = g.ty().clone();
    let mut i = 0;
    while i < common_args.len() {
        if args.contains(&common_args[i]) {
            i += 1;
        } else {
            common_args.remove(i);
            common_types.remove(i);
        }
        residual_ty = split_arrow(&residual_ty).1;
    }

    let helper = FreeVar::fresh("H", wrap_with_lambdas(residual_ty, &common_types));
    let var_match = compute_var_match(
        &helper,
        &common_args,
        own_args,
        &arg_types(g.ty(), own_args.len()),
        current,
        other,
        &error_app,
    )?;
    let other_var_match = compute_var_match(
        &helper,
        &common_args,
        args,
        &arg_types(f.ty(), args.len()),
        current,
        other,
        &error_app,
    )?;
    current.add(g, var_match)?;
    current.add(f.clone(), other_var_match)
}

/// Builds `\targets. H(positions of the common arguments)` for one side of a
/// flex-flex pattern pair.
fn compute_var_match(
    helper: &FreeVar,
    common_args: &[Rc<Term>],
    target_args: &[Rc<Term>],
    target_types: &[Rc<Term>],
    current: &Substitution,
    other: &Rc<Term>,
    error_app: &Rc<Term>,
) -> Result<Rc<Term>, UnificationError> {
    let substituted: Vec<Rc<Term>> =
        target_args.iter().map(|t| t.substitute(current)).collect();

    let mut projected = Vec::with_capacity(common_args.len());
    for arg in common_args {
        let arg = arg.substitute(current);
        let found = substituted
            .iter()
            .position(|t| *t == arg)
            .ok_or_else(|| UnificationError::Clash(other.clone(), error_app.clone()))?;
        projected.push(Term::bound((target_args.len() - found) as i64));
    }

    let var_match = if projected.is_empty() {
        helper.to_term()
    } else {
        Term::app(Atom::Var(helper.clone()), projected)
    };
    Ok(wrap_with_lambdas(var_match, target_types))
}

/// Repairs flexible pairs whose argument lists differ in length because one
/// side is in eta-long form.
fn try_eta_long_case(
    recv: &Rc<Term>,
    app: &Rc<Term>,
    current: &mut Substitution,
    worklist: &mut Worklist,
) -> Result<(), UnificationError> {
    let Term::App { head: recv_head, args: recv_args } = &**recv else {
        unreachable!("eta-long repair runs on applications only");
    };
    let Term::App { head: app_head, args: app_args } = &**app else {
        unreachable!("eta-long repair runs on applications only");
    };

    let size_delta = recv_args.len() as i64 - app_args.len() as i64;
    if size_delta <= 0 {
        worklist.push(make_pair(recv_head.to_term(), app_head.to_term()));
        for i in 0..recv_args.len() {
            worklist.push(make_pair(app_args[i].clone(), recv_args[i].clone()));
        }
        return Ok(());
    }

    let delta = size_delta as usize;
    let arg_tail_identical =
        (0..app_args.len()).all(|i| recv_args[i + delta] == app_args[i]);

    // When one side is a pattern, project the other onto its argument
    // positions.
    let pattern_pair = if app.is_pattern_app() {
        Some((app, recv))
    } else if recv.is_pattern_app() {
        Some((recv, app))
    } else {
        None
    };

    if let Some((pattern, the_other)) = pattern_pair {
        let Term::App { head: Atom::Var(pattern_head), args: pattern_args } = &**pattern
        else {
            unreachable!("pattern side must be a flexible application");
        };
        let indexes: Vec<i64> = pattern_args
            .iter()
            .map(|a| match &**a {
                Term::Bound(i) => *i,
                _ => unreachable!("pattern arguments are bound variables"),
            })
            .collect();
        let max_index = indexes.iter().copied().max().unwrap_or(0);

        let mut result: Rc<Term> = (*the_other).clone();
        for _ in 0..max_index {
            result = Term::abs("x", Term::unknown(), result);
        }
        let arg_list: Vec<Rc<Term>> = (0..max_index)
            .map(|i| match indexes.iter().position(|&x| x == i) {
                Some(position) => Term::bound(position as i64),
                None => Term::bound(i + indexes.len() as i64),
            })
            .collect();
        let mut result = result.apply(&arg_list, 0);
        let pattern_types = arg_types(pattern_head.ty(), pattern_args.len());
        for ty in pattern_types.iter().take(pattern_args.len()) {
            result = Term::abs("x", ty.clone(), result);
        }
        current.add(pattern_head.clone(), result)?;
        return Ok(());
    }

    if arg_tail_identical {
        // The shorter side's head absorbs the extra leading arguments.
        let Atom::Var(other_var) = app_head else {
            return Err(UnificationError::Incomplete(app.clone(), recv.clone()));
        };
        let leading = recv_args[..delta].to_vec();
        let new_head = recv_head.to_term().apply(&leading, 0);
        log::trace!("fixing up eta-long case: {other_var} ==> {new_head}");
        return current.add(other_var.clone(), new_head);
    }

    Err(UnificationError::Incomplete(app.clone(), recv.clone()))
}

fn split_arrow(ty: &Rc<Term>) -> (Rc<Term>, Rc<Term>) {
    match &**ty {
        Term::Abs { param_ty, body, .. } => (param_ty.clone(), body.clone()),
        _ => (Term::unknown(), Term::unknown()),
    }
}
