use super::Substitution;
use itertools::Itertools;
use indexmap::IndexSet;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const KIND_NAME: &str = "TYPE";
const UNKNOWN_NAME: &str = "UNKNOWN_TYPE";

thread_local! {
    static NEXT_STAMP: Cell<u64> = const { Cell::new(1) };
}

fn next_stamp() -> u64 {
    NEXT_STAMP.with(|s| {
        let result = s.get();
        s.set(result + 1);
        result
    })
}

/// A named leaf with an intrinsic type. Two constants are equal iff their
/// names are equal; the type plays no part in identity.
#[derive(Debug, Clone)]
pub struct Constant {
    name: Rc<str>,
    // `None` marks the distinguished `TYPE` constant, whose type is itself.
    ty: Option<Rc<Term>>,
}

impl Constant {
    pub fn new(name: impl Into<Rc<str>>, ty: Rc<Term>) -> Self {
        Self { name: name.into(), ty: Some(ty) }
    }

    /// The `TYPE` constant, the type of all types.
    pub fn kind() -> Self {
        Self { name: KIND_NAME.into(), ty: None }
    }

    /// The `UNKNOWN_TYPE` constant, standing in when binding information is
    /// missing. Type equality treats it as equal to everything.
    pub fn unknown() -> Self {
        Self { name: UNKNOWN_NAME.into(), ty: Some(Rc::new(Term::Const(Self::kind()))) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Rc<Term> {
        match &self.ty {
            Some(t) => t.clone(),
            None => Rc::new(Term::Const(Self::kind())),
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named placeholder for an as-yet-undetermined subterm. Identity is the
/// pair of name and stamp; stamp 0 is reserved for user-written variables and
/// every freshened copy draws a globally unique nonzero stamp.
#[derive(Debug, Clone)]
pub struct FreeVar {
    name: Rc<str>,
    stamp: u64,
    ty: Rc<Term>,
}

impl FreeVar {
    pub fn new(name: impl Into<Rc<str>>, ty: Rc<Term>) -> Self {
        Self { name: name.into(), stamp: 0, ty }
    }

    pub fn fresh(name: impl Into<Rc<str>>, ty: Rc<Term>) -> Self {
        Self { name: name.into(), stamp: next_stamp(), ty }
    }

    /// A copy of this variable with a new unique stamp.
    pub fn freshened(&self) -> Self {
        Self { name: self.name.clone(), stamp: next_stamp(), ty: self.ty.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn ty(&self) -> &Rc<Term> {
        &self.ty
    }

    /// The result type after stripping all argument binders.
    pub fn base_ty(&self) -> Rc<Term> {
        let mut ty = self.ty.clone();
        while let Term::Abs { body, .. } = &*ty.clone() {
            ty = body.clone();
        }
        ty
    }

    pub fn to_term(&self) -> Rc<Term> {
        Rc::new(Term::Var(self.clone()))
    }
}

impl PartialEq for FreeVar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stamp == other.stamp
    }
}

impl Eq for FreeVar {}

impl Hash for FreeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for FreeVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.stamp == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}_{}", self.name, self.stamp)
        }
    }
}

/// The function position of an application: always a constant or a free
/// variable, never a compound term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    Const(Constant),
    Var(FreeVar),
}

impl Atom {
    pub fn ty(&self) -> Rc<Term> {
        match self {
            Atom::Const(c) => c.ty(),
            Atom::Var(v) => v.ty().clone(),
        }
    }

    pub fn to_term(&self) -> Rc<Term> {
        Rc::new(match self {
            Atom::Const(c) => Term::Const(c.clone()),
            Atom::Var(v) => Term::Var(v.clone()),
        })
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Atom::Const(c) => write!(f, "{c}"),
            Atom::Var(v) => write!(f, "{v}"),
        }
    }
}

/// A term of the logical framework.
///
/// Terms are kept beta-normal and eta-contracted by construction: applying an
/// application flattens, applying an abstraction substitutes, and the [`abs`]
/// constructor eta-reduces where legal.
///
/// [`abs`]: Term::abs
#[derive(Debug, Clone)]
pub enum Term {
    /// A constant leaf.
    Const(Constant),

    /// A free (existential or universal) variable.
    Var(FreeVar),

    /// A bound-variable reference: a 1-based de Bruijn index relative to the
    /// enclosing [`Term::Abs`] binders. Indices at or below zero appear only
    /// transiently inside capturing substitutions.
    Bound(i64),

    /// An application of an atom to one or more arguments.
    App { head: Atom, args: Vec<Rc<Term>> },

    /// An abstraction binder. The parameter name is display-only and takes no
    /// part in equality.
    Abs {
        param: String,
        param_ty: Rc<Term>,
        body: Rc<Term>,
    },
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Const(a), Term::Const(b)) => a == b,
            (Term::Var(a), Term::Var(b)) => a == b,
            (Term::Bound(a), Term::Bound(b)) => a == b,
            (Term::App { head: h1, args: a1 }, Term::App { head: h2, args: a2 }) => {
                h1 == h2 && a1 == a2
            }
            (
                Term::Abs { param_ty: t1, body: b1, .. },
                Term::Abs { param_ty: t2, body: b2, .. },
            ) => b1 == b2 && t1.type_equals(t2),
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Abstractions hash by body alone: their equality is modulo unknown
        // parameter types, so the parameter type cannot participate.
        match self {
            Term::Const(c) => c.hash(state),
            Term::Var(v) => v.hash(state),
            Term::Bound(i) => i.hash(state),
            Term::App { head, args } => {
                head.hash(state);
                args.hash(state);
            }
            Term::Abs { body, .. } => body.hash(state),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Const(c) => write!(f, "{c}"),
            Term::Var(v) => write!(f, "{v}"),
            Term::Bound(i) => write!(f, "#{i}"),
            Term::App { head, args } => {
                write!(f, "({} {})", head, args.iter().format(" "))
            }
            Term::Abs { param, param_ty, body } => {
                write!(f, "(\\{param}:{param_ty}. {body})")
            }
        }
    }
}

impl Term {
    pub(crate) fn rc(&self) -> Rc<Term> {
        Rc::new(self.clone())
    }

    /// The `TYPE` constant as a term.
    pub fn kind() -> Rc<Term> {
        Rc::new(Term::Const(Constant::kind()))
    }

    /// The `UNKNOWN_TYPE` constant as a term.
    pub fn unknown() -> Rc<Term> {
        Rc::new(Term::Const(Constant::unknown()))
    }

    pub fn constant(name: impl Into<Rc<str>>, ty: Rc<Term>) -> Rc<Term> {
        Rc::new(Term::Const(Constant::new(name, ty)))
    }

    pub fn var(name: impl Into<Rc<str>>, ty: Rc<Term>) -> Rc<Term> {
        Rc::new(Term::Var(FreeVar::new(name, ty)))
    }

    pub fn bound(index: i64) -> Rc<Term> {
        Rc::new(Term::Bound(index))
    }

    /// Builds an application. Higher-order free-variable arguments are
    /// converted to eta-long form so that terms stay in the canonical shape
    /// unification expects.
    pub fn app(head: Atom, args: Vec<Rc<Term>>) -> Rc<Term> {
        assert!(!args.is_empty(), "empty application argument list");
        let needs_eta_long = args
            .iter()
            .any(|a| matches!(&**a, Term::Var(v) if v.ty().count_lambdas() > 0));
        let args = if needs_eta_long {
            args.iter().map(|a| a.to_eta_long()).collect()
        } else {
            args
        };
        Rc::new(Term::App { head, args })
    }

    /// Builds an abstraction, eta-reducing `\x. (f ... x)` to `(f ...)` when
    /// `x` does not otherwise occur and `f` is not a fully applied free
    /// variable (the latter must stay eta-long).
    pub fn abs(param: impl Into<String>, param_ty: Rc<Term>, body: Rc<Term>) -> Rc<Term> {
        if let Term::App { head, args } = &*body {
            let fully_applied =
                matches!(head, Atom::Var(v) if args.len() == v.ty().count_lambdas());
            let last_is_bound_one =
                matches!(args.last().map(|t| &**t), Some(Term::Bound(1)));
            if !fully_applied && matches!(head, Atom::Var(_)) && last_is_bound_one {
                let candidate = if args.len() == 1 {
                    head.to_term()
                } else {
                    Term::app(head.clone(), args[..args.len() - 1].to_vec())
                };
                if !candidate.has_bound_var(1) {
                    return candidate.shift_free(0, -1);
                }
            }
        }
        Rc::new(Term::Abs { param: param.into(), param_ty, body })
    }

    pub fn as_free_var(&self) -> Option<&FreeVar> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            Term::Const(c) => Some(Atom::Const(c.clone())),
            Term::Var(v) => Some(Atom::Var(v.clone())),
            _ => None,
        }
    }

    fn is_unknown(&self) -> bool {
        matches!(self, Term::Const(c) if c.name() == UNKNOWN_NAME)
    }

    /// Type equality with `UNKNOWN_TYPE` acting as a wildcard.
    pub fn type_equals(&self, other: &Term) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return true;
        }
        match (self, other) {
            (Term::App { head: h1, args: a1 }, Term::App { head: h2, args: a2 }) => {
                a1.len() == a2.len()
                    && h1.to_term().type_equals(&h2.to_term())
                    && a1.iter().zip(a2).all(|(x, y)| x.type_equals(y))
            }
            (
                Term::Abs { param_ty: t1, body: b1, .. },
                Term::Abs { param_ty: t2, body: b2, .. },
            ) => b1.type_equals(b2) && t1.type_equals(t2),
            _ => self == other,
        }
    }

    /// True if there is hope these two types might ever be unified.
    pub(crate) fn types_compatible(t1: &Term, t2: &Term) -> bool {
        if t1.is_unknown() || t2.is_unknown() {
            return true;
        }
        if matches!(t1, Term::Abs { .. }) && t1.count_lambdas() == t2.count_lambdas() {
            return true;
        }
        t1 == t2
    }

    pub fn count_lambdas(&self) -> usize {
        match self {
            Term::Abs { body, .. } => 1 + body.count_lambdas(),
            _ => 0,
        }
    }

    pub fn has_bound_var(&self, index: i64) -> bool {
        match self {
            Term::Const(_) | Term::Var(_) => false,
            Term::Bound(i) => *i == index,
            Term::App { args, .. } => args.iter().any(|a| a.has_bound_var(index)),
            Term::Abs { param_ty, body, .. } => {
                body.has_bound_var(index + 1) || param_ty.has_bound_var(index)
            }
        }
    }

    pub fn has_bound_var_above(&self, index: i64) -> bool {
        match self {
            Term::Const(_) | Term::Var(_) => false,
            Term::Bound(i) => *i > index,
            Term::App { args, .. } => args.iter().any(|a| a.has_bound_var_above(index)),
            Term::Abs { param_ty, body, .. } => {
                body.has_bound_var_above(index + 1) || param_ty.has_bound_var_above(index)
            }
        }
    }

    /// Increments de Bruijn indices that are free at this level by `amount`.
    pub fn incr_free_debruijn(&self, amount: i64) -> Rc<Term> {
        self.shift_free(0, amount)
    }

    pub(crate) fn shift_free(&self, nested: i64, amount: i64) -> Rc<Term> {
        match self {
            Term::Const(_) | Term::Var(_) => self.rc(),
            Term::Bound(i) => {
                if *i <= nested && *i > 0 {
                    self.rc()
                } else {
                    Term::bound(i + amount)
                }
            }
            Term::App { head, args } => {
                // Heads are atoms and cannot mention bound variables.
                let args = args.iter().map(|a| a.shift_free(nested, amount)).collect();
                Rc::new(Term::App { head: head.clone(), args })
            }
            Term::Abs { param, param_ty, body } => Term::abs(
                param.clone(),
                param_ty.shift_free(nested, amount),
                body.shift_free(nested + 1, amount),
            ),
        }
    }

    pub fn free_vars(&self) -> IndexSet<FreeVar> {
        let mut set = IndexSet::new();
        self.collect_free_vars(&mut set);
        set
    }

    pub(crate) fn collect_free_vars(&self, set: &mut IndexSet<FreeVar>) {
        match self {
            Term::Const(_) | Term::Bound(_) => {}
            Term::Var(v) => {
                set.insert(v.clone());
            }
            Term::App { head, args } => {
                if let Atom::Var(v) = head {
                    set.insert(v.clone());
                }
                for a in args {
                    a.collect_free_vars(set);
                }
            }
            Term::Abs { param_ty, body, .. } => {
                body.collect_free_vars(set);
                param_ty.collect_free_vars(set);
            }
        }
    }

    /// The type of this term relative to a binding context (innermost
    /// binding last). Missing binding information yields `UNKNOWN_TYPE`
    /// rather than an error.
    pub fn ty(&self, bindings: &mut Vec<(String, Rc<Term>)>) -> Rc<Term> {
        match self {
            Term::Const(c) => c.ty(),
            Term::Var(v) => v.ty().clone(),
            Term::Bound(i) => {
                let index = bindings.len() as i64 - i;
                if index < 0 || index >= bindings.len() as i64 {
                    Term::unknown()
                } else {
                    bindings[index as usize].1.clone()
                }
            }
            Term::App { head, args } => {
                let mut fun_ty = head.ty();
                for _ in args {
                    match &*fun_ty.clone() {
                        Term::Abs { body, .. } => fun_ty = body.clone(),
                        _ => return Term::unknown(),
                    }
                }
                fun_ty
            }
            Term::Abs { param, param_ty, body } => {
                bindings.push((param.clone(), param_ty.clone()));
                let body_ty = body.ty(bindings);
                bindings.pop();
                Term::abs(param.clone(), param_ty.clone(), body_ty)
            }
        }
    }

    /// Applies this term to `arguments`, flattening applications and
    /// beta-reducing through abstractions. `which_applied` tracks how many
    /// binders have been crossed; external callers pass 0.
    pub fn apply(&self, arguments: &[Rc<Term>], which_applied: usize) -> Rc<Term> {
        match self {
            Term::Const(_) | Term::Var(_) => {
                if which_applied < arguments.len() {
                    let atom = self.as_atom().expect("atoms only");
                    Term::app(atom, arguments[which_applied..].to_vec())
                } else {
                    self.rc()
                }
            }
            Term::Bound(i) => {
                assert!(
                    which_applied >= arguments.len(),
                    "application invariant broken in term system"
                );
                let arg_index = which_applied as i64 - i;
                if arg_index >= 0 && arg_index < arguments.len() as i64 {
                    arguments[arg_index as usize].clone()
                } else {
                    self.rc()
                }
            }
            Term::App { head, args } => {
                let consumed = arguments.len().min(which_applied);
                let mut new_args: Vec<Rc<Term>> = if which_applied > 0 {
                    args.iter()
                        .map(|a| a.apply(&arguments[..consumed], which_applied))
                        .collect()
                } else {
                    args.clone()
                };
                new_args.extend(arguments[consumed..].iter().cloned());
                Term::app(head.clone(), new_args)
            }
            Term::Abs { param, param_ty, body } => {
                let which_applied = which_applied + 1;
                let shifted: Vec<Rc<Term>> =
                    arguments.iter().map(|t| t.incr_free_debruijn(1)).collect();
                let new_body = body.apply(&shifted, which_applied);
                if which_applied <= arguments.len() {
                    // An argument was just consumed by this binder.
                    new_body.incr_free_debruijn(-1)
                } else {
                    Term::abs(param.clone(), param_ty.clone(), new_body)
                }
            }
        }
    }

    /// Replaces every free variable bound in `sub` by its value, shifting
    /// de Bruijn indices by the binder depth crossed. Pure: neither the
    /// receiver nor the substitution is modified.
    pub fn substitute(&self, sub: &Substitution) -> Rc<Term> {
        self.substitute_shifted(sub, 0)
    }

    pub(crate) fn substitute_shifted(&self, sub: &Substitution, shift: i64) -> Rc<Term> {
        match self {
            Term::Const(_) | Term::Bound(_) => self.rc(),
            Term::Var(v) => match sub.get_substituted(v) {
                Some(t) => t.incr_free_debruijn(shift),
                None => self.rc(),
            },
            Term::App { head, args } => {
                let new_args: Vec<Rc<Term>> =
                    args.iter().map(|a| a.substitute_shifted(sub, shift)).collect();
                match head {
                    Atom::Var(v) => match sub.get_substituted(v) {
                        Some(t) => t.incr_free_debruijn(shift).apply(&new_args, 0),
                        None => Term::app(head.clone(), new_args),
                    },
                    Atom::Const(_) => Term::app(head.clone(), new_args),
                }
            }
            Term::Abs { param, param_ty, body } => Term::abs(
                param.clone(),
                param_ty.substitute_shifted(sub, shift),
                body.substitute_shifted(sub, shift + 1),
            ),
        }
    }

    /// Extends `sub` so that every free variable of this term not already in
    /// its domain maps to a freshened copy of itself.
    pub fn fresh_substitution(&self, sub: &mut Substitution) {
        for v in self.free_vars() {
            if sub.get_substituted(&v).is_none() {
                sub.add(v.clone(), v.freshened().to_term())
                    .expect("freshening a variable cannot fail");
            }
        }
    }

    /// Returns the free variable this term is eta-equivalent to, if any: the
    /// term must be either a free variable itself or `\x1..xn. v xn..x1` with
    /// the enclosing binders applied in order.
    pub fn eta_equiv_free_var(&self) -> Option<FreeVar> {
        match self {
            Term::Var(v) => Some(v.clone()),
            Term::Abs { .. } => {
                let mut t = self;
                let mut arg_count: i64 = 0;
                while let Term::Abs { body, .. } = t {
                    t = body;
                    arg_count += 1;
                }
                let Term::App { head, args } = t else {
                    return None;
                };
                if args.len() as i64 != arg_count {
                    return None;
                }
                let Atom::Var(v) = head else {
                    return None;
                };
                for (i, arg) in args.iter().enumerate() {
                    match &**arg {
                        Term::Bound(index) if *index == arg_count - i as i64 => {}
                        _ => return None,
                    }
                }
                Some(v.clone())
            }
            _ => None,
        }
    }

    /// The weaker eta check that tolerates a permuted argument order: if this
    /// term is `\xs. f (permutation of xs)`, returns `f` and extends `rev`
    /// with the reverse binding `f -> \ys. src (inverse permutation)` needed
    /// to compensate. A bare free variable succeeds trivially.
    pub fn eta_permuted_equiv_free_var(
        &self,
        src: &FreeVar,
        rev: &mut Substitution,
    ) -> Option<FreeVar> {
        match self {
            Term::Var(v) => {
                rev.add(v.clone(), src.to_term()).ok()?;
                Some(v.clone())
            }
            Term::Abs { .. } => {
                let mut t = self;
                let mut wrappers: Vec<(&String, &Rc<Term>)> = Vec::new();
                while let Term::Abs { param, param_ty, body } = t {
                    wrappers.push((param, param_ty));
                    t = body;
                }
                let arg_count = wrappers.len();
                let Term::App { head, args } = t else {
                    return None;
                };
                if args.len() != arg_count {
                    return None;
                }
                let Atom::Var(v) = head else {
                    return None;
                };
                let mut indices = vec![0usize; arg_count];
                let mut reverse = vec![0i64; arg_count];
                for (i, arg) in args.iter().enumerate() {
                    let Term::Bound(index) = &**arg else {
                        return None;
                    };
                    if *index > arg_count as i64 || *index < 1 {
                        return None;
                    }
                    let slot = arg_count - *index as usize;
                    if reverse[slot] != 0 {
                        return None; // not a permutation
                    }
                    indices[i] = slot;
                    reverse[slot] = (arg_count - i) as i64;
                }
                let rev_args: Vec<Rc<Term>> =
                    reverse.iter().map(|&i| Term::bound(i)).collect();
                let mut wrapped = Term::app(Atom::Var(src.clone()), rev_args);
                for i in (0..arg_count).rev() {
                    let (name, ty) = wrappers[indices[i]];
                    wrapped = Term::abs(name.clone(), ty.clone(), wrapped);
                }
                rev.add(v.clone(), wrapped).ok()?;
                Some(v.clone())
            }
            _ => None,
        }
    }

    /// Converts a higher-order free variable to its eta-long form
    /// `\x1..xn. v xn..x1`; anything else is returned unchanged.
    pub fn to_eta_long(&self) -> Rc<Term> {
        let Term::Var(v) = self else {
            return self.rc();
        };
        let num_lambdas = v.ty().count_lambdas();
        if num_lambdas == 0 {
            return self.rc();
        }
        let mut args = Vec::with_capacity(num_lambdas);
        let mut types = Vec::with_capacity(num_lambdas);
        let mut ty = v.ty().clone();
        for i in (1..=num_lambdas as i64).rev() {
            args.push(Term::bound(i));
            ty = match &*ty {
                Term::Abs { param_ty, body, .. } => {
                    types.push(param_ty.clone());
                    body.clone()
                }
                _ => return self.rc(),
            };
        }
        let mut result = Term::app(Atom::Var(v.clone()), args);
        for ty in types.iter().rev() {
            result = Rc::new(Term::Abs {
                param: "x".to_owned(),
                param_ty: ty.clone(),
                body: result,
            });
        }
        log::trace!("converted to eta long: {self} to {result}");
        result
    }

    /// True for a pattern application: a free-variable head applied to bound
    /// variables only.
    pub(crate) fn is_pattern_app(&self) -> bool {
        match self {
            Term::App { head: Atom::Var(_), args } => {
                args.iter().all(|a| matches!(&**a, Term::Bound(_)))
            }
            _ => false,
        }
    }
}

/// Wraps `term` in one abstraction per entry of `arg_types`, outermost first.
pub(crate) fn wrap_with_lambdas(term: Rc<Term>, arg_types: &[Rc<Term>]) -> Rc<Term> {
    let mut term = term;
    for ty in arg_types.iter().rev() {
        term = Term::abs("x", ty.clone(), term);
    }
    term
}

/// The first `count` argument types of an arrow type, padding with
/// `UNKNOWN_TYPE` if the arrow runs out.
pub(crate) fn arg_types(ty: &Rc<Term>, count: usize) -> Vec<Rc<Term>> {
    let mut out = Vec::with_capacity(count);
    let mut ty = ty.clone();
    for _ in 0..count {
        match &*ty.clone() {
            Term::Abs { param_ty, body, .. } => {
                out.push(param_ty.clone());
                ty = body.clone();
            }
            _ => out.push(Term::unknown()),
        }
    }
    out
}

/// All argument types of an arrow type.
pub(crate) fn all_arg_types(ty: &Rc<Term>) -> Vec<Rc<Term>> {
    let mut out = Vec::new();
    let mut ty = ty.clone();
    while let Term::Abs { param_ty, body, .. } = &*ty.clone() {
        out.push(param_ty.clone());
        ty = body.clone();
    }
    out
}
