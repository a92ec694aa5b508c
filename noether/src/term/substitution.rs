use super::repr::{FreeVar, Term};
use super::unify::UnificationError;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;

/// A mapping from free variables to terms.
///
/// The map is kept eagerly composed: adding a binding substitutes it through
/// every existing entry, so no entry's value ever mentions another key and
/// [`get_substituted`] never needs to re-substitute. The backing map is held
/// behind an `Rc` so cloning a substitution (for example onto the prover's
/// undo stack) is a pointer copy; the first mutation after a clone copies the
/// entries.
///
/// [`get_substituted`]: Substitution::get_substituted
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: Rc<IndexMap<FreeVar, Rc<Term>>>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// A substitution with the single binding `var -> term`. Fails the
    /// occurs check if `var` is free in `term`.
    pub fn single(var: FreeVar, term: Rc<Term>) -> Result<Self, UnificationError> {
        let mut this = Self::new();
        this.add(var, term)?;
        Ok(this)
    }

    fn singleton_unchecked(var: FreeVar, term: Rc<Term>) -> Self {
        let mut map = IndexMap::new();
        map.insert(var, term);
        Self { map: Rc::new(map) }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// The variables mapped by this substitution.
    pub fn domain(&self) -> impl Iterator<Item = &FreeVar> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FreeVar, &Rc<Term>)> {
        self.map.iter()
    }

    /// What `var` is substituted with, or `None` if unbound. O(1); values
    /// are already fully substituted.
    pub fn get_substituted(&self, var: &FreeVar) -> Option<Rc<Term>> {
        self.map.get(var).cloned()
    }

    /// Free variables in the range of the substitution.
    pub fn free_vars(&self) -> IndexSet<FreeVar> {
        let mut result = IndexSet::new();
        for value in self.map.values() {
            value.collect_free_vars(&mut result);
        }
        result
    }

    pub fn is_unifier(&self, t1: &Rc<Term>, t2: &Rc<Term>) -> bool {
        t1.substitute(self) == t2.substitute(self)
    }

    /// Adds a binding to this substitution. The value is substituted through
    /// the current map first, keeping the map eagerly composed, and adding
    /// `X -> X` leaves the map unchanged. If the variable already has a
    /// binding, the two values are unified and the unifier composed in.
    ///
    /// Fails with [`UnificationError::OccursCheck`] when `var` would end up
    /// free in its own value (directly or through existing bindings), and
    /// with any unification error arising from a conflicting prior binding.
    pub fn add(&mut self, var: FreeVar, term: Rc<Term>) -> Result<(), UnificationError> {
        log::trace!("substituting {term} for {var}, adding to {self}");

        let mut value = if self.map.is_empty() {
            term
        } else {
            term.substitute(self)
        };

        // Adding X -> X (up to eta) is a no-op.
        if value.eta_equiv_free_var().as_ref() == Some(&var) {
            return Ok(());
        }

        if value.free_vars().contains(&var) {
            return Err(UnificationError::OccursCheck { var, term: value });
        }

        // Substitute the new binding through the existing entries.
        if !self.map.is_empty() {
            let new_binding = Self::singleton_unchecked(var.clone(), value.clone());
            let map = Rc::make_mut(&mut self.map);
            for (_, existing) in map.iter_mut() {
                *existing = existing.substitute(&new_binding);
            }
        }

        if let Some(old) = self.get_substituted(&var) {
            let unifier = old.unify(&value)?;
            value = value.substitute(&unifier);
            self.compose(&unifier);
        }

        Rc::make_mut(&mut self.map).insert(var, value);
        debug_assert!(self.well_formed(), "add broke the substitution invariant");
        Ok(())
    }

    /// Removes a binding, returning the old value.
    pub fn remove(&mut self, var: &FreeVar) -> Option<Rc<Term>> {
        Rc::make_mut(&mut self.map).shift_remove(var)
    }

    /// Whether `other` can be composed into this substitution without an
    /// inconsistency or an occurs problem.
    pub fn can_compose(&self, other: &Substitution) -> bool {
        self.composition_conflict(other).is_none()
    }

    fn composition_conflict(&self, other: &Substitution) -> Option<String> {
        for (var, theirs) in other.iter() {
            if let Some(mine) = self.map.get(var) {
                let mine = mine.substitute(other);
                if mine != *theirs {
                    return Some(format!(
                        "{self} cannot compose {other} because of an inconsistency for {var}"
                    ));
                }
            }
        }
        for var in other.free_vars() {
            if let Some(mine) = self.map.get(&var) {
                let rewritten = mine.substitute(other);
                if rewritten.eta_equiv_free_var().as_ref() != Some(&var) {
                    return Some(format!(
                        "{self} cannot compose {other} because of occurs on {var}"
                    ));
                }
            }
        }
        None
    }

    /// Incorporates `other` into this substitution, rewriting existing
    /// values through it and adding its bindings for variables not yet
    /// mapped. Supports rotating a binding (`A -> B` into `B -> A`) but not
    /// reintroducing a variable mapped to something other than a variable.
    ///
    /// # Panics
    ///
    /// Panics when the composition would be inconsistent or violate the
    /// occurs invariant; that is a programming error in the caller, not a
    /// recoverable unification failure.
    pub fn compose(&mut self, other: &Substitution) {
        if Rc::ptr_eq(&self.map, &other.map) {
            return;
        }
        if let Some(problem) = self.composition_conflict(other) {
            panic!("{problem}");
        }

        // A variable of ours that reappears in other's range has just been
        // rotated back to itself; its entry must go away.
        let rotated: Vec<FreeVar> = other
            .free_vars()
            .into_iter()
            .filter(|v| self.map.contains_key(v))
            .collect();

        let map = Rc::make_mut(&mut self.map);
        for var in &rotated {
            map.shift_remove(var);
        }
        for (_, value) in map.iter_mut() {
            *value = value.substitute(other);
        }
        for (var, term) in other.iter() {
            if !map.contains_key(var) {
                map.insert(var.clone(), term.clone());
            }
        }
        debug_assert!(self.well_formed(), "compose broke the substitution invariant");
    }

    /// Combines `other` into this substitution, unifying the values where
    /// both map the same variable. Unlike [`compose`], this cannot rotate a
    /// binding, but it can fail gracefully.
    ///
    /// [`compose`]: Substitution::compose
    pub fn merge(&mut self, other: &Substitution) -> Result<(), UnificationError> {
        for (var, term) in other.iter() {
            self.add(var.clone(), term.clone())?;
        }
        Ok(())
    }

    /// Rewrites the substitution so that, as far as possible, none of `vars`
    /// is instantiated: a binding whose value is (a permutation of) a free
    /// variable outside the protected set is swapped around instead. Returns
    /// the subset of `vars` that could not be freed; callers treat a
    /// non-empty result as failure.
    pub fn select_unavoidable(&mut self, vars: &IndexSet<FreeVar>) -> IndexSet<FreeVar> {
        let mut result = IndexSet::new();

        for var in vars {
            let Some(value) = self.map.get(var).cloned() else {
                continue;
            };
            let mut rev = Substitution::new();
            match value.eta_permuted_equiv_free_var(var, &mut rev) {
                None => {
                    log::trace!("could not avoid {var}: it equals the non-variable {value}");
                    result.insert(var.clone());
                }
                Some(other) if vars.contains(&other) => {
                    log::trace!("could not avoid {var}: it equals protected {other}");
                    result.insert(var.clone());
                }
                Some(_) => {
                    // Swap the binding around via the reverse substitution.
                    self.remove(var);
                    self.compose(&rev);
                }
            }
        }

        debug_assert!(self.well_formed(), "select_unavoidable broke the invariant");
        result
    }

    /// True if every variable in `vars` could be freed from the mapping.
    /// This may permanently modify the substitution.
    pub fn avoid(&mut self, vars: &IndexSet<FreeVar>) -> bool {
        self.select_unavoidable(vars).is_empty()
    }

    /// Shifts free de Bruijn indices in every value by `amount`.
    pub fn incr_free_debruijn(&mut self, amount: i64) {
        let map = Rc::make_mut(&mut self.map);
        for (_, value) in map.iter_mut() {
            *value = value.incr_free_debruijn(amount);
        }
        debug_assert!(self.well_formed(), "shift broke the substitution invariant");
    }

    /// True if `other`'s bindings are a subset of ours.
    pub fn contains_all(&self, other: &Substitution) -> bool {
        other
            .iter()
            .all(|(v, t)| self.map.get(v).is_some_and(|mine| mine == t))
    }

    fn well_formed(&self) -> bool {
        let mut free = IndexSet::new();
        for value in self.map.values() {
            value.collect_free_vars(&mut free);
        }
        free.iter().all(|v| !self.map.contains_key(v))
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.map
                .iter()
                .format_with(", ", |(v, t), f| f(&format_args!("{v} -> {t}")))
        )
    }
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
