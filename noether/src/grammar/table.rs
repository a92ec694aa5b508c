use super::item::{ItemRule, ItemSet};
use super::symbol::{Grammar, Symbol};
use crate::utils::DedupIterator;
use ahash::AHashMap;
use std::fmt;

/// An entry of the action or goto table. Shift and goto carry the next
/// state, reduce the index of the production to reduce by. A cell that two
/// distinct actions would occupy becomes a [`Action::Conflict`] listing all
/// of them; nothing is silently resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(usize),
    Reduce(usize),
    Goto(usize),
    Accept,
    Conflict(Vec<Action>),
}

impl Action {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Action::Conflict(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Shift(n) => write!(f, "s{n}"),
            Action::Reduce(n) => write!(f, "r{n}"),
            Action::Goto(n) => write!(f, "g{n}"),
            Action::Accept => write!(f, "$"),
            Action::Conflict(actions) => {
                for (i, action) in actions.iter().enumerate() {
                    if i > 0 {
                        write!(f, "/")?;
                    }
                    write!(f, "{action}")?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of interning a kernel into the state list: either a brand-new
/// state or the canonical instance an equal kernel already produced. The
/// duplicate case is a normal signal, not an error; it is how transition
/// edges get wired back into existing states.
enum Interned {
    New(usize),
    Existing(usize),
}

impl Interned {
    fn id(&self) -> usize {
        match *self {
            Interned::New(id) | Interned::Existing(id) => id,
        }
    }
}

/// The canonical LR(0) automaton of a grammar plus its action and goto
/// tables, built once and queried in place.
#[derive(Debug, Clone)]
pub struct ParseTable {
    states: Vec<ItemSet>,
    actions: AHashMap<(usize, Symbol), Action>,
    gotos: AHashMap<(usize, Symbol), Action>,
}

impl ParseTable {
    pub fn build(grammar: &Grammar) -> Self {
        // Augment the grammar with the synthetic start production, keeping
        // the original production indices as reduce targets.
        let mut all_rules = Vec::with_capacity(grammar.productions().len() + 1);
        all_rules.push(ItemRule::new(Symbol::Start, vec![grammar.start().clone()], 0));
        for (index, production) in grammar.productions().iter().enumerate() {
            all_rules.push(ItemRule::from_production(index, production));
        }

        let mut states = Vec::new();
        let root_kernel: Vec<ItemRule> = all_rules
            .iter()
            .filter(|r| *r.lhs() == Symbol::Start)
            .cloned()
            .collect();
        intern_state(root_kernel, None, &all_rules, &mut states);

        let mut this = Self { states, actions: AHashMap::new(), gotos: AHashMap::new() };
        this.fill_tables();
        this
    }

    fn fill_tables(&mut self) {
        let terminals = self.terminal_header();
        let mut actions = AHashMap::new();
        let mut gotos = AHashMap::new();

        for state in &self.states {
            for rule in state.all_rules() {
                if !rule.is_complete() {
                    continue;
                }
                if *rule.lhs() == Symbol::Start {
                    add_cell(&mut actions, state.id(), Symbol::Accept, Action::Accept);
                } else {
                    // LR(0): a completed item reduces on every terminal.
                    for terminal in &terminals {
                        add_cell(
                            &mut actions,
                            state.id(),
                            terminal.clone(),
                            Action::Reduce(rule.origin()),
                        );
                    }
                }
            }
            for (symbol, next) in state.transitions() {
                if symbol.is_terminal() {
                    add_cell(&mut actions, state.id(), symbol.clone(), Action::Shift(*next));
                } else {
                    add_cell(&mut gotos, state.id(), symbol.clone(), Action::Goto(*next));
                }
            }
        }

        self.actions = actions;
        self.gotos = gotos;
    }

    /// Every terminal the automaton can shift on, plus the end-of-input
    /// symbol.
    fn terminal_header(&self) -> Vec<Symbol> {
        self.states
            .iter()
            .filter_map(|s| s.via().cloned())
            .filter(Symbol::is_terminal)
            .dedup()
            .chain(std::iter::once(Symbol::Accept))
            .collect()
    }

    pub fn next_action(&self, state: usize, symbol: &Symbol) -> Option<&Action> {
        self.actions.get(&(state, symbol.clone()))
    }

    pub fn next_goto(&self, state: usize, symbol: &Symbol) -> Option<&Action> {
        self.gotos.get(&(state, symbol.clone()))
    }

    pub fn states(&self) -> &[ItemSet] {
        &self.states
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// True if some cell of the action or goto table holds a conflict.
    pub fn has_conflict(&self) -> bool {
        self.actions
            .values()
            .chain(self.gotos.values())
            .any(Action::is_conflict)
    }
}

impl fmt::Display for ParseTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for state in &self.states {
            write!(f, "{state}")?;
        }
        Ok(())
    }
}

/// Deduplicates `kernel` against the known states; a new state is closed,
/// numbered, and explored depth-first in the order its items read symbols.
fn intern_state(
    kernel: Vec<ItemRule>,
    via: Option<Symbol>,
    all_rules: &[ItemRule],
    states: &mut Vec<ItemSet>,
) -> Interned {
    if let Some(existing) = states.iter().find(|s| s.kernel() == kernel) {
        return Interned::Existing(existing.id());
    }

    let closure = ItemSet::close(&kernel, all_rules);
    let id = states.len();
    states.push(ItemSet {
        id,
        via,
        kernel,
        closure,
        transitions: Vec::new(),
    });

    let next_symbols: Vec<Symbol> = states[id]
        .all_rules()
        .filter_map(|r| r.next_symbol().cloned())
        .dedup()
        .collect();

    for symbol in next_symbols {
        let child_kernel: Vec<ItemRule> = states[id]
            .all_rules()
            .filter(|r| r.next_symbol() == Some(&symbol))
            .map(ItemRule::advanced)
            .collect();
        let child = intern_state(child_kernel, Some(symbol.clone()), all_rules, states).id();
        states[id].transitions.push((symbol, child));
    }

    Interned::New(id)
}

fn add_cell(
    cells: &mut AHashMap<(usize, Symbol), Action>,
    state: usize,
    symbol: Symbol,
    action: Action,
) {
    match cells.get_mut(&(state, symbol.clone())) {
        None => {
            cells.insert((state, symbol), action);
        }
        Some(Action::Conflict(existing)) => {
            if !existing.contains(&action) {
                existing.push(action);
            }
        }
        Some(existing) => {
            if *existing != action {
                let old = existing.clone();
                *existing = Action::Conflict(vec![old, action]);
            }
        }
    }
}
