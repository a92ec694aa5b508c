use super::symbol::{Production, Symbol};
use std::fmt;

/// A production with a read position (dot). `origin` is the index of the
/// source production in the unaugmented grammar; it is excluded from
/// equality, which compares only the production shape and dot position.
#[derive(Debug, Clone)]
pub struct ItemRule {
    lhs: Symbol,
    rhs: Vec<Symbol>,
    dot: usize,
    origin: usize,
}

impl ItemRule {
    pub fn new(lhs: Symbol, rhs: Vec<Symbol>, origin: usize) -> Self {
        Self { lhs, rhs, dot: 0, origin }
    }

    pub fn from_production(origin: usize, production: &Production) -> Self {
        Self::new(production.lhs.clone(), production.rhs.clone(), origin)
    }

    pub fn lhs(&self) -> &Symbol {
        &self.lhs
    }

    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// The first unread symbol, or `None` if the dot is at the end.
    pub fn next_symbol(&self) -> Option<&Symbol> {
        self.rhs.get(self.dot)
    }

    /// Whether the item has been completely read.
    pub fn is_complete(&self) -> bool {
        self.dot == self.rhs.len()
    }

    /// The item with the dot advanced one position to the right.
    pub fn advanced(&self) -> Self {
        assert!(!self.is_complete(), "cannot advance a completed item");
        Self { dot: self.dot + 1, ..self.clone() }
    }
}

impl PartialEq for ItemRule {
    fn eq(&self, other: &Self) -> bool {
        self.lhs == other.lhs && self.rhs == other.rhs && self.dot == other.dot
    }
}

impl Eq for ItemRule {}

impl fmt::Display for ItemRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for (i, s) in self.rhs.iter().enumerate() {
            if i == self.dot {
                write!(f, " .")?;
            }
            write!(f, " {s}")?;
        }
        if self.is_complete() {
            write!(f, " .")?;
        }
        Ok(())
    }
}

/// A state of the LR(0) automaton: the items reachable by closure from a
/// kernel. Two item sets denote the same state iff their kernel sequences
/// are equal; the closure is a deterministic function of the kernel.
#[derive(Debug, Clone)]
pub struct ItemSet {
    pub(super) id: usize,
    /// The symbol on which the parent transitioned into this set; `None`
    /// for the root.
    pub(super) via: Option<Symbol>,
    pub(super) kernel: Vec<ItemRule>,
    pub(super) closure: Vec<ItemRule>,
    pub(super) transitions: Vec<(Symbol, usize)>,
}

impl ItemSet {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn via(&self) -> Option<&Symbol> {
        self.via.as_ref()
    }

    pub fn kernel(&self) -> &[ItemRule] {
        &self.kernel
    }

    /// All items of the set, kernel first, in construction order.
    pub fn all_rules(&self) -> impl Iterator<Item = &ItemRule> {
        self.kernel.iter().chain(self.closure.iter())
    }

    pub fn transitions(&self) -> &[(Symbol, usize)] {
        &self.transitions
    }

    /// Computes the closure of `kernel` over the augmented rule list:
    /// repeatedly adds, for every item whose next symbol is a nonterminal,
    /// all of that nonterminal's productions with the dot at the start,
    /// skipping items already present.
    pub(super) fn close(kernel: &[ItemRule], all_rules: &[ItemRule]) -> Vec<ItemRule> {
        let mut closure: Vec<ItemRule> = Vec::new();
        let mut next = 0;
        loop {
            // Work through kernel items first, then items added by closure.
            let item = match kernel.get(next).or_else(|| closure.get(next - kernel.len())) {
                Some(item) => item.clone(),
                None => break,
            };
            next += 1;

            let Some(symbol) = item.next_symbol() else {
                continue;
            };
            if !symbol.is_nonterminal() {
                continue;
            }
            for candidate in all_rules {
                if candidate.lhs() == symbol
                    && candidate.dot == 0
                    && !kernel.contains(candidate)
                    && !closure.contains(candidate)
                {
                    closure.push(candidate.clone());
                }
            }
        }
        closure
    }
}

/// Item-set equality is kernel-sequence equality.
impl PartialEq for ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.kernel == other.kernel
    }
}

impl Eq for ItemSet {}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Item set {}:", self.id)?;
        for rule in &self.kernel {
            writeln!(f, "{rule}")?;
        }
        for rule in &self.closure {
            writeln!(f, "+ {rule}")?;
        }
        for (symbol, next) in &self.transitions {
            writeln!(f, "transition to set {next} on symbol {symbol}")?;
        }
        Ok(())
    }
}
