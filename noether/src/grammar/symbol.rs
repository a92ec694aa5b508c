use std::fmt;
use std::rc::Rc;

/// A grammar symbol.
///
/// The two synthetic symbols used by automaton construction are ordinary
/// variants rather than hidden singletons: [`Symbol::Start`] is the
/// augmented start nonterminal and [`Symbol::Accept`] the end-of-input
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(Rc<str>),
    NonTerminal(Rc<str>),
    /// The synthetic start symbol of an augmented grammar.
    Start,
    /// The synthetic end-of-input symbol.
    Accept,
}

impl Symbol {
    pub fn terminal(name: impl Into<Rc<str>>) -> Self {
        Symbol::Terminal(name.into())
    }

    pub fn nonterminal(name: impl Into<Rc<str>>) -> Self {
        Symbol::NonTerminal(name.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_) | Symbol::Accept)
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_) | Symbol::Start)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Terminal(name) | Symbol::NonTerminal(name) => write!(f, "{name}"),
            Symbol::Start => write!(f, "S'"),
            Symbol::Accept => write!(f, "$"),
        }
    }
}

/// A production rule `lhs -> rhs`. An empty right-hand side is an epsilon
/// production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Production {
    pub lhs: Symbol,
    pub rhs: Vec<Symbol>,
}

impl Production {
    pub fn new(lhs: Symbol, rhs: Vec<Symbol>) -> Self {
        assert!(lhs.is_nonterminal(), "production left side must be a nonterminal");
        Self { lhs, rhs }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for s in &self.rhs {
            write!(f, " {s}")?;
        }
        Ok(())
    }
}

/// A grammar: a start nonterminal and an ordered list of productions.
/// Production order is significant; it determines rule indices in reduce
/// actions and the trial order of the automaton builder.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: Symbol,
    productions: Vec<Production>,
}

impl Grammar {
    pub fn new(start: Symbol, productions: Vec<Production>) -> Self {
        assert!(start.is_nonterminal(), "start symbol must be a nonterminal");
        Self { start, productions }
    }

    pub fn start(&self) -> &Symbol {
        &self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn production(&self, index: usize) -> &Production {
        &self.productions[index]
    }

    /// The productions whose left side is `symbol`, in declaration order.
    pub fn productions_of<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> impl Iterator<Item = (usize, &'a Production)> {
        self.productions
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.lhs == *symbol)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for p in &self.productions {
            writeln!(f, "{p}")?;
        }
        Ok(())
    }
}
