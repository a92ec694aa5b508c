use super::symbol::{Grammar, Symbol};
use super::table::{Action, ParseTable};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("sentence cannot be parsed with this grammar")]
    NotParseable,

    #[error("parse table conflict in state {state} on symbol '{symbol}'")]
    Conflict {
        state: usize,
        symbol: Symbol,
        actions: Vec<Action>,
    },

    #[error("sentence is ambiguous: {} distinct parses survive", trees.len())]
    AmbiguousSentence { trees: Vec<ParseNode> },
}

/// A node of a parse tree: either a shifted terminal leaf or a reduction by
/// a grammar production with its children in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNode {
    Terminal(Symbol),
    Rule {
        production: usize,
        children: Vec<ParseNode>,
    },
}

impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseNode::Terminal(s) => write!(f, "{s}"),
            ParseNode::Rule { children, .. } => {
                write!(f, "(")?;
                for c in children {
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A deterministic LR driver: a stack of states and a buffer of parse
/// nodes, stepped one table lookup at a time. Cloning a driver forks its
/// entire configuration, which is how the GLR layer explores conflicts.
#[derive(Clone)]
pub struct LrDriver<'a> {
    grammar: &'a Grammar,
    table: &'a ParseTable,
    sentence: Vec<Symbol>,
    index: usize,
    states: Vec<usize>,
    buffer: Vec<ParseNode>,
}

impl<'a> LrDriver<'a> {
    pub fn new(grammar: &'a Grammar, table: &'a ParseTable, input: &[Symbol]) -> Self {
        let mut sentence = input.to_vec();
        sentence.push(Symbol::Accept);
        Self {
            grammar,
            table,
            sentence,
            index: 0,
            states: vec![0],
            buffer: Vec::new(),
        }
    }

    /// Parses the whole sentence in linear time. Only works when no
    /// conflict cell is reached; a reached conflict surfaces as
    /// [`ParseError::Conflict`], and the caller should fall back to the
    /// GLR entry point [`parse`].
    pub fn parse(&mut self) -> Result<ParseNode, ParseError> {
        while !self.step()? {}
        Ok(self.result())
    }

    /// Takes a single parse step.
    ///
    /// Returns `Ok(true)` on accept, `Ok(false)` to continue, and an error
    /// when the table has no entry (dead parse) or a conflict entry.
    pub fn step(&mut self) -> Result<bool, ParseError> {
        let state = *self.states.last().expect("state stack is never empty");
        let symbol = &self.sentence[self.index];
        let action = self
            .table
            .next_action(state, symbol)
            .ok_or(ParseError::NotParseable)?;
        match action {
            Action::Shift(next) => {
                let next = *next;
                self.shift(next);
            }
            Action::Reduce(production) => {
                let production = *production;
                self.reduce(production)?;
            }
            Action::Conflict(actions) => {
                return Err(ParseError::Conflict {
                    state,
                    symbol: symbol.clone(),
                    actions: actions.clone(),
                });
            }
            Action::Accept => return Ok(true),
            Action::Goto(_) => unreachable!("goto action in the action table"),
        }
        Ok(false)
    }

    /// Forces one of a conflict's alternatives; used by the GLR layer on
    /// forked drivers.
    fn act(&mut self, action: &Action) -> Result<(), ParseError> {
        match action {
            Action::Shift(next) => {
                self.shift(*next);
                Ok(())
            }
            Action::Reduce(production) => self.reduce(*production),
            _ => Ok(()),
        }
    }

    fn shift(&mut self, next: usize) {
        self.buffer.push(ParseNode::Terminal(self.sentence[self.index].clone()));
        self.index += 1;
        self.states.push(next);
    }

    fn reduce(&mut self, production: usize) -> Result<(), ParseError> {
        let rule = self.grammar.production(production);
        let arity = rule.rhs.len();
        assert!(self.buffer.len() >= arity, "parse buffer underflow on reduce");

        let children = self.buffer.split_off(self.buffer.len() - arity);
        self.states.truncate(self.states.len() - arity);
        self.buffer.push(ParseNode::Rule { production, children });

        let state = *self.states.last().expect("state stack is never empty");
        match self.table.next_goto(state, &rule.lhs) {
            Some(Action::Goto(next)) => {
                self.states.push(*next);
                Ok(())
            }
            Some(Action::Conflict(actions)) => Err(ParseError::Conflict {
                state,
                symbol: rule.lhs.clone(),
                actions: actions.clone(),
            }),
            _ => Err(ParseError::NotParseable),
        }
    }

    /// The finished parse tree. Call only after [`step`] returned accept.
    ///
    /// [`step`]: LrDriver::step
    pub fn result(&self) -> ParseNode {
        self.buffer[0].clone()
    }
}

/// GLR parsing: runs LR drivers breadth-first, forking one per alternative
/// at each conflict and dropping the forks that die. More than one distinct
/// surviving parse tree is reported as [`ParseError::AmbiguousSentence`]
/// carrying all of them; forks that converge on the same tree count once.
pub fn parse(
    grammar: &Grammar,
    table: &ParseTable,
    input: &[Symbol],
) -> Result<ParseNode, ParseError> {
    let mut queue = VecDeque::new();
    queue.push_back(LrDriver::new(grammar, table, input));
    let mut trees: Vec<ParseNode> = Vec::new();

    while let Some(mut driver) = queue.pop_front() {
        match driver.step() {
            Ok(true) => {
                let tree = driver.result();
                if !trees.contains(&tree) {
                    trees.push(tree);
                }
                // Two distinct trees already prove ambiguity.
                if trees.len() >= 2 {
                    break;
                }
            }
            Ok(false) => queue.push_back(driver),
            Err(ParseError::Conflict { actions, .. }) => {
                for action in &actions {
                    let mut fork = driver.clone();
                    if fork.act(action).is_ok() {
                        queue.push_back(fork);
                    }
                }
            }
            Err(_) => {} // dead fork
        }
    }

    match trees.len() {
        0 => Err(ParseError::NotParseable),
        1 => Ok(trees.remove(0)),
        _ => Err(ParseError::AmbiguousSentence { trees }),
    }
}
