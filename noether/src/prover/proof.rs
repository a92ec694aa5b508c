use super::catalog::{RuleCatalog, RuleInstance};
use super::judgment::Judgment;
use super::printer::{render_judgment, SurfaceSyntax};
use crate::term::{Atom, FreeVar, Substitution, Term};
use indexmap::IndexSet;
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;

pub type NodeId = usize;

/// A pending goal: a judgment still to be proved, with its depth in the
/// proof tree and its choice depth (how many rule choices were made on the
/// path from the root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprovedNode {
    pub judgment: Judgment,
    pub depth: usize,
    pub choice_depth: usize,
}

/// A discharged goal: the rule that proved it and its premise subtrees.
/// `unproved` is always exactly the subsequence of `premises` whose nodes
/// are currently [`ProofNode::Unproved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvedNode {
    pub judgment: Judgment,
    pub rule_name: String,
    pub premises: Vec<NodeId>,
    pub unproved: Vec<NodeId>,
}

/// A node of the proof tree. The dummy root wraps the top-level goal so
/// that the goal itself can be replaced like any other child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofNode {
    Root { child: NodeId },
    Unproved(UnprovedNode),
    Proved(ProvedNode),
}

/// One frame of rollback state, enough to reverse exactly one
/// [`Proof::apply_rule`].
#[derive(Debug)]
struct UndoFrame {
    prior_substitution: Substitution,
    prior_unproved_parents: Vec<NodeId>,
    parent: NodeId,
    node: NodeId,
    replaced: UnprovedNode,
    /// Where `node` sat in the parent's unproved list; `None` when the
    /// parent is the root, which derives that list from its child.
    parent_unproved_index: Option<usize>,
    arena_len: usize,
}

/// A proof in progress: the node arena, the left-to-right list of nodes
/// that still have unproved children, the accumulated substitution of all
/// rule applications so far, the protected input variables, and the undo
/// stack.
///
/// Single-threaded by design: the undo stack and the unproved-node
/// bookkeeping assume strictly nested apply/undo calls. Parallel search
/// over the same goal must clone the proof first.
pub struct Proof {
    nodes: Vec<ProofNode>,
    unproved_parents: Vec<NodeId>,
    substitution: Substitution,
    input_vars: IndexSet<FreeVar>,
    undo: Vec<UndoFrame>,
}

impl Proof {
    pub fn new(goal: Judgment) -> Self {
        Self::with_input_vars(goal, IndexSet::new())
    }

    /// Creates a proof of `goal` whose `input_vars` are universally fixed:
    /// any rule whose unifier would instantiate one of them is rejected.
    pub fn with_input_vars(goal: Judgment, input_vars: IndexSet<FreeVar>) -> Self {
        let nodes = vec![
            ProofNode::Root { child: 1 },
            ProofNode::Unproved(UnprovedNode { judgment: goal, depth: 0, choice_depth: 0 }),
        ];
        Self {
            nodes,
            unproved_parents: vec![0],
            substitution: Substitution::new(),
            input_vars,
            undo: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &ProofNode {
        &self.nodes[id]
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    pub fn input_vars(&self) -> &IndexSet<FreeVar> {
        &self.input_vars
    }

    /// The nodes that still have at least one unproved child, leftmost
    /// first.
    pub fn unproved_parents(&self) -> &[NodeId] {
        &self.unproved_parents
    }

    pub fn leftmost_unproved_parent(&self) -> Option<NodeId> {
        self.unproved_parents.first().copied()
    }

    /// The leftmost unproved child of `parent`.
    pub fn leftmost_unproved_child(&self, parent: NodeId) -> Option<NodeId> {
        match &self.nodes[parent] {
            ProofNode::Root { child } => {
                matches!(self.nodes[*child], ProofNode::Unproved(_)).then_some(*child)
            }
            ProofNode::Proved(p) => p.unproved.first().copied(),
            ProofNode::Unproved(_) => None,
        }
    }

    /// True iff no node anywhere in the tree is unproved.
    pub fn is_complete(&self) -> bool {
        self.unproved_parents.is_empty()
    }

    /// The candidate rule instances for an unproved node's judgment: every
    /// catalog rule of the right kind whose freshened conclusion unifies
    /// with the substituted goal and whose unifier leaves the protected
    /// input variables untouched. Rules that fail either test are skipped,
    /// not errors.
    pub fn rules_that_apply(&self, node: NodeId, catalog: &dyn RuleCatalog) -> Vec<RuleInstance> {
        let ProofNode::Unproved(un) = &self.nodes[node] else {
            panic!("rules_that_apply called on a node that is not unproved");
        };
        let goal = un.judgment.term().substitute(&self.substitution);

        let mut result = Vec::new();
        for rule in catalog.rules_for(un.judgment.kind()) {
            let rule_term = rule.fresh_app_term();

            // One fresh variable per premise stands for the derivation of
            // that premise; unification binds it to the premise instance.
            let premise_vars: Vec<Rc<Term>> = rule
                .premises()
                .iter()
                .map(|p| FreeVar::fresh(p.kind.name(), Term::unknown()).to_term())
                .collect();
            let mut app_args = premise_vars.clone();
            app_args.push(goal.clone());
            let applied = Term::app(Atom::Const(rule.constant().clone()), app_args);

            let mut sub = match applied.unify(&rule_term) {
                Ok(sub) => sub,
                Err(e) => {
                    log::trace!("rule {} does not apply to {goal}: {e}", rule.name());
                    continue;
                }
            };
            if !sub.avoid(&self.input_vars) {
                log::trace!(
                    "rule {} would instantiate a fixed input variable of {goal}",
                    rule.name()
                );
                continue;
            }

            let preconditions = rule
                .premises()
                .iter()
                .zip(&premise_vars)
                .map(|(premise, var)| Judgment::new(var.substitute(&sub), premise.kind.clone()))
                .collect();
            result.push(RuleInstance {
                name: rule.name().to_owned(),
                substitution: sub,
                preconditions,
            });
        }
        result
    }

    /// Replaces the unproved node `node` (a child of `parent`) with a
    /// proved node for `rule`, adding fresh unproved children for the
    /// rule's preconditions, composing the rule's substitution into the
    /// running one, and pushing an undo frame that reverses exactly this
    /// step.
    pub fn apply_rule(&mut self, parent: NodeId, node: NodeId, rule: RuleInstance) {
        let ProofNode::Unproved(replaced) = self.nodes[node].clone() else {
            panic!("apply_rule target is not an unproved node");
        };

        let prior_substitution = self.substitution.clone();
        let prior_unproved_parents = self.unproved_parents.clone();
        let arena_len = self.nodes.len();

        let mut children = Vec::with_capacity(rule.preconditions.len());
        for judgment in &rule.preconditions {
            let id = self.nodes.len();
            self.nodes.push(ProofNode::Unproved(UnprovedNode {
                judgment: judgment.clone(),
                depth: replaced.depth + 1,
                choice_depth: replaced.choice_depth + 1,
            }));
            children.push(id);
        }

        self.nodes[node] = ProofNode::Proved(ProvedNode {
            judgment: replaced.judgment.clone(),
            rule_name: rule.name.clone(),
            premises: children.clone(),
            unproved: children,
        });
        if !rule.preconditions.is_empty() {
            self.unproved_parents.push(node);
        }

        let parent_unproved_index = match &mut self.nodes[parent] {
            ProofNode::Root { .. } => None,
            ProofNode::Proved(p) => {
                let index = p
                    .unproved
                    .iter()
                    .position(|&c| c == node)
                    .expect("applied node missing from its parent's unproved list");
                p.unproved.remove(index);
                Some(index)
            }
            ProofNode::Unproved(_) => panic!("parent of an applied node cannot be unproved"),
        };
        if !self.parent_has_unproved(parent) {
            self.unproved_parents.retain(|&p| p != parent);
        }

        self.substitution.compose(rule.substitution());

        self.undo.push(UndoFrame {
            prior_substitution,
            prior_unproved_parents,
            parent,
            node,
            replaced,
            parent_unproved_index,
            arena_len,
        });
    }

    /// Rolls back the most recent [`apply_rule`]. Must be called in exact
    /// LIFO order relative to apply calls.
    ///
    /// # Panics
    ///
    /// Panics on underflow: calling this without a matching apply is a
    /// programming error.
    ///
    /// [`apply_rule`]: Proof::apply_rule
    pub fn undo_apply_rule(&mut self) {
        let frame = self
            .undo
            .pop()
            .expect("undo stack underflow: no rule application to roll back");

        self.substitution = frame.prior_substitution;
        self.unproved_parents = frame.prior_unproved_parents;

        if let Some(index) = frame.parent_unproved_index {
            let ProofNode::Proved(p) = &mut self.nodes[frame.parent] else {
                panic!("undo parent is not a proved node");
            };
            p.unproved.insert(index, frame.node);
        }

        self.nodes[frame.node] = ProofNode::Unproved(frame.replaced);
        self.nodes.truncate(frame.arena_len);
    }

    fn parent_has_unproved(&self, parent: NodeId) -> bool {
        match &self.nodes[parent] {
            ProofNode::Root { child } => matches!(self.nodes[*child], ProofNode::Unproved(_)),
            ProofNode::Proved(p) => !p.unproved.is_empty(),
            ProofNode::Unproved(_) => false,
        }
    }

    /// Renders the proved steps bottom-up, one line per step, using the
    /// declared surface syntax. Diagnostic text with no stability promise.
    pub fn render(&self, syntax: &dyn SurfaceSyntax) -> String {
        let mut out = String::new();
        self.render_node(self.root(), syntax, &mut out);
        out
    }

    fn render_node(&self, id: NodeId, syntax: &dyn SurfaceSyntax, out: &mut String) {
        match &self.nodes[id] {
            ProofNode::Root { child } => self.render_node(*child, syntax, out),
            ProofNode::Unproved(_) => {}
            ProofNode::Proved(p) => {
                for premise in &p.premises {
                    self.render_node(*premise, syntax, out);
                }
                out.push_str(&format!(
                    "d{id}: {} by rule {}",
                    render_judgment(&p.judgment, &self.substitution, syntax),
                    p.rule_name
                ));
                if !p.premises.is_empty() {
                    out.push_str(&format!(
                        " on {}",
                        p.premises.iter().format_with(", ", |c, f| f(&format_args!("d{c}")))
                    ));
                }
                out.push('\n');
            }
        }
    }

    #[cfg(test)]
    pub(super) fn nodes(&self) -> &[ProofNode] {
        &self.nodes
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn walk(proof: &Proof, id: NodeId, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
            match proof.node(id) {
                ProofNode::Root { child } => walk(proof, *child, depth, f),
                ProofNode::Unproved(u) => {
                    writeln!(f, "{}? {}", "  ".repeat(depth), u.judgment)
                }
                ProofNode::Proved(p) => {
                    writeln!(f, "{}{} by {}", "  ".repeat(depth), p.judgment, p.rule_name)?;
                    for premise in &p.premises {
                        walk(proof, *premise, depth + 1, f)?;
                    }
                    Ok(())
                }
            }
        }
        walk(self, self.root(), 0, f)?;
        write!(f, "  sub: {}", self.substitution)
    }
}
