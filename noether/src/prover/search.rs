use super::catalog::RuleCatalog;
use super::proof::{Proof, ProofNode};

/// Search configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tree-depth bound: a branch whose pending goal sits deeper than this
    /// is abandoned. This is the only termination mechanism; the search has
    /// no memoization.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_depth: 20 }
    }
}

/// Depth-first, leftmost-first backtracking search over a [`Proof`].
pub struct Prover {
    config: Config,
}

impl Prover {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Tries to complete `proof` within the configured depth bound.
    ///
    /// Returns `true` when the proof was completed in place; `false` means
    /// no proof was found within the bound, with `proof` rolled back to the
    /// state it was passed in. Rule alternatives are tried in catalog
    /// order, first success wins, and every failed trial is undone before
    /// the next.
    pub fn prove(&self, proof: &mut Proof, catalog: &dyn RuleCatalog) -> bool {
        if proof.is_complete() {
            return true;
        }

        let parent = proof
            .leftmost_unproved_parent()
            .expect("incomplete proof has a node with unproved children");
        let node = proof
            .leftmost_unproved_child(parent)
            .expect("listed parent has an unproved child");

        let ProofNode::Unproved(pending) = proof.node(node) else {
            unreachable!("leftmost unproved child is unproved");
        };
        if pending.depth > self.config.max_depth {
            log::debug!("abandoning branch at depth {}: {}", pending.depth, pending.judgment);
            return false;
        }

        for rule in proof.rules_that_apply(node, catalog) {
            log::trace!("trying rule {} for node d{node}", rule.name());
            proof.apply_rule(parent, node, rule);
            if proof.is_complete() {
                return true;
            }
            if self.prove(proof, catalog) {
                return true;
            }
            proof.undo_apply_rule();
        }
        false
    }
}
