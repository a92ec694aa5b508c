use super::*;

fn t(name: &str) -> Symbol {
    Symbol::terminal(name)
}

fn nt(name: &str) -> Symbol {
    Symbol::nonterminal(name)
}

/// S -> a S b | c
fn matched_pairs() -> Grammar {
    let s = nt("S");
    Grammar::new(
        s.clone(),
        vec![
            Production::new(s.clone(), vec![t("a"), s.clone(), t("b")]),
            Production::new(s, vec![t("c")]),
        ],
    )
}

/// S -> a S b | epsilon
fn nested_pairs() -> Grammar {
    let s = nt("S");
    Grammar::new(
        s.clone(),
        vec![
            Production::new(s.clone(), vec![t("a"), s.clone(), t("b")]),
            Production::new(s, vec![]),
        ],
    )
}

/// The classic dangling-else shape: S -> i S | i S e S | x
fn dangling_else() -> Grammar {
    let s = nt("S");
    Grammar::new(
        s.clone(),
        vec![
            Production::new(s.clone(), vec![t("i"), s.clone()]),
            Production::new(s.clone(), vec![t("i"), s.clone(), t("e"), s.clone()]),
            Production::new(s, vec![t("x")]),
        ],
    )
}

fn sentence(names: &str) -> Vec<Symbol> {
    names.split_whitespace().map(t).collect()
}

#[test]
fn automaton_deduplicates_states_by_kernel() {
    // X is reachable through two different derivation paths; the item set
    // for X -> c . must exist exactly once.
    let s = nt("S");
    let x = nt("X");
    let grammar = Grammar::new(
        s.clone(),
        vec![
            Production::new(s.clone(), vec![t("a"), x.clone()]),
            Production::new(s, vec![t("b"), x.clone()]),
            Production::new(x, vec![t("c")]),
        ],
    );
    let table = ParseTable::build(&grammar);

    for (i, a) in table.states().iter().enumerate() {
        // Ids are assigned densely in construction order.
        assert_eq!(a.id(), i);
        for b in &table.states()[i + 1..] {
            assert_ne!(a, b, "duplicate item sets {} and {}", a.id(), b.id());
        }
    }

    let after_c: Vec<_> = table
        .states()
        .iter()
        .filter(|s| s.via() == Some(&t("c")))
        .collect();
    assert_eq!(after_c.len(), 1, "the kernel after 'c' must be interned once");
}

#[test]
fn conflict_free_grammar_has_deterministic_table() {
    let grammar = matched_pairs();
    let table = ParseTable::build(&grammar);
    assert!(!table.has_conflict());

    let mut driver = LrDriver::new(&grammar, &table, &sentence("a a c b b"));
    let tree = driver.parse().expect("sentence must parse deterministically");
    let ParseNode::Rule { production: 0, children } = tree else {
        panic!("expected a top-level a S b node");
    };
    assert_eq!(children.len(), 3);
    assert_eq!(children[0], ParseNode::Terminal(t("a")));
    assert_eq!(children[2], ParseNode::Terminal(t("b")));
}

#[test]
fn rejects_ill_formed_sentences() {
    let grammar = matched_pairs();
    let table = ParseTable::build(&grammar);
    let result = parse(&grammar, &table, &sentence("a c c b"));
    assert!(matches!(result, Err(ParseError::NotParseable)));
}

#[test]
fn epsilon_grammar_parses_nested_pairs() {
    // LR(0) cannot decide shift-vs-reduce for the epsilon production, so
    // the table carries conflicts; the GLR driver still finds the single
    // correct parse and reaches accept.
    let grammar = nested_pairs();
    let table = ParseTable::build(&grammar);

    let tree = parse(&grammar, &table, &sentence("a a b b"))
        .expect("aabb has exactly one parse");
    let ParseNode::Rule { production: 0, children } = tree else {
        panic!("expected a S b at the root");
    };
    assert_eq!(children[0], ParseNode::Terminal(t("a")));
    assert_eq!(children[2], ParseNode::Terminal(t("b")));

    assert!(matches!(
        parse(&grammar, &table, &sentence("a b b")),
        Err(ParseError::NotParseable)
    ));
}

#[test]
fn conflict_cells_contain_each_action_once() {
    let table = ParseTable::build(&nested_pairs());
    assert!(table.has_conflict());
    for state in table.states() {
        for symbol in [t("a"), t("b"), Symbol::Accept] {
            if let Some(Action::Conflict(actions)) = table.next_action(state.id(), &symbol) {
                assert!(actions.len() >= 2);
                for (i, a) in actions.iter().enumerate() {
                    assert!(!a.is_conflict(), "conflicts must not nest");
                    assert!(
                        !actions[i + 1..].contains(a),
                        "duplicate action in conflict cell"
                    );
                }
            }
        }
    }
}

#[test]
fn ambiguous_grammar_is_detected() {
    let grammar = dangling_else();
    let table = ParseTable::build(&grammar);
    assert!(table.has_conflict(), "dangling else must produce a conflict cell");

    // The deterministic driver refuses to guess.
    let mut driver = LrDriver::new(&grammar, &table, &sentence("i i x e x"));
    let linear = driver.parse();
    assert!(matches!(linear, Err(ParseError::Conflict { .. })));

    // The GLR driver surfaces both surviving parses.
    match parse(&grammar, &table, &sentence("i i x e x")) {
        Err(ParseError::AmbiguousSentence { trees }) => {
            assert!(trees.len() >= 2);
            assert_ne!(trees[0], trees[1]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn unambiguous_sentence_of_ambiguous_grammar_still_parses() {
    let grammar = dangling_else();
    let table = ParseTable::build(&grammar);
    let tree = parse(&grammar, &table, &sentence("i x e x"))
        .expect("i x e x has exactly one parse");
    let ParseNode::Rule { production, .. } = tree else {
        panic!("expected a rule node");
    };
    assert_eq!(production, 1, "must use the i S e S production");
}
