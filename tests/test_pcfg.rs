use stattag::pcfg::Symbol;
use stattag::{
    tokens, Error, Grammar, ParseMetrics, ParseOptions, PcfgData, PcfgModel, PcfgParams, Token,
    Tree,
};

fn rule(lhs: &str, rhs: &[&str]) -> (String, Vec<String>, f64) {
    (lhs.to_string(), rhs.iter().map(|s| s.to_string()).collect(), 1.0)
}

fn treebank() -> Vec<(Vec<Token>, Tree)> {
    [
        "(S (NP (DT the) (NN dog)) (VP (VBD saw) (NP (DT a) (NN cat))))",
        "(S (NP (DT a) (NN cat)) (VP (VBD slept)))",
        "(S (NP (NNP John)) (VP (VBD saw) (NP (DT the) (NN dog)) (PP (IN with) (NP (DT a) (NN telescope)))))",
        "(S (NP (DT the) (NN cat)) (VP (VBD sat) (PP (IN on) (NP (DT the) (NN mat)))))",
    ]
    .iter()
    .map(|text| {
        let tree = Tree::parse(text).unwrap();
        (tokens(tree.leaves()), tree)
    })
    .collect()
}

#[test]
fn test_rules_with_pretagged_tokens() {
    let data = PcfgData::Rules(vec![
        rule("s", &["np", "vp"]),
        rule("np", &["cat"]),
        rule("vp", &["sleeps"]),
    ]);
    let model = PcfgModel::default().train(&data).unwrap();
    let toks = vec![
        Token::new("cat").with_pos("np"),
        Token::new("sleeps").with_pos("vp"),
    ];
    let parse = model
        .predict(&toks, &ParseOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(parse.tree.label(), Some("s"));
    assert_eq!(parse.tree.leaves(), vec!["cat", "sleeps"]);
    assert_eq!(parse.tree.to_string(), "(s (np cat) (vp sleeps))");
}

#[test]
fn test_grammar_probabilities_sum_to_one() {
    let model = PcfgModel::default()
        .train(&PcfgData::Trees(treebank()))
        .unwrap();
    let grammar = model.grammar().unwrap();
    for lhs in grammar.nonterminals() {
        let total: f64 = grammar.rules_for(lhs).map(|r| r.prob).sum();
        assert!((total - 1.0).abs() < 1e-9, "{}", lhs);
    }
    // Flat VP of length three survives estimation unchanged
    assert!(grammar.rules_for("VP").any(|r| r.rhs.len() == 3));
    assert!(grammar.preterminals("dog").any(|p| p == "NN"));
}

#[test]
fn test_treebank_round_trip() {
    let data = treebank();
    let model = PcfgModel::default()
        .train(&PcfgData::Trees(data.clone()))
        .unwrap();
    let metrics = model.evaluate(&data, &ParseOptions::default()).unwrap();
    assert_eq!(metrics.sentences, 4);
    assert_eq!(metrics.parsed, 4);
    assert!(metrics.f1 > 0.8, "{}", metrics);

    // The flat VP comes back un-binarized
    let (toks, gold) = &data[2];
    let parse = model.predict(toks, &ParseOptions::default()).unwrap().unwrap();
    assert_eq!(parse.tree.leaves(), gold.leaves());
    assert!(parse.log_prob < 0.0);
}

#[test]
fn test_unknown_words_do_not_change_grammar() {
    let model = PcfgModel::default()
        .train(&PcfgData::Trees(treebank()))
        .unwrap();
    let before = model.grammar().unwrap().clone();
    let parse = model
        .predict(&tokens(["the", "bird", "slept"]), &ParseOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(
        parse.tree.to_string(),
        "(S (NP (DT the) (NN bird)) (VP (VBD slept)))"
    );
    assert_eq!(model.grammar().unwrap(), &before);
    assert_eq!(model.grammar().unwrap().preterminals("bird").count(), 0);
}

#[test]
fn test_n_best() {
    let grammar = Grammar::from_text(
        r#"
        S -> NP VP [10]
        NP -> NP PP [3]
        NP -> Det N [7]
        VP -> V NP [6]
        VP -> VP PP [4]
        PP -> P NP [10]
        Det -> "the" [1]
        N -> "man" [1]
        N -> "telescope" [1]
        V -> "saw" [1]
        P -> "with" [1]
        "#,
        0.0,
        "S",
        None,
    )
    .unwrap();
    let model = PcfgModel::from_grammar(grammar, PcfgParams::default()).unwrap();
    let toks = tokens(["the", "man", "saw", "the", "man", "with", "the", "telescope"]);
    let mut opts = ParseOptions::default();
    opts.set_n_best(5).unwrap();
    let parses = model.predict_n_best(&toks, &opts).unwrap();
    assert_eq!(parses.len(), 2);
    assert!(parses[0].log_prob >= parses[1].log_prob);
    let total: f64 = parses.iter().map(|p| p.prob()).sum();
    assert!(total > 0.0 && total <= 1.0);
    assert_eq!(
        model.predict(&toks, &ParseOptions::default()).unwrap().unwrap().tree,
        parses[0].tree
    );
}

#[test]
fn test_inline_terminals_and_unaries() {
    let grammar = Grammar::from_counts(
        vec![
            (
                "S".to_string(),
                vec![
                    Symbol::NonTerminal("NP".to_string()),
                    Symbol::Terminal("is".to_string()),
                    Symbol::NonTerminal("ADJP".to_string()),
                ],
                1.0,
            ),
            ("NP".to_string(), vec![Symbol::NonTerminal("N".to_string())], 1.0),
            ("ADJP".to_string(), vec![Symbol::NonTerminal("A".to_string())], 1.0),
            ("N".to_string(), vec![Symbol::Terminal("sky".to_string())], 1.0),
            ("A".to_string(), vec![Symbol::Terminal("blue".to_string())], 1.0),
        ],
        0.0,
        "S",
        None,
    )
    .unwrap();
    let model = PcfgModel::from_grammar(grammar, PcfgParams::default()).unwrap();
    let parse = model
        .predict(&tokens(["sky", "is", "blue"]), &ParseOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(parse.tree.to_string(), "(S (NP (N sky)) is (ADJP (A blue)))");
    assert!((parse.prob() - 1.0).abs() < 1e-9);

    // Without unary closure the chain cannot be completed
    let mut opts = ParseOptions::default();
    opts.set_max_unary_depth(0);
    assert!(model
        .predict(&tokens(["sky", "is", "blue"]), &opts)
        .unwrap()
        .is_none());
}

#[test]
fn test_non_cnf_grammar_requires_binarization() {
    let mut params = PcfgParams::default();
    params.set_cnf(false);
    let data = PcfgData::Trees(treebank());
    assert!(matches!(
        PcfgModel::new(params).train(&data),
        Err(Error::InvalidGrammar(_))
    ));
}

#[test]
fn test_bracket_metrics() {
    let gold = Tree::parse("(S (NP (D the) (N cat)) (VP (V sat)))").unwrap();
    let m = ParseMetrics::compute(vec![(&gold, Some(&gold))]);
    assert_eq!((m.precision, m.recall, m.f1), (1.0, 1.0, 1.0));

    let other = Tree::parse("(X (Y (D the) (N cat)) (Z (V sat)))").unwrap();
    let m = ParseMetrics::compute(vec![(&gold, Some(&other))]);
    assert_eq!((m.precision, m.recall, m.f1), (0.0, 0.0, 0.0));
}
