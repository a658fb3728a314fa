use stattag::{tokens, CrfModel, CrfParams, Error, StopReason, Token};

fn ner_data() -> Vec<(Vec<Token>, Vec<&'static str>)> {
    vec![
        (tokens(["John", "lives", "in", "Paris"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Mary", "works", "in", "London"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Paris", "is", "big"]), vec!["LOC", "O", "O"]),
        (tokens(["John", "met", "Mary"]), vec!["PER", "O", "PER"]),
    ]
}

fn train(iterations: &str) -> CrfModel {
    let mut params = CrfParams::default();
    params.set("max_iterations", iterations).unwrap();
    params.set("c2", "0.001").unwrap();
    CrfModel::new(Vec::<String>::new(), Some("en"))
        .train(&ner_data(), &params)
        .unwrap()
}

#[test]
fn test_train_and_predict() {
    let model = train("100");
    assert!(model.is_trained());
    assert_eq!(model.labels(), vec!["PER", "O", "LOC"]);
    assert_eq!(model.num_labels(), 3);
    assert!(model.num_attrs() > 0);
    assert!(model.num_features() > 0);

    let predicted = model
        .predict(&tokens(["John", "lives", "in", "Paris"]))
        .unwrap();
    assert_eq!(predicted, vec!["PER", "O", "O", "LOC"]);

    let ev = model.evaluate(&ner_data()).unwrap();
    assert_eq!(ev.item_total_num, 14);
    assert!(ev.item_accuracy > 0.9, "{}", ev);
}

#[test]
fn test_viterbi_length_matches_input() {
    let model = train("20");
    let tagger = model.tagger();
    for n in 0..6 {
        let words: Vec<String> = (0..n).map(|i| format!("w{}", i)).collect();
        let (labels, score) = tagger.tag_with_score(&tokens(words)).unwrap();
        assert_eq!(labels.len(), n);
        if n == 0 {
            assert_eq!(score, 0.0);
        }
    }
}

#[test]
fn test_marginals_and_probability() {
    let model = train("30");
    let tagger = model.tagger();
    let toks = tokens(["Mary", "is", "in"]);

    let marginals = tagger.marginals(&toks).unwrap();
    assert_eq!(marginals.dim(), (3, 3));
    for row in marginals.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }

    // Probabilities of every labelling sum to one
    let labels = model.labels();
    let mut total = 0.0;
    for a in &labels {
        for b in &labels {
            for c in &labels {
                let p = tagger.probability(&toks, &[*a, *b, *c]).unwrap();
                assert!(p > 0.0 && p < 1.0);
                total += p;
            }
        }
    }
    assert!((total - 1.0).abs() < 1e-9);

    assert!(matches!(
        tagger.probability(&toks, &["PER", "O", "MISC"]),
        Err(Error::UnknownLabel(_))
    ));
    assert!(matches!(
        tagger.probability(&toks, &["PER"]),
        Err(Error::LengthMismatch { .. })
    ));
}

#[test]
fn test_loss_history_and_stop_reason() {
    let mut params = CrfParams::default();
    params.set("learning_rate", "0.01").unwrap();
    params.set("max_iterations", "50").unwrap();
    params.set("epsilon", "0").unwrap();
    params.set("delta", "0").unwrap();
    let model = CrfModel::new(Vec::<String>::new(), None)
        .train(&ner_data(), &params)
        .unwrap();
    let meta = model.metadata().unwrap();
    assert_eq!(meta.training_size, 4);
    assert_eq!(meta.stop_reason, StopReason::MaxIterations);
    assert_eq!(meta.loss_history.len(), 50);
    for pair in meta.loss_history.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12);
    }
    // The cap applies one last update, so the reported loss is past the history
    assert!(meta.final_loss <= *meta.loss_history.last().unwrap() + 1e-12);
}

#[test]
fn test_gradient_norm_stops_early() {
    let mut params = CrfParams::default();
    params.set("max_iterations", "1000").unwrap();
    params.set("epsilon", "1e6").unwrap();
    let model = CrfModel::new(Vec::<String>::new(), None)
        .train(&ner_data(), &params)
        .unwrap();
    let meta = model.metadata().unwrap();
    assert_eq!(meta.stop_reason, StopReason::GradientNorm);
    assert_eq!(meta.iterations, 1);
}

#[test]
fn test_fixed_label_set() {
    let model = CrfModel::new(["PER", "LOC", "O", "ORG"], None);
    let mut params = CrfParams::default();
    params.set("max_iterations", "5").unwrap();
    let trained = model.train(&ner_data(), &params).unwrap();
    assert_eq!(trained.labels(), vec!["PER", "LOC", "O", "ORG"]);

    let bad = vec![(tokens(["Acme"]), vec!["COMPANY"])];
    assert!(matches!(model.train(&bad, &params), Err(Error::UnknownLabel(_))));
}

#[test]
fn test_l1_produces_sparse_weights() {
    let mut dense = CrfParams::default();
    dense.set("max_iterations", "30").unwrap();
    let mut sparse = dense.clone();
    sparse.set("c1", "0.05").unwrap();

    let empty = CrfModel::new(Vec::<String>::new(), None);
    let count_nonzero = |m: &CrfModel| m.feature_weights().iter().filter(|(_, _, w)| *w != 0.0).count();
    let dense = empty.train(&ner_data(), &dense).unwrap();
    let sparse = empty.train(&ner_data(), &sparse).unwrap();
    assert!(count_nonzero(&sparse) < count_nonzero(&dense));
}

#[test]
fn test_possible_states_generates_every_pair() {
    let mut params = CrfParams::default();
    params.set("max_iterations", "1").unwrap();
    let observed = CrfModel::new(Vec::<String>::new(), None)
        .train(&ner_data(), &params)
        .unwrap();
    params.set("feature.possible_states", "1").unwrap();
    let all = CrfModel::new(Vec::<String>::new(), None)
        .train(&ner_data(), &params)
        .unwrap();
    assert_eq!(all.num_attrs(), observed.num_attrs());
    assert_eq!(all.num_features(), all.num_attrs() * 3 + 9);
    assert!(observed.num_features() < all.num_features());
}

#[test]
fn test_untrained_model_without_labels() {
    let model = CrfModel::new(Vec::<String>::new(), None);
    assert!(matches!(
        model.predict(&tokens(["hello"])),
        Err(Error::InvalidModel(_))
    ));
}
