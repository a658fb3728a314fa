use stattag::{
    tokens, CrfModel, CrfParams, HmmDecodeOptions, HmmTagger, ParseOptions, PcfgData, PcfgModel,
    Token, Tree,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("CRF Training and Tagging Example");
    println!("=================================\n");

    let data: Vec<(Vec<Token>, Vec<&str>)> = vec![
        (tokens(["John", "lives", "in", "Paris"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Mary", "works", "in", "London"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Paris", "is", "big"]), vec!["LOC", "O", "O"]),
        (tokens(["John", "met", "Mary"]), vec!["PER", "O", "PER"]),
    ];
    println!("Training data: {} sentences\n", data.len());

    let mut params = CrfParams::default();
    params.set("c2", "0.01")?;
    params.set("max_iterations", "100")?;
    println!("Setting parameters:");
    println!("  L2 regularization (c2): {}", params.get("c2")?);
    println!("  Learning rate: {}", params.get("learning_rate")?);
    println!("  Max iterations: {}\n", params.get("max_iterations")?);

    let model = CrfModel::new(Vec::<String>::new(), Some("en")).train(&data, &params)?;
    if let Some(meta) = model.metadata() {
        println!(
            "Stopped after {} iterations ({:?}), loss {:.4}",
            meta.iterations, meta.stop_reason, meta.final_loss
        );
    }

    let model_path = std::env::temp_dir().join("example_model.crf");
    model.save(&model_path)?;
    let model = CrfModel::load(&model_path)?;
    println!("Model saved to and reloaded from {}\n", model_path.display());

    let tagger = model.tagger();
    let sentence = tokens(["Anna", "lives", "in", "Berlin"]);
    let (labels, score) = tagger.tag_with_score(&sentence)?;
    println!("Tagging {:?}", sentence.iter().map(|t| t.text.as_str()).collect::<Vec<_>>());
    println!("  labels: {:?} (score {:.4})", labels, score);
    println!("  P(labels | tokens) = {:.4}", tagger.probability(&sentence, &labels)?);
    println!("\n{}", model.evaluate(&data)?);

    println!("\nHMM Tagging Example");
    println!("===================\n");
    let pos_data = vec![
        (vec!["the", "cat", "sleeps"], vec!["DET", "NOUN", "VERB"]),
        (vec!["a", "dog", "barks"], vec!["DET", "NOUN", "VERB"]),
    ];
    let hmm = HmmTagger::default().train(&pos_data)?;
    let words = ["the", "bird", "sings"];
    println!("  approximate: {:?}", hmm.predict(&words, &HmmDecodeOptions::default())?);
    println!("  exact:       {:?}", hmm.predict(&words, &HmmDecodeOptions::exact())?);

    println!("\nPCFG Parsing Example");
    println!("====================\n");
    let tree = Tree::parse("(S (NP (D the) (N cat)) (VP (V sees) (NP (D a) (N dog))))")?;
    let pcfg = PcfgModel::default().train(&PcfgData::Trees(vec![(tokens(tree.leaves()), tree)]))?;
    match pcfg.predict(&tokens(["a", "dog", "sees", "the", "bird"]), &ParseOptions::default())? {
        Some(parse) => println!("  {} (p = {:.6})", parse.tree, parse.prob()),
        None => println!("  no parse"),
    }

    Ok(())
}
