use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stattag::{
    tokens, CrfModel, CrfParams, HmmDecodeOptions, HmmTagger, Token,
};

fn corpus() -> Vec<(Vec<Token>, Vec<&'static str>)> {
    vec![
        (tokens(["John", "lives", "in", "Paris"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Mary", "works", "in", "London"]), vec!["PER", "O", "O", "LOC"]),
        (tokens(["Paris", "is", "big"]), vec!["LOC", "O", "O"]),
        (tokens(["John", "met", "Mary", "in", "Berlin"]), vec!["PER", "O", "PER", "O", "LOC"]),
    ]
}

fn criterion_benchmark(c: &mut Criterion) {
    let data = corpus();
    let mut params = CrfParams::default();
    params.set("max_iterations", "20").unwrap();

    let mut group = c.benchmark_group("crf");
    group.sample_size(20);
    group.bench_function("train", |b| {
        let model = CrfModel::new(Vec::<String>::new(), None);
        b.iter(|| model.train(black_box(&data), &params).unwrap())
    });

    let model = CrfModel::new(Vec::<String>::new(), None)
        .train(&data, &params)
        .unwrap();
    let sentence = tokens(["Anna", "met", "John", "in", "Paris", "yesterday"]);
    group.bench_function("tag", |b| {
        let tagger = model.tagger();
        b.iter(|| tagger.tag(black_box(&sentence)).unwrap())
    });
    group.finish();

    let hmm_data: Vec<(Vec<String>, Vec<&str>)> = data
        .iter()
        .map(|(toks, labels)| (toks.iter().map(|t| t.text.clone()).collect(), labels.clone()))
        .collect();
    let hmm = HmmTagger::default().train(&hmm_data).unwrap();
    let words = ["Anna", "met", "John", "in", "Paris", "yesterday"];
    let mut group = c.benchmark_group("hmm");
    group.bench_function("approximate", |b| {
        let opts = HmmDecodeOptions::default();
        b.iter(|| hmm.predict(black_box(&words), &opts).unwrap())
    });
    group.bench_function("exact", |b| {
        let opts = HmmDecodeOptions::exact();
        b.iter(|| hmm.predict(black_box(&words), &opts).unwrap())
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
