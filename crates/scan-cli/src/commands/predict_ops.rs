use std::path::Path;
use std::process;

use scan_core::prediction::{predict, LexiconPredictor, WordModel};
use scan_core::settings::Settings;

fn print_predictions(model: &mut dyn WordModel, context: &str, n: usize) {
    let mut settings = Settings::default().prediction;
    settings.max_candidates = n.max(1);
    let predictions = predict(model, context, &settings);
    if !predictions.available() {
        eprintln!("Predictions unavailable");
        process::exit(1);
    }
    let mut shown = 0;
    for (i, c) in predictions.enumerate() {
        println!("{:>2}  {:<20} {:.4}", i + 1, c.word, c.score);
        shown += 1;
    }
    if shown == 0 {
        println!("(no candidates)");
    }
}

pub fn predict_lexicon(corpus: &str, context: &str, n: usize) {
    let mut model = die!(
        LexiconPredictor::from_file(Path::new(corpus)),
        "Error loading corpus {corpus}: {}"
    );
    eprintln!("Lexicon: {} words", model.word_count());
    print_predictions(&mut model, context, n);
}

#[cfg(feature = "neural")]
pub fn predict_neural(model_file: &str, vocab_file: &str, context: &str, n: usize) {
    use scan_core::prediction::{BeamSearchPredictor, LstmTokenModel, PieceTokenizer};

    let vocab = die!(
        std::fs::read_to_string(vocab_file),
        "Error reading {vocab_file}: {}"
    );
    let tokenizer = PieceTokenizer::from_vocab(&vocab);
    let lstm = die!(
        LstmTokenModel::open(Path::new(model_file)),
        "Error loading model: {}"
    );
    let settings = Settings::default().prediction;
    let mut model = BeamSearchPredictor::new(lstm, tokenizer, &settings);
    print_predictions(&mut model, context, n);
    eprintln!("Inference calls: {}", model.inference_count());
}
