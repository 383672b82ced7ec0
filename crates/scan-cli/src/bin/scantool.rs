use clap::{Parser, Subcommand};

use scan_cli::commands::{config_ops, predict_ops, simulate_ops};

#[derive(Parser)]
#[command(name = "scantool", about = "Scanning speller diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export or validate settings files
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show word predictions for a context using a text corpus
    Predict {
        /// Plain-text corpus the lexicon is built from
        corpus: String,
        /// Text left of the cursor
        context: String,
        /// Number of candidates to show
        #[arg(short, long, default_value = "5")]
        n: usize,
    },

    /// Show word predictions from an LSTM token model with beam search
    #[cfg(feature = "neural")]
    PredictNeural {
        /// Path to the safetensors model file
        model_file: String,
        /// Path to the vocabulary file (one piece per line)
        vocab_file: String,
        /// Text left of the cursor
        context: String,
        /// Number of candidates to show
        #[arg(short, long, default_value = "5")]
        n: usize,
    },

    /// Replay a timestamped switch script and print the resulting events
    Simulate {
        /// Script file: `<ms> <press|release|resume|wait>` per line
        script: String,
        /// Settings TOML (defaults to the embedded settings)
        #[arg(long)]
        settings: Option<String>,
        /// Corpus for the lexicon predictor (predictions unavailable without one)
        #[arg(long)]
        corpus: Option<String>,
        /// Output as JSON lines instead of text
        #[arg(long)]
        json: bool,
        /// Write a JSON trace of the run here (needs the `trace` feature)
        #[arg(long)]
        trace_dir: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the default settings TOML
    Export,
    /// Validate a settings TOML file
    Validate {
        /// Settings file to check
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Settings { action } => match action {
            SettingsAction::Export => config_ops::settings_export(),
            SettingsAction::Validate { file } => config_ops::settings_validate(&file),
        },
        Command::Predict { corpus, context, n } => {
            predict_ops::predict_lexicon(&corpus, &context, n)
        }
        #[cfg(feature = "neural")]
        Command::PredictNeural {
            model_file,
            vocab_file,
            context,
            n,
        } => predict_ops::predict_neural(&model_file, &vocab_file, &context, n),
        Command::Simulate {
            script,
            settings,
            corpus,
            json,
            trace_dir,
        } => simulate_ops::simulate(
            &script,
            settings.as_deref(),
            corpus.as_deref(),
            json,
            trace_dir.as_deref(),
        ),
    }
}
