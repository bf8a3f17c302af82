use clap::{Parser, ValueEnum};

use cattus_selfplay::mcts::evaluator::{Evaluator, RolloutEvaluator, UniformEvaluator};
use cattus_selfplay::mcts::MctsParams;
use cattus_selfplay::self_play::{
    PlayerParams, ResignDisable, ResignPolicy, SelfPlayBatch, SelfPlayConfig, TemperaturePolicy,
};
use cattus_selfplay::ttt::TttPosition;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EvaluatorKind {
    Uniform,
    Rollout,
}

#[derive(Parser, Debug)]
#[clap(about = "Batched MCTS self-play of tic-tac-toe games", long_about = None)]
struct Args {
    #[clap(long, default_value = "16")]
    games_num: usize,
    #[clap(long, default_value = "100")]
    readouts: usize,
    #[clap(long, default_value = "-0.9", allow_hyphen_values = true)]
    resign_threshold: f32,
    /// Probability of disabling resignation for the whole run
    #[clap(long, default_value = "0.05")]
    disable_resign_prob: f64,
    #[clap(long, value_enum, default_value = "root-value")]
    resign_policy: ResignPolicy,
    #[clap(long, default_value = "30,1.0,0.0")]
    temperature_policy: TemperaturePolicy,
    #[clap(long, default_value = "1.41421")]
    explore_factor: f32,
    #[clap(long, default_value = "0.03")]
    prior_noise_alpha: f32,
    #[clap(long, default_value = "0.25")]
    prior_noise_epsilon: f32,
    #[clap(long, value_enum, default_value = "rollout")]
    evaluator: EvaluatorKind,
    #[clap(long, default_value = "0")]
    seed: u64,
    #[clap(short, long, default_value = "1")]
    verbosity: u8,
}

/// Search tree diagnostics are logged at debug level, enabled from verbosity 3
fn log_level(verbosity: u8) -> log::LevelFilter {
    if verbosity > 2 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(log_level(args.verbosity))
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .init();

    let config = SelfPlayConfig {
        player: PlayerParams {
            mcts: MctsParams {
                c_puct: args.explore_factor,
                noise_alpha: args.prior_noise_alpha,
                noise_epsilon: args.prior_noise_epsilon,
            },
            temperature: args.temperature_policy,
            resign_policy: args.resign_policy,
        },
        resign_disable: ResignDisable::Sample(args.disable_resign_prob),
        verbosity: args.verbosity,
    };

    let mut evaluator: Box<dyn Evaluator<TttPosition>> = match args.evaluator {
        EvaluatorKind::Uniform => Box::new(UniformEvaluator),
        EvaluatorKind::Rollout => Box::new(RolloutEvaluator::from_seed(args.seed ^ 0xe4655449311aee87)),
    };

    let mut batch = SelfPlayBatch::new(TttPosition::new(), config, args.seed);
    let results = batch.play(
        evaluator.as_mut(),
        args.games_num,
        args.readouts,
        args.resign_threshold,
    )?;

    let summary = results.summary();
    log::info!(
        "Played {} games (resignation disabled: {}): X wins {}, O wins {}, draws {}, resignations {}",
        results.players.len(),
        results.resign_disabled,
        summary.w1,
        summary.w2,
        summary.d,
        summary.resignations
    );
    log::info!("Generated {} training examples", results.training_examples().len());
    Ok(())
}
