//! Stochastic CLI - inspect and exercise deterministic random streams.
//!
//! - `stochastic words` - print sampled raw words (baseline vector format)
//! - `stochastic sample` - summary statistics of a distribution sampler
//! - `stochastic checkpoint` - draw, then save a binary stream checkpoint
//! - `stochastic resume` - restore a checkpoint and keep drawing

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use stochastic_core_rs::{deserialize_stream, serialize_stream, GeneratorKind, RandomStream};

#[derive(Parser)]
#[command(name = "stochastic")]
#[command(about = "Deterministic random streams and samplers", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct StreamArgs {
    /// Generator (USE_PSEUDO_DES, pseudo-des, aes, lcg, ...)
    #[arg(short, long, default_value = "USE_PSEUDO_DES")]
    generator: GeneratorKind,

    /// Stream seed
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Buffer capacity in words (0 selects the default)
    #[arg(long, default_value_t = 0)]
    capacity: usize,
}

impl StreamArgs {
    fn open(&self) -> RandomStream {
        tracing::debug!(
            generator = %self.generator,
            seed = self.seed,
            capacity = self.capacity,
            "Opening random stream"
        );
        RandomStream::with_capacity(self.generator, self.seed, self.capacity)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print every stride-th raw word
    Words {
        #[command(flatten)]
        stream: StreamArgs,

        /// Distance between printed words
        #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u64).range(1..))]
        stride: u64,

        /// Number of words to print
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },

    /// Draw from a distribution and print count, mean and standard deviation
    Sample {
        #[command(flatten)]
        stream: StreamArgs,

        #[arg(short, long, value_enum)]
        distribution: Distribution,

        /// Number of samples
        #[arg(long, default_value_t = 100_000, value_parser = clap::value_parser!(u64).range(1..))]
        draws: u64,

        #[command(flatten)]
        params: SampleParams,
    },

    /// Draw K words, then write a binary checkpoint
    Checkpoint {
        #[command(flatten)]
        stream: StreamArgs,

        /// Words to draw before checkpointing
        #[arg(long, default_value_t = 0)]
        draws: u64,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Restore a checkpoint and print the next words
    Resume {
        /// Checkpoint file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of words to print
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Distribution {
    Gaussian,
    Exponential,
    Poisson,
    PoissonExact,
    Weibull,
    LogLogistic,
    Binomial,
    BinomialApprox,
    #[value(name = "binomial-approx2")]
    BinomialApprox2,
    Gamma,
}

/// Distribution parameters; each sampler reads only the ones it needs
#[derive(Args, Debug)]
struct SampleParams {
    /// Mean (gaussian, poisson, poisson-exact, gamma)
    #[arg(long)]
    mean: Option<f64>,

    /// Standard deviation (gaussian)
    #[arg(long)]
    std_dev: Option<f64>,

    /// Event rate (exponential)
    #[arg(long)]
    rate: Option<f64>,

    /// Scale: lambda for weibull, alpha for log-logistic
    #[arg(long)]
    scale: Option<f64>,

    /// Shape: kappa for weibull, beta for log-logistic
    #[arg(long)]
    shape: Option<f64>,

    /// Number of trials (binomial family)
    #[arg(long)]
    trials: Option<u64>,

    /// Success probability (binomial family)
    #[arg(long)]
    probability: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Words {
            stream,
            stride,
            count,
        } => print_words(&mut stream.open(), stride, count),
        Commands::Sample {
            stream,
            distribution,
            draws,
            params,
        } => sample(&stream, distribution, draws, &params),
        Commands::Checkpoint { stream, draws, out } => write_checkpoint(&stream, draws, &out),
        Commands::Resume { input, count } => resume(&input, count),
    }
}

fn print_words(rng: &mut RandomStream, stride: u64, count: usize) -> Result<()> {
    for _ in 0..count {
        println!("0x{:08X}", rng.next_word());
        for _ in 1..stride {
            rng.next_word();
        }
    }
    Ok(())
}

fn sample(
    stream: &StreamArgs,
    distribution: Distribution,
    draws: u64,
    params: &SampleParams,
) -> Result<()> {
    let mut rng = stream.open();

    let mean = params.mean.unwrap_or(1.0);
    let trials = params.trials.unwrap_or(100);
    let probability = params.probability.unwrap_or(0.5);
    let scale = params.scale.unwrap_or(1.0);
    let shape = params.shape.unwrap_or(1.0);

    let mut draw: Box<dyn FnMut(&mut RandomStream) -> f64> = match distribution {
        Distribution::Gaussian => {
            let mean = params.mean.unwrap_or(0.0);
            let std_dev = params.std_dev.unwrap_or(1.0);
            Box::new(move |rng: &mut RandomStream| mean + std_dev * rng.gaussian())
        }
        Distribution::Exponential => {
            let rate = params.rate.unwrap_or(1.0);
            Box::new(move |rng: &mut RandomStream| rng.exponential(rate))
        }
        Distribution::Poisson => {
            Box::new(move |rng: &mut RandomStream| rng.poisson(mean) as f64)
        }
        Distribution::PoissonExact => {
            Box::new(move |rng: &mut RandomStream| rng.poisson_exact(mean) as f64)
        }
        Distribution::Weibull => {
            Box::new(move |rng: &mut RandomStream| rng.weibull(scale, shape))
        }
        Distribution::LogLogistic => {
            Box::new(move |rng: &mut RandomStream| rng.log_logistic(scale, shape))
        }
        Distribution::Binomial => {
            Box::new(move |rng: &mut RandomStream| rng.binomial_exact(trials, probability) as f64)
        }
        Distribution::BinomialApprox => {
            Box::new(move |rng: &mut RandomStream| rng.binomial_approx(trials, probability) as f64)
        }
        Distribution::BinomialApprox2 => {
            Box::new(move |rng: &mut RandomStream| rng.binomial_approx2(trials, probability) as f64)
        }
        Distribution::Gamma => Box::new(move |rng: &mut RandomStream| rng.gamma_approx(mean)),
    };

    tracing::info!(?distribution, draws, generator = %stream.generator, "Sampling");

    // Welford's running mean and variance
    let mut count = 0u64;
    let mut running_mean = 0.0;
    let mut m2 = 0.0;
    for _ in 0..draws {
        let value = draw(&mut rng);
        count += 1;
        let delta = value - running_mean;
        running_mean += delta / count as f64;
        m2 += delta * (value - running_mean);
    }
    let std_dev = (m2 / count as f64).sqrt();

    let summary = json!({
        "distribution": format!("{:?}", distribution),
        "generator": stream.generator.name(),
        "seed": stream.seed,
        "count": count,
        "mean": running_mean,
        "std_dev": std_dev,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn write_checkpoint(stream: &StreamArgs, draws: u64, out: &Path) -> Result<()> {
    let mut rng = stream.open();
    for _ in 0..draws {
        rng.next_word();
    }

    let bytes = serialize_stream(&rng);
    std::fs::write(out, &bytes)
        .with_context(|| format!("Failed to write checkpoint to {}", out.display()))?;

    tracing::info!(
        path = %out.display(),
        bytes = bytes.len(),
        cursor = rng.cursor(),
        "Checkpoint written"
    );
    Ok(())
}

fn resume(input: &Path, count: usize) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read checkpoint from {}", input.display()))?;
    let mut rng = deserialize_stream(&bytes)
        .with_context(|| format!("Invalid checkpoint {}", input.display()))?;

    tracing::info!(
        generator = %rng.kind(),
        capacity = rng.capacity(),
        cursor = rng.cursor(),
        "Checkpoint restored"
    );

    print_words(&mut rng, 1, count)
}
