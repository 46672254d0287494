use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use clap::{Parser, Subcommand};
use hmsvm::{
    quark::StringTable, simulate_two_state_model, Dataset, Evaluation, HmsvmLabels, HmsvmModel,
    ModelParams, Quark,
    SimulationParams, StructuredModel, Weights,
};

#[derive(Debug, Parser)]
#[command(version)]
#[command(propagate_version = true)]
struct Argv {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a synthetic two-state data set.
    Simulate {
        #[arg(short = 'n', long, default_value_t = 100)]
        num_examples: usize,
        #[arg(short = 'T', long, default_value_t = 250)]
        length: usize,
        #[arg(short = 'D', long, default_value_t = 10)]
        num_features: usize,
        #[arg(long, default_value_t = 2)]
        num_noise_features: usize,
        /// Shortest run in one state.
        #[arg(long, default_value_t = 10)]
        min_block_len: usize,
        /// Longest run in one state.
        #[arg(long, default_value_t = 50)]
        max_block_len: usize,
        #[arg(long, default_value_t = 0.5)]
        noise: f64,
        #[arg(long, default_value_t = 17)]
        seed: u64,
        /// Output file, stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a data set and report the model dimensions.
    Check {
        #[arg(short)]
        parameters: Vec<String>,
        /// Number of states, by default the number of state names seen.
        #[arg(short = 'S', long)]
        num_states: Option<usize>,
        #[arg(required = true)]
        datasets: Vec<PathBuf>,
    },
    /// Print the QP constraints derived for a data set as JSON.
    Constraints {
        #[arg(short)]
        parameters: Vec<String>,
        /// Number of states, by default the number of state names seen.
        #[arg(short = 'S', long)]
        num_states: Option<usize>,
        #[arg(required = true)]
        datasets: Vec<PathBuf>,
    },
    /// Decode data sets with a weight file and report accuracy.
    Tag {
        #[arg(short, long)]
        model: PathBuf,
        /// Print the predicted state of every item.
        #[arg(long)]
        predictions: bool,
        #[arg(required = true)]
        datasets: Vec<PathBuf>,
    },
}

/// Reads and concatenates labelled data sets, sharing state ids through `states`.
fn read_datasets(paths: &[PathBuf], states: &mut Quark) -> hmsvm::Result<(Dataset, HmsvmLabels)> {
    let mut seqs = Vec::new();
    let mut paths_seen = Vec::new();
    let mut num_features = None;
    for fpath in paths {
        log::info!("reading dataset from: {:?}", fpath);
        let (ds, labels) = Dataset::read_labelled(File::open(fpath)?, states)?;
        if ds.is_empty() {
            log::warn!("no sequences in {:?}", fpath);
            continue;
        }
        match num_features {
            Some(d) if d != ds.num_features => {
                return Err(hmsvm::Error::InvalidInput(format!(
                    "{:?} has {} features, expected {d}",
                    fpath, ds.num_features
                )));
            }
            _ => num_features = Some(ds.num_features),
        }
        seqs.extend(ds.seqs);
        paths_seen.extend(labels.iter().map(|y| y.states().to_vec()));
    }

    let mut ds = Dataset::new(num_features.unwrap_or_default());
    for obs in seqs {
        ds.push(obs)?;
    }
    let mut labels = HmsvmLabels::with_capacity(paths_seen.len(), states.len().max(1))?;
    for path in paths_seen {
        labels.add_label(path)?;
    }
    Ok((ds, labels))
}

fn build_model(
    parameters: &[String],
    num_states: Option<usize>,
    datasets: &[PathBuf],
) -> hmsvm::Result<HmsvmModel> {
    let mut params = ModelParams::default();
    params.set_all(parameters)?;
    let mut states = Quark::default();
    let (ds, labels) = read_datasets(datasets, &mut states)?;
    match num_states {
        Some(S) => HmsvmModel::with_num_states(ds, labels, S, params),
        None => HmsvmModel::with_params(ds, labels, params),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let argv = Argv::parse();
    let mut logger = env_logger::Builder::from_default_env();
    match argv.verbose {
        0 => {}
        1 => {
            logger.filter_level(log::LevelFilter::Info);
        }
        _ => {
            logger.filter_level(log::LevelFilter::Debug);
        }
    }
    logger.init();
    log::info!("argv: {:?}", argv);
    match argv.command {
        Command::Simulate {
            num_examples,
            length,
            num_features,
            num_noise_features,
            min_block_len,
            max_block_len,
            noise,
            seed,
            output,
        } => {
            let params = SimulationParams {
                num_examples,
                length,
                num_features,
                num_noise_features,
                block_len: (min_block_len, max_block_len),
                noise,
                seed,
            };
            let (ds, labels) = simulate_two_state_model(&params)?;
            let out: Box<dyn Write> = match &output {
                Some(fpath) => Box::new(File::create(fpath)?),
                None => Box::new(io::stdout().lock()),
            };
            ds.write_labelled(BufWriter::new(out), &labels, &Quark::numbered(2))?;
        }
        Command::Check {
            parameters,
            num_states,
            datasets,
        } => {
            let model = build_model(&parameters, num_states, &datasets)?;
            model.check_training_setup()?;
            println!(
                "S: {}, D: {}, N: {}, dim: {}",
                model.num_states(),
                model.num_features(),
                model.features().len(),
                model.get_dim()
            );
        }
        Command::Constraints {
            parameters,
            num_states,
            datasets,
        } => {
            let model = build_model(&parameters, num_states, &datasets)?;
            let cons = model.init_opt();
            let fmt = |v: &[f64]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
            let summary = serde_json::json!({
                "dim": cons.dim(),
                "lb": fmt(&cons.lb),
                "ub": fmt(&cons.ub),
                "num_inequalities": cons.a.rows,
                "num_equalities": cons.b.rows,
                "c": model.params().c,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Tag {
            model,
            predictions,
            datasets,
        } => {
            let weights = Weights::from_path(&model)?;
            log::info!("loaded weights from {:?} (dim: {})", model, weights.w.len());
            let mut states = weights.states.clone();
            let (ds, labels) = read_datasets(&datasets, &mut states)?;
            let hmsvm =
                HmsvmModel::with_num_states(ds, labels, weights.num_states, weights.params.clone())?;
            hmsvm.check_training_setup()?;

            let begin = Instant::now();
            let mut eval = Evaluation::new(states.clone());
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for i in 0..hmsvm.features().len() {
                let res = hmsvm.argmax(&weights.w, i, false)?;
                let truth = hmsvm.labels().get_label(i).map(|y| y.states()).unwrap_or_default();
                eval.accumulate(truth, &res.argmax);
                if predictions {
                    for s in states.decode_path(&res.argmax) {
                        writeln!(out, "{s}")?;
                    }
                    writeln!(out)?;
                }
            }
            let sec = begin.elapsed().as_secs_f64();
            eval.evaluate();
            write!(out, "{eval}")?;
            writeln!(
                out,
                "Elapsed time: {:.6} [sec] ({:.1} [instance/sec])",
                sec,
                hmsvm.features().len() as f64 / sec.max(f64::EPSILON)
            )?;
        }
    }
    Ok(())
}
