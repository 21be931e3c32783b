//! A training-script front end.
//!
//! ```text
//! cargo run --example train_demo -- --train.lr=5e-4 --no_env.static_env
//! cargo run --example train_demo -- --config demos/train_demo/ --train.epochs 3
//! cargo run --example train_demo -- --help
//! ```
//!
//! With a directory as `--config`, the file `<dir>/train_demo.yaml` is read.

use argclass::{ArgEnum, ArgError, ArgSchema, Argclass, Field};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Optimizer {
    Adam,
    Sgd,
}

impl ArgEnum for Optimizer {
    fn variants() -> &'static [Self] {
        &[Optimizer::Adam, Optimizer::Sgd]
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct TrainArgs {
    lr: f64,
    epochs: i64,
    optimizer: Optimizer,
    milestones: Vec<i64>,
    seed: Option<u64>,
}

impl ArgSchema for TrainArgs {
    fn fields() -> Vec<Field> {
        vec![
            Field::of::<f64>("lr").default(1e-3).help("Learning rate."),
            Field::of::<i64>("epochs").default(10).help("Passes over the data."),
            Field::enumeration::<Optimizer>("optimizer").default(Optimizer::Adam),
            Field::of::<Vec<i64>>("milestones")
                .default_factory(Vec::<i64>::new)
                .help("Epochs at which the learning rate decays."),
            Field::of::<Option<u64>>("seed").default(None::<u64>),
        ]
    }

    fn group() -> Option<&'static str> {
        Some("Training")
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct EnvArgs {
    name: String,
    static_env: bool,
    render: bool,
}

impl ArgSchema for EnvArgs {
    fn fields() -> Vec<Field> {
        vec![
            Field::of::<String>("name").default("cartpole").value_name("ENV"),
            Field::of::<bool>("static_env")
                .default(true)
                .help("Keep the environment layout fixed between episodes."),
            Field::of::<bool>("render"),
        ]
    }

    fn group() -> Option<&'static str> {
        Some("Environment")
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct DemoArgs {
    train: TrainArgs,
    env: EnvArgs,
    cpu: bool,
    run_name: Option<String>,
}

impl ArgSchema for DemoArgs {
    fn fields() -> Vec<Field> {
        vec![
            Field::nested::<TrainArgs>("train"),
            Field::nested::<EnvArgs>("env"),
            Field::of::<bool>("cpu").help("Never use an accelerator."),
            Field::of::<Option<String>>("run_name").default(None::<String>),
        ]
    }
}

/// Values derived once from the resolved arguments, never stored on them.
#[derive(Debug)]
struct RuntimeContext {
    device: String,
    seed: u64,
}

impl RuntimeContext {
    fn from_args(args: &DemoArgs) -> Self {
        let device = match std::env::var("CUDA_VISIBLE_DEVICES") {
            Ok(devices) if !args.cpu && !devices.is_empty() => "cuda:0".to_string(),
            _ => "cpu".to_string(),
        };
        Self {
            device,
            seed: args.train.seed.unwrap_or(0),
        }
    }
}

fn main() -> Result<(), ArgError> {
    let args: DemoArgs = Argclass::builder().load()?;
    let ctx = RuntimeContext::from_args(&args);

    println!(
        "run {} on {} with seed {}: {} epochs of {:?} at lr {} in {}",
        args.run_name.as_deref().unwrap_or("<unnamed>"),
        ctx.device,
        ctx.seed,
        args.train.epochs,
        args.train.optimizer,
        args.train.lr,
        args.env.name,
    );
    if !args.train.milestones.is_empty() {
        println!("lr decays at epochs {:?}", args.train.milestones);
    }
    if !args.env.static_env {
        println!("environment layout is randomized");
    }
    if args.env.render {
        println!("rendering enabled");
    }
    Ok(())
}
