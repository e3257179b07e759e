use anyhow::Context;
use clap::Parser;
use geoforward::config::{SimulationConfig, default_config_template};
use geoforward::numerics::timing::Counter;
use geoforward::pairing::PairingRegistry;
use geoforward::problem::diffusion::DiffusionProblem;
use geoforward::processing::csv_writer;
use geoforward::processing::summary::RunSummary;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "geoforward")]
#[command(about = "Generate a synthetic survey from a finite-volume diffusion problem")]
struct Args {
    /// Path to configuration file (TOML); defaults are used when omitted
    config: Option<PathBuf>,

    /// Print a default configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", default_config_template());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    let level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let mesh = Arc::new(config.mesh.build());
    info!("mesh: {} cells, {} faces", mesh.n_cells(), mesh.faces.len());

    let model = config.model.build(Arc::clone(&mesh))?;
    let m = config.model.parameters(&mesh);
    let problem = DiffusionProblem::new(model.clone(), config.problem.clone())?;

    let counter = Rc::new(Counter::new());
    let mut registry = PairingRegistry::with_metrics(counter.clone());
    let problem = registry.add_problem(problem);

    let mut rng = ChaCha8Rng::seed_from_u64(config.noise.seed);
    let survey = registry.create_synthetic_data(problem, &m, config.noise.std, None, &config.survey, &mut rng)?;
    let survey = registry.survey(survey)?;

    let csv_path = config.output_dir.join("survey.csv");
    csv_writer::write_survey(&csv_path, survey, &mesh)
        .with_context(|| format!("writing {}", csv_path.display()))?;
    info!("survey written to {}", csv_path.display());

    let summary = RunSummary::from_run(&mesh, &model, &m, survey);
    let summary_path = config.output_dir.join("summary.txt");
    summary
        .write_to_file(&summary_path)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    summary.print_to_console();
    counter.print_summary();

    Ok(())
}
