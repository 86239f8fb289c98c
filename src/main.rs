//! Lattice Novelty CLI - Run phased novelty-search experiments from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lattice_novelty::{
    compute::evolution::{
        Collaborators, CompressionModel, LogDiagnostics, ModelSource, PhaseOrchestrator,
        generate_lattice, population_novelty_scores,
    },
    compute::{CppnRng, PooledEncoder, SpeciatedPopulation, StructuralConstraints},
    schema::{ExperimentConfig, Lattice, ReproductionConfig},
    storage::FileStore,
};

/// Attempts per requested bootstrap lattice before giving up.
const BOOTSTRAP_ATTEMPTS: usize = 20;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Run a phased novelty-search experiment from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to experiment configuration file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: ExperimentConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        eprintln!("Experiment failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: ExperimentConfig) -> Result<(), Box<dyn Error>> {
    let [nx, ny, nz] = config.lattice_shape;
    println!("Lattice Novelty Experiment");
    println!("==========================");
    println!("Experiment: {}", config.experiment);
    println!("Lattice: {}x{}x{}", nx, ny, nz);
    println!(
        "Populations: {} x {} genomes",
        config.population_count, config.reproduction.population_size
    );
    println!(
        "Phases: {} x {} generations",
        config.phases.phase_count, config.phases.generations_per_phase
    );
    println!();

    let start = Instant::now();
    let store = Arc::new(FileStore::new(&config.results_dir, &config.experiment));
    let constraints = StructuralConstraints::from_config(&config.constraints);
    let mut rng = match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    bootstrap_seed_models(&config, &store, &constraints, &mut rng)?;

    let collaborators = Collaborators {
        feasibility: Arc::new(constraints),
        models: store.clone(),
        store: store.clone(),
        diagnostics: Arc::new(LogDiagnostics),
    };

    let mut orchestrators = (0..config.population_count)
        .map(|id| {
            let seed = config.random_seed.map(|s| s.wrapping_add(id as u64));
            let population = SpeciatedPopulation::new(config.reproduction.clone(), seed);
            PhaseOrchestrator::new(config.clone(), id, population, collaborators.clone())
        })
        .collect::<Result<Vec<_>, _>>()?;

    for phase in 0..config.phases.phase_count {
        let phase_start = Instant::now();
        let mut handoff: Vec<Lattice> = Vec::new();
        for orchestrator in &mut orchestrators {
            let artifacts = orchestrator.run_phase(phase)?;
            handoff.extend(artifacts.lattices);
        }
        let path = store.write_phase_lattices(phase, "Handoff.vxld", &handoff)?;
        log::info!(
            "Phase {} handed off {} lattices to {}",
            phase,
            handoff.len(),
            path.display()
        );

        let encoder = if config.phases.static_model {
            store.load_encoder(ModelSource::Seed {
                noisy: config.phases.noise,
            })?
        } else {
            let encoder =
                PooledEncoder::fit(config.lattice_shape, config.model.block_size, &handoff);
            store.save_model(ModelSource::Phase(phase), &encoder)?;
            encoder
        };

        let scores = population_novelty_scores(&encoder.encode_batch(&handoff));
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };
        println!(
            "Phase {}: {} lattices, diagnostic novelty {:.2} ({:.1}s)",
            phase,
            handoff.len(),
            mean,
            phase_start.elapsed().as_secs_f32()
        );
    }

    println!();
    println!(
        "Finished in {:.1}s, results in {}",
        start.elapsed().as_secs_f32(),
        store.root().display()
    );
    Ok(())
}

/// Fit and save the seed encoders if either is missing.
fn bootstrap_seed_models(
    config: &ExperimentConfig,
    store: &FileStore,
    constraints: &StructuralConstraints,
    rng: &mut StdRng,
) -> Result<(), Box<dyn Error>> {
    let clean = ModelSource::Seed { noisy: false };
    let noisy = ModelSource::Seed { noisy: true };
    if store.has_model(clean) && store.has_model(noisy) {
        return Ok(());
    }

    log::info!(
        "No seed models under {}, fitting from {} random lattices",
        store.root().display(),
        config.model.bootstrap_samples
    );
    let lattices = random_feasible_lattices(config, constraints, rng);
    if lattices.len() < config.model.bootstrap_samples {
        log::warn!(
            "Only {} of {} bootstrap lattices were feasible",
            lattices.len(),
            config.model.bootstrap_samples
        );
    }

    let shape = config.lattice_shape;
    let block = config.model.block_size;
    store.save_model(clean, &PooledEncoder::fit(shape, block, &lattices))?;

    let noisy_lattices: Vec<Lattice> = lattices
        .iter()
        .map(|l| l.with_noise(config.phases.noise_rate, &mut *rng))
        .collect();
    store.save_model(noisy, &PooledEncoder::fit(shape, block, &noisy_lattices))?;
    Ok(())
}

/// Decode random, structurally mutated genomes until enough are feasible.
fn random_feasible_lattices(
    config: &ExperimentConfig,
    constraints: &StructuralConstraints,
    rng: &mut StdRng,
) -> Vec<Lattice> {
    let wanted = config.model.bootstrap_samples;
    let mut cppn = CppnRng::new(rng.r#gen());
    let growth = ReproductionConfig {
        add_node_rate: 0.5,
        add_connection_rate: 0.5,
        weight_mutation_rate: 1.0,
        weight_mutation_power: 1.0,
        ..config.reproduction.clone()
    };

    let mut lattices = Vec::with_capacity(wanted);
    for _ in 0..wanted * BOOTSTRAP_ATTEMPTS {
        if lattices.len() == wanted {
            break;
        }
        let mut genome = cppn.random_genome();
        for _ in 0..cppn.index(8) {
            cppn.mutate(&mut genome, &growth);
        }
        let (feasible, lattice) = generate_lattice(&genome, config.lattice_shape, constraints);
        if feasible {
            lattices.push(lattice);
        }
    }
    lattices
}

fn print_example_config() {
    let config = ExperimentConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
