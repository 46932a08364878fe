use clap::Parser;
use cmaopt_cmaes::{
    AdvancedOptions, Bounds, CmaesOptimizer, Diagnostics, DriverConfigBuilder, FnSystem,
    OptionValue, ParallelConfig,
};
use cmaopt_testfunctions::{
    FunctionMetadata, canonical_name, get_function, get_function_metadata, list_functions,
};
use ndarray::Array1;
use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "run_cmaes",
    about = "Minimize a benchmark function with the box-constrained CMA-ES driver"
)]
struct Cli {
    /// Name of the benchmark function to optimize (use --list-functions to see available options)
    #[arg(long)]
    function: Option<String>,

    /// Dimensionality of the problem (defaults to the function's fixed dimension, else 5)
    #[arg(long)]
    dim: Option<usize>,

    /// Initial guess as comma-separated values
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    x0: Option<Vec<f64>>,

    /// Lower bound for every parameter (overrides the function's usual bounds)
    #[arg(long, allow_hyphen_values = true)]
    lower: Option<f64>,

    /// Upper bound for every parameter (overrides the function's usual bounds)
    #[arg(long, allow_hyphen_values = true)]
    upper: Option<f64>,

    /// Drop the function's usual bounds and run unconstrained
    #[arg(long)]
    unbounded: bool,

    /// Maximum number of generations
    #[arg(long, default_value_t = 1000)]
    max_iterations: usize,

    /// Stop once recent fitness values span less than this
    #[arg(long, default_value_t = 1e-12)]
    tolerance: f64,

    /// Maximum number of objective evaluations
    #[arg(long)]
    max_evaluations: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Advanced option as key=value (repeatable), e.g. --option lambda=12 --option sigma=0.5
    #[arg(long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// JSON file with advanced options; --option entries override it
    #[arg(long)]
    options_file: Option<PathBuf>,

    /// quiet, console, file or both (or the numeric levels 0-3)
    #[arg(long, default_value = "console")]
    diagnostics: String,

    /// Directory for the checkpoint and generation-history files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Evaluate each generation in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of threads for parallel evaluation (0 = use all available cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// List all available functions and exit
    #[arg(long)]
    list_functions: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    if args.list_functions {
        list_available_functions();
        return;
    }

    let requested = match &args.function {
        Some(name) => name.trim().to_lowercase(),
        None => fail("--function must be provided unless --list-functions is used."),
    };
    let function_name = canonical_name(&requested).unwrap_or_else(|| {
        fail(&format!(
            "function '{requested}' not found. Use --list-functions to inspect available names."
        ))
    });
    let function = get_function(function_name)
        .unwrap_or_else(|| fail(&format!("function '{function_name}' is not registered")));
    let metadata_map = get_function_metadata();
    let metadata = metadata_map.get(function_name);

    let dimension = determine_dimension(&args, metadata);
    if dimension < 2 {
        fail("problem dimension must be at least 2.");
    }
    if let Some(meta) = metadata {
        if !meta.supports_dimension(dimension) {
            fail(&format!("{function_name} is only defined for dimensions {:?}", meta.dimensions));
        }
    }

    let bounds = determine_bounds(&args, metadata, dimension);
    let x0 = determine_x0(&args, bounds.as_ref(), dimension);

    let mut options = match &args.options_file {
        Some(path) => AdvancedOptions::from_json_file(path)
            .unwrap_or_else(|e| fail(&format!("cannot read options file {}: {e}", path.display()))),
        None => AdvancedOptions::new(),
    };
    for entry in &args.options {
        let (key, value) = entry
            .split_once('=')
            .unwrap_or_else(|| fail(&format!("--option expects KEY=VALUE, got '{entry}'")));
        let value: OptionValue = value
            .parse()
            .unwrap_or_else(|e: String| fail(&format!("--option {key}: {e}")));
        options.set(key.trim(), value);
    }
    if let Some(seed) = args.seed {
        options.set("seed", seed_option(seed).unwrap_or_else(|e| fail(&e)));
    }

    let diagnostics: Diagnostics = args.diagnostics.parse().unwrap_or_else(|e: String| fail(&e));
    let parallel = if args.parallel {
        ParallelConfig::parallel(if args.threads == 0 { None } else { Some(args.threads) })
    } else {
        ParallelConfig::sequential()
    };

    let mut builder = DriverConfigBuilder::new()
        .max_iterations(args.max_iterations)
        .function_tolerance(args.tolerance)
        .diagnostics(diagnostics)
        .parallel(parallel);
    if let Some(max_evaluations) = args.max_evaluations {
        builder = builder.max_evaluations(max_evaluations);
    }
    if let Some(dir) = &args.output_dir {
        builder = builder.output_dir(dir);
    }

    let bounds_label = match &bounds {
        Some(b) => format!("bounds [{}, {}]", b.lower()[0], b.upper()[0]),
        None => "unbounded".to_string(),
    };
    let mut system = FnSystem::new(function, dimension);
    if let Some(b) = bounds {
        system = system.with_bounds(b).unwrap_or_else(|e| fail(&e.to_string()));
    }

    let mut optimizer = CmaesOptimizer::new(&system)
        .unwrap_or_else(|e| fail(&e.to_string()))
        .with_config(builder.build());
    optimizer.set_options(options);

    println!("Running CMA-ES on '{}' ({}D, {})...", function_name, dimension, bounds_label);

    let start = Instant::now();
    let report = match optimizer.minimize(&x0) {
        Ok(r) => r,
        Err(e) => fail(&format!("optimization failed: {e}")),
    };

    println!("\nOptimization completed in {:.2?}", start.elapsed());
    println!("Status: {}", report.message);
    println!(
        "Iterations: {} | Evaluations: {} | Population: {} | Seed: {}",
        report.nit, report.nfev, report.population_size, report.seed
    );
    if report.resamples > 0 || !report.stalls.is_empty() {
        println!(
            "Repair: {} resamples, {} clamped candidates",
            report.resamples,
            report.stalls.len()
        );
    }
    println!("Best objective: {:.6e}", report.fun);
    println!("Best parameters: [{}]", format_vector(&report.x));
    if let Some(meta) = metadata {
        println!(
            "Known optimum: {:.6e} at [{}]",
            meta.optimal_value,
            format_vector(&Array1::from_vec((meta.optimum)(dimension)))
        );
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(2);
}

/// Seeds travel through the integer option table.
fn seed_option(seed: u64) -> Result<i64, String> {
    i64::try_from(seed).map_err(|_| format!("--seed {seed} is too large (maximum {})", i64::MAX))
}

fn format_vector(x: &Array1<f64>) -> String {
    let mut buffer = String::new();
    for (idx, value) in x.iter().enumerate() {
        if idx > 0 {
            buffer.push_str(", ");
        }
        let _ = write!(&mut buffer, "{value:.6}");
    }
    buffer
}

fn list_available_functions() {
    let metadata = get_function_metadata();
    let names = list_functions();
    println!("Available test functions ({}):", names.len());
    for name in names {
        match metadata.get(&name) {
            Some(meta) => println!("- {name}: {}", meta.description),
            None => println!("- {name}"),
        }
    }
}

fn determine_dimension(args: &Cli, metadata: Option<&FunctionMetadata>) -> usize {
    if let Some(dim) = args.dim {
        return dim;
    }
    metadata.and_then(|m| m.dimensions.first().copied()).unwrap_or(5)
}

fn determine_bounds(args: &Cli, metadata: Option<&FunctionMetadata>, dim: usize) -> Option<Bounds> {
    if args.unbounded {
        return None;
    }
    let usual = metadata.and_then(|m| m.bounds);
    let lower = args.lower.or(usual.map(|(lo, _)| lo));
    let upper = args.upper.or(usual.map(|(_, hi)| hi));
    match (lower, upper) {
        (Some(lo), Some(hi)) => {
            Some(Bounds::uniform(dim, lo, hi).unwrap_or_else(|e| fail(&e.to_string())))
        }
        (None, None) => None,
        _ => fail("--lower and --upper must be given together for an unbounded function."),
    }
}

/// Explicit `--x0`, else a point a quarter span above the centre of the
/// box, else 0.5 everywhere.
fn determine_x0(args: &Cli, bounds: Option<&Bounds>, dim: usize) -> Array1<f64> {
    if let Some(values) = &args.x0 {
        if values.len() == 1 {
            return Array1::from_elem(dim, values[0]);
        }
        if values.len() != dim {
            fail(&format!("--x0 has {} values, expected {}", values.len(), dim));
        }
        return Array1::from_vec(values.clone());
    }
    match bounds {
        Some(b) => (b.lower() * 0.25) + (b.upper() * 0.75),
        None => Array1::from_elem(dim, 0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_option_range() {
        assert_eq!(seed_option(42), Ok(42));
        assert_eq!(seed_option(i64::MAX as u64), Ok(i64::MAX));
        let err = seed_option(u64::MAX).unwrap_err();
        assert!(err.contains("too large"), "{err}");
    }

    #[test]
    fn test_cli_parses_large_seed() {
        let args = ["run_cmaes", "--function", "sphere", "--seed", "18446744073709551615"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.seed, Some(u64::MAX));
        assert!(seed_option(cli.seed.unwrap()).is_err());
    }
}
