use bevy::app::App;

mod cli;
mod scenarios;

/// A benchmark that can be run with the CLI.
#[derive(Clone, Copy, Debug)]
pub struct Benchmark {
    /// The name of the benchmark.
    pub name: &'static str,
    /// The name of the module where the benchmark is defined.
    pub module: &'static str,
    /// A function that constructs the benchmark application.
    pub constructor: fn() -> App,
}

impl Benchmark {
    /// Creates a new benchmark with the given name, module, and constructor function.
    pub const fn new(name: &'static str, module: &'static str, constructor: fn() -> App) -> Self {
        Self {
            name,
            module,
            constructor,
        }
    }
}

fn main() {
    let benchmarks = scenarios::BENCHMARKS;
    let args = cli::Args::parse();

    if args.list {
        cli::list(benchmarks);
        return;
    }

    if let Some(name) = &args.name {
        if let Some(benchmark) = benchmarks.iter().find(|b| b.name == name) {
            cli::run(benchmark, &args);
        } else if let Ok(Some(benchmark)) = name
            .parse::<usize>()
            .map(|i| i.checked_sub(1).and_then(|i| benchmarks.get(i)))
        {
            cli::run(benchmark, &args);
        } else {
            eprintln!("Benchmark '{name}' not found. Use --list to see available benchmarks.");
        }
    } else {
        cli::run_all(benchmarks, &args);
    }
}
