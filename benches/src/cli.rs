//! A command line interface for running island manager benchmarks.

use core::{ops::Range, time::Duration};
use std::{
    io,
    path::{Path, PathBuf},
    process::Command,
};

use bevy::{
    app::{App, PluginsState},
    tasks::{ComputeTaskPool, TaskPoolBuilder},
};
use clap::Parser;
use constraint_islands::prelude::IslandDiagnostics;

use crate::Benchmark;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The name or number of the benchmark to run. Leave empty to run all benchmarks.
    #[arg(short, long)]
    pub name: Option<String>,

    /// A range for which thread counts to run the benchmarks with.
    /// Can be specified as `start..end` (exclusive), `start..=end` (inclusive), or `start`.
    #[arg(short, long, value_parser = parse_range, default_value = "1")]
    pub threads: Range<u32>,

    /// The number of steps to run for each benchmark.
    #[arg(short, long, default_value_t = 500)]
    pub steps: u32,

    /// The number of times to repeat each benchmark.
    /// The results will be averaged over these repetitions.
    #[arg(short, long, default_value_t = 5)]
    pub repeat: u32,

    /// List all available benchmarks in a numbered list.
    #[arg(short, long)]
    pub list: bool,

    /// The output directory where results are written in CSV format.
    /// Leave empty to disable output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Parses the command line arguments and returns an `Args` instance.
    pub fn parse() -> Self {
        Parser::parse()
    }

    fn options(&self, threads: u32) -> BenchmarkOptions {
        BenchmarkOptions {
            threads,
            steps: self.steps,
            repeat: self.repeat,
        }
    }
}

fn parse_range(s: &str) -> Result<Range<u32>, String> {
    let parse = |s: &str| s.parse::<u32>().map_err(|e| e.to_string());
    match s.split_once("..") {
        None => {
            let start = parse(s)?;
            Ok(start..start + 1)
        }
        Some((start, end)) => {
            let start = parse(start)?;
            let end = match end.strip_prefix('=') {
                Some(inclusive_end) => parse(inclusive_end)? + 1,
                None => parse(end)?,
            };
            if start >= end {
                return Err(format!("empty thread range {s}"));
            }
            Ok(start..end)
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BenchmarkOptions {
    /// The number of threads to use for the benchmark.
    pub threads: u32,
    /// The number of steps to run for each benchmark.
    pub steps: u32,
    /// The number of times to repeat the benchmark.
    ///
    /// This is used to average the results over multiple runs.
    pub repeat: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct BenchmarkResult {
    /// The average time taken for a single step in the benchmark.
    pub average_time: Duration,
    /// The minimum time taken for a single step in the benchmark.
    pub min_time: Duration,
    /// The average number of islands handed to the solver per step.
    pub average_awake_islands: f64,
}

impl BenchmarkResult {
    const CSV_HEADER: &str = "benchmark,threads,avg_step_ms,min_step_ms,avg_awake_islands\n";

    fn csv_row(&self, name: &str, threads: u32) -> String {
        format!(
            "{name},{threads},{:.6},{:.6},{:.2}\n",
            self.average_time.as_secs_f64() * 1000.0,
            self.min_time.as_secs_f64() * 1000.0,
            self.average_awake_islands
        )
    }
}

/// Lists all available benchmarks in the console.
pub fn list(benchmarks: &[Benchmark]) {
    println!("Available benchmarks:");
    for (i, benchmark) in benchmarks.iter().enumerate() {
        println!("{:>2}. {} ({})", i + 1, benchmark.name, benchmark.module);
    }
}

fn csv_file_name(name: &str) -> String {
    format!("{}.csv", name.to_lowercase().replace(' ', "_"))
}

/// Writes a CSV file to the output directory, creating the directory if needed.
fn write_csv(output_dir: &Path, file_name: &str, csv: &str) {
    let result: io::Result<PathBuf> = std::fs::create_dir_all(output_dir).and_then(|()| {
        let path = output_dir.join(file_name);
        std::fs::write(&path, csv)?;
        Ok(path)
    });
    match result {
        Ok(path) => println!("Results written to {}", path.display()),
        Err(err) => eprintln!("Failed to write results to {}: {err}", output_dir.display()),
    }
}

/// Runs the given benchmark and prints the results to the console.
///
/// If `--output` is specified, the results will also be written to a CSV file
/// in the specified directory.
pub fn run(benchmark: &Benchmark, args: &Args) {
    if args.threads.len() != 1 {
        println!(
            "Running benchmark '{}' with threads ranging from {} to {}:",
            benchmark.name,
            args.threads.start,
            args.threads.end - 1
        );
        run_benchmark_with_thread_range(benchmark, args);
        return;
    }

    let threads = args.threads.start;
    println!("Running benchmark '{}' with {threads} threads:", benchmark.name);
    let result = run_benchmark(benchmark.constructor, &args.options(threads));

    // The last three lines are parsed by `run_benchmark_with_child_process`.
    println!("Avg awake islands: {:.2}", result.average_awake_islands);
    println!("Avg step time (s): {}", result.average_time.as_secs_f64());
    println!("Min step time (s): {}", result.min_time.as_secs_f64());

    if let Some(output_dir) = &args.output {
        let csv = format!(
            "{}{}",
            BenchmarkResult::CSV_HEADER,
            result.csv_row(benchmark.name, threads)
        );
        write_csv(output_dir, &csv_file_name(benchmark.name), &csv);
    }
}

/// Runs all benchmarks and prints the results to the console.
///
/// If `--output` is specified, the results will also be written to a CSV file
/// in the specified directory.
pub fn run_all(benchmarks: &[Benchmark], args: &Args) {
    if args.threads.len() != 1 {
        println!(
            "Running all benchmarks with threads ranging from {} to {}:",
            args.threads.start,
            args.threads.end - 1
        );
        for benchmark in benchmarks {
            println!("'{}'", benchmark.name);
            run_benchmark_with_thread_range(benchmark, args);
        }
        return;
    }

    let threads = args.threads.start;
    println!("Running all benchmarks with {threads} threads:");
    let name_width = benchmarks
        .iter()
        .map(|b| b.name.len())
        .max()
        .unwrap_or(0)
        .max(9);
    println!(
        "| {:<name_width$} | avg time / step | min time / step | awake islands |",
        "benchmark"
    );
    println!(
        "| {} | --------------- | --------------- | ------------- |",
        "-".repeat(name_width)
    );

    let mut csv = String::from(BenchmarkResult::CSV_HEADER);
    for benchmark in benchmarks {
        let result = run_benchmark(benchmark.constructor, &args.options(threads));
        println!(
            "| {:<name_width$} | {:>12.5} ms | {:>12.5} ms | {:>13.2} |",
            benchmark.name,
            result.average_time.as_secs_f64() * 1000.0,
            result.min_time.as_secs_f64() * 1000.0,
            result.average_awake_islands
        );
        csv.push_str(&result.csv_row(benchmark.name, threads));
    }

    if let Some(output_dir) = &args.output {
        write_csv(
            output_dir,
            &format!("benchmarks_{threads}_threads.csv"),
            &csv,
        );
    }
}

/// Runs a benchmark with a range of thread counts and prints the results to the console.
///
/// If `--output` is specified, the results will also be written to a CSV file
/// in the specified directory.
fn run_benchmark_with_thread_range(benchmark: &Benchmark, args: &Args) {
    println!("| threads | avg time / step | min time / step |");
    println!("| ------- | --------------- | --------------- |");

    let mut csv = String::from(BenchmarkResult::CSV_HEADER);
    for threads in args.threads.clone() {
        match run_benchmark_with_child_process(benchmark.name, &args.options(threads)) {
            Ok(result) => {
                println!(
                    "|      {threads:>2} | {:>12.5} ms | {:>12.5} ms |",
                    result.average_time.as_secs_f64() * 1000.0,
                    result.min_time.as_secs_f64() * 1000.0
                );
                csv.push_str(&result.csv_row(benchmark.name, threads));
            }
            Err(e) => {
                eprintln!(
                    "Failed to run benchmark '{}' with {threads} threads: {e}",
                    benchmark.name
                );
            }
        }
    }

    if let Some(output_dir) = &args.output {
        write_csv(output_dir, &csv_file_name(benchmark.name), &csv);
    }
}

/// Runs a benchmark in a child process and returns the result.
///
/// The global thread pools can only be initialized once per process,
/// so every thread count gets a fresh process.
fn run_benchmark_with_child_process(
    name: &str,
    options: &BenchmarkOptions,
) -> Result<BenchmarkResult, String> {
    let exe = std::env::current_exe()
        .map_err(|e| format!("Failed to get current executable path: {e}"))?;
    let output = Command::new(exe)
        .arg("--name")
        .arg(name)
        .arg("--threads")
        .arg(options.threads.to_string())
        .arg("--steps")
        .arg(options.steps.to_string())
        .arg("--repeat")
        .arg(options.repeat.to_string())
        .output()
        .map_err(|e| format!("Failed to run child process: {e}"))?;

    if !output.status.success() {
        return Err(format!("Benchmark failed with status: {}", output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    let [.., islands_line, avg_line, min_line] = lines.as_slice() else {
        return Err("Unexpected output format: not enough lines".to_string());
    };

    let last_value = |line: &str, what: &str| {
        line.split_whitespace()
            .last()
            .ok_or_else(|| format!("Failed to parse {what}"))?
            .parse::<f64>()
            .map_err(|e| format!("Failed to parse {what}: {e}"))
    };

    Ok(BenchmarkResult {
        average_awake_islands: last_value(islands_line, "awake islands")?,
        average_time: Duration::from_secs_f64(last_value(avg_line, "average time")?),
        min_time: Duration::from_secs_f64(last_value(min_line, "minimum time")?),
    })
}

fn run_benchmark(builder: impl Fn() -> App, options: &BenchmarkOptions) -> BenchmarkResult {
    // Limit Bevy's compute task pool and rayon's global thread pool, which the scenarios
    // use to solve islands in parallel.
    ComputeTaskPool::get_or_init(|| {
        TaskPoolBuilder::new()
            .num_threads(options.threads as usize)
            .build()
    });
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads as usize)
        .build_global()
    {
        eprintln!("Failed to build global thread pool: {err}");
    }

    assert!(
        options.steps > 0,
        "The number of steps must be greater than 0"
    );
    assert!(
        options.repeat > 0,
        "The number of repetitions must be greater than 0"
    );

    let mut average_time = Duration::ZERO;
    let mut average_min_time = Duration::ZERO;
    let mut awake_islands = 0;

    for _ in 0..options.repeat {
        let mut app = builder();

        while app.plugins_state() != PluginsState::Ready {
            bevy::tasks::tick_global_task_pools_on_main_thread();
        }

        app.finish();
        app.cleanup();

        // Build the initial islands before starting measurements.
        app.update();

        let mut average_step_time = Duration::ZERO;
        let mut min_step_time = Duration::MAX;

        for _ in 0..options.steps {
            let start = std::time::Instant::now();
            app.update();
            let step_time = start.elapsed();

            average_step_time += step_time;
            min_step_time = min_step_time.min(step_time);
            awake_islands += app
                .world()
                .get_resource::<IslandDiagnostics>()
                .map_or(0, |diagnostics| u64::from(diagnostics.awake_island_count));
        }

        average_step_time /= options.steps;
        average_time += average_step_time;
        average_min_time += min_step_time;
    }

    average_time /= options.repeat;
    average_min_time /= options.repeat;

    BenchmarkResult {
        average_time,
        min_time: average_min_time,
        average_awake_islands: awake_islands as f64 / f64::from(options.steps * options.repeat),
    }
}
