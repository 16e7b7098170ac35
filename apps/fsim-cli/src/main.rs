use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fsim_core::timing::{Timer, format_hms};
use fsim_project::{
    CompiledProject, ProjectResult, SequenceDef, compile, load_project, load_seeds, save_seeds,
    save_yaml,
};
use fsim_sim::{
    Executor, LogSeverity, RunOutcome, RunProgress, SharedLog, SimulationRunner, Simulator,
    SimulatorStatus,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "fsim-cli")]
#[command(about = "flowsim CLI - dynamic flowsheet simulation with recycle convergence", long_about = None)]
struct Cli {
    /// Also emit the run log through tracing
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Show the calculation sequence of a project
    Sequence {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Write the determined sequence back into the project file
        #[arg(long)]
        save: bool,
    },
    /// Run a simulation
    Run {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Tear-stream seed file (defaults to <project>.seeds.json)
        #[arg(long)]
        seeds: Option<PathBuf>,
        /// Override the end of the simulation horizon in seconds
        #[arg(long)]
        end_time: Option<f64>,
        /// Worker threads for convergence kernels
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Stop the run after this many seconds of wall time
        #[arg(long)]
        timeout_s: Option<f64>,
    },
}

fn main() -> ProjectResult<()> {
    let cli = Cli::parse();

    // The run log is printed directly; tracing only adds it back on request.
    let level = if cli.verbose { Level::INFO } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Sequence { project_path, save } => cmd_sequence(&project_path, save),
        Commands::Run {
            project_path,
            seeds,
            end_time,
            threads,
            timeout_s,
        } => {
            let seeds = seeds.unwrap_or_else(|| project_path.with_extension("seeds.json"));
            cmd_run(&project_path, &seeds, end_time, threads, timeout_s)
        }
    }
}

fn cmd_validate(project_path: &Path) -> ProjectResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = load_project(project_path)?;
    let mut compiled = compile(&project)?;
    compiled.flowsheet.initialize()?;
    println!("✓ Project is valid");
    println!(
        "  Units: {}  Streams: {}  Partitions: {}",
        compiled.units.len(),
        compiled.streams.len(),
        compiled.flowsheet.sequence().partitions_count()
    );
    Ok(())
}

fn cmd_sequence(project_path: &Path, save: bool) -> ProjectResult<()> {
    let mut project = load_project(project_path)?;
    let mut compiled = compile(&project)?;
    compiled.flowsheet.initialize()?;

    let sequence = compiled.sequence_def();
    print_sequence(&compiled, &sequence);

    if save {
        project.sequence = Some(sequence);
        save_yaml(project_path, &project)?;
        println!("✓ Sequence written to {}", project_path.display());
    }
    Ok(())
}

fn print_sequence(compiled: &CompiledProject, sequence: &SequenceDef) {
    println!("Calculation sequence:");
    for (i, partition) in sequence.partitions.iter().enumerate() {
        let names: Vec<&str> = partition
            .units
            .iter()
            .filter_map(|id| compiled.units.get(id))
            .filter_map(|uid| compiled.flowsheet.unit(*uid))
            .map(|u| u.name())
            .collect();
        print!("  {}: {}", i, names.join(" -> "));
        if !partition.tears.is_empty() {
            print!("  [tears: {}]", partition.tears.join(", "));
        }
        println!();
    }
}

fn cmd_run(
    project_path: &Path,
    seeds_path: &Path,
    end_time: Option<f64>,
    threads: usize,
    timeout_s: Option<f64>,
) -> ProjectResult<()> {
    let project = load_project(project_path)?;
    let mut compiled = compile(&project)?;
    let mut options = compiled.options.clone();
    if let Some(t) = end_time {
        options.end_time = t;
    }

    if options.auto_init_tear_streams && seeds_path.exists() {
        load_seeds(seeds_path, &mut compiled.flowsheet)?;
        println!("Loaded tear-stream seeds from {}", seeds_path.display());
    }

    println!(
        "Running {} over [{:.3}, {:.3}] s",
        project.name, options.start_time, options.end_time
    );

    let executor = if threads > 1 {
        Executor::with_threads(threads)?
    } else {
        Executor::sequential()
    };
    let auto_init = options.auto_init_tear_streams;
    let simulator = Simulator::new(options).with_executor(executor);

    let CompiledProject {
        flowsheet,
        units,
        streams,
        ..
    } = compiled;
    let mut handle = SimulationRunner::start(simulator, flowsheet)?;
    let log = handle.log();
    let timer = Timer::start("run");

    while !handle.wait_for(Duration::from_millis(100)) {
        drain_log(&log);
        render_progress(&handle.progress());
        if timeout_s.is_some_and(|limit| timer.elapsed_s() > limit)
            && handle.status() == SimulatorStatus::Running
        {
            handle.stop();
        }
    }
    clear_progress_line();
    drain_log(&log);

    let finished = handle.wait()?;
    let summary = finished.result?;
    let compiled = CompiledProject {
        flowsheet: finished.flowsheet,
        options: finished.simulator.options().clone(),
        units,
        streams,
    };

    match summary.outcome {
        RunOutcome::Completed => println!("✓ Simulation completed"),
        RunOutcome::Stopped => println!("■ Simulation stopped"),
    }
    println!("  Wall time:  {}", format_hms(timer.elapsed()));
    println!("  Partitions: {}", summary.partitions);
    println!("  Windows:    {}", summary.windows);
    println!("  Iterations: {}", summary.iterations);
    print_streams(&compiled);

    if auto_init {
        save_seeds(seeds_path, &compiled.flowsheet)?;
        println!("✓ Seeds written to {}", seeds_path.display());
    }
    Ok(())
}

fn drain_log(log: &SharedLog) {
    let mut log = log.lock();
    while !log.end_of_log() {
        let severity = log.read_severity();
        let Some(line) = log.read() else {
            break;
        };
        clear_progress_line();
        match severity {
            LogSeverity::Info => println!("{line}"),
            LogSeverity::Warning | LogSeverity::Error => eprintln!("{line}"),
        }
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_progress(progress: &RunProgress) {
    let Some(partition) = progress.partition else {
        return;
    };
    print!(
        "\r  partition {}/{}  window #{} [{:.3}, {:.3}]  iteration #{}",
        partition + 1,
        progress.partitions,
        progress.window,
        progress.window_start,
        progress.window_end,
        progress.iteration
    );
    let _ = io::stdout().flush();
}

fn print_streams(compiled: &CompiledProject) {
    println!("\nStreams at the last time point:");
    for (id, sid) in &compiled.streams {
        let Some(stream) = compiled.flowsheet.stream(*sid) else {
            continue;
        };
        match stream.last_time_point() {
            Some(t) => {
                let point = stream.sample(t);
                println!(
                    "  {:<12} t={:>9.3} s  m={:>10.4} kg/s  T={:>8.2} K  P={:>10.1} Pa  ({} points)",
                    id,
                    t,
                    point.mass_flow,
                    point.temperature,
                    point.pressure,
                    stream.len()
                );
            }
            None => println!("  {:<12} (no data)", id),
        }
    }
}
