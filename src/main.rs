/*!
 * bagrouter CLI - Command Line Interface
 *
 * Each invocation restores the router from its snapshot (when a state file
 * is configured), applies the requested command and exits, so consecutive
 * invocations share queues and duplicate memory.
 */

use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;

use bagrouter::{
    batch::BatchCommand,
    config::{LogLevel, RouterConfig},
    error::{Committed, Result, RouterError, EXIT_PARTIAL, EXIT_SUCCESS},
    logging, BagId, Lane, Router, RoutingOutcome,
};

#[derive(Parser)]
#[command(name = "bagrouter")]
#[command(version, about = "Route scanned bags to gate queues with priority lanes, dedup and overflow buffering", long_about = None)]
struct Cli {
    /// Load configuration from a TOML file
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Snapshot file (omit for memory-only state)
    #[arg(long, value_name = "FILE", global = true)]
    state_file: Option<PathBuf>,

    /// Allowed gate; repeat for several (replaces the config allow-set)
    #[arg(long = "allow-gate", value_name = "GATE", global = true)]
    allow_gate: Vec<String>,

    /// Maximum combined bags per gate before buffering
    #[arg(long, value_name = "N", global = true)]
    max_queue_length: Option<usize>,

    /// Append scan records to this JSON Lines file
    #[arg(long, value_name = "FILE", global = true)]
    scan_log: Option<PathBuf>,

    /// Scanner location stamped on scan records
    #[arg(long, value_name = "NAME", global = true)]
    location: Option<String>,

    /// Start from empty state if the snapshot is unreadable
    #[arg(long, global = true)]
    recover_empty: bool,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Write JSON logs to this file
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a bag and route it
    Scan {
        /// Bag identifier
        bag_id: String,

        /// Destination gate tag (omit if the tag is missing)
        #[arg(short = 'g', long)]
        gate: Option<String>,

        /// Route to the priority lane
        #[arg(short = 'p', long)]
        priority: bool,
    },

    /// Dequeue the next bag for a gate
    Next { gate: String },

    /// Count bags waiting at a gate
    Count { gate: String },

    /// List bags waiting at a gate in delivery order
    View { gate: String },

    /// List bags held for manual inspection
    Manual,

    /// List bags held in the overflow buffer
    Buffer,

    /// Show every known gate with lane depths
    Gates,

    /// Show queue sizes; inside `run` also this process's counters
    Stats,

    /// Execute batch commands from a file or stdin (one command per line)
    Run {
        /// Command file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Run the reference scenario against a memory-only router
    Demo,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    // counters only mean something when several commands share one process
    let out = Output {
        json: cli.json,
        counters: matches!(cli.command, Commands::Run { .. } | Commands::Demo),
    };

    let command = match cli.command {
        Commands::Demo => {
            run_demo(&out)?;
            return Ok(EXIT_SUCCESS);
        }
        Commands::Run { file } => {
            let router = Router::from_config(&config)?;
            return run_batch(&router, file, &out);
        }
        Commands::Scan {
            bag_id,
            gate,
            priority,
        } => BatchCommand::Scan {
            bag_id,
            gate,
            priority,
        },
        Commands::Next { gate } => BatchCommand::Next { gate },
        Commands::Count { gate } => BatchCommand::Count { gate },
        Commands::View { gate } => BatchCommand::View { gate },
        Commands::Manual => BatchCommand::Manual,
        Commands::Buffer => BatchCommand::Buffer,
        Commands::Gates => BatchCommand::Gates,
        Commands::Stats => BatchCommand::Stats,
    };

    let router = Router::from_config(&config)?;
    execute(&router, command, &out)?;
    Ok(EXIT_SUCCESS)
}

/// Merge the optional config file with command-line overrides
fn build_config(cli: &Cli) -> Result<RouterConfig> {
    let mut config = match cli.config {
        Some(ref path) => RouterConfig::from_file(path)?,
        None => RouterConfig::default(),
    };

    if cli.state_file.is_some() {
        config.state_file = cli.state_file.clone();
    }
    if !cli.allow_gate.is_empty() {
        config.allowed_gates = cli.allow_gate.clone();
    }
    if let Some(max) = cli.max_queue_length {
        config.max_queue_length = max;
    }
    if cli.scan_log.is_some() {
        config.scan_log = cli.scan_log.clone();
    }
    if cli.location.is_some() {
        config.scan_location = cli.location.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.recover_empty_on_corrupt |= cli.recover_empty;
    config.verbose |= cli.verbose;

    config.validate()?;
    Ok(config)
}

fn execute(router: &Router, command: BatchCommand, out: &Output) -> Result<()> {
    match command {
        BatchCommand::Scan {
            bag_id,
            gate,
            priority,
        } => match router.scan(&bag_id, gate.as_deref(), priority) {
            Ok(outcome) => out.outcome(&bag_id, gate.as_deref(), &outcome),
            Err(e) => {
                if let Some(Committed::Scan(outcome)) = e.committed() {
                    out.outcome(&bag_id, gate.as_deref(), outcome);
                }
                return Err(e);
            }
        },
        BatchCommand::Next { gate } => match router.next_bag(&gate) {
            Ok(bag) => out.next_bag(&gate, bag.as_ref()),
            Err(e) => {
                if let Some(Committed::Dequeue(bag)) = e.committed() {
                    out.next_bag(&gate, bag.as_ref());
                }
                return Err(e);
            }
        },
        BatchCommand::Count { gate } => out.count(&gate, router.count_bags(&gate)),
        BatchCommand::View { gate } => out.bags(&format!("Gate {}", gate), &router.view_bags(&gate)),
        BatchCommand::Manual => out.bags("Manual inspection", &router.view_manual_inspection()),
        BatchCommand::Buffer => out.buffer(router),
        BatchCommand::Gates => out.gates(router),
        BatchCommand::Stats => out.stats(router)?,
    }
    Ok(())
}

fn run_batch(router: &Router, file: Option<PathBuf>, out: &Output) -> Result<i32> {
    let lines: Vec<String> = match file {
        Some(path) => {
            let file = std::fs::File::open(&path).map_err(|e| {
                RouterError::Other(format!(
                    "failed to open command file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            std::io::BufReader::new(file)
                .lines()
                .collect::<std::io::Result<_>>()
                .map_err(|e| RouterError::Other(format!("failed to read command file: {}", e)))?
        }
        None => std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<_>>()
            .map_err(|e| RouterError::Other(format!("failed to read stdin: {}", e)))?,
    };

    let mut invalid = 0usize;
    for (number, line) in lines.iter().enumerate() {
        match BatchCommand::parse(line) {
            Ok(Some(command)) => execute(router, command, out)?,
            Ok(None) => {}
            Err(e) => {
                eprintln!("WARN: line {}: {}: {}", number + 1, line.trim(), e);
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        eprintln!("{} invalid line(s) skipped", invalid);
        Ok(EXIT_PARTIAL)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

fn run_demo(out: &Output) -> Result<()> {
    let router = Router::from_config(&RouterConfig::in_memory(["G1", "G2", "G3"], 2))?;

    let scans = [
        ("BAG1", "G1", false),
        ("BAG2", "G1", true),
        ("BAG3", "G1", false),
        ("BAG1", "G1", false),
    ];
    for (bag, gate, priority) in scans {
        execute(
            &router,
            BatchCommand::Scan {
                bag_id: bag.to_string(),
                gate: Some(gate.to_string()),
                priority,
            },
            out,
        )?;
    }
    execute(&router, BatchCommand::Next { gate: "G1".to_string() }, out)?;
    execute(&router, BatchCommand::Manual, out)?;
    execute(&router, BatchCommand::Buffer, out)?;
    Ok(())
}

/// Text or JSON rendering of command results
struct Output {
    json: bool,
    counters: bool,
}

impl Output {
    fn outcome(&self, bag_id: &str, gate: Option<&str>, outcome: &RoutingOutcome) {
        if self.json {
            println!("{}", json!({ "bag_id": bag_id, "gate": gate, "result": outcome }));
            return;
        }
        let gate = gate.unwrap_or("");
        match outcome {
            RoutingOutcome::Duplicate => println!("[Duplicate] {} already scanned, ignored", bag_id),
            RoutingOutcome::ManualInspection { reason } => {
                println!("[Manual Inspection] {} ({}{})", bag_id, reason, gate_suffix(gate))
            }
            RoutingOutcome::Buffered => {
                println!("[Buffered] gate {} at capacity, {} held in overflow buffer", gate, bag_id)
            }
            RoutingOutcome::Enqueued { lane } => {
                println!("[Enqueued] {} -> gate {} ({})", bag_id, gate, lane)
            }
        }
    }

    fn next_bag(&self, gate: &str, bag: Option<&BagId>) {
        if self.json {
            println!("{}", json!({ "gate": gate, "bag_id": bag }));
        } else {
            match bag {
                Some(bag) => println!("Next for {}: {}", gate, bag),
                None => println!("Next for {}: none", gate),
            }
        }
    }

    fn count(&self, gate: &str, count: usize) {
        if self.json {
            println!("{}", json!({ "gate": gate, "count": count }));
        } else {
            println!("{}: {} bag(s)", gate, count);
        }
    }

    fn bags(&self, title: &str, bags: &[BagId]) {
        if self.json {
            println!("{}", json!(bags));
            return;
        }
        let list: Vec<&str> = bags.iter().map(BagId::as_str).collect();
        println!("{}: [{}]", title, list.join(", "));
    }

    fn buffer(&self, router: &Router) {
        let entries = router.view_buffer();
        if self.json {
            println!("{}", json!(entries));
            return;
        }
        if entries.is_empty() {
            println!("Overflow buffer: empty");
            return;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["#", "Bag", "Gate", "Lane"]);
        for (i, entry) in entries.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                entry.bag_id.to_string(),
                entry.gate.to_string(),
                Lane::for_priority(entry.priority).to_string(),
            ]);
        }
        println!("{table}");
    }

    fn gates(&self, router: &Router) {
        let state = router.state_snapshot();
        let rows: Vec<_> = state
            .gates()
            .into_iter()
            .filter_map(|gate| {
                state.gate_queue(gate.as_str()).map(|queue| {
                    (
                        gate.to_string(),
                        queue.lane(Lane::Priority).len(),
                        queue.lane(Lane::Regular).len(),
                    )
                })
            })
            .collect();

        if self.json {
            let value: Vec<_> = rows
                .iter()
                .map(|(gate, priority, regular)| {
                    json!({ "gate": gate, "priority": priority, "regular": regular })
                })
                .collect();
            println!("{}", json!(value));
            return;
        }
        if rows.is_empty() {
            println!("No gates yet");
            return;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Gate", "Priority", "Regular", "Total"]);
        for (gate, priority, regular) in rows {
            table.add_row(vec![
                gate,
                priority.to_string(),
                regular.to_string(),
                (priority + regular).to_string(),
            ]);
        }
        println!("{table}");
    }

    fn stats(&self, router: &Router) -> Result<()> {
        let stats = router.stats();
        if self.json {
            let text = if self.counters {
                serde_json::to_string_pretty(&stats)
            } else {
                serde_json::to_string_pretty(&stats.sizes())
            }
            .map_err(|e| RouterError::Other(format!("failed to encode stats: {}", e)))?;
            println!("{}", text);
        } else if self.counters {
            stats.print();
        } else {
            stats.print_sizes();
        }
        Ok(())
    }
}

fn gate_suffix(gate: &str) -> String {
    if gate.is_empty() {
        String::new()
    } else {
        format!(": {}", gate)
    }
}
