use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lightning_index_advisor::datagen::{self, GeneratorConfig};
use lightning_index_advisor::logging::{init_logging, level_for};
use lightning_index_advisor::settings::time_limit_from_secs;
use lightning_index_advisor::{
    Error, LexicographicOptimizer, Problem, Report, Result, Settings, SettingsInput, SolverConfig,
    WorkloadInput,
};
use std::path::PathBuf;

/// Lightning index advisor CLI
///
/// Recommends which indexes to keep or create for a scan workload by
/// optimizing an ordered list of goals one after another.
fn main() {
    let matches = create_cli().get_matches();

    if let Err(e) = run_command(matches) {
        eprintln!("Error: {}", e);
        std::process::exit(e.error_code());
    }
}

fn create_cli() -> Command {
    Command::new("index-advisor")
        .about("Lexicographic multi-goal index selection")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("solve")
                .about("Recommend an index selection for a workload")
                .arg(Arg::new("data")
                    .help("Workload JSON file")
                    .long("data")
                    .short('d')
                    .required(true)
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("settings")
                    .help("Settings JSON file")
                    .long("settings")
                    .short('s')
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("time-limit")
                    .help("Per-goal time limit in seconds (overrides the settings file)")
                    .long("time-limit")
                    .value_parser(value_parser!(f64)))
                .arg(Arg::new("no-warm-start")
                    .help("Do not seed each goal with the previous goal's selection")
                    .long("no-warm-start")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("format")
                    .help("Output format")
                    .long("format")
                    .value_parser(["json", "text"])
                    .default_value("json"))
                .arg(Arg::new("verbose")
                    .help("Print the problem and the solving steps")
                    .long("verbose")
                    .short('v')
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("json-logs")
                    .help("Emit logs as JSON")
                    .long("json-logs")
                    .action(ArgAction::SetTrue))
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a random workload")
                .arg(Arg::new("output")
                    .help("Output file")
                    .required(true)
                    .index(1)
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("seed")
                    .help("Random seed (random when omitted)")
                    .long("seed")
                    .value_parser(value_parser!(u64)))
        )
}

fn run_command(matches: ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("solve", sub_matches)) => cmd_solve(sub_matches),
        Some(("generate", sub_matches)) => cmd_generate(sub_matches),
        _ => unreachable!(),
    }
}

fn cmd_solve(matches: &ArgMatches) -> Result<()> {
    let verbose = matches.get_flag("verbose");
    init_logging(level_for(verbose), matches.get_flag("json-logs"));

    let data_path = matches
        .get_one::<PathBuf>("data")
        .ok_or_else(|| Error::validation("--data is required"))?;
    let workload = WorkloadInput::from_path(data_path)?;
    let problem = Problem::from_input(&workload)?;

    let settings = match matches.get_one::<PathBuf>("settings") {
        Some(path) => Settings::from_input(&SettingsInput::from_path(path)?, &problem)?,
        None => Settings::defaults(&problem),
    };

    let time_limit = match matches.get_one::<f64>("time-limit") {
        Some(&seconds) => time_limit_from_secs(seconds)?,
        None => None,
    };
    let config = SolverConfig {
        time_limit,
        warm_start: !matches.get_flag("no-warm-start"),
        ..Default::default()
    };

    if verbose {
        eprintln!("{}", problem);
        eprintln!("{}", settings);
    }

    let solutions = LexicographicOptimizer::new(config).optimize(&problem, &settings)?;
    let report = Report::build(&problem, &solutions);

    match matches.get_one::<String>("format").map(String::as_str) {
        Some("text") => print!("{}", report.render_text()),
        _ => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn cmd_generate(matches: &ArgMatches) -> Result<()> {
    let output = matches
        .get_one::<PathBuf>("output")
        .ok_or_else(|| Error::validation("an output path is required"))?;
    let seed = matches.get_one::<u64>("seed").copied();

    let workload = datagen::generate(&GeneratorConfig::default(), seed)?;
    std::fs::write(output, serde_json::to_string_pretty(&workload)?)?;

    println!(
        "Generated {} scans, {} existing and {} possible indexes into {}",
        workload.scans.len(),
        workload.existing_indexes.len(),
        workload.possible_indexes.len(),
        output.display()
    );
    Ok(())
}
