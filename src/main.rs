mod utils;
mod users;
mod bidder;
mod bidder_strategies;
mod bidders;
mod auction;
mod simulationrun;
mod scenarios;
mod logger;
mod charts;

use logger::{Logger, LogEvent, LogReceiver, ConsoleReceiver, FileReceiver, sanitize_filename};
use std::path::PathBuf;

use scenarios::get_scenario_catalog;
use utils::{RAND_SEED, TOTAL_SIMULATION_RUNS};
use std::sync::atomic::Ordering;

/// Open a file receiver or exit, the run is pointless without its log
fn file_receiver_or_exit(path: &str, events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
    match FileReceiver::new(&PathBuf::from(path), events) {
        Ok(receiver) => receiver,
        Err(e) => {
            eprintln!("Error: Cannot open log file '{}': {}", path, e);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [<scenario>|all] [iterations] [start_iteration] [--verbose auction] [--fastbreak] [--charts]", program);
    eprintln!("Available scenarios:");
    for s in &get_scenario_catalog() {
        eprintln!("  - {}", s.short_name);
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out flags
    let mut args = Vec::new();
    let mut skip_next = false;
    let mut fastbreak = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "--verbose" => {
                if i + 1 < raw_args.len() && raw_args[i + 1] == "auction" {
                    utils::VERBOSE_AUCTION.store(true, Ordering::Relaxed);
                    skip_next = true;
                }
            }
            "--fastbreak" => fastbreak = true,
            "--charts" => utils::CHARTS_ENABLED.store(true, Ordering::Relaxed),
            "--help" | "-h" => {
                print_usage(&raw_args[0]);
                return;
            }
            _ => args.push(arg.clone()),
        }
    }

    if args.len() <= 1 {
        // Default behavior: run the baseline scenario with everything but per-round output on the console
        let mut logger = Logger::new();
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Simulation, LogEvent::Scenario]));
        if let Err(e) = scenarios::epsilon_greedy::run("epsilon_greedy", &mut logger) {
            eprintln!("Error running scenario: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let scenario_arg = &args[1];

    // Parse iterations parameter if present
    let iterations = match args.get(2).map(|s| s.parse::<u64>()) {
        None => 1,
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("Error: Invalid iterations parameter '{}'. Expected a number.", args[2]);
            std::process::exit(1);
        }
    };

    // Parse optional starting iteration index if present
    let start_iteration = match args.get(3).map(|s| s.parse::<u64>()) {
        None => 0,
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("Error: Invalid start iteration parameter '{}'. Expected a number.", args[3]);
            std::process::exit(1);
        }
    };

    let all_scenarios = get_scenario_catalog();

    // Filter scenarios: if "all", use all scenarios; otherwise filter to the named scenario
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                print_usage(&raw_args[0]);
                std::process::exit(1);
            }
        }
    };

    // Validation summary always goes to the console, individual checks only for a single scenario run once
    let mut logger = Logger::new();
    if scenario_arg != "all" && iterations == 1 {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    }
    let summary_receiver_id = logger.add_receiver(file_receiver_or_exit("log/summary.log", vec![LogEvent::Validation]));

    TOTAL_SIMULATION_RUNS.store(0, Ordering::Relaxed);

    let target = if scenario_arg == "all" {
        "all scenarios".to_string()
    } else {
        format!("scenario '{}'", scenario_arg)
    };
    if iterations > 1 {
        logln!(&mut logger, LogEvent::Validation, "Running {} {} times...\n", target, iterations);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running {}...\n", target);
    }

    'scenarios: for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        let scenario_receiver_id = logger.add_receiver(file_receiver_or_exit(
            &format!("log/{}/scenario.log", sanitize_filename(scenario.short_name)),
            vec![LogEvent::Scenario],
        ));

        for i in start_iteration..(start_iteration + iterations) {
            if iterations > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", i - start_iteration + 1, iterations);
            }

            // Every iteration replays with its own seed
            RAND_SEED.store(i, Ordering::Relaxed);

            match (scenario.run)(scenario.short_name, &mut logger) {
                Ok(()) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }

                    if fastbreak {
                        logger.remove_receiver(scenario_receiver_id);
                        logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                        logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed {}): {}", i - start_iteration + 1, iterations, i, e);
                        break 'scenarios;
                    }
                }
            }

            let _ = logger.flush();
        }

        logger.remove_receiver(scenario_receiver_id);
    }

    logln!(&mut logger, LogEvent::Validation, "\nTotal simulation runs completed: {}", TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed));
    logger.remove_receiver(summary_receiver_id);
}
