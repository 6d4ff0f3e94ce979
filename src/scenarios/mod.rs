use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use crate::auction::Auction;
use crate::charts;
use crate::logger::{Logger, LogEvent, FileReceiver, sanitize_filename};
use crate::simulationrun::{SimulationRun, SimulationStat};
use crate::utils::CHARTS_ENABLED;
use crate::{logln, errln};

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

// Create an inventory collection for scenario entries
inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut catalog: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>
        .into_iter()
        .cloned()
        .collect();
    catalog.sort_by_key(|entry| entry.short_name);
    catalog
}

// Scenario modules
pub mod epsilon_greedy;
pub mod learning_vs_fixed;
pub mod insolvency;

/// Run one simulation of a scenario and print its statistics
///
/// Rounds and statistics also go to log/<scenario>/rounds-<variant>.log,
/// and a balance chart is written to charts/ when charts are enabled
pub fn run_simulation(
    description: &str,
    scenario_name: &str,
    variant_name: &str,
    auction: Auction,
    num_rounds: usize,
    logger: &mut Logger,
) -> Result<(SimulationRun, SimulationStat), Box<dyn Error>> {
    let rounds_receiver_id = logger.add_receiver(FileReceiver::new(
        &PathBuf::from(format!("log/{}/rounds-{}.log", sanitize_filename(scenario_name), sanitize_filename(variant_name))),
        vec![LogEvent::Round, LogEvent::Simulation],
    )?);

    logln!(logger, LogEvent::Simulation, "\n=== {} ===", description);
    let simulation_run = SimulationRun::new(auction, num_rounds, logger);
    let stats = SimulationStat::new(&simulation_run);
    stats.printout(logger);

    logger.remove_receiver(rounds_receiver_id);

    if CHARTS_ENABLED.load(Ordering::Relaxed) {
        let path = PathBuf::from(format!("charts/{}_{}_balances.png", sanitize_filename(scenario_name), sanitize_filename(variant_name)));
        let bidder_names: Vec<String> = stats.bidder_stats.iter().map(|stat| stat.bidder_name.clone()).collect();
        charts::generate_balance_chart(simulation_run.auction.balance_history(), &bidder_names, description, &path)?;
        logln!(logger, LogEvent::Simulation, "Balance chart saved to {}", path.display());
    }

    Ok((simulation_run, stats))
}

/// Collects the outcome of scenario checks, logging each one as it is made
pub struct Validation {
    errors: Vec<String>,
}

impl Validation {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn check(&mut self, passed: bool, message: String, logger: &mut Logger) {
        if passed {
            logln!(logger, LogEvent::Scenario, "✓ {}", message);
        } else {
            errln!(logger, LogEvent::Scenario, "✗ {}", message);
            self.errors.push(message);
        }
    }

    pub fn finish(self, scenario_name: &str) -> Result<(), Box<dyn Error>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, self.errors.join("\n")).into())
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
