/// Four epsilon-greedy learners against one bidder that always bids the 0.9 cap.
///
/// The fixed bidder bids the highest amount any learner can reach, so it should win most rounds.
/// Statistics have to reconcile with the balances the auction kept.

use rand::{rngs::StdRng, SeedableRng};
use crate::auction::Auction;
use crate::bidder_strategies::MAX_BID;
use crate::bidders::{Bidders, BidderType};
use crate::users::Users;
use crate::scenarios::{run_simulation, Validation};
use crate::logger::{Logger, LogEvent};
use crate::utils::get_seed;
use crate::logln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "learning_vs_fixed",
    run,
});

const NUM_USERS: usize = 10;
const NUM_ROUNDS: usize = 5000;

fn prepare_auction() -> Result<(Auction, usize), Box<dyn std::error::Error>> {
    let mut users_rng = StdRng::seed_from_u64(get_seed(1991));
    let users = Users::generate(NUM_USERS, &mut users_rng);

    let mut bidders = Bidders::new();
    for i in 0..4 {
        bidders.add(
            format!("Learner {}", i),
            BidderType::EPSILON_GREEDY { num_users: NUM_USERS, num_rounds: NUM_ROUNDS },
        );
    }
    let fixed_id = bidders.add("Fixed".to_string(), BidderType::FIXED { fixed_bid: MAX_BID });

    let auction = Auction::new(users, bidders, StdRng::seed_from_u64(get_seed(2992)))?;
    Ok((auction, fixed_id))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let (auction, fixed_id) = prepare_auction()?;
    let (_simulation_run, stats) = run_simulation("Learners vs fixed 0.9 bidder", scenario_name, "mixed", auction, NUM_ROUNDS, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    let fixed_wins = stats.bidder_stats[fixed_id].rounds_won;
    let best_learner_wins = stats.bidder_stats.iter()
        .enumerate()
        .filter(|(bidder_index, _)| *bidder_index != fixed_id)
        .map(|(_, stat)| stat.rounds_won)
        .max()
        .unwrap_or(0);
    validation.check(
        fixed_wins > best_learner_wins,
        format!("Fixed bidder wins the most rounds: {} > {}", fixed_wins, best_learner_wins),
        logger,
    );

    let worst_mismatch = stats.bidder_stats.iter()
        .map(|stat| (stat.final_balance - (stat.clicks as f64 - stat.total_paid)).abs())
        .fold(0.0f64, f64::max);
    validation.check(
        worst_mismatch < 1e-6,
        format!("Balances reconcile with clicks minus payments (largest mismatch {:.2e})", worst_mismatch),
        logger,
    );

    validation.finish(scenario_name)
}
