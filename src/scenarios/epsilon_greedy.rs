/// Baseline scenario: a handful of epsilon-greedy bidders compete for 10 users over 100 rounds.
///
/// Nobody can lose more than 0.9 per round, so over 100 rounds nobody may be disqualified.
/// Every learner bids every round, so its exploration rate has to decay noticeably.

use rand::{rngs::StdRng, SeedableRng};
use crate::auction::Auction;
use crate::bidders::{Bidders, BidderType, BidderEpsilonGreedy};
use crate::users::Users;
use crate::scenarios::{run_simulation, Validation};
use crate::logger::{Logger, LogEvent};
use crate::utils::get_seed;
use crate::logln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "epsilon_greedy",
    run,
});

const NUM_USERS: usize = 10;
const NUM_BIDDERS: usize = 5;
const NUM_ROUNDS: usize = 100;

fn prepare_auction() -> Result<Auction, Box<dyn std::error::Error>> {
    let mut users_rng = StdRng::seed_from_u64(get_seed(1991));
    let users = Users::generate(NUM_USERS, &mut users_rng);

    let mut bidders = Bidders::new();
    for i in 0..NUM_BIDDERS {
        bidders.add(
            format!("Learner {}", i),
            BidderType::EPSILON_GREEDY { num_users: NUM_USERS, num_rounds: NUM_ROUNDS },
        );
    }

    Ok(Auction::new(users, bidders, StdRng::seed_from_u64(get_seed(2992)))?)
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let auction = prepare_auction()?;
    let (simulation_run, stats) = run_simulation("Epsilon-greedy bidders", scenario_name, "baseline", auction, NUM_ROUNDS, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    let completed = stats.overall_stat.completed_rounds;
    let history_lengths_match = simulation_run.auction.balance_history().iter().all(|history| history.len() == completed);
    validation.check(
        history_lengths_match,
        format!("Every balance history has one entry per completed round ({})", completed),
        logger,
    );

    validation.check(
        stats.disqualified_count() == 0,
        format!("No bidder was disqualified: {} disqualified", stats.disqualified_count()),
        logger,
    );

    let max_exploration_rate = simulation_run.auction.bidders().bidders.iter()
        .filter_map(|bidder| bidder.as_any().downcast_ref::<BidderEpsilonGreedy>())
        .map(|bidder| bidder.exploration_rate())
        .fold(0.0f64, f64::max);
    validation.check(
        max_exploration_rate < 1.0,
        format!("Exploration rate of every learner decayed: highest is {:.4}", max_exploration_rate),
        logger,
    );

    validation.finish(scenario_name)
}
