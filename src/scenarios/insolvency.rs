/// Three reckless bidders bid 50.0 on every impression while a click is worth 1.0.
///
/// Each win costs about 50, so bidders are driven below the disqualification threshold
/// until only one is left. A lone bidder has nobody to set its price, so from then on
/// every round is voided.

use rand::{rngs::StdRng, SeedableRng};
use crate::auction::{Auction, DISQUALIFICATION_THRESHOLD};
use crate::bidders::{Bidders, BidderType};
use crate::users::Users;
use crate::scenarios::{run_simulation, Validation};
use crate::logger::{Logger, LogEvent};
use crate::utils::get_seed;
use crate::logln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "insolvency",
    run,
});

const NUM_USERS: usize = 10;
const NUM_BIDDERS: usize = 3;
const NUM_ROUNDS: usize = 200;

fn prepare_auction() -> Result<Auction, Box<dyn std::error::Error>> {
    let mut users_rng = StdRng::seed_from_u64(get_seed(1991));
    let users = Users::generate(NUM_USERS, &mut users_rng);

    let mut bidders = Bidders::new();
    for i in 0..NUM_BIDDERS {
        bidders.add(format!("Reckless {}", i), BidderType::FIXED { fixed_bid: 50.0 });
    }

    Ok(Auction::new(users, bidders, StdRng::seed_from_u64(get_seed(2992)))?)
}

/// True if the balance never changes again once it fell below the threshold
fn frozen_after_disqualification(history: &[f64]) -> bool {
    match history.iter().position(|&balance| balance < DISQUALIFICATION_THRESHOLD) {
        Some(first) => history[first..].iter().all(|&balance| balance == history[first]),
        None => true,
    }
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let auction = prepare_auction()?;
    let (simulation_run, stats) = run_simulation("Reckless bidders", scenario_name, "reckless", auction, NUM_ROUNDS, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    validation.check(
        stats.disqualified_count() == NUM_BIDDERS - 1,
        format!("All but one bidder got disqualified: {} of {}", stats.disqualified_count(), NUM_BIDDERS),
        logger,
    );

    let all_frozen = simulation_run.auction.balance_history().iter().all(|history| frozen_after_disqualification(history));
    validation.check(
        all_frozen,
        "Balances of disqualified bidders never change again".to_string(),
        logger,
    );

    let last_outcome_voided = matches!(
        simulation_run.outcomes.last(),
        Some(crate::auction::RoundOutcome::Voided(crate::auction::VoidReason::NO_SECOND_PRICE))
    );
    validation.check(
        last_outcome_voided && stats.overall_stat.no_second_price_count > 0,
        format!("Lone bidder rounds are voided for lack of a second price: {} voided", stats.overall_stat.no_second_price_count),
        logger,
    );

    validation.finish(scenario_name)
}
