/// This file contains the SimulationRun struct, which runs a fixed number of auction rounds,
/// and SimulationStat, which condenses the recorded outcomes into per-bidder and overall statistics.

use crate::auction::{Auction, RoundOutcome, VoidReason, DISQUALIFICATION_THRESHOLD};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::utils::TOTAL_SIMULATION_RUNS;
use std::sync::atomic::Ordering;

/// Container for round outcomes
/// Note: outcomes[i] is the outcome of round i + 1
pub struct SimulationRun {
    pub auction: Auction,
    pub outcomes: Vec<RoundOutcome>,
}

impl SimulationRun {
    /// Run `num_rounds` rounds of the auction and keep every outcome
    pub fn new(mut auction: Auction, num_rounds: usize, logger: &mut Logger) -> Self {
        logln!(logger, LogEvent::Simulation, "Running {} rounds with {} users and {} bidders",
            num_rounds, auction.num_users(), auction.bidders().len());

        let mut outcomes = Vec::with_capacity(num_rounds);
        for _ in 0..num_rounds {
            outcomes.push(auction.execute_round(logger));
        }

        TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);
        Self { auction, outcomes }
    }
}

/// Statistics for a single bidder
pub struct BidderStat {
    pub bidder_name: String,
    pub bidder_description: String,
    pub rounds_won: usize,
    pub clicks: usize,
    pub total_paid: f64,
    pub final_balance: f64,
    /// Round after which the bidder fell below the disqualification threshold
    pub disqualified_at_round: Option<usize>,
}

/// Overall statistics for the simulation
pub struct OverallStat {
    pub completed_rounds: usize,
    pub no_qualified_bidders_count: usize,
    pub no_bids_count: usize,
    pub no_second_price_count: usize,
    pub total_clicks: usize,
    pub total_paid: f64,
}

/// Complete simulation statistics
pub struct SimulationStat {
    pub bidder_stats: Vec<BidderStat>,
    pub overall_stat: OverallStat,
}

impl SimulationStat {
    /// Generate statistics from a finished simulation run
    pub fn new(simulation_run: &SimulationRun) -> Self {
        let auction = &simulation_run.auction;
        let mut bidder_stats: Vec<BidderStat> = auction.bidders().bidders.iter()
            .enumerate()
            .map(|(bidder_index, bidder)| BidderStat {
                bidder_name: bidder.bidder_name().to_string(),
                bidder_description: bidder.type_and_state_string(),
                rounds_won: 0,
                clicks: 0,
                total_paid: 0.0,
                final_balance: auction.balances()[bidder_index],
                disqualified_at_round: None,
            })
            .collect();

        let mut overall_stat = OverallStat {
            completed_rounds: 0,
            no_qualified_bidders_count: 0,
            no_bids_count: 0,
            no_second_price_count: 0,
            total_clicks: 0,
            total_paid: 0.0,
        };

        for (index, outcome) in simulation_run.outcomes.iter().enumerate() {
            match outcome {
                RoundOutcome::Completed(summary) => {
                    overall_stat.completed_rounds += 1;
                    overall_stat.total_paid += summary.price;

                    let bidder_stat = &mut bidder_stats[summary.winner_index];
                    bidder_stat.rounds_won += 1;
                    bidder_stat.total_paid += summary.price;
                    if summary.clicked {
                        bidder_stat.clicks += 1;
                        overall_stat.total_clicks += 1;
                    }
                    if bidder_stat.disqualified_at_round.is_none() && summary.winner_balance < DISQUALIFICATION_THRESHOLD {
                        bidder_stat.disqualified_at_round = Some(index + 1);
                    }
                }
                RoundOutcome::Voided(VoidReason::NO_QUALIFIED_BIDDERS) => overall_stat.no_qualified_bidders_count += 1,
                RoundOutcome::Voided(VoidReason::NO_BIDS) => overall_stat.no_bids_count += 1,
                RoundOutcome::Voided(VoidReason::NO_SECOND_PRICE) => overall_stat.no_second_price_count += 1,
            }
        }

        Self { bidder_stats, overall_stat }
    }

    /// Number of bidders that were disqualified at some point
    pub fn disqualified_count(&self) -> usize {
        self.bidder_stats.iter().filter(|stat| stat.disqualified_at_round.is_some()).count()
    }

    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Simulation, "\n=== Bidder Statistics ===");
        for (bidder_index, stat) in self.bidder_stats.iter().enumerate() {
            let disqualified = match stat.disqualified_at_round {
                Some(round) => format!(", disqualified after round {}", round),
                None => String::new(),
            };
            logln!(logger, LogEvent::Simulation,
                "Bidder #{} {}: won {}, clicks {}, paid {:.2}, balance {:.2}{} [{}]",
                bidder_index,
                stat.bidder_name,
                stat.rounds_won,
                stat.clicks,
                stat.total_paid,
                stat.final_balance,
                disqualified,
                stat.bidder_description);
        }

        let overall = &self.overall_stat;
        logln!(logger, LogEvent::Simulation, "\n=== Overall Statistics ===");
        logln!(logger, LogEvent::Simulation, "Completed rounds: {}", overall.completed_rounds);
        logln!(logger, LogEvent::Simulation, "Voided rounds: {} no qualified bidders, {} no bids, {} no second price",
            overall.no_qualified_bidders_count, overall.no_bids_count, overall.no_second_price_count);
        logln!(logger, LogEvent::Simulation, "Total clicks: {}", overall.total_clicks);
        logln!(logger, LogEvent::Simulation, "Total paid: {:.2}", overall.total_paid);
    }
}
