/// One auction round sells a single impression of a randomly picked user in a
/// sealed-bid second-price auction:
///
/// - every qualified bidder (balance not below the disqualification threshold) bids
/// - the highest bid wins, ties are broken uniformly at random
/// - the winner pays the highest of the remaining bids
/// - the ad is shown and the winner earns 1.0 if it is clicked
///
/// Rounds that cannot clear are voided and leave no trace in balances or histories.

use rand::{rngs::StdRng, Rng};
use std::fmt;
use std::sync::atomic::Ordering;
use thiserror::Error;
use crate::bidders::Bidders;
use crate::users::Users;
use crate::logger::{Logger, LogEvent};
use crate::utils::VERBOSE_AUCTION;
use crate::{errln, logln, warnln};

/// Bidders whose balance drops strictly below this stop being invited to bid
pub const DISQUALIFICATION_THRESHOLD: f64 = -1000.0;

/// Reward the winner earns when the user clicks
pub const CLICK_REWARD: f64 = 1.0;

/// Errors detected when setting up an auction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("auction needs at least one user, got an empty roster")]
    NoUsers,
    #[error("auction needs at least one bidder, got none")]
    NoBidders,
}

/// Why a round ended without a sale
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidReason {
    NO_QUALIFIED_BIDDERS,
    NO_BIDS,
    NO_SECOND_PRICE,
}

impl fmt::Display for VoidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            VoidReason::NO_QUALIFIED_BIDDERS => "No qualified bidders for this round.",
            VoidReason::NO_BIDS => "No bids were placed.",
            VoidReason::NO_SECOND_PRICE => "No second-highest price available.",
        };
        write!(f, "{}", message)
    }
}

/// Result of a round that cleared
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub winner_index: usize,
    pub user_id: usize,
    /// Clearing price, the highest bid among the other bidders
    pub price: f64,
    pub winner_balance: f64,
    pub clicked: bool,
    pub winning_bid: f64,
}

/// Outcome of a single auction round
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Completed(RoundSummary),
    Voided(VoidReason),
}

/// Repeated second-price auction over a fixed roster of users and bidders
///
/// The auction owns the only random stream of the simulation. User selection, bidder
/// decisions, tie-breaks and clicks all draw from it in a fixed order, so the same seed
/// replays the same run.
pub struct Auction {
    users: Users,
    bidders: Bidders,
    balances: Vec<f64>,
    balance_history: Vec<Vec<f64>>,
    rng: StdRng,
    rounds_executed: usize,
}

impl Auction {
    /// Create an auction, failing if there is nobody to show ads to or nobody to bid
    pub fn new(users: Users, bidders: Bidders, rng: StdRng) -> Result<Self, AuctionError> {
        if users.is_empty() {
            return Err(AuctionError::NoUsers);
        }
        if bidders.is_empty() {
            return Err(AuctionError::NoBidders);
        }
        let num_bidders = bidders.len();
        Ok(Self {
            users,
            bidders,
            balances: vec![0.0; num_bidders],
            balance_history: vec![Vec::new(); num_bidders],
            rng,
            rounds_executed: 0,
        })
    }

    pub fn bidders(&self) -> &Bidders {
        &self.bidders
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Current balance of every bidder, indexed by bidder id
    pub fn balances(&self) -> &[f64] {
        &self.balances
    }

    /// Balance of every bidder after each completed round
    pub fn balance_history(&self) -> &[Vec<f64>] {
        &self.balance_history
    }

    /// Number of rounds executed so far, voided ones included
    pub fn rounds_executed(&self) -> usize {
        self.rounds_executed
    }

    pub fn is_qualified(&self, bidder_index: usize) -> bool {
        self.balances[bidder_index] >= DISQUALIFICATION_THRESHOLD
    }

    /// Indices of bidders allowed to take part in the next round, in bidder order
    pub fn qualified_bidders(&self) -> Vec<usize> {
        (0..self.bidders.len())
            .filter(|&bidder_index| self.is_qualified(bidder_index))
            .collect()
    }

    /// Run one auction round
    pub fn execute_round(&mut self, logger: &mut Logger) -> RoundOutcome {
        self.rounds_executed += 1;
        let round = self.rounds_executed;

        let user_id = self.rng.gen_range(0..self.users.len());

        let qualified = self.qualified_bidders();
        if qualified.is_empty() {
            return self.void(round, VoidReason::NO_QUALIFIED_BIDDERS, logger);
        }

        // Accepted bids as (bidder_index, bid), in qualified order
        let mut bids: Vec<(usize, f64)> = Vec::with_capacity(qualified.len());
        for &bidder_index in &qualified {
            if let Some(bid) = self.bidders.bidders[bidder_index].bid(user_id, &mut self.rng) {
                if !bid.is_finite() || bid < 0.0 {
                    errln!(logger, LogEvent::Round, "Invalid bid {} from bidder #{}, skipping", bid, bidder_index);
                    continue;
                }
                bids.push((bidder_index, bid));
            }
        }
        if bids.is_empty() {
            return self.void(round, VoidReason::NO_BIDS, logger);
        }
        let all_bids = if VERBOSE_AUCTION.load(Ordering::Relaxed) && logger.is_enabled(LogEvent::Auction) {
            Some(bids.clone())
        } else {
            None
        };

        let max_bid = highest_bid(&bids);
        let max_positions: Vec<usize> = bids.iter()
            .enumerate()
            .filter(|(_, (_, bid))| *bid == max_bid)
            .map(|(position, _)| position)
            .collect();
        let winning_position = if max_positions.len() == 1 {
            max_positions[0]
        } else {
            max_positions[self.rng.gen_range(0..max_positions.len())]
        };

        let (winner_index, winning_bid) = bids.remove(winning_position);
        if bids.is_empty() {
            // Nobody is notified, the sole bidder does not learn it would have won
            return self.void(round, VoidReason::NO_SECOND_PRICE, logger);
        }
        let price = highest_bid(&bids);

        let clicked = self.users.users[user_id].observe_click(&mut self.rng);

        for &bidder_index in &qualified {
            if bidder_index == winner_index {
                self.bidders.bidders[bidder_index].notify(true, price, Some(clicked));
            } else {
                self.bidders.bidders[bidder_index].notify(false, price, None);
            }
        }

        if clicked {
            self.balances[winner_index] += CLICK_REWARD;
        }
        self.balances[winner_index] -= price;
        let winner_balance = self.balances[winner_index];
        if winner_balance < DISQUALIFICATION_THRESHOLD {
            warnln!(logger, LogEvent::Round, "Bidder #{} disqualified due to insufficient balance ({:.3})", winner_index, winner_balance);
        }

        for (history, &balance) in self.balance_history.iter_mut().zip(&self.balances) {
            history.push(balance);
        }

        if let Some(all_bids) = all_bids {
            self.log_auction_csv(round, user_id, winner_index, price, clicked, &all_bids, logger);
        }
        logln!(logger, LogEvent::Round, "Round {}: winner #{}, user #{}, price {:.3}, balance {:.3}, clicked {}",
            round, winner_index, user_id, price, winner_balance, clicked);

        RoundOutcome::Completed(RoundSummary {
            winner_index,
            user_id,
            price,
            winner_balance,
            clicked,
            winning_bid,
        })
    }

    fn void(&self, round: usize, reason: VoidReason, logger: &mut Logger) -> RoundOutcome {
        logln!(logger, LogEvent::Round, "Round {}: {}", round, reason);
        RoundOutcome::Voided(reason)
    }

    /// One CSV row per completed round: round, user, winner, price, clicked, then each bidder's bid
    /// Bidders that did not bid (disqualified, abstained or rejected) get an empty field
    fn log_auction_csv(&self, round: usize, user_id: usize, winner_index: usize, price: f64, clicked: bool, all_bids: &[(usize, f64)], logger: &mut Logger) {
        let mut csv_fields = vec![
            format!("{}", round),
            format!("{}", user_id),
            format!("{}", winner_index),
            format!("{:.3}", price),
            format!("{}", clicked),
        ];
        for bidder_index in 0..self.bidders.len() {
            match all_bids.iter().find(|(index, _)| *index == bidder_index) {
                Some((_, bid)) => csv_fields.push(format!("{:.3}", bid)),
                None => csv_fields.push(String::new()),
            }
        }
        logln!(logger, LogEvent::Auction, "{}", csv_fields.join(","));
    }
}

fn highest_bid(bids: &[(usize, f64)]) -> f64 {
    bids.iter().map(|&(_, bid)| bid).fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidders::{BidderTrait, BidderType};
    use crate::logger::MemoryReceiver;
    use crate::users::{ClickOracle, User};
    use rand::SeedableRng;
    use std::any::Any;
    use std::cell::Cell;
    use std::rc::Rc;

    /// User whose click outcome is fixed, counting how often it was asked
    struct FixedOracle {
        clicks: bool,
        queries: Rc<Cell<usize>>,
    }

    impl ClickOracle for FixedOracle {
        fn observe_click(&self, _rng: &mut StdRng) -> bool {
            self.queries.set(self.queries.get() + 1);
            self.clicks
        }
    }

    /// Bidder replaying a fixed answer and recording everything it is told
    struct ProbeBidder {
        answer: Option<f64>,
        bid_calls: usize,
        notifications: Vec<(bool, f64, Option<bool>)>,
    }

    impl ProbeBidder {
        fn boxed(answer: Option<f64>) -> Box<dyn BidderTrait> {
            Box::new(Self { answer, bid_calls: 0, notifications: Vec::new() })
        }
    }

    impl BidderTrait for ProbeBidder {
        fn bidder_name(&self) -> &str {
            "Probe"
        }

        fn bid(&mut self, _user_id: usize, _rng: &mut StdRng) -> Option<f64> {
            self.bid_calls += 1;
            self.answer
        }

        fn notify(&mut self, is_winner: bool, price: f64, clicked: Option<bool>) {
            self.notifications.push((is_winner, price, clicked));
        }

        fn type_and_state_string(&self) -> String {
            format!("Probe {:?}", self.answer)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn probe(auction: &Auction, bidder_index: usize) -> &ProbeBidder {
        auction.bidders().bidders[bidder_index].as_any().downcast_ref::<ProbeBidder>()
            .expect("bidder is a probe")
    }

    /// Auction with a single fixed-outcome user and one probe per answer
    fn probe_auction(answers: &[Option<f64>], clicks: bool, seed: u64) -> (Auction, Rc<Cell<usize>>) {
        let queries = Rc::new(Cell::new(0));
        let mut users = Users::new();
        users.add(FixedOracle { clicks, queries: Rc::clone(&queries) });
        let mut bidders = Bidders::new();
        for &answer in answers {
            bidders.add_advanced(ProbeBidder::boxed(answer));
        }
        let auction = Auction::new(users, bidders, StdRng::seed_from_u64(seed)).expect("valid auction");
        (auction, queries)
    }

    fn completed(outcome: RoundOutcome) -> RoundSummary {
        match outcome {
            RoundOutcome::Completed(summary) => summary,
            RoundOutcome::Voided(reason) => panic!("expected a completed round, got {:?}", reason),
        }
    }

    #[test]
    fn test_new_rejects_empty_rosters() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut bidders = Bidders::new();
        bidders.add("Fixed".to_string(), BidderType::FIXED { fixed_bid: 0.5 });
        let result = Auction::new(Users::new(), bidders, StdRng::seed_from_u64(0));
        assert_eq!(result.err(), Some(AuctionError::NoUsers));

        let users = Users::generate(3, &mut rng);
        let result = Auction::new(users, Bidders::new(), StdRng::seed_from_u64(0));
        assert_eq!(result.err(), Some(AuctionError::NoBidders));
        assert!(AuctionError::NoBidders.to_string().contains("at least one bidder"));
    }

    #[test]
    fn test_highest_bid_wins_and_pays_second_price() {
        let (mut auction, _) = probe_auction(&[Some(0.2), Some(0.9), Some(0.7)], true, 1);
        let mut logger = Logger::new();

        let summary = completed(auction.execute_round(&mut logger));

        assert_eq!(summary.winner_index, 1);
        assert_eq!(summary.user_id, 0);
        assert_eq!(summary.price, 0.7);
        assert_eq!(summary.winning_bid, 0.9);
        assert!(summary.clicked);
        // +1 for the click, then -0.7
        assert!((summary.winner_balance - 0.3).abs() < 1e-12);
        assert_eq!(auction.balances()[1], summary.winner_balance);
        assert_eq!(auction.balances()[0], 0.0);
    }

    #[test]
    fn test_no_click_only_debits_price() {
        let (mut auction, _) = probe_auction(&[Some(0.9), Some(0.3)], false, 2);
        let mut logger = Logger::new();

        let summary = completed(auction.execute_round(&mut logger));

        assert_eq!(summary.winner_index, 0);
        assert!(!summary.clicked);
        assert_eq!(auction.balances(), &[-0.3, 0.0]);
        assert_eq!(auction.balance_history(), &[vec![-0.3], vec![0.0]]);
    }

    #[test]
    fn test_tied_max_counts_towards_second_price() {
        let (mut auction, _) = probe_auction(&[Some(0.8), Some(0.4), Some(0.8)], true, 3);
        let mut logger = Logger::new();
        let summary = completed(auction.execute_round(&mut logger));
        assert!(summary.winner_index == 0 || summary.winner_index == 2);
        assert_eq!(summary.price, 0.8);
    }

    #[test]
    fn test_tie_break_is_fair() {
        let (mut auction, _) = probe_auction(&[Some(0.5), Some(0.5), Some(0.3)], true, 42);
        let mut logger = Logger::new();
        let trials = 4000;
        let mut wins = [0usize; 3];
        for _ in 0..trials {
            let summary = completed(auction.execute_round(&mut logger));
            assert_eq!(summary.price, 0.5);
            wins[summary.winner_index] += 1;
        }
        assert_eq!(wins[2], 0);
        let share = wins[0] as f64 / trials as f64;
        assert!((share - 0.5).abs() < 0.05, "bidder 0 won {:.3} of ties", share);
    }

    #[test]
    fn test_single_bidder_round_is_voided() {
        let (mut auction, queries) = probe_auction(&[Some(0.4)], true, 4);
        let mut logger = Logger::new();

        let outcome = auction.execute_round(&mut logger);

        assert_eq!(outcome, RoundOutcome::Voided(VoidReason::NO_SECOND_PRICE));
        assert_eq!(auction.balances(), &[0.0]);
        assert!(auction.balance_history()[0].is_empty());
        // The bid was requested, but nobody was notified and no ad was shown
        assert_eq!(probe(&auction, 0).bid_calls, 1);
        assert!(probe(&auction, 0).notifications.is_empty());
        assert_eq!(queries.get(), 0);
    }

    #[test]
    fn test_no_bids_round_is_voided() {
        let (mut auction, _) = probe_auction(&[None, None], true, 5);
        let mut logger = Logger::new();
        assert_eq!(auction.execute_round(&mut logger), RoundOutcome::Voided(VoidReason::NO_BIDS));
        assert!(auction.balance_history().iter().all(|history| history.is_empty()));
    }

    #[test]
    fn test_no_qualified_bidders_round_is_voided() {
        let (mut auction, _) = probe_auction(&[Some(0.5), Some(0.4)], true, 6);
        auction.balances = vec![-1000.5, -2000.0];
        let mut logger = Logger::new();

        assert_eq!(auction.execute_round(&mut logger), RoundOutcome::Voided(VoidReason::NO_QUALIFIED_BIDDERS));
        assert_eq!(probe(&auction, 0).bid_calls, 0);
        assert_eq!(probe(&auction, 1).bid_calls, 0);
        assert_eq!(auction.rounds_executed(), 1);
    }

    #[test]
    fn test_threshold_balance_is_still_qualified() {
        let (mut auction, _) = probe_auction(&[Some(0.5), Some(0.4)], true, 7);
        auction.balances[0] = DISQUALIFICATION_THRESHOLD;
        assert_eq!(auction.qualified_bidders(), vec![0, 1]);

        let mut logger = Logger::new();
        let summary = completed(auction.execute_round(&mut logger));
        assert_eq!(summary.winner_index, 0);
        assert!((auction.balances()[0] - (DISQUALIFICATION_THRESHOLD + 1.0 - 0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_abstaining_bidder_does_not_shift_winner() {
        let (mut auction, _) = probe_auction(&[None, Some(0.7), Some(0.2)], false, 8);
        let mut logger = Logger::new();

        let summary = completed(auction.execute_round(&mut logger));

        assert_eq!(summary.winner_index, 1);
        assert_eq!(summary.price, 0.2);
        // Asked to bid, so it still hears the verdict as a loser
        assert_eq!(probe(&auction, 0).notifications, vec![(false, 0.2, None)]);
    }

    #[test]
    fn test_invalid_bids_are_rejected_and_logged() {
        let (mut auction, _) = probe_auction(&[Some(-0.5), Some(f64::NAN), Some(0.3), Some(0.2)], true, 9);
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Simulation]);
        logger.add_receiver(receiver);

        let summary = completed(auction.execute_round(&mut logger));

        assert_eq!(summary.winner_index, 2);
        assert_eq!(summary.price, 0.2);
        let logged = buffer.borrow();
        assert!(logged.contains("ERROR Invalid bid -0.5 from bidder #0"));
        assert!(logged.contains("ERROR Invalid bid NaN from bidder #1"));
    }

    #[test]
    fn test_losers_never_see_click_outcome() {
        let (mut auction, queries) = probe_auction(&[Some(0.6), Some(0.5), Some(0.1)], true, 10);
        let mut logger = Logger::new();

        completed(auction.execute_round(&mut logger));

        assert_eq!(probe(&auction, 0).notifications, vec![(true, 0.5, Some(true))]);
        assert_eq!(probe(&auction, 1).notifications, vec![(false, 0.5, None)]);
        assert_eq!(probe(&auction, 2).notifications, vec![(false, 0.5, None)]);
        // The ad is shown exactly once per completed round
        assert_eq!(queries.get(), 1);
    }

    #[test]
    fn test_disqualification_is_monotonic() {
        let (mut auction, _) = probe_auction(&[Some(600.0), Some(600.0)], false, 11);
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Round]);
        logger.add_receiver(receiver);

        // Every completed round costs the winner 600, someone must drop out within 3 rounds
        let mut rounds = 0;
        while auction.qualified_bidders().len() == 2 {
            completed(auction.execute_round(&mut logger));
            rounds += 1;
            assert!(rounds <= 3);
        }
        assert!(buffer.borrow().contains("disqualified due to insufficient balance"));

        let disqualified = if auction.is_qualified(0) { 1 } else { 0 };
        let remaining = 1 - disqualified;
        let calls_at_disqualification = probe(&auction, disqualified).bid_calls;
        let balances_at_disqualification = auction.balances().to_vec();
        let history_len = auction.balance_history()[0].len();

        for _ in 0..20 {
            // A lone qualified bidder has nobody to set the price
            assert_eq!(auction.execute_round(&mut logger), RoundOutcome::Voided(VoidReason::NO_SECOND_PRICE));
            assert!(!auction.is_qualified(disqualified));
        }
        assert_eq!(probe(&auction, disqualified).bid_calls, calls_at_disqualification);
        assert_eq!(probe(&auction, remaining).bid_calls, calls_at_disqualification + 20);
        assert_eq!(auction.balances(), balances_at_disqualification.as_slice());
        assert_eq!(auction.balance_history()[0].len(), history_len);
    }

    /// Build a realistic auction of epsilon-greedy learners
    fn learning_auction(seed: u64) -> Auction {
        let mut setup_rng = StdRng::seed_from_u64(seed);
        let users = Users::generate(10, &mut setup_rng);
        let mut bidders = Bidders::new();
        for i in 0..5 {
            bidders.add(format!("Learner {}", i), BidderType::EPSILON_GREEDY { num_users: 10, num_rounds: 2000 });
        }
        Auction::new(users, bidders, StdRng::seed_from_u64(seed + 1)).expect("valid auction")
    }

    #[test]
    fn test_balances_reconcile_with_round_summaries() {
        let mut auction = learning_auction(100);
        let mut logger = Logger::new();
        let mut expected = vec![0.0; 5];
        let mut completed_rounds = 0;

        for _ in 0..2000 {
            if let RoundOutcome::Completed(summary) = auction.execute_round(&mut logger) {
                assert!(summary.price <= summary.winning_bid);
                assert!(summary.price >= 0.0);
                if summary.clicked {
                    expected[summary.winner_index] += CLICK_REWARD;
                }
                expected[summary.winner_index] -= summary.price;
                assert_eq!(summary.winner_balance, expected[summary.winner_index]);
                completed_rounds += 1;
            }
        }

        assert!(completed_rounds > 0);
        for (bidder_index, history) in auction.balance_history().iter().enumerate() {
            assert_eq!(history.len(), completed_rounds);
            assert!((history[history.len() - 1] - expected[bidder_index]).abs() < 1e-9);
            assert_eq!(auction.balances()[bidder_index], expected[bidder_index]);
        }
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let mut logger = Logger::new();
        let mut first = learning_auction(7);
        let mut second = learning_auction(7);
        for _ in 0..500 {
            assert_eq!(first.execute_round(&mut logger), second.execute_round(&mut logger));
        }
        assert_eq!(first.balance_history(), second.balance_history());
    }

    #[test]
    fn test_real_users_pick_every_user() {
        let mut setup_rng = StdRng::seed_from_u64(12);
        let mut users = Users::new();
        for _ in 0..3 {
            users.add(User::new(&mut setup_rng));
        }
        let mut bidders = Bidders::new();
        bidders.add("A".to_string(), BidderType::FIXED { fixed_bid: 0.3 });
        bidders.add("B".to_string(), BidderType::FIXED { fixed_bid: 0.2 });
        let mut auction = Auction::new(users, bidders, StdRng::seed_from_u64(13)).expect("valid auction");
        let mut logger = Logger::new();

        let mut seen = [false; 3];
        for _ in 0..300 {
            let summary = completed(auction.execute_round(&mut logger));
            seen[summary.user_id] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(auction.num_users(), 3);
    }

    #[test]
    fn test_verbose_csv_row() {
        let (auction, _) = probe_auction(&[Some(0.5), None, Some(0.25)], true, 14);
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Auction]);
        logger.add_receiver(receiver);

        auction.log_auction_csv(3, 0, 0, 0.25, true, &[(0, 0.5), (2, 0.25)], &mut logger);

        assert_eq!(buffer.borrow().as_str(), "3,0,0,0.250,true,0.500,,0.250\n");
    }

    #[test]
    fn test_void_reason_messages() {
        assert_eq!(VoidReason::NO_QUALIFIED_BIDDERS.to_string(), "No qualified bidders for this round.");
        assert_eq!(VoidReason::NO_BIDS.to_string(), "No bids were placed.");
        assert_eq!(VoidReason::NO_SECOND_PRICE.to_string(), "No second-highest price available.");
    }
}
