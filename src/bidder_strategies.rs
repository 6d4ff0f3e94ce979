use crate::bidder::BidderTrait;
use crate::utils::round_to_decimals;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};
use std::any::Any;
use std::collections::HashMap;

/// Highest bid the epsilon-greedy bidder ever makes, both when exploring and exploiting
/// A click is worth 1.0, so paying close to that is never profitable
pub const MAX_BID: f64 = 0.9;
/// Starting exploration rate
pub const INITIAL_EXPLORATION_RATE: f64 = 1.0;
/// Multiplicative decay applied to the exploration rate on every bid
pub const EXPLORATION_DECAY: f64 = 0.99;
/// The exploration rate never decays below this
pub const MIN_EXPLORATION_RATE: f64 = 0.05;
/// Bids are rounded to this many decimals
pub const BID_DECIMALS: i32 = 3;

/// Epsilon-greedy bidder learning a click-through rate per user
///
/// With probability `exploration_rate` it explores with a uniform bid in [0, MAX_BID),
/// otherwise it bids its observed click rate for the user scaled by MAX_BID.
/// The exploration rate decays on every bid, regardless of the branch taken.
pub struct BidderEpsilonGreedy {
    pub bidder_id: usize,
    pub bidder_name: String,
    num_users: usize,
    // Kept for future round-aware schedules, the policy does not use it
    #[allow(dead_code)]
    num_rounds: usize,
    exploration_rate: f64,
    click_history: HashMap<usize, Vec<bool>>,
    win_history: Vec<bool>,
    last_queried_user: Option<usize>,
}

impl BidderEpsilonGreedy {
    pub fn new(bidder_id: usize, bidder_name: String, num_users: usize, num_rounds: usize) -> Self {
        Self {
            bidder_id,
            bidder_name,
            num_users,
            num_rounds,
            exploration_rate: INITIAL_EXPLORATION_RATE,
            click_history: HashMap::with_capacity(num_users),
            win_history: Vec::new(),
            last_queried_user: None,
        }
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Observed clicks for `user_id`, oldest first
    pub fn click_history(&self, user_id: usize) -> &[bool] {
        self.click_history.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One entry per notification, true for rounds won
    pub fn win_history(&self) -> &[bool] {
        &self.win_history
    }

    /// Empirical click rate for `user_id`, 0.0 when nothing was observed yet
    pub fn click_rate(&self, user_id: usize) -> f64 {
        let clicks = self.click_history(user_id);
        if clicks.is_empty() {
            return 0.0;
        }
        clicks.iter().filter(|&&clicked| clicked).count() as f64 / clicks.len() as f64
    }

    /// Bid used when exploiting, before rounding
    fn exploit_bid(&self, user_id: usize) -> f64 {
        (self.click_rate(user_id) * MAX_BID).min(MAX_BID)
    }
}

impl BidderTrait for BidderEpsilonGreedy {
    fn bidder_name(&self) -> &str {
        &self.bidder_name
    }

    fn bid(&mut self, user_id: usize, rng: &mut StdRng) -> Option<f64> {
        self.last_queried_user = Some(user_id);

        let unit = Uniform::new(0.0, 1.0);
        let bid = if unit.sample(rng) < self.exploration_rate {
            Uniform::new(0.0, MAX_BID).sample(rng)
        } else {
            self.exploit_bid(user_id)
        };

        self.exploration_rate = (self.exploration_rate * EXPLORATION_DECAY).max(MIN_EXPLORATION_RATE);

        Some(round_to_decimals(bid, BID_DECIMALS))
    }

    fn notify(&mut self, is_winner: bool, _price: f64, clicked: Option<bool>) {
        self.win_history.push(is_winner);
        // A notify without a preceding bid has no user to attribute the click to
        if let (Some(clicked), Some(user_id)) = (clicked, self.last_queried_user) {
            self.click_history.entry(user_id).or_default().push(clicked);
        }
    }

    fn type_and_state_string(&self) -> String {
        format!(
            "Epsilon-greedy (epsilon={:.4}, users observed={}/{}, rounds won={})",
            self.exploration_rate,
            self.click_history.len(),
            self.num_users,
            self.win_history.iter().filter(|&&won| won).count()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Bidder that always bids the same amount, used as a baseline
pub struct BidderFixed {
    pub bidder_id: usize,
    pub bidder_name: String,
    pub fixed_bid: f64,
    rounds_won: usize,
}

impl BidderFixed {
    pub fn new(bidder_id: usize, bidder_name: String, fixed_bid: f64) -> Self {
        Self { bidder_id, bidder_name, fixed_bid, rounds_won: 0 }
    }

    pub fn rounds_won(&self) -> usize {
        self.rounds_won
    }
}

impl BidderTrait for BidderFixed {
    fn bidder_name(&self) -> &str {
        &self.bidder_name
    }

    fn bid(&mut self, _user_id: usize, _rng: &mut StdRng) -> Option<f64> {
        Some(self.fixed_bid)
    }

    fn notify(&mut self, is_winner: bool, _price: f64, _clicked: Option<bool>) {
        if is_winner {
            self.rounds_won += 1;
        }
    }

    fn type_and_state_string(&self) -> String {
        format!("Fixed bid {:.3} (rounds won={})", self.fixed_bid, self.rounds_won)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
