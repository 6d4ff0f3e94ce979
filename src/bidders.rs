pub use crate::bidder::BidderTrait;
pub use crate::bidder_strategies::{BidderEpsilonGreedy, BidderFixed};

/// Bidder type determining the bidding strategy
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum BidderType {
    EPSILON_GREEDY { num_users: usize, num_rounds: usize },
    FIXED { fixed_bid: f64 },
}

/// Container for bidders
/// Uses trait objects so the auction can run any mix of strategies
pub struct Bidders {
    pub bidders: Vec<Box<dyn BidderTrait>>,
}

impl Bidders {
    pub fn new() -> Self {
        Self {
            bidders: Vec::new(),
        }
    }

    /// Add a bidder to the collection
    ///
    /// # Arguments
    /// * `bidder_name` - Name of the bidder
    /// * `bidder_type` - Bidding strategy
    ///
    /// # Returns
    /// The bidder_id of the just added bidder
    pub fn add(&mut self, bidder_name: String, bidder_type: BidderType) -> usize {
        let bidder_id = self.bidders.len();
        let bidder: Box<dyn BidderTrait> = match bidder_type {
            BidderType::EPSILON_GREEDY { num_users, num_rounds } => {
                Box::new(BidderEpsilonGreedy::new(bidder_id, bidder_name, num_users, num_rounds))
            }
            BidderType::FIXED { fixed_bid } => {
                Box::new(BidderFixed::new(bidder_id, bidder_name, fixed_bid))
            }
        };
        self.bidders.push(bidder);
        bidder_id
    }

    /// Add a custom bidder implementation
    ///
    /// # Returns
    /// The bidder_id of the just added bidder, which is its position in the collection
    pub fn add_advanced(&mut self, bidder: Box<dyn BidderTrait>) -> usize {
        let bidder_id = self.bidders.len();
        self.bidders.push(bidder);
        bidder_id
    }

    pub fn len(&self) -> usize {
        self.bidders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bidders.is_empty()
    }
}

impl Default for Bidders {
    fn default() -> Self {
        Self::new()
    }
}
