use rand::rngs::StdRng;
use std::any::Any;

/// Trait for bidders participating in auctions
///
/// A bidder only ever sees the user id it is asked about, the shared random stream
/// for the duration of a call, and the verdict of rounds it took part in.
/// It never sees other bidders or its own balance, those belong to the auction.
///
/// Precondition: for one bidder, every `notify` answers the `bid` right before it.
/// The auction guarantees this by running rounds strictly one after another.
pub trait BidderTrait {
    /// Get the bidder name
    fn bidder_name(&self) -> &str;

    /// Bid for an impression of `user_id`
    /// Returns None to sit the round out
    fn bid(&mut self, user_id: usize, rng: &mut StdRng) -> Option<f64>;

    /// Receive the verdict of the round the last bid was made in
    /// `clicked` is Some only for the winner, losers never learn the click outcome
    fn notify(&mut self, is_winner: bool, price: f64, clicked: Option<bool>);

    /// Get a string representation of the bidding strategy and its current state
    fn type_and_state_string(&self) -> String;

    /// Get reference to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}
