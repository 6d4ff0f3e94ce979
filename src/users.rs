use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

/// Anything the auction can show an ad to and observe a click from
pub trait ClickOracle {
    /// Show the ad once and report whether it was clicked
    /// Every call is an independent draw from `rng`
    fn observe_click(&self, rng: &mut StdRng) -> bool;
}

/// A user with a secret probability of clicking an ad
///
/// The probability is drawn once at creation and never exposed,
/// the only way to learn about it is through observe_click
pub struct User {
    click_probability: f64,
}

impl User {
    /// Create a user with click probability drawn from Uniform(0, 1)
    pub fn new(rng: &mut StdRng) -> Self {
        let click_probability = Uniform::new(0.0, 1.0).sample(rng);
        Self { click_probability }
    }
}

impl ClickOracle for User {
    fn observe_click(&self, rng: &mut StdRng) -> bool {
        Uniform::new(0.0, 1.0).sample(rng) < self.click_probability
    }
}

impl std::fmt::Debug for User {
    // Never print the secret probability
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User").finish_non_exhaustive()
    }
}

/// Container for the user roster, a user's id is its index in the roster
pub struct Users {
    pub users: Vec<Box<dyn ClickOracle>>,
}

impl Users {
    pub fn new() -> Self {
        Self { users: Vec::new() }
    }

    /// Create a roster of `num_users` users with probabilities drawn from `rng`
    pub fn generate(num_users: usize, rng: &mut StdRng) -> Self {
        let mut users = Self::new();
        for _ in 0..num_users {
            users.add(User::new(rng));
        }
        users
    }

    /// Add a user and return its id
    pub fn add<U: ClickOracle + 'static>(&mut self, user: U) -> usize {
        self.add_advanced(Box::new(user))
    }

    /// Add an already boxed oracle and return its id
    pub fn add_advanced(&mut self, user: Box<dyn ClickOracle>) -> usize {
        let user_id = self.users.len();
        self.users.push(user);
        user_id
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for Users {
    fn default() -> Self {
        Self::new()
    }
}
