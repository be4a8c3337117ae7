//! Record filtering
//!
//! A [`MailQuery`] is a closed set of predicates; a [`MailFilter`] binds it to
//! the random source the damping predicate draws from.

mod geo;
mod predicate;
mod query_parser;
mod random;

pub use geo::{damping_probability, distance_meters};
pub use predicate::{DEFAULT_DAMPING_THRESHOLD, MailQuery, Predicate, PredicateGroup};
pub use query_parser::parse_query;
pub use random::{FixedSample, RandomSource, SampleSequence};

use crate::models::MailRecord;

/// A query together with its source of randomness
pub struct MailFilter {
    query: MailQuery,
    random: Box<dyn RandomSource>,
}

impl MailFilter {
    /// Filter drawing from the thread-local generator
    pub fn new(query: MailQuery) -> Self {
        Self::with_random(query, rand::rng())
    }

    /// Filter drawing from a caller-supplied source
    pub fn with_random(query: MailQuery, random: impl RandomSource + 'static) -> Self {
        Self {
            query,
            random: Box::new(random),
        }
    }

    pub fn query(&self) -> &MailQuery {
        &self.query
    }

    /// Evaluate the query; damping predicates may answer differently per call
    pub fn matches(&mut self, record: &MailRecord) -> bool {
        self.query.matches(record, self.random.as_mut())
    }
}

impl From<MailQuery> for MailFilter {
    fn from(query: MailQuery) -> Self {
        Self::new(query)
    }
}
