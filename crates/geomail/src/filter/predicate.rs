//! Query predicates and their evaluation against a single record

use chrono::{DateTime, Utc};

use super::geo::{damping_probability, distance_meters};
use super::random::RandomSource;
use crate::models::{Coordinates, MailRecord};

/// Probability below which the damping filter never samples
pub const DEFAULT_DAMPING_THRESHOLD: f64 = 0.05;

/// How a predicate combines with the rest of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateGroup {
    /// ANDed with every other predicate
    Scalar,
    /// ORed with the other location predicates, the result ANDed with the rest
    Location,
}

/// A single condition on a record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Creation time within the inclusive range; open ends are unbounded
    DateRange {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Some recipient lies strictly closer than `radius_meters` to `center`
    LocationWithinRadius {
        center: Coordinates,
        radius_meters: f64,
    },
    /// Some recipient passes a random draw weighted by closeness to `center`
    DampingDistance {
        center: Coordinates,
        base_distance_meters: f64,
        threshold_probability: f64,
    },
    /// Exact, case-sensitive identity match
    NameEquals(String),
    /// Case-insensitive substring of the notes
    NotesContains(String),
    /// Case-insensitive substring of the inline message
    InlineMessageContains(String),
    /// Some attachment digest starts with the prefix
    AttachmentHashPrefix(String),
}

impl Predicate {
    pub fn date_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Predicate::DateRange { from, to }
    }

    pub fn within_radius(center: impl Into<Coordinates>, radius_meters: f64) -> Self {
        Predicate::LocationWithinRadius {
            center: center.into(),
            radius_meters,
        }
    }

    /// Damping filter with the default threshold
    pub fn damping(center: impl Into<Coordinates>, base_distance_meters: f64) -> Self {
        Predicate::DampingDistance {
            center: center.into(),
            base_distance_meters,
            threshold_probability: DEFAULT_DAMPING_THRESHOLD,
        }
    }

    pub fn group(&self) -> PredicateGroup {
        match self {
            Predicate::LocationWithinRadius { .. } | Predicate::DampingDistance { .. } => {
                PredicateGroup::Location
            }
            _ => PredicateGroup::Scalar,
        }
    }

    /// Evaluate against one record; only the damping filter draws samples
    pub fn evaluate(&self, record: &MailRecord, random: &mut dyn RandomSource) -> bool {
        match self {
            Predicate::DateRange { from, to } => {
                from.is_none_or(|from| record.created_at >= from)
                    && to.is_none_or(|to| record.created_at <= to)
            }
            Predicate::LocationWithinRadius {
                center,
                radius_meters,
            } => record
                .recipients
                .iter()
                .any(|c| distance_meters(*c, *center) < *radius_meters),
            Predicate::DampingDistance {
                center,
                base_distance_meters,
                threshold_probability,
            } => record.recipients.iter().any(|c| {
                let p = damping_probability(distance_meters(*c, *center), *base_distance_meters);
                p > *threshold_probability && random.next_sample() < p
            }),
            Predicate::NameEquals(name) => record.identity == *name,
            Predicate::NotesContains(needle) => contains_ignore_case(record.notes.as_deref(), needle),
            Predicate::InlineMessageContains(needle) => {
                contains_ignore_case(record.inline_message.as_deref(), needle)
            }
            Predicate::AttachmentHashPrefix(prefix) => {
                record.attachments.iter().any(|a| a.digest.starts_with(prefix.as_str()))
            }
        }
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

/// A set of predicates, grouped by how they combine
///
/// Scalar predicates are ANDed. Location predicates are ORed among
/// themselves and that result is ANDed with the scalars. An empty query
/// matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailQuery {
    scalar: Vec<Predicate>,
    location: Vec<Predicate>,
}

impl MailQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate to the group it belongs to
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.push(predicate);
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        match predicate.group() {
            PredicateGroup::Scalar => self.scalar.push(predicate),
            PredicateGroup::Location => self.location.push(predicate),
        }
    }

    pub fn scalar_predicates(&self) -> &[Predicate] {
        &self.scalar
    }

    pub fn location_predicates(&self) -> &[Predicate] {
        &self.location
    }

    pub fn is_empty(&self) -> bool {
        self.scalar.is_empty() && self.location.is_empty()
    }

    pub fn matches(&self, record: &MailRecord, random: &mut dyn RandomSource) -> bool {
        self.scalar.iter().all(|p| p.evaluate(record, random))
            && (self.location.is_empty() || self.location.iter().any(|p| p.evaluate(record, random)))
    }
}

impl FromIterator<Predicate> for MailQuery {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        let mut query = MailQuery::new();
        for predicate in iter {
            query.push(predicate);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::random::{FixedSample, SampleSequence};
    use crate::models::AttachmentRef;
    use chrono::TimeZone;

    fn fabricate(created: DateTime<Utc>) -> MailRecord {
        MailRecord::builder("john_smith@mydomain.com")
            .created_at(created)
            .recipient((53.3595118, -6.3086148))
            .recipient((-23.5311317, -46.9026668))
            .notes("This message is for John Smith")
            .inline_message("This message is for John Smith")
            .attachment(AttachmentRef::new("123.mp4", 12_345_678, "0123456789abcdef"))
            .build()
    }

    fn record() -> MailRecord {
        fabricate(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    fn eval(predicate: Predicate, record: &MailRecord) -> bool {
        predicate.evaluate(record, &mut FixedSample(0.0))
    }

    #[test]
    fn test_date_range() {
        let r = record();
        assert!(!eval(Predicate::date_range(date(2019, 4, 5), date(2020, 12, 31)), &r));
        assert!(eval(Predicate::date_range(date(2019, 4, 5), None), &r));
        assert!(!eval(Predicate::date_range(date(2021, 4, 5), date(2022, 12, 31)), &r));
        assert!(eval(Predicate::date_range(date(2019, 4, 5), date(2022, 12, 31)), &r));
        assert!(eval(Predicate::date_range(None, date(2022, 12, 31)), &r));
    }

    #[test]
    fn test_date_range_bounds_inclusive() {
        let r = record();
        assert!(eval(Predicate::date_range(date(2021, 1, 1), date(2021, 1, 1)), &r));
    }

    #[test]
    fn test_within_radius() {
        let r = record();
        assert!(eval(Predicate::within_radius((53.359, -6.308), 1000.0), &r));
        assert!(!eval(Predicate::within_radius((53.359, -6.308), 1.0), &r));
        assert!(eval(Predicate::within_radius((-23.531, -46.902), 2000.0), &r));
    }

    #[test]
    fn test_within_radius_moscow_example() {
        let r = MailRecord::builder("x").recipient((55.7558, 37.6178)).build();
        assert!(eval(Predicate::within_radius((55.75222, 37.61556), 1000.0), &r));
        assert!(!eval(Predicate::within_radius((55.75222, 37.61556), 1.0), &r));
    }

    #[test]
    fn test_within_radius_no_recipients() {
        let r = MailRecord::builder("x").build();
        assert!(!eval(Predicate::within_radius((0.0, 0.0), 1e9), &r));
    }

    #[test]
    fn test_name_is_exact() {
        let r = record();
        assert!(eval(Predicate::NameEquals("john_smith@mydomain.com".into()), &r));
        assert!(!eval(Predicate::NameEquals("john_smIth@mydomain.com".into()), &r));
        assert!(!eval(Predicate::NameEquals("john_smith@mydomain.com ".into()), &r));
    }

    #[test]
    fn test_notes_and_message_substring() {
        let r = record();
        assert!(eval(Predicate::NotesContains("for john smith".into()), &r));
        assert!(!eval(Predicate::NotesContains("not for john smith".into()), &r));
        assert!(eval(Predicate::InlineMessageContains("FOR JOHN".into()), &r));
        assert!(!eval(Predicate::InlineMessageContains("not for john smith".into()), &r));
    }

    #[test]
    fn test_missing_optional_never_matches() {
        let r = MailRecord::builder("x").build();
        assert!(!eval(Predicate::NotesContains(String::new()), &r));
        assert!(!eval(Predicate::InlineMessageContains(String::new()), &r));
    }

    #[test]
    fn test_attachment_prefix() {
        let r = record();
        assert!(eval(Predicate::AttachmentHashPrefix("0123456789abcdef".into()), &r));
        assert!(eval(Predicate::AttachmentHashPrefix("01234".into()), &r));
        assert!(!eval(Predicate::AttachmentHashPrefix("12345".into()), &r));
    }

    #[test]
    fn test_damping_uses_sample() {
        let r = MailRecord::builder("x").recipient((55.7558, 37.6178)).build();
        let damping = Predicate::damping((55.75222, 37.61556), 1000.0);
        // ~420 m away with a 1 km base: p is roughly 0.75
        assert!(damping.evaluate(&r, &mut FixedSample(0.5)));
        assert!(!damping.evaluate(&r, &mut FixedSample(0.9)));
    }

    #[test]
    fn test_damping_below_threshold_never_samples() {
        let r = MailRecord::builder("x").recipient((53.3595118, -6.3086148)).build();
        let damping = Predicate::damping((55.75222, 37.61556), 1000.0);
        let mut samples = SampleSequence::new(vec![0.0]);
        assert!(!damping.evaluate(&r, &mut samples));
        assert_eq!(samples.drawn(), 0);
    }

    #[test]
    fn test_damping_any_recipient() {
        let r = MailRecord::builder("x")
            .recipient((-23.5311317, -46.9026668))
            .recipient((55.75222, 37.61556))
            .build();
        let damping = Predicate::damping((55.75222, 37.61556), 1000.0);
        let mut samples = SampleSequence::new(vec![0.99]);
        assert!(damping.evaluate(&r, &mut samples));
        assert_eq!(samples.drawn(), 1);
    }

    #[test]
    fn test_empty_query_matches_all() {
        let query = MailQuery::new();
        assert!(query.is_empty());
        assert!(query.matches(&record(), &mut FixedSample(0.0)));
    }

    #[test]
    fn test_scalars_are_anded() {
        let query = MailQuery::new()
            .with(Predicate::NameEquals("john_smith@mydomain.com".into()))
            .with(Predicate::NotesContains("nobody".into()));
        assert!(!query.matches(&record(), &mut FixedSample(0.0)));
    }

    #[test]
    fn test_location_predicates_are_ored() {
        let far = Predicate::within_radius((0.0, 0.0), 1.0);
        let near = Predicate::within_radius((53.359, -6.308), 1000.0);
        let query = MailQuery::new().with(far.clone()).with(near);
        assert_eq!(query.location_predicates().len(), 2);
        assert!(query.matches(&record(), &mut FixedSample(0.0)));

        let query = MailQuery::new()
            .with(far)
            .with(Predicate::damping((53.359, -6.308), 1000.0));
        assert!(query.matches(&record(), &mut FixedSample(0.1)));
        assert!(!query.matches(&record(), &mut FixedSample(0.999)));
    }

    #[test]
    fn test_location_group_anded_with_scalars() {
        let query: MailQuery = [
            Predicate::within_radius((53.359, -6.308), 1000.0),
            Predicate::NameEquals("someone else".into()),
        ]
        .into_iter()
        .collect();
        assert_eq!(query.scalar_predicates().len(), 1);
        assert!(!query.matches(&record(), &mut FixedSample(0.0)));
    }
}
