//! Ordered "first match wins" rule tables.
//!
//! Every lookup table in the engine (cycle bands, setup conditions, decision
//! cells, gates) is a `RuleSet`: the position of a rule in the list is its
//! precedence.

type Predicate<I> = Box<dyn Fn(&I) -> bool + Send + Sync>;
type Outcome<I, O> = Box<dyn Fn(&I) -> O + Send + Sync>;

pub struct Rule<I, O> {
    pub name: &'static str,
    predicate: Predicate<I>,
    outcome: Outcome<I, O>,
}

impl<I, O> Rule<I, O> {
    pub fn matches(&self, input: &I) -> bool {
        (self.predicate)(input)
    }

    pub fn apply(&self, input: &I) -> O {
        (self.outcome)(input)
    }
}

pub struct RuleSet<I, O> {
    rules: Vec<Rule<I, O>>,
}

impl<I, O> Default for RuleSet<I, O> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<I, O> RuleSet<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule with lower precedence than every rule already present.
    pub fn rule<P, F>(mut self, name: &'static str, predicate: P, outcome: F) -> Self
    where
        P: Fn(&I) -> bool + Send + Sync + 'static,
        F: Fn(&I) -> O + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            name,
            predicate: Box::new(predicate),
            outcome: Box::new(outcome),
        });
        self
    }

    /// First matching rule, if any.
    pub fn first_match(&self, input: &I) -> Option<&Rule<I, O>> {
        self.rules.iter().find(|r| r.matches(input))
    }

    pub fn resolve(&self, input: &I) -> Option<O> {
        self.first_match(input).map(|r| r.apply(input))
    }

    /// Resolve, falling back to `default` when nothing matches.
    pub fn resolve_or_else<D>(&self, input: &I, default: D) -> O
    where
        D: FnOnce(&I) -> O,
    {
        match self.first_match(input) {
            Some(rule) => rule.apply(input),
            None => default(input),
        }
    }

    /// Outcomes of every rule whose predicate holds, in precedence order.
    pub fn resolve_all(&self, input: &I) -> Vec<O> {
        self.rules
            .iter()
            .filter(|r| r.matches(input))
            .map(|r| r.apply(input))
            .collect()
    }

    /// Names of every rule whose predicate holds, in precedence order.
    pub fn matching_names(&self, input: &I) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.matches(input))
            .map(|r| r.name)
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Inclusive range check used by the band tables.
pub fn within(value: f64, lo: f64, hi: f64) -> bool {
    value >= lo && value <= hi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parity() -> RuleSet<i32, &'static str> {
        RuleSet::new()
            .rule("negative", |x: &i32| *x < 0, |_| "neg")
            .rule("even", |x: &i32| x % 2 == 0, |_| "even")
            .rule("big", |x: &i32| *x > 100, |_| "big")
    }

    #[test]
    fn first_match_wins() {
        let rs = parity();
        // -4 satisfies both "negative" and "even"
        assert_eq!(rs.resolve(&-4), Some("neg"));
        assert_eq!(rs.resolve(&200), Some("even"));
        assert_eq!(rs.resolve(&101), Some("big"));
        assert_eq!(rs.resolve(&7), None);
    }

    #[test]
    fn fallback_and_introspection() {
        let rs = parity();
        assert_eq!(rs.resolve_or_else(&7, |_| "none"), "none");
        assert_eq!(rs.matching_names(&-4), vec!["negative", "even"]);
        assert_eq!(rs.resolve_all(&-4), vec!["neg", "even"]);
        assert!(rs.resolve_all(&7).is_empty());
        assert_eq!(rs.names(), vec!["negative", "even", "big"]);
        assert_eq!(rs.len(), 3);
    }

    #[test]
    fn within_is_inclusive() {
        assert!(within(2.0, 2.0, 3.0));
        assert!(within(3.0, 2.0, 3.0));
        assert!(!within(3.0001, 2.0, 3.0));
    }
}
