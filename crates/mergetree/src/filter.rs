use perspectivedb_primitives::Value;

/// A per-perspective body filter: a conjunctive equality match on
/// selected top-level fields (spec §4.2.2). A version whose body does
/// not match every configured field is dropped before it reaches the
/// perspective's tree.
#[derive(Debug, Clone, Default)]
pub struct BodyFilter {
    equals: Vec<(String, Value)>,
}

impl BodyFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: Value) -> Self {
        self.equals.push((key.into(), value));
        self
    }

    #[must_use]
    pub fn matches(&self, body: Option<&Value>) -> bool {
        if self.equals.is_empty() {
            return true;
        }
        let Some(body) = body else {
            return false;
        };
        self.equals.iter().all(|(key, value)| body.get(key) == Some(value))
    }
}
