use crate::{
    filter::{FilteredTests, TestFilter},
    test::{Test, TestMeta},
};

/// Select tests by name.
///
/// Names are matched against the qualified name `suite::name`, by substring
/// unless [`with_exact`](Self::with_exact) is set. A test is kept if it
/// matches any filter (or there are none) and no skip pattern.
#[derive(Debug, Default, Clone)]
pub struct DefaultFilter {
    exact: bool,
    filter: Vec<String>,
    skip: Vec<String>,
}

impl DefaultFilter {
    pub fn new<I, S>(filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter: filter.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_exact(self, exact: bool) -> Self {
        Self { exact, ..self }
    }

    pub fn with_skip<I, S>(mut self, skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(skip.into_iter().map(Into::into));
        self
    }

    fn matches(&self, name: &str, pattern: &str) -> bool {
        match self.exact {
            true => name == pattern,
            false => name.contains(pattern),
        }
    }

    fn keeps<Extra>(&self, meta: &TestMeta<Extra>) -> bool {
        let name = match meta.suite.is_root() {
            true => meta.name.to_string(),
            false => format!("{}::{}", meta.suite, meta.name),
        };

        let in_filter = self.filter.is_empty()
            || self.filter.iter().any(|filter| self.matches(&name, filter));
        let skipped = self.skip.iter().any(|skip| self.matches(&name, skip));
        in_filter && !skipped
    }
}

impl<Extra> TestFilter<Extra> for DefaultFilter {
    fn filter<'t>(
        &self,
        tests: &'t [Test<Extra>],
    ) -> FilteredTests<'t, impl ExactSizeIterator<Item = &'t Test<Extra>>, Extra> {
        let remaining: Vec<_> = tests.iter().filter(|test| self.keeps(&test.meta)).collect();
        FilteredTests {
            filtered_out: tests.len() - remaining.len(),
            tests: remaining.into_iter(),
        }
    }
}
