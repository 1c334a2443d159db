use std::{
    borrow::Cow,
    io,
    sync::{Arc, Mutex},
};

use cotest::{
    RunReport,
    fixture::{FixtureArgs, FixtureRegistry},
    harness,
    reporter::{NoReporter, color::SupportsColor},
    test::{ConcurrentMark, SuitePath, Test, TestFnHandle, TestMeta, TestResult},
};
use tracing_subscriber::EnvFilter;

mod fixtures;
mod grouping;
mod reporting;

#[derive(Debug, Default, Clone)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("poison error"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SupportsColor for Buffer {
    fn supports_color(&self) -> bool {
        false
    }
}

impl Buffer {
    fn contents(&self) -> String {
        let guard = self.0.lock().unwrap();
        String::from_utf8(guard.to_vec()).unwrap()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn meta(
    name: &'static str,
    suite: &'static str,
    concurrent: ConcurrentMark,
    fixtures: &'static [&'static str],
) -> TestMeta {
    TestMeta {
        name: name.into(),
        suite: SuitePath::new(suite),
        concurrent,
        fixtures: Cow::Borrowed(fixtures),
        ..TestMeta::default()
    }
}

/// A passing async member of `group`.
fn member(
    name: &'static str,
    suite: &'static str,
    group: &'static str,
    fixtures: &'static [&'static str],
) -> Test {
    Test::new(
        TestFnHandle::from_async(|_| async {}),
        meta(name, suite, ConcurrentMark::group(group), fixtures),
    )
}

fn member_with<F, Fut>(
    name: &'static str,
    group: &'static str,
    fixtures: &'static [&'static str],
    body: F,
) -> Test
where
    F: Fn(FixtureArgs) -> Fut + 'static,
    Fut: Future<Output = TestResult> + 'static,
{
    Test::new(
        TestFnHandle::from_async(body),
        meta(name, "mod", ConcurrentMark::group(group), fixtures),
    )
}

fn plain(name: &'static str, suite: &'static str) -> Test {
    Test::new(
        TestFnHandle::from_fn(|_| ()),
        meta(name, suite, ConcurrentMark::Sequential, &[]),
    )
}

fn run(tests: &[Test], fixtures: FixtureRegistry) -> RunReport<()> {
    init_tracing();
    harness(tests)
        .with_fixtures(fixtures)
        .with_reporter(NoReporter)
        .run()
        .expect("run should not end early")
}
