use std::{borrow::Cow, process::Termination, time::Duration};

use cotest::{filter::DefaultFilter, prelude::*};
use tracing_subscriber::EnvFilter;

struct Pool {
    url: String,
}

async fn fetch(args: FixtureArgs, path: &'static str, millis: u64) -> Result<(), String> {
    let pool = args.get::<Pool>("pool").map_err(|err| err.to_string())?;
    tokio::time::sleep(Duration::from_millis(millis)).await;
    println!("fetched {}{path}", pool.url);
    Ok(())
}

fn fixtures() -> FixtureRegistry {
    FixtureRegistry::new()
        .with(FixtureDef::yielding("pool", FixtureScope::Suite, |_| {
            let pool = Pool {
                url: "http://localhost:8080".to_string(),
            };
            Ok((pool, || -> FixtureResult<()> {
                println!("pool closed");
                Ok(())
            }))
        }))
        .with(FixtureDef::new_async("token", FixtureScope::Function, |request| {
            let test = request.test().to_string();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                FixtureResult::Ok(format!("token-for-{test}"))
            }
        }))
}

fn tests() -> Vec<Test> {
    let http = |name: &'static str, path: &'static str, millis: u64| {
        Test::new(
            TestFnHandle::from_async(move |args| fetch(args, path, millis)),
            TestMeta {
                name: name.into(),
                suite: SuitePath::new("api::http"),
                concurrent: ConcurrentMark::group("http"),
                fixtures: Cow::Borrowed(&["pool", "token"]),
                ..TestMeta::default()
            },
        )
    };

    vec![
        http("users", "/users", 300),
        http("orders", "/orders", 200),
        http("health", "/health", 100),
        Test::new(
            TestFnHandle::from_async(|_| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }),
            TestMeta {
                name: "slow_report".into(),
                suite: SuitePath::new("api::reports"),
                concurrent: ConcurrentMark::anonymous().with_timeout(Duration::from_millis(500)),
                ..TestMeta::default()
            },
        ),
        Test::new(
            TestFnHandle::from_fn(|_| assert_eq!(40 + 2, 42)),
            TestMeta {
                name: "arithmetic".into(),
                suite: SuitePath::new("api"),
                ..TestMeta::default()
            },
        ),
    ]
}

fn main() -> impl Termination {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let filter: Vec<String> = std::env::args().skip(1).collect();
    let tests = tests();
    let report = harness(&tests)
        .with_fixtures(fixtures())
        .with_filter(DefaultFilter::new(filter))
        .run();

    match report {
        Ok(report) => report.exit_code(),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
