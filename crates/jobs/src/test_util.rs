use once_cell::sync::Lazy;

pub static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        configure_tracing();
    }
});

fn configure_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, EnvFilter};
    let tree = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    let filter = EnvFilter::try_from_env("TEST_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
    let subscriber = tracing_subscriber::Registry::default()
        .with(filter)
        .with(tree);

    tracing::subscriber::set_global_default(subscriber).unwrap();
}

pub fn setup_test_tracing() {
    Lazy::force(&TRACING);
}

/// A stand-in for a long-running algorithm that only knows about plain callbacks. It does `n`
/// steps, reporting `i + 1` after each one, polls for cancellation before each step, and logs
/// about 15 times in all when given a log callback.
pub fn algo_mock_generic_callback(
    n: u64,
    progress: impl Fn(u64),
    should_cancel: impl Fn() -> bool,
    log: Option<&dyn Fn(&str)>,
) {
    let div = (n / 15).max(1);

    for i in 0..n {
        if should_cancel() {
            break;
        }

        if let Some(log) = log {
            if i % div == 0 {
                log(&format!("generic callback step {i}"));
            }
        }

        progress(i + 1);
    }
}
