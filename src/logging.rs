use log::LevelFilter;

/// Installs the process logger on stderr. `RUST_LOG` wins over `--debug`.
pub fn init(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    // reqwest/rustls are noisy at debug level
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_module("reqwest", LevelFilter::Info);
        builder.filter_module("rustls", LevelFilter::Warn);
    }

    builder.target(env_logger::Target::Stderr);
    let _ = builder.try_init();
}
