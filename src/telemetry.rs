use tracing::level_filters::LevelFilter;

/// Install the global tracing subscriber. Call once per process.
pub fn init_tracing(max_level: LevelFilter) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(max_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
