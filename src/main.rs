use sales_archive_lib::{input_loader, logger};
use sales_archive_lib::{
    Config, CsvRecordStore, DelayManager, HttpTransport, PageFetcher, QueryRunner, RecordStore,
    ResumeController, Retrying,
};

use std::error::Error;
use log::{info, warn, error};

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    info!("Starting sales archive fetcher...");

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    // 1. Load queries. An empty or unreadable list stops before any request.
    let queries = input_loader::load_queries(&config.input_path, &config.query_column).map_err(|e| {
        error!("{}", e);
        e
    })?;

    // 2. Load previous output for resume
    let mut store = CsvRecordStore::open(&config.output_path)?;

    // 3. Wire the engine
    let transport = Retrying::new(HttpTransport::new(&config)?, config.max_retries);
    let fetcher = PageFetcher::new(transport, config.api_url.clone(), config.index.clone());
    let delay = DelayManager::new(config.delay_seconds, config.delay_jitter_seconds);
    let runner = QueryRunner::new(fetcher, delay, config.page_size);
    let controller = ResumeController::new(runner, config.max_queries);

    // 4. Run
    let summary = controller.run(&queries, &mut store)?;

    info!("Queries in input: {}", summary.total_queries);
    info!("Already processed: {}", summary.already_processed);
    info!("Processed this run: {}", summary.processed.len());
    info!("Records fetched this run: {}", summary.records_fetched);
    info!("Total records in {:?}: {}", store.path(), store.records().len());
    if !summary.truncated.is_empty() {
        warn!(
            "{} queries ended early on a failed page and will not be retried: {}",
            summary.truncated.len(),
            summary.truncated.join("; ")
        );
    }
    if summary.remaining > 0 {
        info!("{} queries left for the next run (max_queries reached).", summary.remaining);
    }

    Ok(())
}
