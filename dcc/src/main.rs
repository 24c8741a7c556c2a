use clap::{Parser, Subcommand};
use dcc::*;
use dcc_broker::{AmqpChannel, PublishWorker, QueueOptions};
use dcc_store::{DedupRecorder, RedisStore};
use eyre::{Result, WrapErr};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Log filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "none,dcc=info,dcc_broker=info,dcc_store=info,dcc_utils=info";

#[derive(Parser)]
#[command(name = "dcc", version, about = "Signs compute tasks and queues them for delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP front door.
    Serve,
    /// Sign a task file and queue it.
    Submit {
        #[arg(long, help = "Path to the task JSON file")]
        task: PathBuf,
        #[arg(long, help = "Name of the key pair in the keys directory")]
        private_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();
    if let Err(e) = dotenv_result {
        log::warn!("could not load .env file: {}", e);
    }

    let cli = Cli::parse();
    let config = DccConfig::new()?;
    log::info!(
        "DCC v{} (signing: {}, keys: {})",
        DCC_VERSION,
        config.signing_scheme,
        config.keys.dir().display()
    );

    // the broker must be reachable before anything is accepted
    let channel = AmqpChannel::connect(&config.amqp_url)
        .await
        .wrap_err("could not connect to broker")?;
    let (worker, queue) = PublishWorker::new(Arc::new(channel), QueueOptions::default())
        .wrap_err("broker health check failed")?;

    // tasks are accepted without the dedup store, they are only left unrecorded
    let store = RedisStore::new(&config.redis_url).wrap_err("invalid dedup store URL")?;
    if let Err(err) = store.ping().await {
        log::warn!(
            "Dedup store is not reachable, tasks are not recorded until it is: {}",
            err
        );
    }
    let recorder = DedupRecorder::new(Arc::new(store));

    // the publisher has its own token, so that it outlives the HTTP server on shutdown
    let publisher = worker
        .with_shutdown_grace(config.shutdown_grace)
        .spawn(CancellationToken::new());

    let service = Arc::new(TaskService::new(
        queue,
        recorder,
        config.keys.clone(),
        config.signing_scheme,
    ));

    let result = match cli.command {
        Commands::Serve => serve(&config, service).await,
        Commands::Submit { task, private_key } => service
            .proceed_file(&task, &private_key)
            .await
            .map(|task| log::info!("Created task {}", task.id()))
            .wrap_err("could not create task"),
    };

    // drain whatever is buffered before the broker channel is closed
    let stats = publisher.stop().await?;
    log::info!(
        "Published {} messages ({} failed, {} abandoned)",
        stats.published,
        stats.failed,
        stats.abandoned
    );

    result?;
    log::info!("Bye!");
    Ok(())
}

/// Runs the HTTP server until a termination signal is received.
async fn serve(config: &DccConfig, service: Arc<TaskService>) -> Result<()> {
    let task_tracker = TaskTracker::new();
    let cancellation = CancellationToken::new();

    // spawn the background task to wait for termination signals
    let task_tracker_to_close = task_tracker.clone();
    let cancellation_token = cancellation.clone();
    tokio::spawn(async move {
        if let Err(err) = wait_for_termination(cancellation_token.clone()).await {
            log::error!("Error waiting for termination: {:?}", err);
            log::error!("Cancelling due to unexpected error.");
            cancellation_token.cancel();
        };

        // close tracker in any case
        task_tracker_to_close.close();
    });

    let listen_addr = config.listen_addr().await?;
    let listener = TcpListener::bind(listen_addr)
        .await
        .wrap_err_with(|| format!("could not listen on {}", listen_addr))?;
    let router = http::router(service, config.web_root.clone());

    log::info!("Spawning HTTP server thread.");
    let server = http::spawn_server(&task_tracker, listener, router, cancellation.clone());

    // wait for all tasks to finish
    task_tracker.wait().await;
    server
        .await
        .wrap_err("HTTP server task panicked")?
        .wrap_err("HTTP server failed")?;
    log::info!("All tasks have exited successfully.");

    Ok(())
}

/// Waits for various termination signals, and cancels the given token when the signal is received.
///
/// Handles Unix and Windows [target families](https://doc.rust-lang.org/reference/conditional-compilation.html#target_family).
async fn wait_for_termination(cancellation: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?; // Docker sends SIGTERM
        let mut sigint = signal(SignalKind::interrupt())?; // Ctrl+C sends SIGINT
        tokio::select! {
            _ = sigterm.recv() => log::warn!("Received SIGTERM"),
            _ = sigint.recv() => log::warn!("Received SIGINT"),
            _ = cancellation.cancelled() => return Ok(()),
        };

        cancellation.cancel();
    }

    #[cfg(windows)]
    {
        use tokio::signal::windows;

        let mut signal_c = windows::ctrl_c()?;
        let mut signal_break = windows::ctrl_break()?;
        let mut signal_close = windows::ctrl_close()?;
        let mut signal_shutdown = windows::ctrl_shutdown()?;

        tokio::select! {
            _ = signal_c.recv() => log::warn!("Received CTRL_C"),
            _ = signal_break.recv() => log::warn!("Received CTRL_BREAK"),
            _ = signal_close.recv() => log::warn!("Received CTRL_CLOSE"),
            _ = signal_shutdown.recv() => log::warn!("Received CTRL_SHUTDOWN"),
            _ = cancellation.cancelled() => return Ok(()),
        };

        cancellation.cancel();
    }

    #[cfg(not(any(unix, windows)))]
    {
        log::error!("No signal handling for this platform: {}", std::env::consts::OS);
        cancellation.cancel();
    }

    log::info!("Terminating the application...");

    Ok(())
}
