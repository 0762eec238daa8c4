//! Command-line tile fetcher.
//!
//! Configures a hybrid imagery layer from flags or a JSON file, requests every
//! quadcode given on the command line and writes each tile to
//! `{out}/{quadcode}.jpg` (`root.jpg` for the empty quadcode).

mod launch_params;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use globe_stream::{
    CallerId, HttpFetcher, LayerId, MemoryCache, RenderContext, Result, TileFetcher, TileOutcome,
    TileRequest, TileResponse, TokioSpawner, create_layer,
};
use launch_params::LaunchParams;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let params = match launch_params::parse() {
        Ok(params) => params,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(params).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            tracing::error!(failed, "some tiles could not be fetched");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Fetch every requested tile. Returns the number of tiles that failed.
async fn run(params: LaunchParams) -> Result<usize> {
    let mut layer = create_layer(&params.layer)?;

    let fetcher: Arc<dyn TileFetcher> = match params.cache_bytes {
        Some(bytes) => Arc::new(
            HttpFetcher::with_cache(MemoryCache::with_max_bytes(bytes))
                .with_retries(params.retries),
        ),
        None => Arc::new(HttpFetcher::new().with_retries(params.retries)),
    };
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let ctx = RenderContext::new(fetcher, Arc::new(spawner));

    tokio::fs::create_dir_all(&params.out)
        .await
        .map_err(|e| output_error(&params.out, &e))?;

    let mut failed = 0;
    let (tx, rx) = async_channel::unbounded();
    for (caller, quadcode) in (0u64..).zip(params.quadcodes) {
        if !layer.contains(&quadcode) {
            tracing::warn!(
                %quadcode,
                max_lod = layer.max_lod(),
                "tile is deeper than the layer serves"
            );
            failed += 1;
            continue;
        }
        layer.request_tile(
            &ctx,
            TileRequest::new(quadcode, LayerId(0), CallerId(caller)),
            tx.clone(),
        );
    }
    drop(tx);

    let mut written = 0;
    while let Ok(response) = rx.recv().await {
        match save(&params.out, response).await {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!("{e}");
                failed += 1;
            }
        }
    }

    tracing::info!(written, failed, out = %params.out.display(), "done");
    Ok(failed)
}

async fn save(out: &Path, response: TileResponse) -> Result<()> {
    let data = match response.outcome {
        TileOutcome::Ready(data) => data,
        TileOutcome::Failed(e) => return Err(e),
    };

    let name = if response.quadcode.is_empty() {
        "root"
    } else {
        response.quadcode.as_str()
    };
    let path = out.join(format!("{name}.jpg"));
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| output_error(&path, &e))?;

    tracing::info!(
        quadcode = %response.quadcode,
        bytes = data.len(),
        path = %path.display(),
        "saved tile"
    );
    Ok(())
}

fn output_error(path: &Path, e: &std::io::Error) -> globe_stream::Error {
    globe_stream::Error::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
