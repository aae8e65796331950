//! Fetch command - run one request through the worker

use crate::cache::format_bytes;
use crate::cli::args::FetchArgs;
use crate::cli::commands::Host;
use crate::config::Config;
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Request, RequestMode, Response};
use crate::worker::FetchOutcome;
use console::style;
use tokio::fs;
use tracing::{debug, warn};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> PrecacheResult<()> {
    let host = Host::new(config)?;
    let request = build_request(&args)?;
    let (response, source) = fetch_through(&host, request).await?;

    print_summary(&response, &source);

    if let Some(path) = args.output {
        fs::write(&path, &response.body)
            .await
            .map_err(|e| PrecacheError::io(format!("writing {}", path.display()), e))?;
        println!("Saved body to {}", path.display());
    }

    Ok(())
}

/// Run a request through the serving worker, returning the response and
/// where it came from
pub(crate) async fn fetch_through(
    host: &Host,
    request: Request,
) -> PrecacheResult<(Response, String)> {
    let registration = host.serving_registration().await?;
    let worker = host.worker_for(&registration)?;
    debug!(
        "Dispatching {} {} to {}",
        request.method, request.url, registration.generation
    );

    Ok(match worker.handle_fetch(request.clone()).await {
        FetchOutcome::Respond(intercepted) => {
            // Wait so the cached copy exists before the process exits
            if let Some(handle) = intercepted.write_back {
                if let Err(e) = handle.await {
                    warn!("Write-back task failed: {}", e);
                }
            }
            (intercepted.response, intercepted.source.to_string())
        }
        FetchOutcome::Passthrough => {
            let response = host.network.fetch(&request).await?;
            (response, "passthrough".to_string())
        }
    })
}

fn build_request(args: &FetchArgs) -> PrecacheResult<Request> {
    let mut request = Request::parse(&args.url)?;
    request.method = args.method;
    if args.navigate {
        request = request.with_mode(RequestMode::Navigate);
    }
    for (name, value) in &args.headers {
        request = request.with_header(name, value);
    }
    Ok(request)
}

fn print_summary(response: &Response, source: &str) {
    let status = format!("{} {}", response.status, response.status_text);
    let status = if response.is_ok() {
        style(status).green()
    } else {
        style(status).yellow()
    };

    println!("{}", status);
    println!("{:<8} {}", style("source:").dim(), source);
    println!(
        "{:<8} {}",
        style("body:").dim(),
        format_bytes(response.body.len() as u64)
    );
    for (name, value) in response.headers.iter() {
        println!("  {}: {}", style(name).dim(), value);
    }
}
