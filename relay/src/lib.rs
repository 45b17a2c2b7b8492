pub mod attempt;
pub mod candidates;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod metrics_defs;
pub mod normalize;
pub mod operation;
pub mod service;

#[cfg(test)]
pub(crate) mod testutils;

pub use config::BackendConfig;
pub use service::RelayService;

/// Serves the relay endpoint on the given listener.
pub async fn run(
    host: &str,
    port: u16,
    config: Option<BackendConfig>,
) -> Result<(), errors::RelayError> {
    let service = RelayService::new(config);
    shared::http::run_http_service(host, port, service).await
}
