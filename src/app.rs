use crate::completion::{CompletionClient, OpenAiClient};
use crate::config::{AppConfig, HTTPConfig, API_KEY_VARIABLE};
use crate::http::create_app;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct AppHandles {
    server: JoinHandle<Result<()>>,
}
impl AppHandles {
    pub fn new(config: AppConfig) -> AppHandles {
        if config.completion.api_key.is_none() {
            warn!("{API_KEY_VARIABLE} is not set, every reply will use the fallback text!");
        }
        info!(
            "Relaying completions to {} using model {}",
            config.completion.endpoint, config.completion.model
        );

        let completion: Arc<dyn CompletionClient> =
            Arc::new(OpenAiClient::new(&config.completion));
        let app = create_app(&config, completion);

        let server = Self::start_http_server(config.http, app);
        AppHandles { server }
    }

    /// Runs until the server exits or Ctrl-C is received.
    pub async fn run(self) -> Result<()> {
        let mut server = self.server;
        tokio::select! {
            result = &mut server => match result {
                Ok(Ok(())) => {
                    error!("HTTP server task completed!");
                    Ok(())
                }
                Ok(Err(e)) => Err(e),
                Err(e) => Err(e).context("HTTP server task failed"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received, stopping HTTP server");
                server.abort();
                Ok(())
            }
        }
    }

    fn start_http_server(config: HTTPConfig, app: axum::Router) -> JoinHandle<Result<()>> {
        let address = config.address;
        tokio::spawn(async move {
            match config.tls {
                Some(_tls_config) => {
                    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
                    {
                        info!("Starting HTTPS (secure) server on {address}");

                        #[cfg(feature = "tls-rustls")]
                        {
                            let _ = rustls::crypto::CryptoProvider::install_default(
                                rustls::crypto::aws_lc_rs::default_provider(),
                            );
                            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            )
                            .await
                            .context("Failed to load rustls TLS certificates")?;
                            axum_server::bind_rustls(address, tls)
                                .serve(app.into_make_service())
                                .await
                                .with_context(|| format!("HTTPS server on {address} failed"))
                        }

                        #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                        {
                            let tls = axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            )
                            .context("Failed to load openssl TLS certificates")?;
                            axum_server::bind_openssl(address, tls)
                                .serve(app.into_make_service())
                                .await
                                .with_context(|| format!("HTTPS server on {address} failed"))
                        }
                    }

                    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                    Err(anyhow::anyhow!(
                        "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                    ))
                }
                None => {
                    info!("Starting HTTP (insecure) server on {address}");
                    axum_server::bind(address)
                        .serve(app.into_make_service())
                        .await
                        .with_context(|| format!("HTTP server on {address} failed"))
                }
            }
        })
    }
}
