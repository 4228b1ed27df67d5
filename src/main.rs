use std::time::Duration;

use hitprobe::config::Config;
use hitprobe::http::request::ProbeRequest;
use hitprobe::probe::{Probe, TextSink};
use hitprobe::transport::{self, Connector, ResolveConnectivity, TcpConnector, TlsConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level()?)
        .init();

    let request = cfg.request()?;
    tracing::info!(url = %request.url, "Probe starting");

    let probe = async move {
        if request.is_tls() {
            let tls = transport::tls::client_config(cfg.ca_file.as_deref())?;
            run(TlsConnector::new(tls, cfg.connect_timeout()), &cfg, request).await;
        } else {
            run(TcpConnector::new(cfg.connect_timeout()), &cfg, request).await;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        res = probe => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn run<C: Connector>(connector: C, cfg: &Config, request: ProbeRequest) {
    let connectivity =
        ResolveConnectivity::new(request.host(), request.port(), Duration::from_secs(1));
    let sink = TextSink::new(std::io::stdout(), cfg.strip.clone());
    let mut probe = Probe::new(connector, connectivity, sink, request, cfg.probe_settings());

    let stats = probe.run().await;
    tracing::info!(?stats, "Probe finished");
}
