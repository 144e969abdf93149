//! `ocstream run`: wire the store, fleet, sink and admin API together and
//! run until interrupted or a session fails fatally.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ocstream_core::{CoreError, DeviceStore, FleetManager, GrpcDialer, InfluxClient, MetricSink};

use crate::admin::{self, AdminState};
use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = super::load_config(global)?;
    if let Some(listen) = args.listen {
        cfg.admin.listen = listen;
    }
    if args.no_admin {
        cfg.admin.enabled = false;
    }
    cfg.validate()?;

    let store: Arc<dyn DeviceStore> = Arc::new(super::open_store(global, &cfg));
    let devices = store.list()?;

    let influx = InfluxClient::new(cfg.influx_config()?).map_err(CoreError::from)?;
    info!(
        url = %influx.write_url(),
        database = influx.database(),
        devices = devices.len(),
        "starting collector"
    );

    let root = CancellationToken::new();
    let (records_tx, records_rx) = mpsc::channel(cfg.sink.queue_capacity);
    let sink = MetricSink::new(influx, cfg.sink.batch_size);
    let sink_task = tokio::spawn(sink.run(records_rx, root.clone()));

    let fleet = FleetManager::new(GrpcDialer, cfg.session_timing(), records_tx, root.clone());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let admin_task = if cfg.admin.enabled {
        let addr = cfg.listen_addr()?;
        let listener = TcpListener::bind(addr).await?;
        let state = AdminState {
            store: Arc::clone(&store),
            events: events_tx,
            fleet: fleet.clone(),
        };
        Some(tokio::spawn(admin::serve(listener, state, root.clone())))
    } else {
        drop(events_tx);
        None
    };

    let interrupt = root.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = interrupt.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    interrupt.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for interrupt"),
            },
        }
    });

    let result = fleet.run(devices, events_rx).await;
    root.cancel();

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => warn!(error = %e, "admin API stopped with error"),
            Err(e) => warn!(error = %e, "admin API task failed"),
            Ok(Ok(())) => {}
        }
    }
    if let Err(e) = sink_task.await {
        error!(error = %e, "metric sink task failed");
    }

    info!("collector stopped");
    result.map_err(CliError::from)
}
