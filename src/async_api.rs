use std::sync::mpsc::{self, Sender};
use std::thread;

use log::{info, warn};
use tokio::sync::oneshot;

use crate::cdp::CdpSession;
use crate::geometry::Size;
use crate::output::FsSink;
use crate::pipeline::{self, RunReport};
use crate::session::RenderSession;
use crate::{CaptureConfig, Error, Result};

enum Command {
    Run(Box<CaptureConfig>, oneshot::Sender<Result<RunReport>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Async front end for capture runs
///
/// A dedicated worker thread owns the browser session. Runs are queued on a
/// channel and served one at a time, so the session is never shared.
#[derive(Clone)]
pub struct CaptureService {
    cmd_tx: Sender<Command>,
}

impl CaptureService {
    /// Launch the browser on a worker thread
    ///
    /// `config` fixes the session-level settings (pixel ratio, timeout);
    /// later runs must use the same pixel ratio.
    pub async fn start(config: CaptureConfig) -> Result<Self> {
        let session_ratio = config.pixel_ratio()?;
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut session = match CdpSession::launch(&config) {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));
            info!("Capture worker ready");

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Run(run_config, resp) => {
                        let res = serve(&mut session, session_ratio, &run_config);
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(session.close());
                        return;
                    }
                }
            }
            // Every handle dropped without an explicit close
            if let Err(e) = session.close() {
                warn!("Failed to close browser: {}", e);
            }
        });

        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Capture worker exited during startup: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Queue a run and wait for its report
    pub async fn capture(&self, config: CaptureConfig) -> Result<RunReport> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Run(Box::new(config), tx))
            .map_err(|_| Error::InitializationError("Capture worker has stopped".to_string()))?;
        rx.await
            .map_err(|e| Error::InitializationError(format!("Capture canceled: {}", e)))?
    }

    /// Shut the worker down and close the browser
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::InitializationError(format!("Close canceled: {}", e)))?
    }
}

fn serve(session: &mut CdpSession, session_ratio: f64, config: &CaptureConfig) -> Result<RunReport> {
    config.validate()?;
    let ratio = config.pixel_ratio()?;
    if (ratio - session_ratio).abs() > 1e-9 {
        return Err(Error::ConfigError(format!(
            "Session runs at pixel ratio {} but {} was requested",
            session_ratio, ratio
        )));
    }
    session.set_viewport(Size {
        width: config.viewport.width as f64,
        height: config.viewport.height as f64,
    })?;
    let mut sink = FsSink::create(&config.output_dir)?;
    pipeline::run(session, config, &mut sink)
}
