//! `plotterctl`: compiles an SVG file to a plot-command stream and runs it
//! on a connected GRBL plotter. Run with no arguments to list detected
//! ports instead of plotting.

use plotter_core::executor::{ExecutorConfig, ExecutorError, PaperSize};
use plotter_core::machines::grbl::GrblError;
use plotter_core::transport::{self, native, OpenOptions};
use plotter_core::{svg_to_commands, CompileOptions};
use plotter_core::{GrblProtocol, PlotExecutor};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(svg_path) = args.next() else {
        list_ports()?;
        return Ok(());
    };
    let port_path = args.next();

    let svg_text = std::fs::read_to_string(&svg_path)?;
    let commands = svg_to_commands(&svg_text, CompileOptions::default())?;
    info!(count = commands.len(), "compiled plot commands");

    let connection = transport::open(port_path, OpenOptions::default()).await?;
    let grbl = Arc::new(GrblProtocol::new(connection));
    grbl.initialize().await?;

    let executor = PlotExecutor::new(Arc::clone(&grbl), ExecutorConfig::for_paper(PaperSize::A4));
    let mut progress = executor.subscribe_progress();
    tokio::spawn(async move {
        while let Ok(update) = progress.recv().await {
            let state = update.state;
            info!(?state, index = update.current_index, total = update.total, "progress");
        }
    });

    match executor.run(&commands).await {
        Ok(true) => info!("plot completed"),
        Ok(false) => info!("plot cancelled"),
        Err(ExecutorError::Grbl(GrblError::Alarm { code, position })) => {
            error!(?code, ?position, "plot stopped by controller alarm");
        }
        Err(e) => error!(error = %e, "plot failed"),
    }

    Ok(())
}

fn list_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = native::enumerate_ports()?;
    if ports.is_empty() {
        println!("no serial ports detected");
    }
    for port in ports {
        println!("{}  {}", port.path, port.description.as_deref().unwrap_or("(unknown device)"));
    }
    println!("usage: plotterctl <svg-file> [port-path]");
    Ok(())
}
