//! keelsh — an interactive client shell assembled from lifecycle-managed
//! features.

use keel::features::{
    ClientFeature, ConfigFeature, ConsoleFeature, LoggerFeature, ShellFeature, TempFeature,
};
use keel::ApplicationServer;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.suggestion() {
            eprintln!("\nHint: {}", hint);
        }
        std::process::exit(1);
    }
}

async fn run() -> keel::Result<()> {
    let mut server = ApplicationServer::builder()
        .name("keelsh")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interactive client shell assembled from lifecycle-managed features")
        .feature(LoggerFeature::descriptor(), Box::new(LoggerFeature::new()))
        .feature(ConfigFeature::descriptor(), Box::new(ConfigFeature::new()))
        .feature(TempFeature::descriptor(), Box::new(TempFeature::new()))
        .feature(ClientFeature::descriptor(), Box::new(ClientFeature::new()))
        .feature(ConsoleFeature::descriptor(), Box::new(ConsoleFeature::new()))
        .feature(ShellFeature::descriptor(), Box::new(ShellFeature::new()))
        .build()?;

    server.run(std::env::args().collect()).await
}
