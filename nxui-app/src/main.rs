use anyhow::Result;
use nxui_app::repl::Console;
use nxui_app::{bootstrap, logging, App, Config};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration in {}: {}", Config::default_path().display(), e);
        return Err(e);
    }
    logging::init(&config.log_filter);

    let seeded = bootstrap::prepare_widgets_dir(&config.widgets_dir)?;
    if seeded > 0 {
        println!("Installed demo widgets into {}", config.widgets_dir.display());
    }

    let app = App::start(&config).await?;
    println!(
        "NxUI running: {} widget(s) from {}. Type 'help' for commands.",
        app.manager().ids().len(),
        config.widgets_dir.display()
    );
    for (id, error) in &app.report().failed {
        eprintln!("  {id}: {error}");
    }

    let mut console = Console::new(app.router());
    tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin())) => {
            if let Err(e) = result {
                tracing::error!("Console input failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
        }
    }

    app.shutdown().await;
    Ok(())
}
