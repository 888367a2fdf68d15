use roster::app;
use roster::schema;
use roster_config::Settings;
use roster_core::{MemorySessionStore, Server, SessionStore};
use roster_db::Database;
use roster_log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

fn main() -> ExitCode {
    roster_log::init();
    roster_log::install_log_bridge();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "roster::server", "Fatal: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;

    let mut db = Database::open(&app::db_config(&settings))?;
    schema::bootstrap(&mut db)?;
    drop(db);

    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(Duration::from_secs(
        settings.session.ttl_secs,
    )));
    let pipeline = Arc::new(app::build_pipeline(&settings, sessions));

    let server = Server::bind(
        settings.server.bind_addr(),
        pipeline,
        app::server_config(&settings),
    )?;
    info!(target: "roster::server", "Roster {} starting", env!("CARGO_PKG_VERSION"));
    server.serve()?;
    Ok(())
}
