use clap::Parser;

use crate::config::AppConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "notes-api")]
#[command(about = "Notes REST backend with token authentication")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "Address to bind (overrides HOST)")]
    pub host: Option<String>,

    #[arg(long, help = "Port to listen on (overrides PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Use the in-memory store even if DATABASE_URL is set")]
    pub in_memory: bool,

    #[arg(long, help = "Create the database schema before serving")]
    pub migrate: bool,
}

impl Cli {
    /// Flags win over environment variables.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.api.host = host.clone();
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if self.in_memory {
            config.database.url = None;
        }
        if self.migrate {
            config.database.auto_migrate = true;
        }
    }
}
