//! Main application orchestration and execution

use crate::{
    cli::{Cli, MethodArg},
    config::{load_config, validate_config, EnvManager},
    continuous::{ConnectionState, ContinuousTestLoop},
    error::Result,
    models::Config,
    output::{render_snapshot_table, ConsoleSink},
    probe::{ProbeMethod, ProberRegistry},
    selection::{SelectionController, SelectionMode},
    session::SessionCoordinator,
    store::{MemoryStore, ProfileStore},
};
use std::sync::Arc;
use tokio::sync::watch;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        EnvManager::load_env_file(self.cli.debug)?;
        let config = load_config(&self.cli)?;

        let warnings = validate_config(&config)?;
        for warning in &warnings {
            eprintln!("{}", warning.format(config.enable_color));
        }

        if config.verbose {
            println!("proxy-node-selector v{}", crate::VERSION);
            println!(
                "Build: {} ({})",
                env!("BUILD_TIME"),
                option_env!("GIT_COMMIT").unwrap_or("unknown")
            );
        }

        let store = Arc::new(MemoryStore::from_json_file(&self.cli.profiles).await?);

        let method = match self.cli.method {
            MethodArg::Tcp => ProbeMethod::TcpPing,
            MethodArg::Url => ProbeMethod::UrlTest,
        };
        let registry = Arc::new(ProberRegistry::new(method, &config)?);

        let selection = Arc::new(SelectionController::new(SelectionMode::Auto));
        if let Some(profile_id) = self.cli.select {
            selection.select_manually(profile_id);
        }

        if self.cli.watch {
            self.run_watch(store, registry, selection, &config).await
        } else {
            self.run_once(store, registry, selection, &config).await
        }
    }

    /// One test round over the selected group, streamed to the terminal
    async fn run_once(
        &self,
        store: Arc<MemoryStore>,
        registry: Arc<ProberRegistry>,
        selection: Arc<SelectionController>,
        config: &Config,
    ) -> Result<()> {
        let coordinator = SessionCoordinator::new(store.clone(), registry, config);
        let sink = Arc::new(ConsoleSink::new(config.enable_color));

        let handle = coordinator
            .start_session(self.cli.group, config.concurrency, sink)
            .await?;

        // Ctrl-C turns into a cooperative cancel; in-flight probes finish
        // and partial results are kept
        let control = handle.control();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                control.cancel();
            }
        });

        let (state, snapshot) = handle.wait().await?;
        selection.on_round_complete(&snapshot);

        println!();
        print!("{}", render_snapshot_table(&snapshot, config.enable_color));
        println!();
        self.print_selection(&selection, &snapshot);

        if config.verbose {
            println!("Session finished: {}", state.name());
        }
        Ok(())
    }

    /// Continuous re-testing until interrupted
    async fn run_watch(
        &self,
        store: Arc<MemoryStore>,
        registry: Arc<ProberRegistry>,
        selection: Arc<SelectionController>,
        config: &Config,
    ) -> Result<()> {
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Connected);

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = connection_tx.send(ConnectionState::Disconnected);
            }
        });

        println!(
            "Watching {} nodes every {}s (ctrl-c to stop)",
            store.load_all().await?.len(),
            config.test_interval_secs
        );

        ContinuousTestLoop::new(store.clone(), registry, selection.clone(), connection_rx, config)
            .run()
            .await;

        let snapshot = store.load_all().await?;
        println!();
        print!("{}", render_snapshot_table(&snapshot, config.enable_color));
        println!();
        self.print_selection(&selection, &snapshot);
        Ok(())
    }

    fn print_selection(
        &self,
        selection: &SelectionController,
        snapshot: &[crate::models::ProfileRecord],
    ) {
        match selection.active_profile_id() {
            Some(id) => {
                let name = snapshot
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.display_name.as_str())
                    .unwrap_or("unknown");
                let mode = match selection.mode() {
                    SelectionMode::Auto => "auto",
                    SelectionMode::Manual => "manual",
                };
                println!("Selected node: {} (id {}, {})", name, id, mode);
            }
            None => println!("No node available for selection"),
        }
    }
}
