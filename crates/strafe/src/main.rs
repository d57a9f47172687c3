//! Standalone harness for the extension layer.
//!
//! Emulates the host it would normally live inside: a frame loop ticking the
//! bridge, and stdin standing in for rcon. Plugins load from the configured
//! directory exactly as they would in production.

mod cli;
mod config;
mod signals;

use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strafe_bridge::HostBridge;
use strafe_event_system::{
    register_builtin, spawn_worker, DispatcherRegistry, TaskQueue,
};
use strafe_plugin_system::{CommandRegistry, DylibLoader, PluginManager};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn setup_logging(settings: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    if let Some(path) = &settings.file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let writer = Arc::new(file);
        if settings.json_format {
            registry
                .with(fmt::layer().json().with_thread_names(true).with_writer(writer))
                .init();
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_thread_names(true)
                        .with_writer(writer),
                )
                .init();
        }
    } else if settings.json_format {
        registry
            .with(fmt::layer().json().with_thread_names(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_thread_names(true))
            .init();
    }
    Ok(())
}

/// Console commands driving the plugin lifecycle, owned by the harness
/// itself under the "core" identity.
fn register_admin_commands(
    commands: &Arc<CommandRegistry>,
    manager: &Arc<PluginManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    let m = manager.clone();
    commands.register("load", "core", move |inv| match inv.args.first() {
        Some(name) => match m.load(name) {
            Ok(()) => info!(plugin = %name, "loaded"),
            Err(e) => error!(plugin = %name, "load failed: {e}"),
        },
        None => info!("usage: load <plugin>"),
    })?;

    let m = manager.clone();
    commands.register("unload", "core", move |inv| match inv.args.first() {
        Some(name) => match m.unload(name) {
            Ok(()) => info!(plugin = %name, "unloaded"),
            Err(e) => error!(plugin = %name, "unload failed: {e}"),
        },
        None => info!("usage: unload <plugin>"),
    })?;

    let m = manager.clone();
    commands.register("reload", "core", move |inv| match inv.args.first() {
        Some(name) => match m.reload(name) {
            Ok(()) => info!(plugin = %name, "reloaded"),
            Err(e) => error!(plugin = %name, "reload failed: {e}"),
        },
        None => info!("usage: reload <plugin>"),
    })?;

    let m = manager.clone();
    commands.register("plugins", "core", move |_inv| {
        let loaded = m.loaded_plugins();
        if loaded.is_empty() {
            info!("no plugins loaded");
        }
        for (name, version) in loaded {
            info!(plugin = %name, version = %version, "loaded plugin");
        }
    })?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path)?;
    if let Some(plugin_dir) = args.plugin_dir {
        config.core.plugin_dir = plugin_dir.to_string_lossy().to_string();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;

    setup_logging(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config_path.display(),
        plugin_dir = %config.core.plugin_dir,
        "starting strafe extension layer"
    );

    let events = Arc::new(DispatcherRegistry::new());
    register_builtin(&events);
    let commands = Arc::new(CommandRegistry::new(config.core.command_prefix.clone()));
    let tasks = Arc::new(TaskQueue::new());
    info!(
        events = events.event_names().len(),
        prefix = commands.prefix(),
        "dispatchers registered"
    );

    let manager = Arc::new(PluginManager::new(
        events.clone(),
        commands.clone(),
        tasks.clone(),
        Box::new(DylibLoader::new(&config.core.plugin_dir)),
    ));
    register_admin_commands(&commands, &manager)?;
    let bridge = Arc::new(HostBridge::new(events, commands, tasks.clone()));

    match manager.load_preset(&config.core) {
        Ok(count) => info!(plugins = count, "preset plugins loaded"),
        Err(e) => error!("preset plugin loading failed: {e}"),
    }

    // The frame loop stands in for the host's per-frame callback.
    let running = Arc::new(AtomicBool::new(true));
    let frame_handle = {
        let bridge = bridge.clone();
        let running = running.clone();
        let tick = Duration::from_millis(config.tick_interval_ms);
        std::thread::Builder::new()
            .name("strafe-frame".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    bridge.on_frame();
                    std::thread::sleep(tick);
                }
            })?
    };

    // Stdin stands in for rcon. Lines are handed to the frame loop through
    // the task queue so commands run on the host thread like everything
    // else.
    {
        let bridge = bridge.clone();
        let tasks = tasks.clone();
        let _console = spawn_worker("console", move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let bridge = bridge.clone();
                tasks.defer(move || {
                    if !bridge.on_rcon(&line) {
                        warn!(input = %line, "unmatched console command");
                    }
                });
            }
        })?;
    }

    info!("running, press Ctrl+C to shut down");
    signals::wait_for_shutdown().await?;

    info!("shutting down");
    running.store(false, Ordering::SeqCst);
    let _ = frame_handle.join();

    for (name, _version) in manager.loaded_plugins() {
        if let Err(e) = manager.unload(&name) {
            error!(plugin = %name, "unload failed: {e}");
        }
    }
    info!("shutdown complete");
    Ok(())
}
