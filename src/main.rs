use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use plugcheck::devtools::{InstanceEditorModel, editor_instance_id};
use plugcheck::interactive::EDITOR_URI;
use plugcheck::plugin::{CatalogScanner, InstanceRegister, PluginScanner};
use plugcheck::timing::{ArpeggioGenerator, Chunk, ChunkSource};
use plugcheck::{DevTools, EngineUpdate, Navigator, Settings, WavSink, spawn_engine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.config.as_deref())
        .context("failed to load settings")?;

    match cli.command {
        Commands::Plugins => list_plugins(&settings),
        Commands::Chunks => dump_chunks(&settings),
        Commands::Play(args) => play(settings, args),
        Commands::InitConfig { path } => {
            Settings::default()
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote default settings to {}", path.display());
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Play a test arpeggio through audio plugins")]
struct Cli {
    /// Settings file (RON). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the plugin catalog.
    Plugins,
    /// Print every chunk of one arpeggio session.
    Chunks,
    /// Instantiate a plugin and render the arpeggio through it.
    Play(PlayArgs),
    /// Write the default settings file.
    InitConfig { path: PathBuf },
}

#[derive(Args)]
struct PlayArgs {
    /// Catalog index of the plugin to instantiate.
    #[arg(long)]
    plugin: usize,
    /// Output path for the rendered audio.
    #[arg(long, default_value = "arpeggio.wav")]
    out: PathBuf,
    /// Show the instance editor before playing.
    #[arg(long)]
    editor: bool,
}

fn list_plugins(settings: &Settings) -> Result<()> {
    let plugins = CatalogScanner::new(settings.plugins.clone()).scan();
    if plugins.is_empty() {
        println!("No plugins in the catalog.");
    }
    for (i, plugin) in plugins.iter().enumerate() {
        println!("{:>3}: {} [{}] {:?}", i, plugin.name, plugin.id, plugin.plugin_type);
    }
    Ok(())
}

fn print_chunk(chunk: &Chunk) {
    println!(
        "chunk [{}, {}) {} events",
        chunk.begin_tick,
        chunk.end_tick,
        chunk.len()
    );
    for (tick, event) in chunk.events() {
        println!("  [{tick:>6}] {event}");
    }
}

fn dump_chunks(settings: &Settings) -> Result<()> {
    let mut generator = ArpeggioGenerator::new(settings.arpeggio.clone())?;
    let init = generator.initialize()?;

    for event in &init.init_events {
        println!("init {event}");
    }
    for chunk in init.chunks.values() {
        print_chunk(chunk);
    }

    let mut tick = init.next_tick();
    while let Some(chunk) = generator.request(tick) {
        if let Some(offset) = generator.pitch_offset() {
            println!("pitch offset {offset:+}");
        }
        print_chunk(&chunk);
        tick = chunk.end_tick;
    }
    println!("stream closed at tick {tick}");
    Ok(())
}

fn play(settings: Settings, args: PlayArgs) -> Result<()> {
    let register = Arc::new(InstanceRegister::new());
    let navigator = Arc::new(Navigator::new());

    let editor_register = register.clone();
    navigator.register(EDITOR_URI, move |query| {
        let id = editor_instance_id(query)?;
        match InstanceEditorModel::load(&editor_register, id) {
            Some(model) => {
                println!("Editor: {} (instance {})", model.name, model.id);
                for (name, value) in &model.parameters {
                    println!("  {name:<12} {value}");
                }
            }
            None => println!("Editor: instance {id} not found"),
        }
        Ok(())
    });

    let engine = spawn_engine(
        settings.engine.clone(),
        Box::new(WavSink::new(&args.out, settings.engine.sample_rate)),
    );
    let tools = DevTools::new(
        &CatalogScanner::new(settings.plugins.clone()),
        register,
        engine,
        navigator,
        settings.arpeggio.clone(),
    );

    let id = tools.add_instance(args.plugin)?;
    if args.editor {
        tools.show_editor(id)?;
    }
    tools.play(id)?;

    loop {
        let update = tools
            .engine()
            .update_rx
            .recv_timeout(Duration::from_secs(60))
            .context("audio engine stopped responding")?;
        match update {
            EngineUpdate::ChunkReceived {
                begin_tick,
                end_tick,
            } => println!("chunk [{begin_tick}, {end_tick})"),
            EngineUpdate::StreamClosed => println!("stream closed"),
            EngineUpdate::Finished { frames } | EngineUpdate::Stopped { frames } => {
                println!(
                    "Rendered {} ({} frames) to {}",
                    tools.plugin_name(id)?,
                    frames,
                    args.out.display()
                );
            }
            EngineUpdate::Error { message } => bail!(message),
            EngineUpdate::PlaybackState { playing: false } => return Ok(()),
            EngineUpdate::PlaybackState { playing: true } => {}
        }
    }
}
