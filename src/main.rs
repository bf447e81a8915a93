//! mimic - Record Directory Tool
//!
//! Offline tooling over a record directory: scan and list records for a
//! map, inspect or delete a record file, and run a self-contained
//! record-then-replay simulation against the in-memory host.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use mimic_rs::{
    codec,
    config::{LoggingSettings, MimicConfig, SaveMode},
    host::MockHost,
    ActorId, Angles, MimicApp, MimicEvent, Vec3,
};
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage: mimic [--config <file>] [--dir <record dir>] <command>

Commands:
  scan <map>                       Count records for a map
  list <map> [category]            List records for a map, oldest first
  info <file> [--json]             Show a record header
  delete <file>                    Delete a record file
  simulate <map> [ticks] [name]    Record a scripted run and replay it on a proxy";

/// Header summary printed by `info`
#[derive(Serialize)]
struct RecordInfo<'a> {
    path: &'a Path,
    #[serde(flatten)]
    header: &'a mimic_rs::RecordHeader,
    corrections: usize,
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = take_option(&mut args, "--config")?.map(PathBuf::from);
    let record_dir = take_option(&mut args, "--dir")?.map(PathBuf::from);

    let mut config = match &config_path {
        Some(path) => MimicConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MimicConfig::load_or_default(),
    };
    if let Some(dir) = record_dir {
        config.storage.record_dir = Some(dir);
    }

    let _guard = init_logging(&config.logging);

    let Some(command) = args.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    match command.as_str() {
        "scan" => {
            let map = required(rest, 0, "map")?;
            let mut app = MimicApp::new(config)?;
            let count = app.catalog_mut().scan(map);
            println!("{} records for {}", count, map);
        }
        "list" => {
            let map = required(rest, 0, "map")?;
            let mut app = MimicApp::new(config)?;
            app.catalog_mut().scan(map);
            list(&app, rest.get(1).map(String::as_str));
        }
        "info" => {
            let path = PathBuf::from(required(rest, 0, "file")?);
            let json = rest.iter().any(|a| a == "--json");
            info(&path, json)?;
        }
        "delete" => {
            let path = PathBuf::from(required(rest, 0, "file")?);
            let mut app = MimicApp::new(config)?;
            if app.delete_record(&path) {
                println!("Deleted {}", path.display());
            } else {
                bail!("{} does not exist", path.display());
            }
        }
        "simulate" => {
            let map = required(rest, 0, "map")?;
            let ticks = match rest.get(1) {
                Some(t) => t.parse().with_context(|| format!("invalid tick count '{}'", t))?,
                None => 640,
            };
            let name = rest.get(2).map(String::as_str).unwrap_or("simulated");
            simulate(config, map, ticks, name)?;
        }
        "help" | "--help" | "-h" => println!("{}", USAGE),
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}

fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match &settings.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mimic.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Remove `--flag <value>` from `args`
fn take_option(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} requires a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn required<'a>(args: &'a [String], index: usize, what: &str) -> anyhow::Result<&'a str> {
    match args.get(index) {
        Some(arg) => Ok(arg),
        None => bail!("missing <{}>\n\n{}", what, USAGE),
    }
}

fn list(app: &MimicApp, category: Option<&str>) {
    let categories: Vec<&str> = match category {
        Some(c) => vec![c],
        None => app.list_categories().iter().map(String::as_str).collect(),
    };

    for category in categories {
        println!("[{}]", category);
        for path in app.list_records(category) {
            let Some(header) = app.catalog().header(path) else {
                continue;
            };
            let ended = chrono::DateTime::from_timestamp(i64::from(header.end_time), 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| header.end_time.to_string());
            println!(
                "  {:<24} {:>7} frames {:>3} bookmarks  {}  {}",
                header.name,
                header.frame_count,
                header.bookmarks.len(),
                ended,
                path.display()
            );
        }
    }
}

fn info(path: &Path, json: bool) -> anyhow::Result<()> {
    let record = codec::read_file(path, false)
        .with_context(|| format!("reading {}", path.display()))?;
    let info = RecordInfo {
        path,
        header: &record.header,
        corrections: record.corrections.len(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let header = &record.header;
    println!("Record:      {}", header.name);
    println!("Version:     {}", header.format_version);
    println!("Ended:       {}", header.end_time);
    println!("Start:       {} pitch {:.1} yaw {:.1}",
        header.initial_position, header.initial_angles.pitch, header.initial_angles.yaw);
    println!("Frames:      {}", header.frame_count);
    println!("Corrections: {}", info.corrections);
    for bookmark in &header.bookmarks {
        println!(
            "Bookmark:    '{}' at frame {} (correction {})",
            bookmark.name, bookmark.frame, bookmark.correction_index
        );
    }
    Ok(())
}

/// Record a scripted run on the mock host, then replay it on a proxy
fn simulate(mut config: MimicConfig, map: &str, ticks: usize, name: &str) -> anyhow::Result<()> {
    // Playback below reads the file straight back
    config.recording.save_mode = SaveMode::Inline;
    let recorder = ActorId(1);
    let proxy = ActorId(2);
    let group = config.proxy.group.clone();

    let mut host = MockHost::new(map).with_clock(chrono::Utc::now().timestamp() as i32);
    host.add_player(recorder)
        .set_velocity(Vec3::new(250.0, 0.0, 0.0))
        .set_angles(Angles::new(0.0, 90.0, 0.0));
    host.equip(recorder, "weapon_knife");
    host.add_proxy(proxy, &group);

    let mut app = MimicApp::new(config)?;
    let events = app.subscribe();

    app.start_recording(&host, recorder, name, "", None)?;
    for tick in 0..ticks {
        host.step(1.0 / 64.0);
        if tick == ticks / 4 {
            host.equip(recorder, "weapon_ak47");
        }
        if tick == ticks / 2 && tick > 0 {
            if let Some(actor) = host.actor_mut(recorder) {
                actor.set_velocity(Vec3::new(0.0, 250.0, 0.0));
            }
            app.save_bookmark(&host, recorder, "turn")?;
        }
        app.on_tick(&mut host, &[]);
    }
    let Some(path) = app.stop_recording(&mut host, recorder, true)? else {
        bail!("recording was not saved");
    };
    println!("Recorded {} ticks to {}", ticks, path.display());

    app.play_from_path(&host, proxy, &path, false)?;
    for _ in 0..ticks {
        app.on_tick(&mut host, &[]);
    }
    app.stop_mimic(proxy);

    for event in events.try_iter() {
        match event {
            MimicEvent::BookmarkReached { name, tick, .. } => {
                println!("Proxy reached bookmark '{}' at tick {}", name, tick)
            }
            MimicEvent::SaveFailed { error, .. } => println!("Save failed: {}", error),
            _ => {}
        }
    }

    if let (Some(a), Some(b)) = (host.actor(recorder), host.actor(proxy)) {
        println!("Recorder ended at {}", a.state.origin);
        println!("Proxy ended at    {}", b.state.origin);
    }
    Ok(())
}
