use anyhow::Result;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use ruck_tracker_rs::api::HttpSessionApi;
use ruck_tracker_rs::checkpoint::JsonFileStore;
use ruck_tracker_rs::cheerleader::SilentCheerleader;
use ruck_tracker_rs::clock::SystemClock;
use ruck_tracker_rs::config::{CalorieMethod, TrackerConfig};
use ruck_tracker_rs::coordinator::{
    AggregatedSessionState, Coordinator, SessionCommand, SessionEvent,
};
use ruck_tracker_rs::sensors;
use ruck_tracker_rs::types::{UnitPreference, UserProfile};

#[derive(Parser, Debug)]
#[command(name = "ruck_tracker")]
#[command(about = "Ruck session tracker - simulated end-to-end session run", long_about = None)]
struct Args {
    /// Session duration in seconds before stop is issued
    #[arg(value_name = "SECONDS", default_value = "600")]
    duration: u64,

    /// Backend base URL
    #[arg(long, default_value = "http://localhost:8000/api")]
    base_url: String,

    /// Ruck weight carried, kg
    #[arg(long, default_value = "20.0")]
    ruck_weight_kg: f64,

    /// Body weight, kg
    #[arg(long, default_value = "80.0")]
    user_weight_kg: f64,

    /// Calorie method (met, mechanical, fused)
    #[arg(long, default_value = "fused")]
    calorie_method: String,

    /// Split units (metric, imperial)
    #[arg(long, default_value = "metric")]
    units: String,

    /// Directory for the crash-recovery checkpoint
    #[arg(long, default_value = "ruck_tracker_state")]
    checkpoint_dir: String,

    /// Per-request backend timeout, seconds
    #[arg(long, default_value = "10")]
    http_timeout: u64,
}

fn parse_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = TrackerConfig::default();
    config.calorie_method = match args.calorie_method.as_str() {
        "met" => CalorieMethod::Met,
        "mechanical" => CalorieMethod::Mechanical,
        "fused" => CalorieMethod::Fused,
        other => anyhow::bail!("unknown calorie method: {other}"),
    };
    config.units = match args.units.as_str() {
        "metric" => UnitPreference::Metric,
        "imperial" => UnitPreference::Imperial,
        other => anyhow::bail!("unknown units: {other}"),
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = parse_config(&args)?;

    info!("ruck tracker starting");
    info!("  duration: {}s", args.duration);
    info!("  backend: {}", args.base_url);
    info!(
        "  load: {}kg ruck on {}kg body",
        args.ruck_weight_kg, args.user_weight_kg
    );

    let api = Arc::new(HttpSessionApi::new(
        &args.base_url,
        Duration::from_secs(args.http_timeout),
    )?);
    let store = Arc::new(JsonFileStore::new(&args.checkpoint_dir)?);

    let (mut coordinator, handle) = Coordinator::new(
        config,
        Arc::new(SystemClock),
        api,
        store,
        Arc::new(SilentCheerleader),
    );

    let (feed_tx, feed_rx) = mpsc::channel(8);
    coordinator.set_feed_commands(feed_tx);

    let coordinator_handle = tokio::spawn(coordinator.run());
    let location_handle = tokio::spawn(sensors::location_loop(handle.events.clone(), feed_rx));
    let hr_handle = tokio::spawn(sensors::heart_rate_loop(handle.events.clone()));
    let ticker_handle = tokio::spawn(sensors::ticker_loop(handle.events.clone()));

    handle
        .events
        .send(SessionEvent::Command(SessionCommand::Start {
            ruck_weight_kg: args.ruck_weight_kg,
            profile: UserProfile::new(args.user_weight_kg),
            notes: None,
        }))
        .await?;

    let stop_events = handle.events.clone();
    let duration = args.duration;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(duration)).await;
        let _ = stop_events
            .send(SessionEvent::Command(SessionCommand::Stop))
            .await;
    });

    // Watch the aggregated state until the session reaches a terminal
    // state, printing a status line on every Running update.
    let mut state_rx = handle.state.clone();
    loop {
        if state_rx.changed().await.is_err() {
            break;
        }
        let state = state_rx.borrow().clone();
        match state {
            AggregatedSessionState::Initial => {}
            AggregatedSessionState::Loading => info!("creating session..."),
            AggregatedSessionState::Running(s) => {
                let pace = s
                    .pace_secs_per_unit
                    .map(|p| format!("{:.0}s/unit", p))
                    .unwrap_or_else(|| "--".to_string());
                info!(
                    "[{}] {:>5}s {:.3}km +{:.0}m/-{:.0}m pace {} {:.0}kcal hr {} gps_ready={}{}",
                    s.session_id,
                    s.elapsed_secs,
                    s.distance_km,
                    s.elevation_gain_m,
                    s.elevation_loss_m,
                    pace,
                    s.calories,
                    s.heart_rate
                        .latest
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "--".to_string()),
                    s.gps_ready,
                    if s.is_paused { " [paused]" } else { "" },
                );
            }
            AggregatedSessionState::Completed(summary) => {
                println!("\n=== Session complete ===");
                println!("id:        {}", summary.session_id);
                println!("distance:  {:.3} km", summary.distance_km);
                println!("duration:  {} s", summary.duration_secs);
                println!("calories:  {:.0} kcal", summary.calories);
                println!(
                    "elevation: +{:.0} m / -{:.0} m",
                    summary.elevation_gain_m, summary.elevation_loss_m
                );
                println!("splits:    {}", summary.splits.len());
                println!("steps:     {}", summary.steps);
                println!("synced:    {}", summary.synced);
                break;
            }
            AggregatedSessionState::Failure { message } => {
                eprintln!("session failed: {message}");
                break;
            }
        }
    }

    location_handle.abort();
    hr_handle.abort();
    ticker_handle.abort();
    coordinator_handle.abort();
    Ok(())
}
