//! Town Simulation Runner
//!
//! Demo binary: builds a small rural town, runs a scripted day of agent
//! activity through the tick runner, and writes the action ledger (and
//! optionally a state snapshot) to disk.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sim_engine::{
    replay, ActionLedger, AgentIntent, EngineConfig, EngineResult, PoiRef, RouteResolver,
    ScriptedOracle, SimulationStore, TickRunner,
};
use sim_state::{
    AgentId, AgentProfile, Channel, ChannelConfig, ChannelId, ChannelStatus, ChannelTopology,
    Coordinate, PoiId, SimTime, Simulation, SimulationId, SimulationStatus, TickGranularity,
    TravelMode,
};

/// Command line arguments for the town simulation
#[derive(Parser, Debug)]
#[command(name = "town_sim")]
#[command(about = "Spatiotemporal agent simulation demo")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate (0 runs to the simulation's end)
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Tick granularity, e.g. "15m", "1h"
    #[arg(long, default_value = "15m")]
    granularity: TickGranularity,

    /// Path to a TOML engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path for the JSONL action ledger
    #[arg(long, default_value = "output/actions.jsonl")]
    ledger: PathBuf,

    /// Write a full state snapshot here when the run finishes
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("simulation failed: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> EngineResult<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path).map_err(|e| {
            sim_engine::EngineError::Configuration(e.to_string())
        })?,
        None => EngineConfig::default(),
    };
    config.clock.granularity = args.granularity;

    if let Some(dir) = args.ledger.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut store = SimulationStore::new(config.clone());
    let sim_id = SimulationId::new("town_demo");
    let start = SimTime::from_ymd_hms(2025, 6, 1, 6, 0, 0);
    let simulation = Simulation {
        simulation_id: sim_id.clone(),
        start_time: start,
        end_time: start.plus_seconds(16 * 3600),
        granularity: args.granularity,
        status: SimulationStatus::Created,
    };
    let clock_end = simulation.end_time;

    let context = store.create_simulation(simulation.clone())?;
    seed_town(context);
    store.start(&sim_id)?;

    let ledger = ActionLedger::new(&args.ledger)?;
    let mut runner = TickRunner::new(
        &simulation,
        &config,
        RouteResolver::offline(&config.routing),
        ledger,
        args.seed,
    );
    let mut oracle = demo_script();

    info!(
        simulation = %sim_id,
        seed = args.seed,
        granularity = %args.granularity,
        end = %clock_end,
        "starting run"
    );

    let mut ticks_run = 0u64;
    loop {
        if args.ticks > 0 && ticks_run >= args.ticks {
            break;
        }
        let context = store.context_mut(&sim_id)?;
        let Some(summary) = runner.run_tick(context, &mut oracle)? else {
            break;
        };
        ticks_run += 1;
        if summary.completed_routes > 0
            || summary.usages_applied > 0
            || summary.intents_executed > 0
        {
            info!(
                tick = summary.tick_index,
                now = %summary.now,
                routes = summary.completed_routes,
                exposures = summary.pass_by_exposures,
                usages = summary.usages_applied,
                intents = summary.intents_executed,
                "tick"
            );
        }
    }

    store.end(&sim_id, runner.clock().current, SimulationStatus::Completed)?;
    let context = store.context(&sim_id)?;
    info!(
        ticks = ticks_run,
        actions = runner.ledger().action_count(),
        visibility_rows = context.visibility.rows().count(),
        "run complete"
    );

    if let Some(path) = &args.snapshot {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let snapshot = replay::snapshot_context(context);
        replay::write_snapshot(path, &snapshot)?;
        info!(path = %path.display(), "snapshot written");
    }

    let mut ledger = runner.into_ledger();
    ledger.flush()?;
    Ok(())
}

/// A handful of households and places around a small rural town.
fn seed_town(context: &mut sim_engine::SimulationContext) {
    let homes = [
        ("agent_ames", 43.796, -70.155),
        ("agent_blake", 43.801, -70.163),
        ("agent_cole", 43.788, -70.148),
        ("agent_dunn", 43.810, -70.171),
        ("agent_estes", 43.792, -70.180),
        ("agent_frost", 43.805, -70.142),
    ];
    for (name, lat, lon) in homes {
        context.register_agent(AgentProfile {
            agent_id: AgentId::new(name),
            simulation_id: context.simulation.simulation_id.clone(),
            home: Coordinate::new(lat, lon),
            has_vehicle: true,
            age: None,
        });
    }

    let places = [
        ("poi_general_store", 43.799, -70.160, 1.0),
        ("poi_diner", 43.802, -70.158, 0.9),
        ("poi_library", 43.797, -70.165, 0.6),
        ("poi_town_hall", 43.800, -70.162, 0.5),
        ("poi_farm_stand", 43.815, -70.175, 0.8),
    ];
    for (id, lat, lon, weight) in places {
        context.register_poi(PoiRef {
            poi_id: PoiId::new(id),
            position: Coordinate::new(lat, lon),
            category_weight: weight,
        });
    }

    let sim = context.simulation.simulation_id.clone();
    let channels = [
        Channel {
            channel_id: ChannelId::new("ch_town_feed"),
            simulation_id: sim.clone(),
            name: "town bulletin".to_string(),
            topology: ChannelTopology::Feed,
            status: ChannelStatus::Active,
            config: ChannelConfig {
                adoption_probability: 0.5,
                ..ChannelConfig::default()
            },
            credibility: 0.7,
            latency_s: 1800,
            reach_cap: 20,
            tick_capacity: 40,
        },
        Channel {
            channel_id: ChannelId::new("ch_dm"),
            simulation_id: sim.clone(),
            name: "direct messages".to_string(),
            topology: ChannelTopology::Dm,
            status: ChannelStatus::Active,
            config: ChannelConfig {
                adoption_probability: 0.8,
                ..ChannelConfig::default()
            },
            credibility: 0.9,
            latency_s: 60,
            reach_cap: 1,
            tick_capacity: 16,
        },
        Channel {
            channel_id: ChannelId::new("ch_events"),
            simulation_id: sim,
            name: "community events".to_string(),
            topology: ChannelTopology::Event,
            status: ChannelStatus::Active,
            config: ChannelConfig {
                adoption_probability: 0.6,
                ..ChannelConfig::default()
            },
            credibility: 0.8,
            latency_s: 900,
            reach_cap: 10,
            tick_capacity: 20,
        },
    ];
    for channel in channels {
        // Seeded channels are statically valid.
        if let Err(e) = context.diffusion.create_channel(channel) {
            error!("bad seed channel: {}", e);
        }
    }
}

/// A scripted morning: errands, a post about the farm stand, and an
/// afternoon potluck.
fn demo_script() -> ScriptedOracle {
    let mut oracle = ScriptedOracle::new();
    oracle.schedule(
        2,
        AgentId::new("agent_ames"),
        AgentIntent::Travel {
            destination: Coordinate::new(43.799, -70.160),
            place: Some(PoiId::new("poi_general_store")),
            mode: TravelMode::Auto,
        },
    );
    oracle.schedule(
        3,
        AgentId::new("agent_blake"),
        AgentIntent::Travel {
            destination: Coordinate::new(43.802, -70.158),
            place: Some(PoiId::new("poi_diner")),
            mode: TravelMode::Bicycle,
        },
    );
    oracle.schedule(
        4,
        AgentId::new("agent_cole"),
        AgentIntent::Post {
            channel: ChannelId::new("ch_town_feed"),
            place_ref: Some(PoiId::new("poi_farm_stand")),
            entity_ref: None,
            message: "first strawberries of the season at the farm stand".to_string(),
        },
    );
    oracle.schedule(
        8,
        AgentId::new("agent_dunn"),
        AgentIntent::OrganizeEvent {
            channel: ChannelId::new("ch_events"),
            venue: PoiId::new("poi_town_hall"),
            message: "potluck at the town hall this evening".to_string(),
        },
    );
    oracle.schedule(
        10,
        AgentId::new("agent_estes"),
        AgentIntent::ProposeIdea {
            title: "weekly produce swap".to_string(),
        },
    );
    oracle
}
