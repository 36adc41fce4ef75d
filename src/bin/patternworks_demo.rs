use std::env;
use std::sync::Arc;
use std::time::Duration;

use patternworks::logging::init_logging;
use patternworks::{
    DelayedTaskQueue, FlyweightFactory, LoggingAutomation, PatternResult, PatternworksConfig,
    Shortcut, ShortcutDispatcher,
};
use tracing::info;

const DEFAULT_SEED: [[&str; 3]; 5] = [
    ["Chevrolet", "Camaro2018", "pink"],
    ["Mercedes Benz", "C300", "black"],
    ["Mercedes Benz", "C500", "red"],
    ["BMW", "M5", "red"],
    ["BMW", "X6", "white"],
];

fn main() {
    init_logging("info,patternworks=debug");

    if let Err(err) = run() {
        eprintln!("patternworks-demo: {err}");
        std::process::exit(1);
    }
}

fn run() -> PatternResult<()> {
    let config = match env::args().nth(1) {
        Some(path) => PatternworksConfig::load(path)?,
        None => PatternworksConfig::default(),
    };

    police_database(&config);
    leave_home_and_work(&config)
}

fn police_database(config: &PatternworksConfig) {
    let factory = if config.flyweight.seed.is_empty() {
        FlyweightFactory::with_states(DEFAULT_SEED)
    } else {
        FlyweightFactory::from_config(&config.flyweight)
    };
    info!(count = factory.count(), keys = ?factory.keys(), "flyweights seeded");

    for (plates, owner, model) in [("CL234IR", "James Doe", "M5"), ("CL234IR", "James Doe", "X1")] {
        let state = factory.get(&["BMW", model, "red"]);
        info!(entry = %state.operation(&[plates, owner]), "adding a car to the database");
    }

    info!(count = factory.count(), keys = ?factory.keys(), "flyweights after lookups");
}

fn leave_home_and_work(config: &PatternworksConfig) -> PatternResult<()> {
    let queue = Arc::new(DelayedTaskQueue::new(config.queue.clone())?);
    let dispatcher = ShortcutDispatcher::new(Arc::clone(&queue), Arc::new(LoggingAutomation));

    let home = dispatcher.perform(Shortcut::LeaveHome, Duration::ZERO)?;
    let work = dispatcher.perform(Shortcut::LeaveWork, Duration::from_secs(3))?;
    dispatcher.cancel(Shortcut::LeaveWork);

    for handle in home.iter().chain(work.iter()) {
        let status = handle.wait();
        info!(category = handle.category(), status = %status, "command settled");
    }
    Ok(())
}
