use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;

use patternworks::{
    CacheEvent, CacheObserver, FlyweightFactory, FlyweightRegistry, PatternworksConfig,
};

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl CacheObserver for RecordingObserver {
    fn on_event(&self, event: &CacheEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn police_database_scenario() {
    let observer = Arc::new(RecordingObserver::default());
    let factory = FlyweightFactory::with_observer(Arc::clone(&observer) as Arc<dyn CacheObserver>);
    factory.seed_all([
        ["Chevrolet", "Camaro2018", "pink"],
        ["Mercedes Benz", "C300", "black"],
        ["Mercedes Benz", "C500", "red"],
        ["BMW", "M5", "red"],
        ["BMW", "X6", "white"],
    ]);
    assert_eq!(factory.count(), 5);

    let m5 = factory.get(&["BMW", "M5", "red"]);
    assert_eq!(factory.count(), 5);
    assert_eq!(
        m5.operation(&["CL234IR", "James Doe"]),
        "shared (BMW, M5, red) and unique (CL234IR, James Doe) state"
    );

    let x1 = factory.get(&["BMW", "X1", "red"]);
    assert_eq!(factory.count(), 6);
    assert!(!Arc::ptr_eq(&m5, &x1));
    assert!(factory.keys().contains(&"BMWX1red".to_string()));

    let events = observer.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_hit());
    assert!(!events[1].is_hit());
}

#[test]
fn single_seed_scenario() {
    let factory = FlyweightFactory::with_states([["BMW", "M5", "red"]]);
    assert_eq!(factory.count(), 1);

    let first = factory.get(&["BMW", "M5", "red"]);
    let second = factory.get(&["BMW", "M5", "red"]);
    assert_eq!(factory.count(), 1);
    assert!(Arc::ptr_eq(&first, &second));

    let x1 = factory.get(&["BMW", "X1", "red"]);
    assert_eq!(factory.count(), 2);
    assert!(!Arc::ptr_eq(&first, &x1));
}

#[test]
fn count_grows_once_per_distinct_sequence() {
    let factory = FlyweightFactory::new();
    let sequences = [
        vec!["BMW", "M5", "red"],
        vec!["BMW", "M5", "blue"],
        vec!["BMW", "M5"],
        vec!["M5", "BMW", "red"],
        vec!["BMW", "M5", "red"],
        vec![],
    ];

    let mut seen = HashSet::new();
    for seq in &sequences {
        let before = factory.count();
        factory.get(seq);
        if seen.insert(seq.concat()) {
            assert_eq!(factory.count(), before + 1);
        } else {
            assert_eq!(factory.count(), before);
        }
    }
    assert_eq!(factory.count(), 5);
}

#[test]
fn concurrent_lookups_share_one_instance() {
    let factory = Arc::new(FlyweightFactory::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || factory.get(&["Mercedes Benz", "C500", "red"]))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(factory.count(), 1);
}

#[test]
fn factory_from_toml_config() {
    let config = PatternworksConfig::from_toml_str(
        r#"
        [flyweight]
        seed = [["BMW", "M5", "red"], ["BMW", "X6", "white"]]
        "#,
    )
    .unwrap();

    let factory = FlyweightFactory::from_config(&config.flyweight);
    assert_eq!(factory.keys(), vec!["BMWM5red", "BMWX6white"]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AnimalType {
    Cat,
    Dog,
}

impl fmt::Display for AnimalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cat => f.write_str("cat"),
            Self::Dog => f.write_str("dog"),
        }
    }
}

#[derive(Debug)]
struct Appearance {
    photos: usize,
    background: &'static str,
}

struct Animal {
    name: &'static str,
    kind: AnimalType,
}

fn appearance_for(
    registry: &FlyweightRegistry<AnimalType, Appearance>,
    kind: AnimalType,
) -> Arc<Appearance> {
    registry.get_or_insert_with(kind, || match kind {
        AnimalType::Cat => Appearance { photos: 1, background: "red" },
        AnimalType::Dog => Appearance { photos: 2, background: "blue" },
    })
}

#[test]
fn appearance_registry_shares_by_type() {
    let observer = Arc::new(RecordingObserver::default());
    let registry =
        FlyweightRegistry::with_observer(Arc::clone(&observer) as Arc<dyn CacheObserver>);

    let animals = [
        Animal { name: "Maine Coon", kind: AnimalType::Cat },
        Animal { name: "Sphynx", kind: AnimalType::Cat },
        Animal { name: "Bulldog", kind: AnimalType::Dog },
        Animal { name: "German shepherd", kind: AnimalType::Dog },
    ];

    let appearances: Vec<Arc<Appearance>> =
        animals.iter().map(|a| appearance_for(&registry, a.kind)).collect();

    assert!(Arc::ptr_eq(&appearances[0], &appearances[1]));
    assert!(Arc::ptr_eq(&appearances[2], &appearances[3]));
    assert!(!Arc::ptr_eq(&appearances[0], &appearances[2]));
    assert_eq!(appearances[3].photos, 2);
    assert_eq!(appearances[0].background, "red");
    assert_eq!(animals[3].name, "German shepherd");
    assert_eq!(registry.len(), 2);

    let misses: Vec<String> = observer
        .events()
        .iter()
        .filter(|e| !e.is_hit())
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(misses, vec!["cat", "dog"]);
}
