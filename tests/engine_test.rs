// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Behaviour of the engine as seen through the access facade

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_plc_honeypot::access::{AccessFacade, ChannelEventSink, Operation};
use rust_plc_honeypot::scenario::ScenarioDefinition;
use rust_plc_honeypot::simulation::{
    advance_all, CellAddress, CellValue, RegisterStore, S7Area, SimulationEngine,
};
use rust_plc_honeypot::SimulationError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn scenario(json: &str) -> Arc<ScenarioDefinition> {
    Arc::new(ScenarioDefinition::from_json(json).unwrap())
}

fn plant() -> Arc<ScenarioDefinition> {
    scenario(
        r#"{"name": "plant", "modbus": {
            "registers": [
                {"addr": 0, "wave": "sine", "min": 0, "max": 100, "period": 60},
                {"addr": 1, "wave": "sawtooth", "min": 0, "max": 10, "period": 10},
                {"addr": 2, "wave": "counter", "max": 5},
                {"addr": 3, "wave": "random_walk", "min": 0, "max": 100, "step": 5}
            ],
            "coils": [{"addr": 0, "wave": "square", "on": 5, "off": 5}]
        }}"#,
    )
}

#[test]
fn test_time_pure_values_at_known_instants() {
    let store = RegisterStore::from_scenario(&plant(), 11).unwrap();
    let sine = CellAddress::holding_register(0);
    let saw = CellAddress::holding_register(1);
    let at = |address: &CellAddress, secs: u64| {
        store
            .read_at(address, Duration::from_secs(secs))
            .unwrap()
            .as_f64()
    };

    // WORD cells land exactly on the analytic values
    assert_eq!(at(&sine, 0), 0.0);
    assert_eq!(at(&sine, 15), 50.0);
    assert_eq!(at(&sine, 30), 100.0);
    assert_eq!(at(&sine, 60), 0.0);
    assert_eq!(at(&saw, 3), 3.0);
    assert_eq!(at(&saw, 10), 0.0);
}

#[test]
fn test_counter_sequence_over_ticks() {
    let store = RegisterStore::from_scenario(&plant(), 11).unwrap();
    let counter = CellAddress::holding_register(2);
    let mut rng = StdRng::seed_from_u64(11);
    let mut seen = Vec::new();
    for tick in 1..=7 {
        advance_all(&store, Duration::from_secs(tick), &mut rng);
        seen.push(store.read(&counter).unwrap().as_f64() as i64);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 0]);
}

#[test]
fn test_random_walk_bounds_over_long_run() {
    let store = RegisterStore::from_scenario(&plant(), 11).unwrap();
    let walk = CellAddress::holding_register(3);
    let mut rng = StdRng::seed_from_u64(99);
    let mut previous = store.read(&walk).unwrap().as_f64();
    for tick in 1..=2000 {
        advance_all(&store, Duration::from_secs(tick), &mut rng);
        let value = store.read(&walk).unwrap().as_f64();
        assert!((0.0..=100.0).contains(&value));
        assert!((value - previous).abs() <= 5.0);
        previous = value;
    }
}

#[test]
fn test_override_beats_simulation_until_cleared() {
    let store = RegisterStore::from_scenario(&plant(), 11).unwrap();
    let counter = CellAddress::holding_register(2);
    let mut rng = StdRng::seed_from_u64(1);

    store.write(&counter, CellValue::Integer(42), "attacker").unwrap();
    assert_eq!(store.read(&counter).unwrap(), CellValue::Integer(42));
    for tick in 1..=3 {
        advance_all(&store, Duration::from_secs(tick), &mut rng);
    }
    assert_eq!(store.read(&counter).unwrap(), CellValue::Integer(42));

    store.clear_override(&counter).unwrap();
    // the counter kept running underneath
    assert_eq!(store.read(&counter).unwrap(), CellValue::Integer(2));
}

#[test]
fn test_concurrent_readers_and_writers() {
    let store = Arc::new(RegisterStore::from_scenario(&plant(), 11).unwrap());
    let handles: Vec<_> = (0..8u16)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let address = CellAddress::holding_register(worker % 4);
                for i in 0..500i64 {
                    store
                        .write(&address, CellValue::Integer(i), &format!("worker-{}", worker))
                        .unwrap();
                    let value = store.read(&address).unwrap().as_f64();
                    assert!((0.0..500.0).contains(&value));
                }
            })
        })
        .collect();
    let mut rng = StdRng::seed_from_u64(5);
    for tick in 1..=100 {
        advance_all(&store, Duration::from_secs(tick), &mut rng);
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[tokio::test]
async fn test_write_then_read_through_facade() {
    let engine = Arc::new(SimulationEngine::new(Duration::from_millis(50), Some(1)));
    engine.load(plant()).await.unwrap();
    let (sink, mut events) = ChannelEventSink::channel();
    let facade = AccessFacade::new(Arc::clone(&engine), Arc::new(sink));

    facade.write_holding_register(0, 42, "10.0.0.5:51000").unwrap();
    assert_eq!(facade.read_holding_register(0, "10.0.0.5:51000").unwrap(), 42);

    let write = events.recv().await.unwrap();
    assert_eq!(write.operation, Operation::Write);
    assert_eq!(write.address, 0);
    assert_eq!(write.value, CellValue::Integer(42));
    let read = events.recv().await.unwrap();
    assert_eq!(read.operation, Operation::Read);

    let status = facade
        .cell_status(CellAddress::holding_register(0))
        .unwrap();
    assert_eq!(status.override_value.unwrap().source, "10.0.0.5:51000");

    assert_eq!(
        facade.read_holding_register(99, "peer").unwrap_err(),
        SimulationError::UnknownAddress(CellAddress::holding_register(99))
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_scenario() {
    let engine = Arc::new(SimulationEngine::new(Duration::from_millis(50), Some(1)));
    engine.load(plant()).await.unwrap();
    let store = engine.store().unwrap();
    store
        .write(&CellAddress::coil(0), CellValue::Bool(true), "test")
        .unwrap();

    let duplicate = scenario(
        r#"{"name": "dup", "modbus": {"coils": [
            {"addr": 0, "wave": "fixed", "value": true},
            {"addr": 0, "wave": "fixed", "value": false}
        ]}}"#,
    );
    assert!(matches!(
        engine.load(duplicate).await,
        Err(SimulationError::ScenarioConfig(_))
    ));
    assert_eq!(engine.scenario().unwrap().name, "plant");
    assert!(Arc::ptr_eq(&engine.store().unwrap(), &store));
    assert!(store.override_of(&CellAddress::coil(0)).unwrap().is_some());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_reload_swaps_store_and_drops_overrides() {
    let engine = Arc::new(SimulationEngine::new(Duration::from_millis(20), Some(1)));
    engine.load(plant()).await.unwrap();
    let first = engine.store().unwrap();
    first
        .write(&CellAddress::holding_register(2), CellValue::Integer(42), "test")
        .unwrap();

    let s7 = scenario(
        r#"{"name": "s7", "s7": {"db": {"1": [{"addr": 0, "type": "DINT", "wave": "counter"}]}}}"#,
    );
    engine.load(s7).await.unwrap();
    let second = engine.store().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.scenario_name(), "s7");
    assert!(matches!(
        second.read(&CellAddress::holding_register(2)),
        Err(SimulationError::UnknownAddress(_))
    ));

    // the new scheduler drives the new store
    tokio::time::sleep(Duration::from_millis(200)).await;
    let ticks = second
        .read(&CellAddress::s7(S7Area::Db(1), 0))
        .unwrap()
        .as_f64();
    assert!(ticks >= 1.0);

    engine.shutdown().await;
    assert!(matches!(engine.store(), Err(SimulationError::NoActiveScenario)));
}
