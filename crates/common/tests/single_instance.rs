//! Integration tests for single-instance election and argument relay
//!
//! Threads stand in for separate launches sharing one in-memory session.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use serial_test::serial;

use ::common::events::UiEvent;
use ::common::instance::memory::MemoryHost;
use ::common::instance::{Coordinator, CoordinationError, InstanceNames, InstanceState, Role};
use ::common::relay::CopyDataReceiver;

use self::common::{config_text, TestEnv};

#[test]
fn test_exactly_one_launch_is_elected() {
    const LAUNCHES: usize = 8;
    let host = MemoryHost::new();
    let barrier = Arc::new(Barrier::new(LAUNCHES));

    let handles: Vec<_> = (0..LAUNCHES)
        .map(|_| {
            let host = host.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let coordinator = Coordinator::new(host.session(None), InstanceNames::default());
                barrier.wait();
                match coordinator.start(vec!["exe".to_string()], |_, _| Ok(())) {
                    Ok(role) => {
                        let state = role.state();
                        // hold the role until every launch has decided
                        barrier.wait();
                        state
                    }
                    Err(CoordinationError::ElectedNotFound) => {
                        barrier.wait();
                        InstanceState::Relay
                    }
                    Err(e) => panic!("unexpected coordination error: {}", e),
                }
            })
        })
        .collect();

    let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let elected = states
        .iter()
        .filter(|s| **s == InstanceState::Elected)
        .count();
    assert_eq!(elected, 1);
    assert_eq!(states.len() - elected, LAUNCHES - 1);
    assert!(!host.is_held(&InstanceNames::default().mutex));
}

#[test]
#[serial]
fn test_relayed_launches_reach_elected_queue_in_order() {
    let env = TestEnv::new();
    let host = MemoryHost::new();
    let names = InstanceNames::default();
    let receiver: Arc<dyn CopyDataReceiver> = env.controller.clone();

    let first = Coordinator::new(host.session(Some(receiver)), names.clone());
    let controller = env.controller.clone();
    let role = first
        .start(vec!["exe".to_string()], |_, args| {
            controller.submit(args);
            Ok(())
        })
        .unwrap();
    assert_eq!(role.state(), InstanceState::Elected);

    let mut configs = Vec::new();
    for (index, point) in ["A:", "B:", "C:"].iter().enumerate() {
        let cfg = env.write_config(&format!("cfg{}.mfcfg", index), &config_text(point));
        let relay = Coordinator::new(host.session(None), names.clone());
        let outcome = relay
            .start(vec![String::new(), cfg.to_string_lossy().into_owned()], |_, _| {
                panic!("relay must not initialise an endpoint")
            })
            .unwrap();
        assert!(matches!(outcome, Role::Relay { delivered: true }));
        configs.push(cfg);
    }

    env.pump();

    let mounts = env.controller.manager().list_mounts().unwrap();
    let paths: Vec<_> = mounts.into_iter().filter_map(|m| m.config_path).collect();
    assert_eq!(paths, configs);
    assert!(env.shell.error_messages().is_empty());
}

#[test]
#[serial]
fn test_second_launch_with_config_mounts_in_first() {
    let env = TestEnv::new();
    let host = MemoryHost::new();
    let names = InstanceNames::default();
    let receiver: Arc<dyn CopyDataReceiver> = env.controller.clone();

    let role = Coordinator::new(host.session(Some(receiver)), names.clone())
        .start(vec!["exe".to_string()], |_, _| Ok(()))
        .unwrap();

    let cfg = env.write_config("cfg.mfcfg", &config_text("M:"));
    let relay_args = ::common::relay::absolutize_args(["", "cfg.mfcfg"], env.dir.path());
    assert_eq!(relay_args[1], cfg.to_string_lossy());

    let relay = Coordinator::new(host.session(None), names.clone())
        .start(relay_args, |_, _| Ok(()))
        .unwrap();
    assert!(matches!(relay, Role::Relay { delivered: true }));

    assert_eq!(env.events.try_recv(), Some(UiEvent::DrainArgs));
    env.controller.handle(UiEvent::DrainArgs);
    env.pump();

    let mounts = env.controller.manager().list_mounts().unwrap();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].config_path.as_ref(), Some(&cfg));
    drop(role);
}

#[test]
fn test_relay_without_ready_instance_fails() {
    let host = MemoryHost::new();
    let names = InstanceNames::default();

    // mutex held but no endpoint published yet
    let first = host.session(None);
    let guard = {
        use ::common::instance::{Acquired, SessionBackend};
        match first.acquire(&names.mutex).unwrap() {
            Acquired::Owned(guard) => guard,
            Acquired::Existing => panic!("mutex should be free"),
        }
    };

    let err = Coordinator::new(host.session(None), names.clone())
        .start(vec![String::new()], |_, _| Ok(()))
        .err()
        .unwrap();
    assert!(matches!(err, CoordinationError::ElectedNotFound));
    drop(guard);
}

#[test]
fn test_malformed_relay_is_not_handled() {
    let host = MemoryHost::new();
    let names = InstanceNames::default();
    let env = TestEnv::new();
    let receiver: Arc<dyn CopyDataReceiver> = env.controller.clone();
    let _role = Coordinator::new(host.session(Some(receiver)), names.clone())
        .start(Vec::new(), |_, _| Ok(()))
        .unwrap();

    let sender = host.session(None);
    let target = {
        use ::common::instance::SessionBackend;
        sender.find(&names.class, &names.ready_window).unwrap()
    };
    let garbage = ::common::relay::CopyData {
        kind: 1,
        payload: b"{not json".to_vec(),
    };
    let delivered = {
        use ::common::instance::SessionBackend;
        sender.send(&target, &garbage).unwrap()
    };
    assert!(!delivered);
    assert_eq!(env.events.try_recv(), None);
}
