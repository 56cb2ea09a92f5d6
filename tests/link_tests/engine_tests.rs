//! Engine Dispatch Tests
//!
//! Inbound notifications to subscribers, plus configuration checks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use wireless_uart::protocol::{Event, Response, RxPacket, SamplingState};
use wireless_uart::transport::{AdapterState, TransportEvent};
use wireless_uart::{Config, Engine, UartError};

use crate::common::*;

fn notify(bytes: &[u8]) -> TransportEvent {
    TransportEvent::Notification(Bytes::copy_from_slice(bytes))
}

#[test]
fn test_invalid_config_rejected() {
    let config = Config::builder().target(TARGET).chunk_size(0).build();
    assert!(matches!(
        Engine::new(config, RecordingTransport::default()),
        Err(UartError::Config(_))
    ));

    let config = Config::builder()
        .target(TARGET)
        .write_timeout(Duration::ZERO)
        .build();
    assert!(Engine::new(config, RecordingTransport::default()).is_err());

    let config = Config::builder().target(TARGET).delivery_backlog(0).build();
    assert!(matches!(
        Engine::new(config, RecordingTransport::default()),
        Err(UartError::Config(_))
    ));
}

#[test]
fn test_notifications_dispatched_in_order() {
    let (mut engine, observed) = connected_engine();

    engine.handle_event(notify(&[0x01, 0x40, 0x06, 0x84, 0x01]));
    engine.handle_event(notify(&[0x42, 0xF7, 0xD2, 0xF1, 0x02, 0x84]));
    engine.handle_event(notify(&[0x00]));

    let packets = observed.packets.lock();
    assert_eq!(packets.len(), 3);
    assert_eq!(packets[0], RxPacket::Response(Response::ConnectionTest));
    assert_eq!(
        packets[1],
        RxPacket::Event(Event::SensorSampling {
            state: SamplingState::Sampling,
            value: Some(f32::from_bits(0x42F7_D2F1)),
        })
    );
    assert_eq!(
        packets[2],
        RxPacket::Event(Event::SensorSampling {
            state: SamplingState::Stopped,
            value: None,
        })
    );
    assert_eq!(engine.stats().packets_received, 3);
}

#[test]
fn test_garbage_counted_and_skipped() {
    let (mut engine, observed) = connected_engine();

    engine.handle_event(notify(&[0x01, 0x7F, 0x02, 0x84, 0x09, 0x01, 0x40]));

    assert_eq!(
        *observed.packets.lock(),
        vec![RxPacket::Response(Response::ConnectionTest)]
    );
    let stats = engine.stats();
    assert_eq!(stats.frames_unknown, 1);
    assert_eq!(stats.frames_malformed, 1);
}

#[test]
fn test_notifications_before_connected_dropped() {
    let (mut engine, observed) = scanning_engine();
    engine.handle_event(notify(&[0x01, 0x40]));

    assert!(observed.packets.lock().is_empty());
    assert_eq!(engine.buffered_len(), 0);
}

#[test]
fn test_partial_frame_discarded_between_sessions() {
    let (mut engine, observed) = connected_engine();

    // Half a sampling event, then the link drops
    engine.handle_event(notify(&[0x06, 0x84, 0x01]));
    assert_eq!(engine.buffered_len(), 3);
    engine.handle_event(TransportEvent::Disconnected);

    complete_setup(&mut engine);
    engine.handle_event(notify(&[0x01, 0x40]));

    assert_eq!(
        *observed.packets.lock(),
        vec![RxPacket::Response(Response::ConnectionTest)]
    );
}

#[test]
fn test_several_packet_subscribers() {
    let (mut engine, observed) = connected_engine();
    let extra = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&extra);
    engine.on_packet(move |_| *counter.lock() += 1);

    engine.handle_event(notify(&[0x01, 0x40, 0x01, 0x42]));

    assert_eq!(observed.packets.lock().len(), 2);
    assert_eq!(*extra.lock(), 2);
}

#[test]
fn test_adapter_subscribers_notified() {
    let (mut engine, _) = engine_with(config());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on_adapter_state(move |state| sink.lock().push(state));

    engine.start().unwrap();
    engine.handle_event(TransportEvent::AdapterStateChanged(AdapterState::PoweredOff));
    engine.handle_event(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));

    assert_eq!(
        *seen.lock(),
        vec![AdapterState::PoweredOff, AdapterState::PoweredOn]
    );
}

#[test]
fn test_next_deadline_tracks_pending_work() {
    let (mut engine, _) = engine_with(config());
    assert!(engine.next_deadline().is_none());

    engine.start().unwrap();
    engine.handle_event(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));

    // Scan restart pending
    assert!(engine.next_deadline().is_some());
}
