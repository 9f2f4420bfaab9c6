mod common;

use common::{peer, MockPeripheralRadio, RadioCall, Recorder};
use drumkit_link::gatt::{AttributeControl, AttributeEvent, Peripheral, PeripheralState};
use drumkit_link::registry::{self, SERVICE_UUID};
use drumkit_link::{AttributeTransport, DrumError, InstrumentId, RadioState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn powered_peripheral() -> (Peripheral, Recorder<RadioCall>, Arc<AtomicBool>) {
    common::init_tracing();
    let (radio, calls, accept) = MockPeripheralRadio::new();
    let mut peripheral = Peripheral::new(Box::new(radio));
    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::PoweredOn));
    (peripheral, calls, accept)
}

#[test]
fn test_power_on_registers_service_and_advertises() {
    let (peripheral, calls, _) = powered_peripheral();

    assert_eq!(peripheral.state(), PeripheralState::Advertising);
    assert!(peripheral.is_advertising());
    assert_eq!(
        calls.calls(),
        vec![
            RadioCall::AddService(SERVICE_UUID, InstrumentId::COUNT),
            RadioCall::Advertise(SERVICE_UUID)
        ]
    );
}

#[test]
fn test_send_before_power_on_is_unavailable() {
    let (radio, calls, _) = MockPeripheralRadio::new();
    let mut peripheral = Peripheral::new(Box::new(radio));

    let result = peripheral.send_hit(InstrumentId::Snare);
    assert!(matches!(result, Err(DrumError::TransportUnavailable(RadioState::Unknown))));
    assert!(calls.calls().is_empty());
    assert_eq!(peripheral.diagnostics().send_failures, 1);
}

#[test]
fn test_send_hit_notifies_instrument_attribute() {
    let (mut peripheral, calls, _) = powered_peripheral();
    calls.take();

    peripheral.send_hit(InstrumentId::RackTom).unwrap();

    assert_eq!(
        calls.calls(),
        vec![RadioCall::Update(
            registry::attribute_uuid(InstrumentId::RackTom),
            b"HIT".to_vec()
        )]
    );
    assert_eq!(peripheral.diagnostics().hits_sent, 1);
}

#[test]
fn test_refused_notification_reports_failure() {
    let (mut peripheral, _calls, accept) = powered_peripheral();
    accept.store(false, Ordering::SeqCst);

    let result = peripheral.send_hit(InstrumentId::Kick);
    assert!(matches!(result, Err(DrumError::SendFailed(_))));
    assert_eq!(peripheral.diagnostics().send_failures, 1);
    // Still advertising; the next hit may go through
    assert!(peripheral.is_advertising());

    accept.store(true, Ordering::SeqCst);
    assert!(peripheral.send_hit(InstrumentId::Kick).is_ok());
}

#[test]
fn test_toggle_advertising_keeps_service_registered() {
    let (mut peripheral, calls, _) = powered_peripheral();
    calls.take();

    peripheral.toggle_advertising(false).unwrap();
    assert_eq!(peripheral.state(), PeripheralState::Ready);
    peripheral.toggle_advertising(false).unwrap();

    peripheral.toggle_advertising(true).unwrap();
    assert_eq!(peripheral.state(), PeripheralState::Advertising);

    assert_eq!(
        calls.calls(),
        vec![RadioCall::StopAdvertising, RadioCall::Advertise(SERVICE_UUID)]
    );
}

#[test]
fn test_toggle_without_radio_is_unavailable() {
    let (mut peripheral, _calls, _) = powered_peripheral();
    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::Resetting));

    assert_eq!(peripheral.state(), PeripheralState::Idle);
    assert!(matches!(
        peripheral.toggle_advertising(true),
        Err(DrumError::TransportUnavailable(RadioState::Resetting))
    ));
}

#[test]
fn test_power_cycle_registers_again() {
    let (mut peripheral, calls, _) = powered_peripheral();
    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::PoweredOff));
    calls.take();

    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::PoweredOn));
    assert_eq!(
        calls.calls(),
        vec![
            RadioCall::AddService(SERVICE_UUID, InstrumentId::COUNT),
            RadioCall::Advertise(SERVICE_UUID)
        ]
    );
}

#[test]
fn test_registration_failure_stops_advertising() {
    let (mut peripheral, calls, _) = powered_peripheral();
    calls.take();

    peripheral.handle(AttributeEvent::ServiceAdded {
        service: SERVICE_UUID,
        error: Some("duplicate service".to_string()),
    });

    assert_eq!(peripheral.state(), PeripheralState::Idle);
    assert_eq!(calls.calls(), vec![RadioCall::StopAdvertising]);
}

#[test]
fn test_rejected_service_is_reported_until_the_radio_resets() {
    let (mut peripheral, calls, _) = powered_peripheral();
    peripheral.handle(AttributeEvent::ServiceAdded {
        service: SERVICE_UUID,
        error: Some("duplicate service".to_string()),
    });
    calls.take();

    // The radio itself is still on, so the registration is what failed
    assert_eq!(peripheral.radio_state(), RadioState::PoweredOn);
    assert_eq!(peripheral.registration_error(), Some("duplicate service"));
    assert!(matches!(
        peripheral.toggle_advertising(true),
        Err(DrumError::RegistrationFailed(reason)) if reason == "duplicate service"
    ));
    assert!(matches!(
        peripheral.send_hit(InstrumentId::Kick),
        Err(DrumError::RegistrationFailed(_))
    ));
    assert_eq!(peripheral.diagnostics().send_failures, 1);
    assert!(calls.calls().is_empty());

    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::PoweredOff));
    assert!(matches!(
        peripheral.send_hit(InstrumentId::Kick),
        Err(DrumError::TransportUnavailable(RadioState::PoweredOff))
    ));

    peripheral.handle(AttributeEvent::RadioStateChanged(RadioState::PoweredOn));
    assert_eq!(peripheral.registration_error(), None);
    assert_eq!(peripheral.state(), PeripheralState::Advertising);
    peripheral.send_hit(InstrumentId::Kick).unwrap();
}

#[test]
fn test_subscriptions_track_connected_central() {
    let (mut peripheral, _calls, _) = powered_peripheral();
    let central = peer(7);
    let attribute = registry::attribute_uuid(InstrumentId::HiHat);

    assert_eq!(peripheral.connected_central(), None);

    peripheral.handle(AttributeEvent::CentralSubscribed { central, attribute });
    assert_eq!(peripheral.connected_central(), Some(central));

    // Another central leaving does not clear the tracked one
    peripheral.handle(AttributeEvent::CentralUnsubscribed {
        central: peer(8),
        attribute,
    });
    assert_eq!(peripheral.connected_central(), Some(central));

    peripheral.handle(AttributeEvent::CentralUnsubscribed { central, attribute });
    assert_eq!(peripheral.connected_central(), None);
}

#[test]
fn test_peripheral_transport_routes_controls() {
    let (peripheral, calls, _) = powered_peripheral();
    let mut transport = AttributeTransport::from(peripheral);
    calls.take();

    assert_eq!(transport.role_name(), "peripheral");
    transport.control(AttributeControl::ToggleAdvertising(false)).unwrap();
    assert!(matches!(
        transport.control(AttributeControl::Cleanup),
        Err(DrumError::WrongRole("peripheral"))
    ));
    assert!(transport.drain_hits().is_empty());
    assert_eq!(calls.calls(), vec![RadioCall::StopAdvertising]);
}
