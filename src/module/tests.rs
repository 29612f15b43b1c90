use super::*;
use crate::devices::testing::{FakeInput, FakeOutput, Journal};
use parking_lot::Mutex;

struct Rig {
    module: MidiModule,
    rx: mpsc::Receiver<InboundMessage>,
    table: DeviceTable,
    input: Arc<FakeInput>,
    output: Arc<FakeOutput>,
    events: Arc<Mutex<Vec<ModuleEvent>>>,
}

fn rig(settings: ModuleSettings) -> Rig {
    let journal = Journal::default();
    let input = FakeInput::new("Controller", &journal);
    let output = FakeOutput::new("Synth", &journal);
    let mut table = DeviceTable::new();
    table.insert_input(input.clone());
    table.insert_output(output.clone());

    let activity = Arc::new(ActivityTracker::new(100, None));
    let (mut module, rx) = MidiModule::new("midi", settings, activity);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    module.subscribe(Arc::new(move |event: &ModuleEvent| sink.lock().push(event.clone())));

    Rig { module, rx, table, input, output, events }
}

fn bind_both(r: &mut Rig) {
    let selector = DeviceSelector::new(Some(DeviceId::new("Controller")), Some(DeviceId::new("Synth")));
    r.module.set_selector(selector, &r.table).unwrap();
}

fn cc(channel: u8, cc: u8, value: u8) -> MidiMessage {
    MidiMessage::ControlChange { channel, cc, value }
}

fn auto_add() -> ModuleSettings {
    ModuleSettings { auto_add: true, ..Default::default() }
}

fn registry_events(r: &Rig) -> Vec<ModuleEvent> {
    r.events
        .lock()
        .iter()
        .filter(|e| matches!(e, ModuleEvent::RegistryUpdated { .. }))
        .cloned()
        .collect()
}

#[test]
fn test_cc_creates_then_updates_entry() {
    let mut r = rig(auto_add());

    assert_eq!(r.module.handle_message(&cc(1, 10, 64)), Some(RegistryUpdate::Created));
    assert_eq!(r.module.handle_message(&cc(1, 10, 100)), Some(RegistryUpdate::Updated));

    assert_eq!(r.module.registry().len(), 1);
    assert_eq!(r.module.registry().value("[2] CC10"), Some(100));
    assert_eq!(
        registry_events(&r),
        vec![
            ModuleEvent::RegistryUpdated { key: "[2] CC10".into(), value: 64, created: true },
            ModuleEvent::RegistryUpdated { key: "[2] CC10".into(), value: 100, created: false },
        ]
    );
}

#[test]
fn test_notes_are_keyed_by_name() {
    let mut r = rig(auto_add());
    r.module.handle_message(&MidiMessage::NoteOn { channel: 0, note: 60, velocity: 90 });
    r.module.handle_message(&MidiMessage::NoteOff { channel: 0, note: 61, velocity: 0 });

    let keys: Vec<&str> = r.module.registry().keys().collect();
    assert_eq!(keys, vec!["[1] C#5", "[1] C5"]);
    assert_eq!(r.module.registry().value("[1] C5"), Some(90));
}

#[test]
fn test_default_settings_do_not_auto_add() {
    assert!(!ModuleSettings::default().auto_add);

    let mut r = rig(ModuleSettings::default());
    assert_eq!(r.module.handle_message(&cc(0, 1, 1)), Some(RegistryUpdate::Ignored));
    assert!(r.module.registry().is_empty());
    assert!(!r.module.availability().can_receive);
}

#[test]
fn test_auto_add_off_ignores_unknown() {
    let mut r = rig(ModuleSettings { auto_add: false, ..Default::default() });
    assert_eq!(r.module.handle_message(&cc(1, 10, 64)), Some(RegistryUpdate::Ignored));
    assert!(r.module.registry().is_empty());
    assert!(registry_events(&r).is_empty());
}

#[test]
fn test_generic_controls_off_only_counts_activity() {
    let mut r = rig(ModuleSettings { use_generic_controls: false, ..Default::default() });
    assert_eq!(r.module.handle_message(&cc(0, 1, 1)), None);
    assert!(r.module.registry().is_empty());
    assert_eq!(*r.events.lock(), vec![ModuleEvent::Activity(ActivityDirection::Inbound)]);
}

#[test]
fn test_other_messages_only_count_activity() {
    let mut r = rig(ModuleSettings::default());
    assert_eq!(r.module.handle_message(&MidiMessage::PitchBend { channel: 0, value: 8192 }), None);
    assert!(r.module.registry().is_empty());
    assert_eq!(r.events.lock().len(), 1);
}

#[test]
fn test_disabled_module_is_silent() {
    let mut r = rig(ModuleSettings { enabled: false, ..Default::default() });
    bind_both(&mut r);
    r.events.lock().clear();

    assert_eq!(r.module.handle_message(&cc(1, 10, 64)), None);
    r.module.send_control_change(&r.table, 7, 100, 1);

    assert!(r.module.registry().is_empty());
    assert!(r.output.sent.lock().is_empty());
    assert!(r.events.lock().is_empty());
}

#[test]
fn test_sends_require_an_output() {
    let mut r = rig(ModuleSettings::default());
    r.module.send_note_on(&r.table, 60, 100, 1);
    assert!(r.output.sent.lock().is_empty());

    bind_both(&mut r);
    r.module.send_note_on(&r.table, 60, 100, 1);
    r.module.send_control_change(&r.table, 7, 127, 16);
    r.module.send_sysex(&r.table, &[0x43, 0x10]);

    assert_eq!(
        *r.output.sent.lock(),
        vec![vec![0x90, 60, 100], vec![0xBF, 7, 127], vec![0xF0, 0x43, 0x10, 0xF7]]
    );
}

#[test]
fn test_out_of_range_sends_are_clamped() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);

    r.module.send_note_on(&r.table, 200, 255, 0);
    r.module.send_control_change(&r.table, 130, 128, 17);
    r.module.send_note_off(&r.table, 128, 40);

    assert_eq!(
        *r.output.sent.lock(),
        vec![vec![0x90, 127, 127], vec![0xBF, 127, 127], vec![0x8F, 127, 0]]
    );
}

#[test]
fn test_sysex_with_status_byte_is_not_sent() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);

    r.module.send_sysex(&r.table, &[0x43, 0xF7, 0x10]);
    assert!(r.output.sent.lock().is_empty());

    r.module.send_sysex(&r.table, &[0x43, 0x7F]);
    assert_eq!(*r.output.sent.lock(), vec![vec![0xF0, 0x43, 0x7F, 0xF7]]);
}

#[test]
fn test_full_note_sends_on_then_off() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);

    r.module.execute(&r.table, &MidiCommand::FullNote { channel: 2, pitch: 64, velocity: 80 });

    assert_eq!(*r.output.sent.lock(), vec![vec![0x91, 64, 80], vec![0x81, 64, 0]]);
}

#[test]
fn test_selector_publishes_availability() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);
    assert_eq!(
        *r.events.lock(),
        vec![ModuleEvent::AvailabilityChanged(Availability { can_receive: true, can_send: true })]
    );

    r.events.lock().clear();
    let selector = DeviceSelector::new(Some(DeviceId::new("Controller")), Some(DeviceId::new("Synth")));
    r.module.set_selector(selector, &r.table).unwrap();
    assert!(r.events.lock().is_empty());
}

#[test]
fn test_first_entry_makes_module_receive_capable() {
    let mut r = rig(auto_add());
    assert!(!r.module.availability().can_receive);

    r.module.handle_message(&cc(0, 1, 1));
    assert!(r.module.availability().can_receive);
    assert!(r
        .events
        .lock()
        .contains(&ModuleEvent::AvailabilityChanged(Availability { can_receive: true, can_send: false })));
}

#[test]
fn test_record_round_trip_restores_availability() {
    let mut r = rig(auto_add());
    r.module.handle_message(&cc(2, 7, 90));
    r.module.handle_message(&cc(0, 1, 12));
    let record = r.module.to_record();
    assert_eq!(record["name"], "midi");
    assert_eq!(record["enabled"], true);

    let mut fresh = rig(ModuleSettings::default());
    fresh.module.load_record(&record);

    assert_eq!(fresh.module.registry(), r.module.registry());
    assert!(fresh.module.availability().can_receive);
    assert_eq!(fresh.module.to_record(), record);
}

#[tokio::test]
async fn test_inbound_queue_drives_registry() {
    let mut r = rig(auto_add());
    bind_both(&mut r);

    r.input.emit(&cc(0, 74, 33));
    let inbound = r.rx.recv().await.unwrap();
    assert_eq!(inbound.device, DeviceId::new("Controller"));

    assert_eq!(r.module.handle_inbound(&inbound), Some(RegistryUpdate::Created));
    assert_eq!(r.module.registry().value("[1] CC74"), Some(33));
}

#[tokio::test]
async fn test_queued_message_from_previous_input_is_dropped() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);

    r.input.emit(&cc(0, 1, 1));
    r.module
        .set_selector(DeviceSelector::new(None, Some(DeviceId::new("Synth"))), &r.table)
        .unwrap();

    let inbound = r.rx.recv().await.unwrap();
    assert_eq!(r.module.handle_inbound(&inbound), None);
    assert!(r.module.registry().is_empty());
}

#[test]
fn test_shutdown_releases_endpoints() {
    let mut r = rig(ModuleSettings::default());
    bind_both(&mut r);

    r.module.shutdown(&r.table);
    assert_eq!(r.input.listener_count(), 0);
    assert!(!r.output.is_open());
    assert_eq!(r.module.availability(), Availability::default());
}
