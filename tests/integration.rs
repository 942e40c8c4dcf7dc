//! Integration tests for relayboard host-testable logic.
//!
//! Drives the public API the way the firmware does: configuration load,
//! relay init, decoder polling and event dispatch, with the in-memory
//! stand-ins from `relayboard::testing` for pins, display and flash.

use embassy_futures::block_on;

use relayboard::app::{menu_for, RelayBoard};
use relayboard::relay::DeviceController;
use relayboard::storage::{FlashStatusStorage, StatusStorage};
use relayboard::testing::{MemoryStorage, MockInput, MockLine, MockLines, RamFlash, RecordingDisplay};
use relayboard::ui::CharDisplay;
use relayboard::{ConfigError, ConfigStore, Error, RotaryDecoder, RotaryEvent};

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

const FIVE: &[u8] = br#"{"numdevices":5,"0":["Hall",2],"1":["Kitchen",3],
    "2":["Porch",4],"3":["Pump",28],"4":["Fan",30]}"#;
const FIVE_OFF: &[u8] = br#"{"numdevices":5,"0":0,"1":0,"2":0,"3":0,"4":0}"#;

type Board<S> = RelayBoard<RecordingDisplay, MockLine, S>;
type Knob = RotaryDecoder<MockInput, MockInput, MockInput>;

/// Firmware boot order, stopping at the first error.
fn boot<S: StatusStorage>(
    identity: &[u8],
    factory: &[u8],
    mut storage: S,
    lines: &mut MockLines,
    rows: u8,
) -> Result<Board<S>, Error> {
    let mut config = ConfigStore::new();
    block_on(config.load_persisted(identity, &mut storage, factory))?;
    let controller = DeviceController::init(&config, lines)?;
    let screen = RecordingDisplay::new(16, rows);
    let nav = menu_for(&screen, &config)?;
    let mut board = RelayBoard::new(screen, config, controller, storage, nav);
    board.start()?;
    Ok(board)
}

fn press<S: StatusStorage>(board: &mut Board<S>, event: RotaryEvent, position: usize) {
    block_on(board.dispatch(event, position)).unwrap();
}

fn names<S: StatusStorage>(board: &Board<S>) -> Vec<String> {
    let display = board.display();
    (0..display.size().1).map(|row| display.name(row)).collect()
}

fn saved(board: &Board<MemoryStorage>) -> &str {
    std::str::from_utf8(board.storage().contents().unwrap_or_default()).unwrap()
}

/// Encoder on idle (high) lines plus handles to drive them.
fn knob(total: usize) -> (MockInput, MockInput, MockInput, Knob) {
    let (clock, data, switch) = (MockInput::new(true), MockInput::new(true), MockInput::new(true));
    let decoder = RotaryDecoder::new(clock.clone(), data.clone(), switch.clone(), total).unwrap();
    (clock, data, switch, decoder)
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn five_devices_two_rows_wrap_down_to_first_page() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();
    assert_eq!(board.navigation().total_pages(), 3);

    for position in 1..5 {
        press(&mut board, RotaryEvent::Down, position);
    }
    assert_eq!(board.navigation().current_page(), 2);
    assert_eq!(names(&board), ["Fan", ""]);
    assert_eq!(board.display().glyph(0), Some(false));
    assert_eq!(board.display().glyph(1), None);

    press(&mut board, RotaryEvent::Down, 0);
    let nav = board.navigation();
    assert_eq!((nav.current_page(), nav.on_screen_index(), nav.selected_device()), (0, 0, 0));
    assert_eq!(names(&board), ["Hall", "Kitchen"]);
    assert_eq!(board.display().cursor_row, Some(0));
}

#[test]
fn up_from_first_device_selects_last_device() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();

    press(&mut board, RotaryEvent::Up, 4);
    assert_eq!(board.navigation().selected_device(), 4);
    assert_eq!(board.display().cursor_row, Some(0));

    press(&mut board, RotaryEvent::Up, 3);
    assert_eq!(board.navigation().current_page(), 1);
    assert_eq!(board.display().cursor_row, Some(1));
    assert_eq!(names(&board), ["Porch", "Pump"]);
}

#[test]
fn count_mismatch_stops_boot_before_any_line() {
    let mut lines = MockLines::new();
    let result = boot(
        br#"{"numdevices":3,"0":["A",2],"1":["B",3],"2":["C",4]}"#,
        br#"{"numdevices":4,"0":0,"1":0,"2":0,"3":0}"#,
        MemoryStorage::new(),
        &mut lines,
        2,
    );
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::CountMismatch { identity: 3, status: 4 }))
    ));
    assert_eq!(lines.acquired(), 0);
}

#[test]
fn toggling_device_two_rewrites_only_its_entry() {
    let mut lines = MockLines::new();
    let mut board = boot(
        FIVE,
        br#"{"numdevices":5,"0":1,"1":0,"2":0,"3":1,"4":0}"#,
        MemoryStorage::new(),
        &mut lines,
        4,
    )
    .unwrap();
    assert_eq!(lines.level(4), Some(false));

    press(&mut board, RotaryEvent::Down, 1);
    press(&mut board, RotaryEvent::Down, 2);
    press(&mut board, RotaryEvent::ButtonPressed, 2);

    assert_eq!(lines.level(4), Some(true));
    assert_eq!(saved(&board), r#"{"numdevices":5,"0":1,"1":0,"2":1,"3":1,"4":0}"#);
    assert_eq!(board.display().glyph(2), Some(true));
}

#[test]
fn toggle_twice_restores_line_and_document() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();

    press(&mut board, RotaryEvent::ButtonPressed, 0);
    assert_eq!(lines.level(2), Some(true));
    assert_eq!(saved(&board), r#"{"numdevices":5,"0":1,"1":0,"2":0,"3":0,"4":0}"#);

    press(&mut board, RotaryEvent::ButtonPressed, 0);
    assert_eq!(lines.level(2), Some(false));
    assert_eq!(saved(&board).as_bytes(), FIVE_OFF);
}

#[test]
fn decoder_drives_the_menu() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();

    let (clock, _data, switch, mut decoder) = knob(5);
    let mut now = 0u64;
    let mut step = |decoder: &mut Knob, board: &mut Board<MemoryStorage>| {
        now += 5;
        let reading = decoder.poll(now).unwrap();
        if let Some(event) = reading.event {
            block_on(board.dispatch(event, reading.position)).unwrap();
        }
        reading
    };

    // Seven detents forward: wraps past the last device once.
    for _ in 0..7 {
        clock.set(false);
        step(&mut decoder, &mut board);
        clock.set(true);
        step(&mut decoder, &mut board);
    }
    assert_eq!(decoder.position(), 2);
    assert_eq!(board.navigation().selected_device(), 2);

    switch.set(false);
    let reading = step(&mut decoder, &mut board);
    assert_eq!(reading.event, Some(RotaryEvent::ButtonPressed));
    assert_eq!(lines.level(4), Some(true));

    // Still held inside the refractory window: nothing more happens.
    assert_eq!(step(&mut decoder, &mut board).event, None);
    assert_eq!(lines.level(4), Some(true));
}

#[test]
fn turn_and_press_in_one_poll_toggles_device_under_cursor() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();
    let (clock, _data, switch, mut decoder) = knob(5);

    // Detent and push land together.
    clock.set(false);
    switch.set(false);
    let reading = decoder.poll(0).unwrap();
    assert_eq!(reading.event, Some(RotaryEvent::ButtonPressed));
    assert_eq!(reading.position, board.navigation().selected_device());
    block_on(board.dispatch(RotaryEvent::ButtonPressed, reading.position)).unwrap();

    assert_eq!(board.config().is_on(0), Some(true));
    assert_eq!(board.config().is_on(1), Some(false));
    assert_eq!(lines.level(2), Some(true));
    assert_eq!(board.display().glyph(0), Some(true));

    // Decoder and cursor stay in step afterwards.
    switch.set(true);
    clock.set(true);
    assert_eq!(decoder.poll(1_000).unwrap().event, None);
    clock.set(false);
    let reading = decoder.poll(1_005).unwrap();
    assert_eq!(reading.event, Some(RotaryEvent::Down));
    block_on(board.dispatch(RotaryEvent::Down, reading.position)).unwrap();
    assert_eq!(board.navigation().selected_device(), reading.position);
}

#[test]
fn press_for_another_device_is_refused() {
    let mut lines = MockLines::new();
    let mut board = boot(FIVE, FIVE_OFF, MemoryStorage::new(), &mut lines, 2).unwrap();

    assert_eq!(
        block_on(board.dispatch(RotaryEvent::ButtonPressed, 1)),
        Err(Error::DeviceOutOfRange(1))
    );
    assert_eq!(lines.level(3), Some(false));
    assert_eq!(saved(&board).as_bytes(), FIVE_OFF);
}

#[test]
fn decoder_position_stays_in_range() {
    let (clock, data, _switch, mut decoder) = knob(3);
    let mut seen = [false; 3];
    for i in 0..60u64 {
        data.set(i % 7 < 4);
        clock.set(i % 2 == 0);
        let reading = decoder.poll(i).unwrap();
        assert!(reading.position < 3);
        seen[reading.position] = true;
    }
    assert_eq!(seen, [true; 3]);
}

#[test]
fn status_survives_reboot_in_flash() {
    let range = 0..RamFlash::SIZE as u32;

    let mut lines = MockLines::new();
    let storage = FlashStatusStorage::with_range(RamFlash::new(), range.clone());
    let mut board = boot(FIVE, FIVE_OFF, storage, &mut lines, 2).unwrap();
    press(&mut board, RotaryEvent::Down, 1);
    press(&mut board, RotaryEvent::ButtonPressed, 1);
    assert_eq!(lines.level(3), Some(true));
    let flash = board.into_storage().release();

    // Power cycle: factory defaults must not win over what was saved.
    let mut lines = MockLines::new();
    let storage = FlashStatusStorage::with_range(flash, range);
    let board = boot(FIVE, FIVE_OFF, storage, &mut lines, 2).unwrap();
    assert_eq!(board.config().is_on(1), Some(true));
    assert_eq!(lines.level(3), Some(true));
    assert_eq!(lines.level(2), Some(false));
}

#[test]
fn shipped_device_documents_are_consistent() {
    let identity = include_bytes!("../data/devices.json");
    let status = include_bytes!("../data/devicestate.json");

    let mut config = ConfigStore::new();
    config.load(identity, status).unwrap();
    assert!(config.total_devices() > 0);

    let mut lines = MockLines::new();
    let controller = DeviceController::init(&config, &mut lines).unwrap();
    assert_eq!(controller.device_count(), config.total_devices());
}

#[test]
fn unknown_device_in_document_is_fatal() {
    let mut config = ConfigStore::new();
    let result = config.load(
        br#"{"numdevices":2,"0":["A",2],"1":["B",3]}"#,
        br#"{"numdevices":2,"0":0,"1":0,"2":1}"#,
    );
    assert_eq!(result, Err(ConfigError::UnexpectedEntry(2)));
    assert_eq!(config.total_devices(), 0);
}
