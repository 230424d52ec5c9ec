//! Tests for the MachineConfig builder and defaults.

use active::{MachineConfig, TickSource, DEFAULT_QUEUE_CAPACITY, DEFAULT_TICK_PERIOD};

#[test]
fn machine_config_builder() {
    let config = MachineConfig::builder()
        .name("network manager")
        .priority(2)
        .queue_capacity(16)
        .stack_size(64 * 1024)
        .build();

    assert_eq!(config.name, "network manager");
    assert_eq!(config.priority, 2);
    assert_eq!(config.queue_capacity, 16);
    assert_eq!(config.stack_size, Some(64 * 1024));
}

#[test]
fn machine_config_default() {
    let config = MachineConfig::default();

    assert_eq!(config.name, "active");
    assert_eq!(config.priority, 1);
    assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    assert_eq!(config.queue_capacity, 10);
    assert_eq!(config.stack_size, None);
}

#[test]
fn tick_source_default_is_threaded() {
    assert_eq!(TickSource::default(), TickSource::Thread(DEFAULT_TICK_PERIOD));
    assert_eq!(TickSource::Manual.period(), DEFAULT_TICK_PERIOD);
}
