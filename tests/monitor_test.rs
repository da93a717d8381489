mod common;

use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;

use common::{response_bits, SimBus};
use thermomux::{CalibrationModel, Error, Monitor, MonitorConfig, Thermistor};

fn calibration() -> CalibrationModel {
    CalibrationModel {
        thermistor: Thermistor {
            a: 1.270e-3,
            b: 2.229e-4,
            c: 3.948e-8,
        },
        series_resistor: 997.0,
        adc_full_scale: 1023,
    }
}

fn open(bus: &SimBus) -> Monitor {
    let _ = env_logger::builder().is_test(true).try_init();
    Monitor::open(
        bus.clone(),
        calibration(),
        MonitorConfig {
            idle_interval: Duration::from_millis(5),
            response_timeout: Duration::from_millis(500),
        },
    )
}

const RECV_WINDOW: Duration = Duration::from_secs(5);

#[test]
fn reports_from_both_chips() -> Result<()> {
    let bus = SimBus::new();
    bus.set_response(1, &response_bits(512, true, true, false, false, false), &[16]);
    // chip 2 splits its response across two frames, 10 + 6 bits
    bus.set_response(2, &response_bits(300, false, true, false, true, false), &[10, 6]);

    let mut monitor = open(&bus);
    let reports = monitor.reports();

    let mut seen = [false; 2];
    while seen != [true, true] {
        let report = reports.recv_timeout(RECV_WINDOW)?;
        match *report.chip {
            1 => {
                assert_eq!(report.count, 512);
                assert!(report.heating && report.ok);
                assert!(!report.temp_low && !report.temp_high && !report.peer_died);
                assert_eq!(report.celsius, calibration().celsius(512).unwrap());
                seen[0] = true;
            }
            2 => {
                assert_eq!(report.count, 300);
                assert!(!report.heating && report.ok && report.temp_high);
                assert_eq!(report.celsius, calibration().celsius(300).unwrap());
                seen[1] = true;
            }
            chip => panic!("report from impossible chip {}", chip),
        }
        assert_eq!(report.message.len(), 16);
    }

    monitor.shutdown();
    Ok(())
}

#[test]
fn silent_chip_times_out_and_repolls() -> Result<()> {
    let bus = SimBus::new();
    bus.set_response(1, &response_bits(600, false, true, false, false, true), &[16]);
    // chip 2 never answers

    let mut monitor = open(&bus);
    let reports = monitor.reports();
    let errors = monitor.errors();

    let err = errors.recv_timeout(RECV_WINDOW)?;
    assert!(matches!(err, Error::PeerTimeout { chip } if chip == 2));

    // the session restarts: chip 2 gets polled again
    let polls_at_timeout = bus.polls(2);
    while bus.polls(2) <= polls_at_timeout {
        // chip 1's reports keep flowing while chip 2 is stuck
        let report = reports.recv_timeout(RECV_WINDOW)?;
        assert_eq!(*report.chip, 1);
    }

    monitor.shutdown();
    Ok(())
}

#[test]
fn unknown_address_is_dropped_not_fatal() -> Result<()> {
    let bus = SimBus::new();
    bus.set_response(1, &response_bits(100, false, true, true, false, false), &[16]);
    // a 4-bit frame carrying the unassigned address 3
    bus.inject_frame([0b1_00100_11, 0b1010_0000, 0, 0, 0]);

    let mut monitor = open(&bus);
    let errors = monitor.errors();
    let reports = monitor.reports();

    let err = errors.recv_timeout(RECV_WINDOW)?;
    assert!(matches!(err, Error::UnknownAddress { chip: 3 }));

    // routing continues: chip 1 still reports
    let report = reports.recv_timeout(RECV_WINDOW)?;
    assert_eq!(*report.chip, 1);
    assert_eq!(report.count, 100);

    monitor.shutdown();
    Ok(())
}

#[test]
fn exchange_failure_stops_the_pipeline() -> Result<()> {
    let bus = SimBus::new();
    bus.fail_next_exchange();

    let mut monitor = open(&bus);
    let errors = monitor.errors();
    let reports = monitor.reports();

    let fatal = loop {
        match errors.recv_timeout(RECV_WINDOW)? {
            err @ Error::Io { .. } => break err,
            Error::PeerTimeout { .. } => continue, // cycles dying off
            err => panic!("unexpected error: {}", err),
        }
    };
    assert!(matches!(fatal, Error::Io { .. }));

    // with the transport gone both sessions wind down and the report
    // stream disconnects
    loop {
        match reports.recv_timeout(RECV_WINDOW) {
            Ok(report) => panic!("report after fatal error: {}", report),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => panic!("report stream never closed"),
        }
    }

    monitor.shutdown();
    Ok(())
}

#[test]
fn shutdown_is_clean_and_idempotent() {
    let bus = SimBus::new();
    bus.set_response(1, &response_bits(512, false, true, false, false, false), &[8, 8]);

    let mut monitor = open(&bus);
    monitor.shutdown();
    monitor.shutdown();
}
