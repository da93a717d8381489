use std::io;
use std::time::Duration;

use anyhow::Result;

use thermomux::{addr, Error, Message, Transport, TransportConfig, FRAME_LEN};

/// A bus wired back on itself: every exchange reads back what it wrote.
struct LoopbackBus;

impl thermomux::Exchange for LoopbackBus {
    fn exchange(&mut self, tx: &[u8; FRAME_LEN]) -> io::Result<[u8; FRAME_LEN]> {
        Ok(*tx)
    }
}

fn open() -> Transport {
    let _ = env_logger::builder().is_test(true).try_init();
    Transport::open(
        LoopbackBus,
        TransportConfig {
            idle_interval: Duration::from_millis(5),
        },
    )
}

#[test]
fn submitted_frames_come_back_decoded() -> Result<()> {
    let transport = open();
    let frames = transport.frames();

    // the idle exchanges in between are all-zero and yield no frames
    for bits in ["1", "1010", "1000000000110000"] {
        let msg = Message::from_bit_str(addr(2), bits)?;
        transport.submit(msg.clone())?;
        let echoed = frames.recv_timeout(Duration::from_secs(1))?;
        assert_eq!(echoed, msg);
    }
    Ok(())
}

#[test]
fn submit_vets_the_address() {
    let transport = open();
    // an address-3 message can only be obtained from the wire
    let stray = Message::decode(&[0b1_00001_11, 0b1000_0000]).unwrap();
    assert!(matches!(
        transport.submit(stray),
        Err(Error::InvalidMessage { .. })
    ));
}

#[test]
fn submit_after_shutdown_is_closed() {
    let mut transport = open();
    let submitter = transport.submitter();
    transport.shutdown();
    assert!(matches!(
        submitter.submit(Message::request(addr(1))),
        Err(Error::Closed)
    ));
    assert!(matches!(
        transport.submit(Message::request(addr(2))),
        Err(Error::Closed)
    ));
}
