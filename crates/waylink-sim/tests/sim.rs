use std::time::{Duration, SystemTime};

use waylink_runtime::{Clock, Socket};
use waylink_sim::{loopback_pair, ManualClock};

#[test]
fn loopback_pair_delivers_from_either_side() {
    let (a, b) = loopback_pair();
    a.send(b"hello");
    assert_eq!(b.recv(16), b"hello".to_vec());

    b.send(b"world");
    assert_eq!(a.recv(16), b"world".to_vec());
}

#[test]
fn loopback_recv_is_empty_when_nothing_queued() {
    let (a, _b) = loopback_pair();
    a.set_blocking(false);
    assert!(a.recv(16).is_empty());
}

#[test]
fn loopback_recv_truncates_to_buffer_size() {
    let (a, b) = loopback_pair();
    a.send(b"0123456789");
    assert_eq!(b.recv(4), b"0123".to_vec());
}

#[test]
fn manual_clock_only_moves_when_advanced() {
    let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
    assert_eq!(clock.now(), SystemTime::UNIX_EPOCH);

    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(5));
}
