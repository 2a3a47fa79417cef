use std::sync::Arc;

use waylink::prelude::*;
use waylink_sim::{loopback_pair, ManualClock, SeededRandom};

#[test]
fn prelude_builds_a_synchronous_unicast_channel_end_to_end() {
    let mut scheme = Scheme::new();
    scheme.add_layer(vec![bytes_attr("payload", 3).unwrap()], vec![]).unwrap();

    let clock = Arc::new(ManualClock::default());
    let orchestrator = Arc::new(Orchestrator::new(clock.clone()));
    orchestrator.start();
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&orchestrator), clock));

    let overlay = Overlay::Unicast(Unicast::new(vec![0x00, 0x01], false, false));
    let random = SeededRandom::new(7);
    let channel = Arc::new(
        Channel::new(
            0,
            scheme,
            overlay,
            Security::new(vec![]),
            &random,
            Arc::clone(&orchestrator),
            Arc::clone(&scheduler),
            ScheduleMode::Synchronous,
        )
        .unwrap(),
    );
    orchestrator.register_channel(0, Arc::clone(&channel) as Arc<dyn ChannelWorker>, 10, None);

    let (socket, _unused_peer) = loopback_pair();
    channel.init_connection(socket, ConnectionParams::default());

    let mut frame = channel.new_frame();
    frame.push(0, AttrValue::Bytes(b"abc".to_vec()));
    channel
        .send(
            &mut frame,
            SendOptions {
                dest_address: Some(vec![0x00, 0x01]),
                ..SendOptions::default()
            },
        )
        .unwrap();

    // Loop the bytes the channel just transmitted back in as if they had
    // arrived off the wire, same as a self-addressed unicast packet would.
    let raw = orchestrator.pop_send(0).expect("a packet should have been queued");
    let (&_channel_byte, tail) = raw.split_first().unwrap();
    orchestrator.submit_received(0, tail.to_vec(), Meta::new());

    std::thread::sleep(std::time::Duration::from_millis(20));
    let (frame, _meta) = orchestrator.retrieve(0);
    let frame = frame.expect("self-addressed packet should be delivered");
    assert_eq!(frame.get("payload").unwrap().as_bytes(), Some(&b"abc"[..]));
}
