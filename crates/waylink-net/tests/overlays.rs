use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use waylink_core::{Meta, PreEncodeFrame, Scheme, Serializer};
use waylink_net::{
    Broadcast, Flooding, FloodingParams, MultiHopUnicast, Network, RecvAction, SendOptions,
    Unicast, IS_ACK, NEEDS_ACK,
};

fn addr(byte: u8) -> Vec<u8> {
    vec![byte]
}

#[test]
fn unicast_drops_frames_not_addressed_to_local_or_broadcast() {
    let mut scheme_a = Scheme::new();
    let mut node_a = Unicast::new(addr(1), false, false);
    node_a.init_connection(&mut scheme_a).unwrap();
    let serializer_a = Serializer::new(scheme_a);

    let mut frame = PreEncodeFrame::new(serializer_a.encoding_scheme().len());
    let mut meta = Meta::new();
    let opts = SendOptions {
        dest_address: Some(addr(9)),
        ..SendOptions::default()
    };
    node_a.process_send(&mut frame, &mut meta, opts).unwrap();
    let wire = serializer_a.encode(&frame).unwrap();

    let mut scheme_b = Scheme::new();
    let mut node_b = Unicast::new(addr(2), false, false);
    node_b.init_connection(&mut scheme_b).unwrap();
    let serializer_b = Serializer::new(scheme_b);

    let (decoded, _meta) = serializer_b.decode(&wire).unwrap();
    let mut recv_meta = Meta::new();
    assert!(!node_b.process_recv(&decoded, &mut recv_meta));
}

#[test]
fn unicast_delivers_frames_addressed_to_local_node() {
    let mut scheme_a = Scheme::new();
    let mut node_a = Unicast::new(addr(1), false, false);
    node_a.init_connection(&mut scheme_a).unwrap();
    let serializer_a = Serializer::new(scheme_a);

    let mut frame = PreEncodeFrame::new(serializer_a.encoding_scheme().len());
    let mut meta = Meta::new();
    let opts = SendOptions {
        dest_address: Some(addr(2)),
        ..SendOptions::default()
    };
    node_a.process_send(&mut frame, &mut meta, opts).unwrap();
    let wire = serializer_a.encode(&frame).unwrap();

    let mut scheme_b = Scheme::new();
    let mut node_b = Unicast::new(addr(2), false, false);
    node_b.init_connection(&mut scheme_b).unwrap();
    let serializer_b = Serializer::new(scheme_b);

    let (decoded, _meta) = serializer_b.decode(&wire).unwrap();
    let mut recv_meta = Meta::new();
    assert!(node_b.process_recv(&decoded, &mut recv_meta));
}

#[test]
fn counter_rejects_replayed_and_out_of_order_packets() {
    let net = Network::new(addr(1), true, false);
    let mut scheme = Scheme::new();
    let mut net = net;
    net.init_connection(&mut scheme).unwrap();

    let recv_net = Network::new(addr(2), true, false);
    let mut recv_scheme = Scheme::new();
    let mut recv_net = recv_net;
    recv_net.init_connection(&mut recv_scheme).unwrap();

    let mut meta = Meta::new();
    meta.sender_address = Some(addr(1));
    let opts = SendOptions::default();

    let mut frame0 = PreEncodeFrame::new(scheme.len());
    net.process_send(&mut frame0, &mut meta, &opts).unwrap();
    let mut frame1 = PreEncodeFrame::new(scheme.len());
    net.process_send(&mut frame1, &mut meta, &opts).unwrap();

    let serializer = Serializer::new(scheme);
    let wire0 = serializer.encode(&frame0).unwrap();
    let wire1 = serializer.encode(&frame1).unwrap();

    let (decoded0, _) = serializer.decode(&wire0).unwrap();
    let (decoded1, _) = serializer.decode(&wire1).unwrap();

    let mut recv_meta0 = Meta::new();
    recv_meta0.sender_address = Some(addr(1));
    assert!(recv_net.process_recv(&decoded0, &mut recv_meta0));

    let mut recv_meta1 = Meta::new();
    recv_meta1.sender_address = Some(addr(1));
    assert!(recv_net.process_recv(&decoded1, &mut recv_meta1));

    // Replaying packet 0 after packet 1 was already accepted must be dropped.
    let mut replay_meta = Meta::new();
    replay_meta.sender_address = Some(addr(1));
    assert!(!recv_net.process_recv(&decoded0, &mut replay_meta));
}

#[test]
fn ack_callback_fires_exactly_once_on_matching_ack() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();

    let mut net = Network::new(addr(1), false, true);
    net.set_ack_callback(Arc::new(move |_id| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    }));
    let mut scheme = Scheme::new();
    net.init_connection(&mut scheme).unwrap();

    let mut frame = PreEncodeFrame::new(scheme.len());
    let mut meta = Meta::new();
    let opts = SendOptions {
        ack_type: NEEDS_ACK,
        ..SendOptions::default()
    };
    net.process_send(&mut frame, &mut meta, &opts).unwrap();
    let packet_id = meta.packet_id.unwrap();
    assert!(net.is_awaiting_ack(packet_id));

    // Build a matching ack frame with IS_ACK and the same ack_await_id.
    let mut ack_frame = PreEncodeFrame::new(scheme.len());
    let mut ack_meta = Meta::new();
    let ack_opts = SendOptions {
        ack_type: IS_ACK,
        ack_req_id: Some(packet_id),
        ..SendOptions::default()
    };
    net.process_send(&mut ack_frame, &mut ack_meta, &ack_opts).unwrap();

    let serializer = Serializer::new(scheme);
    let wire = serializer.encode(&ack_frame).unwrap();
    let (decoded, _) = serializer.decode(&wire).unwrap();

    let mut recv_meta = Meta::new();
    net.process_recv(&decoded, &mut recv_meta);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!net.is_awaiting_ack(packet_id));

    // A second identical ack frame must not fire again.
    net.process_recv(&decoded, &mut recv_meta);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn broadcast_always_targets_the_zero_address() {
    // Enable the counter feature so the forced destination is observable:
    // two sends quoting different dest_address values must still share the
    // same per-destination counter bucket (the broadcast address), so the
    // second send's counter must be 1, not 0.
    let mut scheme = Scheme::new();
    let mut node = Broadcast::new(addr(1), true, false);
    node.init_connection(&mut scheme).unwrap();
    let serializer = Serializer::new(scheme);

    let mut frame_a = PreEncodeFrame::new(serializer.encoding_scheme().len());
    let mut meta_a = Meta::new();
    node.process_send(
        &mut frame_a,
        &mut meta_a,
        SendOptions {
            dest_address: Some(addr(42)),
            ..SendOptions::default()
        },
    )
    .unwrap();

    let mut frame_b = PreEncodeFrame::new(serializer.encoding_scheme().len());
    let mut meta_b = Meta::new();
    node.process_send(
        &mut frame_b,
        &mut meta_b,
        SendOptions {
            dest_address: Some(addr(99)),
            ..SendOptions::default()
        },
    )
    .unwrap();

    let wire_a = serializer.encode(&frame_a).unwrap();
    let wire_b = serializer.encode(&frame_b).unwrap();
    let (decoded_a, _) = serializer.decode(&wire_a).unwrap();
    let (decoded_b, _) = serializer.decode(&wire_b).unwrap();
    let counter_a = decoded_a.get("counter").and_then(|v| v.as_int()).unwrap();
    let counter_b = decoded_b.get("counter").and_then(|v| v.as_int()).unwrap();
    assert_eq!(counter_a, 0);
    assert_eq!(counter_b, 1);
}

#[test]
fn multihop_classifies_deliver_forward_rebroadcast_and_drop() {
    let mut scheme = Scheme::new();
    let mut node = MultiHopUnicast::new(addr(1), false, false);
    node.init_connection(&mut scheme).unwrap();
    node.set_route(addr(9), addr(2));
    let serializer = Serializer::new(scheme);

    let mut frame = PreEncodeFrame::new(serializer.encoding_scheme().len());
    let mut meta = Meta::new();
    let opts = SendOptions {
        dest_address: Some(addr(9)),
        ..SendOptions::default()
    };
    node.process_send(&mut frame, &mut meta, opts).unwrap();
    let wire = serializer.encode(&frame).unwrap();

    // Intermediate hop (address 2): should forward toward 9.
    let mut scheme_mid = Scheme::new();
    let mut mid = MultiHopUnicast::new(addr(2), false, false);
    mid.init_connection(&mut scheme_mid).unwrap();
    mid.set_route(addr(9), addr(3));
    let serializer_mid = Serializer::new(scheme_mid);
    let (decoded_mid, _) = serializer_mid.decode(&wire).unwrap();
    let mut meta_mid = Meta::new();
    match mid.process_recv(&decoded_mid, &mut meta_mid) {
        RecvAction::Forward { dest_address, next_hop } => {
            assert_eq!(dest_address, addr(9));
            assert_eq!(next_hop, addr(3));
        }
        other => panic!("expected Forward, got {other:?}"),
    }

    // Destination node (address 9): should deliver.
    let mut scheme_dest = Scheme::new();
    let mut dest = MultiHopUnicast::new(addr(9), false, false);
    dest.init_connection(&mut scheme_dest).unwrap();
    let serializer_dest = Serializer::new(scheme_dest);
    let (decoded_dest, _) = serializer_dest.decode(&wire).unwrap();
    let mut meta_dest = Meta::new();
    assert_eq!(dest.process_recv(&decoded_dest, &mut meta_dest), RecvAction::Deliver);
    assert_eq!(meta_dest.origin_address, Some(addr(1)));

    // An uninvolved node (address 5): should drop.
    let mut scheme_other = Scheme::new();
    let mut other = MultiHopUnicast::new(addr(5), false, false);
    other.init_connection(&mut scheme_other).unwrap();
    let serializer_other = Serializer::new(scheme_other);
    let (decoded_other, _) = serializer_other.decode(&wire).unwrap();
    let mut meta_other = Meta::new();
    assert_eq!(other.process_recv(&decoded_other, &mut meta_other), RecvAction::Drop);
}

#[test]
fn multihop_queues_an_ack_request_against_the_origin_and_pops_it_on_reply() {
    // Origin (1) sends a NEEDS_ACK packet to destination (9) over a direct
    // route. Destination must queue the request against origin's address and
    // pop it (filling ack_req_id) the next time it sends back toward origin.
    let mut scheme_origin = Scheme::new();
    let mut origin = MultiHopUnicast::new(addr(1), false, true);
    origin.init_connection(&mut scheme_origin).unwrap();
    origin.set_route(addr(9), addr(9));
    let serializer_origin = Serializer::new(scheme_origin);

    let mut frame = PreEncodeFrame::new(serializer_origin.encoding_scheme().len());
    let mut meta = Meta::new();
    let opts = SendOptions {
        dest_address: Some(addr(9)),
        ack_type: NEEDS_ACK,
        ..SendOptions::default()
    };
    origin.process_send(&mut frame, &mut meta, opts).unwrap();
    let original_packet_id = meta.packet_id.unwrap();
    let wire = serializer_origin.encode(&frame).unwrap();

    let mut scheme_dest = Scheme::new();
    let mut dest = MultiHopUnicast::new(addr(9), false, true);
    dest.init_connection(&mut scheme_dest).unwrap();
    dest.set_route(addr(1), addr(1));
    let serializer_dest = Serializer::new(scheme_dest);
    let (decoded, _) = serializer_dest.decode(&wire).unwrap();
    let mut recv_meta = Meta::new();
    assert_eq!(dest.process_recv(&decoded, &mut recv_meta), RecvAction::Deliver);

    let mut ack_frame = PreEncodeFrame::new(serializer_dest.encoding_scheme().len());
    let mut ack_meta = Meta::new();
    let ack_opts = SendOptions {
        dest_address: Some(addr(1)),
        ack_type: IS_ACK,
        ..SendOptions::default()
    };
    dest.process_send(&mut ack_frame, &mut ack_meta, ack_opts).unwrap();
    let ack_wire = serializer_dest.encode(&ack_frame).unwrap();

    let (decoded_ack, _) = serializer_origin.decode(&ack_wire).unwrap();
    let ack_await_id = decoded_ack.get("ack_await_id").and_then(|v| v.as_int()).unwrap();
    assert_eq!(ack_await_id, u64::from(original_packet_id));
}

#[test]
fn flooding_converges_interval_to_i_max_without_inconsistency() {
    use std::time::Duration;

    let params = FloodingParams {
        i_min: Duration::from_millis(100),
        i_max: Duration::from_millis(800),
        k: 1,
        versioning: true,
    };
    let node = Flooding::new(addr(1), params, 1, b"hello".to_vec());
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    assert_eq!(node.interval_length(), Duration::from_millis(100));
    for _ in 0..4 {
        node.on_interval_end(&mut rng);
    }
    assert_eq!(node.interval_length(), Duration::from_millis(800));
}

#[test]
fn flooding_resets_on_newer_inconsistent_version() {
    use std::time::Duration;

    let params = FloodingParams {
        i_min: Duration::from_millis(100),
        i_max: Duration::from_millis(800),
        k: 1,
        versioning: true,
    };
    let node = Flooding::new(addr(1), params, 1, b"hello".to_vec());
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    node.on_interval_end(&mut rng);
    assert_eq!(node.interval_length(), Duration::from_millis(200));

    let updated = node.on_inconsistent_receive(2, b"world".to_vec(), &mut rng);
    assert!(updated);
    assert_eq!(node.version_id(), 2);
    assert_eq!(node.default_data(), b"world".to_vec());
    assert_eq!(node.interval_length(), Duration::from_millis(100));

    // A stale version does not overwrite local state.
    let stale = node.on_inconsistent_receive(1, b"old".to_vec(), &mut rng);
    assert!(!stale);
    assert_eq!(node.version_id(), 2);
}

#[test]
fn flooding_with_versioning_disabled_treats_an_identical_payload_as_consistent() {
    use std::time::Duration;

    let params = FloodingParams {
        i_min: Duration::from_millis(100),
        i_max: Duration::from_millis(800),
        k: 1,
        versioning: false,
    };
    let mut scheme = Scheme::new();
    let mut node = Flooding::new(addr(1), params, 0, b"same".to_vec());
    node.init_connection(&mut scheme).unwrap();
    let serializer = Serializer::new(scheme);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut frame = PreEncodeFrame::new(serializer.encoding_scheme().len());
    let mut meta = Meta::new();
    node.process_send(&mut frame, &mut meta).unwrap();
    let wire = serializer.encode(&frame).unwrap();
    let (decoded, _) = serializer.decode(&wire).unwrap();

    // An identical payload must not reset the interval or bump the version.
    node.on_interval_end(&mut rng);
    assert_eq!(node.interval_length(), Duration::from_millis(200));
    let mut recv_meta = Meta::new();
    let updated = node.process_recv(&decoded, &mut recv_meta, b"same".to_vec(), &mut rng);
    assert!(!updated);
    assert_eq!(node.counter(), 1);
    assert_eq!(node.interval_length(), Duration::from_millis(200));

    // A differing payload is inconsistent: it resets the interval and adopts the new data.
    let mut recv_meta2 = Meta::new();
    let updated2 = node.process_recv(&decoded, &mut recv_meta2, b"different".to_vec(), &mut rng);
    assert!(updated2);
    assert_eq!(node.default_data(), b"different".to_vec());
    assert_eq!(node.interval_length(), Duration::from_millis(100));
}
