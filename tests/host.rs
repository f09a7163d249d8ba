//! End-to-end scenarios driving the runners against an in-memory
//! transport.

mod common;

use acl_host::prelude::*;
use common::*;
use critical_section as _;
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;

fn addr(last: u8) -> BdAddr {
    BdAddr::new([last, 0x11, 0x22, 0x33, 0x44, 0x55])
}

fn pdu(frame: &[u8]) -> Pdu<<DefaultPacketPool as PacketPool>::Packet> {
    Pdu::copy_from_slice::<DefaultPacketPool>(frame).expect("pool exhausted")
}

/// Runs `test` concurrently with the host runners; the test side must
/// finish first.
fn run<F: core::future::Future<Output = ()>>(
    runner: Runner<'_, TestTransport, DefaultPacketPool>,
    test: F,
) {
    let mut runner = runner;
    block_on(async {
        match select(test, runner.run()).await {
            Either::First(()) => {}
            Either::Second(r) => panic!("runner exited early: {:?}", r.err()),
        }
    });
}

#[test]
fn classic_outbound_connect_success() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = addr(0x01);
        let handle = ConnHandle::new(0x42);

        let (conn, _) = join(acl.connect(peer), async {
            loop {
                if let Command::CreateConnection { addr, .. } = t.next_command().await {
                    assert_eq!(addr, peer);
                    break;
                }
            }
            let (code, p) = connection_complete(Status::SUCCESS, handle, peer);
            t.push_event(code, &p);
        })
        .await;

        let conn = conn.expect("connect should succeed");
        assert_eq!(conn.handle(), handle);
        assert!(conn.is_connected());
        assert_eq!(conn.peer_address().unwrap().addr, peer);

        // Exactly one page attempt was issued.
        assert!(t.try_next_command().is_none());

        // The scheduler registration is live: an enqueued PDU goes out on
        // this handle.
        conn.try_send(pdu(&l2cap_frame(0x0040, &[1, 2, 3]))).unwrap();
        let raw = t.next_acl().await;
        let packet = AclPacket::from_hci_bytes(&raw).unwrap();
        assert_eq!(packet.handle(), handle);
    });
}

#[test]
fn classic_outbound_connect_failure() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = addr(0x02);
        let (outcome, _) = join(acl.connect(peer), async {
            loop {
                if let Command::CreateConnection { .. } = t.next_command().await {
                    break;
                }
            }
            let (code, p) =
                connection_complete(Status::PAGE_TIMEOUT, ConnHandle::new(0), peer);
            t.push_event(code, &p);
        })
        .await;
        assert_eq!(outcome.err(), Some(Error::ConnectFailed(Status::PAGE_TIMEOUT)));

        // The connecting set was released: another attempt is dispatched
        // immediately.
        let (_, _) = join(
            async {
                let _ = acl.connect(peer).await;
            },
            async {
                loop {
                    if let Command::CreateConnection { addr, .. } = t.next_command().await {
                        assert_eq!(addr, peer);
                        break;
                    }
                }
                let (code, p) =
                    connection_complete(Status::PAGE_TIMEOUT, ConnHandle::new(0), peer);
                t.push_event(code, &p);
            },
        )
        .await;
    });
}

#[test]
fn connect_outcome_follows_the_event_not_the_command_status() {
    let t = transport();
    // The page attempt resolves with a failed Command Status, which is
    // only logged; the Connection Complete event alone decides the
    // outcome and carries a different error code to tell them apart.
    t.set_command_status(Status::COMMAND_DISALLOWED);
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = addr(0x04);
        let (outcome, _) = join(acl.connect(peer), async {
            loop {
                if let Command::CreateConnection { .. } = t.next_command().await {
                    break;
                }
            }
            // The failed status must leave the attempt pending.
            for _ in 0..16 {
                yield_now().await;
            }
            let (code, p) = connection_complete(Status::PAGE_TIMEOUT, ConnHandle::new(0), peer);
            t.push_event(code, &p);
        })
        .await;
        assert_eq!(outcome.err(), Some(Error::ConnectFailed(Status::PAGE_TIMEOUT)));
    });
}

#[test]
fn le_connect_outcome_follows_the_event_not_the_command_status() {
    let t = transport();
    t.set_command_status(Status::COMMAND_DISALLOWED);
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = Address::random([0x0d, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let (outcome, _) = join(acl.connect_le(peer), async {
            loop {
                if let Command::LeCreateConnection { .. } = t.next_command().await {
                    break;
                }
            }
            for _ in 0..16 {
                yield_now().await;
            }
            let (code, p) =
                le_connection_complete(Status::CONN_FAILED_TO_ESTABLISH, ConnHandle::new(0), peer.addr);
            t.push_event(code, &p);
        })
        .await;
        assert_eq!(
            outcome.err(),
            Some(Error::ConnectFailed(Status::CONN_FAILED_TO_ESTABLISH))
        );
    });
}

#[test]
fn second_classic_connect_waits_for_first() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let p1 = addr(0x01);
        let p2 = addr(0x02);
        let h1 = ConnHandle::new(0x01);
        let h2 = ConnHandle::new(0x02);

        let ((c1, c2), _) = join(join(acl.connect(p1), acl.connect(p2)), async {
            // Only p1 is paged; p2 must wait in the pending queue.
            loop {
                if let Command::CreateConnection { addr, .. } = t.next_command().await {
                    assert_eq!(addr, p1);
                    break;
                }
            }
            let (code, p) = connection_complete(Status::SUCCESS, h1, p1);
            t.push_event(code, &p);

            // Completion of p1 dispatches the queued attempt for p2.
            loop {
                if let Command::CreateConnection { addr, .. } = t.next_command().await {
                    assert_eq!(addr, p2);
                    break;
                }
            }
            let (code, p) = connection_complete(Status::SUCCESS, h2, p2);
            t.push_event(code, &p);
        })
        .await;

        assert_eq!(c1.unwrap().handle(), h1);
        assert_eq!(c2.unwrap().handle(), h2);
    });
}

#[test]
fn round_robin_alternates_between_connections() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let h1 = ConnHandle::new(0x01);
        let h2 = ConnHandle::new(0x02);
        let (code, p) = connection_complete(Status::SUCCESS, h1, addr(0x01));
        t.push_event(code, &p);
        let (code, p) = connection_complete(Status::SUCCESS, h2, addr(0x02));
        t.push_event(code, &p);

        let c1 = acl.accept(LinkKind::Classic).await;
        let c2 = acl.accept(LinkKind::Classic).await;
        assert_eq!(c1.handle(), h1);
        assert_eq!(c2.handle(), h2);

        // Enqueue everything before the tx runner gets to run again.
        c1.try_send(pdu(&l2cap_frame(0x40, &[0x1a]))).unwrap();
        c1.try_send(pdu(&l2cap_frame(0x40, &[0x1b]))).unwrap();
        c2.try_send(pdu(&l2cap_frame(0x40, &[0x2a]))).unwrap();
        c2.try_send(pdu(&l2cap_frame(0x40, &[0x2b]))).unwrap();

        let mut order = Vec::new();
        for _ in 0..4 {
            let raw = t.next_acl().await;
            let packet = AclPacket::from_hci_bytes(&raw).unwrap();
            assert_eq!(packet.boundary_flag(), AclPacketBoundary::FirstFlushable);
            order.push((packet.handle(), packet.data()[4]));
        }
        assert_eq!(
            order,
            vec![(h1, 0x1a), (h2, 0x2a), (h1, 0x1b), (h2, 0x2b)]
        );
    });
}

#[test]
fn outbound_pdu_is_fragmented() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let handle = ConnHandle::new(0x07);
        let (code, p) = connection_complete(Status::SUCCESS, handle, addr(0x07));
        t.push_event(code, &p);
        let conn = acl.accept(LinkKind::Classic).await;

        let payload: Vec<u8> = (0u8..66).collect();
        let frame = l2cap_frame(0x0040, &payload);
        assert_eq!(frame.len(), 70);
        conn.try_send(pdu(&frame)).unwrap();

        // 70 bytes at a 27 byte fragment size: 27 + 27 + 16.
        let mut reassembled = Vec::new();
        for (i, expected_len) in [27usize, 27, 16].iter().enumerate() {
            let raw = t.next_acl().await;
            let packet = AclPacket::from_hci_bytes(&raw).unwrap();
            assert_eq!(packet.handle(), handle);
            assert_eq!(packet.data().len(), *expected_len);
            let expected_flag = if i == 0 {
                AclPacketBoundary::FirstFlushable
            } else {
                AclPacketBoundary::Continuing
            };
            assert_eq!(packet.boundary_flag(), expected_flag);
            reassembled.extend_from_slice(packet.data());
        }
        assert_eq!(reassembled, frame);
    });
}

#[test]
fn credits_gate_transmission() {
    let t = transport();
    t.set_acl_buffers(2);
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let handle = ConnHandle::new(0x01);
        let (code, p) = connection_complete(Status::SUCCESS, handle, addr(0x01));
        t.push_event(code, &p);
        let conn = acl.accept(LinkKind::Classic).await;

        for tag in 0..3u8 {
            conn.try_send(pdu(&l2cap_frame(0x40, &[tag]))).unwrap();
        }

        // Two buffers, so only two fragments leave.
        assert_eq!(t.next_acl().await[8], 0);
        assert_eq!(t.next_acl().await[8], 1);
        for _ in 0..16 {
            yield_now().await;
        }
        assert!(t.try_next_acl().is_none());

        // A completed-packets return releases the third.
        let (code, p) = number_of_completed_packets(handle, 1);
        t.push_event(code, &p);
        assert_eq!(t.next_acl().await[8], 2);
    });
}

#[test]
fn inbound_pdus_outlive_disconnection() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let handle = ConnHandle::new(0x05);
        let (code, p) = connection_complete(Status::SUCCESS, handle, addr(0x05));
        t.push_event(code, &p);
        let conn = acl.accept(LinkKind::Classic).await;

        for tag in 0..3u8 {
            let frame = l2cap_frame(0x0040, &[tag]);
            t.push_acl(&AclPacket::new(
                handle,
                AclPacketBoundary::FirstFlushable,
                AclBroadcastFlag::PointToPoint,
                &frame,
            ));
        }
        let (code, p) = disconnection_complete(handle, Status::REMOTE_USER_TERMINATED);
        t.push_event(code, &p);

        // The disconnect event is delivered once everything queued before
        // it has been processed.
        assert_eq!(
            conn.next_event().await,
            ConnectionEvent::Disconnected {
                reason: Status::REMOTE_USER_TERMINATED
            }
        );
        assert!(!conn.is_connected());

        // The three PDUs are still dequeueable, in order.
        for tag in 0..3u8 {
            let pdu = conn.try_receive().unwrap();
            assert_eq!(pdu.as_ref()[4], tag);
        }
        assert!(conn.try_receive().is_err());

        // Commands after disconnect fail synchronously.
        assert_eq!(conn.read_rssi().err(), Some(Error::Disconnected));
        conn.finish();
    });
}

#[test]
fn le_connection_update_one_shot() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = Address::random([0x0a, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let handle = ConnHandle::new(0x100);

        let (conn, _) = join(acl.connect_le(peer), async {
            loop {
                // Feature mask is zero: the legacy create must be used.
                match t.next_command().await {
                    Command::LeCreateConnection { peer: p, .. } => {
                        assert_eq!(p, peer);
                        break;
                    }
                    Command::LeExtendedCreateConnection { .. } => {
                        panic!("extended create without controller support")
                    }
                    _ => {}
                }
            }
            let (code, p) = le_connection_complete(Status::SUCCESS, handle, peer.addr);
            t.push_event(code, &p);
        })
        .await;
        let conn = conn.expect("le connect should succeed");
        assert_eq!(conn.kind(), Some(LinkKind::Le));

        // Out-of-range parameters fail synchronously, no command issued.
        let invalid = LeConnectionUpdateParams {
            conn_interval_min: 0x0005,
            conn_interval_max: 0x0028,
            conn_latency: 0,
            supervision_timeout: 0x01f4,
            min_ce_length: 0x0002,
            max_ce_length: 0x0c00,
        };
        assert_eq!(
            conn.le_connection_update(&invalid).await.err(),
            Some(Error::InvalidValue)
        );
        assert!(t.try_next_command().is_none());

        let valid = LeConnectionUpdateParams {
            conn_interval_min: 0x0018,
            conn_interval_max: 0x0028,
            conn_latency: 0x0000,
            supervision_timeout: 0x01f4,
            min_ce_length: 0x0002,
            max_ce_length: 0x0c00,
        };
        let (status, _) = join(conn.le_connection_update(&valid), async {
            loop {
                if let Command::LeConnectionUpdate { handle: h, params } =
                    t.next_command().await
                {
                    assert_eq!(h, handle);
                    assert_eq!(params, valid);
                    break;
                }
            }
            let (code, p) = le_connection_update_complete(Status::SUCCESS, handle);
            t.push_event(code, &p);
        })
        .await;
        assert!(status.unwrap().is_success());
    });
}

#[test]
fn extended_create_is_used_when_supported() {
    let t = transport();
    // Feature bit for extended create connection.
    t.set_le_features(0x0010);
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let random = BdAddr::new([0x22, 0x33, 0xff, 0xff, 0x11, 0x00]);
    let stack = acl_host::new(t, &mut resources).set_random_address(random);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = Address::random([0x0c, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let handle = ConnHandle::new(0x101);

        let (conn, _) = join(acl.connect_le(peer), async {
            // Bring-up configures the random address once already; the
            // extended create re-writes it right before initiating.
            let mut saw_random = false;
            loop {
                match t.next_command().await {
                    Command::LeSetRandomAddress { addr } => {
                        assert_eq!(addr, random);
                        saw_random = true;
                    }
                    Command::LeExtendedCreateConnection {
                        peer: p,
                        own_addr_random,
                        ..
                    } => {
                        assert!(saw_random);
                        assert!(own_addr_random);
                        assert_eq!(p, peer);
                        break;
                    }
                    Command::LeCreateConnection { .. } => {
                        panic!("legacy create despite controller support")
                    }
                    _ => {}
                }
            }
            let (code, p) = le_connection_complete(Status::SUCCESS, handle, peer.addr);
            t.push_event(code, &p);
        })
        .await;
        assert_eq!(conn.expect("le connect should succeed").handle(), handle);
    });
}

#[test]
fn inbound_request_rejected_without_acceptor() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { runner, .. } = stack.build();

    run(runner, async {
        let peer = addr(0x09);
        let (code, p) = connection_request(peer);
        t.push_event(code, &p);

        loop {
            if let Command::RejectConnectionRequest { addr, reason } = t.next_command().await {
                assert_eq!(addr, peer);
                assert_eq!(reason, RejectReason::LimitedResources);
                break;
            }
        }
    });
}

#[test]
fn inbound_request_accepted_with_policy() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources).set_accept_policy(AcceptPolicy::Accept);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let peer = addr(0x0b);
        let handle = ConnHandle::new(0x0b);
        let (code, p) = connection_request(peer);
        t.push_event(code, &p);

        loop {
            if let Command::AcceptConnectionRequest { addr, role } = t.next_command().await {
                assert_eq!(addr, peer);
                assert_eq!(role, Role::Central);
                break;
            }
        }
        let (code, p) = connection_complete(Status::SUCCESS, handle, peer);
        t.push_event(code, &p);

        let conn = acl.accept(LinkKind::Classic).await;
        assert_eq!(conn.handle(), handle);
        assert_eq!(conn.peer_address().unwrap().addr, peer);
    });
}

#[test]
fn management_events_reach_the_subscriber() {
    let t = transport();
    let mut resources: AclResources<DefaultPacketPool, 3> = AclResources::new();
    let stack = acl_host::new(t, &mut resources);
    let Host { acl, runner, .. } = stack.build();

    run(runner, async {
        let handle = ConnHandle::new(0x21);
        let (code, p) = connection_complete(Status::SUCCESS, handle, addr(0x21));
        t.push_event(code, &p);
        let conn = acl.accept(LinkKind::Classic).await;

        // An unsolicited mode change arrives as an event.
        let (code, p) = mode_change(handle, 0x02, 0x0320);
        t.push_event(code, &p);
        assert_eq!(
            conn.next_event().await,
            ConnectionEvent::ModeChange {
                mode: Mode::Sniff,
                interval: 0x0320
            }
        );

        // A command with return parameters is routed back as an event.
        conn.role_discovery().unwrap();
        assert_eq!(
            conn.next_event().await,
            ConnectionEvent::RoleDiscoveryComplete {
                role: Role::Central
            }
        );
    });
}
