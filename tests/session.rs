// Full session lifecycle over loopback: registration and welcome, rights,
// state proposals flowing into the world through the session, snapshot
// sync, graceful leave, dead-link reaping, and teardown notices.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use muxlink::protocol::frame::read_frame;
use muxlink::protocol::session::{Leave, SessionMessage};
use muxlink::{
    Address, Block, Channel, Consignment, DecodeError, Enumerator, Link, LinkListener, MuxLink,
    Rights, Session, SessionEvent, World,
};
use tokio::net::TcpStream;

/// World that records every applied proposal and serves them back as the
/// snapshot, concatenated.
#[derive(Default)]
struct LogWorld {
    applied: Vec<(Address, Vec<u8>)>,
}

impl World for LogWorld {
    fn apply(&mut self, from: &Address, update: &Block) -> Result<(), DecodeError> {
        self.applied.push((*from, update.as_slice().to_vec()));
        Ok(())
    }

    fn snapshot(&self) -> Block {
        let bytes: Vec<u8> = self
            .applied
            .iter()
            .flat_map(|(_, update)| update.iter().copied())
            .collect();
        Block::from_vec(bytes)
    }
}

async fn session_with_one_client() -> (Session<LogWorld>, MuxLink, muxlink::Id) {
    let listener = LinkListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let mut session = Session::new(LogWorld::default(), Arc::new(Enumerator::new()));
    let (outbound, inbound) = tokio::join!(MuxLink::connect(listener.local_addr()), listener.accept());
    let party = session.register(inbound.unwrap()).unwrap();
    (session, outbound.unwrap(), party)
}

async fn recv_one(link: &mut MuxLink) -> Consignment {
    for _ in 0..400 {
        if let Some(consignment) = link.receive() {
            return consignment;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no consignment arrived");
}

fn decode_control(consignment: &Consignment) -> SessionMessage {
    assert_eq!(consignment.channel(), Channel::CONTROL);
    SessionMessage::decode(&mut consignment.block().clone().into_bytes()).unwrap()
}

fn control_consignment(peer: Address, msg: &SessionMessage) -> Consignment {
    let mut buf = BytesMut::new();
    msg.encode(&mut buf);
    Consignment::from_block(Channel::CONTROL, peer, Block::from_shared(buf.freeze()))
}

/// Polls the session until `pred` holds or the attempts run out.
async fn poll_until<W, F>(session: &mut Session<W>, events: &mut Vec<SessionEvent>, pred: F)
where
    W: World,
    F: Fn(&Session<W>, &[SessionEvent]) -> bool,
{
    for _ in 0..400 {
        events.extend(session.poll());
        if pred(session, events) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached the expected state");
}

#[tokio::test]
async fn registration_welcomes_the_party_and_grants_local_admin() {
    let (mut session, mut client, party) = session_with_one_client().await;

    // Loopback connections are recognised as local.
    assert_eq!(session.rights(party), Some(Rights::ADMIN));
    assert_eq!(session.client_count(), 1);

    let events = session.poll();
    assert!(matches!(events[..], [SessionEvent::Joined { party: p, .. }] if p == party));

    let welcome = recv_one(&mut client).await;
    match decode_control(&welcome) {
        SessionMessage::Welcome(w) => {
            assert_eq!(w.session, session.id());
            assert_eq!(w.party, party);
            assert!(w.state.is_empty());
        }
        other => panic!("expected Welcome, got {other:?}"),
    }
}

#[tokio::test]
async fn state_proposals_reach_the_world_and_sync_comes_back() {
    let (mut session, mut client, _party) = session_with_one_client().await;
    let _welcome = recv_one(&mut client).await;

    client
        .send(Consignment::from_block(
            Channel::STATE,
            client.peer(),
            Block::from_vec(b"tic1".to_vec()),
        ))
        .unwrap();

    let mut events = Vec::new();
    poll_until(&mut session, &mut events, |s, _| !s.world().applied.is_empty()).await;
    let (from, update) = &session.world().applied[0];
    assert_eq!(update, b"tic1");
    assert!(from.is_local());

    session.sync_clients();
    let sync = recv_one(&mut client).await;
    assert_eq!(sync.channel(), Channel::STATE);
    assert_eq!(sync.block().as_slice(), b"tic1");
}

#[tokio::test]
async fn joins_and_leaves_are_announced_to_the_others() {
    let listener = LinkListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let mut session = Session::new(LogWorld::default(), Arc::new(Enumerator::new()));

    let (first, inbound) = tokio::join!(MuxLink::connect(listener.local_addr()), listener.accept());
    let mut first = first.unwrap();
    session.register(inbound.unwrap()).unwrap();
    let _welcome = recv_one(&mut first).await;

    let (second, inbound) = tokio::join!(MuxLink::connect(listener.local_addr()), listener.accept());
    let second = second.unwrap();
    let second_party = session.register(inbound.unwrap()).unwrap();

    match decode_control(&recv_one(&mut first).await) {
        SessionMessage::PartyJoined(joined) => assert_eq!(joined.party, second_party),
        other => panic!("expected PartyJoined, got {other:?}"),
    }

    second
        .send(control_consignment(
            second.peer(),
            &SessionMessage::from(Leave {}),
        ))
        .unwrap();
    let mut events = Vec::new();
    poll_until(&mut session, &mut events, |s, _| s.client_count() == 1).await;
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::Left { party, .. } if *party == second_party))
    );

    match decode_control(&recv_one(&mut first).await) {
        SessionMessage::PartyLeft(left) => assert_eq!(left.party, second_party),
        other => panic!("expected PartyLeft, got {other:?}"),
    }
}

#[tokio::test]
async fn dead_links_are_reaped() {
    let (mut session, client, party) = session_with_one_client().await;

    client.close();
    let mut events = Vec::new();
    poll_until(&mut session, &mut events, |s, _| s.client_count() == 0).await;
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::Left { party: p, .. } if *p == party))
    );
}

#[tokio::test]
async fn shutdown_notifies_parties_before_the_world_goes() {
    let listener = LinkListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let mut session = Session::new(LogWorld::default(), Arc::new(Enumerator::new()));

    // A raw framed stream instead of a MuxLink handle, so the teardown
    // notice can be observed on the wire without racing local closure.
    let (raw, inbound) = tokio::join!(
        TcpStream::connect(listener.local_addr().socket_addr()),
        listener.accept()
    );
    let mut raw = raw.unwrap();
    session.register(inbound.unwrap()).unwrap();

    let (channel, payload) = read_frame(&mut raw).await.unwrap().unwrap();
    assert_eq!(channel, Channel::CONTROL);
    assert!(matches!(
        SessionMessage::decode(&mut &payload[..]).unwrap(),
        SessionMessage::Welcome(_)
    ));

    session.shutdown();
    assert_eq!(session.client_count(), 0);

    let (channel, payload) = read_frame(&mut raw).await.unwrap().unwrap();
    assert_eq!(channel, Channel::CONTROL);
    assert!(matches!(
        SessionMessage::decode(&mut &payload[..]).unwrap(),
        SessionMessage::SessionEnded(_)
    ));

    // After the notice the link is closed from the session side.
    assert!(read_frame(&mut raw).await.unwrap().is_none());
}
