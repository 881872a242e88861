//! End-to-end scenarios against a direct broker
//!
//! The broker never touches data: subscribers learn publisher addresses
//! from registration replies and pushed announcements, then dial the
//! publishers themselves.

mod common;

use tokio::time::{sleep, timeout};
use zeromq::{Socket, SocketRecv, SocketSend, ZmqMessage};

use topicbus::{BrokerKind, Publisher, Subscriber};

use common::{addr, collector, start_broker, RECV_TIMEOUT, SETTLE, SILENCE};

#[tokio::test]
async fn existing_publisher_is_discovered_synchronously() {
    start_broker(BrokerKind::Direct, 6200).await;

    // Publisher registers before any subscriber exists
    let mut publisher = Publisher::bind(addr(6201), addr(6200)).await.unwrap();
    assert_eq!(
        publisher.register("numbers").await.unwrap(),
        BrokerKind::Direct
    );

    let mut subscriber = Subscriber::bind(addr(6202), addr(6200)).await.unwrap();
    assert_eq!(
        subscriber.register("numbers").await.unwrap(),
        BrokerKind::Direct
    );

    // The registration reply carried the existing publisher's address
    let known: Vec<_> = subscriber.known_publishers().cloned().collect();
    assert_eq!(known, vec![addr(6201)]);

    let (collected, callback) = collector();
    subscriber.set_callback(callback);

    sleep(SETTLE).await;

    for i in 0..100 {
        publisher.publish("numbers", i.to_string()).await.unwrap();
    }
    for _ in 0..100 {
        timeout(RECV_TIMEOUT, subscriber.wait_for_message())
            .await
            .expect("direct delivery timed out")
            .unwrap();
    }

    let expected: Vec<(String, String)> = (0..100)
        .map(|i| ("numbers".to_string(), i.to_string()))
        .collect();
    assert_eq!(*collected.lock().unwrap(), expected);
}

#[tokio::test]
async fn late_publisher_is_announced_and_dialled() {
    start_broker(BrokerKind::Direct, 6210).await;

    // Subscriber first: the snapshot is empty
    let mut subscriber = Subscriber::bind(addr(6211), addr(6210)).await.unwrap();
    subscriber.register("numbers").await.unwrap();
    assert_eq!(subscriber.known_publishers().count(), 0);

    let (collected, callback) = collector();
    subscriber.set_callback(callback);
    let mut listener = subscriber.start_listener().unwrap();

    // Let the announce channel settle before the publisher registers
    sleep(SETTLE).await;

    // The message loop must be waiting so it can service the discovery
    let receiver = tokio::spawn(async move {
        for _ in 0..5 {
            subscriber.wait_for_message().await.unwrap();
        }
        subscriber
    });

    let mut publisher = Publisher::bind(addr(6212), addr(6210)).await.unwrap();
    publisher.register("numbers").await.unwrap();

    let announcement = timeout(RECV_TIMEOUT, listener.wait_for_announcement())
        .await
        .expect("announcement timed out")
        .unwrap();
    assert_eq!(announcement.topic, "numbers");
    assert_eq!(announcement.address, addr(6212));

    // Give the subscriber time to dial the announced address
    sleep(SETTLE).await;

    for i in 0..5 {
        publisher.publish("numbers", format!("m{i}")).await.unwrap();
    }

    let subscriber = timeout(RECV_TIMEOUT, receiver)
        .await
        .expect("direct delivery timed out")
        .unwrap();
    assert!(subscriber.known_publishers().any(|a| *a == addr(6212)));

    let expected: Vec<(String, String)> = (0..5)
        .map(|i| ("numbers".to_string(), format!("m{i}")))
        .collect();
    assert_eq!(*collected.lock().unwrap(), expected);
}

#[tokio::test]
async fn snapshot_has_one_entry_per_publisher() {
    start_broker(BrokerKind::Direct, 6220).await;

    let mut pub_one = Publisher::bind(addr(6221), addr(6220)).await.unwrap();
    pub_one.register("numbers").await.unwrap();
    // Registering twice must not produce a second registry entry
    pub_one.register("numbers").await.unwrap();

    let mut pub_two = Publisher::bind(addr(6222), addr(6220)).await.unwrap();
    pub_two.register("numbers").await.unwrap();

    let mut subscriber = Subscriber::bind(addr(6223), addr(6220)).await.unwrap();
    subscriber.register("numbers").await.unwrap();

    let known: Vec<_> = subscriber.known_publishers().cloned().collect();
    assert_eq!(known.len(), 2);
    assert!(known.contains(&addr(6221)));
    assert!(known.contains(&addr(6222)));

    // Exactly one announcement per subsequently registered publisher
    let mut listener = subscriber.start_listener().unwrap();
    sleep(SETTLE).await;

    let mut pub_three = Publisher::bind(addr(6224), addr(6220)).await.unwrap();
    pub_three.register("numbers").await.unwrap();

    let announcement = timeout(RECV_TIMEOUT, listener.wait_for_announcement())
        .await
        .expect("announcement timed out")
        .unwrap();
    assert_eq!(announcement.address, addr(6224));

    assert!(timeout(SILENCE, listener.wait_for_announcement())
        .await
        .is_err());
}

#[tokio::test]
async fn unconnectable_subscriber_does_not_kill_broker() {
    start_broker(BrokerKind::Direct, 6240).await;

    // Syntactically valid but unconnectable: the broker's announce
    // connect toward it fails, which must not end the registration loop.
    let mut rogue = zeromq::ReqSocket::new();
    rogue.connect(&addr(6240).to_string()).await.unwrap();

    let mut reg = ZmqMessage::from("REGISTER_SUBSCRIBER");
    reg.push_back("numbers".into());
    reg.push_back("tcp://127.0.0.1:1".into());
    rogue.send(reg).await.unwrap();

    // The reply still arrives, with an empty snapshot
    let reply = timeout(RECV_TIMEOUT, rogue.recv())
        .await
        .expect("registration reply timed out")
        .unwrap();
    assert_eq!(reply.get(0).map(|f| f.as_ref()), Some(b"DIRECT".as_slice()));
    assert_eq!(reply.get(1).map(|f| f.as_ref()), Some(b"0".as_slice()));

    // And the broker keeps serving well-formed registrants
    let mut publisher = Publisher::bind(addr(6241), addr(6240)).await.unwrap();
    let kind = timeout(RECV_TIMEOUT, publisher.register("numbers"))
        .await
        .expect("broker stopped serving")
        .unwrap();
    assert_eq!(kind, BrokerKind::Direct);
}

#[tokio::test]
async fn listener_requires_direct_mode() {
    start_broker(BrokerKind::Route, 6230).await;

    let mut subscriber = Subscriber::bind(addr(6231), addr(6230)).await.unwrap();
    subscriber.register("numbers").await.unwrap();

    assert!(matches!(
        subscriber.start_listener(),
        Err(topicbus::Error::NotDirectMode)
    ));
}
