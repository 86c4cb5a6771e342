#![feature(test)]

extern crate test;
extern crate mqtt_core as core;

use test::Bencher;

use core::{
    encode_packet, ConnectHeader, LastWill, Packet, PublishHeader, QoS, SubAckHeader,
    SubscribeHeader, SubscriptionRequest, UnsubscribeHeader,
};

#[bench]
fn bench_encode_connect_packets(b: &mut Bencher) {
    let p = Packet::Connect(ConnectHeader {
        client_id: "12345".into(),
        clean_session: false,
        keep_alive: 60,
        last_will: Some(LastWill {
            topic: "topic".into(),
            payload: b"message".to_vec(),
            qos: QoS::ExactlyOnce,
            retain: false,
            ..Default::default()
        }),
        ..Default::default()
    });

    let mut v = Vec::new();

    b.iter(|| {
        v.clear();
        encode_packet(&p, &[], &mut v).unwrap();
    });
}

#[bench]
fn bench_encode_publish_packets(b: &mut Bencher) {
    let p = Packet::Publish(PublishHeader {
        topic: "topic".into(),
        dup: true,
        retain: true,
        qos: QoS::ExactlyOnce,
        packet_id: Some(0x4321),
        ..Default::default()
    });

    let mut v = Vec::new();

    b.iter(|| {
        v.clear();
        encode_packet(&p, b"data", &mut v).unwrap();
    });
}

#[bench]
fn bench_encode_subscribe_packets(b: &mut Bencher) {
    let p = Packet::Subscribe(SubscribeHeader {
        packet_id: 0x1234,
        subscriptions: vec![
            SubscriptionRequest {
                topic_filter: "test".into(),
                qos: QoS::AtLeastOnce,
                no_local: false,
                retain_as_published: false,
                retain_handling: Default::default(),
            },
            SubscriptionRequest {
                topic_filter: "filter".into(),
                qos: QoS::ExactlyOnce,
                no_local: false,
                retain_as_published: false,
                retain_handling: Default::default(),
            },
        ],
        ..Default::default()
    });

    let mut v = Vec::new();

    b.iter(|| {
        v.clear();
        encode_packet(&p, &[], &mut v).unwrap();
    });
}

#[bench]
fn bench_encode_subscribe_ack_packets(b: &mut Bencher) {
    let p = Packet::SubscribeAck(SubAckHeader {
        packet_id: 0x1234,
        reason_codes: vec![QoS::AtLeastOnce as u8, 0x80, QoS::ExactlyOnce as u8],
        ..Default::default()
    });

    let mut v = Vec::new();

    b.iter(|| {
        v.clear();
        encode_packet(&p, &[], &mut v).unwrap();
    });
}

#[bench]
fn bench_encode_unsubscribe_packets(b: &mut Bencher) {
    let p = Packet::Unsubscribe(UnsubscribeHeader {
        packet_id: 0x1234,
        topic_filters: vec!["test".into(), "filter".into()],
        ..Default::default()
    });

    let mut v = Vec::new();

    b.iter(|| {
        v.clear();
        encode_packet(&p, &[], &mut v).unwrap();
    });
}
