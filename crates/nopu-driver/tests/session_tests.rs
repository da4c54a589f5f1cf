//! End-to-end session scenarios
//!
//! The full stack — session controller, loader, ingestion — over the
//! protocol emulator and a scripted transport. No silicon, no sockets.

use nopu_driver::{
    CopDevice, CopEmulator, Datagram, IngestConfig, NetworkSource, ScriptedTransport,
    SessionConfig, SessionController, UdpTransport, DEFAULT_PACKET_SIZE, DEFAULT_UDP_PORT,
};
use nopu_models::zoo::{self, Cifar10Layout, CIFAR10_IMAGE_LEN};
use std::net::SocketAddr;

fn host() -> SocketAddr {
    "192.168.24.45:40000".parse().unwrap()
}

fn queue_image(transport: &mut ScriptedTransport, fill: u8) {
    for _ in 0..CIFAR10_IMAGE_LEN / DEFAULT_PACKET_SIZE {
        transport.queue(Datagram::new(
            host(),
            DEFAULT_UDP_PORT,
            vec![fill; DEFAULT_PACKET_SIZE],
        ));
    }
}

fn network_session(
    limit: u64,
) -> (SessionController<CopEmulator>, Cifar10Layout) {
    let layout = Cifar10Layout::default();
    let topology = zoo::cifar10(&layout).unwrap();
    let device = CopDevice::new(CopEmulator::new().with_image_window(CIFAR10_IMAGE_LEN));
    let controller = SessionController::new(
        device,
        topology,
        SessionConfig {
            image_base: layout.image,
            image_len: CIFAR10_IMAGE_LEN,
            limit: Some(limit),
        },
    );
    (controller, layout)
}

#[test]
fn networked_inference_round() {
    let mut transport = ScriptedTransport::new();
    queue_image(&mut transport, 1);

    let (mut controller, _) = network_session(1);
    let mut source = NetworkSource::new(transport, IngestConfig::default());

    let report = controller.run(&mut source).unwrap();
    assert_eq!(report.images, 1);

    let transport = source.into_transport();
    // Three batch acks plus the result datagram, all to the latched host.
    assert_eq!(transport.sent.len(), 4);
    for (dest, _) in &transport.sent {
        assert_eq!(*dest, host());
    }
    let acks: Vec<Vec<u8>> = transport.sent[..3]
        .iter()
        .map(|(_, p)| p.to_vec())
        .collect();
    assert_eq!(acks, vec![vec![0, 1], vec![0, 2], vec![0, 3]]);

    // Response: the incremented sequence and the class byte. An all-ones
    // 3072-sample image checksums to 3072 = 0x0C00, truncated to 0.
    let (_, response) = &transport.sent[3];
    assert_eq!(response.to_vec(), vec![1, 0]);
}

#[test]
fn sequence_advances_once_per_image() {
    let mut transport = ScriptedTransport::new();
    queue_image(&mut transport, 1);
    queue_image(&mut transport, 2);

    let (mut controller, _) = network_session(2);
    let mut source = NetworkSource::new(transport, IngestConfig::default());

    let report = controller.run(&mut source).unwrap();
    assert_eq!(report.images, 2);
    assert_eq!(controller.state().sequence, 2);
    assert_eq!(controller.state().batch, 0);

    let transport = source.into_transport();
    // Second image's acks carry the advanced sequence number.
    let second_acks: Vec<Vec<u8>> = transport.sent[4..7]
        .iter()
        .map(|(_, p)| p.to_vec())
        .collect();
    assert_eq!(second_acks, vec![vec![1, 1], vec![1, 2], vec![1, 3]]);
}

#[test]
fn configuration_happens_once_for_the_whole_session() {
    let mut transport = ScriptedTransport::new();
    queue_image(&mut transport, 1);
    queue_image(&mut transport, 2);

    let (mut controller, layout) = network_session(2);
    let mut source = NetworkSource::new(transport, IngestConfig::default());
    controller.run(&mut source).unwrap();

    let emulator = controller.into_device().into_port();
    assert_eq!(emulator.run_count(), 2);
    assert_eq!(emulator.reset_count(), 1);
    // 55 topology writes + 2 × (3072 image samples + 1 pointer bind).
    assert_eq!(emulator.write_count(), 55 + 2 * (CIFAR10_IMAGE_LEN + 1));
    // The image pointer ends up bound to the layout's buffer.
    assert_eq!(
        emulator.config(0, nopu_cop::ConfigField::Image),
        Some(layout.image as i32)
    );
}

#[test]
fn scripted_results_flow_back_as_classes() {
    let mut transport = ScriptedTransport::new();
    queue_image(&mut transport, 0);

    let (mut controller, _) = network_session(1);
    controller.device_mut().port_mut().push_result(7);
    let mut source = NetworkSource::new(transport, IngestConfig::default());
    controller.run(&mut source).unwrap();

    let transport = source.into_transport();
    let (_, response) = transport.sent.last().unwrap();
    assert_eq!(response.to_vec(), vec![1, 7]);
}

#[test]
#[ignore] // Binds real sockets; loopback smoke test for the UDP transport.
fn udp_transport_loopback() {
    use nopu_driver::Transport;

    let mut server = UdpTransport::bind("127.0.0.1:0").unwrap();
    let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let server_addr: SocketAddr =
        format!("127.0.0.1:{}", server.local_port()).parse().unwrap();

    client.send_to(&[1, 2, 3], server_addr).unwrap();
    let datagram = server.recv().unwrap().unwrap();
    assert_eq!(datagram.payload.as_ref(), &[1, 2, 3]);
    assert_eq!(datagram.dest_port, server.local_port());

    server.send(datagram.source, &[9]).unwrap();
    let mut buf = [0u8; 8];
    let (len, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], &[9]);
}
