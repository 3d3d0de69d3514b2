//! Loopback helpers shared by the unit tests.

use crate::tftp::{Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

pub(crate) async fn loopback() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

pub(crate) async fn recv_packet(sock: &UdpSocket) -> (Packet, SocketAddr) {
    let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
    let (len, src) = sock.recv_from(&mut buf).await.unwrap();
    (Packet::decode(&buf[..len]).unwrap(), src)
}

pub(crate) async fn send_packet(sock: &UdpSocket, packet: Packet, dst: SocketAddr) {
    sock.send_to(&packet.encode().unwrap(), dst).await.unwrap();
}
