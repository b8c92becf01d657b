use cncstream_communication::{
    BatchChannel, ByteStream, ConnectionAcceptor, TcpAcceptor, TcpByteStream,
};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

fn accept_within(acceptor: &mut TcpAcceptor, timeout: Duration) -> Option<TcpByteStream> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(stream) = acceptor.accept() {
            return Some(stream);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

#[test]
fn test_tcp_batch_round_trip() {
    let mut acceptor = TcpAcceptor::with_bind_address("127.0.0.1");
    acceptor.listen(0).unwrap();
    let addr = acceptor.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\nG0 X1 Y2\n")
        .unwrap();

    let stream = accept_within(&mut acceptor, Duration::from_secs(5)).unwrap();
    assert!(stream.peer_addr().is_some());
    let mut channel = BatchChannel::new("tcp", stream);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut line = None;
    while line.is_none() && Instant::now() < deadline {
        channel.handle();
        line = channel.poll_line();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(line.as_deref(), Some("G0 X1 Y2"));

    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut response = [0u8; 15];
    client.read_exact(&mut response).unwrap();
    assert_eq!(&response, b"HTTP/1.1 200 OK");

    channel.ack(Ok(()));
    drop(client);
    let deadline = Instant::now() + Duration::from_secs(5);
    while !channel.is_done() && Instant::now() < deadline {
        channel.handle();
        channel.poll_line();
        thread::sleep(Duration::from_millis(1));
    }
    assert!(channel.is_done());
    assert!(!channel.is_aborted());
    acceptor.close();
    assert!(acceptor.local_addr().is_none());
}

#[test]
fn test_tcp_stream_reports_disconnect() {
    let mut acceptor = TcpAcceptor::with_bind_address("127.0.0.1");
    acceptor.listen(0).unwrap();
    let addr = acceptor.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    let mut stream = accept_within(&mut acceptor, Duration::from_secs(5)).unwrap();
    client.write_all(b"abc").unwrap();
    drop(client);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    while Instant::now() < deadline {
        while let Some(byte) = stream.read_byte() {
            received.push(byte);
        }
        if !stream.connected() && stream.available() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(received, b"abc");
    assert!(!stream.connected());
}
