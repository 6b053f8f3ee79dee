//! Connect to a running broker, send a CONNECT and print the CONNACK
//!
//! Usage: cargo run --example connect_probe [ADDR]   (default 127.0.0.1:1883)

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tinymq::codec::{encode_pingreq, CONNACK, PINGRESP};

fn main() -> std::io::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:1883".to_string());

    println!("Connecting to {}...", addr);
    let mut stream = TcpStream::connect(&addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    // MQTT 3.1.1 CONNECT: protocol "MQTT", level 4, clean session, keep alive 10s
    let connect = [
        0x10, 0x0A, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A,
    ];
    println!("Packet: {:02x?}", connect);
    stream.write_all(&connect)?;
    stream.flush()?;
    println!("CONNECT sent, waiting for CONNACK...");

    let mut response = [0u8; 4];
    stream.read_exact(&mut response)?;
    println!("Received: {:02x?}", response);
    if response == CONNACK {
        println!("CONNACK: connection accepted");
    } else {
        println!("Unexpected response");
        return Ok(());
    }

    let mut ping = bytes::BytesMut::new();
    encode_pingreq(&mut ping);
    stream.write_all(&ping)?;

    let mut pong = [0u8; 2];
    stream.read_exact(&mut pong)?;
    if pong == PINGRESP {
        println!("PINGRESP received");
    } else {
        println!("Unexpected response to PINGREQ: {:02x?}", pong);
    }

    Ok(())
}
