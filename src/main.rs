//! Attach a [`NetworkInterface`] to a Linux tap device and let it loose:
//! it answers ARP for its address and echoes every IPv4 datagram back to
//! the sender, which makes the stack visible to ordinary tools on the
//! host side of the tap.
//!
//! Usage: `netstack [tap-name] [ipv4-addr]` (defaults: `tap0`, `10.0.0.2`).
//!
//! The device must exist and be up, e.g.:
//! `ip tuntap add dev tap0 mode tap && ip addr add 10.0.0.1/24 dev tap0 && ip link set tap0 up`

use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::rc::Rc;
use std::time::Instant;

use etherparse::Ipv4Header;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use rand::Rng;

use netstack::{EthernetFrame, Ipv4Datagram, NetworkInterface};

const MTU: usize = 1500;
const ETHERNET_HEADER_LEN: usize = 14;
const POLL_INTERVAL_MS: u16 = 50;
const ECHO_TTL: u8 = 64;

/// A locally-administered unicast MAC, freshly random per run.
fn random_private_mac() -> [u8; 6] {
    let mut mac: [u8; 6] = rand::thread_rng().gen();
    mac[0] |= 0x02;
    mac[0] &= 0xfe;
    mac
}

/// The received datagram turned around: source and destination swapped,
/// fresh TTL, same protocol and payload.
fn echo_of(dgram: &Ipv4Datagram) -> Option<Ipv4Datagram> {
    let header = Ipv4Header::new(
        dgram.payload.len() as u16,
        ECHO_TTL,
        dgram.header.protocol,
        dgram.header.destination,
        dgram.header.source,
    )
    .ok()?;
    Some(Ipv4Datagram {
        header,
        payload: dgram.payload.clone(),
    })
}

fn main() -> io::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let tap_name = args.next().unwrap_or_else(|| "tap0".to_string());
    let ip: Ipv4Addr = args
        .next()
        .unwrap_or_else(|| "10.0.0.2".to_string())
        .parse()
        .expect("invalid IPv4 address");

    let nic = Rc::new(
        tun_tap::Iface::without_packet_info(&tap_name, tun_tap::Mode::Tap)
            .expect("failed to open tap device"),
    );

    let port = {
        let nic = Rc::clone(&nic);
        move |frame: &EthernetFrame| match frame.serialize() {
            Ok(bytes) => {
                if let Err(err) = nic.send(&bytes) {
                    log::warn!("tap send failed: {err}");
                }
            }
            Err(err) => log::warn!("dropping unserialisable frame: {err}"),
        }
    };
    let mut iface = NetworkInterface::new(tap_name.clone(), Box::new(port), random_private_mac(), ip);
    log::info!("echoing datagrams for {ip} on {tap_name}");

    let mut buf = [0u8; MTU + ETHERNET_HEADER_LEN];
    let mut last_tick = Instant::now();
    loop {
        let fd = unsafe { BorrowedFd::borrow_raw(nic.as_raw_fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)).map_err(io::Error::from)?;

        if ready > 0 {
            let nbytes = nic.recv(&mut buf[..])?;
            match EthernetFrame::parse(&buf[..nbytes]) {
                Ok(frame) => iface.recv_frame(&frame),
                Err(err) => log::debug!("ignoring frame ({nbytes} bytes): {err}"),
            }
            while let Some(dgram) = iface.poll_datagram() {
                log::info!(
                    "{} -> {}: {} payload bytes, echoing",
                    dgram.source(),
                    dgram.destination(),
                    dgram.payload.len()
                );
                if let Some(echo) = echo_of(&dgram) {
                    let next_hop = echo.destination();
                    iface.send_datagram(echo, next_hop);
                }
            }
        }

        let elapsed = last_tick.elapsed().as_millis() as u64;
        if elapsed > 0 {
            iface.tick(elapsed);
            last_tick = Instant::now();
        }
    }
}
