use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use etherparse::EtherType;

use crate::wire::{
    ArpMessage, EthernetAddress, EthernetFrame, Ipv4Datagram, ARP_OPCODE_REPLY,
    ETHERNET_BROADCAST,
};

/// How long a learned IP-to-MAC binding stays usable.
const ARP_ENTRY_TTL_MS: u64 = 30_000;
/// How long an unanswered ARP request suppresses duplicates before the
/// datagrams waiting on it are abandoned.
const ARP_REQUEST_TTL_MS: u64 = 5_000;

/// Transmit capability handed to a [`NetworkInterface`] at construction.
/// The interface never touches sockets itself.
pub trait OutputPort {
    fn transmit(&mut self, frame: &EthernetFrame);
}

impl<F: FnMut(&EthernetFrame)> OutputPort for F {
    fn transmit(&mut self, frame: &EthernetFrame) {
        self(frame)
    }
}

#[derive(Debug, Clone, Copy)]
struct ArpEntry {
    mac: EthernetAddress,
    remaining_ms: u64,
}

/// The link layer: turns IPv4 datagrams into Ethernet frames and back,
/// resolving next-hop addresses over ARP.
///
/// Datagrams whose next hop is not yet resolved wait in a queue; the first
/// of them triggers a broadcast ARP request, and the reply flushes them all.
/// Time only advances through [`NetworkInterface::tick`].
pub struct NetworkInterface {
    name: String,
    port: Box<dyn OutputPort>,
    mac: EthernetAddress,
    ip: Ipv4Addr,

    arp_cache: HashMap<Ipv4Addr, ArpEntry>,
    /// Outstanding ARP requests by target IP, with time left before they
    /// are given up on.
    arp_in_flight: HashMap<Ipv4Addr, u64>,
    pending: VecDeque<(Ipv4Datagram, Ipv4Addr)>,
    received: VecDeque<Ipv4Datagram>,
}

impl NetworkInterface {
    pub fn new(
        name: impl Into<String>,
        port: Box<dyn OutputPort>,
        mac: EthernetAddress,
        ip: Ipv4Addr,
    ) -> Self {
        let name = name.into();
        log::debug!("interface {name}: ethernet {} ip {ip}", format_mac(&mac));
        Self {
            name,
            port,
            mac,
            ip,
            arp_cache: HashMap::new(),
            arp_in_flight: HashMap::new(),
            pending: VecDeque::new(),
            received: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> EthernetAddress {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Send `dgram` towards `next_hop` (a router or the final destination
    /// on this link). Unresolved next hops queue the datagram behind an ARP
    /// exchange.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_cache.get(&next_hop) {
            let mac = entry.mac;
            self.transmit_datagram(mac, &dgram);
            return;
        }

        self.pending.push_back((dgram, next_hop));
        if !self.arp_in_flight.contains_key(&next_hop) {
            let request = ArpMessage::request(self.mac, self.ip, next_hop);
            self.transmit(ETHERNET_BROADCAST, EtherType::ARP, request.to_bytes().to_vec());
            self.arp_in_flight.insert(next_hop, ARP_REQUEST_TTL_MS);
        }
    }

    /// Accept one frame from the link.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) {
        if frame.header.ether_type == EtherType::IPV4 {
            if frame.header.destination != self.mac {
                return;
            }
            match Ipv4Datagram::parse(&frame.payload) {
                Ok(dgram) => self.received.push_back(dgram),
                Err(err) => log::debug!("interface {}: dropping bad datagram: {err}", self.name),
            }
        } else if frame.header.ether_type == EtherType::ARP {
            if frame.header.destination != self.mac
                && frame.header.destination != ETHERNET_BROADCAST
            {
                return;
            }
            match ArpMessage::parse(&frame.payload) {
                Ok(message) => self.recv_arp(&message),
                Err(err) => log::debug!("interface {}: dropping bad ARP: {err}", self.name),
            }
        }
    }

    fn recv_arp(&mut self, message: &ArpMessage) {
        // Every valid ARP message teaches us the sender's binding.
        log::debug!(
            "interface {}: learned {} at {}",
            self.name,
            message.sender_ip,
            format_mac(&message.sender_mac)
        );
        self.arp_cache.insert(
            message.sender_ip,
            ArpEntry {
                mac: message.sender_mac,
                remaining_ms: ARP_ENTRY_TTL_MS,
            },
        );
        self.arp_in_flight.remove(&message.sender_ip);

        // Datagrams that were waiting on this binding can go out now.
        let pending = std::mem::take(&mut self.pending);
        for (dgram, next_hop) in pending {
            if next_hop == message.sender_ip {
                self.transmit_datagram(message.sender_mac, &dgram);
            } else {
                self.pending.push_back((dgram, next_hop));
            }
        }

        if message.is_request() && message.target_ip == self.ip {
            let reply = ArpMessage {
                opcode: ARP_OPCODE_REPLY,
                sender_mac: self.mac,
                sender_ip: self.ip,
                target_mac: message.sender_mac,
                target_ip: message.sender_ip,
            };
            self.transmit(message.sender_mac, EtherType::ARP, reply.to_bytes().to_vec());
        }
    }

    /// Next datagram delivered to this interface, if any.
    pub fn poll_datagram(&mut self) -> Option<Ipv4Datagram> {
        self.received.pop_front()
    }

    /// Advance time by `ms` milliseconds: age the ARP cache and give up on
    /// requests that went unanswered, dropping the datagrams behind them.
    pub fn tick(&mut self, ms: u64) {
        for entry in self.arp_cache.values_mut() {
            entry.remaining_ms = entry.remaining_ms.saturating_sub(ms);
        }
        self.arp_cache.retain(|_, entry| entry.remaining_ms > 0);

        let mut expired = Vec::new();
        for (ip, remaining) in self.arp_in_flight.iter_mut() {
            *remaining = remaining.saturating_sub(ms);
            if *remaining == 0 {
                expired.push(*ip);
            }
        }
        for ip in expired {
            self.arp_in_flight.remove(&ip);
            let before = self.pending.len();
            self.pending.retain(|(_, next_hop)| *next_hop != ip);
            let dropped = before - self.pending.len();
            if dropped > 0 {
                log::debug!(
                    "interface {}: no ARP reply from {ip}, dropping {dropped} datagram(s)",
                    self.name
                );
            }
        }
    }

    fn transmit_datagram(&mut self, dst: EthernetAddress, dgram: &Ipv4Datagram) {
        match dgram.serialize() {
            Ok(bytes) => self.transmit(dst, EtherType::IPV4, bytes),
            Err(err) => log::debug!(
                "interface {}: dropping unserialisable datagram: {err}",
                self.name
            ),
        }
    }

    fn transmit(&mut self, dst: EthernetAddress, ether_type: EtherType, payload: Vec<u8>) {
        let frame = EthernetFrame::new(dst, self.mac, ether_type, payload);
        self.port.transmit(&frame);
    }
}

impl std::fmt::Debug for NetworkInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("name", &self.name)
            .field("mac", &format_mac(&self.mac))
            .field("ip", &self.ip)
            .field("pending", &self.pending.len())
            .field("received", &self.received.len())
            .finish()
    }
}

fn format_mac(mac: &EthernetAddress) -> String {
    mac.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
