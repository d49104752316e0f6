use std::net::Ipv4Addr;

use crate::interface::NetworkInterface;
use crate::wire::Ipv4Datagram;

#[derive(Debug, Clone, Copy)]
struct Route {
    prefix: u32,
    prefix_len: u8,
    next_hop: Option<Ipv4Addr>,
    interface: usize,
}

impl Route {
    fn matches(&self, dst: u32) -> bool {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        };
        dst & mask == self.prefix & mask
    }
}

/// An IPv4 router: owns a set of [`NetworkInterface`]s and moves datagrams
/// between them by longest-prefix match over its route table.
///
/// Routes with no next hop are directly attached networks; the datagram's
/// own destination is the next hop there.
#[derive(Debug, Default)]
pub struct Router {
    interfaces: Vec<NetworkInterface>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an interface; the returned index names it in routes.
    pub fn add_interface(&mut self, interface: NetworkInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    pub fn interface(&self, index: usize) -> &NetworkInterface {
        &self.interfaces[index]
    }

    pub fn interface_mut(&mut self, index: usize) -> &mut NetworkInterface {
        &mut self.interfaces[index]
    }

    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        interface: usize,
    ) {
        self.routes.push(Route {
            prefix: u32::from(prefix),
            prefix_len,
            next_hop,
            interface,
        });
    }

    /// Drain every interface's inbound queue, forwarding each datagram.
    pub fn route(&mut self) {
        for index in 0..self.interfaces.len() {
            while let Some(dgram) = self.interfaces[index].poll_datagram() {
                self.route_datagram(dgram);
            }
        }
    }

    /// Advance time on every interface.
    pub fn tick(&mut self, ms: u64) {
        for interface in &mut self.interfaces {
            interface.tick(ms);
        }
    }

    fn route_datagram(&mut self, mut dgram: Ipv4Datagram) {
        if dgram.header.time_to_live <= 1 {
            log::debug!("router: TTL expired for datagram to {}", dgram.destination());
            return;
        }
        dgram.header.time_to_live -= 1;
        dgram.header.header_checksum = dgram.header.calc_header_checksum();

        let dst = u32::from(dgram.destination());
        let best = self
            .routes
            .iter()
            .filter(|route| route.matches(dst))
            .max_by_key(|route| route.prefix_len)
            .copied();
        let Some(route) = best else {
            log::debug!("router: no route to {}", dgram.destination());
            return;
        };

        let next_hop = route.next_hop.unwrap_or_else(|| dgram.destination());
        self.interfaces[route.interface].send_datagram(dgram, next_hop);
    }
}
