use crate::packet_pool::Packet;

/// A length-delimited view over a pool packet holding one L2CAP PDU.
pub struct Pdu<P> {
    packet: P,
    len: usize,
}

impl<P> Pdu<P> {
    pub fn new(packet: P, len: usize) -> Self {
        Self { packet, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_inner(self) -> P {
        self.packet
    }
}

impl<P: Packet> Pdu<P> {
    /// Allocates from `Pool` and copies `data` into the new packet.
    pub fn copy_from_slice<Pool>(data: &[u8]) -> Option<Self>
    where
        Pool: crate::packet_pool::PacketPool<Packet = P>,
    {
        if data.len() > Pool::MTU {
            return None;
        }
        let mut packet = Pool::allocate()?;
        packet.as_mut()[..data.len()].copy_from_slice(data);
        Some(Self::new(packet, data.len()))
    }
}

impl<P: Packet> AsRef<[u8]> for Pdu<P> {
    fn as_ref(&self) -> &[u8] {
        &self.packet.as_ref()[..self.len]
    }
}

impl<P: Packet> AsMut<[u8]> for Pdu<P> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.packet.as_mut()[..self.len]
    }
}
