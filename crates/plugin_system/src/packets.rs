//! Packet hook table.
//!
//! Plugins claim wire command codes at one of the network layer's dispatch
//! points. The network layer offers each buffered packet to [`PacketHooks::parse`]
//! before its own handlers, and falls back to built-in processing when no
//! plugin claims the command.

use crate::error::RegistryError;
use hpm_abi::{PacketHookPoint, PacketReceiveFn, VARIABLE_LENGTH};
use std::cell::RefCell;
use std::os::raw::{c_int, c_uint};

/// The read side of a connection as seen by packet dispatch.
pub trait PacketBuffer {
    /// Descriptor handed to packet handlers.
    fn fd(&self) -> c_int;
    /// Buffered bytes not yet consumed.
    fn remaining(&self) -> &[u8];
    /// Consumes `len` bytes.
    fn skip(&mut self, len: usize);

    /// Little-endian u16 at `offset` in the unconsumed bytes.
    fn peek_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.remaining().get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

/// Outcome of offering a buffer to the plugins, as reported to C callers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketParse {
    /// No plugin claims the command.
    Unknown = 0,
    /// A plugin handled the packet; the buffer advanced past it.
    Handled = 1,
    /// A plugin claims the command but the packet is not fully buffered.
    Incomplete = 2,
}

/// Length of a registered packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLength {
    Fixed(u16),
    /// Length is carried in the u16 at offset 2.
    Variable,
}

impl PacketLength {
    /// Interprets a raw length as passed by plugins.
    ///
    /// Fixed packets must at least hold their command code.
    pub fn from_raw(length: c_int) -> Option<Self> {
        match length {
            VARIABLE_LENGTH => Some(Self::Variable),
            2..=0xFFFF => Some(Self::Fixed(length as u16)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PacketEntry {
    cmd: u16,
    length: PacketLength,
    receive: PacketReceiveFn,
    pid: c_uint,
}

/// Per-hook-point command registrations.
#[derive(Debug)]
pub struct PacketHooks {
    points: RefCell<Vec<Vec<PacketEntry>>>,
}

impl Default for PacketHooks {
    fn default() -> Self {
        Self {
            points: RefCell::new(vec![Vec::new(); PacketHookPoint::COUNT]),
        }
    }
}

impl PacketHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `cmd` at `point` for plugin `pid`.
    pub fn add_packet(
        &self,
        cmd: u16,
        length: c_int,
        receive: PacketReceiveFn,
        point: PacketHookPoint,
        pid: c_uint,
    ) -> Result<(), RegistryError> {
        let idx = point.index().ok_or(RegistryError::UnknownHookPoint(point.0))?;
        let length = PacketLength::from_raw(length).ok_or(RegistryError::InvalidPacketLength(length))?;

        let mut points = self.points.borrow_mut();
        if let Some(existing) = points[idx].iter().find(|entry| entry.cmd == cmd) {
            return Err(RegistryError::DuplicatePacket {
                cmd,
                owner: existing.pid,
            });
        }

        points[idx].push(PacketEntry {
            cmd,
            length,
            receive,
            pid,
        });
        Ok(())
    }

    /// Owner of `cmd` at `point`, if claimed.
    pub fn owner(&self, cmd: u16, point: PacketHookPoint) -> Option<c_uint> {
        let idx = point.index()?;
        self.points.borrow()[idx]
            .iter()
            .find(|entry| entry.cmd == cmd)
            .map(|entry| entry.pid)
    }

    /// Offers the next buffered packet to the plugin claiming its command.
    pub fn parse<B: PacketBuffer + ?Sized>(&self, buffer: &mut B, point: PacketHookPoint) -> PacketParse {
        let Some(idx) = point.index() else {
            return PacketParse::Unknown;
        };
        let Some(cmd) = buffer.peek_u16(0) else {
            return PacketParse::Incomplete;
        };

        let entry = self.points.borrow()[idx]
            .iter()
            .find(|entry| entry.cmd == cmd)
            .copied();
        let Some(entry) = entry else {
            return PacketParse::Unknown;
        };

        let length = match entry.length {
            PacketLength::Fixed(len) => len as usize,
            PacketLength::Variable => match buffer.peek_u16(2) {
                None => return PacketParse::Incomplete,
                // A variable packet cannot be shorter than its own header.
                Some(len) if len < 4 => return PacketParse::Unknown,
                Some(len) => len as usize,
            },
        };

        if length > buffer.remaining().len() {
            return PacketParse::Incomplete;
        }

        unsafe { (entry.receive)(buffer.fd()) };
        buffer.skip(length);
        PacketParse::Handled
    }

    /// Number of commands claimed at `point`.
    pub fn len(&self, point: PacketHookPoint) -> usize {
        point
            .index()
            .map(|idx| self.points.borrow()[idx].len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        for point in self.points.borrow_mut().iter_mut() {
            point.clear();
        }
    }
}
